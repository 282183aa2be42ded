use std::{borrow::Borrow, fmt};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::command::Money;

/// Opaque, unique account identifier (usually the holder's email).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for AccountId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Staged replacement of an account balance.
///
/// Produced by [`Account::handle_delta`], applied by [`Account::apply`] when the
/// enclosing unit of work commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceChange {
    pub account: AccountId,
    pub previous: Money,
    pub next: Money,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccountError {
    #[error("Insufficient funds in `{account}`: balance {balance}, requested {requested}")]
    InsufficientFunds {
        account: AccountId,
        balance: Money,
        requested: Money,
    },
    #[error("Balance of `{account}` would overflow")]
    BalanceOverflow { account: AccountId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    id: AccountId,
    name: String,
    balance: Money,
}

impl Account {
    pub fn new(id: AccountId, name: impl Into<String>, balance: Money) -> Self {
        Self {
            id,
            name: name.into(),
            balance,
        }
    }

    pub fn id(&self) -> &AccountId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn balance(&self) -> Money {
        self.balance
    }

    pub fn apply(&mut self, change: &BalanceChange) {
        debug_assert_eq!(change.account, self.id);
        self.balance = change.next;
    }

    /// Validates a signed delta against `min_balance` without touching the account.
    pub fn handle_delta(
        &self,
        delta: Money,
        min_balance: Money,
    ) -> Result<BalanceChange, AccountError> {
        let next = self
            .balance
            .checked_add(delta)
            .ok_or_else(|| AccountError::BalanceOverflow {
                account: self.id.clone(),
            })?;
        if next < min_balance {
            return Err(AccountError::InsufficientFunds {
                account: self.id.clone(),
                balance: self.balance,
                requested: -delta,
            });
        }
        Ok(BalanceChange {
            account: self.id.clone(),
            previous: self.balance,
            next,
        })
    }
}
