use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::{
    account::{Account, AccountError, AccountId},
    command::{CommandError, Money},
    store::{StoreError, ledger::LedgerEntry, notifier::Notification},
};

pub mod transfer_coordinator;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BankError {
    #[error(transparent)]
    Validation(#[from] CommandError),
    #[error("Account `{0}` not found")]
    AccountNotFound(AccountId),
    #[error("Notification `{0}` not found")]
    NotificationNotFound(String),
    #[error(transparent)]
    Account(#[from] AccountError),
    #[error("Account `{account}` is busy, gave up after {attempts} attempt(s)")]
    ConcurrencyConflict { account: AccountId, attempts: u32 },
    #[error("Persistence failure: {0}")]
    Persistence(StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    #[serde(rename = "ValidationError")]
    Validation,
    #[serde(rename = "NotFoundError")]
    NotFound,
    InsufficientFunds,
    ConcurrencyConflict,
    #[serde(rename = "PersistenceError")]
    Persistence,
}

/// Structured failure result handed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
}

impl BankError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BankError::Validation(_) => ErrorKind::Validation,
            BankError::AccountNotFound(_) | BankError::NotificationNotFound(_) => {
                ErrorKind::NotFound
            }
            BankError::Account(AccountError::InsufficientFunds { .. }) => {
                ErrorKind::InsufficientFunds
            }
            BankError::Account(AccountError::BalanceOverflow { .. }) => ErrorKind::Validation,
            BankError::ConcurrencyConflict { .. } => ErrorKind::ConcurrencyConflict,
            BankError::Persistence(_) => ErrorKind::Persistence,
        }
    }

    /// Whether the same request may succeed if sent again unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::ConcurrencyConflict | ErrorKind::Persistence
        )
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            message: self.to_string(),
            retryable: self.is_retryable(),
        }
    }
}

impl From<StoreError> for BankError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AccountNotFound(id) => BankError::AccountNotFound(id),
            StoreError::NotificationNotFound(id) => BankError::NotificationNotFound(id.to_string()),
            StoreError::DuplicateAccount(account) => {
                BankError::Validation(CommandError::AccountExists { account })
            }
            StoreError::LeaseTimeout { account } => BankError::ConcurrencyConflict {
                account,
                attempts: 1,
            },
            StoreError::Account(err) => BankError::Account(err),
            err @ (StoreError::CommitTimeout { .. } | StoreError::Unavailable) => {
                BankError::Persistence(err)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Receipt {
    pub new_balance: Money,
}

/// Operations the core offers to the outer layers (HTTP, batch driver).
///
/// Identifiers arrive as plain strings; every operation validates its input
/// before touching any store.
pub trait BankingService {
    fn transfer(&self, sender: &str, recipient: &str, amount: Decimal)
    -> Result<Receipt, BankError>;

    fn pay_bill(&self, payer: &str, biller: &str, amount: Decimal) -> Result<Receipt, BankError>;

    fn get_account(&self, account: &str) -> Result<Account, BankError>;

    fn list_transactions(&self, account: &str) -> Result<Vec<LedgerEntry>, BankError>;

    fn list_notifications(&self, account: &str) -> Result<Vec<Notification>, BankError>;

    fn mark_notification_read(&self, notification: &str) -> Result<(), BankError>;
}
