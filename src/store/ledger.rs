use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use uuid::Uuid;

use crate::{account::AccountId, command::Money};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntryKind {
    Transfer,
    BillPayment,
}

/// Immutable record of one balance-affecting event for one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub account: AccountId,
    pub kind: EntryKind,
    /// Debits are negative, credits positive.
    pub amount: Money,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// A ledger entry staged in a unit of work. Id and timestamp are assigned at commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryDraft {
    pub account: AccountId,
    pub kind: EntryKind,
    pub amount: Money,
    pub description: String,
}

impl EntryDraft {
    pub fn new(
        account: AccountId,
        kind: EntryKind,
        amount: Money,
        description: impl Into<String>,
    ) -> Self {
        Self {
            account,
            kind,
            amount,
            description: description.into(),
        }
    }

    pub(crate) fn stamp(self, created_at: DateTime<Utc>) -> LedgerEntry {
        LedgerEntry {
            id: Uuid::new_v4(),
            account: self.account,
            kind: self.kind,
            amount: self.amount,
            description: self.description,
            created_at,
        }
    }
}

#[derive(Default)]
struct LedgerState {
    entries: Vec<LedgerEntry>,
    by_account: HashMap<AccountId, Vec<usize>>,
}

/// Append-only transaction history.
///
/// Entries are appended only while a commit holds the store's commit gate, so
/// append order is timestamp order.
#[derive(Default)]
pub struct Ledger {
    state: RwLock<LedgerState>,
}

impl Ledger {
    /// Entries of one account, newest first. The result is an owned snapshot.
    pub fn list_by_account(&self, account: &str) -> Vec<LedgerEntry> {
        let state = self.state.read();
        state
            .by_account
            .get(account)
            .map(|indices| {
                indices
                    .iter()
                    .rev()
                    .map(|&idx| state.entries[idx].clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn append(&self, entries: impl IntoIterator<Item = LedgerEntry>) {
        let mut state = self.state.write();
        for entry in entries {
            let idx = state.entries.len();
            state
                .by_account
                .entry(entry.account.clone())
                .or_default()
                .push(idx);
            state.entries.push(entry);
        }
    }
}
