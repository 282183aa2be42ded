use std::{collections::BTreeMap, mem};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::{
    account::{Account, AccountId, BalanceChange},
    command::Money,
};

use super::{
    BankStore, StoreError,
    accounts::AccountLease,
    ledger::{EntryDraft, LedgerEntry},
    notifier::{Notification, NotificationDraft},
};

/// What a successful commit made visible.
#[derive(Debug, Clone)]
pub struct Committed {
    pub committed_at: DateTime<Utc>,
    pub balances: Vec<BalanceChange>,
    pub entries: Vec<LedgerEntry>,
    pub notifications: Vec<Notification>,
}

/// Staged mutations across the account store, ledger and notifier.
///
/// Nothing staged is visible to anyone else until [`UnitOfWork::commit`].
/// Dropping the unit without committing aborts it and releases its leases.
pub struct UnitOfWork<'s> {
    store: &'s BankStore,
    leases: BTreeMap<AccountId, AccountLease>,
    balances: BTreeMap<AccountId, BalanceChange>,
    entries: Vec<EntryDraft>,
    notifications: Vec<NotificationDraft>,
    finished: bool,
}

impl<'s> UnitOfWork<'s> {
    pub(super) fn new(store: &'s BankStore) -> Self {
        Self {
            store,
            leases: BTreeMap::new(),
            balances: BTreeMap::new(),
            entries: Vec::new(),
            notifications: Vec::new(),
            finished: false,
        }
    }

    pub(super) fn hold(&mut self, lease: AccountLease) {
        self.leases.insert(lease.account().id().clone(), lease);
    }

    pub fn lease_count(&self) -> usize {
        self.leases.len()
    }

    /// The account as this unit sees it, including balances it already staged.
    pub fn account(&self, id: &AccountId) -> Result<Account, StoreError> {
        let lease = self
            .leases
            .get(id)
            .ok_or_else(|| StoreError::AccountNotFound(id.clone()))?;
        let mut account = lease.account();
        if let Some(change) = self.balances.get(id) {
            account.apply(change);
        }
        Ok(account)
    }

    /// Stages `balance + delta`, refusing to go below `min_balance`.
    /// Returns the staged balance.
    pub fn apply_delta(
        &mut self,
        id: &AccountId,
        delta: Money,
        min_balance: Money,
    ) -> Result<Money, StoreError> {
        let current = self.account(id)?;
        let change = current.handle_delta(delta, min_balance)?;
        let next = change.next;
        self.balances
            .entry(id.clone())
            .and_modify(|staged| staged.next = next)
            .or_insert(change);
        Ok(next)
    }

    pub fn append_entry(&mut self, entry: EntryDraft) {
        self.entries.push(entry);
    }

    pub fn notify(&mut self, recipient: AccountId, message: impl Into<String>) {
        self.notifications.push(NotificationDraft {
            recipient,
            message: message.into(),
        });
    }

    /// Applies everything staged, or nothing.
    ///
    /// All fallible steps happen before the first write, so an error here
    /// leaves every store as it was.
    pub fn commit(mut self) -> Result<Committed, StoreError> {
        let _gate = self.store.exclusive()?;
        let committed_at = self.store.commit_stamp(Utc::now());

        let balances: Vec<BalanceChange> = mem::take(&mut self.balances).into_values().collect();
        for change in &balances {
            // every staged change was validated against a lease this unit holds
            if let Some(lease) = self.leases.get(&change.account) {
                lease.apply(change);
            }
        }

        let entries: Vec<LedgerEntry> = mem::take(&mut self.entries)
            .into_iter()
            .map(|draft| draft.stamp(committed_at))
            .collect();
        self.store.ledger().append(entries.iter().cloned());

        let notifications: Vec<Notification> = mem::take(&mut self.notifications)
            .into_iter()
            .map(|draft| draft.stamp(committed_at))
            .collect();
        self.store.notifier().append(notifications.iter().cloned());

        self.finished = true;
        debug!(
            balances = balances.len(),
            entries = entries.len(),
            notifications = notifications.len(),
            "unit of work committed"
        );
        Ok(Committed {
            committed_at,
            balances,
            entries,
            notifications,
        })
    }

    pub fn abort(self) {
        // Drop does the work
    }
}

impl Drop for UnitOfWork<'_> {
    fn drop(&mut self) {
        if !self.finished {
            debug!(
                balances = self.balances.len(),
                entries = self.entries.len(),
                notifications = self.notifications.len(),
                "unit of work aborted"
            );
        }
    }
}
