use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock, RwLockWriteGuard};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    account::{AccountError, AccountId},
    config::BankConfig,
};

pub mod accounts;
pub mod ledger;
pub mod notifier;
pub mod unit_of_work;

use accounts::AccountStore;
use ledger::Ledger;
use notifier::Notifier;
use unit_of_work::UnitOfWork;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Account `{0}` not found")]
    AccountNotFound(AccountId),
    #[error("Notification `{0}` not found")]
    NotificationNotFound(Uuid),
    #[error("Account `{0}` already exists")]
    DuplicateAccount(AccountId),
    #[error("Timed out waiting for a lease on account `{account}`")]
    LeaseTimeout { account: AccountId },
    #[error("Timed out after {waited:?} waiting for the commit gate")]
    CommitTimeout { waited: Duration },
    #[error("Store is offline")]
    Unavailable,
    #[error(transparent)]
    Account(#[from] AccountError),
}

/// The three stores plus the gate that makes a commit across them atomic.
///
/// Commits hold the gate exclusively while they apply staged balances, ledger
/// entries and notifications; every read holds it shared. Both sides wait at
/// most `commit_timeout`.
pub struct BankStore {
    accounts: AccountStore,
    ledger: Ledger,
    notifier: Notifier,
    commit_gate: RwLock<()>,
    last_commit: Mutex<DateTime<Utc>>,
    online: AtomicBool,
    lease_timeout: Duration,
    commit_timeout: Duration,
}

impl Default for BankStore {
    fn default() -> Self {
        Self::new(&BankConfig::default())
    }
}

impl BankStore {
    pub fn new(config: &BankConfig) -> Self {
        Self {
            accounts: AccountStore::default(),
            ledger: Ledger::default(),
            notifier: Notifier::default(),
            commit_gate: RwLock::new(()),
            last_commit: Mutex::new(DateTime::<Utc>::MIN_UTC),
            online: AtomicBool::new(true),
            lease_timeout: config.lock_timeout(),
            commit_timeout: config.commit_timeout(),
        }
    }

    pub fn accounts(&self) -> &AccountStore {
        &self.accounts
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Opens a unit of work leasing `ids` in ascending order.
    ///
    /// Ids that do not resolve are not an error here; the unit reports them
    /// as [`StoreError::AccountNotFound`] when they are read.
    pub fn begin<'a, I>(&self, ids: I) -> Result<UnitOfWork<'_>, StoreError>
    where
        I: IntoIterator<Item = &'a AccountId>,
    {
        self.ensure_online()?;
        let mut ids: Vec<&AccountId> = ids.into_iter().collect();
        ids.sort();
        ids.dedup();

        let deadline = Instant::now() + self.lease_timeout;
        let mut unit = UnitOfWork::new(self);
        for id in ids {
            // on error the leases taken so far are released with `unit`
            if let Some(lease) = self.accounts.lease(id, deadline)? {
                unit.hold(lease);
            }
        }
        debug!(leases = unit.lease_count(), "unit of work opened");
        Ok(unit)
    }

    /// Runs `read` against a consistent view: no commit is in flight meanwhile.
    pub fn read<T>(&self, read: impl FnOnce(&Self) -> T) -> Result<T, StoreError> {
        self.ensure_online()?;
        let _gate = self
            .commit_gate
            .try_read_for(self.commit_timeout)
            .ok_or(StoreError::CommitTimeout {
                waited: self.commit_timeout,
            })?;
        Ok(read(self))
    }

    pub(crate) fn exclusive(&self) -> Result<RwLockWriteGuard<'_, ()>, StoreError> {
        self.ensure_online()?;
        self.commit_gate
            .try_write_for(self.commit_timeout)
            .ok_or_else(|| {
                warn!(waited = ?self.commit_timeout, "commit gate timed out");
                StoreError::CommitTimeout {
                    waited: self.commit_timeout,
                }
            })
    }

    /// Commit timestamp for a commit observed at `now`. Never earlier than the
    /// previous one, so append order stays timestamp order if the clock steps back.
    /// Called with the exclusive gate held.
    pub(crate) fn commit_stamp(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let mut last = self.last_commit.lock();
        *last = now.max(*last);
        *last
    }

    /// Puts the store into maintenance: every operation fails with
    /// [`StoreError::Unavailable`] until [`BankStore::bring_online`].
    pub fn take_offline(&self) {
        warn!("store taken offline");
        self.online.store(false, Ordering::SeqCst);
    }

    pub fn bring_online(&self) {
        self.online.store(true, Ordering::SeqCst);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    pub(crate) fn ensure_online(&self) -> Result<(), StoreError> {
        if self.is_online() {
            Ok(())
        } else {
            Err(StoreError::Unavailable)
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use crate::{account::Account, command::Money};

    use super::*;

    #[test]
    fn offline_store_rejects_everything() {
        let store = BankStore::default();
        store
            .accounts()
            .insert(Account::new(AccountId::new("a"), "A", Money::ZERO))
            .unwrap();
        store.take_offline();

        assert_eq!(
            store.read(|s| s.accounts().get("a")).unwrap_err(),
            StoreError::Unavailable
        );
        assert!(matches!(
            store.begin([&AccountId::new("a")]),
            Err(StoreError::Unavailable)
        ));

        store.bring_online();
        assert!(store.read(|s| s.accounts().get("a")).unwrap().is_some());
    }

    #[test]
    fn reads_time_out_while_a_commit_holds_the_gate() {
        let store = BankStore::new(&BankConfig {
            commit_timeout_ms: 10,
            ..BankConfig::default()
        });
        let _gate = store.exclusive().unwrap();
        assert!(matches!(
            store.read(|_| ()),
            Err(StoreError::CommitTimeout { .. })
        ));
    }

    #[test]
    fn commit_stamps_never_go_backwards() {
        let store = BankStore::default();
        let now = Utc::now();
        assert_eq!(store.commit_stamp(now), now);
        // clock stepped back
        assert_eq!(store.commit_stamp(now - TimeDelta::seconds(30)), now);
        let later = now + TimeDelta::seconds(1);
        assert_eq!(store.commit_stamp(later), later);
    }
}
