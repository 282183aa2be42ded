use std::{collections::HashMap, sync::Arc, time::Instant};

use parking_lot::{Condvar, Mutex, RwLock};
use tracing::{debug, trace};

use crate::account::{Account, AccountId, BalanceChange};

use super::StoreError;

struct SlotState {
    account: Account,
    leased: bool,
}

struct AccountSlot {
    state: Mutex<SlotState>,
    released: Condvar,
}

/// Keyed storage of accounts.
///
/// Plain reads always see the committed balance. Balance changes go through
/// an exclusive [`AccountLease`], which only a unit of work holds.
#[derive(Default)]
pub struct AccountStore {
    slots: RwLock<HashMap<AccountId, Arc<AccountSlot>>>,
}

impl AccountStore {
    pub fn get(&self, id: &str) -> Option<Account> {
        let slot = self.slots.read().get(id).cloned()?;
        let account = slot.state.lock().account.clone();
        Some(account)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.slots.read().contains_key(id)
    }

    /// Every account, ordered by id.
    pub fn all(&self) -> Vec<Account> {
        let slots: Vec<Arc<AccountSlot>> = self.slots.read().values().cloned().collect();
        let mut accounts: Vec<Account> = slots
            .iter()
            .map(|slot| slot.state.lock().account.clone())
            .collect();
        accounts.sort_by(|a, b| a.id().cmp(b.id()));
        accounts
    }

    pub fn insert(&self, account: Account) -> Result<(), StoreError> {
        let mut slots = self.slots.write();
        if slots.contains_key(account.id()) {
            return Err(StoreError::DuplicateAccount(account.id().clone()));
        }
        debug!(account = %account.id(), "account inserted");
        slots.insert(
            account.id().clone(),
            Arc::new(AccountSlot {
                state: Mutex::new(SlotState {
                    account,
                    leased: false,
                }),
                released: Condvar::new(),
            }),
        );
        Ok(())
    }

    /// Waits until `deadline` for exclusive use of the account.
    ///
    /// Returns `Ok(None)` when the account does not exist.
    pub(crate) fn lease(
        &self,
        id: &AccountId,
        deadline: Instant,
    ) -> Result<Option<AccountLease>, StoreError> {
        let Some(slot) = self.slots.read().get(id).cloned() else {
            return Ok(None);
        };
        {
            let mut state = slot.state.lock();
            while state.leased {
                if slot.released.wait_until(&mut state, deadline).timed_out() && state.leased {
                    debug!(account = %id, "lease wait timed out");
                    return Err(StoreError::LeaseTimeout {
                        account: id.clone(),
                    });
                }
            }
            state.leased = true;
        }
        trace!(account = %id, "lease acquired");
        Ok(Some(AccountLease { slot }))
    }
}

/// Exclusive right to change one account, released on drop.
pub struct AccountLease {
    slot: Arc<AccountSlot>,
}

impl AccountLease {
    pub fn account(&self) -> Account {
        self.slot.state.lock().account.clone()
    }

    pub(crate) fn apply(&self, change: &BalanceChange) {
        self.slot.state.lock().account.apply(change);
    }
}

impl Drop for AccountLease {
    fn drop(&mut self) {
        let mut state = self.slot.state.lock();
        state.leased = false;
        trace!(account = %state.account.id(), "lease released");
        drop(state);
        self.slot.released.notify_one();
    }
}
