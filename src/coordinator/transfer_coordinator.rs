use std::{sync::Arc, thread};

use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    account::{Account, AccountId},
    command::{BillPaymentCommand, Money, TransferCommand},
    config::BankConfig,
    store::{
        BankStore,
        ledger::{EntryDraft, EntryKind, LedgerEntry},
        notifier::Notification,
    },
};

use super::{BankError, BankingService, Receipt};

/// Runs transfers and bill payments as single units of work over a [`BankStore`].
///
/// Cheap to share between threads behind an `Arc`; all coordination lives in
/// the store.
pub struct TransferCoordinator {
    store: Arc<BankStore>,
    config: BankConfig,
}

impl TransferCoordinator {
    pub fn new(config: BankConfig) -> Self {
        let store = Arc::new(BankStore::new(&config));
        Self::with_store(store, config)
    }

    pub fn with_store(store: Arc<BankStore>, config: BankConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<BankStore> {
        &self.store
    }

    pub fn unread_count(&self, account: &str) -> Result<usize, BankError> {
        self.store
            .read(|store| {
                store
                    .accounts()
                    .contains(account)
                    .then(|| store.notifier().unread_count(account))
            })?
            .ok_or_else(|| BankError::AccountNotFound(AccountId::new(account)))
    }

    /// Re-runs `attempt` from scratch while it loses lease races, at most
    /// `max_conflict_retries` extra times.
    fn retry_on_conflict<T>(
        &self,
        operation: &'static str,
        mut attempt: impl FnMut() -> Result<T, BankError>,
    ) -> Result<T, BankError> {
        let max_attempts = self.config.max_conflict_retries.saturating_add(1);
        let mut attempts = 0;
        loop {
            attempts += 1;
            match attempt() {
                Err(BankError::ConcurrencyConflict { account, .. }) => {
                    if attempts >= max_attempts {
                        warn!(operation, %account, attempts, "giving up after repeated conflicts");
                        return Err(BankError::ConcurrencyConflict { account, attempts });
                    }
                    warn!(operation, %account, attempts, "conflict, retrying with fresh reads");
                    thread::sleep(self.config.retry_backoff() * attempts);
                }
                result => return result,
            }
        }
    }

    fn execute_transfer(&self, command: &TransferCommand) -> Result<Receipt, BankError> {
        let mut unit = self.store.begin([&command.sender, &command.recipient])?;
        let sender = unit.account(&command.sender)?;
        let recipient = unit.account(&command.recipient)?;

        let new_balance = unit.apply_delta(sender.id(), -command.amount, Money::ZERO)?;
        unit.apply_delta(recipient.id(), command.amount, Money::ZERO)?;
        unit.append_entry(EntryDraft::new(
            sender.id().clone(),
            EntryKind::Transfer,
            -command.amount,
            format!("Transfer to {} ({})", recipient.name(), recipient.id()),
        ));
        unit.append_entry(EntryDraft::new(
            recipient.id().clone(),
            EntryKind::Transfer,
            command.amount,
            format!("Transfer from {} ({})", sender.name(), sender.id()),
        ));
        unit.notify(
            recipient.id().clone(),
            format!(
                "You received {} from {} ({})",
                command.amount,
                sender.name(),
                sender.id()
            ),
        );
        debug!(sender = %sender.id(), recipient = %recipient.id(), "transfer staged");

        unit.commit()?;
        Ok(Receipt { new_balance })
    }

    fn execute_bill_payment(&self, command: &BillPaymentCommand) -> Result<Receipt, BankError> {
        let mut unit = self.store.begin([&command.payer])?;
        let payer = unit.account(&command.payer)?;

        let new_balance = unit.apply_delta(payer.id(), -command.amount, Money::ZERO)?;
        unit.append_entry(EntryDraft::new(
            payer.id().clone(),
            EntryKind::BillPayment,
            -command.amount,
            format!("Bill payment to {}", command.biller),
        ));
        debug!(payer = %payer.id(), biller = %command.biller, "bill payment staged");

        unit.commit()?;
        Ok(Receipt { new_balance })
    }
}

impl BankingService for TransferCoordinator {
    fn transfer(
        &self,
        sender: &str,
        recipient: &str,
        amount: Decimal,
    ) -> Result<Receipt, BankError> {
        let command = TransferCommand::parse(sender, recipient, amount)
            .inspect_err(|err| debug!(%err, "transfer rejected"))?;
        let receipt = self
            .retry_on_conflict("transfer", || self.execute_transfer(&command))
            .inspect_err(|err| debug!(%err, "transfer aborted"))?;
        info!(
            sender = %command.sender,
            recipient = %command.recipient,
            amount = %command.amount,
            "transfer committed"
        );
        Ok(receipt)
    }

    fn pay_bill(&self, payer: &str, biller: &str, amount: Decimal) -> Result<Receipt, BankError> {
        let command = BillPaymentCommand::parse(payer, biller, amount)
            .inspect_err(|err| debug!(%err, "bill payment rejected"))?;
        let receipt = self
            .retry_on_conflict("pay_bill", || self.execute_bill_payment(&command))
            .inspect_err(|err| debug!(%err, "bill payment aborted"))?;
        info!(
            payer = %command.payer,
            biller = %command.biller,
            amount = %command.amount,
            "bill payment committed"
        );
        Ok(receipt)
    }

    fn get_account(&self, account: &str) -> Result<Account, BankError> {
        self.store
            .read(|store| store.accounts().get(account))?
            .ok_or_else(|| BankError::AccountNotFound(AccountId::new(account)))
    }

    fn list_transactions(&self, account: &str) -> Result<Vec<LedgerEntry>, BankError> {
        self.store
            .read(|store| {
                store
                    .accounts()
                    .contains(account)
                    .then(|| store.ledger().list_by_account(account))
            })?
            .ok_or_else(|| BankError::AccountNotFound(AccountId::new(account)))
    }

    fn list_notifications(&self, account: &str) -> Result<Vec<Notification>, BankError> {
        self.store
            .read(|store| {
                store
                    .accounts()
                    .contains(account)
                    .then(|| store.notifier().list_by_recipient(account))
            })?
            .ok_or_else(|| BankError::AccountNotFound(AccountId::new(account)))
    }

    fn mark_notification_read(&self, notification: &str) -> Result<(), BankError> {
        let id = Uuid::parse_str(notification.trim())
            .map_err(|_| BankError::NotificationNotFound(notification.to_owned()))?;
        let changed = self.store.read(|store| store.notifier().mark_read(id))??;
        debug!(notification = %id, changed, "notification marked read");
        Ok(())
    }
}
