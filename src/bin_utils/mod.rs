//! This module could be a separate crate on its own, to drive [`bank_ledger`] from a batch
//! file, but for simplicity's sake it ships with the library and is used by the binary and
//! the integration tests.

use std::{
    io::{Read, Write},
    sync::Arc,
};

use crate::{
    auth::{AuthError, AuthService, SignUp},
    config::BankConfig,
    coordinator::{BankError, BankingService, transfer_coordinator::TransferCoordinator},
};
use anyhow::Result;
use csv_parser::{CsvOperationParser, Operation, OperationKind};
use csv_printer::{AccountRow, print_accounts};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::info;

pub mod csv_parser;
pub mod csv_printer;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Malformed row: {0}")]
    Malformed(String),
    #[error(transparent)]
    Bank(#[from] BankError),
    #[error(transparent)]
    Auth(#[from] AuthError),
}

pub struct Service<'w, R, W: 'w> {
    pub input: R,
    pub output: &'w mut W,
    pub config: BankConfig,
    pub error_printer: Box<dyn FnMut(u64, ServiceError)>,
}

impl<'w, R, W> Service<'w, R, W>
where
    R: Read,
    W: Write + 'w,
{
    pub fn run(mut self) -> Result<()> {
        let parser = CsvOperationParser::new(self.input);

        let bank = TransferCoordinator::new(self.config);
        let auth = AuthService::new(Arc::clone(bank.store()));

        let mut processed = 0_usize;
        for (line, row) in parser {
            let outcome = row
                .map_err(|err| ServiceError::Malformed(err.to_string()))
                .and_then(|op| execute(&bank, &auth, op));
            if let Err(err) = outcome {
                (self.error_printer)(line, err);
            }
            processed += 1;
        }
        info!(processed, "batch finished");

        let rows = bank
            .store()
            .accounts()
            .all()
            .into_iter()
            .map(|acc| AccountRow {
                unread: bank.store().notifier().unread_count(acc.id().as_str()),
                account: acc.id().clone(),
                name: acc.name().to_owned(),
                balance: acc.balance(),
            });
        print_accounts(self.output, rows)
    }
}

fn execute(
    bank: &TransferCoordinator,
    auth: &AuthService,
    op: Operation,
) -> Result<(), ServiceError> {
    match op.kind {
        OperationKind::Open => {
            auth.sign_up(SignUp {
                id: &op.account,
                name: op.counterparty.as_deref().unwrap_or_default(),
                password: op.secret.as_deref().unwrap_or_default(),
                opening_balance: op.amount.unwrap_or(Decimal::ZERO),
            })?;
        }
        OperationKind::Transfer => {
            let (recipient, amount) = counterparty_and_amount(&op)?;
            bank.transfer(&op.account, recipient, amount)?;
        }
        OperationKind::Paybill => {
            let (biller, amount) = counterparty_and_amount(&op)?;
            bank.pay_bill(&op.account, biller, amount)?;
        }
        OperationKind::Read => {
            for notification in bank.list_notifications(&op.account)? {
                bank.mark_notification_read(&notification.id.to_string())?;
            }
        }
    }
    Ok(())
}

fn counterparty_and_amount(op: &Operation) -> Result<(&str, Decimal), ServiceError> {
    let counterparty = op
        .counterparty
        .as_deref()
        .ok_or_else(|| ServiceError::Malformed(format!("{:?} requires a counterparty", op.kind)))?;
    let amount = op
        .amount
        .ok_or_else(|| ServiceError::Malformed(format!("{:?} requires an amount", op.kind)))?;
    Ok((counterparty, amount))
}
