use std::io::Write;

use anyhow::Context;
use csv::Writer;
use serde::Serialize;

use crate::{account::AccountId, command::Money};

#[derive(Debug, Serialize)]
pub struct AccountRow {
    pub account: AccountId,
    pub name: String,
    pub balance: Money,
    pub unread: usize,
}

/// Writes one row per account, header first.
pub fn print_accounts<W>(
    output: &mut W,
    rows: impl IntoIterator<Item = AccountRow>,
) -> anyhow::Result<()>
where
    W: Write,
{
    let mut writer = Writer::from_writer(output);
    for row in rows {
        writer
            .serialize(&row)
            .with_context(|| format!("Failed to write account `{}`", row.account))?;
    }
    writer.flush().context("Failed to flush account CSV")
}
