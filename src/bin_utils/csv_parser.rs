use std::io::Read;

use csv::{DeserializeRecordsIntoIter, Trim};
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// `account` = email, `counterparty` = display name, `amount` = opening balance
    Open,
    /// `account` = sender, `counterparty` = recipient
    Transfer,
    /// `account` = payer, `counterparty` = biller
    Paybill,
    /// marks every notification of `account` as read
    Read,
}

#[derive(Debug, Deserialize)]
pub struct Operation {
    #[serde(rename = "op")]
    pub kind: OperationKind,
    pub account: String,
    pub counterparty: Option<String>,
    pub amount: Option<Decimal>,
    pub secret: Option<String>,
}

/// Parses an operation list in CSV format.
///
/// Malformed rows are yielded as errors together with their line number so
/// the caller can report them and carry on.
pub struct CsvOperationParser<R> {
    iter: DeserializeRecordsIntoIter<R, Operation>,
}

impl<R> CsvOperationParser<R>
where
    R: Read,
{
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(source);

        Self {
            iter: reader.into_deserialize(),
        }
    }
}

impl<R> Iterator for CsvOperationParser<R>
where
    R: Read,
{
    type Item = (u64, Result<Operation, csv::Error>);

    fn next(&mut self) -> Option<Self::Item> {
        let curr_line = self.iter.reader().position().line();
        self.iter.next().map(|row| (curr_line, row))
    }
}
