use std::{fmt, ops::Neg, str::FromStr};

use rust_decimal::{
    Decimal,
    prelude::{FromPrimitive, ToPrimitive},
};
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::account::AccountId;

/// Number of decimal places of the currency's minor unit.
pub const MINOR_UNIT_SCALE: u32 = 2;

/// Amount of money in integer minor units (cents). Signed, so it can carry
/// debits as well as credits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_minor_units(units: i64) -> Self {
        Self(units)
    }

    pub const fn minor_units(self) -> i64 {
        self.0
    }

    /// Converts a decimal amount, rejecting anything finer than a minor unit.
    pub fn from_decimal(amount: Decimal) -> Result<Self, CommandError> {
        let normalized = amount.normalize();
        if normalized.scale() > MINOR_UNIT_SCALE {
            return Err(CommandError::TooPrecise { amount });
        }
        normalized
            .checked_mul(Decimal::from(10_i64.pow(MINOR_UNIT_SCALE)))
            .and_then(|units| units.to_i64())
            .map(Self)
            .ok_or(CommandError::OutOfRange {
                amount: amount.to_string(),
            })
    }

    pub fn from_f64(amount: f64) -> Result<Self, CommandError> {
        if !amount.is_finite() {
            return Err(CommandError::NotFinite);
        }
        let decimal = Decimal::from_f64(amount).ok_or_else(|| CommandError::OutOfRange {
            amount: amount.to_string(),
        })?;
        Self::from_decimal(decimal)
    }

    pub fn parse(input: &str) -> Result<Self, CommandError> {
        let trimmed = input.trim();
        let decimal = Decimal::from_str(trimmed).map_err(|_| CommandError::Unparseable {
            input: trimmed.to_owned(),
        })?;
        Self::from_decimal(decimal)
    }

    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.0, MINOR_UNIT_SCALE)
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.to_decimal(), f)
    }
}

impl Serialize for Money {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        Serialize::serialize(&self.to_decimal(), serializer)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("Amount must be positive, got {amount}")]
    NonPositiveAmount { amount: Decimal },
    #[error("Amount {amount} has more than two decimal places")]
    TooPrecise { amount: Decimal },
    #[error("Amount must be a finite number")]
    NotFinite,
    #[error("`{input}` is not a valid amount")]
    Unparseable { input: String },
    #[error("Amount {amount} is out of range")]
    OutOfRange { amount: String },
    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },
    #[error("Sender and recipient must be different accounts")]
    SelfTransfer,
    #[error("Account `{account}` already exists")]
    AccountExists { account: AccountId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferCommand {
    pub sender: AccountId,
    pub recipient: AccountId,
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillPaymentCommand {
    pub payer: AccountId,
    pub biller: String,
    pub amount: Money,
}

impl TransferCommand {
    pub fn parse(sender: &str, recipient: &str, amount: Decimal) -> Result<Self, CommandError> {
        let sender = parse_account_id(sender, "Sender")?;
        let recipient = parse_account_id(recipient, "Recipient")?;
        if sender == recipient {
            return Err(CommandError::SelfTransfer);
        }
        Ok(Self {
            sender,
            recipient,
            amount: parse_positive_amount(amount)?,
        })
    }
}

impl BillPaymentCommand {
    pub fn parse(payer: &str, biller: &str, amount: Decimal) -> Result<Self, CommandError> {
        let payer = parse_account_id(payer, "Account")?;
        let biller = biller.trim();
        if biller.is_empty() {
            return Err(CommandError::EmptyField { field: "Biller" });
        }
        Ok(Self {
            payer,
            biller: biller.to_owned(),
            amount: parse_positive_amount(amount)?,
        })
    }
}

pub fn parse_account_id(id: &str, field: &'static str) -> Result<AccountId, CommandError> {
    if id.trim().is_empty() {
        Err(CommandError::EmptyField { field })
    } else {
        Ok(AccountId::new(id))
    }
}

/// Value-moving amounts must be strictly positive and representable in minor units.
pub fn parse_positive_amount(amount: Decimal) -> Result<Money, CommandError> {
    if amount.is_zero() || amount.is_sign_negative() {
        return Err(CommandError::NonPositiveAmount { amount });
    }
    Money::from_decimal(amount)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn money_from_decimal() {
        assert_eq!(
            Money::from_decimal(dec("5000.00")).unwrap(),
            Money::from_minor_units(500_000)
        );
        assert_eq!(
            Money::from_decimal(dec("0.1")).unwrap(),
            Money::from_minor_units(10)
        );
        // trailing zeros are not extra precision
        assert_eq!(
            Money::from_decimal(dec("1.5000")).unwrap(),
            Money::from_minor_units(150)
        );
        assert!(matches!(
            Money::from_decimal(dec("0.001")),
            Err(CommandError::TooPrecise { .. })
        ));
    }

    #[test]
    fn money_display() {
        assert_eq!(Money::from_minor_units(300_000).to_string(), "3000.00");
        assert_eq!(Money::from_minor_units(-15_000).to_string(), "-150.00");
        assert_eq!(Money::from_minor_units(5).to_string(), "0.05");
    }

    #[test]
    fn money_serializes_as_decimal() {
        assert_eq!(
            serde_json::to_string(&Money::from_minor_units(279_975)).unwrap(),
            r#""2799.75""#
        );
        assert_eq!(
            serde_json::to_string(&Money::from_minor_units(-5)).unwrap(),
            r#""-0.05""#
        );
    }

    #[test]
    fn money_rejects_non_finite_and_garbage() {
        assert_eq!(Money::from_f64(f64::NAN), Err(CommandError::NotFinite));
        assert_eq!(Money::from_f64(f64::INFINITY), Err(CommandError::NotFinite));
        assert_eq!(Money::from_f64(f64::NEG_INFINITY), Err(CommandError::NotFinite));
        assert_eq!(Money::from_f64(20.25), Ok(Money::from_minor_units(2_025)));
        assert!(matches!(
            Money::parse("NaN"),
            Err(CommandError::Unparseable { .. })
        ));
        assert!(matches!(
            Money::parse("twelve"),
            Err(CommandError::Unparseable { .. })
        ));
        assert_eq!(Money::parse(" 42.10 "), Ok(Money::from_minor_units(4_210)));
    }

    #[test]
    fn parse_transfer_command() {
        let cmd = TransferCommand::parse("a@test.com", "b@test.com", dec("20.00")).unwrap();
        assert_eq!(cmd.sender, AccountId::new("a@test.com"));
        assert_eq!(cmd.recipient, AccountId::new("b@test.com"));
        assert_eq!(cmd.amount, Money::from_minor_units(2_000));

        let err = TransferCommand::parse("a@test.com", "b@test.com", dec("-5")).unwrap_err();
        assert_eq!(err, CommandError::NonPositiveAmount { amount: dec("-5") });
        assert_eq!(err.to_string(), "Amount must be positive, got -5");

        assert!(matches!(
            TransferCommand::parse("a@test.com", "b@test.com", Decimal::ZERO),
            Err(CommandError::NonPositiveAmount { .. })
        ));
        assert_eq!(
            TransferCommand::parse("a@test.com", "a@test.com", dec("1")),
            Err(CommandError::SelfTransfer)
        );
        assert_eq!(
            TransferCommand::parse(" ", "a@test.com", dec("1")),
            Err(CommandError::EmptyField { field: "Sender" })
        );
    }

    #[test]
    fn parse_bill_payment_command() {
        let cmd = BillPaymentCommand::parse("a@test.com", " Electric Co ", dec("150")).unwrap();
        assert_eq!(cmd.biller, "Electric Co");
        assert_eq!(cmd.amount, Money::from_minor_units(15_000));

        assert_eq!(
            BillPaymentCommand::parse("a@test.com", "", dec("150")),
            Err(CommandError::EmptyField { field: "Biller" })
        );
        assert!(matches!(
            BillPaymentCommand::parse("a@test.com", "Water", dec("1.234")),
            Err(CommandError::TooPrecise { .. })
        ));
    }
}
