use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    account::{Account, AccountId},
    command::{CommandError, Money, parse_account_id},
    store::{BankStore, StoreError},
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error(transparent)]
    Invalid(#[from] CommandError),
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateAccount(account) => {
                AuthError::Invalid(CommandError::AccountExists { account })
            }
            err => AuthError::Store(err),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SignUp<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub password: &'a str,
    pub opening_balance: Decimal,
}

struct Credential {
    salt: String,
    hash: String,
}

impl Credential {
    fn new(password: &str) -> Self {
        let salt = Uuid::new_v4().simple().to_string();
        let hash = digest(&salt, password);
        Self { salt, hash }
    }

    fn matches(&self, password: &str) -> bool {
        constant_time_eq(self.hash.as_bytes(), digest(&self.salt, password).as_bytes())
    }
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Account provisioning and credential checks.
///
/// Sits beside the transfer core: it creates accounts in the shared
/// [`BankStore`] and never touches balances afterwards.
pub struct AuthService {
    store: Arc<BankStore>,
    credentials: RwLock<HashMap<AccountId, Credential>>,
}

impl AuthService {
    pub fn new(store: Arc<BankStore>) -> Self {
        Self {
            store,
            credentials: RwLock::new(HashMap::new()),
        }
    }

    pub fn sign_up(&self, request: SignUp<'_>) -> Result<Account, AuthError> {
        let id = parse_account_id(request.id, "Email")?;
        let name = request.name.trim();
        if name.is_empty() {
            return Err(CommandError::EmptyField { field: "Name" }.into());
        }
        if request.password.is_empty() {
            return Err(CommandError::EmptyField { field: "Password" }.into());
        }
        if request.opening_balance < Decimal::ZERO {
            return Err(CommandError::NonPositiveAmount {
                amount: request.opening_balance,
            }
            .into());
        }
        let balance = Money::from_decimal(request.opening_balance)?;

        let account = Account::new(id.clone(), name, balance);
        self.store.ensure_online()?;
        // hold the credential map across the insert so a concurrent sign-up
        // for the same id cannot leave a credential without an account
        let mut credentials = self.credentials.write();
        self.store.accounts().insert(account.clone())?;
        credentials.insert(id, Credential::new(request.password));
        info!(account = %account.id(), "account opened");
        Ok(account)
    }

    /// Unknown ids and wrong passwords fail the same way.
    pub fn login(&self, id: &str, password: &str) -> Result<Account, AuthError> {
        let verified = self
            .credentials
            .read()
            .get(id)
            .is_some_and(|credential| credential.matches(password));
        if !verified {
            debug!(account = id, "login rejected");
            return Err(AuthError::InvalidCredentials);
        }
        self.store
            .read(|store| store.accounts().get(id))?
            .ok_or(AuthError::InvalidCredentials)
    }
}
