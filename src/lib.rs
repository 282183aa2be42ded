/// Accounts and the balance rules they enforce.
/// Balances change only by applying changes that were validated first.
pub mod account;

/// Money in minor units, plus validated transfer and bill payment commands.
pub mod command;

/// Timeouts and retry bounds, loadable from JSON.
pub mod config;

/// Account store, ledger and notifier, tied together by the unit of work
/// that commits or aborts changes across all three at once.
pub mod store;

/// The banking service interface and the transfer coordinator implementing it.
///
/// NOTE: every value-moving operation runs as one unit of work over the store,
/// retried a bounded number of times when it loses a lease race.
pub mod coordinator;

/// Account provisioning and salted credential checks.
pub mod auth;

/// Batch driver over CSV input. It lives here rather than in the binary so
/// the integration tests can use it too.
pub mod bin_utils;
