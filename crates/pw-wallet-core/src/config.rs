//! # Wallet Configuration
//!
//! Relying party, network and storage settings plus the per-operation
//! timeout budgets.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::domain::{Operation, DEFAULT_SESSION_TTL_SECS};

/// Native token contract on the public test network.
pub const DEFAULT_NATIVE_TOKEN: &str = "CDLZFC3SYJYDZT7K67VZ75HPJVIEUVNIXF47ZG2FB2RMQQVU2HHGCYSC";

/// Test network passphrase.
pub const DEFAULT_NETWORK_PASSPHRASE: &str = "Test SDF Network ; September 2015";

/// Budgets for every guarded call, in milliseconds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutBudgets {
    /// Silent startup restore.
    pub restore_ms: u64,
    /// Re-authentication of an expired session.
    pub reauth_ms: u64,
    /// Registration, deployment and funding.
    pub create_ms: u64,
    /// Interactive connect.
    pub connect_ms: u64,
    /// Signing and submission.
    pub transfer_ms: u64,
    /// Wallet release on sign-out.
    pub disconnect_ms: u64,
    /// Balance read.
    pub balance_ms: u64,
    /// Each persistent storage call.
    pub storage_ms: u64,
}

impl Default for TimeoutBudgets {
    fn default() -> Self {
        Self {
            restore_ms: 10_000,
            reauth_ms: 30_000,
            create_ms: 90_000,
            connect_ms: 45_000,
            transfer_ms: 60_000,
            disconnect_ms: 10_000,
            balance_ms: 15_000,
            storage_ms: 8_000,
        }
    }
}

impl TimeoutBudgets {
    /// Budget for an operation.
    pub fn for_operation(&self, operation: Operation) -> Duration {
        let ms = match operation {
            Operation::Restore => self.restore_ms,
            Operation::Reauth => self.reauth_ms,
            Operation::Create => self.create_ms,
            Operation::Connect => self.connect_ms,
            Operation::Transfer => self.transfer_ms,
            Operation::Disconnect => self.disconnect_ms,
        };
        Duration::from_millis(ms)
    }

    /// Budget for a balance read.
    pub fn balance(&self) -> Duration {
        Duration::from_millis(self.balance_ms)
    }

    /// Budget for one storage call.
    pub fn storage(&self) -> Duration {
        Duration::from_millis(self.storage_ms)
    }
}

/// Wallet layer configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Namespace for every storage key.
    pub storage_prefix: String,

    /// Relying party id passkeys are bound to.
    pub rp_id: String,

    /// Relying party display name.
    pub rp_name: String,

    /// Network passphrase mixed into transfer challenges.
    pub network_passphrase: String,

    /// Token contract whose balance is shown.
    pub native_token_contract: String,

    /// Lifetime of a new session.
    pub session_ttl_secs: u64,

    /// Fund freshly deployed wallets from the network faucet.
    pub fund_on_create: bool,

    /// Refresh the balance in the background after each successful operation.
    pub refresh_balance_after_operations: bool,

    /// Directory for the file-backed store.
    pub data_dir: PathBuf,

    /// Per-call budgets.
    pub timeouts: TimeoutBudgets,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            storage_prefix: "passkey-wallet".to_string(),
            rp_id: "localhost".to_string(),
            rp_name: "Passkey Wallet".to_string(),
            network_passphrase: DEFAULT_NETWORK_PASSPHRASE.to_string(),
            native_token_contract: DEFAULT_NATIVE_TOKEN.to_string(),
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            fund_on_create: true,
            refresh_balance_after_operations: true,
            data_dir: PathBuf::from(".passkey-wallet"),
            timeouts: TimeoutBudgets::default(),
        }
    }
}

impl WalletConfig {
    /// Create a config for testing (no funding, no background refresh).
    pub fn for_testing() -> Self {
        Self {
            storage_prefix: "pw-test".to_string(),
            fund_on_create: false,
            refresh_balance_after_operations: false,
            data_dir: env::temp_dir().join("pw-test"),
            ..Self::default()
        }
    }

    /// Create configuration from environment variables, falling back to
    /// [`WalletConfig::default`] for anything unset or unparsable.
    ///
    /// - `PW_STORAGE_PREFIX`, `PW_RP_ID`, `PW_RP_NAME`
    /// - `PW_NETWORK_PASSPHRASE`, `PW_NATIVE_TOKEN`
    /// - `PW_SESSION_TTL_SECS`, `PW_FUND_ON_CREATE`, `PW_DATA_DIR`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            storage_prefix: env::var("PW_STORAGE_PREFIX").unwrap_or(defaults.storage_prefix),
            rp_id: env::var("PW_RP_ID").unwrap_or(defaults.rp_id),
            rp_name: env::var("PW_RP_NAME").unwrap_or(defaults.rp_name),
            network_passphrase: env::var("PW_NETWORK_PASSPHRASE")
                .unwrap_or(defaults.network_passphrase),
            native_token_contract: env::var("PW_NATIVE_TOKEN")
                .unwrap_or(defaults.native_token_contract),
            session_ttl_secs: env::var("PW_SESSION_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.session_ttl_secs),
            fund_on_create: env::var("PW_FUND_ON_CREATE")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(defaults.fund_on_create),
            data_dir: env::var("PW_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            ..defaults
        }
    }

    /// Session lifetime as a chrono duration.
    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.session_ttl_secs.min(i64::MAX as u64) as i64)
    }

    /// Path of the file-backed store.
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.json", self.storage_prefix))
    }
}
