//! # PW Wallet Core
//!
//! Resilient wallet operation layer for a passkey-controlled smart wallet.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! Turn unreliable primitives (passkey ceremonies, a remote ledger RPC
//! endpoint, on-device persistence) into a small set of operations with
//! bounded latency, one user-facing message per failure, and a session that
//! survives restarts.
//!
//! | Concern | Mechanism |
//! |---------|-----------|
//! | Bounded latency | Every external call runs under a per-operation budget |
//! | Storage failures | One-way fallback from the device store to memory |
//! | Failure reporting | A single total classifier maps errors to messages |
//! | Late results | A generation counter fences stale completions |
//!
//! ## Module Structure
//!
//! ```text
//! pw-wallet-core/
//! ├── domain/          # Records, controller state, errors, invariants
//! ├── algorithms/      # Timeout guard, codec, balance decoder, classifier
//! ├── ports/           # WalletApi (inbound) + provider/store/ledger traits (outbound)
//! ├── adapters/        # In-memory and file stores, resilient storage facade
//! ├── application/     # WalletSessionController
//! └── config.rs        # WalletConfig, TimeoutBudgets
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

// Re-exports
pub use adapters::{FileKeyValueStore, InMemoryKeyValueStore, ResilientStorage, StorageKeys};
pub use algorithms::{
    classify, classify_query_failure, decode_balance, format_base_units, guard, parse_amount,
    validate_address,
};
pub use application::WalletSessionController;
pub use config::{TimeoutBudgets, WalletConfig};
pub use domain::{
    BalanceResult, ConnectOptions, ControllerPhase, CredentialErrorCode, CredentialRecord,
    CredentialUpdate, DomainErrorCode, Operation, OperationOutcome, QueryOutcome, SessionRecord,
    SessionSnapshot, SessionView, StorageMode, TransferRequest, TransferResult, WalletError,
    WireValue,
};
pub use ports::{
    CredentialProvider, KeyValueStore, LedgerRpc, SystemTimeSource, TimeSource, WalletApi,
    FixedTimeSource, FlakyKeyValueStore, MockCredentialProvider, MockLedger,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}
