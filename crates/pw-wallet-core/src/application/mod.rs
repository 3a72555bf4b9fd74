//! # Application Module
//!
//! Application service orchestrating the wallet operations.

pub mod service;

pub use service::{WalletSessionController, BALANCE_LABEL};
