//! # Algorithms Module
//!
//! Pure building blocks used by the session controller.

pub mod address;
pub mod balance_decoder;
pub mod credential_codec;
pub mod error_classifier;
pub mod timeout_guard;

pub use address::{address_kind, encode_address, validate_address, AddressKind};
pub use balance_decoder::{classify_query_failure, decode_balance, format_base_units, parse_amount};
pub use error_classifier::classify;
pub use timeout_guard::guard;
