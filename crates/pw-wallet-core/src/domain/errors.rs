//! # Domain Errors
//!
//! The closed failure taxonomy of the wallet operation layer. Every failure a
//! collaborator can produce is normalised into one [`WalletError`] variant
//! before it reaches the session controller.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error codes reported by the credential (passkey) provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CredentialErrorCode {
    /// Provider failed without a more specific code.
    UnknownError,
    /// User cancelled the ceremony.
    Cancelled,
    /// OS / platform authenticator failure.
    PlatformError,
    /// Passkeys are not supported on this device.
    UnsupportedError,
    /// Provider-side ceremony timeout.
    Timeout,
    /// No matching credential on the device.
    NoCredential,
    /// The request options were rejected.
    InvalidInput,
    /// The app is not associated with the relying party id.
    #[serde(rename = "RPID_VALIDATION_ERROR")]
    RpIdValidation,
    /// No credential provider / password manager configured.
    #[serde(rename = "PROVIDER_CONFIG_ERROR")]
    ProviderConfig,
    /// Ceremony interrupted (app backgrounded, sheet dismissed).
    Interrupted,
    /// The user did not interact with the prompt.
    NoActivity,
}

impl CredentialErrorCode {
    /// Wire representation used by native credential providers.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownError => "UNKNOWN_ERROR",
            Self::Cancelled => "CANCELLED",
            Self::PlatformError => "PLATFORM_ERROR",
            Self::UnsupportedError => "UNSUPPORTED_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::NoCredential => "NO_CREDENTIAL",
            Self::InvalidInput => "INVALID_INPUT",
            Self::RpIdValidation => "RPID_VALIDATION_ERROR",
            Self::ProviderConfig => "PROVIDER_CONFIG_ERROR",
            Self::Interrupted => "INTERRUPTED",
            Self::NoActivity => "NO_ACTIVITY",
        }
    }

    /// Parse a provider code. Unrecognised codes map to `UnknownError`.
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_uppercase().as_str() {
            "CANCELLED" | "CANCELED" => Self::Cancelled,
            "PLATFORM_ERROR" => Self::PlatformError,
            "UNSUPPORTED_ERROR" => Self::UnsupportedError,
            "TIMEOUT" => Self::Timeout,
            "NO_CREDENTIAL" | "NO_CREDENTIALS" => Self::NoCredential,
            "INVALID_INPUT" => Self::InvalidInput,
            "RPID_VALIDATION_ERROR" => Self::RpIdValidation,
            "PROVIDER_CONFIG_ERROR" => Self::ProviderConfig,
            "INTERRUPTED" => Self::Interrupted,
            "NO_ACTIVITY" => Self::NoActivity,
            _ => Self::UnknownError,
        }
    }
}

impl fmt::Display for CredentialErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation failures raised by the wallet layer itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DomainErrorCode {
    /// Recipient or token address is malformed.
    InvalidAddress,
    /// Amount is not a positive decimal with at most 7 fractional digits.
    InvalidAmount,
    /// Operation requires a connected wallet.
    WalletNotConnected,
    /// Transaction was submitted but not confirmed in time.
    TransactionConfirmationTimeout,
}

impl DomainErrorCode {
    /// Stable code string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidAddress => "INVALID_ADDRESS",
            Self::InvalidAmount => "INVALID_AMOUNT",
            Self::WalletNotConnected => "WALLET_NOT_CONNECTED",
            Self::TransactionConfirmationTimeout => "TRANSACTION_CONFIRMATION_TIMEOUT",
        }
    }
}

impl fmt::Display for DomainErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wallet layer error types.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum WalletError {
    /// A guarded call did not settle within its budget.
    #[error("{label} timed out after {timeout_ms}ms")]
    Timeout {
        /// Label of the guarded call (operation name)
        label: String,
        /// Budget that elapsed
        timeout_ms: u64,
    },

    /// The credential provider rejected or failed a ceremony.
    #[error("Credential provider error ({code}): {message}")]
    CredentialProvider {
        /// Provider error code
        code: CredentialErrorCode,
        /// Provider message
        message: String,
    },

    /// Input or state failed wallet-level validation.
    #[error("Validation failed ({code}): {message}")]
    DomainValidation {
        /// Validation code
        code: DomainErrorCode,
        /// Details
        message: String,
    },

    /// Stored text could not be decoded back into bytes.
    #[error("Codec error: {0}")]
    Codec(String),

    /// A ledger value carried a tag the balance decoder does not handle.
    #[error("Unexpected value type: {0}")]
    UnexpectedValueType(String),

    /// The persistent key-value store failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The ledger RPC endpoint failed.
    #[error("Ledger error: {0}")]
    Ledger(String),

    /// Anything else (task panics, invariant breaches).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WalletError {
    /// Shorthand for a credential-provider failure.
    pub fn credential(code: CredentialErrorCode, message: impl Into<String>) -> Self {
        Self::CredentialProvider {
            code,
            message: message.into(),
        }
    }

    /// Shorthand for a validation failure.
    pub fn validation(code: DomainErrorCode, message: impl Into<String>) -> Self {
        Self::DomainValidation {
            code,
            message: message.into(),
        }
    }

    /// The underlying message without the variant prefix.
    pub fn raw_message(&self) -> String {
        match self {
            Self::Timeout { .. } => self.to_string(),
            Self::CredentialProvider { message, .. } | Self::DomainValidation { message, .. } => {
                message.clone()
            }
            Self::Codec(m)
            | Self::UnexpectedValueType(m)
            | Self::Storage(m)
            | Self::Ledger(m)
            | Self::Internal(m) => m.clone(),
        }
    }

    /// Metrics label for this failure.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::CredentialProvider { .. } => "credential",
            Self::DomainValidation { .. } => "validation",
            Self::Codec(_) => "codec",
            Self::UnexpectedValueType(_) => "value_type",
            Self::Storage(_) => "storage",
            Self::Ledger(_) => "ledger",
            Self::Internal(_) => "internal",
        }
    }
}
