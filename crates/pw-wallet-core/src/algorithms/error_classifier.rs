//! # Error Classifier
//!
//! Maps any [`WalletError`] to the one message the user sees. Pure and total;
//! rules are checked in order and the first match wins.

use crate::domain::{CredentialErrorCode, DomainErrorCode, WalletError, UNDEPLOYED_CONTRACT_MARKER};

/// Shown when the user backs out of a passkey prompt.
pub const MSG_CANCELLED: &str = "Passkey request was cancelled.";
/// Provider-side ceremony timeout.
pub const MSG_PROVIDER_TIMEOUT: &str = "The passkey prompt timed out. Please try again.";
/// App / relying party association is broken.
pub const MSG_RP_ID: &str =
    "This app is not configured for passkeys on this domain. Check the relying party configuration.";
/// No credential manager on the device.
pub const MSG_PROVIDER_CONFIG: &str =
    "No passkey provider is set up on this device. Enable a password manager in device settings.";
/// Device cannot do passkeys.
pub const MSG_UNSUPPORTED: &str = "Passkeys are not supported on this device.";
/// Bad recipient or token address.
pub const MSG_INVALID_ADDRESS: &str = "Enter a valid recipient address.";
/// Bad amount.
pub const MSG_INVALID_AMOUNT: &str =
    "Enter a positive amount with at most 7 decimal places.";
/// Operation needs a session.
pub const MSG_NOT_CONNECTED: &str = "Connect a wallet first.";
/// Submitted but unconfirmed.
pub const MSG_CONFIRMATION_TIMEOUT: &str =
    "The transaction was submitted but not confirmed in time. Check its status before retrying.";
/// Wallet contract missing on the ledger.
pub const MSG_UNDEPLOYED: &str =
    "No wallet contract is deployed for this passkey. Create a new wallet to continue.";
/// Empty fallback.
pub const MSG_UNKNOWN: &str = "Unknown error";

/// Classify `error` raised while running the call labelled `label`.
pub fn classify(label: &str, error: &WalletError) -> String {
    if let WalletError::Timeout { .. } = error {
        return timeout_guidance(label).to_string();
    }

    if let WalletError::CredentialProvider { code, message } = error {
        if let Some(text) = credential_guidance(*code, message) {
            return text;
        }
    }

    if let WalletError::DomainValidation { code, .. } = error {
        return validation_guidance(*code).to_string();
    }

    let raw = error.raw_message();
    if raw.contains(UNDEPLOYED_CONTRACT_MARKER) {
        return MSG_UNDEPLOYED.to_string();
    }

    if raw.trim().is_empty() {
        MSG_UNKNOWN.to_string()
    } else {
        raw
    }
}

fn timeout_guidance(label: &str) -> &'static str {
    match label {
        "restore" => "Restoring your session took too long. Connect your wallet to continue.",
        "reauth" => "Re-authentication took too long. Connect your wallet again.",
        "create" => "Creating the wallet took too long. Check your connection and try again.",
        "connect" => "Connecting took too long. Check your connection and try again.",
        "transfer" => {
            "The transfer took too long to complete. Check your balance before retrying."
        }
        "disconnect" => {
            "Disconnect took longer than expected; you have been signed out on this device."
        }
        "balance" => "Fetching the balance took too long. Pull to refresh.",
        "storage" => "Device storage is not responding. Changes are kept for this session only.",
        _ => "The request took too long. Please try again.",
    }
}

fn credential_guidance(code: CredentialErrorCode, message: &str) -> Option<String> {
    let text = match code {
        CredentialErrorCode::Cancelled
        | CredentialErrorCode::NoCredential
        | CredentialErrorCode::Interrupted
        | CredentialErrorCode::NoActivity => MSG_CANCELLED,
        CredentialErrorCode::Timeout => MSG_PROVIDER_TIMEOUT,
        CredentialErrorCode::RpIdValidation => MSG_RP_ID,
        CredentialErrorCode::ProviderConfig => MSG_PROVIDER_CONFIG,
        CredentialErrorCode::UnsupportedError => MSG_UNSUPPORTED,
        CredentialErrorCode::InvalidInput => return Some(message.to_string()),
        CredentialErrorCode::UnknownError | CredentialErrorCode::PlatformError => return None,
    };
    Some(text.to_string())
}

fn validation_guidance(code: DomainErrorCode) -> &'static str {
    match code {
        DomainErrorCode::InvalidAddress => MSG_INVALID_ADDRESS,
        DomainErrorCode::InvalidAmount => MSG_INVALID_AMOUNT,
        DomainErrorCode::WalletNotConnected => MSG_NOT_CONNECTED,
        DomainErrorCode::TransactionConfirmationTimeout => MSG_CONFIRMATION_TIMEOUT,
    }
}
