//! # Domain Invariants
//!
//! Rules that must always hold between persisted records, plus the numeric
//! constants shared by the decoder and the controller.

use super::entities::{CredentialRecord, SessionRecord};
use super::errors::{DomainErrorCode, WalletError};

/// Fractional digits of token amounts.
pub const AMOUNT_DECIMALS: u32 = 7;

/// Base units per whole token (10^7).
pub const AMOUNT_SCALE: u128 = 10_000_000;

/// Default session lifetime in seconds (7 days).
pub const DEFAULT_SESSION_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Marker the ledger puts in errors about wallets that were never deployed.
pub const UNDEPLOYED_CONTRACT_MARKER: &str = "MissingValue";

/// Invariant: a session and its credential record name the same wallet.
pub fn invariant_session_matches_credential(
    session: &SessionRecord,
    credential: &CredentialRecord,
) -> bool {
    session.credential_id == credential.credential_id
        && session.contract_id == credential.contract_id
}

/// Invariant: transfers only run with a connected wallet.
pub fn invariant_connected(session: Option<&SessionRecord>) -> Result<&SessionRecord, WalletError> {
    session.ok_or_else(|| {
        WalletError::validation(
            DomainErrorCode::WalletNotConnected,
            "No wallet is connected",
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_session_matches_credential() {
        let now = Utc::now();
        let credential = CredentialRecord::new("cred", "CA", vec![9], "Alice", now);
        let mut session = SessionRecord {
            contract_id: "CA".to_string(),
            credential_id: "cred".to_string(),
            expires_at: now,
        };
        assert!(invariant_session_matches_credential(&session, &credential));

        session.contract_id = "CB".to_string();
        assert!(!invariant_session_matches_credential(&session, &credential));
    }

    #[test]
    fn test_connected_invariant() {
        let err = invariant_connected(None).unwrap_err();
        assert!(matches!(
            err,
            WalletError::DomainValidation {
                code: DomainErrorCode::WalletNotConnected,
                ..
            }
        ));
    }

    #[test]
    fn test_scale_matches_decimals() {
        assert_eq!(AMOUNT_SCALE, 10u128.pow(AMOUNT_DECIMALS));
    }
}
