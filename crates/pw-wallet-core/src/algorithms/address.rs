//! # Address Validation
//!
//! Ledger addresses are strkeys: 56-character base32 strings carrying a
//! version byte, a 32-byte payload and a CRC16 checksum. `G…` addresses are
//! accounts, `C…` addresses are contracts. Parsing is delegated to
//! `stellar-strkey`.

use stellar_strkey::{ed25519, Contract, Strkey};

use crate::domain::{DomainErrorCode, WalletError};

/// Address kinds accepted by the wallet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressKind {
    /// Classic account (`G…`).
    Account,
    /// Contract (`C…`).
    Contract,
}

/// Encode a 32-byte payload as an address.
pub fn encode_address(kind: AddressKind, payload: &[u8; 32]) -> String {
    match kind {
        AddressKind::Account => ed25519::PublicKey(*payload).to_string(),
        AddressKind::Contract => Contract(*payload).to_string(),
    }
}

/// Kind of a well-formed address, or `None`. Other strkey types (secret
/// seeds, muxed accounts, hashes) are not wallet addresses.
pub fn address_kind(address: &str) -> Option<AddressKind> {
    match Strkey::from_string(address).ok()? {
        Strkey::PublicKeyEd25519(_) => Some(AddressKind::Account),
        Strkey::Contract(_) => Some(AddressKind::Contract),
        _ => None,
    }
}

/// Reject anything that is not an account or contract address.
pub fn validate_address(address: &str) -> Result<AddressKind, WalletError> {
    address_kind(address.trim()).ok_or_else(|| {
        WalletError::validation(
            DomainErrorCode::InvalidAddress,
            format!("'{address}' is not a valid account or contract address"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCOUNT: &str = "GAAZI4TCR3TY5OJHCTJC2A4QSY6CJWJH5IAJTGKIN2ER7LBNVKOCCWN7";

    #[test]
    fn test_known_account_is_valid() {
        assert_eq!(address_kind(ACCOUNT), Some(AddressKind::Account));
    }

    #[test]
    fn test_encode_known_vectors() {
        assert_eq!(
            encode_address(AddressKind::Account, &[0u8; 32]),
            "GAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAWHF"
        );
        assert_eq!(
            encode_address(AddressKind::Contract, &[7u8; 32]),
            "CADQOBYHA4DQOBYHA4DQOBYHA4DQOBYHA4DQOBYHA4DQOBYHA4DQP5KR"
        );
    }

    #[test]
    fn test_default_native_token_is_a_contract() {
        assert_eq!(
            address_kind(crate::config::DEFAULT_NATIVE_TOKEN),
            Some(AddressKind::Contract)
        );
    }

    #[test]
    fn test_contract_round_trip_kind() {
        let address = encode_address(AddressKind::Contract, &[42u8; 32]);
        assert!(address.starts_with('C'));
        assert_eq!(validate_address(&address).unwrap(), AddressKind::Contract);
    }

    #[test]
    fn test_rejects_bad_checksum_and_shape() {
        let mut corrupted = ACCOUNT.to_string();
        corrupted.replace_range(10..11, "B");
        assert_eq!(address_kind(&corrupted), None);
        assert_eq!(address_kind("GABC"), None);
        assert_eq!(address_kind(&ACCOUNT.to_lowercase()), None);
        // Secret seeds are valid strkeys but not addresses.
        let seed = stellar_strkey::ed25519::PrivateKey([1u8; 32]).to_string();
        assert_eq!(address_kind(&seed), None);
        assert!(matches!(
            validate_address("not-an-address"),
            Err(WalletError::DomainValidation {
                code: DomainErrorCode::InvalidAddress,
                ..
            })
        ));
    }
}
