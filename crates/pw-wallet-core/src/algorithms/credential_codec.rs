//! # Credential Codec
//!
//! Public key bytes to storage-safe text and back (standard base64, padded).

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::domain::WalletError;

/// Encode raw key bytes.
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode text produced by [`encode`].
pub fn decode(text: &str) -> Result<Vec<u8>, WalletError> {
    STANDARD
        .decode(text)
        .map_err(|e| WalletError::Codec(format!("invalid base64 key material: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_known_vector() {
        assert_eq!(encode(b"passkey"), "cGFzc2tleQ==");
        assert_eq!(decode("cGFzc2tleQ==").unwrap(), b"passkey".to_vec());
    }

    #[test]
    fn test_empty() {
        assert_eq!(encode(&[]), "");
        assert!(decode("").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_input_is_codec_error() {
        assert!(matches!(decode("not base64!!"), Err(WalletError::Codec(_))));
        assert!(matches!(decode(" cGFzc2tleQ==\n"), Err(WalletError::Codec(_))));
    }

    proptest! {
        #[test]
        fn prop_round_trip(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
            prop_assert_eq!(decode(&encode(&bytes)).unwrap(), bytes);
        }
    }
}
