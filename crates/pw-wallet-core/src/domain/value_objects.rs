//! # Domain Value Objects
//!
//! Messages exchanged with the credential provider and the ledger.

use serde::{Deserialize, Serialize};

/// Tagged ledger value as returned by a contract read.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireValue {
    /// Signed 128-bit integer split in two words.
    I128 {
        /// High word (carries the sign).
        hi: i64,
        /// Low word.
        lo: u64,
    },
    /// Unsigned 128-bit integer split in two words.
    U128 {
        /// High word.
        hi: u64,
        /// Low word.
        lo: u64,
    },
    /// Signed 64-bit.
    I64(i64),
    /// Unsigned 64-bit.
    U64(u64),
    /// Signed 32-bit.
    I32(i32),
    /// Unsigned 32-bit.
    U32(u32),
    /// No value.
    Void,
    /// Boolean.
    Bool(bool),
    /// Symbol.
    Symbol(String),
    /// String.
    Str(String),
    /// Byte blob.
    Bytes(Vec<u8>),
    /// Account or contract address.
    Address(String),
}

impl WireValue {
    /// Tag name, used in decode errors.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::I128 { .. } => "i128",
            Self::U128 { .. } => "u128",
            Self::I64(_) => "i64",
            Self::U64(_) => "u64",
            Self::I32(_) => "i32",
            Self::U32(_) => "u32",
            Self::Void => "void",
            Self::Bool(_) => "bool",
            Self::Symbol(_) => "symbol",
            Self::Str(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Address(_) => "address",
        }
    }

    /// Build an `I128` from a native value.
    pub fn from_i128(value: i128) -> Self {
        Self::I128 {
            hi: (value >> 64) as i64,
            lo: value as u64,
        }
    }
}

/// How a failed ledger read should be interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryOutcome {
    /// The entry has never been written (zero balance).
    EntryAbsent,
    /// A real failure.
    Failed,
}

/// Contract storage key addressed by a read.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerKey {
    /// Token balance held by an address.
    Balance {
        /// Holder address.
        holder: String,
    },
}

/// Storage backend currently serving facade calls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageMode {
    /// Device persistent store.
    #[default]
    Persistent,
    /// In-memory fallback after the persistent store failed.
    MemoryOnly,
}

/// Credential picker behaviour for an interactive connect.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mediation {
    /// Provider decides.
    #[default]
    Optional,
    /// Always show the picker.
    Required,
    /// Never show UI.
    Silent,
}

/// Options for `connect_wallet`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Restrict the assertion to one known credential.
    pub credential_id: Option<String>,
    /// Picker behaviour.
    pub mediation: Mediation,
}

impl ConnectOptions {
    /// Connect with a specific credential.
    pub fn for_credential(credential_id: impl Into<String>) -> Self {
        Self {
            credential_id: Some(credential_id.into()),
            mediation: Mediation::Optional,
        }
    }
}

/// Registration ceremony request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreationOptions {
    /// Relying party id.
    pub rp_id: String,
    /// Relying party name.
    pub rp_name: String,
    /// Label shown to the user.
    pub user_name: String,
    /// Opaque user handle.
    pub user_id: Vec<u8>,
    /// Ceremony challenge.
    pub challenge: Vec<u8>,
}

/// Authentication ceremony request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssertionOptions {
    /// Relying party id.
    pub rp_id: String,
    /// Ceremony challenge.
    pub challenge: Vec<u8>,
    /// Acceptable credentials; empty lets the user pick.
    pub allow_credentials: Vec<String>,
    /// Picker behaviour.
    pub mediation: Mediation,
}

/// Result of a registration ceremony.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CredentialRegistration {
    /// New credential id.
    pub credential_id: String,
    /// Public key bytes.
    pub public_key: Vec<u8>,
}

/// Result of an authentication ceremony.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Assertion {
    /// Credential that signed.
    pub credential_id: String,
    /// Authenticator data.
    pub authenticator_data: Vec<u8>,
    /// Client data JSON.
    pub client_data: Vec<u8>,
    /// Signature over authenticator data and client data hash.
    pub signature: Vec<u8>,
}

/// Request to deploy a wallet contract for a new passkey.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalletDeployment {
    /// Owning credential.
    pub credential_id: String,
    /// Signer public key.
    pub public_key: Vec<u8>,
}

/// Token transfer as entered by the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferRequest {
    /// Token contract.
    pub token_contract: String,
    /// Recipient address.
    pub recipient: String,
    /// Decimal amount string.
    pub amount: String,
}

impl TransferRequest {
    /// Build a request.
    pub fn new(
        token_contract: impl Into<String>,
        recipient: impl Into<String>,
        amount: impl Into<String>,
    ) -> Self {
        Self {
            token_contract: token_contract.into(),
            recipient: recipient.into(),
            amount: amount.into(),
        }
    }
}

/// Signed transfer handed to the ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferSubmission {
    /// Token contract.
    pub token_contract: String,
    /// Source wallet contract.
    pub from: String,
    /// Recipient address.
    pub to: String,
    /// Amount in base units.
    pub amount: i128,
    /// Authorizing assertion.
    pub assertion: Assertion,
}

/// Ledger answer to a submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmitOutcome {
    /// Transaction hash.
    pub hash: String,
    /// Ledger sequence the transaction landed in.
    pub ledger: Option<u32>,
    /// `false` when the transaction was accepted but not seen confirmed.
    pub confirmed: bool,
}
