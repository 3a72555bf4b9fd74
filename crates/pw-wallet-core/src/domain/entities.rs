//! # Domain Entities
//!
//! Credential and session records plus the observable controller state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::value_objects::StorageMode;

/// A registered passkey and the wallet contract it authorizes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CredentialRecord {
    /// Passkey credential id (primary key).
    pub credential_id: String,
    /// Wallet contract id deployed for this credential.
    pub contract_id: String,
    /// Raw public key bytes.
    pub public_key: Vec<u8>,
    /// Human readable label.
    pub display_name: String,
    /// Registration time.
    pub created_at: DateTime<Utc>,
    /// Last successful assertion with this credential.
    pub last_used_at: Option<DateTime<Utc>>,
    /// Opaque caller data.
    pub metadata: Map<String, Value>,
}

impl CredentialRecord {
    /// Create a fresh record with empty metadata.
    pub fn new(
        credential_id: impl Into<String>,
        contract_id: impl Into<String>,
        public_key: Vec<u8>,
        display_name: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            credential_id: credential_id.into(),
            contract_id: contract_id.into(),
            public_key,
            display_name: display_name.into(),
            created_at,
            last_used_at: None,
            metadata: Map::new(),
        }
    }

    /// Apply the mutable subset of fields. Identity and key are never touched.
    pub fn apply(&mut self, update: CredentialUpdate) {
        if let Some(contract_id) = update.contract_id {
            self.contract_id = contract_id;
        }
        if let Some(display_name) = update.display_name {
            self.display_name = display_name;
        }
        if let Some(last_used_at) = update.last_used_at {
            self.last_used_at = Some(last_used_at);
        }
        if let Some(metadata) = update.metadata {
            self.metadata = metadata;
        }
    }
}

/// Partial update for a [`CredentialRecord`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CredentialUpdate {
    /// New contract id.
    pub contract_id: Option<String>,
    /// New display name.
    pub display_name: Option<String>,
    /// New last-used timestamp.
    pub last_used_at: Option<DateTime<Utc>>,
    /// Replacement metadata map.
    pub metadata: Option<Map<String, Value>>,
}

impl CredentialUpdate {
    /// Update that only records a use of the credential.
    pub fn touched(at: DateTime<Utc>) -> Self {
        Self {
            last_used_at: Some(at),
            ..Self::default()
        }
    }

    /// Update that re-points the credential at another contract.
    pub fn contract(contract_id: impl Into<String>) -> Self {
        Self {
            contract_id: Some(contract_id.into()),
            ..Self::default()
        }
    }
}

/// The live session of this device profile.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Connected wallet contract.
    pub contract_id: String,
    /// Credential that authorized the session.
    pub credential_id: String,
    /// Expiry instant.
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Create a session valid for `ttl` from `now`.
    pub fn starting_at(
        contract_id: impl Into<String>,
        credential_id: impl Into<String>,
        now: DateTime<Utc>,
        ttl: chrono::Duration,
    ) -> Self {
        Self {
            contract_id: contract_id.into(),
            credential_id: credential_id.into(),
            expires_at: now + ttl,
        }
    }

    /// Whether the session has lapsed at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Best-effort copy of the last known session, used only as a restore source.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Wallet contract.
    pub contract_id: String,
    /// Credential id.
    pub credential_id: String,
    /// When the snapshot was written.
    pub updated_at: DateTime<Utc>,
}

impl SessionSnapshot {
    /// Snapshot a session at `now`.
    pub fn of(session: &SessionRecord, now: DateTime<Utc>) -> Self {
        Self {
            contract_id: session.contract_id.clone(),
            credential_id: session.credential_id.clone(),
            updated_at: now,
        }
    }
}

/// User-visible operations. At most one runs at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Startup restore.
    Restore,
    /// Interactive re-authentication of an expired session.
    Reauth,
    /// Register a passkey and deploy a wallet.
    Create,
    /// Connect an existing wallet.
    Connect,
    /// Send a payment.
    Transfer,
    /// Sign out.
    Disconnect,
}

impl Operation {
    /// Label used for budgets, logs, metrics and timeout guidance.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Restore => "restore",
            Self::Reauth => "reauth",
            Self::Create => "create",
            Self::Connect => "connect",
            Self::Transfer => "transfer",
            Self::Disconnect => "disconnect",
        }
    }
}

/// Coarse controller state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControllerPhase {
    /// Startup restore chain is running.
    Restoring,
    /// Ready for a new operation.
    Idle,
    /// An operation is in flight.
    Busy(Operation),
}

impl ControllerPhase {
    /// `true` unless idle.
    pub fn is_busy(&self) -> bool {
        !matches!(self, Self::Idle)
    }
}

/// Balance of the connected wallet.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalanceResult {
    /// Nothing requested for the current contract.
    #[default]
    Idle,
    /// Query in flight.
    Loading,
    /// Decoded balance.
    Ready {
        /// Decimal string at scale 10^7.
        amount: String,
        /// When the value was observed.
        observed_at: DateTime<Utc>,
    },
    /// Classified failure message.
    Error(String),
}

/// Outcome of the last transfer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferResult {
    /// No transfer attempted for the current contract.
    #[default]
    Idle,
    /// Submitted and confirmed.
    Success {
        /// Transaction hash.
        hash: String,
        /// Ledger sequence, when reported.
        ledger: Option<u32>,
        /// Amount as entered.
        amount: String,
        /// Recipient address.
        recipient: String,
    },
    /// Failed transfer.
    Error {
        /// Classified message.
        message: String,
        /// Amount as entered.
        amount: String,
        /// Recipient address.
        recipient: String,
        /// Hash, when the transaction reached the ledger.
        hash: Option<String>,
    },
}

/// Immutable snapshot of controller state for the presentation layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    /// Current phase.
    pub phase: ControllerPhase,
    /// Connected contract.
    pub contract_id: Option<String>,
    /// Connected credential.
    pub credential_id: Option<String>,
    /// Session expiry.
    pub expires_at: Option<DateTime<Utc>>,
    /// Last classified error, cleared when the next operation starts.
    pub error: Option<String>,
    /// Balance state.
    pub balance: BalanceResult,
    /// Transfer state.
    pub transfer: TransferResult,
    /// Which storage backend is serving calls.
    pub storage_mode: StorageMode,
}

impl SessionView {
    /// `true` when a wallet is connected.
    pub fn is_authenticated(&self) -> bool {
        self.contract_id.is_some()
    }
}

/// What an inbound operation call did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OperationOutcome {
    /// Ran to completion.
    Completed,
    /// Ran and failed; carries the classified message.
    Failed(String),
    /// Not started because another operation was in flight.
    Skipped,
}

impl OperationOutcome {
    /// `true` for [`OperationOutcome::Completed`].
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap()
    }

    #[test]
    fn test_apply_update_keeps_identity() {
        let mut record = CredentialRecord::new("cred", "CA", vec![1, 2], "Alice", at(0));
        let mut metadata = Map::new();
        metadata.insert("theme".to_string(), Value::from("dark"));

        record.apply(CredentialUpdate {
            display_name: Some("Bob".to_string()),
            metadata: Some(metadata.clone()),
            ..CredentialUpdate::default()
        });

        assert_eq!(record.credential_id, "cred");
        assert_eq!(record.public_key, vec![1, 2]);
        assert_eq!(record.contract_id, "CA");
        assert_eq!(record.display_name, "Bob");
        assert_eq!(record.metadata, metadata);
    }

    #[test]
    fn test_session_expiry_boundary() {
        let session = SessionRecord::starting_at("CA", "cred", at(100), chrono::Duration::seconds(10));
        assert!(!session.is_expired(at(109)));
        assert!(session.is_expired(at(110)));
    }

    #[test]
    fn test_phase_busy() {
        assert!(!ControllerPhase::Idle.is_busy());
        assert!(ControllerPhase::Restoring.is_busy());
        assert!(ControllerPhase::Busy(Operation::Transfer).is_busy());
        assert_eq!(Operation::Reauth.as_str(), "reauth");
    }
}
