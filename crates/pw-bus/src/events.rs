//! # Wallet Events
//!
//! Every event the session controller emits to its subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Events published by the wallet session controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WalletEvent {
    /// A passkey was registered and its wallet contract deployed.
    CredentialCreated {
        /// Passkey credential id.
        credential_id: String,
        /// Deployed wallet contract id.
        contract_id: String,
    },

    /// A wallet became the active session.
    WalletConnected {
        /// Wallet contract id.
        contract_id: String,
        /// Credential that authorizes the wallet.
        credential_id: String,
        /// `true` when the session came back without a ceremony (startup restore).
        restored: bool,
    },

    /// A transfer was handed to the ledger.
    TransactionSubmitted {
        /// Transaction hash.
        hash: String,
        /// Source wallet contract id.
        contract_id: String,
        /// Recipient address.
        recipient: String,
        /// Amount as entered by the user (decimal string).
        amount: String,
    },

    /// The persisted session was found expired at startup.
    SessionExpired {
        /// Credential of the expired session.
        credential_id: String,
        /// When the session expired.
        expired_at: DateTime<Utc>,
    },
}

impl WalletEvent {
    /// Get the topic for this event (for filtering).
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::CredentialCreated { .. } => EventTopic::Credentials,
            Self::WalletConnected { .. } | Self::SessionExpired { .. } => EventTopic::Session,
            Self::TransactionSubmitted { .. } => EventTopic::Transactions,
        }
    }

    /// Contract the event concerns, if known.
    #[must_use]
    pub fn contract_id(&self) -> Option<&str> {
        match self {
            Self::CredentialCreated { contract_id, .. }
            | Self::WalletConnected { contract_id, .. }
            | Self::TransactionSubmitted { contract_id, .. } => Some(contract_id),
            Self::SessionExpired { .. } => None,
        }
    }

    /// Stable event name, used as a metrics/log label.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::CredentialCreated { .. } => "credentialCreated",
            Self::WalletConnected { .. } => "walletConnected",
            Self::TransactionSubmitted { .. } => "transactionSubmitted",
            Self::SessionExpired { .. } => "sessionExpired",
        }
    }
}

/// Event topics for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Passkey registration.
    Credentials,
    /// Session connect / expiry.
    Session,
    /// Transfers.
    Transactions,
    /// All events (no filtering).
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
    /// Contracts to include. Empty means all contracts; events without a
    /// contract always pass.
    pub contract_ids: Vec<String>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            contract_ids: Vec::new(),
        }
    }

    /// Create a filter for events about specific wallet contracts.
    #[must_use]
    pub fn for_contracts(contract_ids: Vec<String>) -> Self {
        Self {
            topics: Vec::new(),
            contract_ids,
        }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &WalletEvent) -> bool {
        let topic_match = self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic());

        let contract_match = self.contract_ids.is_empty()
            || event
                .contract_id()
                .map_or(true, |id| self.contract_ids.iter().any(|c| c == id));

        topic_match && contract_match
    }
}
