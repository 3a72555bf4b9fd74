//! # Resilient Storage Facade
//!
//! Credential, session and snapshot records over a persistent key-value store
//! with an in-memory fallback. The first persistent failure or timeout trips a
//! one-way latch: that call is replayed against memory and every later call
//! goes straight to memory. Nothing here returns an error to the caller.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use pw_telemetry::STORAGE_FALLBACKS;

use super::memory_store::InMemoryKeyValueStore;
use crate::algorithms::{credential_codec, guard};
use crate::domain::{
    CredentialRecord, CredentialUpdate, SessionRecord, SessionSnapshot, StorageMode, WalletError,
};
use crate::ports::outbound::KeyValueStore;

/// Label of guarded storage calls.
pub const STORAGE_LABEL: &str = "storage";

/// Key layout under one namespace prefix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageKeys {
    prefix: String,
}

impl StorageKeys {
    /// Keys under `prefix`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// `{prefix}:credential:{id}`
    pub fn credential(&self, credential_id: &str) -> String {
        format!("{}:credential:{}", self.prefix, credential_id)
    }

    /// `{prefix}:credential-index`
    pub fn index(&self) -> String {
        format!("{}:credential-index", self.prefix)
    }

    /// `{prefix}:session`
    pub fn session(&self) -> String {
        format!("{}:session", self.prefix)
    }

    /// `{prefix}:session-snapshot`
    pub fn snapshot(&self) -> String {
        format!("{}:session-snapshot", self.prefix)
    }
}

/// Persisted form of a [`CredentialRecord`]; the key is base64 text.
#[derive(Serialize, Deserialize)]
struct StoredCredential {
    credential_id: String,
    contract_id: String,
    public_key: String,
    display_name: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    last_used_at: Option<DateTime<Utc>>,
    #[serde(default)]
    metadata: Map<String, Value>,
}

impl From<&CredentialRecord> for StoredCredential {
    fn from(record: &CredentialRecord) -> Self {
        Self {
            credential_id: record.credential_id.clone(),
            contract_id: record.contract_id.clone(),
            public_key: credential_codec::encode(&record.public_key),
            display_name: record.display_name.clone(),
            created_at: record.created_at,
            last_used_at: record.last_used_at,
            metadata: record.metadata.clone(),
        }
    }
}

impl TryFrom<StoredCredential> for CredentialRecord {
    type Error = WalletError;

    fn try_from(stored: StoredCredential) -> Result<Self, Self::Error> {
        Ok(Self {
            public_key: credential_codec::decode(&stored.public_key)?,
            credential_id: stored.credential_id,
            contract_id: stored.contract_id,
            display_name: stored.display_name,
            created_at: stored.created_at,
            last_used_at: stored.last_used_at,
            metadata: stored.metadata,
        })
    }
}

/// Record-level operations against one backend.
#[derive(Clone)]
struct RecordStore {
    kv: Arc<dyn KeyValueStore>,
    keys: Arc<StorageKeys>,
}

impl RecordStore {
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, WalletError> {
        let Some(text) = self.kv.get(key).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&text) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                debug!(key, error = %e, "[pw-wallet] Ignoring unparsable stored value");
                Ok(None)
            }
        }
    }

    async fn write_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), WalletError> {
        let text = serde_json::to_string(value)
            .map_err(|e| WalletError::Internal(format!("serialize {key}: {e}")))?;
        self.kv.set(key, &text).await
    }

    /// Indexed ids. An unreadable index fails the call instead of reading as
    /// empty, so it is never rewritten over.
    async fn index(&self) -> Result<Vec<String>, WalletError> {
        let key = self.keys.index();
        let Some(text) = self.kv.get(&key).await? else {
            return Ok(Vec::new());
        };
        serde_json::from_str(&text)
            .map_err(|e| WalletError::Storage(format!("credential index {key} is unreadable: {e}")))
    }

    async fn save(&self, record: &CredentialRecord) -> Result<(), WalletError> {
        let text = serde_json::to_string(&StoredCredential::from(record))
            .map_err(|e| WalletError::Internal(format!("serialize credential: {e}")))?;
        self.kv
            .set(&self.keys.credential(&record.credential_id), &text)
            .await?;

        let mut index = self.index().await?;
        if !index.contains(&record.credential_id) {
            index.push(record.credential_id.clone());
            self.write_json(&self.keys.index(), &index).await?;
        }
        Ok(())
    }

    async fn get(&self, credential_id: &str) -> Result<Option<CredentialRecord>, WalletError> {
        let stored: Option<StoredCredential> =
            self.read_json(&self.keys.credential(credential_id)).await?;
        Ok(stored.and_then(|s| match CredentialRecord::try_from(s) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!(credential_id, error = %e, "[pw-wallet] Dropping undecodable credential");
                None
            }
        }))
    }

    async fn get_all(&self) -> Result<Vec<CredentialRecord>, WalletError> {
        let mut records = Vec::new();
        for id in self.index().await? {
            if let Some(record) = self.get(&id).await? {
                records.push(record);
            }
        }
        Ok(records)
    }

    async fn delete(&self, credential_id: &str) -> Result<(), WalletError> {
        self.kv.remove(&self.keys.credential(credential_id)).await?;
        let mut index = self.index().await?;
        let before = index.len();
        index.retain(|id| id != credential_id);
        if index.len() != before {
            self.write_json(&self.keys.index(), &index).await?;
        }
        Ok(())
    }

    async fn update(&self, credential_id: &str, update: CredentialUpdate) -> Result<(), WalletError> {
        let Some(mut record) = self.get(credential_id).await? else {
            return Ok(());
        };
        record.apply(update);
        self.save(&record).await
    }

    async fn clear(&self) -> Result<(), WalletError> {
        for id in self.index().await? {
            self.kv.remove(&self.keys.credential(&id)).await?;
        }
        self.kv.remove(&self.keys.index()).await?;
        self.kv.remove(&self.keys.session()).await?;
        self.kv.remove(&self.keys.snapshot()).await
    }
}

/// Storage facade shared by the controller.
pub struct ResilientStorage {
    persistent: Arc<dyn KeyValueStore>,
    memory: Arc<dyn KeyValueStore>,
    keys: Arc<StorageKeys>,
    budget: Duration,
    memory_only: AtomicBool,
}

impl ResilientStorage {
    /// Facade over `persistent` with a fresh in-memory fallback.
    pub fn new(persistent: Arc<dyn KeyValueStore>, prefix: &str, budget: Duration) -> Self {
        Self {
            persistent,
            memory: Arc::new(InMemoryKeyValueStore::new()),
            keys: Arc::new(StorageKeys::new(prefix)),
            budget,
            memory_only: AtomicBool::new(false),
        }
    }

    /// Facade that starts in memory-only mode (persistent store unavailable).
    pub fn memory_only(prefix: &str, budget: Duration) -> Self {
        let facade = Self::new(Arc::new(InMemoryKeyValueStore::new()), prefix, budget);
        facade.memory_only.store(true, Ordering::SeqCst);
        facade
    }

    /// Key layout in use.
    pub fn keys(&self) -> &StorageKeys {
        &self.keys
    }

    /// `true` once the latch has tripped.
    pub fn is_memory_only(&self) -> bool {
        self.memory_only.load(Ordering::SeqCst)
    }

    /// Backend currently serving calls.
    pub fn storage_mode(&self) -> StorageMode {
        if self.is_memory_only() {
            StorageMode::MemoryOnly
        } else {
            StorageMode::Persistent
        }
    }

    fn trip(&self, call: &'static str, error: &WalletError) {
        if !self.memory_only.swap(true, Ordering::SeqCst) {
            warn!(
                call,
                error = %error,
                "[pw-wallet] Persistent storage failed; using memory for the rest of this process"
            );
            STORAGE_FALLBACKS.with_label_values(&[call]).inc();
        }
    }

    async fn run<T, F, Fut>(&self, call: &'static str, op: F) -> T
    where
        T: Default + Send + 'static,
        F: Fn(RecordStore) -> Fut,
        Fut: Future<Output = Result<T, WalletError>> + Send + 'static,
    {
        if !self.is_memory_only() {
            let store = RecordStore {
                kv: self.persistent.clone(),
                keys: self.keys.clone(),
            };
            match guard(STORAGE_LABEL, self.budget, op(store)).await {
                Ok(value) => return value,
                Err(error) => self.trip(call, &error),
            }
        }

        let store = RecordStore {
            kv: self.memory.clone(),
            keys: self.keys.clone(),
        };
        match op(store).await {
            Ok(value) => value,
            Err(error) => {
                warn!(call, error = %error, "[pw-wallet] In-memory storage call failed");
                T::default()
            }
        }
    }

    /// Save a credential record, indexing new ids once.
    pub async fn save(&self, record: &CredentialRecord) {
        let record = record.clone();
        self.run("save", move |store| {
            let record = record.clone();
            async move { store.save(&record).await }
        })
        .await
    }

    /// Credential by id.
    pub async fn get(&self, credential_id: &str) -> Option<CredentialRecord> {
        let id = credential_id.to_string();
        self.run("get", move |store| {
            let id = id.clone();
            async move { store.get(&id).await }
        })
        .await
    }

    /// Credential whose wallet is `contract_id`.
    pub async fn get_by_contract(&self, contract_id: &str) -> Option<CredentialRecord> {
        self.get_all()
            .await
            .into_iter()
            .find(|record| record.contract_id == contract_id)
    }

    /// All indexed credentials that still parse, in index order.
    pub async fn get_all(&self) -> Vec<CredentialRecord> {
        self.run("get_all", |store| async move { store.get_all().await })
            .await
    }

    /// Remove a credential and its index entry.
    pub async fn delete(&self, credential_id: &str) {
        let id = credential_id.to_string();
        self.run("delete", move |store| {
            let id = id.clone();
            async move { store.delete(&id).await }
        })
        .await
    }

    /// Apply the mutable fields of `update`. Unknown ids are ignored.
    pub async fn update(&self, credential_id: &str, update: CredentialUpdate) {
        let id = credential_id.to_string();
        self.run("update", move |store| {
            let id = id.clone();
            let update = update.clone();
            async move { store.update(&id, update).await }
        })
        .await
    }

    /// Remove every credential, the index, the session and the snapshot.
    pub async fn clear(&self) {
        self.run("clear", |store| async move { store.clear().await })
            .await
    }

    /// Persist the live session.
    pub async fn save_session(&self, session: &SessionRecord) {
        let session = session.clone();
        self.run("save_session", move |store| {
            let session = session.clone();
            async move { store.write_json(&store.keys.session(), &session).await }
        })
        .await
    }

    /// Live session, if stored and parsable.
    pub async fn get_session(&self) -> Option<SessionRecord> {
        self.run("get_session", |store| async move {
            store.read_json(&store.keys.session()).await
        })
        .await
    }

    /// Forget the live session.
    pub async fn clear_session(&self) {
        self.run("clear_session", |store| async move {
            store.kv.remove(&store.keys.session()).await
        })
        .await
    }

    /// Persist the session snapshot.
    pub async fn save_snapshot(&self, snapshot: &SessionSnapshot) {
        let snapshot = snapshot.clone();
        self.run("save_snapshot", move |store| {
            let snapshot = snapshot.clone();
            async move { store.write_json(&store.keys.snapshot(), &snapshot).await }
        })
        .await
    }

    /// Session snapshot, if stored and parsable.
    pub async fn get_snapshot(&self) -> Option<SessionSnapshot> {
        self.run("get_snapshot", |store| async move {
            store.read_json(&store.keys.snapshot()).await
        })
        .await
    }

    /// Forget the session snapshot.
    pub async fn clear_snapshot(&self) {
        self.run("clear_snapshot", |store| async move {
            store.kv.remove(&store.keys.snapshot()).await
        })
        .await
    }
}
