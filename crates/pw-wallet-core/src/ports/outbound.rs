//! # Outbound Ports
//!
//! Traits for the collaborators the wallet layer drives: the passkey
//! provider, device storage, the ledger RPC endpoint and the clock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use crate::algorithms::{encode_address, AddressKind};
use crate::domain::{
    Assertion, AssertionOptions, CreationOptions, CredentialErrorCode, CredentialRegistration,
    LedgerKey, SubmitOutcome, TransferSubmission, WalletDeployment, WalletError, WireValue,
};

/// Passkey ceremonies - outbound port.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Run a registration ceremony.
    async fn create_credential(
        &self,
        options: CreationOptions,
    ) -> Result<CredentialRegistration, WalletError>;

    /// Run an authentication ceremony.
    async fn authenticate(&self, options: AssertionOptions) -> Result<Assertion, WalletError>;
}

/// String key-value persistence - outbound port.
///
/// Production: `FileKeyValueStore` (adapters/file_store.rs)
/// Testing: `InMemoryKeyValueStore` (adapters/memory_store.rs), `FlakyKeyValueStore` (below)
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value.
    async fn get(&self, key: &str) -> Result<Option<String>, WalletError>;

    /// Write a value.
    async fn set(&self, key: &str, value: &str) -> Result<(), WalletError>;

    /// Delete a value. Missing keys are not an error.
    async fn remove(&self, key: &str) -> Result<(), WalletError>;
}

/// Ledger RPC endpoint - outbound port.
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// Read a contract storage entry.
    async fn query_contract_value(
        &self,
        contract_id: &str,
        key: &LedgerKey,
    ) -> Result<WireValue, WalletError>;

    /// Deploy a wallet contract controlled by a passkey. Returns the contract id.
    async fn deploy_wallet(&self, deployment: WalletDeployment) -> Result<String, WalletError>;

    /// Find the wallet contract deployed for a credential.
    async fn find_wallet(&self, credential_id: &str) -> Result<Option<String>, WalletError>;

    /// Fund a new wallet (test networks).
    async fn fund_wallet(&self, contract_id: &str) -> Result<(), WalletError>;

    /// Submit a signed transfer and wait for confirmation.
    async fn submit_transfer(
        &self,
        submission: TransferSubmission,
    ) -> Result<SubmitOutcome, WalletError>;

    /// Release server-side resources held for a wallet session.
    async fn release_wallet(&self, contract_id: &str) -> Result<(), WalletError>;
}

/// Wall clock - outbound port.
pub trait TimeSource: Send + Sync {
    /// Current time.
    fn now(&self) -> DateTime<Utc>;
}

/// System clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// Scripted behaviour shared by the mocks.
#[derive(Default)]
struct Script {
    hanging: HashSet<&'static str>,
    failing: HashMap<&'static str, WalletError>,
    delays: HashMap<&'static str, Duration>,
}

impl Script {
    async fn enter(script: &Mutex<Script>, call: &'static str) -> Result<(), WalletError> {
        let (hang, delay, failure) = {
            let s = script.lock();
            (
                s.hanging.contains(call),
                s.delays.get(call).copied(),
                s.failing.get(call).cloned(),
            )
        };
        if hang {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Mock passkey provider.
///
/// Calls are named `"create"` and `"authenticate"` for scripting.
pub struct MockCredentialProvider {
    credential_id: Mutex<String>,
    public_key: Mutex<Vec<u8>>,
    script: Mutex<Script>,
    gate: Mutex<Option<Arc<Notify>>>,
    create_calls: AtomicUsize,
    authenticate_calls: AtomicUsize,
    last_assertion: Mutex<Option<AssertionOptions>>,
}

impl Default for MockCredentialProvider {
    fn default() -> Self {
        Self {
            credential_id: Mutex::new("mock-credential-1".to_string()),
            public_key: Mutex::new(vec![4u8; 65]),
            script: Mutex::new(Script::default()),
            gate: Mutex::new(None),
            create_calls: AtomicUsize::new(0),
            authenticate_calls: AtomicUsize::new(0),
            last_assertion: Mutex::new(None),
        }
    }
}

impl MockCredentialProvider {
    /// Provider that registers `credential_id`.
    pub fn with_credential(credential_id: impl Into<String>) -> Self {
        let mock = Self::default();
        *mock.credential_id.lock() = credential_id.into();
        mock
    }

    /// Make `call` fail with a provider error code.
    pub fn fail(&self, call: &'static str, code: CredentialErrorCode, message: &str) {
        self.script
            .lock()
            .failing
            .insert(call, WalletError::credential(code, message));
    }

    /// Make `call` never settle.
    pub fn hang(&self, call: &'static str) {
        self.script.lock().hanging.insert(call);
    }

    /// Clear all scripted failures and hangs.
    pub fn recover(&self) {
        *self.script.lock() = Script::default();
    }

    /// Hold every ceremony until `gate` is notified.
    pub fn gate_with(&self, gate: Arc<Notify>) {
        *self.gate.lock() = Some(gate);
    }

    /// Registration ceremonies run so far.
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Authentication ceremonies run so far.
    pub fn authenticate_calls(&self) -> usize {
        self.authenticate_calls.load(Ordering::SeqCst)
    }

    /// Options of the most recent authentication ceremony.
    pub fn last_assertion_options(&self) -> Option<AssertionOptions> {
        self.last_assertion.lock().clone()
    }

    async fn wait_gate(&self) {
        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }
}

#[async_trait]
impl CredentialProvider for MockCredentialProvider {
    async fn create_credential(
        &self,
        _options: CreationOptions,
    ) -> Result<CredentialRegistration, WalletError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.wait_gate().await;
        Script::enter(&self.script, "create").await?;
        Ok(CredentialRegistration {
            credential_id: self.credential_id.lock().clone(),
            public_key: self.public_key.lock().clone(),
        })
    }

    async fn authenticate(&self, options: AssertionOptions) -> Result<Assertion, WalletError> {
        self.authenticate_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_assertion.lock() = Some(options.clone());
        self.wait_gate().await;
        Script::enter(&self.script, "authenticate").await?;

        let credential_id = options
            .allow_credentials
            .first()
            .cloned()
            .unwrap_or_else(|| self.credential_id.lock().clone());
        let signature = Sha256::digest(&options.challenge).to_vec();
        Ok(Assertion {
            credential_id,
            authenticator_data: vec![0u8; 37],
            client_data: options.challenge,
            signature,
        })
    }
}

/// Mock ledger endpoint.
///
/// Calls are named `"query"`, `"deploy"`, `"find"`, `"fund"`, `"submit"` and
/// `"release"` for scripting. Unknown balances answer "ledger entry not found".
pub struct MockLedger {
    balances: Mutex<HashMap<String, WireValue>>,
    wallets: Mutex<HashMap<String, String>>,
    funded: Mutex<Vec<String>>,
    released: Mutex<Vec<String>>,
    submissions: Mutex<Vec<TransferSubmission>>,
    script: Mutex<Script>,
    confirm_transfers: AtomicBool,
    sequence: AtomicU32,
}

impl Default for MockLedger {
    fn default() -> Self {
        Self {
            balances: Mutex::new(HashMap::new()),
            wallets: Mutex::new(HashMap::new()),
            funded: Mutex::new(Vec::new()),
            released: Mutex::new(Vec::new()),
            submissions: Mutex::new(Vec::new()),
            script: Mutex::new(Script::default()),
            confirm_transfers: AtomicBool::new(true),
            sequence: AtomicU32::new(1000),
        }
    }
}

impl MockLedger {
    /// Contract id the mock derives for a deployment.
    pub fn contract_for(credential_id: &str, public_key: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(credential_id.as_bytes());
        hasher.update(public_key);
        let digest: [u8; 32] = hasher.finalize().into();
        encode_address(AddressKind::Contract, &digest)
    }

    /// Set the balance of `holder`.
    pub fn set_balance(&self, holder: &str, value: WireValue) {
        self.balances.lock().insert(holder.to_string(), value);
    }

    /// Register an existing wallet for a credential.
    pub fn register_wallet(&self, credential_id: &str, contract_id: &str) {
        self.wallets
            .lock()
            .insert(credential_id.to_string(), contract_id.to_string());
    }

    /// Make `call` fail.
    pub fn fail(&self, call: &'static str, error: WalletError) {
        self.script.lock().failing.insert(call, error);
    }

    /// Make `call` never settle.
    pub fn hang(&self, call: &'static str) {
        self.script.lock().hanging.insert(call);
    }

    /// Make `call` take `delay` before answering.
    pub fn delay(&self, call: &'static str, delay: Duration) {
        self.script.lock().delays.insert(call, delay);
    }

    /// Clear all scripted failures, hangs and delays.
    pub fn recover(&self) {
        *self.script.lock() = Script::default();
    }

    /// Accept transfers without reporting confirmation.
    pub fn set_confirm_transfers(&self, confirm: bool) {
        self.confirm_transfers.store(confirm, Ordering::SeqCst);
    }

    /// Contracts funded so far.
    pub fn funded(&self) -> Vec<String> {
        self.funded.lock().clone()
    }

    /// Contracts released so far.
    pub fn released(&self) -> Vec<String> {
        self.released.lock().clone()
    }

    /// Transfers submitted so far.
    pub fn submissions(&self) -> Vec<TransferSubmission> {
        self.submissions.lock().clone()
    }
}

#[async_trait]
impl LedgerRpc for MockLedger {
    async fn query_contract_value(
        &self,
        _contract_id: &str,
        key: &LedgerKey,
    ) -> Result<WireValue, WalletError> {
        Script::enter(&self.script, "query").await?;
        let LedgerKey::Balance { holder } = key;
        self.balances
            .lock()
            .get(holder)
            .cloned()
            .ok_or_else(|| WalletError::Ledger(format!("ledger entry not found: balance of {holder}")))
    }

    async fn deploy_wallet(&self, deployment: WalletDeployment) -> Result<String, WalletError> {
        Script::enter(&self.script, "deploy").await?;
        let contract_id = Self::contract_for(&deployment.credential_id, &deployment.public_key);
        self.register_wallet(&deployment.credential_id, &contract_id);
        Ok(contract_id)
    }

    async fn find_wallet(&self, credential_id: &str) -> Result<Option<String>, WalletError> {
        Script::enter(&self.script, "find").await?;
        Ok(self.wallets.lock().get(credential_id).cloned())
    }

    async fn fund_wallet(&self, contract_id: &str) -> Result<(), WalletError> {
        Script::enter(&self.script, "fund").await?;
        self.funded.lock().push(contract_id.to_string());
        Ok(())
    }

    async fn submit_transfer(
        &self,
        submission: TransferSubmission,
    ) -> Result<SubmitOutcome, WalletError> {
        Script::enter(&self.script, "submit").await?;
        let mut hasher = Sha256::new();
        hasher.update(submission.from.as_bytes());
        hasher.update(submission.to.as_bytes());
        hasher.update(submission.amount.to_be_bytes());
        hasher.update(&submission.assertion.signature);
        let hash = hex::encode(hasher.finalize());

        self.submissions.lock().push(submission);
        let confirmed = self.confirm_transfers.load(Ordering::SeqCst);
        Ok(SubmitOutcome {
            hash,
            ledger: confirmed.then(|| self.sequence.fetch_add(1, Ordering::SeqCst)),
            confirmed,
        })
    }

    async fn release_wallet(&self, contract_id: &str) -> Result<(), WalletError> {
        Script::enter(&self.script, "release").await?;
        self.released.lock().push(contract_id.to_string());
        Ok(())
    }
}

/// In-memory store that can be told to fail or hang.
#[derive(Default)]
pub struct FlakyKeyValueStore {
    data: Mutex<HashMap<String, String>>,
    failing: AtomicBool,
    hanging: AtomicBool,
    calls: AtomicUsize,
}

impl FlakyKeyValueStore {
    /// Fail every call while `failing` is set.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Never settle any call while `hanging` is set.
    pub fn set_hanging(&self, hanging: bool) {
        self.hanging.store(hanging, Ordering::SeqCst);
    }

    /// Calls received so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Raw stored value.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.data.lock().get(key).cloned()
    }

    /// Store a raw value without counting a call.
    pub fn put_raw(&self, key: &str, value: &str) {
        self.data.lock().insert(key.to_string(), value.to_string());
    }

    async fn enter(&self) -> Result<(), WalletError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hanging.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(WalletError::Storage("device storage unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FlakyKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, WalletError> {
        self.enter().await?;
        Ok(self.data.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), WalletError> {
        self.enter().await?;
        self.data.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), WalletError> {
        self.enter().await?;
        self.data.lock().remove(key);
        Ok(())
    }
}

/// Clock that only moves when told to.
pub struct FixedTimeSource {
    now: Mutex<DateTime<Utc>>,
}

impl FixedTimeSource {
    /// Clock stopped at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    /// Jump to `at`.
    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock() = at;
    }
}

impl TimeSource for FixedTimeSource {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
