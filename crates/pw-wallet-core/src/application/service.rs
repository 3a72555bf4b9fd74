//! # Wallet Session Controller
//!
//! Application service that runs the startup restore chain and the user
//! operations. Every external call goes through the timeout guard, every
//! failure through the classifier, and all persistence through the resilient
//! storage facade.
//!
//! State sits behind a `parking_lot::Mutex` that is never held across an
//! `.await`. At most one operation runs at a time; a request that arrives
//! while another is in flight returns [`OperationOutcome::Skipped`] without
//! touching state.

use async_trait::async_trait;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use pw_bus::{
    EventFilter, EventPublisher, EventStream, EventSubscriber, InMemoryEventBus, Subscription,
    WalletEvent,
};
use pw_telemetry::{HistogramTimer, BALANCE_QUERIES, EVENTS_PUBLISHED, OPERATIONS};

use crate::adapters::{FileKeyValueStore, ResilientStorage};
use crate::algorithms::{
    classify, classify_query_failure, decode_balance, guard, parse_amount, validate_address,
    AddressKind,
};
use crate::config::WalletConfig;
use crate::domain::{
    invariant_connected, invariant_session_matches_credential, AssertionOptions, BalanceResult,
    ConnectOptions, ControllerPhase, CreationOptions, CredentialRecord, CredentialUpdate,
    DomainErrorCode, LedgerKey, Operation, OperationOutcome, QueryOutcome, SessionRecord,
    SessionSnapshot, SessionView, SubmitOutcome, TransferRequest, TransferResult,
    TransferSubmission, WalletDeployment, WalletError, UNDEPLOYED_CONTRACT_MARKER,
};
use crate::ports::{CredentialProvider, KeyValueStore, LedgerRpc, SystemTimeSource, TimeSource, WalletApi};

/// Label of guarded balance reads.
pub const BALANCE_LABEL: &str = "balance";

/// Mutable controller state.
struct ControllerState {
    phase: ControllerPhase,
    session: Option<SessionRecord>,
    error: Option<String>,
    balance: BalanceResult,
    transfer: TransferResult,
    /// Bumped on every identity change and on disconnect.
    generation: u64,
}

impl Default for ControllerState {
    fn default() -> Self {
        Self {
            phase: ControllerPhase::Idle,
            session: None,
            error: None,
            balance: BalanceResult::Idle,
            transfer: TransferResult::Idle,
            generation: 0,
        }
    }
}

impl ControllerState {
    fn is_current(&self, generation: u64, contract_id: &str) -> bool {
        self.generation == generation
            && self
                .session
                .as_ref()
                .is_some_and(|s| s.contract_id == contract_id)
    }
}

/// Returns the controller to idle when the running operation ends, however
/// it ends.
struct PhaseReset<'a> {
    state: &'a Mutex<ControllerState>,
}

impl Drop for PhaseReset<'_> {
    fn drop(&mut self) {
        self.state.lock().phase = ControllerPhase::Idle;
    }
}

/// Balance queries, detachable from the controller for background refresh.
#[derive(Clone)]
struct BalanceRefresher {
    ledger: Arc<dyn LedgerRpc>,
    clock: Arc<dyn TimeSource>,
    state: Arc<Mutex<ControllerState>>,
    token_contract: String,
    budget: Duration,
}

impl BalanceRefresher {
    async fn refresh(&self, contract_id: &str) -> BalanceResult {
        let generation = {
            let mut state = self.state.lock();
            if !state.is_current(state.generation, contract_id) {
                debug!(contract_id, "[pw-wallet] Balance refresh for a contract that is not connected");
                return state.balance.clone();
            }
            state.balance = BalanceResult::Loading;
            state.generation
        };

        let outcome = self.query(contract_id).await;

        let mut state = self.state.lock();
        if !state.is_current(generation, contract_id) {
            BALANCE_QUERIES.with_label_values(&["stale"]).inc();
            debug!(contract_id, "[pw-wallet] Discarding late balance result");
            return state.balance.clone();
        }
        state.balance = match outcome {
            Ok(amount) => BalanceResult::Ready {
                amount,
                observed_at: self.clock.now(),
            },
            Err(error) => {
                let message = classify(BALANCE_LABEL, &error);
                warn!(contract_id, error = %error, "[pw-wallet] Balance query failed");
                BalanceResult::Error(message)
            }
        };
        state.balance.clone()
    }

    async fn query(&self, contract_id: &str) -> Result<String, WalletError> {
        let ledger = self.ledger.clone();
        let token = self.token_contract.clone();
        let key = LedgerKey::Balance {
            holder: contract_id.to_string(),
        };

        match guard(BALANCE_LABEL, self.budget, async move {
            ledger.query_contract_value(&token, &key).await
        })
        .await
        {
            Ok(value) => {
                let decoded = decode_balance(&value);
                let outcome = if decoded.is_ok() { "ready" } else { "error" };
                BALANCE_QUERIES.with_label_values(&[outcome]).inc();
                decoded
            }
            Err(error) if classify_query_failure(&error) == QueryOutcome::EntryAbsent => {
                BALANCE_QUERIES.with_label_values(&["absent"]).inc();
                debug!(contract_id, "[pw-wallet] No balance entry; reporting zero");
                Ok("0".to_string())
            }
            Err(error) => {
                BALANCE_QUERIES.with_label_values(&["error"]).inc();
                Err(error)
            }
        }
    }
}

/// Session lifecycle controller.
pub struct WalletSessionController {
    config: WalletConfig,
    credentials: Arc<dyn CredentialProvider>,
    ledger: Arc<dyn LedgerRpc>,
    storage: Arc<ResilientStorage>,
    clock: Arc<dyn TimeSource>,
    events: Arc<InMemoryEventBus>,
    state: Arc<Mutex<ControllerState>>,
    balance: BalanceRefresher,
}

impl WalletSessionController {
    /// Create a controller over explicit collaborators.
    pub fn new(
        config: WalletConfig,
        credentials: Arc<dyn CredentialProvider>,
        ledger: Arc<dyn LedgerRpc>,
        persistent: Arc<dyn KeyValueStore>,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        let storage = Arc::new(ResilientStorage::new(
            persistent,
            &config.storage_prefix,
            config.timeouts.storage(),
        ));
        Self::with_storage(config, credentials, ledger, storage, clock)
    }

    /// Create a controller over an existing storage facade.
    pub fn with_storage(
        config: WalletConfig,
        credentials: Arc<dyn CredentialProvider>,
        ledger: Arc<dyn LedgerRpc>,
        storage: Arc<ResilientStorage>,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        let state = Arc::new(Mutex::new(ControllerState::default()));
        let balance = BalanceRefresher {
            ledger: ledger.clone(),
            clock: clock.clone(),
            state: state.clone(),
            token_contract: config.native_token_contract.clone(),
            budget: config.timeouts.balance(),
        };
        Self {
            config,
            credentials,
            ledger,
            storage,
            clock,
            events: Arc::new(InMemoryEventBus::new()),
            state,
            balance,
        }
    }

    /// Create a controller backed by the device file store at
    /// [`WalletConfig::store_path`], using the system clock.
    ///
    /// If the file store cannot be opened the controller starts memory-only.
    pub fn open(
        config: WalletConfig,
        credentials: Arc<dyn CredentialProvider>,
        ledger: Arc<dyn LedgerRpc>,
    ) -> Self {
        let storage = match FileKeyValueStore::open(config.store_path()) {
            Ok(store) => ResilientStorage::new(
                Arc::new(store),
                &config.storage_prefix,
                config.timeouts.storage(),
            ),
            Err(error) => {
                warn!(error = %error, "[pw-wallet] Device store unavailable; starting memory-only");
                ResilientStorage::memory_only(&config.storage_prefix, config.timeouts.storage())
            }
        };
        Self::with_storage(
            config,
            credentials,
            ledger,
            Arc::new(storage),
            Arc::new(SystemTimeSource),
        )
    }

    /// Configuration in use.
    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    /// Storage facade in use.
    pub fn storage(&self) -> &Arc<ResilientStorage> {
        &self.storage
    }

    /// Stream of events matching `filter`.
    pub fn event_stream(&self, filter: EventFilter) -> EventStream {
        self.events.event_stream(filter)
    }

    /// Credentials registered on this device, in registration order.
    pub async fn known_credentials(&self) -> Vec<CredentialRecord> {
        self.storage.get_all().await
    }

    /// Remove a credential record from this device.
    pub async fn forget_credential(&self, credential_id: &str) {
        info!(credential_id, "[pw-wallet] Forgetting credential");
        self.storage.delete(credential_id).await;
    }

    /// Snapshot of the controller state.
    pub fn view(&self) -> SessionView {
        let state = self.state.lock();
        SessionView {
            phase: state.phase,
            contract_id: state.session.as_ref().map(|s| s.contract_id.clone()),
            credential_id: state.session.as_ref().map(|s| s.credential_id.clone()),
            expires_at: state.session.as_ref().map(|s| s.expires_at),
            error: state.error.clone(),
            balance: state.balance.clone(),
            transfer: state.transfer.clone(),
            storage_mode: self.storage.storage_mode(),
        }
    }

    // =========================================================================
    // Startup
    // =========================================================================

    /// Startup restore chain: silent restore, then expired-session
    /// re-authentication, then snapshot fallback, then unauthenticated idle.
    pub async fn restore_session(&self) -> OperationOutcome {
        let Some(_reset) = self.begin(ControllerPhase::Restoring) else {
            return self.skipped(Operation::Restore);
        };
        let _timer = HistogramTimer::for_operation(Operation::Restore.as_str());
        info!("[pw-wallet] Restoring session");

        match self.silent_connect().await {
            Ok(Some(session)) => {
                info!(contract_id = %session.contract_id, "[pw-wallet] Session restored");
                self.establish(session, true).await;
                return self.succeeded(Operation::Restore);
            }
            Ok(None) => {}
            Err(error) => {
                warn!(error = %error, "[pw-wallet] Silent restore failed; trying fallbacks");
            }
        }

        let now = self.clock.now();
        if let Some(expired) = self
            .storage
            .get_session()
            .await
            .filter(|session| session.is_expired(now))
        {
            return self.reauthenticate(expired).await;
        }

        if let Some(snapshot) = self.storage.get_snapshot().await {
            info!(contract_id = %snapshot.contract_id, "[pw-wallet] Restoring from snapshot");
            let session = SessionRecord::starting_at(
                snapshot.contract_id,
                snapshot.credential_id,
                self.clock.now(),
                self.config.session_ttl(),
            );
            self.storage.save_session(&session).await;
            self.establish(session, true).await;
            return self.succeeded(Operation::Restore);
        }

        debug!("[pw-wallet] Nothing to restore");
        OPERATIONS
            .with_label_values(&[Operation::Restore.as_str(), "success"])
            .inc();
        OperationOutcome::Completed
    }

    async fn silent_connect(&self) -> Result<Option<SessionRecord>, WalletError> {
        let Some(session) = self.storage.get_session().await else {
            return Ok(None);
        };
        if session.is_expired(self.clock.now()) {
            return Ok(None);
        }

        let ledger = self.ledger.clone();
        let credential_id = session.credential_id.clone();
        let found = guard(
            Operation::Restore.as_str(),
            self.budget(Operation::Restore),
            async move { ledger.find_wallet(&credential_id).await },
        )
        .await?;

        match found {
            Some(contract_id) if contract_id == session.contract_id => Ok(Some(session)),
            Some(contract_id) => {
                warn!(
                    stored = %session.contract_id,
                    ledger = %contract_id,
                    "[pw-wallet] Ledger reports a different wallet; following the ledger"
                );
                let session = SessionRecord {
                    contract_id,
                    ..session
                };
                self.storage.save_session(&session).await;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    async fn reauthenticate(&self, expired: SessionRecord) -> OperationOutcome {
        info!(credential_id = %expired.credential_id, "[pw-wallet] Session expired; re-authenticating");
        self.publish(WalletEvent::SessionExpired {
            credential_id: expired.credential_id.clone(),
            expired_at: expired.expires_at,
        })
        .await;

        {
            let mut state = self.state.lock();
            state.phase = ControllerPhase::Busy(Operation::Reauth);
            state.error = None;
        }
        let _timer = HistogramTimer::for_operation(Operation::Reauth.as_str());

        let options = ConnectOptions::for_credential(expired.credential_id);
        match self.interactive_connect(options, Operation::Reauth).await {
            Ok(session) => {
                self.storage.save_session(&session).await;
                self.establish(session, false).await;
                self.succeeded(Operation::Reauth)
            }
            Err(error) => self.failed(Operation::Reauth, &error),
        }
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Register a passkey, deploy its wallet contract and connect it.
    pub async fn create_wallet(&self, display_name: &str) -> OperationOutcome {
        self.run_operation(Operation::Create, self.execute_create(display_name))
            .await
    }

    /// Connect an existing wallet through a passkey assertion.
    pub async fn connect_wallet(&self, options: ConnectOptions) -> OperationOutcome {
        self.run_operation(Operation::Connect, self.execute_connect(options))
            .await
    }

    /// Sign and submit a transfer from the connected wallet.
    pub async fn transfer(&self, request: TransferRequest) -> OperationOutcome {
        self.run_operation(Operation::Transfer, self.execute_transfer(request))
            .await
    }

    /// Sign out. Local session state is cleared even if the release call
    /// fails or times out.
    pub async fn disconnect(&self) -> OperationOutcome {
        self.run_operation(Operation::Disconnect, self.execute_disconnect())
            .await
    }

    /// Sign out and wipe every credential record from this device.
    pub async fn reset_device(&self) -> OperationOutcome {
        self.run_operation(Operation::Disconnect, async {
            let released = self.execute_disconnect().await;
            self.storage.clear().await;
            info!("[pw-wallet] Device storage wiped");
            released
        })
        .await
    }

    /// Refresh the balance of `contract_id`. Ignored unless it is the
    /// connected wallet; results that arrive after the session changed are
    /// discarded.
    pub async fn refresh_balance(&self, contract_id: &str) -> BalanceResult {
        self.balance.refresh(contract_id).await
    }

    async fn execute_create(&self, display_name: &str) -> Result<(), WalletError> {
        let display_name = display_name.trim().to_string();
        let options = CreationOptions {
            rp_id: self.config.rp_id.clone(),
            rp_name: self.config.rp_name.clone(),
            user_name: display_name.clone(),
            user_id: rand::random::<[u8; 16]>().to_vec(),
            challenge: rand::random::<[u8; 32]>().to_vec(),
        };
        let credentials = self.credentials.clone();
        let ledger = self.ledger.clone();
        let fund = self.config.fund_on_create;

        let (registration, contract_id) = guard(
            Operation::Create.as_str(),
            self.budget(Operation::Create),
            async move {
                let registration = credentials.create_credential(options).await?;
                let contract_id = ledger
                    .deploy_wallet(WalletDeployment {
                        credential_id: registration.credential_id.clone(),
                        public_key: registration.public_key.clone(),
                    })
                    .await?;
                if fund {
                    if let Err(error) = ledger.fund_wallet(&contract_id).await {
                        warn!(contract_id = %contract_id, error = %error, "[pw-wallet] Funding failed; wallet left unfunded");
                    }
                }
                Ok((registration, contract_id))
            },
        )
        .await?;

        let now = self.clock.now();
        let record = CredentialRecord::new(
            registration.credential_id.clone(),
            contract_id.clone(),
            registration.public_key,
            display_name,
            now,
        );
        self.storage.save(&record).await;
        info!(credential_id = %record.credential_id, contract_id = %contract_id, "[pw-wallet] Wallet created");
        self.publish(WalletEvent::CredentialCreated {
            credential_id: record.credential_id.clone(),
            contract_id: contract_id.clone(),
        })
        .await;

        let session = SessionRecord::starting_at(
            contract_id,
            record.credential_id,
            now,
            self.config.session_ttl(),
        );
        self.storage.save_session(&session).await;
        self.establish(session, false).await;
        Ok(())
    }

    async fn execute_connect(&self, options: ConnectOptions) -> Result<(), WalletError> {
        let session = self.interactive_connect(options, Operation::Connect).await?;
        self.storage.save_session(&session).await;
        self.establish(session, false).await;
        Ok(())
    }

    async fn interactive_connect(
        &self,
        options: ConnectOptions,
        operation: Operation,
    ) -> Result<SessionRecord, WalletError> {
        let assertion_options = AssertionOptions {
            rp_id: self.config.rp_id.clone(),
            challenge: rand::random::<[u8; 32]>().to_vec(),
            allow_credentials: options.credential_id.into_iter().collect(),
            mediation: options.mediation,
        };
        let credentials = self.credentials.clone();
        let ledger = self.ledger.clone();
        let storage = self.storage.clone();

        let (credential_id, contract_id) = guard(
            operation.as_str(),
            self.budget(operation),
            async move {
                let assertion = credentials.authenticate(assertion_options).await?;
                let credential_id = assertion.credential_id;
                if let Some(record) = storage.get(&credential_id).await {
                    return Ok((credential_id, record.contract_id));
                }
                match ledger.find_wallet(&credential_id).await? {
                    Some(contract_id) => Ok((credential_id, contract_id)),
                    None => Err(WalletError::Ledger(format!(
                        "no wallet contract for credential {credential_id} ({UNDEPLOYED_CONTRACT_MARKER})"
                    ))),
                }
            },
        )
        .await?;

        let now = self.clock.now();
        self.storage
            .update(&credential_id, CredentialUpdate::touched(now))
            .await;
        info!(credential_id = %credential_id, contract_id = %contract_id, operation = operation.as_str(), "[pw-wallet] Wallet connected");
        Ok(SessionRecord::starting_at(
            contract_id,
            credential_id,
            now,
            self.config.session_ttl(),
        ))
    }

    async fn execute_transfer(&self, request: TransferRequest) -> Result<(), WalletError> {
        let outcome = self.submit_transfer(&request).await;
        let (result, transfer) = match outcome {
            Ok(submitted) if submitted.confirmed => {
                info!(hash = %submitted.hash, ledger = ?submitted.ledger, "[pw-wallet] Transfer confirmed");
                (
                    Ok(()),
                    TransferResult::Success {
                        hash: submitted.hash,
                        ledger: submitted.ledger,
                        amount: request.amount,
                        recipient: request.recipient,
                    },
                )
            }
            Ok(submitted) => {
                let error = WalletError::validation(
                    DomainErrorCode::TransactionConfirmationTimeout,
                    format!("transaction {} was not confirmed", submitted.hash),
                );
                let transfer = TransferResult::Error {
                    message: classify(Operation::Transfer.as_str(), &error),
                    amount: request.amount,
                    recipient: request.recipient,
                    hash: Some(submitted.hash),
                };
                (Err(error), transfer)
            }
            Err(error) => {
                let transfer = TransferResult::Error {
                    message: classify(Operation::Transfer.as_str(), &error),
                    amount: request.amount,
                    recipient: request.recipient,
                    hash: None,
                };
                (Err(error), transfer)
            }
        };
        self.state.lock().transfer = transfer;
        result
    }

    async fn submit_transfer(&self, request: &TransferRequest) -> Result<SubmitOutcome, WalletError> {
        let session = {
            let state = self.state.lock();
            invariant_connected(state.session.as_ref())?.clone()
        };
        validate_address(&request.recipient)?;
        if validate_address(&request.token_contract)? != AddressKind::Contract {
            return Err(WalletError::validation(
                DomainErrorCode::InvalidAddress,
                format!("'{}' is not a token contract", request.token_contract),
            ));
        }
        let amount = parse_amount(&request.amount)?;

        let options = AssertionOptions {
            rp_id: self.config.rp_id.clone(),
            challenge: transfer_challenge(
                &self.config.network_passphrase,
                &request.token_contract,
                &session.contract_id,
                &request.recipient,
                amount,
            ),
            allow_credentials: vec![session.credential_id.clone()],
            mediation: Default::default(),
        };
        let credentials = self.credentials.clone();
        let ledger = self.ledger.clone();
        let token_contract = request.token_contract.trim().to_string();
        let from = session.contract_id.clone();
        let to = request.recipient.trim().to_string();

        let submitted = guard(
            Operation::Transfer.as_str(),
            self.budget(Operation::Transfer),
            async move {
                let assertion = credentials.authenticate(options).await?;
                ledger
                    .submit_transfer(TransferSubmission {
                        token_contract,
                        from,
                        to,
                        amount,
                        assertion,
                    })
                    .await
            },
        )
        .await?;

        self.publish(WalletEvent::TransactionSubmitted {
            hash: submitted.hash.clone(),
            contract_id: session.contract_id,
            recipient: request.recipient.clone(),
            amount: request.amount.clone(),
        })
        .await;
        Ok(submitted)
    }

    async fn execute_disconnect(&self) -> Result<(), WalletError> {
        let contract_id = self
            .state
            .lock()
            .session
            .as_ref()
            .map(|s| s.contract_id.clone());

        let released = match contract_id {
            Some(contract_id) => {
                let ledger = self.ledger.clone();
                guard(
                    Operation::Disconnect.as_str(),
                    self.budget(Operation::Disconnect),
                    async move { ledger.release_wallet(&contract_id).await },
                )
                .await
            }
            None => Ok(()),
        };

        self.storage.clear_session().await;
        self.storage.clear_snapshot().await;
        {
            let mut state = self.state.lock();
            state.session = None;
            state.balance = BalanceResult::Idle;
            state.transfer = TransferResult::Idle;
            state.generation += 1;
        }
        info!("[pw-wallet] Signed out");
        released
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn budget(&self, operation: Operation) -> Duration {
        self.config.timeouts.for_operation(operation)
    }

    fn begin(&self, phase: ControllerPhase) -> Option<PhaseReset<'_>> {
        let mut state = self.state.lock();
        if state.phase.is_busy() {
            return None;
        }
        state.phase = phase;
        state.error = None;
        Some(PhaseReset { state: &*self.state })
    }

    async fn run_operation<F>(&self, operation: Operation, work: F) -> OperationOutcome
    where
        F: Future<Output = Result<(), WalletError>>,
    {
        let Some(_reset) = self.begin(ControllerPhase::Busy(operation)) else {
            return self.skipped(operation);
        };
        let _timer = HistogramTimer::for_operation(operation.as_str());
        debug!(operation = operation.as_str(), "[pw-wallet] Operation started");

        match work.await {
            Ok(()) => self.succeeded(operation),
            Err(error) => self.failed(operation, &error),
        }
    }

    fn skipped(&self, operation: Operation) -> OperationOutcome {
        debug!(operation = operation.as_str(), "[pw-wallet] Busy; request ignored");
        OPERATIONS
            .with_label_values(&[operation.as_str(), "rejected"])
            .inc();
        OperationOutcome::Skipped
    }

    fn succeeded(&self, operation: Operation) -> OperationOutcome {
        OPERATIONS
            .with_label_values(&[operation.as_str(), "success"])
            .inc();
        self.schedule_balance_refresh();
        OperationOutcome::Completed
    }

    fn failed(&self, operation: Operation, error: &WalletError) -> OperationOutcome {
        let message = classify(operation.as_str(), error);
        warn!(
            operation = operation.as_str(),
            kind = error.kind(),
            error = %error,
            "[pw-wallet] Operation failed"
        );
        let outcome = match error {
            WalletError::Timeout { .. } => "timeout",
            _ => "failure",
        };
        OPERATIONS
            .with_label_values(&[operation.as_str(), outcome])
            .inc();
        self.state.lock().error = Some(message.clone());
        OperationOutcome::Failed(message)
    }

    /// Make `session` the active one, writing the snapshot and repairing the
    /// credential record if it points at another contract.
    async fn establish(&self, session: SessionRecord, restored: bool) {
        self.storage
            .save_snapshot(&SessionSnapshot::of(&session, self.clock.now()))
            .await;

        if let Some(credential) = self.storage.get(&session.credential_id).await {
            if !invariant_session_matches_credential(&session, &credential) {
                info!(
                    credential_id = %session.credential_id,
                    contract_id = %session.contract_id,
                    "[pw-wallet] Re-pointing credential record at the connected wallet"
                );
                self.storage
                    .update(
                        &session.credential_id,
                        CredentialUpdate::contract(session.contract_id.clone()),
                    )
                    .await;
            }
        }

        let event = WalletEvent::WalletConnected {
            contract_id: session.contract_id.clone(),
            credential_id: session.credential_id.clone(),
            restored,
        };
        {
            let mut state = self.state.lock();
            let same_identity = state.session.as_ref().is_some_and(|current| {
                current.contract_id == session.contract_id
                    && current.credential_id == session.credential_id
            });
            if !same_identity {
                state.generation += 1;
                state.balance = BalanceResult::Idle;
                state.transfer = TransferResult::Idle;
            }
            state.session = Some(session);
        }
        self.publish(event).await;
    }

    fn schedule_balance_refresh(&self) {
        if !self.config.refresh_balance_after_operations {
            return;
        }
        let Some(contract_id) = self
            .state
            .lock()
            .session
            .as_ref()
            .map(|s| s.contract_id.clone())
        else {
            return;
        };
        let refresher = self.balance.clone();
        tokio::spawn(async move {
            refresher.refresh(&contract_id).await;
        });
    }

    async fn publish(&self, event: WalletEvent) {
        let name = event.name();
        self.events.publish(event).await;
        EVENTS_PUBLISHED.with_label_values(&[name]).inc();
    }
}

/// Challenge binding a transfer assertion to its exact parameters.
fn transfer_challenge(
    network_passphrase: &str,
    token_contract: &str,
    from: &str,
    to: &str,
    amount: i128,
) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(Sha256::digest(network_passphrase.as_bytes()));
    for part in [token_contract, from, to] {
        hasher.update((part.len() as u32).to_be_bytes());
        hasher.update(part.as_bytes());
    }
    hasher.update(amount.to_be_bytes());
    hasher.finalize().to_vec()
}

#[async_trait]
impl WalletApi for WalletSessionController {
    async fn restore_session(&self) -> OperationOutcome {
        WalletSessionController::restore_session(self).await
    }

    async fn create_wallet(&self, display_name: &str) -> OperationOutcome {
        WalletSessionController::create_wallet(self, display_name).await
    }

    async fn connect_wallet(&self, options: ConnectOptions) -> OperationOutcome {
        WalletSessionController::connect_wallet(self, options).await
    }

    async fn transfer(&self, request: TransferRequest) -> OperationOutcome {
        WalletSessionController::transfer(self, request).await
    }

    async fn disconnect(&self) -> OperationOutcome {
        WalletSessionController::disconnect(self).await
    }

    async fn refresh_balance(&self, contract_id: &str) -> BalanceResult {
        WalletSessionController::refresh_balance(self, contract_id).await
    }

    fn view(&self) -> SessionView {
        WalletSessionController::view(self)
    }

    fn subscribe(&self, filter: EventFilter) -> Subscription {
        self.events.subscribe(filter)
    }
}
