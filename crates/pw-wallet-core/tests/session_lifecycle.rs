//! # Session Lifecycle Integration Tests
//!
//! Drive `WalletSessionController` end to end through its public API with the
//! mock provider, mock ledger and in-process stores.
//!
//! Time-dependent tests run on a paused tokio clock, so budgets of tens of
//! seconds elapse instantly once every task is idle.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use pw_bus::{EventFilter, EventTopic, WalletEvent};
use pw_wallet_core::algorithms::error_classifier::{
    MSG_CANCELLED, MSG_CONFIRMATION_TIMEOUT, MSG_INVALID_AMOUNT,
};
use pw_wallet_core::config::DEFAULT_NATIVE_TOKEN;
use pw_wallet_core::{
    BalanceResult, ConnectOptions, ControllerPhase, CredentialErrorCode, FixedTimeSource,
    FlakyKeyValueStore, InMemoryKeyValueStore, KeyValueStore, MockCredentialProvider, MockLedger,
    Operation, OperationOutcome, SessionRecord, SessionSnapshot, SessionView, StorageMode,
    TimeSource, TransferRequest, TransferResult, WalletApi, WalletConfig, WalletSessionController,
    WireValue,
};
use tokio::sync::Notify;

const CREDENTIAL: &str = "mock-credential-1";
const RECIPIENT: &str = "GAAZI4TCR3TY5OJHCTJC2A4QSY6CJWJH5IAJTGKIN2ER7LBNVKOCCWN7";

struct Fixture {
    controller: Arc<WalletSessionController>,
    provider: Arc<MockCredentialProvider>,
    ledger: Arc<MockLedger>,
    clock: Arc<FixedTimeSource>,
}

fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().unwrap()
}

fn wallet_contract() -> String {
    MockLedger::contract_for(CREDENTIAL, &[4u8; 65])
}

fn fixture_with(config: WalletConfig, store: Arc<dyn KeyValueStore>) -> Fixture {
    let provider = Arc::new(MockCredentialProvider::default());
    let ledger = Arc::new(MockLedger::default());
    let clock = Arc::new(FixedTimeSource::new(start_time()));
    let controller = Arc::new(WalletSessionController::new(
        config,
        provider.clone(),
        ledger.clone(),
        store,
        clock.clone(),
    ));
    Fixture {
        controller,
        provider,
        ledger,
        clock,
    }
}

fn fixture() -> Fixture {
    fixture_with(
        WalletConfig::for_testing(),
        Arc::new(InMemoryKeyValueStore::new()),
    )
}

async fn wait_for(
    controller: &WalletSessionController,
    condition: impl Fn(&SessionView) -> bool,
) -> SessionView {
    for _ in 0..1_000 {
        let view = controller.view();
        if condition(&view) {
            return view;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition never reached: {:?}", controller.view());
}

async fn connected_fixture() -> Fixture {
    let f = fixture();
    assert_eq!(
        f.controller.create_wallet("Alice").await,
        OperationOutcome::Completed
    );
    f
}

// =============================================================================
// Startup restore chain
// =============================================================================

#[tokio::test]
async fn test_empty_startup_is_idle_unauthenticated_without_error() {
    let f = fixture();

    assert_eq!(f.controller.restore_session().await, OperationOutcome::Completed);

    let view = f.controller.view();
    assert_eq!(view.phase, ControllerPhase::Idle);
    assert!(!view.is_authenticated());
    assert_eq!(view.error, None);
    assert_eq!(view.storage_mode, StorageMode::Persistent);
    assert_eq!(f.provider.authenticate_calls(), 0);
}

#[tokio::test]
async fn test_live_session_restores_silently() {
    let f = fixture();
    let contract = wallet_contract();
    f.ledger.register_wallet(CREDENTIAL, &contract);
    let session = SessionRecord::starting_at(
        &contract,
        CREDENTIAL,
        start_time(),
        chrono::Duration::hours(1),
    );
    f.controller.storage().save_session(&session).await;
    let mut events = f.controller.subscribe(EventFilter::topics(vec![EventTopic::Session]));

    assert_eq!(f.controller.restore_session().await, OperationOutcome::Completed);

    let view = f.controller.view();
    assert_eq!(view.contract_id.as_deref(), Some(contract.as_str()));
    assert_eq!(view.expires_at, Some(session.expires_at));
    assert_eq!(f.provider.authenticate_calls(), 0);
    assert!(f.controller.storage().get_snapshot().await.is_some());
    assert!(matches!(
        events.try_recv(),
        Ok(Some(WalletEvent::WalletConnected { restored: true, .. }))
    ));
}

#[tokio::test]
async fn test_expired_session_passes_through_reauth() {
    let f = fixture();
    let contract = wallet_contract();
    f.ledger.register_wallet(CREDENTIAL, &contract);
    let expired = SessionRecord::starting_at(
        &contract,
        CREDENTIAL,
        start_time() - chrono::Duration::days(8),
        chrono::Duration::days(7),
    );
    f.controller.storage().save_session(&expired).await;

    let gate = Arc::new(Notify::new());
    f.provider.gate_with(gate.clone());
    let mut events = f.controller.subscribe(EventFilter::all());

    let controller = f.controller.clone();
    let restore = tokio::spawn(async move { controller.restore_session().await });

    wait_for(&f.controller, |v| {
        v.phase == ControllerPhase::Busy(Operation::Reauth)
    })
    .await;
    assert!(matches!(
        events.try_recv(),
        Ok(Some(WalletEvent::SessionExpired { ref credential_id, .. })) if credential_id == CREDENTIAL
    ));

    gate.notify_one();
    assert_eq!(restore.await.unwrap(), OperationOutcome::Completed);

    let view = f.controller.view();
    assert_eq!(view.phase, ControllerPhase::Idle);
    assert_eq!(view.contract_id.as_deref(), Some(contract.as_str()));
    assert!(view.expires_at.unwrap() > f.clock.now());
    assert_eq!(
        f.provider.last_assertion_options().unwrap().allow_credentials,
        vec![CREDENTIAL.to_string()]
    );
}

#[tokio::test]
async fn test_cancelled_reauth_surfaces_message_and_returns_to_idle() {
    let f = fixture();
    let expired = SessionRecord::starting_at(
        wallet_contract(),
        CREDENTIAL,
        start_time() - chrono::Duration::days(8),
        chrono::Duration::days(7),
    );
    f.controller.storage().save_session(&expired).await;
    f.provider
        .fail("authenticate", CredentialErrorCode::Cancelled, "user dismissed");

    let outcome = f.controller.restore_session().await;

    assert_eq!(outcome, OperationOutcome::Failed(MSG_CANCELLED.to_string()));
    let view = f.controller.view();
    assert_eq!(view.phase, ControllerPhase::Idle);
    assert_eq!(view.error.as_deref(), Some(MSG_CANCELLED));
    assert!(!view.is_authenticated());
}

#[tokio::test]
async fn test_snapshot_fallback_rewrites_session_with_fresh_expiry() {
    let f = fixture();
    let contract = wallet_contract();
    let snapshot = SessionSnapshot {
        contract_id: contract.clone(),
        credential_id: CREDENTIAL.to_string(),
        updated_at: start_time() - chrono::Duration::days(30),
    };
    f.controller.storage().save_snapshot(&snapshot).await;

    assert_eq!(f.controller.restore_session().await, OperationOutcome::Completed);

    let view = f.controller.view();
    assert_eq!(view.contract_id.as_deref(), Some(contract.as_str()));
    let expected_expiry = start_time() + WalletConfig::for_testing().session_ttl();
    assert_eq!(view.expires_at, Some(expected_expiry));

    let rewritten = f.controller.storage().get_session().await.unwrap();
    assert_eq!(rewritten.contract_id, contract);
    assert_eq!(rewritten.expires_at, expected_expiry);
}

#[tokio::test(start_paused = true)]
async fn test_silent_restore_timeout_falls_back_to_snapshot() {
    let f = fixture();
    let contract = wallet_contract();
    let session = SessionRecord::starting_at(
        &contract,
        CREDENTIAL,
        start_time(),
        chrono::Duration::hours(1),
    );
    f.controller.storage().save_session(&session).await;
    f.controller
        .storage()
        .save_snapshot(&SessionSnapshot::of(&session, start_time()))
        .await;
    f.ledger.hang("find");

    let started = tokio::time::Instant::now();
    assert_eq!(f.controller.restore_session().await, OperationOutcome::Completed);

    assert!(started.elapsed() >= Duration::from_secs(10));
    let view = f.controller.view();
    assert_eq!(view.contract_id.as_deref(), Some(contract.as_str()));
    assert_eq!(view.error, None);
}

// =============================================================================
// Operations
// =============================================================================

#[tokio::test]
async fn test_create_wallet_emits_events_and_funds_when_enabled() {
    let config = WalletConfig {
        fund_on_create: true,
        ..WalletConfig::for_testing()
    };
    let f = fixture_with(config, Arc::new(InMemoryKeyValueStore::new()));
    let mut events = f.controller.subscribe(EventFilter::all());

    assert_eq!(f.controller.create_wallet("  Alice  ").await, OperationOutcome::Completed);

    let contract = wallet_contract();
    assert_eq!(f.ledger.funded(), vec![contract.clone()]);
    assert!(matches!(
        events.try_recv(),
        Ok(Some(WalletEvent::CredentialCreated { ref contract_id, .. })) if *contract_id == contract
    ));
    assert!(matches!(
        events.try_recv(),
        Ok(Some(WalletEvent::WalletConnected { restored: false, .. }))
    ));

    let known = f.controller.known_credentials().await;
    assert_eq!(known.len(), 1);
    assert_eq!(known[0].display_name, "Alice");
}

#[tokio::test]
async fn test_connect_uses_stored_credential_and_touches_it() {
    let f = connected_fixture().await;
    f.controller.disconnect().await;
    f.clock.advance(chrono::Duration::minutes(5));

    let outcome = f
        .controller
        .connect_wallet(ConnectOptions::for_credential(CREDENTIAL))
        .await;

    assert_eq!(outcome, OperationOutcome::Completed);
    assert_eq!(
        f.controller.view().contract_id.as_deref(),
        Some(wallet_contract().as_str())
    );
    let record = f.controller.storage().get(CREDENTIAL).await.unwrap();
    assert_eq!(record.last_used_at, Some(f.clock.now()));
}

#[tokio::test]
async fn test_connect_cancelled_is_classified() {
    let f = fixture();
    f.provider
        .fail("authenticate", CredentialErrorCode::NoCredential, "none on device");

    let outcome = f.controller.connect_wallet(ConnectOptions::default()).await;

    assert_eq!(outcome, OperationOutcome::Failed(MSG_CANCELLED.to_string()));
    assert_eq!(f.controller.view().error.as_deref(), Some(MSG_CANCELLED));
}

#[tokio::test(start_paused = true)]
async fn test_create_times_out_at_budget() {
    let f = fixture();
    f.provider.hang("create");

    let started = tokio::time::Instant::now();
    let outcome = f.controller.create_wallet("Alice").await;

    assert!(started.elapsed() >= Duration::from_secs(90));
    assert!(matches!(outcome, OperationOutcome::Failed(ref m) if m.contains("took too long")));
    assert_eq!(f.controller.view().phase, ControllerPhase::Idle);
}

#[tokio::test]
async fn test_transfer_while_busy_is_a_noop() {
    let f = fixture();
    let gate = Arc::new(Notify::new());
    f.provider.gate_with(gate.clone());

    let controller = f.controller.clone();
    let create = tokio::spawn(async move { controller.create_wallet("Alice").await });
    let before = wait_for(&f.controller, |v| {
        v.phase == ControllerPhase::Busy(Operation::Create)
    })
    .await;

    let outcome = f
        .controller
        .transfer(TransferRequest::new(DEFAULT_NATIVE_TOKEN, RECIPIENT, "1"))
        .await;

    assert_eq!(outcome, OperationOutcome::Skipped);
    assert_eq!(f.controller.view(), before);

    gate.notify_one();
    assert_eq!(create.await.unwrap(), OperationOutcome::Completed);
    assert!(f.ledger.submissions().is_empty());
}

#[tokio::test]
async fn test_transfer_success_sets_result_and_emits_event() {
    let f = connected_fixture().await;
    let mut events = f
        .controller
        .subscribe(EventFilter::topics(vec![EventTopic::Transactions]));

    let outcome = f
        .controller
        .transfer(TransferRequest::new(DEFAULT_NATIVE_TOKEN, RECIPIENT, "2.5"))
        .await;

    assert_eq!(outcome, OperationOutcome::Completed);
    let submissions = f.ledger.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].amount, 25_000_000);
    assert_eq!(submissions[0].from, wallet_contract());

    let TransferResult::Success { hash, amount, recipient, ledger } = f.controller.view().transfer
    else {
        panic!("expected success: {:?}", f.controller.view().transfer);
    };
    assert_eq!(amount, "2.5");
    assert_eq!(recipient, RECIPIENT);
    assert!(ledger.is_some());
    assert!(matches!(
        events.try_recv(),
        Ok(Some(WalletEvent::TransactionSubmitted { hash: ref h, .. })) if *h == hash
    ));
}

#[tokio::test]
async fn test_unconfirmed_transfer_keeps_hash() {
    let f = connected_fixture().await;
    f.ledger.set_confirm_transfers(false);

    let outcome = f
        .controller
        .transfer(TransferRequest::new(DEFAULT_NATIVE_TOKEN, RECIPIENT, "1"))
        .await;

    assert_eq!(
        outcome,
        OperationOutcome::Failed(MSG_CONFIRMATION_TIMEOUT.to_string())
    );
    match f.controller.view().transfer {
        TransferResult::Error { message, hash, .. } => {
            assert_eq!(message, MSG_CONFIRMATION_TIMEOUT);
            assert!(hash.is_some());
        }
        other => panic!("expected error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_invalid_transfer_fails_before_any_ceremony() {
    let f = connected_fixture().await;
    let ceremonies = f.provider.authenticate_calls();

    let outcome = f
        .controller
        .transfer(TransferRequest::new(DEFAULT_NATIVE_TOKEN, RECIPIENT, "1.123456789"))
        .await;
    assert_eq!(outcome, OperationOutcome::Failed(MSG_INVALID_AMOUNT.to_string()));

    let outcome = f
        .controller
        .transfer(TransferRequest::new(DEFAULT_NATIVE_TOKEN, "GNOTANADDRESS", "1"))
        .await;
    assert!(matches!(outcome, OperationOutcome::Failed(_)));

    // Token must be a contract, not an account.
    let outcome = f
        .controller
        .transfer(TransferRequest::new(RECIPIENT, RECIPIENT, "1"))
        .await;
    assert!(matches!(outcome, OperationOutcome::Failed(_)));

    assert_eq!(f.provider.authenticate_calls(), ceremonies);
    assert!(f.ledger.submissions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_clears_state_even_when_release_times_out() {
    let f = connected_fixture().await;
    f.ledger.hang("release");

    let started = tokio::time::Instant::now();
    let outcome = f.controller.disconnect().await;

    assert!(started.elapsed() >= Duration::from_secs(10));
    assert!(matches!(outcome, OperationOutcome::Failed(ref m) if m.contains("signed out")));
    let view = f.controller.view();
    assert_eq!(view.contract_id, None);
    assert_eq!(view.credential_id, None);
    assert_eq!(view.balance, BalanceResult::Idle);
    assert_eq!(view.transfer, TransferResult::Idle);
    assert_eq!(f.controller.storage().get_session().await, None);
    assert_eq!(f.controller.storage().get_snapshot().await, None);
    // Credential records survive sign-out.
    assert!(f.controller.storage().get(CREDENTIAL).await.is_some());
}

#[tokio::test]
async fn test_reset_device_wipes_credentials() {
    let f = connected_fixture().await;

    assert_eq!(f.controller.reset_device().await, OperationOutcome::Completed);

    assert!(f.controller.known_credentials().await.is_empty());
    assert!(!f.controller.view().is_authenticated());
    assert_eq!(f.ledger.released(), vec![wallet_contract()]);
}

// =============================================================================
// Balance
// =============================================================================

#[tokio::test]
async fn test_absent_balance_entry_reads_zero() {
    let f = connected_fixture().await;

    let result = f.controller.refresh_balance(&wallet_contract()).await;

    assert!(matches!(result, BalanceResult::Ready { ref amount, .. } if amount == "0"));
}

#[tokio::test]
async fn test_unsupported_balance_type_is_an_error() {
    let f = connected_fixture().await;
    f.ledger
        .set_balance(&wallet_contract(), WireValue::Symbol("XLM".to_string()));

    let result = f.controller.refresh_balance(&wallet_contract()).await;

    assert!(matches!(result, BalanceResult::Error(ref m) if m.contains("symbol")));
}

#[tokio::test(start_paused = true)]
async fn test_late_balance_after_disconnect_is_discarded() {
    let f = connected_fixture().await;
    let contract = wallet_contract();
    f.ledger.set_balance(&contract, WireValue::I128 { hi: 0, lo: 10_000_000 });
    f.ledger.delay("query", Duration::from_secs(5));

    let controller = f.controller.clone();
    let refresh_contract = contract.clone();
    let refresh =
        tokio::spawn(async move { controller.refresh_balance(&refresh_contract).await });
    wait_for(&f.controller, |v| v.balance == BalanceResult::Loading).await;

    assert_eq!(f.controller.disconnect().await, OperationOutcome::Completed);
    assert_eq!(refresh.await.unwrap(), BalanceResult::Idle);
    assert_eq!(f.controller.view().balance, BalanceResult::Idle);
}

#[tokio::test]
async fn test_background_refresh_after_create() {
    let config = WalletConfig {
        refresh_balance_after_operations: true,
        ..WalletConfig::for_testing()
    };
    let f = fixture_with(config, Arc::new(InMemoryKeyValueStore::new()));
    f.ledger
        .set_balance(&wallet_contract(), WireValue::I128 { hi: 0, lo: 1_234_500_000 });

    f.controller.create_wallet("Alice").await;

    let view = wait_for(&f.controller, |v| {
        matches!(v.balance, BalanceResult::Ready { .. })
    })
    .await;
    assert!(matches!(view.balance, BalanceResult::Ready { ref amount, .. } if amount == "123.45"));
}

// =============================================================================
// Storage fallback
// =============================================================================

#[tokio::test]
async fn test_failing_device_store_falls_back_to_memory() {
    let store = Arc::new(FlakyKeyValueStore::default());
    store.set_failing(true);
    let f = fixture_with(WalletConfig::for_testing(), store.clone());

    assert_eq!(f.controller.create_wallet("Alice").await, OperationOutcome::Completed);

    let view = f.controller.view();
    assert_eq!(view.storage_mode, StorageMode::MemoryOnly);
    assert!(view.is_authenticated());
    assert!(f.controller.storage().get(CREDENTIAL).await.is_some());

    store.set_failing(false);
    let calls = store.calls();
    f.controller.disconnect().await;
    assert_eq!(store.calls(), calls);
    assert_eq!(f.controller.view().storage_mode, StorageMode::MemoryOnly);
}
