//! # Inbound Ports
//!
//! API trait the presentation layer drives.

use async_trait::async_trait;
use pw_bus::{EventFilter, Subscription};

use crate::domain::{BalanceResult, ConnectOptions, OperationOutcome, SessionView, TransferRequest};

/// Wallet API - inbound port.
///
/// Operations never return errors: failures are classified into
/// [`SessionView::error`] and reported as [`OperationOutcome::Failed`].
#[async_trait]
pub trait WalletApi: Send + Sync {
    /// Run the startup restore chain.
    async fn restore_session(&self) -> OperationOutcome;

    /// Register a passkey, deploy its wallet and connect it.
    async fn create_wallet(&self, display_name: &str) -> OperationOutcome;

    /// Connect an existing wallet with a passkey assertion.
    async fn connect_wallet(&self, options: ConnectOptions) -> OperationOutcome;

    /// Sign and submit a token transfer.
    async fn transfer(&self, request: TransferRequest) -> OperationOutcome;

    /// Sign out and clear the local session.
    async fn disconnect(&self) -> OperationOutcome;

    /// Refresh the balance of `contract_id` if it is the connected wallet.
    async fn refresh_balance(&self, contract_id: &str) -> BalanceResult;

    /// Current state snapshot.
    fn view(&self) -> SessionView;

    /// Subscribe to wallet events.
    fn subscribe(&self, filter: EventFilter) -> Subscription;
}
