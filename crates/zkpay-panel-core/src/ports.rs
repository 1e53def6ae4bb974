use std::sync::Arc;

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;

use crate::domain::{
    AssetAcceptance, Deployment, PendingTx, QueryPayload, TimestampMs, TxOutcome, TxReceipt,
};
use crate::error::PanelError;

/// Injected wallet provider. Every call may open a prompt the user can refuse.
#[async_trait(?Send)]
pub trait WalletPort {
    async fn request_accounts(&self) -> Result<Vec<Address>, PanelError>;
    async fn chain_id(&self) -> Result<u64, PanelError>;
    async fn switch_chain(&self, chain_id: u64) -> Result<(), PanelError>;
}

/// Typed calls against one bound deployment.
///
/// Read calls are side-effect free. Write calls return as soon as the wallet
/// has broadcast the transaction; use [`ContractPort::wait_for_confirmation`]
/// before treating the action as done.
#[async_trait(?Send)]
pub trait ContractPort {
    fn deployment(&self) -> &Deployment;
    fn signer(&self) -> Option<Address>;

    async fn owner(&self) -> Result<Address, PanelError>;
    async fn peer_contract(&self) -> Result<Address, PanelError>;
    async fn query_hash(&self) -> Result<B256, PanelError>;
    async fn airdrop_executed(&self) -> Result<bool, PanelError>;
    async fn accepted_asset(&self, asset: Address) -> Result<AssetAcceptance, PanelError>;
    async fn is_trusted_relayer(&self, relayer: Address) -> Result<bool, PanelError>;

    async fn initialize(&self, peer: Address) -> Result<PendingTx, PanelError>;
    async fn query_zkpay(&self, value: U256, gas_limit: u64) -> Result<PendingTx, PanelError>;
    async fn query_with_native(
        &self,
        payload: &QueryPayload,
        value: U256,
        gas_limit: u64,
    ) -> Result<PendingTx, PanelError>;
    async fn withdraw(&self) -> Result<PendingTx, PanelError>;
    async fn cancel_query(&self, query_hash: B256) -> Result<PendingTx, PanelError>;
    async fn add_trusted_relayer(&self, relayer: Address) -> Result<PendingTx, PanelError>;
    async fn set_accepted_asset(
        &self,
        acceptance: &AssetAcceptance,
    ) -> Result<PendingTx, PanelError>;

    /// Single receipt lookup; `None` while the transaction is not mined.
    async fn transaction_outcome(&self, tx_hash: B256) -> Result<Option<TxOutcome>, PanelError>;

    /// Blocks until the transaction is mined or the confirmation budget runs out.
    async fn wait_for_confirmation(&self, pending: &PendingTx) -> Result<TxReceipt, PanelError>;
}

/// Produces contract bindings for a deployment, optionally bound to a signer.
pub trait ContractBinder {
    type Contract: ContractPort;

    fn bind(
        &self,
        deployment: &Deployment,
        signer: Option<Address>,
    ) -> Result<Arc<Self::Contract>, PanelError>;
}

pub trait ClockPort {
    fn now_ms(&self) -> Result<TimestampMs, PanelError>;
}
