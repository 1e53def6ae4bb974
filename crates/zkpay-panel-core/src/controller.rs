use std::sync::Arc;

use alloy::primitives::{Address, B256, U256};
use tracing::{debug, info, warn};

use crate::domain::{
    AssetAcceptance, ChainSnapshot, ConnectionStatus, Deployment, PendingTx, QueryRequest,
    TxOutcome, TxReceipt, WriteCall, NATIVE_ASSET,
};
use crate::error::PanelError;
use crate::intent::{parse_address, parse_amount, AdminRequest, Intent, IntentOutcome};
use crate::network::{check_expected_network, ensure_expected_network};
use crate::ports::{ClockPort, ContractBinder, ContractPort, WalletPort};
use crate::session::{Session, SessionView};
use crate::state_machine::{AdminAction, AdminPhase, QueryAction, QueryPhase};

/// Payment defaults applied when a submit intent leaves fields empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryDefaults {
    pub payment_value: U256,
    pub gas_limit: u64,
}

impl Default for QueryDefaults {
    fn default() -> Self {
        Self {
            // 0.01 ether
            payment_value: U256::from(10_000_000_000_000_000u64),
            gas_limit: 1_000_000,
        }
    }
}

/// Owns the session and drives every user flow against the injected ports.
///
/// All flows run the same pipeline: local guards, wallet/network preparation,
/// then the write and its confirmation. Failures are recorded on the session
/// before they are returned.
pub struct QueryController<W, B, C>
where
    W: WalletPort,
    B: ContractBinder,
    C: ClockPort,
{
    pub wallet: W,
    pub binder: B,
    pub clock: C,
    deployment: Deployment,
    defaults: QueryDefaults,
    session: Session,
    contract: Option<Arc<B::Contract>>,
}

impl<W, B, C> QueryController<W, B, C>
where
    W: WalletPort,
    B: ContractBinder,
    C: ClockPort,
{
    pub fn new(wallet: W, binder: B, clock: C, deployment: Deployment, defaults: QueryDefaults) -> Self {
        Self {
            wallet,
            binder,
            clock,
            deployment,
            defaults,
            session: Session::new(),
            contract: None,
        }
    }

    pub fn deployment(&self) -> &Deployment {
        &self.deployment
    }

    pub fn defaults(&self) -> QueryDefaults {
        self.defaults
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn view(&self) -> SessionView {
        self.session.view()
    }

    pub async fn handle(&mut self, intent: Intent) -> Result<IntentOutcome, PanelError> {
        debug!(intent = intent.kind(), "handling intent");
        match intent {
            Intent::Connect => self.connect().await.map(IntentOutcome::Connected),
            Intent::Disconnect => {
                self.disconnect();
                Ok(IntentOutcome::Disconnected)
            }
            Intent::Refresh => self.refresh().await.map(IntentOutcome::Refreshed),
            Intent::SubmitQuery { amount, payload } => {
                let payment_value = match parse_amount(&amount, self.defaults.payment_value) {
                    Ok(value) => value,
                    Err(err) => return self.settle(Err(err)),
                };
                let payload = match payload.transpose() {
                    Ok(payload) => payload,
                    Err(err) => return self.settle(Err(err)),
                };
                let request = QueryRequest {
                    payment_value,
                    gas_limit: self.defaults.gas_limit,
                    payload,
                };
                self.submit_query(request)
                    .await
                    .map(IntentOutcome::QuerySubmitted)
            }
            Intent::Withdraw => self.withdraw().await.map(IntentOutcome::Confirmed),
            Intent::CancelQuery => self.cancel_query().await.map(IntentOutcome::Confirmed),
            Intent::Initialize { peer } => {
                let peer = match parse_address("peer contract", &peer) {
                    Ok(peer) => peer,
                    Err(err) => return self.settle(Err(err)),
                };
                self.initialize(peer).await.map(IntentOutcome::Confirmed)
            }
            Intent::AddRelayer { relayer } => {
                let relayer = match relayer.as_deref().map(|r| parse_address("relayer", r)) {
                    Some(Ok(relayer)) => Some(relayer),
                    Some(Err(err)) => return self.settle(Err(err)),
                    None => None,
                };
                self.add_trusted_relayer(relayer)
                    .await
                    .map(IntentOutcome::Confirmed)
            }
            Intent::SetAcceptedAsset {
                asset,
                accepted_for_payment,
                secondary_flag,
            } => {
                let asset = if asset.trim().is_empty() {
                    NATIVE_ASSET
                } else {
                    match parse_address("asset", &asset) {
                        Ok(asset) => asset,
                        Err(err) => return self.settle(Err(err)),
                    }
                };
                self.set_accepted_asset(AssetAcceptance {
                    asset,
                    accepted_for_payment,
                    secondary_flag,
                })
                .await
                .map(IntentOutcome::Confirmed)
            }
        }
    }

    /// Initial load: binds read-only, checks the network without prompting and
    /// resynchronizes from chain state.
    pub async fn mount(&mut self) -> Result<ChainSnapshot, PanelError> {
        let result = self.refresh_inner().await;
        self.settle(result)
    }

    pub async fn refresh(&mut self) -> Result<ChainSnapshot, PanelError> {
        let result = self.refresh_inner().await;
        self.settle(result)
    }

    pub async fn connect(&mut self) -> Result<Address, PanelError> {
        self.session.begin_connect();
        let result = match self.establish().await {
            Ok(account) => {
                info!(%account, chain_id = self.deployment.expected_chain_id, "wallet connected");
                self.session.report(format!("Connected as {account}"));
                self.resync_quietly().await;
                Ok(account)
            }
            Err(err) => {
                self.session.connect_failed();
                Err(err)
            }
        };
        self.settle(result)
    }

    pub fn disconnect(&mut self) {
        self.session.reset();
        self.contract = None;
        self.session.report("Disconnected");
        info!("session reset");
    }

    /// Submits a paid query and waits for it to be mined. Returns the query
    /// hash the contract reports afterwards.
    pub async fn submit_query(&mut self, request: QueryRequest) -> Result<Option<B256>, PanelError> {
        let result = self.submit_query_inner(request).await;
        self.settle(result)
    }

    pub async fn cancel_query(&mut self) -> Result<TxReceipt, PanelError> {
        let result = self.cancel_query_inner().await;
        self.settle(result)
    }

    pub async fn withdraw(&mut self) -> Result<TxReceipt, PanelError> {
        self.run_admin(AdminRequest::Withdraw).await
    }

    pub async fn initialize(&mut self, peer: Address) -> Result<TxReceipt, PanelError> {
        self.run_admin(AdminRequest::Initialize { peer }).await
    }

    /// Trusts `relayer`, or the connected account when none is given.
    pub async fn add_trusted_relayer(&mut self, relayer: Option<Address>) -> Result<TxReceipt, PanelError> {
        let relayer = match relayer.or(self.session.account()) {
            Some(relayer) => relayer,
            None => return self.settle(Err(PanelError::NoWalletSigner)),
        };
        self.run_admin(AdminRequest::AddTrustedRelayer { relayer }).await
    }

    pub async fn set_accepted_asset(&mut self, acceptance: AssetAcceptance) -> Result<TxReceipt, PanelError> {
        self.run_admin(AdminRequest::SetAcceptedAsset(acceptance)).await
    }

    async fn run_admin(&mut self, request: AdminRequest) -> Result<TxReceipt, PanelError> {
        let result = self.admin_inner(request).await;
        self.settle(result)
    }

    fn settle<T>(&mut self, result: Result<T, PanelError>) -> Result<T, PanelError> {
        if let Err(err) = &result {
            warn!(kind = ?err.kind(), retry = ?err.retry_policy(), error = %err, "panel action failed");
            self.session.record_error(err);
        }
        result
    }

    /// Pins the network, requests accounts and (re)binds the contract when the
    /// signer changed.
    async fn establish(&mut self) -> Result<Address, PanelError> {
        ensure_expected_network(&self.wallet, self.deployment.expected_chain_id).await?;
        let accounts = self.wallet.request_accounts().await?;
        let account = accounts
            .first()
            .copied()
            .ok_or(PanelError::NoWalletSigner)?;

        let rebind = match &self.contract {
            Some(contract) => contract.signer() != Some(account),
            None => true,
        };
        if rebind {
            debug!(%account, address = %self.deployment.address, "binding contract to signer");
            self.contract = Some(self.binder.bind(&self.deployment, Some(account))?);
        }
        self.session.connected(account);
        Ok(account)
    }

    /// Every write starts here; it connects on demand.
    async fn prepare(&mut self) -> Result<Arc<B::Contract>, PanelError> {
        let was_connected = self.session.connection() == ConnectionStatus::Connected;
        if !was_connected {
            self.session.begin_connect();
        }
        if let Err(err) = self.establish().await {
            self.session.connect_failed();
            return Err(err);
        }
        self.contract.clone().ok_or(PanelError::NoWalletSigner)
    }

    fn ensure_write_slot(&self) -> Result<(), PanelError> {
        let query = self.session.query_phase();
        if query.write_in_flight() {
            return Err(PanelError::WriteInFlight(format!("query {}", query.label())));
        }
        if let AdminPhase::Pending { call, .. } = self.session.admin_phase() {
            return Err(PanelError::WriteInFlight(call.signature().to_owned()));
        }
        Ok(())
    }

    async fn submit_query_inner(&mut self, request: QueryRequest) -> Result<Option<B256>, PanelError> {
        if let QueryPhase::Confirmed { query_hash } = self.session.query_phase() {
            return Err(PanelError::QueryAlreadyPending(query_hash));
        }
        self.ensure_write_slot()?;

        let surface = self.deployment.surface;
        let call = if request.payload.is_some() {
            WriteCall::QueryWithNative
        } else {
            WriteCall::QueryZkPay
        };
        if request.payload.is_none() && surface.has_structured_query {
            return Err(PanelError::InvalidInput(
                "this deployment requires a structured query payload".to_owned(),
            ));
        }
        surface.require_write(call)?;
        if request.payment_value.is_zero() {
            return Err(PanelError::InvalidInput(
                "query payment must be greater than zero".to_owned(),
            ));
        }
        if request.gas_limit == 0 {
            return Err(PanelError::InvalidInput("gas limit must be non-zero".to_owned()));
        }
        if let Some(payload) = &request.payload {
            payload.validate(self.clock.now_ms()?)?;
        }

        let contract = self.prepare().await?;
        if surface.has_asset_acceptance {
            let acceptance = contract.accepted_asset(NATIVE_ASSET).await?;
            if !acceptance.accepted_for_payment {
                return Err(PanelError::AssetNotAccepted(NATIVE_ASSET));
            }
        }

        self.session.apply_query(QueryAction::Submit)?;
        let sent = match &request.payload {
            Some(payload) => {
                contract
                    .query_with_native(payload, request.payment_value, request.gas_limit)
                    .await
            }
            None => {
                contract
                    .query_zkpay(request.payment_value, request.gas_limit)
                    .await
            }
        };
        let pending = match sent {
            Ok(pending) => pending,
            Err(err) => {
                self.session.apply_query(QueryAction::SubmitFailed)?;
                return Err(err);
            }
        };
        self.session.record_tx(pending.tx_hash);
        self.session.apply_query(QueryAction::Broadcast {
            tx_hash: pending.tx_hash,
        })?;
        self.session.report("Query sent, awaiting confirmation.");
        info!(tx_hash = %pending.tx_hash, value = %request.payment_value, "query transaction broadcast");

        match contract.wait_for_confirmation(&pending).await {
            Ok(receipt) => {
                debug!(block = ?receipt.block_number, "query transaction mined");
            }
            Err(err @ PanelError::TransactionUnconfirmed(_)) => return Err(err),
            Err(err) => {
                self.session.apply_query(QueryAction::Revert)?;
                return Err(err);
            }
        }

        // The tx is mined; if the hash read fails the phase stays put until a refresh.
        let query_hash = contract.query_hash().await?;
        let settled = if query_hash == B256::ZERO {
            self.session.apply_query(QueryAction::ConfirmWithoutHash)?;
            self.session
                .report("Query confirmed and already resolved on-chain.");
            None
        } else {
            self.session.apply_query(QueryAction::Confirm { query_hash })?;
            self.session.report(format!("Query confirmed: {query_hash}"));
            Some(query_hash)
        };
        info!(query_hash = ?settled, "query confirmed");
        self.resync_quietly().await;
        Ok(settled)
    }

    async fn cancel_query_inner(&mut self) -> Result<TxReceipt, PanelError> {
        let query_hash = match self.session.query_phase() {
            QueryPhase::Confirmed { query_hash } => query_hash,
            phase if phase.write_in_flight() => {
                return Err(PanelError::WriteInFlight(format!("query {}", phase.label())))
            }
            _ => return Err(PanelError::NoPendingQuery),
        };
        self.ensure_write_slot()?;
        self.deployment.surface.require_write(WriteCall::CancelQuery)?;

        let contract = self.prepare().await?;
        self.session.apply_query(QueryAction::Cancel)?;
        let pending = match contract.cancel_query(query_hash).await {
            Ok(pending) => pending,
            Err(err) => {
                self.session.apply_query(QueryAction::CancelFailed)?;
                return Err(err);
            }
        };
        self.session.record_tx(pending.tx_hash);
        self.session.apply_query(QueryAction::CancelBroadcast {
            tx_hash: pending.tx_hash,
        })?;
        self.session.report("Cancellation sent, awaiting confirmation.");
        info!(%query_hash, tx_hash = %pending.tx_hash, "cancel transaction broadcast");

        match contract.wait_for_confirmation(&pending).await {
            Ok(receipt) => {
                self.session.apply_query(QueryAction::CancelConfirmed)?;
                self.session.report("Query cancelled successfully");
                info!(%query_hash, "query cancelled");
                self.resync_quietly().await;
                Ok(receipt)
            }
            Err(err @ PanelError::TransactionUnconfirmed(_)) => Err(err),
            Err(err) => {
                self.session.apply_query(QueryAction::CancelFailed)?;
                Err(err)
            }
        }
    }

    async fn admin_inner(&mut self, request: AdminRequest) -> Result<TxReceipt, PanelError> {
        let call = request.call();
        self.ensure_write_slot()?;
        let surface = self.deployment.surface;
        surface.require_write(call)?;
        match request {
            AdminRequest::Initialize { peer } if peer == Address::ZERO => {
                return Err(PanelError::InvalidInput(
                    "peer contract must not be the zero address".to_owned(),
                ))
            }
            AdminRequest::AddTrustedRelayer { relayer } if relayer == Address::ZERO => {
                return Err(PanelError::InvalidInput(
                    "relayer must not be the zero address".to_owned(),
                ))
            }
            _ => {}
        }

        let contract = self.prepare().await?;
        let caller = contract.signer().ok_or(PanelError::NoWalletSigner)?;
        if surface.has_owner_admin {
            let owner = contract.owner().await?;
            self.session.apply_snapshot(&ChainSnapshot {
                owner: Some(owner),
                ..ChainSnapshot::default()
            });
            if owner != caller {
                return Err(PanelError::NotOwner { owner, caller });
            }
        }

        self.session.apply_admin(AdminAction::Begin(call))?;
        let sent = dispatch_admin(contract.as_ref(), request).await;
        let pending = match sent {
            Ok(pending) => pending,
            Err(err) => {
                self.session.apply_admin(AdminAction::Finish)?;
                return Err(err);
            }
        };
        self.session.record_tx(pending.tx_hash);
        self.session.apply_admin(AdminAction::Broadcast {
            tx_hash: pending.tx_hash,
        })?;
        self.session
            .report(format!("{} sent, awaiting confirmation.", request.label()));
        info!(call = call.signature(), tx_hash = %pending.tx_hash, "admin transaction broadcast");

        match contract.wait_for_confirmation(&pending).await {
            Ok(receipt) => {
                self.session.apply_admin(AdminAction::Finish)?;
                self.session.report(request.success_message());
                self.resync_quietly().await;
                Ok(receipt)
            }
            Err(err @ PanelError::TransactionUnconfirmed(_)) => Err(err),
            Err(err) => {
                self.session.apply_admin(AdminAction::Finish)?;
                Err(err)
            }
        }
    }

    /// Connected sessions may be asked to switch back; otherwise the chain id is
    /// only checked. Nothing is read from the wrong chain.
    async fn refresh_inner(&mut self) -> Result<ChainSnapshot, PanelError> {
        let expected = self.deployment.expected_chain_id;
        if self.session.connection() == ConnectionStatus::Connected {
            ensure_expected_network(&self.wallet, expected).await?;
        } else {
            check_expected_network(&self.wallet, expected).await?;
        }
        if self.contract.is_none() {
            self.contract = Some(self.binder.bind(&self.deployment, None)?);
        }
        self.resync().await
    }

    async fn resync_quietly(&mut self) {
        if let Err(err) = self.resync().await {
            warn!(error = %err, "post-action resync failed");
        }
    }

    /// Re-reads chain state and reconciles the session with it. Individual read
    /// failures keep the previous values.
    async fn resync(&mut self) -> Result<ChainSnapshot, PanelError> {
        let contract = self.contract.clone().ok_or(PanelError::NoWalletSigner)?;
        let adopt_chain_hash = self.settle_in_flight(contract.as_ref()).await;

        let snapshot = read_snapshot(contract.as_ref(), self.session.account()).await;
        if snapshot.failed_reads > 0 {
            warn!(failed = snapshot.failed_reads, "resync completed with stale fields");
        }
        self.session.apply_snapshot(&snapshot);

        if adopt_chain_hash || !self.session.query_phase().write_in_flight() {
            self.reconcile_query(snapshot.query_hash)?;
        }
        Ok(snapshot)
    }

    /// Resolves writes left in flight by an earlier timeout. Returns whether the
    /// query phase should now follow the on-chain query hash.
    async fn settle_in_flight(&mut self, contract: &B::Contract) -> bool {
        let mut adopt = false;
        match self.session.query_phase() {
            QueryPhase::AwaitingConfirmation { tx_hash } => {
                match contract.transaction_outcome(tx_hash).await {
                    Ok(Some(TxOutcome::Confirmed(_))) => adopt = true,
                    Ok(Some(TxOutcome::Reverted { reason, .. })) => {
                        if self.session.apply_query(QueryAction::Revert).is_ok() {
                            self.session
                                .record_error(&PanelError::TransactionReverted { reason });
                        }
                    }
                    Ok(None) => debug!(%tx_hash, "query transaction still pending"),
                    Err(err) => warn!(%tx_hash, error = %err, "receipt lookup failed"),
                }
            }
            QueryPhase::Cancelling {
                tx_hash: Some(tx_hash),
                ..
            } => match contract.transaction_outcome(tx_hash).await {
                Ok(Some(TxOutcome::Confirmed(_))) => {
                    if self.session.apply_query(QueryAction::CancelConfirmed).is_ok() {
                        self.session.report("Query cancelled successfully");
                    }
                    adopt = true;
                }
                Ok(Some(TxOutcome::Reverted { reason, .. })) => {
                    if self.session.apply_query(QueryAction::CancelFailed).is_ok() {
                        self.session
                            .record_error(&PanelError::TransactionReverted { reason });
                    }
                }
                Ok(None) => debug!(%tx_hash, "cancel transaction still pending"),
                Err(err) => warn!(%tx_hash, error = %err, "receipt lookup failed"),
            },
            // Nothing observable was broadcast; the chain is authoritative.
            QueryPhase::Submitting | QueryPhase::Cancelling { tx_hash: None, .. } => adopt = true,
            QueryPhase::Idle | QueryPhase::Confirmed { .. } => {}
        }

        match self.session.admin_phase() {
            AdminPhase::Pending {
                call,
                tx_hash: Some(tx_hash),
            } => match contract.transaction_outcome(tx_hash).await {
                Ok(Some(TxOutcome::Confirmed(_))) => {
                    if self.session.apply_admin(AdminAction::Finish).is_ok() {
                        self.session
                            .report(format!("{} confirmed", call.signature()));
                    }
                }
                Ok(Some(TxOutcome::Reverted { reason, .. })) => {
                    if self.session.apply_admin(AdminAction::Finish).is_ok() {
                        self.session
                            .record_error(&PanelError::TransactionReverted { reason });
                    }
                }
                Ok(None) => debug!(%tx_hash, "admin transaction still pending"),
                Err(err) => warn!(%tx_hash, error = %err, "receipt lookup failed"),
            },
            AdminPhase::Pending { tx_hash: None, .. } => {
                let _ = self.session.apply_admin(AdminAction::Finish);
            }
            AdminPhase::Idle => {}
        }
        adopt
    }

    fn reconcile_query(&mut self, observed: Option<B256>) -> Result<(), PanelError> {
        let Some(observed) = observed else {
            return Ok(());
        };
        let current = self.session.current_query_hash().unwrap_or(B256::ZERO);
        let phase = self.session.query_phase();
        if observed == current && !phase.write_in_flight() {
            return Ok(());
        }
        self.session.apply_query(QueryAction::Observe {
            query_hash: Some(observed),
        })?;
        if observed == B256::ZERO {
            if current != B256::ZERO {
                self.session.report("Query resolved on-chain.");
            }
        } else if observed != current {
            self.session
                .report(format!("Pending query found on-chain: {observed}"));
        }
        info!(query_hash = %observed, "query phase reconciled with chain");
        Ok(())
    }
}

impl AdminRequest {
    pub fn call(&self) -> WriteCall {
        match self {
            AdminRequest::Initialize { .. } => WriteCall::Initialize,
            AdminRequest::Withdraw => WriteCall::Withdraw,
            AdminRequest::AddTrustedRelayer { .. } => WriteCall::AddTrustedRelayer,
            AdminRequest::SetAcceptedAsset(_) => WriteCall::SetAcceptedAsset,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            AdminRequest::Initialize { .. } => "Initialization",
            AdminRequest::Withdraw => "Withdrawal",
            AdminRequest::AddTrustedRelayer { .. } => "Relayer registration",
            AdminRequest::SetAcceptedAsset(_) => "Asset update",
        }
    }

    fn success_message(&self) -> String {
        match self {
            AdminRequest::Initialize { peer } => format!("Initialized with peer contract {peer}"),
            AdminRequest::Withdraw => "Withdrawal confirmed".to_owned(),
            AdminRequest::AddTrustedRelayer { relayer } => format!("Relayer {relayer} is now trusted"),
            AdminRequest::SetAcceptedAsset(acceptance) => format!(
                "Asset {} acceptance set to {}",
                acceptance.asset, acceptance.accepted_for_payment
            ),
        }
    }
}

async fn dispatch_admin<P>(contract: &P, request: AdminRequest) -> Result<PendingTx, PanelError>
where
    P: ContractPort + ?Sized,
{
    match request {
        AdminRequest::Initialize { peer } => contract.initialize(peer).await,
        AdminRequest::Withdraw => contract.withdraw().await,
        AdminRequest::AddTrustedRelayer { relayer } => contract.add_trusted_relayer(relayer).await,
        AdminRequest::SetAcceptedAsset(acceptance) => contract.set_accepted_asset(&acceptance).await,
    }
}

/// Issues every read the surface supports concurrently.
pub async fn read_snapshot<P>(contract: &P, account: Option<Address>) -> ChainSnapshot
where
    P: ContractPort + ?Sized,
{
    let surface = contract.deployment().surface;
    let owner = async {
        if surface.has_owner_admin {
            Some(contract.owner().await)
        } else {
            None
        }
    };
    let peer = async {
        if surface.has_owner_admin {
            Some(contract.peer_contract().await)
        } else {
            None
        }
    };
    let query_hash = async { Some(contract.query_hash().await) };
    let airdrop = async {
        if surface.has_airdrop_status {
            Some(contract.airdrop_executed().await)
        } else {
            None
        }
    };
    let relayer = async {
        match account {
            Some(account) if surface.has_relayer_trust => {
                Some(contract.is_trusted_relayer(account).await)
            }
            _ => None,
        }
    };
    let (owner, peer, query_hash, airdrop, relayer) =
        futures::join!(owner, peer, query_hash, airdrop, relayer);

    let mut failed_reads = 0;
    ChainSnapshot {
        owner: keep(owner, "owner", &mut failed_reads),
        peer_contract: keep(peer, "peer_contract", &mut failed_reads),
        query_hash: keep(query_hash, "query_hash", &mut failed_reads),
        airdrop_executed: keep(airdrop, "airdrop_executed", &mut failed_reads),
        account_is_trusted_relayer: keep(relayer, "is_trusted_relayer", &mut failed_reads),
        failed_reads,
    }
}

fn keep<T>(read: Option<Result<T, PanelError>>, field: &'static str, failed: &mut usize) -> Option<T> {
    match read {
        Some(Ok(value)) => Some(value),
        Some(Err(err)) => {
            warn!(field, error = %err, "read failed; keeping previous value");
            *failed += 1;
            None
        }
        None => None,
    }
}
