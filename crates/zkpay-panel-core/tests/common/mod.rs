#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;

use zkpay_panel_core::{
    AssetAcceptance, ClockPort, ContractBinder, ContractPort, Deployment, PanelError, PendingTx,
    QueryController, QueryDefaults, QueryPayload, SurfaceVariant, TimestampMs, TxOutcome,
    TxReceipt, WalletPort, WriteCall,
};

pub const CHAIN_ID: u64 = 17_000;
pub const NOW_MS: u64 = 1_760_000_000_000;

pub fn owner_address() -> Address {
    "0x1000000000000000000000000000000000000001"
        .parse()
        .expect("valid owner address")
}

pub fn stranger_address() -> Address {
    "0x2000000000000000000000000000000000000002"
        .parse()
        .expect("valid stranger address")
}

pub fn peer_address() -> Address {
    "0x000000000000000000000000000000000000BEEF"
        .parse()
        .expect("valid peer address")
}

pub fn contract_address() -> Address {
    "0xe78890E5b555e3FE258Af993A1ECd64ff523815B"
        .parse()
        .expect("valid contract address")
}

pub fn deployment(variant: SurfaceVariant) -> Deployment {
    Deployment::new("test", contract_address(), CHAIN_ID, variant)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchBehaviour {
    Accept,
    Reject,
    /// Reports success but stays on the old chain.
    Ignore,
    /// Reports success but lands on a different chain.
    SwitchTo(u64),
    Unavailable,
}

#[derive(Debug)]
pub struct MockWallet {
    pub accounts: Mutex<Vec<Address>>,
    pub chain_id: Mutex<u64>,
    pub switch: Mutex<SwitchBehaviour>,
    pub reject_accounts: Mutex<bool>,
    pub account_prompts: AtomicUsize,
    pub switch_prompts: AtomicUsize,
}

impl MockWallet {
    pub fn new(account: Address, chain_id: u64) -> Self {
        Self {
            accounts: Mutex::new(vec![account]),
            chain_id: Mutex::new(chain_id),
            switch: Mutex::new(SwitchBehaviour::Accept),
            reject_accounts: Mutex::new(false),
            account_prompts: AtomicUsize::new(0),
            switch_prompts: AtomicUsize::new(0),
        }
    }

    pub fn set_switch(&self, behaviour: SwitchBehaviour) {
        *self.switch.lock().expect("switch lock") = behaviour;
    }

    pub fn set_chain(&self, chain_id: u64) {
        *self.chain_id.lock().expect("chain lock") = chain_id;
    }

    pub fn set_account(&self, account: Address) {
        *self.accounts.lock().expect("accounts lock") = vec![account];
    }
}

#[async_trait(?Send)]
impl WalletPort for MockWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>, PanelError> {
        self.account_prompts.fetch_add(1, Ordering::SeqCst);
        if *self.reject_accounts.lock().expect("reject lock") {
            return Err(PanelError::WalletRejected {
                code: 4001,
                message: "User rejected the request.".to_owned(),
            });
        }
        Ok(self.accounts.lock().expect("accounts lock").clone())
    }

    async fn chain_id(&self) -> Result<u64, PanelError> {
        Ok(*self.chain_id.lock().expect("chain lock"))
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), PanelError> {
        self.switch_prompts.fetch_add(1, Ordering::SeqCst);
        match *self.switch.lock().expect("switch lock") {
            SwitchBehaviour::Accept => {
                self.set_chain(chain_id);
                Ok(())
            }
            SwitchBehaviour::Reject => Err(PanelError::WalletRejected {
                code: 4001,
                message: "User rejected the request.".to_owned(),
            }),
            SwitchBehaviour::Ignore => Ok(()),
            SwitchBehaviour::SwitchTo(actual) => {
                self.set_chain(actual);
                Ok(())
            }
            SwitchBehaviour::Unavailable => {
                Err(PanelError::WalletUnavailable("provider went away".to_owned()))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MineBehaviour {
    Confirm,
    Revert(Option<String>),
    /// Broadcast but never mined until [`ChainState::mine_pending`].
    Stall,
}

#[derive(Debug, Clone, Copy)]
enum Effect {
    Query(B256),
    Cancel,
    Initialize(Address),
    Withdraw,
    TrustRelayer(Address),
    Accept(AssetAcceptance),
}

/// In-memory contract state shared by every binding a [`MockBinder`] hands out.
#[derive(Debug)]
pub struct ChainState {
    pub owner: Address,
    pub peer: Address,
    pub query_hash: B256,
    pub airdrop_executed: bool,
    pub relayers: Vec<Address>,
    pub accepted: HashMap<Address, AssetAcceptance>,
    pub writes: Vec<WriteCall>,
    pub withdrawals: usize,
    pub mine: MineBehaviour,
    pub fail_reads: bool,
    pub next_query_hash: B256,
    receipts: HashMap<B256, TxOutcome>,
    stalled: Vec<(B256, Effect)>,
    tx_counter: u64,
}

impl ChainState {
    pub fn new(owner: Address) -> Self {
        let mut accepted = HashMap::new();
        accepted.insert(
            Address::ZERO,
            AssetAcceptance {
                asset: Address::ZERO,
                accepted_for_payment: true,
                secondary_flag: false,
            },
        );
        Self {
            owner,
            peer: Address::ZERO,
            query_hash: B256::ZERO,
            airdrop_executed: false,
            relayers: Vec::new(),
            accepted,
            writes: Vec::new(),
            withdrawals: 0,
            mine: MineBehaviour::Confirm,
            fail_reads: false,
            next_query_hash: B256::repeat_byte(0x42),
            receipts: HashMap::new(),
            stalled: Vec::new(),
            tx_counter: 0,
        }
    }

    pub fn mine_pending(&mut self) {
        for (tx_hash, effect) in std::mem::take(&mut self.stalled) {
            self.apply(effect);
            self.receipts
                .insert(tx_hash, TxOutcome::Confirmed(receipt(tx_hash)));
        }
    }

    /// Mines every stalled transaction as a revert; none of their effects apply.
    pub fn revert_pending(&mut self, reason: Option<&str>) {
        for (tx_hash, _) in std::mem::take(&mut self.stalled) {
            self.receipts.insert(
                tx_hash,
                TxOutcome::Reverted {
                    receipt: receipt(tx_hash),
                    reason: reason.map(str::to_owned),
                },
            );
        }
    }

    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::Query(hash) => self.query_hash = hash,
            Effect::Cancel => self.query_hash = B256::ZERO,
            Effect::Initialize(peer) => self.peer = peer,
            Effect::Withdraw => self.withdrawals += 1,
            Effect::TrustRelayer(relayer) => self.relayers.push(relayer),
            Effect::Accept(acceptance) => {
                self.accepted.insert(acceptance.asset, acceptance);
            }
        }
    }

    fn write(&mut self, call: WriteCall, effect: Effect) -> PendingTx {
        self.tx_counter += 1;
        let tx_hash = B256::left_padding_from(&self.tx_counter.to_be_bytes());
        self.writes.push(call);
        match self.mine.clone() {
            MineBehaviour::Confirm => {
                self.apply(effect);
                self.receipts
                    .insert(tx_hash, TxOutcome::Confirmed(receipt(tx_hash)));
            }
            MineBehaviour::Revert(reason) => {
                self.receipts.insert(
                    tx_hash,
                    TxOutcome::Reverted {
                        receipt: receipt(tx_hash),
                        reason,
                    },
                );
            }
            MineBehaviour::Stall => self.stalled.push((tx_hash, effect)),
        }
        PendingTx { tx_hash, call }
    }
}

fn receipt(tx_hash: B256) -> TxReceipt {
    TxReceipt {
        tx_hash,
        block_number: Some(1),
        gas_used: Some(21_000),
    }
}

pub struct MockContract {
    deployment: Deployment,
    signer: Option<Address>,
    state: Arc<Mutex<ChainState>>,
}

impl MockContract {
    fn read<T>(&self, f: impl FnOnce(&ChainState) -> T) -> Result<T, PanelError> {
        let state = self.state.lock().expect("chain lock");
        if state.fail_reads {
            return Err(PanelError::Transport("rpc unreachable".to_owned()));
        }
        Ok(f(&state))
    }

    fn send(&self, call: WriteCall, effect: Effect) -> Result<PendingTx, PanelError> {
        let signer = self.signer.ok_or(PanelError::NoWalletSigner)?;
        let mut state = self.state.lock().expect("chain lock");
        if call.is_admin() && self.deployment.surface.has_owner_admin && signer != state.owner {
            return Err(PanelError::TransactionReverted {
                reason: Some("Ownable: caller is not the owner".to_owned()),
            });
        }
        Ok(state.write(call, effect))
    }
}

#[async_trait(?Send)]
impl ContractPort for MockContract {
    fn deployment(&self) -> &Deployment {
        &self.deployment
    }

    fn signer(&self) -> Option<Address> {
        self.signer
    }

    async fn owner(&self) -> Result<Address, PanelError> {
        self.read(|s| s.owner)
    }

    async fn peer_contract(&self) -> Result<Address, PanelError> {
        self.read(|s| s.peer)
    }

    async fn query_hash(&self) -> Result<B256, PanelError> {
        self.read(|s| s.query_hash)
    }

    async fn airdrop_executed(&self) -> Result<bool, PanelError> {
        self.read(|s| s.airdrop_executed)
    }

    async fn accepted_asset(&self, asset: Address) -> Result<AssetAcceptance, PanelError> {
        self.read(|s| {
            s.accepted.get(&asset).copied().unwrap_or(AssetAcceptance {
                asset,
                accepted_for_payment: false,
                secondary_flag: false,
            })
        })
    }

    async fn is_trusted_relayer(&self, relayer: Address) -> Result<bool, PanelError> {
        self.read(|s| s.relayers.contains(&relayer))
    }

    async fn initialize(&self, peer: Address) -> Result<PendingTx, PanelError> {
        self.send(WriteCall::Initialize, Effect::Initialize(peer))
    }

    async fn query_zkpay(&self, _value: U256, _gas_limit: u64) -> Result<PendingTx, PanelError> {
        let hash = self.state.lock().expect("chain lock").next_query_hash;
        self.send(WriteCall::QueryZkPay, Effect::Query(hash))
    }

    async fn query_with_native(
        &self,
        _payload: &QueryPayload,
        _value: U256,
        _gas_limit: u64,
    ) -> Result<PendingTx, PanelError> {
        let hash = self.state.lock().expect("chain lock").next_query_hash;
        self.send(WriteCall::QueryWithNative, Effect::Query(hash))
    }

    async fn withdraw(&self) -> Result<PendingTx, PanelError> {
        self.send(WriteCall::Withdraw, Effect::Withdraw)
    }

    async fn cancel_query(&self, _query_hash: B256) -> Result<PendingTx, PanelError> {
        self.send(WriteCall::CancelQuery, Effect::Cancel)
    }

    async fn add_trusted_relayer(&self, relayer: Address) -> Result<PendingTx, PanelError> {
        self.send(WriteCall::AddTrustedRelayer, Effect::TrustRelayer(relayer))
    }

    async fn set_accepted_asset(
        &self,
        acceptance: &AssetAcceptance,
    ) -> Result<PendingTx, PanelError> {
        self.send(WriteCall::SetAcceptedAsset, Effect::Accept(*acceptance))
    }

    async fn transaction_outcome(&self, tx_hash: B256) -> Result<Option<TxOutcome>, PanelError> {
        Ok(self
            .state
            .lock()
            .expect("chain lock")
            .receipts
            .get(&tx_hash)
            .cloned())
    }

    async fn wait_for_confirmation(&self, pending: &PendingTx) -> Result<TxReceipt, PanelError> {
        match self.transaction_outcome(pending.tx_hash).await? {
            Some(TxOutcome::Confirmed(receipt)) => Ok(receipt),
            Some(TxOutcome::Reverted { reason, .. }) => {
                Err(PanelError::TransactionReverted { reason })
            }
            None => Err(PanelError::TransactionUnconfirmed(format!(
                "{} not mined in time",
                pending.tx_hash
            ))),
        }
    }
}

pub struct MockBinder {
    pub state: Arc<Mutex<ChainState>>,
    pub binds: AtomicUsize,
}

impl ContractBinder for MockBinder {
    type Contract = MockContract;

    fn bind(
        &self,
        deployment: &Deployment,
        signer: Option<Address>,
    ) -> Result<Arc<MockContract>, PanelError> {
        self.binds.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockContract {
            deployment: deployment.clone(),
            signer,
            state: Arc::clone(&self.state),
        }))
    }
}

#[derive(Debug)]
pub struct TestClock {
    now: AtomicU64,
}

impl Default for TestClock {
    fn default() -> Self {
        Self {
            now: AtomicU64::new(NOW_MS),
        }
    }
}

impl ClockPort for TestClock {
    fn now_ms(&self) -> Result<TimestampMs, PanelError> {
        Ok(TimestampMs(self.now.fetch_add(1, Ordering::SeqCst)))
    }
}

pub type TestController = QueryController<MockWallet, MockBinder, TestClock>;

pub fn new_controller(variant: SurfaceVariant, account: Address) -> TestController {
    QueryController::new(
        MockWallet::new(account, CHAIN_ID),
        MockBinder {
            state: Arc::new(Mutex::new(ChainState::new(owner_address()))),
            binds: AtomicUsize::new(0),
        },
        TestClock::default(),
        deployment(variant),
        QueryDefaults::default(),
    )
}

pub fn chain(controller: &TestController) -> std::sync::MutexGuard<'_, ChainState> {
    controller.binder.state.lock().expect("chain lock")
}

pub fn sample_payload() -> QueryPayload {
    QueryPayload {
        query: alloy::primitives::Bytes::from_static(b"SELECT COUNT(*) FROM ETHEREUM.BLOCKS"),
        query_type: zkpay_panel_core::QueryType::Sql,
        parameters: Vec::new(),
        timeout: NOW_MS / 1_000 + 3_600,
        callback_address: Address::ZERO,
        callback_gas_limit: 0,
        callback_data: alloy::primitives::Bytes::new(),
        verification: zkpay_panel_core::VerificationMode::ZkProof,
    }
}
