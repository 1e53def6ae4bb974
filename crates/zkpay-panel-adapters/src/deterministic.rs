//! In-process stand-in for a wallet, a chain and one deployed query client.
//!
//! Answers the same EIP-1193 methods a real provider would, so the contract
//! binding runs unchanged against it. Used when no wallet runtime is
//! configured in development, and by the integration tests.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use alloy::primitives::{address, keccak256, Address, Bytes, B256, U256};
use alloy::sol_types::{Revert, SolError, SolValue};
use serde_json::{json, Value};
use tracing::debug;

use zkpay_panel_core::PanelError;

use crate::abi::{decode_call, IZkPayClientCalls};
use crate::eip1193::{parse_chain_id_str, RpcError};

const NOT_OWNER: &str = "Ownable: caller is not the owner";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchPolicy {
    Accept,
    Reject,
    UnknownChain,
}

#[derive(Debug, Clone)]
pub struct DeterministicChain {
    state: Arc<Mutex<ChainState>>,
}

#[derive(Debug, Clone)]
struct SimTx {
    from: Address,
    to: Address,
    data: Bytes,
    value: U256,
}

#[derive(Debug, Clone)]
struct SimReceipt {
    block: u64,
    success: bool,
}

#[derive(Debug, Clone)]
struct ChainState {
    accounts: Vec<Address>,
    chain_id: u64,
    switch_policy: SwitchPolicy,
    contract: Address,
    owner: Address,
    peer: Address,
    query_hash: B256,
    airdrop_executed: bool,
    relayers: BTreeSet<Address>,
    accepted: HashMap<Address, (bool, bool)>,
    balance: U256,
    nonce: u64,
    block: u64,
    auto_mine: bool,
    revert_next: Option<String>,
    mempool: Vec<(B256, SimTx)>,
    receipts: HashMap<B256, SimReceipt>,
    failed_blocks: HashMap<u64, String>,
}

/// Account the simulated wallet exposes; it also owns the simulated contract.
pub const DEFAULT_ACCOUNT: Address = address!("1000000000000000000000000000000000000001");

impl DeterministicChain {
    pub fn new(chain_id: u64, contract: Address) -> Self {
        let account = DEFAULT_ACCOUNT;
        let mut accepted = HashMap::new();
        accepted.insert(Address::ZERO, (true, false));
        Self {
            state: Arc::new(Mutex::new(ChainState {
                accounts: vec![account],
                chain_id,
                switch_policy: SwitchPolicy::Accept,
                contract,
                owner: account,
                peer: Address::ZERO,
                query_hash: B256::ZERO,
                airdrop_executed: false,
                relayers: BTreeSet::new(),
                accepted,
                balance: U256::ZERO,
                nonce: 0,
                block: 1,
                auto_mine: true,
                revert_next: None,
                mempool: Vec::new(),
                receipts: HashMap::new(),
                failed_blocks: HashMap::new(),
            })),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, ChainState>, PanelError> {
        self.state
            .lock()
            .map_err(|e| PanelError::Transport(format!("simulated chain lock poisoned: {e}")))
    }

    pub fn handle(&self, method: &str, params: &Value) -> Result<Value, RpcError> {
        let mut state = self
            .lock()
            .map_err(|e| RpcError::new(-32603, e.to_string()))?;
        match method {
            "eth_requestAccounts" | "eth_accounts" => Ok(json!(state
                .accounts
                .iter()
                .map(|a| a.to_string())
                .collect::<Vec<_>>())),
            "eth_chainId" => Ok(json!(format!("{:#x}", state.chain_id))),
            "wallet_switchEthereumChain" => {
                let raw = params
                    .get(0)
                    .and_then(|p| p.get("chainId"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| RpcError::new(-32602, "chainId missing"))?;
                let chain_id =
                    parse_chain_id_str(raw).map_err(|e| RpcError::new(-32602, e.to_string()))?;
                match state.switch_policy {
                    SwitchPolicy::Accept => {
                        state.chain_id = chain_id;
                        Ok(Value::Null)
                    }
                    SwitchPolicy::Reject => Err(RpcError::new(4001, "User rejected the request.")),
                    SwitchPolicy::UnknownChain => Err(RpcError::new(
                        4902,
                        format!("Unrecognized chain ID {raw}"),
                    )),
                }
            }
            "eth_call" => {
                let tx = parse_tx(params.get(0), None)?;
                let block = params
                    .get(1)
                    .and_then(Value::as_str)
                    .and_then(|b| parse_chain_id_str(b).ok());
                state.call(&tx, block)
            }
            "eth_sendTransaction" => {
                let tx = parse_tx(params.get(0), Some(state.accounts.as_slice()))?;
                Ok(json!(state.submit(tx).to_string()))
            }
            "eth_getTransactionReceipt" => {
                let hash: B256 = params
                    .get(0)
                    .and_then(Value::as_str)
                    .and_then(|h| h.parse().ok())
                    .ok_or_else(|| RpcError::new(-32602, "transaction hash missing"))?;
                Ok(state
                    .receipts
                    .get(&hash)
                    .map(|r| {
                        json!({
                            "transactionHash": hash.to_string(),
                            "blockNumber": format!("{:#x}", r.block),
                            "gasUsed": "0x5208",
                            "status": if r.success { "0x1" } else { "0x0" },
                        })
                    })
                    .unwrap_or(Value::Null))
            }
            other => Err(RpcError::new(-32601, format!("method {other} not supported"))),
        }
    }

    pub fn debug_set_accounts(&self, accounts: Vec<Address>) -> Result<(), PanelError> {
        self.lock()?.accounts = accounts;
        Ok(())
    }

    pub fn debug_set_chain_id(&self, chain_id: u64) -> Result<(), PanelError> {
        self.lock()?.chain_id = chain_id;
        Ok(())
    }

    pub fn debug_set_switch_policy(&self, policy: SwitchPolicy) -> Result<(), PanelError> {
        self.lock()?.switch_policy = policy;
        Ok(())
    }

    pub fn debug_set_owner(&self, owner: Address) -> Result<(), PanelError> {
        self.lock()?.owner = owner;
        Ok(())
    }

    /// With auto-mining off, transactions wait for [`Self::debug_mine_pending`].
    pub fn debug_set_auto_mine(&self, auto_mine: bool) -> Result<(), PanelError> {
        self.lock()?.auto_mine = auto_mine;
        Ok(())
    }

    pub fn debug_mine_pending(&self) -> Result<usize, PanelError> {
        let mut state = self.lock()?;
        let pending = std::mem::take(&mut state.mempool);
        let mined = pending.len();
        for (hash, tx) in pending {
            state.mine(hash, &tx);
        }
        Ok(mined)
    }

    pub fn debug_revert_next(&self, reason: impl Into<String>) -> Result<(), PanelError> {
        self.lock()?.revert_next = Some(reason.into());
        Ok(())
    }

    pub fn debug_set_accepted_asset(
        &self,
        asset: Address,
        accepted: bool,
        secondary: bool,
    ) -> Result<(), PanelError> {
        self.lock()?.accepted.insert(asset, (accepted, secondary));
        Ok(())
    }

    /// Simulates the coordinator fulfilling the pending query.
    pub fn debug_fulfill_query(&self) -> Result<(), PanelError> {
        let mut state = self.lock()?;
        state.query_hash = B256::ZERO;
        state.airdrop_executed = true;
        Ok(())
    }

    pub fn query_hash(&self) -> Result<B256, PanelError> {
        Ok(self.lock()?.query_hash)
    }

    pub fn peer(&self) -> Result<Address, PanelError> {
        Ok(self.lock()?.peer)
    }

    pub fn balance(&self) -> Result<U256, PanelError> {
        Ok(self.lock()?.balance)
    }

    pub fn is_trusted_relayer(&self, relayer: Address) -> Result<bool, PanelError> {
        Ok(self.lock()?.relayers.contains(&relayer))
    }
}

fn parse_tx(raw: Option<&Value>, signers: Option<&[Address]>) -> Result<SimTx, RpcError> {
    let raw = raw.ok_or_else(|| RpcError::new(-32602, "transaction object missing"))?;
    let field = |key: &str| raw.get(key).and_then(Value::as_str);
    let from = match field("from") {
        Some(f) => f
            .parse()
            .map_err(|e| RpcError::new(-32602, format!("invalid from: {e}")))?,
        None => Address::ZERO,
    };
    if let Some(signers) = signers {
        if !signers.contains(&from) {
            return Err(RpcError::new(
                4100,
                format!("account {from} is not authorized"),
            ));
        }
    }
    let to = field("to")
        .ok_or_else(|| RpcError::new(-32602, "to missing"))?
        .parse()
        .map_err(|e| RpcError::new(-32602, format!("invalid to: {e}")))?;
    let data = match field("data").or_else(|| field("input")) {
        Some(d) => d
            .parse()
            .map_err(|e| RpcError::new(-32602, format!("invalid data: {e}")))?,
        None => Bytes::new(),
    };
    let value = match field("value") {
        Some(v) => v
            .parse()
            .map_err(|e| RpcError::new(-32602, format!("invalid value: {e}")))?,
        None => U256::ZERO,
    };
    Ok(SimTx {
        from,
        to,
        data,
        value,
    })
}

fn reverted(reason: &str) -> RpcError {
    let data = Bytes::from(
        Revert {
            reason: reason.to_owned(),
        }
        .abi_encode(),
    );
    RpcError {
        code: 3,
        message: format!("execution reverted: {reason}"),
        data: Some(json!(data.to_string())),
    }
}

impl ChainState {
    fn call(&self, tx: &SimTx, block: Option<u64>) -> Result<Value, RpcError> {
        if let Some(reason) = block.and_then(|b| self.failed_blocks.get(&b)) {
            return Err(reverted(reason));
        }
        if tx.to != self.contract {
            return Ok(json!("0x"));
        }
        let call = decode_call(&tx.data).map_err(|e| RpcError::new(-32602, e.to_string()))?;
        let encoded: Vec<u8> = match call {
            IZkPayClientCalls::_owner(_) => self.owner.abi_encode(),
            IZkPayClientCalls::_zkpay(_) => self.peer.abi_encode(),
            IZkPayClientCalls::_queryHash(_) => self.query_hash.abi_encode(),
            IZkPayClientCalls::_airdropExecuted(_) => self.airdrop_executed.abi_encode(),
            IZkPayClientCalls::getAcceptedAssetMethod(c) => self
                .accepted
                .get(&c.asset)
                .copied()
                .unwrap_or((false, false))
                .abi_encode_params(),
            IZkPayClientCalls::isTrustedRelayer(c) => {
                self.relayers.contains(&c.relayer).abi_encode()
            }
            _ => {
                let mut dry_run = self.clone();
                dry_run.execute(tx).map_err(|reason| reverted(&reason))?;
                Vec::new()
            }
        };
        Ok(json!(Bytes::from(encoded).to_string()))
    }

    fn submit(&mut self, tx: SimTx) -> B256 {
        self.nonce += 1;
        let mut seed = Vec::with_capacity(20 + 8 + tx.data.len());
        seed.extend_from_slice(tx.from.as_slice());
        seed.extend_from_slice(&self.nonce.to_be_bytes());
        seed.extend_from_slice(&tx.data);
        let hash = keccak256(seed);
        if self.auto_mine {
            self.mine(hash, &tx);
        } else {
            self.mempool.push((hash, tx));
        }
        hash
    }

    fn mine(&mut self, hash: B256, tx: &SimTx) {
        self.block += 1;
        let result = match self.revert_next.take() {
            Some(reason) => Err(reason),
            None => self.execute(tx),
        };
        let success = result.is_ok();
        if let Err(reason) = result {
            debug!(%hash, %reason, "simulated transaction reverted");
            self.failed_blocks.insert(self.block, reason);
        }
        self.receipts.insert(
            hash,
            SimReceipt {
                block: self.block,
                success,
            },
        );
    }

    fn only_owner(&self, tx: &SimTx) -> Result<(), String> {
        if tx.from == self.owner {
            Ok(())
        } else {
            Err(NOT_OWNER.to_owned())
        }
    }

    fn open_query(&mut self, tx: &SimTx) -> Result<(), String> {
        if tx.value.is_zero() {
            return Err("payment required".to_owned());
        }
        if self.query_hash != B256::ZERO {
            return Err("query already pending".to_owned());
        }
        let mut seed = Vec::with_capacity(28);
        seed.extend_from_slice(tx.from.as_slice());
        seed.extend_from_slice(&self.nonce.to_be_bytes());
        self.query_hash = keccak256(seed);
        self.balance += tx.value;
        Ok(())
    }

    fn execute(&mut self, tx: &SimTx) -> Result<(), String> {
        if tx.to != self.contract {
            return Ok(());
        }
        let call = decode_call(&tx.data).map_err(|e| e.to_string())?;
        match call {
            IZkPayClientCalls::initialize(c) => {
                self.only_owner(tx)?;
                self.peer = c.zkpay;
            }
            IZkPayClientCalls::queryZKPay(_) => self.open_query(tx)?,
            IZkPayClientCalls::queryWithNative(_) => {
                let accepted = self
                    .accepted
                    .get(&Address::ZERO)
                    .map(|(accepted, _)| *accepted)
                    .unwrap_or(false);
                if !accepted {
                    return Err("asset not accepted".to_owned());
                }
                self.open_query(tx)?;
            }
            IZkPayClientCalls::withdraw(_) => {
                self.only_owner(tx)?;
                self.balance = U256::ZERO;
            }
            IZkPayClientCalls::cancelQuery(c) => {
                if self.query_hash == B256::ZERO || self.query_hash != c.queryHash {
                    return Err("no such pending query".to_owned());
                }
                self.query_hash = B256::ZERO;
            }
            IZkPayClientCalls::addTrustedRelayer(c) => {
                self.only_owner(tx)?;
                self.relayers.insert(c.relayer);
            }
            IZkPayClientCalls::setAcceptedAsset(c) => {
                self.only_owner(tx)?;
                self.accepted.insert(c.asset, (c.accepted, c.secondary));
            }
            _ => {}
        }
        Ok(())
    }
}
