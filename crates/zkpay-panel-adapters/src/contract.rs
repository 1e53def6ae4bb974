use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use zkpay_panel_core::{
    AssetAcceptance, ContractBinder, ContractPort, Deployment, PanelError, PendingTx,
    QueryPayload, ReadCall, TxOutcome, TxReceipt, WriteCall,
};

use crate::abi::{self, IZkPayClient};
use crate::config::PanelConfig;
use crate::eip1193::{parse_chain_id_str, Eip1193Adapter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    pub poll_interval_ms: u64,
    pub timeout_ms: u64,
}

impl From<&PanelConfig> for ConfirmationPolicy {
    fn from(config: &PanelConfig) -> Self {
        Self {
            poll_interval_ms: config.confirmation_poll_ms,
            timeout_ms: config.confirmation_timeout_ms,
        }
    }
}

/// Contract calls routed through the wallet provider: reads via `eth_call`,
/// writes via `eth_sendTransaction` signed by the bound account.
#[derive(Debug)]
pub struct RpcContract {
    deployment: Deployment,
    signer: Option<Address>,
    provider: Eip1193Adapter,
    confirmation: ConfirmationPolicy,
    // Sent transaction objects, kept to replay reverted ones for a reason.
    sent: Mutex<HashMap<B256, Value>>,
}

impl RpcContract {
    pub fn new(
        deployment: Deployment,
        signer: Option<Address>,
        provider: Eip1193Adapter,
        confirmation: ConfirmationPolicy,
    ) -> Self {
        Self {
            deployment,
            signer,
            provider,
            confirmation,
            sent: Mutex::new(HashMap::new()),
        }
    }

    async fn call(&self, call: ReadCall, data: Vec<u8>) -> Result<Bytes, PanelError> {
        self.deployment.surface.require_read(call)?;
        let mut tx = json!({
            "to": self.deployment.address.to_string(),
            "data": Bytes::from(data).to_string(),
        });
        if let Some(from) = self.signer {
            tx["from"] = json!(from.to_string());
        }
        let result = self
            .provider
            .request("eth_call", json!([tx, "latest"]))
            .await?;
        parse_bytes(&result)
    }

    async fn send(
        &self,
        call: WriteCall,
        data: Bytes,
        value: U256,
        gas_limit: Option<u64>,
    ) -> Result<PendingTx, PanelError> {
        self.deployment.surface.require_write(call)?;
        let from = self.signer.ok_or(PanelError::NoWalletSigner)?;
        let mut tx = json!({
            "from": from.to_string(),
            "to": self.deployment.address.to_string(),
            "data": data.to_string(),
            "value": format!("{value:#x}"),
        });
        if let Some(gas) = gas_limit {
            tx["gas"] = json!(format!("{gas:#x}"));
        }
        let result = self
            .provider
            .request("eth_sendTransaction", json!([tx.clone()]))
            .await?;
        let tx_hash: B256 = result
            .as_str()
            .ok_or_else(|| PanelError::Decode("eth_sendTransaction must return hash".to_owned()))?
            .parse()
            .map_err(|e| PanelError::Decode(format!("invalid tx hash: {e}")))?;
        self.sent
            .lock()
            .map_err(|e| PanelError::Transport(format!("sent tx lock poisoned: {e}")))?
            .insert(tx_hash, tx);
        info!(call = call.signature(), %tx_hash, "transaction broadcast");
        Ok(PendingTx { tx_hash, call })
    }

    /// Re-runs a reverted transaction at its block to recover the reason.
    async fn replay_revert(&self, tx_hash: B256, block: Option<u64>) -> Option<String> {
        let tx = self.sent.lock().ok()?.get(&tx_hash).cloned()?;
        let tag = block
            .map(|b| format!("{b:#x}"))
            .unwrap_or_else(|| "latest".to_owned());
        match self.provider.request("eth_call", json!([tx, tag])).await {
            Err(PanelError::TransactionReverted { reason }) => reason,
            Ok(_) => None,
            Err(err) => {
                debug!(%tx_hash, error = %err, "revert replay failed");
                None
            }
        }
    }
}

fn parse_bytes(value: &Value) -> Result<Bytes, PanelError> {
    value
        .as_str()
        .ok_or_else(|| PanelError::Decode("eth_call must return hex data".to_owned()))?
        .parse()
        .map_err(|e| PanelError::Decode(format!("invalid eth_call data: {e}")))
}

fn decode_err(call: ReadCall) -> impl Fn(alloy::sol_types::Error) -> PanelError {
    move |e| PanelError::Decode(format!("{}: {e}", call.signature()))
}

fn hex_field(receipt: &Value, key: &str) -> Option<u64> {
    receipt
        .get(key)
        .and_then(Value::as_str)
        .and_then(|raw| parse_chain_id_str(raw).ok())
}

#[async_trait(?Send)]
impl ContractPort for RpcContract {
    fn deployment(&self) -> &Deployment {
        &self.deployment
    }

    fn signer(&self) -> Option<Address> {
        self.signer
    }

    async fn owner(&self) -> Result<Address, PanelError> {
        let data = self
            .call(ReadCall::Owner, IZkPayClient::_ownerCall {}.abi_encode())
            .await?;
        Ok(IZkPayClient::_ownerCall::abi_decode_returns(&data, true)
            .map_err(decode_err(ReadCall::Owner))?
            ._0)
    }

    async fn peer_contract(&self) -> Result<Address, PanelError> {
        let data = self
            .call(ReadCall::PeerContract, IZkPayClient::_zkpayCall {}.abi_encode())
            .await?;
        Ok(IZkPayClient::_zkpayCall::abi_decode_returns(&data, true)
            .map_err(decode_err(ReadCall::PeerContract))?
            ._0)
    }

    async fn query_hash(&self) -> Result<B256, PanelError> {
        let data = self
            .call(ReadCall::QueryHash, IZkPayClient::_queryHashCall {}.abi_encode())
            .await?;
        Ok(IZkPayClient::_queryHashCall::abi_decode_returns(&data, true)
            .map_err(decode_err(ReadCall::QueryHash))?
            ._0)
    }

    async fn airdrop_executed(&self) -> Result<bool, PanelError> {
        let data = self
            .call(
                ReadCall::AirdropExecuted,
                IZkPayClient::_airdropExecutedCall {}.abi_encode(),
            )
            .await?;
        Ok(
            IZkPayClient::_airdropExecutedCall::abi_decode_returns(&data, true)
                .map_err(decode_err(ReadCall::AirdropExecuted))?
                ._0,
        )
    }

    async fn accepted_asset(&self, asset: Address) -> Result<AssetAcceptance, PanelError> {
        let data = self
            .call(
                ReadCall::AcceptedAsset,
                IZkPayClient::getAcceptedAssetMethodCall { asset }.abi_encode(),
            )
            .await?;
        let ret = IZkPayClient::getAcceptedAssetMethodCall::abi_decode_returns(&data, true)
            .map_err(decode_err(ReadCall::AcceptedAsset))?;
        Ok(AssetAcceptance {
            asset,
            accepted_for_payment: ret._0,
            secondary_flag: ret._1,
        })
    }

    async fn is_trusted_relayer(&self, relayer: Address) -> Result<bool, PanelError> {
        let data = self
            .call(
                ReadCall::IsTrustedRelayer,
                IZkPayClient::isTrustedRelayerCall { relayer }.abi_encode(),
            )
            .await?;
        Ok(
            IZkPayClient::isTrustedRelayerCall::abi_decode_returns(&data, true)
                .map_err(decode_err(ReadCall::IsTrustedRelayer))?
                ._0,
        )
    }

    async fn initialize(&self, peer: Address) -> Result<PendingTx, PanelError> {
        self.send(
            WriteCall::Initialize,
            abi::encode_initialize(peer),
            U256::ZERO,
            None,
        )
        .await
    }

    async fn query_zkpay(&self, value: U256, gas_limit: u64) -> Result<PendingTx, PanelError> {
        self.send(
            WriteCall::QueryZkPay,
            abi::encode_query_zkpay(),
            value,
            Some(gas_limit),
        )
        .await
    }

    async fn query_with_native(
        &self,
        payload: &QueryPayload,
        value: U256,
        gas_limit: u64,
    ) -> Result<PendingTx, PanelError> {
        self.send(
            WriteCall::QueryWithNative,
            abi::encode_query_with_native(payload),
            value,
            Some(gas_limit),
        )
        .await
    }

    async fn withdraw(&self) -> Result<PendingTx, PanelError> {
        self.send(WriteCall::Withdraw, abi::encode_withdraw(), U256::ZERO, None)
            .await
    }

    async fn cancel_query(&self, query_hash: B256) -> Result<PendingTx, PanelError> {
        self.send(
            WriteCall::CancelQuery,
            abi::encode_cancel_query(query_hash),
            U256::ZERO,
            None,
        )
        .await
    }

    async fn add_trusted_relayer(&self, relayer: Address) -> Result<PendingTx, PanelError> {
        self.send(
            WriteCall::AddTrustedRelayer,
            abi::encode_add_trusted_relayer(relayer),
            U256::ZERO,
            None,
        )
        .await
    }

    async fn set_accepted_asset(
        &self,
        acceptance: &AssetAcceptance,
    ) -> Result<PendingTx, PanelError> {
        self.send(
            WriteCall::SetAcceptedAsset,
            abi::encode_set_accepted_asset(acceptance),
            U256::ZERO,
            None,
        )
        .await
    }

    async fn transaction_outcome(&self, tx_hash: B256) -> Result<Option<TxOutcome>, PanelError> {
        let receipt = self
            .provider
            .request("eth_getTransactionReceipt", json!([tx_hash.to_string()]))
            .await?;
        if receipt.is_null() {
            return Ok(None);
        }
        let block_number = hex_field(&receipt, "blockNumber");
        let summary = TxReceipt {
            tx_hash,
            block_number,
            gas_used: hex_field(&receipt, "gasUsed"),
        };
        match hex_field(&receipt, "status") {
            Some(0) => {
                let reason = self.replay_revert(tx_hash, block_number).await;
                Ok(Some(TxOutcome::Reverted {
                    receipt: summary,
                    reason,
                }))
            }
            _ => Ok(Some(TxOutcome::Confirmed(summary))),
        }
    }

    async fn wait_for_confirmation(&self, pending: &PendingTx) -> Result<TxReceipt, PanelError> {
        let deadline = web_time::Instant::now()
            + std::time::Duration::from_millis(self.confirmation.timeout_ms);
        loop {
            match self.transaction_outcome(pending.tx_hash).await {
                Ok(Some(TxOutcome::Confirmed(receipt))) => {
                    debug!(tx_hash = %pending.tx_hash, block = ?receipt.block_number, "transaction confirmed");
                    return Ok(receipt);
                }
                Ok(Some(TxOutcome::Reverted { reason, .. })) => {
                    warn!(tx_hash = %pending.tx_hash, reason = ?reason, "transaction reverted");
                    return Err(PanelError::TransactionReverted { reason });
                }
                Ok(None) => {}
                Err(err) => warn!(tx_hash = %pending.tx_hash, error = %err, "receipt poll failed"),
            }
            if web_time::Instant::now() >= deadline {
                return Err(PanelError::TransactionUnconfirmed(format!(
                    "{} not mined within {} ms",
                    pending.tx_hash, self.confirmation.timeout_ms
                )));
            }
            sleep_ms(self.confirmation.poll_interval_ms).await;
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
async fn sleep_ms(ms: u64) {
    tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
}

#[cfg(target_arch = "wasm32")]
async fn sleep_ms(ms: u64) {
    let promise = js_sys::Promise::new(&mut |resolve, _reject| {
        if let Some(window) = web_sys::window() {
            let _ = window.set_timeout_with_callback_and_timeout_and_arguments_0(
                &resolve,
                i32::try_from(ms).unwrap_or(i32::MAX),
            );
        }
    });
    let _ = wasm_bindgen_futures::JsFuture::from(promise).await;
}

/// Binds [`RpcContract`]s that share one provider.
#[derive(Debug, Clone)]
pub struct RpcContractBinder {
    provider: Eip1193Adapter,
    confirmation: ConfirmationPolicy,
}

impl RpcContractBinder {
    pub fn new(provider: Eip1193Adapter, confirmation: ConfirmationPolicy) -> Self {
        Self {
            provider,
            confirmation,
        }
    }

    pub fn provider(&self) -> &Eip1193Adapter {
        &self.provider
    }
}

impl ContractBinder for RpcContractBinder {
    type Contract = RpcContract;

    fn bind(
        &self,
        deployment: &Deployment,
        signer: Option<Address>,
    ) -> Result<Arc<RpcContract>, PanelError> {
        if deployment.address == Address::ZERO {
            return Err(PanelError::InvalidInput(format!(
                "{} has no contract address",
                deployment.label
            )));
        }
        Ok(Arc::new(RpcContract::new(
            deployment.clone(),
            signer,
            self.provider.clone(),
            self.confirmation,
        )))
    }
}
