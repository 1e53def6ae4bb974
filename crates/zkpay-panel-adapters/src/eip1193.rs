use alloy::primitives::Address;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use zkpay_panel_core::{PanelError, WalletPort};

use crate::abi::decode_revert;
use crate::config::{PanelConfig, ZKPAY_CLIENT_ADDRESS};
use crate::deterministic::DeterministicChain;

/// Wallet access through the EIP-1193 `request` interface.
///
/// Native builds talk to a JSON-RPC proxy in front of a wallet, wasm builds
/// use `window.ethereum`. Without either, development profiles fall back to
/// an in-process simulated chain and production profiles are disabled.
#[derive(Debug, Clone)]
pub struct Eip1193Adapter {
    mode: ProviderMode,
}

#[derive(Debug, Clone)]
enum ProviderMode {
    Disabled(String),
    Deterministic(DeterministicChain),
    #[cfg(not(target_arch = "wasm32"))]
    Proxy(ProxyRuntime),
    #[cfg(target_arch = "wasm32")]
    Browser,
}

#[derive(Debug, Clone)]
#[cfg(not(target_arch = "wasm32"))]
struct ProxyRuntime {
    base_url: String,
    client: reqwest::Client,
}

/// Error object of a failed provider request.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn from_json(value: &Value) -> Self {
        Self {
            code: value.get("code").and_then(Value::as_i64).unwrap_or(-32603),
            message: value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown provider error")
                .to_owned(),
            data: value.get("data").cloned().filter(|d| !d.is_null()),
        }
    }

    pub fn into_panel_error(self) -> PanelError {
        match self.code {
            4001 => PanelError::WalletRejected {
                code: self.code,
                message: self.message,
            },
            4100 => PanelError::NoWalletSigner,
            4900 | 4901 => PanelError::WalletUnavailable(self.message),
            _ => {
                if let Some(reason) = self.revert_reason() {
                    return PanelError::TransactionReverted { reason };
                }
                PanelError::Transport(format!("provider error {}: {}", self.code, self.message))
            }
        }
    }

    /// `Some(reason)` when the error describes an execution revert.
    fn revert_reason(&self) -> Option<Option<String>> {
        let from_data = self
            .data
            .as_ref()
            .and_then(revert_data_hex)
            .and_then(|raw| alloy::hex::decode(raw).ok())
            .and_then(|bytes| decode_revert(&bytes));
        if from_data.is_some() {
            return Some(from_data);
        }
        let lower = self.message.to_ascii_lowercase();
        if self.code == 3 || lower.contains("execution reverted") {
            let reason = self
                .message
                .split_once("execution reverted:")
                .map(|(_, r)| r.trim().to_owned())
                .filter(|r| !r.is_empty());
            return Some(reason);
        }
        None
    }
}

fn revert_data_hex(data: &Value) -> Option<&str> {
    match data {
        Value::String(s) => Some(s.as_str()),
        Value::Object(map) => map.get("data").and_then(Value::as_str),
        _ => None,
    }
}

impl Default for Eip1193Adapter {
    fn default() -> Self {
        Self::with_config(&PanelConfig::from_env())
    }
}

impl Eip1193Adapter {
    pub fn with_config(config: &PanelConfig) -> Self {
        #[cfg(target_arch = "wasm32")]
        let mode = if browser_provider_available() {
            ProviderMode::Browser
        } else if config.strict_runtime_required() {
            ProviderMode::Disabled(
                "EIP-1193 browser provider not found in production runtime profile".to_owned(),
            )
        } else {
            ProviderMode::Deterministic(deterministic_for(config))
        };

        #[cfg(not(target_arch = "wasm32"))]
        let mode = if let Some(ref base_url) = config.eip1193_proxy_url {
            let timeout = std::time::Duration::from_millis(config.rpc_timeout_ms);
            match reqwest::Client::builder().timeout(timeout).build() {
                Ok(client) => ProviderMode::Proxy(ProxyRuntime {
                    base_url: base_url.clone(),
                    client,
                }),
                Err(e) => {
                    if config.strict_runtime_required() {
                        ProviderMode::Disabled(format!(
                            "failed to initialize EIP-1193 proxy client in production profile: {e}"
                        ))
                    } else {
                        warn!(error = %e, "proxy client unavailable, using simulated chain");
                        ProviderMode::Deterministic(deterministic_for(config))
                    }
                }
            }
        } else if config.strict_runtime_required() {
            ProviderMode::Disabled(
                "EIP-1193 proxy URL not configured in production runtime profile".to_owned(),
            )
        } else {
            ProviderMode::Deterministic(deterministic_for(config))
        };

        debug!(mode = mode_label(&mode), "eip1193 adapter ready");
        Self { mode }
    }

    pub fn deterministic(chain: DeterministicChain) -> Self {
        Self {
            mode: ProviderMode::Deterministic(chain),
        }
    }

    pub fn disabled(reason: impl Into<String>) -> Self {
        Self {
            mode: ProviderMode::Disabled(reason.into()),
        }
    }

    pub fn mode_label(&self) -> &'static str {
        mode_label(&self.mode)
    }

    /// The simulated chain, when running without a real wallet.
    pub fn deterministic_chain(&self) -> Option<&DeterministicChain> {
        match &self.mode {
            ProviderMode::Deterministic(chain) => Some(chain),
            _ => None,
        }
    }

    pub async fn request(&self, method: &str, params: Value) -> Result<Value, PanelError> {
        debug!(method, "eip1193 request");
        let result = match &self.mode {
            ProviderMode::Disabled(reason) => {
                return Err(PanelError::WalletUnavailable(reason.clone()))
            }
            ProviderMode::Deterministic(chain) => chain.handle(method, &params),
            #[cfg(not(target_arch = "wasm32"))]
            ProviderMode::Proxy(proxy) => proxy_call(proxy, method, params).await?,
            #[cfg(target_arch = "wasm32")]
            ProviderMode::Browser => wasm_request(method, params).await?,
        };
        result.map_err(|err| {
            debug!(method, code = err.code, message = %err.message, "provider returned error");
            err.into_panel_error()
        })
    }
}

fn mode_label(mode: &ProviderMode) -> &'static str {
    match mode {
        ProviderMode::Disabled(_) => "disabled",
        ProviderMode::Deterministic(_) => "deterministic",
        #[cfg(not(target_arch = "wasm32"))]
        ProviderMode::Proxy(_) => "proxy",
        #[cfg(target_arch = "wasm32")]
        ProviderMode::Browser => "browser",
    }
}

fn deterministic_for(config: &PanelConfig) -> DeterministicChain {
    let contract = config
        .deployment()
        .map(|d| d.address)
        .unwrap_or(ZKPAY_CLIENT_ADDRESS);
    DeterministicChain::new(config.chain_id, contract)
}

#[async_trait(?Send)]
impl WalletPort for Eip1193Adapter {
    async fn request_accounts(&self) -> Result<Vec<Address>, PanelError> {
        let result = self
            .request("eth_requestAccounts", serde_json::json!([]))
            .await?;
        let arr = result.as_array().ok_or_else(|| {
            PanelError::Decode("eth_requestAccounts: array expected".to_owned())
        })?;
        let mut accounts = Vec::with_capacity(arr.len());
        for item in arr {
            let raw = item.as_str().ok_or_else(|| {
                PanelError::Decode("eth_requestAccounts: string expected".to_owned())
            })?;
            let parsed: Address = raw
                .parse()
                .map_err(|e| PanelError::Decode(format!("invalid account address: {e}")))?;
            accounts.push(parsed);
        }
        Ok(accounts)
    }

    async fn chain_id(&self) -> Result<u64, PanelError> {
        let result = self.request("eth_chainId", serde_json::json!([])).await?;
        json_chain_id_to_u64(&result)
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), PanelError> {
        self.request(
            "wallet_switchEthereumChain",
            serde_json::json!([{ "chainId": format!("{chain_id:#x}") }]),
        )
        .await?;
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
async fn proxy_call(
    proxy: &ProxyRuntime,
    method: &str,
    params: Value,
) -> Result<Result<Value, RpcError>, PanelError> {
    let payload = serde_json::json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": method,
        "params": params,
    });
    let response = proxy
        .client
        .post(&proxy.base_url)
        .json(&payload)
        .send()
        .await
        .map_err(|e| PanelError::Transport(format!("eip1193 proxy request failed: {e}")))?;
    let status = response.status();
    let body: Value = response
        .json()
        .await
        .map_err(|e| PanelError::Transport(format!("eip1193 proxy json decode failed: {e}")))?;
    if let Some(err) = body.get("error") {
        return Ok(Err(RpcError::from_json(err)));
    }
    if !status.is_success() {
        return Err(PanelError::Transport(format!(
            "eip1193 proxy status {status}: {body}"
        )));
    }
    body.get("result")
        .cloned()
        .map(Ok)
        .ok_or_else(|| PanelError::Transport("eip1193 proxy missing result".to_owned()))
}

pub(crate) fn json_chain_id_to_u64(value: &Value) -> Result<u64, PanelError> {
    if let Some(n) = value.as_u64() {
        return Ok(n);
    }
    let s = value
        .as_str()
        .ok_or_else(|| PanelError::Decode("chain id must be string or number".to_owned()))?;
    parse_chain_id_str(s)
}

pub(crate) fn parse_chain_id_str(raw: &str) -> Result<u64, PanelError> {
    if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
            .map_err(|e| PanelError::Decode(format!("invalid hex chain id: {e}")))
    } else {
        raw.parse()
            .map_err(|e| PanelError::Decode(format!("invalid chain id: {e}")))
    }
}

#[cfg(target_arch = "wasm32")]
async fn wasm_request(method: &str, params: Value) -> Result<Result<Value, RpcError>, PanelError> {
    use wasm_bindgen::JsCast;

    let provider = browser_provider()?;
    let request_fn = get_prop(&provider, "request")
        .ok()
        .and_then(|v| v.dyn_into::<js_sys::Function>().ok())
        .ok_or_else(|| {
            PanelError::WalletUnavailable("window.ethereum.request is unavailable".to_owned())
        })?;

    let request = serde_json::json!({
        "method": method,
        "params": params,
    });
    let request_js = serde_wasm_bindgen::to_value(&request)
        .map_err(|e| PanelError::Transport(format!("failed to encode wasm request: {e}")))?;
    let promise_js = request_fn
        .call1(&provider, &request_js)
        .map_err(|e| PanelError::Transport(format!("provider request dispatch failed: {e:?}")))?;
    let promise = promise_js
        .dyn_into::<js_sys::Promise>()
        .map_err(|_| PanelError::Transport("provider request did not return Promise".to_owned()))?;
    match wasm_bindgen_futures::JsFuture::from(promise).await {
        Ok(result_js) => serde_wasm_bindgen::from_value(result_js)
            .map(Ok)
            .map_err(|e| PanelError::Transport(format!("failed to decode wasm response: {e}"))),
        Err(rejection) => Ok(Err(js_rpc_error(&rejection))),
    }
}

#[cfg(target_arch = "wasm32")]
fn js_rpc_error(rejection: &wasm_bindgen::JsValue) -> RpcError {
    let code = get_prop(rejection, "code")
        .ok()
        .and_then(|v| v.as_f64())
        .map(|c| c as i64)
        .unwrap_or(-32603);
    let message = get_prop(rejection, "message")
        .ok()
        .and_then(|v| v.as_string())
        .unwrap_or_else(|| format!("{rejection:?}"));
    let data = get_prop(rejection, "data")
        .ok()
        .filter(|v| !v.is_null() && !v.is_undefined())
        .and_then(|v| serde_wasm_bindgen::from_value::<Value>(v).ok());
    RpcError {
        code,
        message,
        data,
    }
}

#[cfg(target_arch = "wasm32")]
fn browser_provider_available() -> bool {
    browser_provider().is_ok()
}

#[cfg(target_arch = "wasm32")]
fn browser_provider() -> Result<wasm_bindgen::JsValue, PanelError> {
    let window = web_sys::window()
        .ok_or_else(|| PanelError::WalletUnavailable("missing window".to_owned()))?;
    let provider = get_prop(&window.into(), "ethereum")?;
    if provider.is_null() || provider.is_undefined() {
        return Err(PanelError::WalletUnavailable(
            "window.ethereum missing".to_owned(),
        ));
    }
    Ok(provider)
}

#[cfg(target_arch = "wasm32")]
fn get_prop(target: &wasm_bindgen::JsValue, key: &str) -> Result<wasm_bindgen::JsValue, PanelError> {
    js_sys::Reflect::get(target, &wasm_bindgen::JsValue::from_str(key))
        .map_err(|e| PanelError::Transport(format!("read provider property {key} failed: {e:?}")))
}
