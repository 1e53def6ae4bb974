use alloy::primitives::utils::parse_ether;
use alloy::primitives::{address, Address, U256};

use zkpay_panel_core::{Deployment, PanelError, QueryDefaults, SurfaceVariant};

/// Holesky.
pub const DEFAULT_CHAIN_ID: u64 = 17_000;

pub const AIRDROP_CLIENT_ADDRESS: Address = address!("501Dc59508Db1FC91872cDC357Fc34814787CaC3");
pub const ZKPAY_CLIENT_ADDRESS: Address = address!("e78890E5b555e3FE258Af993A1ECd64ff523815B");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeProfile {
    Development,
    Production,
}

impl RuntimeProfile {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PanelConfig {
    pub runtime_profile: RuntimeProfile,
    pub variant: SurfaceVariant,
    /// Overrides the preset address of `variant`.
    pub contract_address: Option<Address>,
    pub chain_id: u64,
    pub eip1193_proxy_url: Option<String>,
    pub query_value_eth: String,
    pub query_gas_limit: u64,
    pub rpc_timeout_ms: u64,
    pub confirmation_poll_ms: u64,
    pub confirmation_timeout_ms: u64,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            runtime_profile: RuntimeProfile::Development,
            variant: SurfaceVariant::ZkPayClient,
            contract_address: None,
            chain_id: DEFAULT_CHAIN_ID,
            eip1193_proxy_url: None,
            query_value_eth: "0.01".to_owned(),
            query_gas_limit: 1_000_000,
            rpc_timeout_ms: 15_000,
            confirmation_poll_ms: 1_500,
            confirmation_timeout_ms: 120_000,
        }
    }
}

impl PanelConfig {
    /// Reads `ZKPAY_*` overrides on top of the defaults. Unparseable numeric
    /// values keep their default.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(profile) = env_var("ZKPAY_RUNTIME_PROFILE") {
            cfg.runtime_profile = RuntimeProfile::parse(&profile);
        }
        if let Some(variant) = env_var("ZKPAY_VARIANT").and_then(|v| SurfaceVariant::parse(&v).ok()) {
            cfg.variant = variant;
        }
        cfg.contract_address = env_var("ZKPAY_CONTRACT_ADDRESS").and_then(|a| a.parse().ok());
        if let Some(chain_id) = env_u64("ZKPAY_CHAIN_ID") {
            cfg.chain_id = chain_id;
        }
        cfg.eip1193_proxy_url = env_var("ZKPAY_EIP1193_PROXY_URL");
        if let Some(value) = env_var("ZKPAY_QUERY_VALUE_ETH") {
            cfg.query_value_eth = value;
        }
        if let Some(gas) = env_u64("ZKPAY_QUERY_GAS_LIMIT") {
            cfg.query_gas_limit = gas;
        }
        if let Some(ms) = env_u64("ZKPAY_RPC_TIMEOUT_MS") {
            cfg.rpc_timeout_ms = ms;
        }
        if let Some(ms) = env_u64("ZKPAY_CONFIRMATION_POLL_MS") {
            cfg.confirmation_poll_ms = ms;
        }
        if let Some(ms) = env_u64("ZKPAY_CONFIRMATION_TIMEOUT_MS") {
            cfg.confirmation_timeout_ms = ms;
        }
        cfg
    }

    pub fn strict_runtime_required(&self) -> bool {
        self.runtime_profile == RuntimeProfile::Production
    }

    pub fn deployment(&self) -> Result<Deployment, PanelError> {
        let preset = match self.variant {
            SurfaceVariant::AirdropClient => Some(AIRDROP_CLIENT_ADDRESS),
            SurfaceVariant::ZkPayClient => Some(ZKPAY_CLIENT_ADDRESS),
            SurfaceVariant::NativeQueryClient | SurfaceVariant::RelayedQueryClient => None,
        };
        let address = self.contract_address.or(preset).ok_or_else(|| {
            PanelError::InvalidInput(format!(
                "{:?} has no preset deployment; set ZKPAY_CONTRACT_ADDRESS",
                self.variant
            ))
        })?;
        Ok(Deployment::new(
            variant_label(self.variant),
            address,
            self.chain_id,
            self.variant,
        ))
    }

    pub fn query_defaults(&self) -> Result<QueryDefaults, PanelError> {
        let payment_value: U256 = parse_ether(&self.query_value_eth).map_err(|e| {
            PanelError::InvalidInput(format!(
                "invalid default query value '{}': {e}",
                self.query_value_eth
            ))
        })?;
        Ok(QueryDefaults {
            payment_value,
            gas_limit: self.query_gas_limit,
        })
    }
}

fn variant_label(variant: SurfaceVariant) -> &'static str {
    match variant {
        SurfaceVariant::AirdropClient => "Airdrop client",
        SurfaceVariant::ZkPayClient => "ZKPay client",
        SurfaceVariant::NativeQueryClient => "Native query client",
        SurfaceVariant::RelayedQueryClient => "Relayed query client",
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(target_arch = "wasm32")]
fn env_var(_key: &str) -> Option<String> {
    None
}

fn env_u64(key: &str) -> Option<u64> {
    env_var(key).and_then(|v| v.trim().parse().ok())
}
