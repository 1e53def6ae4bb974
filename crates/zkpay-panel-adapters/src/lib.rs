pub mod abi;
pub mod clock;
pub mod config;
pub mod contract;
pub mod deterministic;
pub mod eip1193;

pub use clock::SystemClockAdapter;
pub use config::{PanelConfig, RuntimeProfile, AIRDROP_CLIENT_ADDRESS, ZKPAY_CLIENT_ADDRESS};
pub use contract::{ConfirmationPolicy, RpcContract, RpcContractBinder};
pub use deterministic::{DeterministicChain, SwitchPolicy, DEFAULT_ACCOUNT};
pub use eip1193::{Eip1193Adapter, RpcError};

use zkpay_panel_core::{PanelError, QueryController};

pub type PanelController = QueryController<Eip1193Adapter, RpcContractBinder, SystemClockAdapter>;

/// Wires the production adapters for `config`.
pub fn build_controller(config: &PanelConfig) -> Result<PanelController, PanelError> {
    let provider = Eip1193Adapter::with_config(config);
    build_controller_with(config, provider)
}

/// Same as [`build_controller`] with an explicit provider.
pub fn build_controller_with(
    config: &PanelConfig,
    provider: Eip1193Adapter,
) -> Result<PanelController, PanelError> {
    let deployment = config.deployment()?;
    let defaults = config.query_defaults()?;
    tracing::info!(
        deployment = %deployment.label,
        address = %deployment.address,
        chain_id = deployment.expected_chain_id,
        provider = provider.mode_label(),
        "panel controller configured"
    );
    let binder = RpcContractBinder::new(provider.clone(), ConfirmationPolicy::from(config));
    Ok(QueryController::new(
        provider,
        binder,
        SystemClockAdapter,
        deployment,
        defaults,
    ))
}
