use alloy::primitives::utils::parse_ether;
use alloy::primitives::{Address, B256, U256};

use crate::domain::{AssetAcceptance, ChainSnapshot, QueryPayload, TxReceipt};
use crate::error::PanelError;

/// User intents forwarded by the presentation layer, carrying raw form input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Connect,
    Disconnect,
    Refresh,
    SubmitQuery {
        amount: String,
        /// Structured payload as assembled by the form; assembly failures are
        /// recorded like any other input error.
        payload: Option<Result<QueryPayload, PanelError>>,
    },
    Withdraw,
    CancelQuery,
    Initialize {
        peer: String,
    },
    AddRelayer {
        relayer: Option<String>,
    },
    SetAcceptedAsset {
        asset: String,
        accepted_for_payment: bool,
        secondary_flag: bool,
    },
}

impl Intent {
    pub fn kind(&self) -> &'static str {
        match self {
            Intent::Connect => "connect",
            Intent::Disconnect => "disconnect",
            Intent::Refresh => "refresh",
            Intent::SubmitQuery { .. } => "submit_query",
            Intent::Withdraw => "withdraw",
            Intent::CancelQuery => "cancel_query",
            Intent::Initialize { .. } => "initialize",
            Intent::AddRelayer { .. } => "add_relayer",
            Intent::SetAcceptedAsset { .. } => "set_accepted_asset",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentOutcome {
    Connected(Address),
    Disconnected,
    Refreshed(ChainSnapshot),
    /// Query mined; carries the hash the contract now reports, if any.
    QuerySubmitted(Option<B256>),
    Confirmed(TxReceipt),
}

/// Owner-gated administrative requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminRequest {
    Initialize { peer: Address },
    Withdraw,
    AddTrustedRelayer { relayer: Address },
    SetAcceptedAsset(AssetAcceptance),
}

pub fn parse_address(field: &str, raw: &str) -> Result<Address, PanelError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PanelError::InvalidInput(format!("{field} is required")));
    }
    trimmed
        .parse()
        .map_err(|e| PanelError::InvalidInput(format!("{field} is not an address: {e}")))
}

/// Parses an ether amount; an empty field falls back to `default`.
pub fn parse_amount(raw: &str, default: U256) -> Result<U256, PanelError> {
    let trimmed = raw.trim();
    let value = if trimmed.is_empty() {
        default
    } else {
        parse_ether(trimmed)
            .map_err(|e| PanelError::InvalidInput(format!("invalid ether amount '{trimmed}': {e}")))?
    };
    if value.is_zero() {
        return Err(PanelError::InvalidInput(
            "query payment must be greater than zero".to_owned(),
        ));
    }
    Ok(value)
}
