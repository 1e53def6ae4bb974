use alloy::primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, PanelError, RetryPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampMs(pub u64);

impl TimestampMs {
    pub fn as_secs(self) -> u64 {
        self.0 / 1_000
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Deployed client contract flavours. Each one exposes a growing slice of the
/// same pay-per-query interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurfaceVariant {
    AirdropClient,
    ZkPayClient,
    NativeQueryClient,
    RelayedQueryClient,
}

impl SurfaceVariant {
    pub fn parse(raw: &str) -> Result<Self, PanelError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "airdrop" | "airdrop-client" => Ok(Self::AirdropClient),
            "zkpay" | "zkpay-client" => Ok(Self::ZkPayClient),
            "native" | "native-query" => Ok(Self::NativeQueryClient),
            "relayed" | "relayed-query" => Ok(Self::RelayedQueryClient),
            other => Err(PanelError::InvalidInput(format!(
                "unknown contract variant: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AbiSurface {
    /// `initialize(address)`, `_owner()`, `_zkpay()`
    pub has_owner_admin: bool,
    /// `_airdropExecuted()`
    pub has_airdrop_status: bool,
    /// `queryWithNative(...)` instead of `queryZKPay()`
    pub has_structured_query: bool,
    /// `setAcceptedAsset` / `getAcceptedAssetMethod`
    pub has_asset_acceptance: bool,
    /// `addTrustedRelayer` / `isTrustedRelayer`
    pub has_relayer_trust: bool,
}

impl AbiSurface {
    pub fn for_variant(variant: SurfaceVariant) -> Self {
        match variant {
            SurfaceVariant::AirdropClient => Self {
                has_airdrop_status: true,
                ..Self::default()
            },
            SurfaceVariant::ZkPayClient => Self {
                has_owner_admin: true,
                ..Self::default()
            },
            SurfaceVariant::NativeQueryClient => Self {
                has_owner_admin: true,
                has_structured_query: true,
                has_asset_acceptance: true,
                ..Self::default()
            },
            SurfaceVariant::RelayedQueryClient => Self {
                has_owner_admin: true,
                has_structured_query: true,
                has_asset_acceptance: true,
                has_relayer_trust: true,
                ..Self::default()
            },
        }
    }

    pub fn supports_write(&self, call: WriteCall) -> bool {
        match call {
            WriteCall::Initialize => self.has_owner_admin,
            WriteCall::QueryZkPay => !self.has_structured_query,
            WriteCall::QueryWithNative => self.has_structured_query,
            WriteCall::Withdraw | WriteCall::CancelQuery => true,
            WriteCall::AddTrustedRelayer => self.has_relayer_trust,
            WriteCall::SetAcceptedAsset => self.has_asset_acceptance,
        }
    }

    pub fn supports_read(&self, call: ReadCall) -> bool {
        match call {
            ReadCall::Owner | ReadCall::PeerContract => self.has_owner_admin,
            ReadCall::QueryHash => true,
            ReadCall::AirdropExecuted => self.has_airdrop_status,
            ReadCall::AcceptedAsset => self.has_asset_acceptance,
            ReadCall::IsTrustedRelayer => self.has_relayer_trust,
        }
    }

    pub fn require_write(&self, call: WriteCall) -> Result<(), PanelError> {
        if self.supports_write(call) {
            Ok(())
        } else {
            Err(PanelError::UnsupportedCall(call.signature()))
        }
    }

    pub fn require_read(&self, call: ReadCall) -> Result<(), PanelError> {
        if self.supports_read(call) {
            Ok(())
        } else {
            Err(PanelError::UnsupportedCall(call.signature()))
        }
    }

    /// Canonical signatures of every call this surface exposes.
    pub fn signatures(&self) -> Vec<&'static str> {
        let writes = WriteCall::ALL
            .iter()
            .filter(|c| self.supports_write(**c))
            .map(|c| c.signature());
        let reads = ReadCall::ALL
            .iter()
            .filter(|c| self.supports_read(**c))
            .map(|c| c.signature());
        writes.chain(reads).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WriteCall {
    Initialize,
    QueryZkPay,
    QueryWithNative,
    Withdraw,
    CancelQuery,
    AddTrustedRelayer,
    SetAcceptedAsset,
}

impl WriteCall {
    pub const ALL: [WriteCall; 7] = [
        WriteCall::Initialize,
        WriteCall::QueryZkPay,
        WriteCall::QueryWithNative,
        WriteCall::Withdraw,
        WriteCall::CancelQuery,
        WriteCall::AddTrustedRelayer,
        WriteCall::SetAcceptedAsset,
    ];

    pub fn signature(self) -> &'static str {
        match self {
            WriteCall::Initialize => "initialize(address)",
            WriteCall::QueryZkPay => "queryZKPay()",
            WriteCall::QueryWithNative => {
                "queryWithNative((bytes,uint8,(uint8,bytes)[],uint64,address,uint64,bytes,uint8))"
            }
            WriteCall::Withdraw => "withdraw()",
            WriteCall::CancelQuery => "cancelQuery(bytes32)",
            WriteCall::AddTrustedRelayer => "addTrustedRelayer(address)",
            WriteCall::SetAcceptedAsset => "setAcceptedAsset(address,bool,bool)",
        }
    }

    pub fn is_admin(self) -> bool {
        matches!(
            self,
            WriteCall::Initialize
                | WriteCall::Withdraw
                | WriteCall::AddTrustedRelayer
                | WriteCall::SetAcceptedAsset
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReadCall {
    Owner,
    PeerContract,
    QueryHash,
    AirdropExecuted,
    AcceptedAsset,
    IsTrustedRelayer,
}

impl ReadCall {
    pub const ALL: [ReadCall; 6] = [
        ReadCall::Owner,
        ReadCall::PeerContract,
        ReadCall::QueryHash,
        ReadCall::AirdropExecuted,
        ReadCall::AcceptedAsset,
        ReadCall::IsTrustedRelayer,
    ];

    pub fn signature(self) -> &'static str {
        match self {
            ReadCall::Owner => "_owner()",
            ReadCall::PeerContract => "_zkpay()",
            ReadCall::QueryHash => "_queryHash()",
            ReadCall::AirdropExecuted => "_airdropExecuted()",
            ReadCall::AcceptedAsset => "getAcceptedAssetMethod(address)",
            ReadCall::IsTrustedRelayer => "isTrustedRelayer(address)",
        }
    }
}

/// A single contract deployment the panel talks to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub label: String,
    pub address: Address,
    pub expected_chain_id: u64,
    pub variant: SurfaceVariant,
    pub surface: AbiSurface,
}

impl Deployment {
    pub fn new(
        label: impl Into<String>,
        address: Address,
        expected_chain_id: u64,
        variant: SurfaceVariant,
    ) -> Self {
        Self {
            label: label.into(),
            address,
            expected_chain_id,
            variant,
            surface: AbiSurface::for_variant(variant),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum QueryType {
    Sql = 0,
    ProofPlan = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum VerificationMode {
    Unverified = 0,
    ZkProof = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ParamType {
    Bool = 0,
    Int256 = 1,
    Uint256 = 2,
    Address = 3,
    Bytes32 = 4,
    Bytes = 5,
    String = 6,
}

impl ParamType {
    pub fn sol_type(self) -> &'static str {
        match self {
            ParamType::Bool => "bool",
            ParamType::Int256 => "int256",
            ParamType::Uint256 => "uint256",
            ParamType::Address => "address",
            ParamType::Bytes32 => "bytes32",
            ParamType::Bytes => "bytes",
            ParamType::String => "string",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParameter {
    pub param_type: ParamType,
    /// ABI encoding of the parameter value.
    pub value: Bytes,
}

/// Structured payload accepted by `queryWithNative`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryPayload {
    pub query: Bytes,
    pub query_type: QueryType,
    pub parameters: Vec<QueryParameter>,
    /// Unix seconds after which the query can no longer be fulfilled.
    pub timeout: u64,
    pub callback_address: Address,
    pub callback_gas_limit: u64,
    pub callback_data: Bytes,
    pub verification: VerificationMode,
}

impl QueryPayload {
    pub fn validate(&self, now: TimestampMs) -> Result<(), PanelError> {
        if self.query.is_empty() {
            return Err(PanelError::InvalidInput("query must not be empty".to_owned()));
        }
        if self.timeout <= now.as_secs() {
            return Err(PanelError::InvalidInput(format!(
                "query timeout {} is not in the future",
                self.timeout
            )));
        }
        if self.callback_address != Address::ZERO && self.callback_gas_limit == 0 {
            return Err(PanelError::InvalidInput(
                "callback gas limit must be set when a callback address is given".to_owned(),
            ));
        }
        if self.parameters.iter().any(|p| p.value.is_empty()) {
            return Err(PanelError::InvalidInput(
                "query parameters must carry an encoded value".to_owned(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub payment_value: U256,
    pub gas_limit: u64,
    pub payload: Option<QueryPayload>,
}

/// Asset address used for native-currency payments.
pub const NATIVE_ASSET: Address = Address::ZERO;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetAcceptance {
    pub asset: Address,
    pub accepted_for_payment: bool,
    /// Second acceptance flag of `setAcceptedAsset`; its meaning is contract-defined.
    pub secondary_flag: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTx {
    pub tx_hash: B256,
    pub call: WriteCall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: B256,
    pub block_number: Option<u64>,
    pub gas_used: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxOutcome {
    Confirmed(TxReceipt),
    Reverted {
        receipt: TxReceipt,
        reason: Option<String>,
    },
}

/// Result of one resynchronization pass. `None` means the read was not
/// available on this surface or failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainSnapshot {
    pub owner: Option<Address>,
    pub peer_contract: Option<Address>,
    pub query_hash: Option<B256>,
    pub airdrop_executed: Option<bool>,
    pub account_is_trusted_relayer: Option<bool>,
    pub failed_reads: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub retry: RetryPolicy,
    pub message: String,
}

impl From<&PanelError> for ErrorInfo {
    fn from(err: &PanelError) -> Self {
        Self {
            kind: err.kind(),
            retry: err.retry_policy(),
            message: err.to_string(),
        }
    }
}
