//! Solidity bindings for the query client contracts and the dynamic helpers
//! used to encode query parameters typed in by the user.

use std::str::FromStr;

use alloy::dyn_abi::{DynSolType, DynSolValue};
use alloy::json_abi::{Function, JsonAbi};
use alloy::primitives::{Address, Bytes, FixedBytes, I256, U256};
use alloy::sol;
use alloy::sol_types::{Revert, SolCall, SolError};
use serde_json::Value;

use zkpay_panel_core::{
    AbiSurface, AssetAcceptance, PanelError, ParamType, QueryParameter, QueryPayload, ReadCall,
    WriteCall,
};

sol! {
    #[derive(Debug)]
    struct SolQueryParameter {
        uint8 paramType;
        bytes value;
    }

    #[derive(Debug)]
    struct SolQueryPayload {
        bytes query;
        uint8 queryType;
        SolQueryParameter[] parameters;
        uint64 timeout;
        address callbackAddress;
        uint64 callbackGasLimit;
        bytes callbackData;
        uint8 verification;
    }

    #[derive(Debug)]
    interface IZkPayClient {
        function initialize(address zkpay) external;
        function queryZKPay() external payable;
        function queryWithNative(SolQueryPayload payload) external payable returns (bytes32);
        function withdraw() external;
        function cancelQuery(bytes32 queryHash) external;
        function addTrustedRelayer(address relayer) external;
        function setAcceptedAsset(address asset, bool accepted, bool secondary) external;

        function _owner() external view returns (address);
        function _zkpay() external view returns (address);
        function _queryHash() external view returns (bytes32);
        function _airdropExecuted() external view returns (bool);
        function getAcceptedAssetMethod(address asset) external view returns (bool, bool);
        function isTrustedRelayer(address relayer) external view returns (bool);
    }
}

pub use IZkPayClient::IZkPayClientCalls;

/// Selector baked into the generated binding for a write call.
pub fn write_selector(call: WriteCall) -> [u8; 4] {
    match call {
        WriteCall::Initialize => IZkPayClient::initializeCall::SELECTOR,
        WriteCall::QueryZkPay => IZkPayClient::queryZKPayCall::SELECTOR,
        WriteCall::QueryWithNative => IZkPayClient::queryWithNativeCall::SELECTOR,
        WriteCall::Withdraw => IZkPayClient::withdrawCall::SELECTOR,
        WriteCall::CancelQuery => IZkPayClient::cancelQueryCall::SELECTOR,
        WriteCall::AddTrustedRelayer => IZkPayClient::addTrustedRelayerCall::SELECTOR,
        WriteCall::SetAcceptedAsset => IZkPayClient::setAcceptedAssetCall::SELECTOR,
    }
}

pub fn read_selector(call: ReadCall) -> [u8; 4] {
    match call {
        ReadCall::Owner => IZkPayClient::_ownerCall::SELECTOR,
        ReadCall::PeerContract => IZkPayClient::_zkpayCall::SELECTOR,
        ReadCall::QueryHash => IZkPayClient::_queryHashCall::SELECTOR,
        ReadCall::AirdropExecuted => IZkPayClient::_airdropExecutedCall::SELECTOR,
        ReadCall::AcceptedAsset => IZkPayClient::getAcceptedAssetMethodCall::SELECTOR,
        ReadCall::IsTrustedRelayer => IZkPayClient::isTrustedRelayerCall::SELECTOR,
    }
}

/// Selector computed from a human-readable signature.
pub fn selector_from_signature(signature: &str) -> Result<[u8; 4], PanelError> {
    let function = Function::parse(signature)
        .map_err(|e| PanelError::InvalidInput(format!("invalid signature '{signature}': {e}")))?;
    Ok(function.selector().0)
}

/// Derives the capability set from the function signatures a contract ABI
/// exposes. Reads and writes of one capability must both be present.
pub fn surface_from_signatures<S: AsRef<str>>(signatures: &[S]) -> AbiSurface {
    let has = |sig: &str| signatures.iter().any(|s| s.as_ref() == sig);
    let read = |call: ReadCall| has(call.signature());
    let write = |call: WriteCall| has(call.signature());
    AbiSurface {
        has_owner_admin: write(WriteCall::Initialize)
            && read(ReadCall::Owner)
            && read(ReadCall::PeerContract),
        has_airdrop_status: read(ReadCall::AirdropExecuted),
        has_structured_query: write(WriteCall::QueryWithNative),
        has_asset_acceptance: write(WriteCall::SetAcceptedAsset) && read(ReadCall::AcceptedAsset),
        has_relayer_trust: write(WriteCall::AddTrustedRelayer)
            && read(ReadCall::IsTrustedRelayer),
    }
}

pub fn surface_from_abi_json(abi_json: &str) -> Result<AbiSurface, PanelError> {
    let abi: JsonAbi = serde_json::from_str(abi_json)
        .map_err(|e| PanelError::InvalidInput(format!("invalid abi json: {e}")))?;
    let signatures: Vec<String> = abi.functions().map(|f| f.signature()).collect();
    Ok(surface_from_signatures(&signatures))
}

pub fn to_sol_payload(payload: &QueryPayload) -> SolQueryPayload {
    SolQueryPayload {
        query: payload.query.clone(),
        queryType: payload.query_type as u8,
        parameters: payload
            .parameters
            .iter()
            .map(|p| SolQueryParameter {
                paramType: p.param_type as u8,
                value: p.value.clone(),
            })
            .collect(),
        timeout: payload.timeout,
        callbackAddress: payload.callback_address,
        callbackGasLimit: payload.callback_gas_limit,
        callbackData: payload.callback_data.clone(),
        verification: payload.verification as u8,
    }
}

pub fn encode_initialize(peer: Address) -> Bytes {
    IZkPayClient::initializeCall { zkpay: peer }.abi_encode().into()
}

pub fn encode_query_zkpay() -> Bytes {
    IZkPayClient::queryZKPayCall {}.abi_encode().into()
}

pub fn encode_query_with_native(payload: &QueryPayload) -> Bytes {
    IZkPayClient::queryWithNativeCall {
        payload: to_sol_payload(payload),
    }
    .abi_encode()
    .into()
}

pub fn encode_withdraw() -> Bytes {
    IZkPayClient::withdrawCall {}.abi_encode().into()
}

pub fn encode_cancel_query(query_hash: FixedBytes<32>) -> Bytes {
    IZkPayClient::cancelQueryCall {
        queryHash: query_hash,
    }
    .abi_encode()
    .into()
}

pub fn encode_add_trusted_relayer(relayer: Address) -> Bytes {
    IZkPayClient::addTrustedRelayerCall { relayer }
        .abi_encode()
        .into()
}

pub fn encode_set_accepted_asset(acceptance: &AssetAcceptance) -> Bytes {
    IZkPayClient::setAcceptedAssetCall {
        asset: acceptance.asset,
        accepted: acceptance.accepted_for_payment,
        secondary: acceptance.secondary_flag,
    }
    .abi_encode()
    .into()
}

pub fn decode_call(data: &[u8]) -> Result<IZkPayClientCalls, PanelError> {
    use alloy::sol_types::SolInterface;
    IZkPayClientCalls::abi_decode(data, true)
        .map_err(|e| PanelError::Decode(format!("unknown or malformed calldata: {e}")))
}

/// Reason string carried by revert data, if it decodes as `Error(string)` or
/// `Panic(uint256)`.
pub fn decode_revert(data: &[u8]) -> Option<String> {
    if let Ok(revert) = Revert::abi_decode(data, true) {
        return Some(revert.reason);
    }
    alloy::sol_types::decode_revert_reason(data)
}

/// ABI-encodes a user-typed parameter for `queryWithNative`.
pub fn encode_query_parameter(param_type: ParamType, raw: &str) -> Result<QueryParameter, PanelError> {
    let ty: DynSolType = param_type
        .sol_type()
        .parse()
        .map_err(|e| PanelError::InvalidInput(format!("unsupported parameter type: {e}")))?;
    let parsed = serde_json::from_str::<Value>(raw).unwrap_or(Value::String(raw.to_owned()));
    let value = parse_dyn_value(&parsed, &ty).map_err(|e| {
        PanelError::InvalidInput(format!("{} parameter '{raw}': {e}", param_type.sol_type()))
    })?;
    Ok(QueryParameter {
        param_type,
        value: Bytes::from(value.abi_encode()),
    })
}

fn parse_dyn_value(value: &Value, ty: &DynSolType) -> Result<DynSolValue, String> {
    match ty {
        DynSolType::Bool => match value {
            Value::Bool(b) => Ok(DynSolValue::Bool(*b)),
            Value::String(s) => s
                .parse::<bool>()
                .map(DynSolValue::Bool)
                .map_err(|_| "expected true or false".to_owned()),
            _ => Err("expected bool".to_owned()),
        },
        DynSolType::Uint(bits) => match value {
            Value::String(s) => U256::from_str(s)
                .map(|x| DynSolValue::Uint(x, *bits))
                .map_err(|e| format!("invalid uint: {e}")),
            Value::Number(n) => U256::from_str(&n.to_string())
                .map(|x| DynSolValue::Uint(x, *bits))
                .map_err(|e| format!("invalid uint: {e}")),
            _ => Err("expected uint string/number".to_owned()),
        },
        DynSolType::Int(bits) => match value {
            Value::String(s) => I256::from_str(s)
                .map(|x| DynSolValue::Int(x, *bits))
                .map_err(|e| format!("invalid int: {e}")),
            Value::Number(n) => I256::from_str(&n.to_string())
                .map(|x| DynSolValue::Int(x, *bits))
                .map_err(|e| format!("invalid int: {e}")),
            _ => Err("expected int string/number".to_owned()),
        },
        DynSolType::Address => value
            .as_str()
            .ok_or_else(|| "expected address string".to_owned())
            .and_then(|s| {
                Address::from_str(s)
                    .map(DynSolValue::Address)
                    .map_err(|e| format!("invalid address: {e}"))
            }),
        DynSolType::FixedBytes(size) => value
            .as_str()
            .ok_or_else(|| "expected fixed bytes string".to_owned())
            .and_then(|s| {
                FixedBytes::from_str(s)
                    .map(|x| DynSolValue::FixedBytes(x, *size))
                    .map_err(|e| format!("invalid fixed bytes: {e}"))
            }),
        DynSolType::Bytes => value
            .as_str()
            .ok_or_else(|| "expected bytes string".to_owned())
            .and_then(|s| {
                Bytes::from_str(s)
                    .map(|x| DynSolValue::Bytes(x.into()))
                    .map_err(|e| format!("invalid bytes: {e}"))
            }),
        DynSolType::String => match value {
            Value::String(s) => Ok(DynSolValue::String(s.clone())),
            other => Ok(DynSolValue::String(other.to_string())),
        },
        _ => Err("type not supported as a query parameter".to_owned()),
    }
}
