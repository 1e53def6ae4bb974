//! Form state for the panel
//!
//! Inputs stay raw strings until a button is pressed; parsing and validation
//! happen in the controller, except for the structured payload which is
//! assembled here.

use std::str::FromStr;

use alloy::primitives::{Address, Bytes};
use zkpay_panel_adapters::abi::encode_query_parameter;
use zkpay_panel_core::{
    parse_address, PanelError, ParamType, QueryPayload, QueryType, TimestampMs, VerificationMode,
};

pub const PARAM_TYPES: &[ParamType] = &[
    ParamType::Bool,
    ParamType::Int256,
    ParamType::Uint256,
    ParamType::Address,
    ParamType::Bytes32,
    ParamType::Bytes,
    ParamType::String,
];

#[derive(Debug, Clone)]
pub struct ParamRow {
    pub param_type: ParamType,
    pub value: String,
}

impl Default for ParamRow {
    fn default() -> Self {
        Self {
            param_type: ParamType::Uint256,
            value: String::new(),
        }
    }
}

/// Query submission inputs
#[derive(Debug, Clone)]
pub struct QueryForm {
    /// Payment in ether; empty uses the configured default
    pub amount: String,
    pub query: String,
    pub query_type: QueryType,
    pub verification: VerificationMode,
    /// Seconds from now until the query expires
    pub timeout_secs: String,
    pub callback_address: String,
    pub callback_gas_limit: String,
    pub callback_data: String,
    pub params: Vec<ParamRow>,
}

impl Default for QueryForm {
    fn default() -> Self {
        Self {
            amount: String::new(),
            query: String::new(),
            query_type: QueryType::Sql,
            verification: VerificationMode::ZkProof,
            timeout_secs: "3600".to_owned(),
            callback_address: String::new(),
            callback_gas_limit: "0".to_owned(),
            callback_data: String::new(),
            params: Vec::new(),
        }
    }
}

impl QueryForm {
    pub fn build_payload(&self, now: TimestampMs) -> Result<QueryPayload, PanelError> {
        let timeout_secs = parse_u64("timeout", &self.timeout_secs)?;
        let callback_address = if self.callback_address.trim().is_empty() {
            Address::ZERO
        } else {
            parse_address("callback address", &self.callback_address)?
        };
        let callback_data = match self.callback_data.trim() {
            "" | "0x" => Bytes::new(),
            raw => Bytes::from_str(raw).map_err(|e| {
                PanelError::InvalidInput(format!("callback data is not hex: {e}"))
            })?,
        };
        let parameters = self
            .params
            .iter()
            .map(|row| encode_query_parameter(row.param_type, row.value.trim()))
            .collect::<Result<Vec<_>, _>>()?;

        let payload = QueryPayload {
            query: Bytes::from(self.query.trim().as_bytes().to_vec()),
            query_type: self.query_type,
            parameters,
            timeout: now.as_secs().saturating_add(timeout_secs),
            callback_address,
            callback_gas_limit: parse_u64("callback gas limit", &self.callback_gas_limit)?,
            callback_data,
            verification: self.verification,
        };
        payload.validate(now)?;
        Ok(payload)
    }
}

/// Owner call inputs
#[derive(Debug, Clone, Default)]
pub struct AdminForm {
    pub peer: String,
    /// Empty trusts the connected account
    pub relayer: String,
    /// Empty means the native asset
    pub asset: String,
    pub accepted_for_payment: bool,
    pub secondary_flag: bool,
}

fn parse_u64(field: &str, raw: &str) -> Result<u64, PanelError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    trimmed
        .parse()
        .map_err(|e| PanelError::InvalidInput(format!("{field} is not a number: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use zkpay_panel_core::ErrorKind;

    const NOW: TimestampMs = TimestampMs(1_760_000_000_000);

    #[test]
    fn payload_is_built_with_relative_timeout() {
        let form = QueryForm {
            query: "SELECT COUNT(*) FROM ETHEREUM.BLOCKS".to_owned(),
            params: vec![ParamRow {
                param_type: ParamType::Uint256,
                value: "7".to_owned(),
            }],
            ..QueryForm::default()
        };
        let payload = form.build_payload(NOW).expect("valid form");
        assert_eq!(payload.timeout, NOW.as_secs() + 3600);
        assert_eq!(payload.parameters.len(), 1);
        assert_eq!(payload.callback_address, Address::ZERO);
        assert!(payload.callback_data.is_empty());
    }

    #[test]
    fn empty_query_is_rejected() {
        let err = QueryForm::default()
            .build_payload(NOW)
            .expect_err("no query text");
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn callback_without_gas_is_rejected() {
        let form = QueryForm {
            query: "SELECT 1".to_owned(),
            callback_address: "0x000000000000000000000000000000000000BEEF".to_owned(),
            ..QueryForm::default()
        };
        let err = form.build_payload(NOW).expect_err("gas limit missing");
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
