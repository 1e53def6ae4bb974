use alloy::primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PanelError {
    #[error("no wallet provider available: {0}")]
    WalletUnavailable(String),
    #[error("wallet request rejected ({code}): {message}")]
    WalletRejected { code: i64, message: String },
    #[error("wrong network: expected chain {expected}, wallet is on {actual}")]
    WrongNetwork { expected: u64, actual: u64 },
    #[error("no wallet signer: connect and authorize an account")]
    NoWalletSigner,
    #[error("account {caller} is not the contract owner ({owner})")]
    NotOwner { owner: Address, caller: Address },
    #[error("query {0} is still pending; wait for it or cancel it first")]
    QueryAlreadyPending(B256),
    #[error("another transaction is in flight: {0}")]
    WriteInFlight(String),
    #[error("no pending query to cancel")]
    NoPendingQuery,
    #[error("asset {0} is not accepted for payment")]
    AssetNotAccepted(Address),
    #[error("call not exposed by this deployment: {0}")]
    UnsupportedCall(&'static str),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("transaction reverted: {}", reason.as_deref().unwrap_or("no reason given"))]
    TransactionReverted { reason: Option<String> },
    #[error("transaction not confirmed: {0}")]
    TransactionUnconfirmed(String),
    #[error("illegal {machine} transition: {from} --{action}-->")]
    IllegalTransition {
        machine: &'static str,
        from: String,
        action: String,
    },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("decode error: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    WalletUnavailable,
    WalletRejected,
    WrongNetwork,
    NoWalletSigner,
    NotOwner,
    QueryAlreadyPending,
    WriteInFlight,
    NoPendingQuery,
    AssetNotAccepted,
    UnsupportedCall,
    InvalidInput,
    TransactionReverted,
    TransactionUnconfirmed,
    IllegalTransition,
    Transport,
    Decode,
}

/// What the user may do after an error of a given kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// Retrying the same action cannot succeed.
    Never,
    /// Re-offer the action once the user has changed something.
    AfterUserAction,
    /// Re-read chain state before doing anything else; never resubmit blindly.
    AfterResync,
    /// Idempotent; may be retried directly.
    Safe,
}

impl PanelError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PanelError::WalletUnavailable(_) => ErrorKind::WalletUnavailable,
            PanelError::WalletRejected { .. } => ErrorKind::WalletRejected,
            PanelError::WrongNetwork { .. } => ErrorKind::WrongNetwork,
            PanelError::NoWalletSigner => ErrorKind::NoWalletSigner,
            PanelError::NotOwner { .. } => ErrorKind::NotOwner,
            PanelError::QueryAlreadyPending(_) => ErrorKind::QueryAlreadyPending,
            PanelError::WriteInFlight(_) => ErrorKind::WriteInFlight,
            PanelError::NoPendingQuery => ErrorKind::NoPendingQuery,
            PanelError::AssetNotAccepted(_) => ErrorKind::AssetNotAccepted,
            PanelError::UnsupportedCall(_) => ErrorKind::UnsupportedCall,
            PanelError::InvalidInput(_) => ErrorKind::InvalidInput,
            PanelError::TransactionReverted { .. } => ErrorKind::TransactionReverted,
            PanelError::TransactionUnconfirmed(_) => ErrorKind::TransactionUnconfirmed,
            PanelError::IllegalTransition { .. } => ErrorKind::IllegalTransition,
            PanelError::Transport(_) => ErrorKind::Transport,
            PanelError::Decode(_) => ErrorKind::Decode,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        match self.kind() {
            ErrorKind::WalletUnavailable
            | ErrorKind::NotOwner
            | ErrorKind::UnsupportedCall
            | ErrorKind::TransactionReverted
            | ErrorKind::IllegalTransition => RetryPolicy::Never,
            ErrorKind::WalletRejected
            | ErrorKind::NoWalletSigner
            | ErrorKind::QueryAlreadyPending
            | ErrorKind::NoPendingQuery
            | ErrorKind::AssetNotAccepted
            | ErrorKind::InvalidInput => RetryPolicy::AfterUserAction,
            ErrorKind::TransactionUnconfirmed | ErrorKind::WriteInFlight => {
                RetryPolicy::AfterResync
            }
            ErrorKind::WrongNetwork | ErrorKind::Transport | ErrorKind::Decode => {
                RetryPolicy::Safe
            }
        }
    }
}
