use alloy::primitives::B256;
use serde::{Deserialize, Serialize};

use crate::domain::WriteCall;
use crate::error::PanelError;

/// Lifecycle of the single query a session may track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QueryPhase {
    #[default]
    Idle,
    Submitting,
    AwaitingConfirmation { tx_hash: B256 },
    Confirmed { query_hash: B256 },
    Cancelling { query_hash: B256, tx_hash: Option<B256> },
}

impl QueryPhase {
    pub fn query_hash(&self) -> Option<B256> {
        match self {
            QueryPhase::Confirmed { query_hash } | QueryPhase::Cancelling { query_hash, .. } => {
                Some(*query_hash)
            }
            _ => None,
        }
    }

    pub fn write_in_flight(&self) -> bool {
        matches!(
            self,
            QueryPhase::Submitting
                | QueryPhase::AwaitingConfirmation { .. }
                | QueryPhase::Cancelling { .. }
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            QueryPhase::Idle => "Idle",
            QueryPhase::Submitting => "Submitting",
            QueryPhase::AwaitingConfirmation { .. } => "AwaitingConfirmation",
            QueryPhase::Confirmed { .. } => "Confirmed",
            QueryPhase::Cancelling { .. } => "Cancelling",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryAction {
    Submit,
    Broadcast { tx_hash: B256 },
    SubmitFailed,
    Confirm { query_hash: B256 },
    /// Mined, but the contract reports no live query hash.
    ConfirmWithoutHash,
    Revert,
    Cancel,
    CancelBroadcast { tx_hash: B256 },
    CancelConfirmed,
    CancelFailed,
    /// Chain state observed during resynchronization.
    Observe { query_hash: Option<B256> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTransition {
    pub from: String,
    pub to: String,
    pub reason: &'static str,
}

pub fn query_transition(
    phase: QueryPhase,
    action: QueryAction,
) -> Result<(QueryPhase, StateTransition), PanelError> {
    use QueryAction as A;
    use QueryPhase as P;

    let (next, reason) = match (phase, action) {
        (P::Idle, A::Submit) => (P::Submitting, "submit"),
        (P::Confirmed { query_hash }, A::Submit) => {
            return Err(PanelError::QueryAlreadyPending(query_hash))
        }
        (P::Submitting, A::Broadcast { tx_hash }) => {
            (P::AwaitingConfirmation { tx_hash }, "broadcast")
        }
        (P::Submitting, A::SubmitFailed) => (P::Idle, "submit_failed"),
        (P::AwaitingConfirmation { .. }, A::Confirm { query_hash }) => {
            (P::Confirmed { query_hash }, "confirmed")
        }
        (P::AwaitingConfirmation { .. }, A::ConfirmWithoutHash) => (P::Idle, "confirmed_resolved"),
        (P::AwaitingConfirmation { .. }, A::Revert) => (P::Idle, "reverted"),
        (P::Confirmed { query_hash }, A::Cancel) => (
            P::Cancelling {
                query_hash,
                tx_hash: None,
            },
            "cancel",
        ),
        (P::Cancelling { query_hash, .. }, A::CancelBroadcast { tx_hash }) => (
            P::Cancelling {
                query_hash,
                tx_hash: Some(tx_hash),
            },
            "cancel_broadcast",
        ),
        (P::Cancelling { .. }, A::CancelConfirmed) => (P::Idle, "cancelled"),
        (P::Cancelling { query_hash, .. }, A::CancelFailed) => {
            (P::Confirmed { query_hash }, "cancel_failed")
        }
        (_, A::Observe { query_hash }) => match query_hash {
            Some(query_hash) if query_hash != B256::ZERO => {
                (P::Confirmed { query_hash }, "observed_pending")
            }
            _ => (P::Idle, "observed_clear"),
        },
        (from, action) => {
            return Err(PanelError::IllegalTransition {
                machine: "query",
                from: from.label().to_owned(),
                action: format!("{action:?}"),
            })
        }
    };

    Ok((
        next,
        StateTransition {
            from: phase.label().to_owned(),
            to: next.label().to_owned(),
            reason,
        },
    ))
}

/// Owner-gated administrative calls share one two-state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AdminPhase {
    #[default]
    Idle,
    Pending { call: WriteCall, tx_hash: Option<B256> },
}

impl AdminPhase {
    pub fn label(&self) -> &'static str {
        match self {
            AdminPhase::Idle => "Idle",
            AdminPhase::Pending { .. } => "Pending",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    Begin(WriteCall),
    Broadcast { tx_hash: B256 },
    Finish,
}

pub fn admin_transition(
    phase: AdminPhase,
    action: AdminAction,
) -> Result<(AdminPhase, StateTransition), PanelError> {
    let (next, reason) = match (phase, action) {
        (AdminPhase::Idle, AdminAction::Begin(call)) if call.is_admin() => (
            AdminPhase::Pending {
                call,
                tx_hash: None,
            },
            "begin",
        ),
        (AdminPhase::Pending { call, .. }, AdminAction::Broadcast { tx_hash }) => (
            AdminPhase::Pending {
                call,
                tx_hash: Some(tx_hash),
            },
            "broadcast",
        ),
        (AdminPhase::Pending { .. }, AdminAction::Finish) => (AdminPhase::Idle, "finish"),
        (from, action) => {
            return Err(PanelError::IllegalTransition {
                machine: "admin",
                from: from.label().to_owned(),
                action: format!("{action:?}"),
            })
        }
    };

    Ok((
        next,
        StateTransition {
            from: phase.label().to_owned(),
            to: next.label().to_owned(),
            reason,
        },
    ))
}
