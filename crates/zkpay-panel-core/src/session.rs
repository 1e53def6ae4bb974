//! Session state store.
//!
//! The controller is the only writer; everything else sees the session through
//! `&Session` getters or a [`SessionView`] snapshot.

use alloy::primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{ChainSnapshot, ConnectionStatus, ErrorInfo};
use crate::error::PanelError;
use crate::state_machine::{
    admin_transition, query_transition, AdminAction, AdminPhase, QueryAction, QueryPhase,
    StateTransition,
};

#[derive(Debug, Clone, Default)]
pub struct Session {
    connection: ConnectionStatus,
    account: Option<Address>,
    owner: Option<Address>,
    peer_contract: Option<Address>,
    airdrop_executed: Option<bool>,
    account_is_trusted_relayer: Option<bool>,
    query: QueryPhase,
    admin: AdminPhase,
    last_tx_hash: Option<B256>,
    last_message: Option<String>,
    last_error: Option<ErrorInfo>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection(&self) -> ConnectionStatus {
        self.connection
    }

    pub fn account(&self) -> Option<Address> {
        self.account
    }

    pub fn owner(&self) -> Option<Address> {
        self.owner
    }

    pub fn peer_contract(&self) -> Option<Address> {
        self.peer_contract
    }

    pub fn airdrop_executed(&self) -> Option<bool> {
        self.airdrop_executed
    }

    pub fn account_is_trusted_relayer(&self) -> Option<bool> {
        self.account_is_trusted_relayer
    }

    pub fn query_phase(&self) -> QueryPhase {
        self.query
    }

    pub fn admin_phase(&self) -> AdminPhase {
        self.admin
    }

    /// The one query hash this session tracks, if any.
    pub fn current_query_hash(&self) -> Option<B256> {
        self.query.query_hash()
    }

    pub fn last_tx_hash(&self) -> Option<B256> {
        self.last_tx_hash
    }

    pub fn last_message(&self) -> Option<&str> {
        self.last_message.as_deref()
    }

    pub fn last_error(&self) -> Option<&ErrorInfo> {
        self.last_error.as_ref()
    }

    pub fn write_in_flight(&self) -> bool {
        self.query.write_in_flight() || matches!(self.admin, AdminPhase::Pending { .. })
    }

    pub(crate) fn begin_connect(&mut self) {
        self.connection = ConnectionStatus::Connecting;
        self.last_error = None;
    }

    pub(crate) fn connected(&mut self, account: Address) {
        if self.account != Some(account) {
            self.account_is_trusted_relayer = None;
        }
        self.connection = ConnectionStatus::Connected;
        self.account = Some(account);
    }

    pub(crate) fn connect_failed(&mut self) {
        if self.connection == ConnectionStatus::Connecting {
            self.connection = if self.account.is_some() {
                ConnectionStatus::Connected
            } else {
                ConnectionStatus::Disconnected
            };
        }
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }

    pub(crate) fn apply_query(&mut self, action: QueryAction) -> Result<StateTransition, PanelError> {
        let (next, transition) = query_transition(self.query, action)?;
        debug!(from = %transition.from, to = %transition.to, reason = transition.reason, "query transition");
        self.query = next;
        Ok(transition)
    }

    pub(crate) fn apply_admin(&mut self, action: AdminAction) -> Result<StateTransition, PanelError> {
        let (next, transition) = admin_transition(self.admin, action)?;
        debug!(from = %transition.from, to = %transition.to, reason = transition.reason, "admin transition");
        self.admin = next;
        Ok(transition)
    }

    /// Copies successfully read fields; failed reads leave stale values.
    pub(crate) fn apply_snapshot(&mut self, snapshot: &ChainSnapshot) {
        if let Some(owner) = snapshot.owner {
            self.owner = Some(owner);
        }
        if let Some(peer) = snapshot.peer_contract {
            self.peer_contract = Some(peer);
        }
        if let Some(executed) = snapshot.airdrop_executed {
            self.airdrop_executed = Some(executed);
        }
        if let Some(trusted) = snapshot.account_is_trusted_relayer {
            self.account_is_trusted_relayer = Some(trusted);
        }
    }

    pub(crate) fn record_tx(&mut self, tx_hash: B256) {
        self.last_tx_hash = Some(tx_hash);
    }

    pub(crate) fn report(&mut self, message: impl Into<String>) {
        self.last_message = Some(message.into());
        self.last_error = None;
    }

    pub(crate) fn record_error(&mut self, err: &PanelError) {
        self.last_error = Some(ErrorInfo::from(err));
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            connection: self.connection,
            account: self.account.map(|a| a.to_string()).unwrap_or_default(),
            owner: self.owner.map(|a| a.to_string()).unwrap_or_default(),
            peer_contract: self.peer_contract.map(|a| a.to_string()).unwrap_or_default(),
            query_hash: self
                .current_query_hash()
                .map(|h| h.to_string())
                .unwrap_or_default(),
            query_phase: self.query.label().to_owned(),
            admin_phase: self.admin.label().to_owned(),
            airdrop_executed: self.airdrop_executed,
            account_is_trusted_relayer: self.account_is_trusted_relayer,
            last_tx_hash: self.last_tx_hash.map(|h| h.to_string()),
            status_message: self.last_message.clone(),
            error_message: self.last_error.as_ref().map(|e| e.message.clone()),
            error: self.last_error.clone(),
            busy: self.write_in_flight(),
        }
    }
}

/// Read model handed to the presentation layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    pub connection: ConnectionStatus,
    pub account: String,
    pub owner: String,
    pub peer_contract: String,
    pub query_hash: String,
    pub query_phase: String,
    pub admin_phase: String,
    pub airdrop_executed: Option<bool>,
    pub account_is_trusted_relayer: Option<bool>,
    pub last_tx_hash: Option<String>,
    pub status_message: Option<String>,
    pub error_message: Option<String>,
    pub error: Option<ErrorInfo>,
    pub busy: bool,
}
