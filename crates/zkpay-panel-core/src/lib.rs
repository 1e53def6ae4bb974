pub mod controller;
pub mod domain;
pub mod error;
pub mod intent;
pub mod network;
pub mod ports;
pub mod session;
pub mod state_machine;

pub use controller::{read_snapshot, QueryController, QueryDefaults};
pub use domain::*;
pub use error::{ErrorKind, PanelError, RetryPolicy};
pub use intent::{parse_address, parse_amount, AdminRequest, Intent, IntentOutcome};
pub use network::{check_expected_network, ensure_expected_network};
pub use ports::{ClockPort, ContractBinder, ContractPort, WalletPort};
pub use session::{Session, SessionView};
pub use state_machine::{
    admin_transition, query_transition, AdminAction, AdminPhase, QueryAction, QueryPhase,
    StateTransition,
};
