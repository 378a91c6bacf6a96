//! Gateways to the two external decision makers.
//!
//! Both follow the same call-and-response shape: write the artifacts the process reads,
//! clear the previous response, run the process once and interpret its exit status and
//! response. Neither touches the grid; they only see [`Snapshot`](crate::exchange::Snapshot)s.

mod agent;
mod validator;

pub use agent::{AgentError, AgentGateway, NO_MOVE};
pub use validator::{ValidatorError, ValidatorGateway};
