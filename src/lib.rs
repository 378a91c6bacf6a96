//! # Grid Referee
//!
//! A referee for two-player games on a square grid where winning means owning a full row,
//! column or diagonal. The referee itself only keeps the board and detects the outcome:
//!
//! - every move is judged by an external rule evaluator (the *validator*),
//! - one side may be played by an external move-selection program (the *agent*),
//! - both talk to the referee through small text artifacts in a data directory.
//!
//! # Documentation Overview
//!
//! - The match lifecycle lives in [`match_runner`], see [`MatchRunner`](crate::match_runner::MatchRunner).
//! - The artifact formats and where they are stored are in [`exchange`].
//! - Spawning and bounding external processes is in [`process`].
//! - Environment variables and defaults are described in [`configuration`].
//!
//! # Usage Example
//!
//! ```no_run
//! use grid_referee::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Configuration::from_env().with_dimension(3);
//!     let mut game = MatchRunner::from_configuration(&config)?;
//!
//!     game.attempt_move(1, 1)?; // player A takes the center
//!     match game.play_agent_turn() {
//!         Ok(outcome) => println!("after the agent's move: {outcome}"),
//!         Err(e) => println!("agent failed: {e}"),
//!     }
//!     println!("{game}");
//!     Ok(())
//! }
//! ```
//!
//! ## Artifacts
//!
//! - `current_state.txt`: dimension, one comma separated line of cell codes per row, active player
//! - `move_query.txt`: `row,col,player`
//! - `move_response.txt`: `valid` from the validator, `row,col` from the agent

pub use anyhow;
pub mod configuration;
pub mod exchange;
pub mod gateway;
pub mod grid;
pub mod logger;
pub mod match_runner;
pub mod process;

/// Commonly used types for quick access.
///
/// ```rust
/// use grid_referee::prelude::*;
/// ```
pub mod prelude {
    pub use crate::configuration::Configuration;
    pub use crate::exchange::{ExchangeStore, FileExchangeStore, MemoryExchangeStore};
    pub use crate::gateway::{AgentError, AgentGateway, ValidatorGateway, NO_MOVE};
    pub use crate::grid::{Cell, Grid, Player};
    pub use crate::match_runner::{MatchRunner, MoveError, Outcome};
    pub use crate::process::{ExternalCommand, ProcessRunner, SystemRunner};
}
