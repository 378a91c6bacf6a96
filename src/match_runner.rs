//! The match state machine.
//!
//! A [`MatchRunner`] owns the grid, whose turn it is, and the outcome. Every move, human or
//! agent, goes through the same pipeline:
//!
//! 1. refuse if the match is over,
//! 2. ask the validator,
//! 3. bounds-check and write the active player's token,
//! 4. persist the new snapshot,
//! 5. look for a winner or a draw,
//! 6. hand the turn over unless the match just ended.
//!
//! The agent is only trusted to produce a well-formed move: [`MatchRunner::play_agent_turn`]
//! feeds its answer back into step 2 like any other move.

use std::fmt;

use anyhow::Context;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::configuration::Configuration;
use crate::exchange::{encode_snapshot, ExchangeStore, FileExchangeStore, MoveQuery, Snapshot};
use crate::gateway::{AgentError, AgentGateway, ValidatorError, ValidatorGateway, NO_MOVE};
use crate::grid::{Cell, Grid, GridError, Player};
use crate::process::{ProcessRunner, SystemRunner};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    InProgress,
    WinA,
    WinB,
    Draw,
}

impl Outcome {
    pub fn is_terminal(self) -> bool {
        self != Outcome::InProgress
    }

    pub fn winner(self) -> Option<Player> {
        match self {
            Outcome::WinA => Some(Player::A),
            Outcome::WinB => Some(Player::B),
            Outcome::InProgress | Outcome::Draw => None,
        }
    }

    fn won_by(player: Player) -> Outcome {
        match player {
            Player::A => Outcome::WinA,
            Player::B => Outcome::WinB,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::InProgress => write!(f, "in progress"),
            Outcome::WinA => write!(f, "player 1 wins"),
            Outcome::WinB => write!(f, "player 2 wins"),
            Outcome::Draw => write!(f, "draw"),
        }
    }
}

/// Why a move was not committed.
#[derive(Debug, Error)]
pub enum RejectionReason {
    #[error("the validator judged the move illegal")]
    Illegal,
    #[error(transparent)]
    Validator(#[from] ValidatorError),
    #[error(transparent)]
    OutOfRange(#[from] GridError),
}

#[derive(Debug, Error)]
pub enum MoveError {
    #[error("the match is already over")]
    MatchAlreadyOver,
    #[error("move rejected: {0}")]
    Rejected(#[from] RejectionReason),
}

#[derive(Debug, Error)]
pub enum AgentTurnError {
    #[error(transparent)]
    Agent(#[from] AgentError),
    #[error("agent move ({row}, {col}) refused: {source}")]
    Move {
        row: i64,
        col: i64,
        #[source]
        source: MoveError,
    },
}

/// One match between two sides, refereed by an external validator.
pub struct MatchRunner<S, R> {
    grid: Grid,
    active_player: Player,
    outcome: Outcome,
    store: S,
    runner: R,
    validator: ValidatorGateway,
    agent: AgentGateway,
}

impl MatchRunner<FileExchangeStore, SystemRunner> {
    /// A match using the exchange directory, commands and timeouts of `config`.
    ///
    /// The exchange directory is created if needed and cleared of previous artifacts.
    ///
    /// # Errors
    /// Returns an error if the exchange directory cannot be prepared.
    pub fn from_configuration(config: &Configuration) -> anyhow::Result<Self> {
        let store = FileExchangeStore::new(config.data_dir());
        store.prepare().with_context(|| {
            format!(
                "could not prepare exchange directory {}",
                store.dir().display()
            )
        })?;
        Ok(MatchRunner::new(
            config.dimension(),
            store,
            SystemRunner::new(config.debug_process_stderr()),
            config.validator(),
            config.agent(),
        ))
    }
}

impl<S: ExchangeStore, R: ProcessRunner> MatchRunner<S, R> {
    /// A fresh match: empty grid, player A to move.
    ///
    /// # Panics
    /// Panics if `dimension` is zero.
    pub fn new(
        dimension: usize,
        store: S,
        runner: R,
        validator: ValidatorGateway,
        agent: AgentGateway,
    ) -> Self {
        MatchRunner {
            grid: Grid::new(dimension),
            active_player: Player::A,
            outcome: Outcome::InProgress,
            store,
            runner,
            validator,
            agent,
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn active_player(&self) -> Player {
        self.active_player
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn is_over(&self) -> bool {
        self.outcome.is_terminal()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            grid: self.grid.clone(),
            active_player: self.active_player,
        }
    }

    /// Plays `(row, col)` for the active player.
    ///
    /// On success returns the outcome after the move. On failure nothing changed.
    #[instrument(skip(self), fields(player = %self.active_player))]
    pub fn attempt_move(&mut self, row: i64, col: i64) -> Result<Outcome, MoveError> {
        if self.is_over() {
            return Err(MoveError::MatchAlreadyOver);
        }

        let query = MoveQuery {
            row,
            col,
            player: self.active_player,
        };
        let snapshot = self.snapshot();
        let legal = self
            .validator
            .validate(&mut self.store, &self.runner, &snapshot, &query)
            .map_err(RejectionReason::from)?;
        if !legal {
            return Err(RejectionReason::Illegal.into());
        }

        // the validator checks the range too, but its word is not enough to index the grid
        self.grid
            .set(row, col, self.active_player.token())
            .map_err(RejectionReason::from)?;
        info!("move committed");

        self.persist();

        self.outcome = self.detect_outcome();
        if self.outcome.is_terminal() {
            info!(outcome = %self.outcome, "match over");
        } else {
            self.active_player = self.active_player.other();
        }
        Ok(self.outcome)
    }

    /// Asks the agent for a move without playing it.
    pub fn request_agent_move(&mut self) -> Result<(i64, i64), AgentError> {
        let snapshot = self.snapshot();
        self.agent
            .request_move(&mut self.store, &self.runner, &snapshot)
    }

    /// Asks the agent for a move and plays it through [`attempt_move`](Self::attempt_move).
    #[instrument(skip(self), fields(player = %self.active_player))]
    pub fn play_agent_turn(&mut self) -> Result<Outcome, AgentTurnError> {
        if self.is_over() {
            return Err(AgentTurnError::Move {
                row: NO_MOVE.0,
                col: NO_MOVE.1,
                source: MoveError::MatchAlreadyOver,
            });
        }
        let (row, col) = self.request_agent_move()?;
        self.attempt_move(row, col)
            .map_err(|source| AgentTurnError::Move { row, col, source })
    }

    fn persist(&mut self) {
        let text = encode_snapshot(&self.snapshot());
        if let Err(e) = self.store.write_snapshot(&text) {
            // the move stands; the next gateway call rewrites the snapshot anyway
            warn!("could not persist snapshot: {e}");
        }
    }

    /// Rows, then columns, then the main diagonal, then the anti-diagonal, then draw.
    fn detect_outcome(&self) -> Outcome {
        let n = self.grid.dimension();
        let cells = self.grid.cells();
        let at = |row: usize, col: usize| cells[row * n + col];

        let rows = (0..n).map(|r| (0..n).map(|c| at(r, c)).collect::<Vec<_>>());
        let cols = (0..n).map(|c| (0..n).map(|r| at(r, c)).collect::<Vec<_>>());
        let diagonal = (0..n).map(|i| at(i, i)).collect::<Vec<_>>();
        let anti_diagonal = (0..n).map(|i| at(i, n - 1 - i)).collect::<Vec<_>>();
        let lines = rows
            .chain(cols)
            .chain(std::iter::once(diagonal))
            .chain(std::iter::once(anti_diagonal));

        for line in lines {
            if let Some(player) = uniform_owner(&line) {
                return Outcome::won_by(player);
            }
        }
        if self.grid.is_full() {
            Outcome::Draw
        } else {
            Outcome::InProgress
        }
    }
}

/// Owner of a line whose cells are all the same non-empty token.
fn uniform_owner(line: &[Cell]) -> Option<Player> {
    let first = *line.first()?;
    if line.iter().all(|&cell| cell == first) {
        first.owner()
    } else {
        None
    }
}

impl<S, R> fmt::Display for MatchRunner<S, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.grid)?;
        write!(f, "Current player: {}", self.active_player)
    }
}
