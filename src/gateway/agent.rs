use std::time::Duration;

use thiserror::Error;
use tracing::{debug, instrument};

use crate::exchange::{decode_coordinate_pair, encode_snapshot, ExchangeStore, Snapshot};
use crate::process::{ExternalCommand, ProcessOutcome, ProcessRunner};

/// Coordinates standing for "no move available".
pub const NO_MOVE: (i64, i64) = (-1, -1);

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent process failed: {0}")]
    ProcessFailed(String),
    #[error("agent produced no readable response")]
    ResponseMissing,
    #[error("agent response is malformed: {0}")]
    ResponseMalformed(String),
    #[error("agent answered ({0}, {1}), which is not a move")]
    NoUsableMove(i64, i64),
    #[error("agent did not answer within {0:?}")]
    TimedOut(Duration),
    #[error("could not write exchange artifacts: {0}")]
    Exchange(#[from] std::io::Error),
}

impl AgentError {
    /// The sentinel form of any agent failure.
    pub fn coordinates(&self) -> (i64, i64) {
        NO_MOVE
    }
}

/// Call-and-response with the external move-selection process.
#[derive(Debug, Clone)]
pub struct AgentGateway {
    command: ExternalCommand,
    timeout: Option<Duration>,
}

impl AgentGateway {
    pub fn new(command: ExternalCommand, timeout: Option<Duration>) -> Self {
        Self { command, timeout }
    }

    pub fn command(&self) -> &ExternalCommand {
        &self.command
    }

    /// Asks the agent for a move in `snapshot`.
    ///
    /// The returned pair is well-formed and non-negative but has not been checked for
    /// legality; that is the validator's job.
    #[instrument(skip_all, fields(player = %snapshot.active_player))]
    pub fn request_move<S, R>(
        &self,
        store: &mut S,
        runner: &R,
        snapshot: &Snapshot,
    ) -> Result<(i64, i64), AgentError>
    where
        S: ExchangeStore + ?Sized,
        R: ProcessRunner + ?Sized,
    {
        store.write_snapshot(&encode_snapshot(snapshot))?;
        store.clear_response()?;

        match runner.run(&self.command, self.timeout) {
            Ok(ProcessOutcome::Success) => {}
            Ok(ProcessOutcome::Failed { code }) => {
                return Err(AgentError::ProcessFailed(match code {
                    Some(code) => format!("exit status {code}"),
                    None => "terminated by signal".to_string(),
                }))
            }
            Ok(ProcessOutcome::TimedOut { after }) => return Err(AgentError::TimedOut(after)),
            Err(e) => return Err(AgentError::ProcessFailed(e.to_string())),
        }

        let response = store
            .read_response()
            .map_err(|_| AgentError::ResponseMissing)?;
        let (row, col) = decode_coordinate_pair(&response)
            .map_err(|e| AgentError::ResponseMalformed(e.to_string()))?;
        if row < 0 || col < 0 {
            return Err(AgentError::NoUsableMove(row, col));
        }
        debug!(row, col, "agent proposed a move");
        Ok((row, col))
    }
}

#[cfg(test)]
mod agent_tests {
    use super::*;
    use crate::exchange::MemoryExchangeStore;
    use crate::grid::{Cell, Grid, Player};
    use crate::process::ProcessError;

    fn snapshot() -> Snapshot {
        let mut grid = Grid::new(3);
        grid.set(1, 1, Cell::PlayerA).unwrap();
        Snapshot {
            grid,
            active_player: Player::B,
        }
    }

    fn gateway() -> AgentGateway {
        AgentGateway::new(
            ExternalCommand::new("scheme", ["--quiet", "--load", "ai.scm"]),
            Some(Duration::from_secs(1)),
        )
    }

    fn request(
        response: Option<&'static str>,
        outcome: ProcessOutcome,
    ) -> Result<(i64, i64), AgentError> {
        let mut store = MemoryExchangeStore::new();
        let process = store.clone();
        let runner = move |_: &ExternalCommand, _: Option<Duration>| {
            assert_eq!(
                process.snapshot().as_deref(),
                Some("3\n0,0,0\n0,1,0\n0,0,0\n2\n")
            );
            if let Some(text) = response {
                process.set_response(text);
            }
            Ok::<_, ProcessError>(outcome)
        };
        gateway().request_move(&mut store, &runner, &snapshot())
    }

    #[test]
    fn well_formed_pair() {
        assert_eq!(
            request(Some("2,1\n"), ProcessOutcome::Success).unwrap(),
            (2, 1)
        );
        assert_eq!(
            request(Some("0,2 because"), ProcessOutcome::Success).unwrap(),
            (0, 2)
        );
    }

    #[test]
    fn malformed_responses_fail() {
        for text in ["2,", "abc,1", "", "2;1"] {
            let err = request(Some(text), ProcessOutcome::Success).unwrap_err();
            assert!(
                matches!(err, AgentError::ResponseMalformed(_)),
                "{text:?} gave {err:?}"
            );
            assert_eq!(err.coordinates(), NO_MOVE);
        }
    }

    #[test]
    fn negative_pair_is_no_move() {
        let err = request(Some("-1,-1\n"), ProcessOutcome::Success).unwrap_err();
        assert!(matches!(err, AgentError::NoUsableMove(-1, -1)));
    }

    #[test]
    fn process_problems() {
        assert!(matches!(
            request(None, ProcessOutcome::Success),
            Err(AgentError::ResponseMissing)
        ));
        assert!(matches!(
            request(Some("2,1"), ProcessOutcome::Failed { code: None }),
            Err(AgentError::ProcessFailed(_))
        ));
        assert!(matches!(
            request(
                None,
                ProcessOutcome::TimedOut {
                    after: Duration::from_secs(1)
                }
            ),
            Err(AgentError::TimedOut(_))
        ));
    }

    #[test]
    fn spawn_failure() {
        let mut store = MemoryExchangeStore::new();
        let runner = |command: &ExternalCommand, _: Option<Duration>| {
            Err::<ProcessOutcome, _>(ProcessError::Spawn {
                program: command.program.clone(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
        };
        let res = gateway().request_move(&mut store, &runner, &snapshot());
        assert!(matches!(res, Err(AgentError::ProcessFailed(_))));
    }
}
