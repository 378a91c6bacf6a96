use std::time::Duration;

use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::exchange::{
    decode_response_token, encode_query, encode_snapshot, ExchangeStore, MoveQuery, Snapshot,
    VALID_TOKEN,
};
use crate::process::{ExternalCommand, ProcessOutcome, ProcessRunner};

/// Why the validator could not give an answer.
///
/// A well-formed answer other than `valid` is not an error: it is a plain rejection.
#[derive(Debug, Error)]
pub enum ValidatorError {
    #[error("validator process failed: {0}")]
    ProcessFailed(String),
    #[error("validator produced no readable response")]
    ResponseMissing,
    #[error("validator did not answer within {0:?}")]
    TimedOut(Duration),
    #[error("could not write exchange artifacts: {0}")]
    Exchange(#[from] std::io::Error),
}

/// Call-and-response with the external rule evaluator.
#[derive(Debug, Clone)]
pub struct ValidatorGateway {
    command: ExternalCommand,
    timeout: Option<Duration>,
}

impl ValidatorGateway {
    pub fn new(command: ExternalCommand, timeout: Option<Duration>) -> Self {
        Self { command, timeout }
    }

    pub fn command(&self) -> &ExternalCommand {
        &self.command
    }

    /// Asks the validator whether `query` is legal in `snapshot`.
    ///
    /// Writes the snapshot and the query, removes any previous response, then runs the
    /// validator once. `Ok(true)` only when the first response line is exactly `valid`.
    #[instrument(skip_all, fields(row = query.row, col = query.col, player = %query.player))]
    pub fn validate<S, R>(
        &self,
        store: &mut S,
        runner: &R,
        snapshot: &Snapshot,
        query: &MoveQuery,
    ) -> Result<bool, ValidatorError>
    where
        S: ExchangeStore + ?Sized,
        R: ProcessRunner + ?Sized,
    {
        store.write_snapshot(&encode_snapshot(snapshot))?;
        store.write_query(&encode_query(query))?;
        store.clear_response()?;

        match runner.run(&self.command, self.timeout) {
            Ok(ProcessOutcome::Success) => {}
            Ok(ProcessOutcome::Failed { code }) => {
                return Err(ValidatorError::ProcessFailed(match code {
                    Some(code) => format!("exit status {code}"),
                    None => "terminated by signal".to_string(),
                }))
            }
            Ok(ProcessOutcome::TimedOut { after }) => return Err(ValidatorError::TimedOut(after)),
            Err(e) => return Err(ValidatorError::ProcessFailed(e.to_string())),
        }

        let response = store
            .read_response()
            .map_err(|_| ValidatorError::ResponseMissing)?;
        let token = decode_response_token(&response);
        debug!(token, "validator answered");
        Ok(token == VALID_TOKEN)
    }

    /// [`validate`](Self::validate) collapsed to a yes/no: any failure is a rejection.
    pub fn is_legal<S, R>(
        &self,
        store: &mut S,
        runner: &R,
        snapshot: &Snapshot,
        query: &MoveQuery,
    ) -> bool
    where
        S: ExchangeStore + ?Sized,
        R: ProcessRunner + ?Sized,
    {
        self.validate(store, runner, snapshot, query)
            .unwrap_or_else(|e| {
                warn!("move rejected: {e}");
                false
            })
    }
}
