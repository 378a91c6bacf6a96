//! Launching the external rule evaluator and move-selection agent.
//!
//! A [`ProcessRunner`] runs one [`ExternalCommand`] to completion and reports how it ended.
//! [`SystemRunner`] spawns real OS processes; any closure with the same signature is a
//! runner too, which is how tests stand in for the external programs.

use std::{
    fmt,
    fs::File,
    io,
    path::PathBuf,
    process::{Child, Command, ExitStatus, Stdio},
    time::{Duration, Instant},
};

use thiserror::Error;
use tracing::{instrument, trace, warn};

/// Program, fixed arguments, and optional stdio redirections of an external process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    pub program: String,
    pub args: Vec<String>,
    /// File fed to the process on stdin. Stdin is closed otherwise.
    pub stdin: Option<PathBuf>,
    /// File receiving the process stdout (truncated on spawn). Stdout is discarded otherwise.
    pub stdout: Option<PathBuf>,
}

impl ExternalCommand {
    pub fn new<I, A>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            stdin: None,
            stdout: None,
        }
    }

    /// Parses a space separated command line. Quotes are not supported.
    pub fn parse(line: &str) -> anyhow::Result<Self> {
        if line.contains(['"', '\'', '`']) {
            anyhow::bail!("command line should not contain any quote");
        }
        let mut words = line.split_whitespace();
        let program = words
            .next()
            .ok_or_else(|| anyhow::anyhow!("empty command line"))?;
        Ok(Self::new(program, words))
    }

    #[must_use]
    pub fn with_stdin(self, path: impl Into<PathBuf>) -> Self {
        Self {
            stdin: Some(path.into()),
            ..self
        }
    }

    #[must_use]
    pub fn with_stdout(self, path: impl Into<PathBuf>) -> Self {
        Self {
            stdout: Some(path.into()),
            ..self
        }
    }
}

impl fmt::Display for ExternalCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        if let Some(path) = &self.stdin {
            write!(f, " < {}", path.display())?;
        }
        if let Some(path) = &self.stdout {
            write!(f, " > {}", path.display())?;
        }
        Ok(())
    }
}

/// How an external process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Exit status zero.
    Success,
    /// Non-zero exit status. `code` is `None` when the process was killed by a signal.
    Failed { code: Option<i32> },
    /// Still running when the timeout expired; it has been killed.
    TimedOut { after: Duration },
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("could not launch '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("could not wait for '{program}': {source}")]
    Wait {
        program: String,
        #[source]
        source: io::Error,
    },
}

pub trait ProcessRunner {
    /// Runs `command` and blocks until it exits, or until `timeout` expires when one is given.
    fn run(
        &self,
        command: &ExternalCommand,
        timeout: Option<Duration>,
    ) -> Result<ProcessOutcome, ProcessError>;
}

impl<F> ProcessRunner for F
where
    F: Fn(&ExternalCommand, Option<Duration>) -> Result<ProcessOutcome, ProcessError>,
{
    fn run(
        &self,
        command: &ExternalCommand,
        timeout: Option<Duration>,
    ) -> Result<ProcessOutcome, ProcessError> {
        self(command, timeout)
    }
}

/// Runs external commands as child processes of the referee.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner {
    allow_stderr: bool,
}

impl SystemRunner {
    /// `allow_stderr` lets the child write to the referee's stderr (debug purposes only).
    pub fn new(allow_stderr: bool) -> Self {
        Self { allow_stderr }
    }
}

impl ProcessRunner for SystemRunner {
    #[instrument(skip_all, fields(command = %command))]
    fn run(
        &self,
        command: &ExternalCommand,
        timeout: Option<Duration>,
    ) -> Result<ProcessOutcome, ProcessError> {
        let mut process = WatchedProcess::spawn(command, self.allow_stderr)?;
        let outcome = match timeout {
            None => process.wait().map(outcome_of)?,
            Some(max_duration) => process.wait_for(max_duration)?,
        };
        trace!(?outcome);
        Ok(outcome)
    }
}

fn outcome_of(status: ExitStatus) -> ProcessOutcome {
    if status.success() {
        ProcessOutcome::Success
    } else {
        ProcessOutcome::Failed {
            code: status.code(),
        }
    }
}

fn create_process(command: &ExternalCommand, allow_stderr: bool) -> io::Result<Child> {
    let mut cmd = Command::new(&command.program);
    cmd.args(&command.args);
    match &command.stdin {
        Some(path) => cmd.stdin(File::open(path)?),
        None => cmd.stdin(Stdio::null()),
    };
    match &command.stdout {
        Some(path) => cmd.stdout(File::create(path)?),
        None => cmd.stdout(Stdio::null()),
    };
    if !allow_stderr {
        cmd.stderr(Stdio::null());
    }
    cmd.spawn()
}

/// A child that is killed if it is dropped before being reaped.
#[derive(Debug)]
struct WatchedProcess {
    child: Child,
    program: String,
    reaped: bool,
}

impl WatchedProcess {
    fn spawn(command: &ExternalCommand, allow_stderr: bool) -> Result<Self, ProcessError> {
        let child =
            create_process(command, allow_stderr).map_err(|source| ProcessError::Spawn {
                program: command.program.clone(),
                source,
            })?;
        trace!(pid = child.id(), "spawned");
        Ok(Self {
            child,
            program: command.program.clone(),
            reaped: false,
        })
    }

    fn wait(&mut self) -> Result<ExitStatus, ProcessError> {
        let status = self.child.wait().map_err(|e| self.wait_error(e))?;
        self.reaped = true;
        Ok(status)
    }

    /// Polls the child until it exits or `max_duration` elapses, then kills it.
    fn wait_for(&mut self, max_duration: Duration) -> Result<ProcessOutcome, ProcessError> {
        let start = Instant::now();
        let deadline = start + max_duration;
        loop {
            if let Some(status) = self.child.try_wait().map_err(|e| self.wait_error(e))? {
                self.reaped = true;
                return Ok(outcome_of(status));
            }
            if Instant::now() >= deadline {
                break;
            }
            std::thread::sleep(Duration::from_millis(10).min(max_duration / 10));
        }

        warn!(program = %self.program, ?max_duration, "timed out, killing it");
        self.kill()?;
        Ok(ProcessOutcome::TimedOut {
            after: start.elapsed(),
        })
    }

    fn kill(&mut self) -> Result<(), ProcessError> {
        // the child may have exited between the last poll and now
        if let Err(e) = self.child.kill() {
            if e.kind() != io::ErrorKind::InvalidInput {
                return Err(self.wait_error(e));
            }
        }
        self.wait().map(|_| ())
    }

    fn wait_error(&self, source: io::Error) -> ProcessError {
        ProcessError::Wait {
            program: self.program.clone(),
            source,
        }
    }
}

impl Drop for WatchedProcess {
    fn drop(&mut self) {
        if !self.reaped {
            if let Err(e) = self.kill() {
                warn!("could not clean up '{}': {e}", self.program);
            }
        }
    }
}
