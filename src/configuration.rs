//! Config for the referee behaviors
//!
//! Configuration can be created programmatically using [`Configuration::new()`] or by reading
//! environment variables using [`Configuration::from_env()`].
//!
//! # Environment Variables
//!
//! All values are optional. Flags are case-insensitive, set them to `"true"` to enable them.
//! Values that cannot be parsed are ignored and the default is used instead.
//!
//! - `REFEREE_DIMENSION` — Side of the square grid (default: `3`)
//! - `REFEREE_DATA_DIR` — Directory holding the exchange artifacts (default: `data`)
//! - `REFEREE_LOG` — Enable logging to a file in the data directory (default: `false`)
//! - `REFEREE_DEBUG_STDERR` — Let external processes print on stderr (default: `false`)
//! - `REFEREE_VALIDATOR_TIMEOUT_MS` — Wait bound for the validator, `0` for none (default: `10000`)
//! - `REFEREE_AGENT_TIMEOUT_MS` — Wait bound for the agent, `0` for none (default: `10000`)
//! - `REFEREE_AGENT_PLAYER` — Side played by the agent: `A`, `B` or `none` (default: `B`)
//! - `REFEREE_VALIDATOR_CMD` — Validator command line (default: `swipl -s src/prolog/rules.pl -g validate_move,halt`)
//! - `REFEREE_AGENT_CMD` — Agent command line (default: `scheme --quiet --load src/scheme/ai.scm`).
//!   The agent always reads the snapshot on stdin and answers on stdout.
//!
//! The timeouts are not part of the exchange protocol itself: a validator or agent that hangs
//! would otherwise hang the match forever.

use std::{path::PathBuf, time::Duration};

use tracing::warn;

use crate::exchange::FileExchangeStore;
use crate::gateway::{AgentGateway, ValidatorGateway};
use crate::grid::Player;
use crate::process::ExternalCommand;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for referee behaviors.
#[derive(Debug, Clone)]
pub struct Configuration {
    dimension: usize,
    data_dir: PathBuf,
    log: bool,
    debug_process_stderr: bool,
    validator_timeout: Option<Duration>,
    agent_timeout: Option<Duration>,
    agent_player: Option<Player>,
    validator_command: Option<ExternalCommand>,
    /// Agent program and arguments, wired to the data directory by [`Configuration::agent`].
    agent_program: Option<ExternalCommand>,
    agent_command: Option<ExternalCommand>,
}

impl Configuration {
    /// Create a new configuration with default parameters.
    ///
    /// By default:
    /// - The grid is 3x3.
    /// - Artifacts are exchanged through `./data`.
    /// - Logging to file is disabled.
    /// - External processes' stderr is discarded.
    /// - Both external processes get 10 seconds to answer.
    /// - The agent plays the second side (B).
    /// - The validator is SWI-Prolog on `src/prolog/rules.pl`, the agent is Scheme on
    ///   `src/scheme/ai.scm`.
    pub fn new() -> Self {
        Self {
            dimension: 3,
            data_dir: PathBuf::from("data"),
            log: false,
            debug_process_stderr: false,
            validator_timeout: Some(DEFAULT_TIMEOUT),
            agent_timeout: Some(DEFAULT_TIMEOUT),
            agent_player: Some(Player::B),
            validator_command: None,
            agent_program: None,
            agent_command: None,
        }
    }

    /// Create configuration from environment variables, see the [module documentation](self).
    pub fn from_env() -> Self {
        fn get_env_flag(var: &str, default: bool) -> bool {
            match std::env::var(var) {
                Ok(val) => val.eq_ignore_ascii_case("true"),
                Err(_) => default,
            }
        }

        fn parse_timeout(var: &str, default: Option<Duration>) -> Option<Duration> {
            match std::env::var(var).ok().map(|v| v.parse::<u64>()) {
                Some(Ok(0)) => None,
                Some(Ok(ms)) => Some(Duration::from_millis(ms)),
                Some(Err(e)) => {
                    warn!("ignoring {var}: {e}");
                    default
                }
                None => default,
            }
        }

        fn parse_command(var: &str) -> Option<ExternalCommand> {
            let line = std::env::var(var).ok()?;
            ExternalCommand::parse(&line)
                .inspect_err(|e| warn!("ignoring {var}: {e}"))
                .ok()
        }

        let defaults = Self::new();

        let dimension = match std::env::var("REFEREE_DIMENSION") {
            Ok(v) => parse_dimension(&v).unwrap_or_else(|| {
                warn!("ignoring REFEREE_DIMENSION: '{v}' is not a usable grid size");
                defaults.dimension
            }),
            Err(_) => defaults.dimension,
        };

        let agent_player = match std::env::var("REFEREE_AGENT_PLAYER") {
            Ok(v) if v.eq_ignore_ascii_case("a") => Some(Player::A),
            Ok(v) if v.eq_ignore_ascii_case("b") => Some(Player::B),
            Ok(v) if v.eq_ignore_ascii_case("none") => None,
            _ => defaults.agent_player,
        };

        Self {
            dimension,
            data_dir: std::env::var_os("REFEREE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            log: get_env_flag("REFEREE_LOG", defaults.log),
            debug_process_stderr: get_env_flag(
                "REFEREE_DEBUG_STDERR",
                defaults.debug_process_stderr,
            ),
            validator_timeout: parse_timeout(
                "REFEREE_VALIDATOR_TIMEOUT_MS",
                defaults.validator_timeout,
            ),
            agent_timeout: parse_timeout("REFEREE_AGENT_TIMEOUT_MS", defaults.agent_timeout),
            agent_player,
            validator_command: parse_command("REFEREE_VALIDATOR_CMD"),
            agent_program: parse_command("REFEREE_AGENT_CMD"),
            agent_command: None,
        }
    }

    /// Set the grid dimension.
    ///
    /// # Panics
    /// Panics if `dimension` is zero or if the grid would have more than `usize::MAX` cells.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        assert!(
            is_usable_dimension(dimension),
            "{dimension} is not a usable grid size"
        );
        self.dimension = dimension;
        self
    }

    /// Set the directory holding the exchange artifacts.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Enable or disable logging to file.
    pub fn with_log(mut self, value: bool) -> Self {
        self.log = value;
        self
    }

    /// Enable or disable external processes' stderr (debug purposes only).
    pub fn with_debug_process_stderr(mut self, value: bool) -> Self {
        self.debug_process_stderr = value;
        self
    }

    /// Bound the validator's running time. `None` waits forever.
    pub fn with_validator_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.validator_timeout = timeout;
        self
    }

    /// Bound the agent's running time. `None` waits forever.
    pub fn with_agent_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.agent_timeout = timeout;
        self
    }

    /// Choose the side played by the agent, `None` for two human players.
    pub fn with_agent_player(mut self, player: Option<Player>) -> Self {
        self.agent_player = player;
        self
    }

    /// Replace the validator command.
    pub fn with_validator_command(mut self, command: ExternalCommand) -> Self {
        self.validator_command = Some(command);
        self
    }

    /// Replace the agent command, stdio redirections included.
    ///
    /// Unlike `REFEREE_AGENT_CMD`, the command is used exactly as given, whatever the data
    /// directory.
    pub fn with_agent_command(mut self, command: ExternalCommand) -> Self {
        self.agent_command = Some(command);
        self
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn data_dir(&self) -> &std::path::Path {
        &self.data_dir
    }

    pub fn log(&self) -> bool {
        self.log
    }

    pub fn debug_process_stderr(&self) -> bool {
        self.debug_process_stderr
    }

    pub fn agent_player(&self) -> Option<Player> {
        self.agent_player
    }

    /// Validator gateway with the configured command and timeout.
    pub fn validator(&self) -> ValidatorGateway {
        let command = self.validator_command.clone().unwrap_or_else(|| {
            ExternalCommand::new(
                "swipl",
                ["-s", "src/prolog/rules.pl", "-g", "validate_move,halt"],
            )
        });
        ValidatorGateway::new(command, self.validator_timeout)
    }

    /// Agent gateway with the configured command and timeout.
    ///
    /// Unless a full command was given with [`with_agent_command`](Self::with_agent_command),
    /// the agent reads the snapshot of the current data directory on stdin and answers on
    /// stdout.
    pub fn agent(&self) -> AgentGateway {
        let command = self.agent_command.clone().unwrap_or_else(|| {
            self.agent_program
                .clone()
                .unwrap_or_else(|| {
                    ExternalCommand::new("scheme", ["--quiet", "--load", "src/scheme/ai.scm"])
                })
                .with_stdin(self.data_dir.join(FileExchangeStore::SNAPSHOT_FILE))
                .with_stdout(self.data_dir.join(FileExchangeStore::RESPONSE_FILE))
        });
        AgentGateway::new(command, self.agent_timeout)
    }
}

/// A positive grid size whose cell count fits in a `usize`.
fn is_usable_dimension(n: usize) -> bool {
    n >= 1 && n.checked_mul(n).is_some()
}

fn parse_dimension(value: &str) -> Option<usize> {
    value
        .trim()
        .parse::<usize>()
        .ok()
        .filter(|&n| is_usable_dimension(n))
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod configuration_tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Configuration::new();
        assert_eq!(config.dimension(), 3);
        assert_eq!(config.agent_player(), Some(Player::B));
        assert_eq!(
            config.validator().command().to_string(),
            "swipl -s src/prolog/rules.pl -g validate_move,halt"
        );
        let agent = config.agent();
        assert_eq!(agent.command().program, "scheme");
        assert_eq!(
            agent.command().stdin.as_deref(),
            Some(std::path::Path::new("data/current_state.txt"))
        );
        assert_eq!(
            agent.command().stdout.as_deref(),
            Some(std::path::Path::new("data/move_response.txt"))
        );
    }

    #[test]
    fn builder_overrides() {
        let config = Configuration::new()
            .with_dimension(4)
            .with_data_dir("/tmp/match-1")
            .with_agent_player(None)
            .with_validator_command(ExternalCommand::new("./validate.sh", Vec::<String>::new()))
            .with_agent_command(ExternalCommand::new("./agent.sh", ["--fast"]));
        assert_eq!(config.dimension(), 4);
        assert_eq!(config.agent_player(), None);
        assert_eq!(config.validator().command().program, "./validate.sh");
        assert_eq!(config.agent().command().to_string(), "./agent.sh --fast");
    }

    #[test]
    fn environment_overrides() {
        // only test touching these variables
        std::env::set_var("REFEREE_DIMENSION", "5");
        std::env::set_var("REFEREE_DATA_DIR", "/tmp/referee-env");
        std::env::set_var("REFEREE_AGENT_TIMEOUT_MS", "0");
        std::env::set_var("REFEREE_AGENT_PLAYER", "none");
        std::env::set_var("REFEREE_AGENT_CMD", "python3 agent.py");
        std::env::set_var("REFEREE_VALIDATOR_CMD", "sh -c \"exit 0\"");

        let config = Configuration::from_env();
        assert_eq!(config.dimension(), 5);
        assert_eq!(config.agent_player(), None);
        // quotes are rejected, the default stays
        assert_eq!(config.validator().command().program, "swipl");
        assert_eq!(
            config.agent().command().to_string(),
            "python3 agent.py < /tmp/referee-env/current_state.txt > /tmp/referee-env/move_response.txt"
        );

        // the redirections follow a data directory set afterwards
        let moved = config.with_data_dir("/tmp/referee-moved");
        assert_eq!(
            moved.agent().command().to_string(),
            "python3 agent.py < /tmp/referee-moved/current_state.txt > /tmp/referee-moved/move_response.txt"
        );
    }

    #[test]
    fn dimension_values() {
        assert_eq!(parse_dimension("4"), Some(4));
        assert_eq!(parse_dimension(" 7\n"), Some(7));
        assert_eq!(parse_dimension("0"), None);
        assert_eq!(parse_dimension("-3"), None);
        assert_eq!(parse_dimension("three"), None);
        // the square would not fit in a usize
        assert_eq!(parse_dimension(&usize::MAX.to_string()), None);
        assert_eq!(parse_dimension(&(1usize << (usize::BITS / 2)).to_string()), None);
    }

    #[test]
    #[should_panic(expected = "not a usable grid size")]
    fn oversized_dimension_is_refused() {
        let _ = Configuration::new().with_dimension(usize::MAX);
    }
}
