#![cfg(unix)]

use std::{
    io::Write,
    path::{Path, PathBuf},
    process::{Command, Stdio},
    time::{Duration, Instant},
};

use grid_referee::{
    gateway::{AgentError, ValidatorError},
    match_runner::{AgentTurnError, MoveError, RejectionReason},
    prelude::*,
};
use tempfile::TempDir;
use time::format_description;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

fn init_test_logger() {
    let local_offset = time::UtcOffset::current_local_offset().unwrap_or(time::UtcOffset::UTC);
    let timer = tracing_subscriber::fmt::time::OffsetTime::new(
        local_offset,
        format_description::parse("[year]-[month]-[day] [hour]:[minute]:[second]").unwrap(),
    );

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::TRACE)
        .with_ansi(false)
        .with_timer(timer)
        .with_test_writer()
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn script(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/scripts")
        .join(name)
}

fn validator(dir: &Path, timeout: Option<Duration>) -> ValidatorGateway {
    ValidatorGateway::new(
        ExternalCommand::new(
            "sh",
            [
                script("validator.sh").display().to_string(),
                dir.display().to_string(),
            ],
        ),
        timeout,
    )
}

fn agent(store: &FileExchangeStore, name: &str) -> AgentGateway {
    AgentGateway::new(
        ExternalCommand::new("sh", [script(name).display().to_string()])
            .with_stdin(store.snapshot_path())
            .with_stdout(store.response_path()),
        Some(Duration::from_secs(5)),
    )
}

fn new_match(dir: &TempDir, agent_script: &str) -> MatchRunner<FileExchangeStore, SystemRunner> {
    init_test_logger();
    let store = FileExchangeStore::new(dir.path());
    store.prepare().unwrap();
    let agent = agent(&store, agent_script);
    MatchRunner::new(
        3,
        store,
        SystemRunner::default(),
        validator(dir.path(), Some(Duration::from_secs(5))),
        agent,
    )
}

#[test]
fn full_match_against_agent() {
    let dir = TempDir::new().unwrap();
    let mut game = new_match(&dir, "first_empty_agent.sh");

    // A: (0,0) (1,1) (2,2), the agent fills (0,1) then (0,2)
    assert_eq!(game.attempt_move(0, 0).unwrap(), Outcome::InProgress);
    assert_eq!(game.play_agent_turn().unwrap(), Outcome::InProgress);
    assert_eq!(game.attempt_move(1, 1).unwrap(), Outcome::InProgress);
    assert_eq!(game.play_agent_turn().unwrap(), Outcome::InProgress);
    assert_eq!(game.attempt_move(2, 2).unwrap(), Outcome::WinA);

    assert!(game.is_over());
    assert_eq!(game.active_player(), Player::A);
    assert_eq!(
        std::fs::read_to_string(game.store().snapshot_path()).unwrap(),
        "3\n1,2,2\n0,1,0\n0,0,1\n1\n"
    );
    assert!(matches!(
        game.attempt_move(2, 0),
        Err(MoveError::MatchAlreadyOver)
    ));
}

#[test]
fn validator_rejects_taken_cell() {
    let dir = TempDir::new().unwrap();
    let mut game = new_match(&dir, "first_empty_agent.sh");

    game.attempt_move(1, 1).unwrap();
    let err = game.attempt_move(1, 1).unwrap_err();
    assert!(matches!(
        err,
        MoveError::Rejected(RejectionReason::Illegal)
    ));
    assert_eq!(game.active_player(), Player::B);
    assert_eq!(
        std::fs::read_to_string(game.store().query_path()).unwrap(),
        "1,1,2\n"
    );
    assert!(game.attempt_move(3, 0).is_err());
    assert!(game.attempt_move(-1, 0).is_err());
    assert_eq!(game.grid().get(1, 1).unwrap(), Cell::PlayerA);
}

#[test]
fn illegal_agent_move_is_refused() {
    let dir = TempDir::new().unwrap();
    let mut game = new_match(&dir, "stubborn_agent.sh");

    game.attempt_move(0, 0).unwrap();
    let err = game.play_agent_turn().unwrap_err();
    assert!(matches!(err, AgentTurnError::Move { row: 0, col: 0, .. }));
    assert_eq!(game.active_player(), Player::B);
    assert_eq!(game.grid().cells().iter().filter(|c| **c != Cell::Empty).count(), 1);
}

#[test]
fn hanging_validator_times_out() {
    init_test_logger();
    let dir = TempDir::new().unwrap();
    let store = FileExchangeStore::new(dir.path());
    store.prepare().unwrap();
    let agent = agent(&store, "first_empty_agent.sh");
    let mut game = MatchRunner::new(
        3,
        store,
        SystemRunner::default(),
        ValidatorGateway::new(
            ExternalCommand::new("sleep", ["5"]),
            Some(Duration::from_millis(200)),
        ),
        agent,
    );

    let start = Instant::now();
    let err = game.attempt_move(0, 0).unwrap_err();
    assert!(start.elapsed() < Duration::from_secs(4));
    assert!(matches!(
        err,
        MoveError::Rejected(RejectionReason::Validator(ValidatorError::TimedOut(_)))
    ));
    assert_eq!(game.grid().get(0, 0).unwrap(), Cell::Empty);
}

#[test]
fn missing_agent_program() {
    init_test_logger();
    let dir = TempDir::new().unwrap();
    let store = FileExchangeStore::new(dir.path());
    store.prepare().unwrap();
    let mut game = MatchRunner::new(
        3,
        store,
        SystemRunner::default(),
        validator(dir.path(), None),
        AgentGateway::new(
            ExternalCommand::new("grid-referee-no-such-agent", Vec::<String>::new()),
            None,
        ),
    );

    let err = game.play_agent_turn().unwrap_err();
    match err {
        AgentTurnError::Agent(e) => {
            assert!(matches!(e, AgentError::ProcessFailed(_)));
            assert_eq!(e.coordinates(), NO_MOVE);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(game.active_player(), Player::A);
}

/// Runs the `referee` binary on `input` with both external programs replaced by the scripts.
fn run_referee(dir: &TempDir, input: &str) -> (bool, String) {
    let mut child = Command::new(env!("CARGO_BIN_EXE_referee"))
        .env("REFEREE_DIMENSION", "3")
        .env("REFEREE_DATA_DIR", dir.path())
        .env("REFEREE_LOG", "false")
        .env("REFEREE_AGENT_PLAYER", "B")
        .env(
            "REFEREE_VALIDATOR_CMD",
            format!(
                "sh {} {}",
                script("validator.sh").display(),
                dir.path().display()
            ),
        )
        .env(
            "REFEREE_AGENT_CMD",
            format!("sh {}", script("first_empty_agent.sh").display()),
        )
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(input.as_bytes())
        .unwrap();
    let output = child.wait_with_output().unwrap();
    (
        output.status.success(),
        String::from_utf8_lossy(&output.stdout).into_owned(),
    )
}

#[test]
fn referee_binary_plays_to_the_end() {
    let dir = TempDir::new().unwrap();
    let (success, stdout) = run_referee(&dir, "0 0\nnot a move\n0 1\n1 1\n2 2\n");
    assert!(success, "{stdout}");
    assert!(stdout.contains("Expected two integers"));
    assert!(stdout.contains("Invalid move"));
    assert!(stdout.contains("Player 1 wins!"));
}

#[test]
fn referee_binary_fails_on_closed_stdin() {
    let dir = TempDir::new().unwrap();
    let (success, _) = run_referee(&dir, "0 0\n");
    assert!(!success);
}
