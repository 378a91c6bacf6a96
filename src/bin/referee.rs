use std::{
    io::{self, BufRead, Write},
    process::ExitCode,
};

use anyhow::Context;
use grid_referee::{logger::init_logger, match_runner::MoveError, prelude::*};

const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const RESET: &str = "\x1b[0m";

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{RED}{e:#}{RESET}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> anyhow::Result<()> {
    let config = Configuration::from_env();
    if config.log() {
        init_logger(config.data_dir())?;
    }

    println!("=== Grid Referee ===");
    println!(
        "{n}x{n} grid, agent plays {}",
        config
            .agent_player()
            .map_or("no side".to_string(), |p| format!("player {p}")),
        n = config.dimension()
    );
    println!();

    let mut game = MatchRunner::from_configuration(&config)?;
    let mut input = io::stdin().lock();

    while !game.is_over() {
        println!("{game}");
        if config.agent_player() == Some(game.active_player()) {
            println!("Agent is thinking...");
            game.play_agent_turn().context("agent could not play")?;
        } else {
            human_turn(&mut game, &mut input)?;
        }
        println!();
    }

    println!("{}", game.grid());
    match game.outcome().winner() {
        Some(player) => println!("{GREEN}Player {player} wins!{RESET}"),
        None => println!("{GREEN}Draw.{RESET}"),
    }
    Ok(())
}

/// Prompts until the active player's move is committed.
fn human_turn<S, R>(game: &mut MatchRunner<S, R>, input: &mut impl BufRead) -> anyhow::Result<()>
where
    S: ExchangeStore,
    R: ProcessRunner,
{
    loop {
        print!("Player {}, enter row and column: ", game.active_player());
        io::stdout().flush()?;

        let mut line = String::new();
        if input.read_line(&mut line).context("could not read stdin")? == 0 {
            anyhow::bail!("stdin closed before the end of the match");
        }
        let Some((row, col)) = parse_move(&line) else {
            println!("{RED}Expected two integers separated by a space{RESET}");
            continue;
        };
        match game.attempt_move(row, col) {
            Ok(_) => return Ok(()),
            Err(MoveError::Rejected(reason)) => println!("{RED}Invalid move: {reason}{RESET}"),
            Err(e) => return Err(e.into()),
        }
    }
}

fn parse_move(line: &str) -> Option<(i64, i64)> {
    let mut words = line.split_whitespace();
    let row = words.next()?.parse().ok()?;
    let col = words.next()?.parse().ok()?;
    words.next().is_none().then_some((row, col))
}
