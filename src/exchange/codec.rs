//! Text formats shared with the external processes.
//!
//! Everything here is pure: the gateways hand the produced text to an
//! [`ExchangeStore`](super::ExchangeStore) and feed what they read back into the decoders.
//!
//! Snapshot:
//! ```text
//! <dimension>
//! <cell(0,0)>,...,<cell(0,n-1)>
//! ...
//! <cell(n-1,0)>,...,<cell(n-1,n-1)>
//! <active player>
//! ```
//! Query: `<row>,<col>,<player>`. Responses: `valid` from the validator, `<row>,<col>` from
//! the agent.

use thiserror::Error;

use crate::grid::{Cell, Grid, Player};

/// Literal the validator must answer for a move to be legal.
pub const VALID_TOKEN: &str = "valid";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// What the external processes get to see of a match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub grid: Grid,
    pub active_player: Player,
}

/// A move submitted to the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveQuery {
    pub row: i64,
    pub col: i64,
    pub player: Player,
}

pub fn encode_snapshot(snapshot: &Snapshot) -> String {
    let mut text = format!("{}\n", snapshot.grid.dimension());
    for row in snapshot.grid.rows() {
        let line = row
            .iter()
            .map(|cell| cell.code().to_string())
            .collect::<Vec<_>>()
            .join(",");
        text.push_str(&line);
        text.push('\n');
    }
    text.push_str(&format!("{}\n", snapshot.active_player));
    text
}

pub fn decode_snapshot(text: &str) -> Result<Snapshot, CodecError> {
    let malformed = |msg: String| CodecError::MalformedSnapshot(msg);
    let lines = text.lines().collect::<Vec<_>>();

    let first = lines
        .first()
        .ok_or_else(|| malformed("empty snapshot".to_string()))?;
    let dimension = first
        .trim()
        .parse::<usize>()
        .ok()
        .filter(|&n| n >= 1)
        .ok_or_else(|| malformed(format!("invalid dimension '{first}'")))?;

    if lines.len().checked_sub(2) != Some(dimension) {
        return Err(malformed(format!(
            "expected {dimension} rows plus two lines, got {} lines",
            lines.len()
        )));
    }

    let mut cells = Vec::with_capacity(dimension * dimension);
    for (i, line) in lines[1..=dimension].iter().enumerate() {
        let fields = line.split(',').collect::<Vec<_>>();
        if fields.len() != dimension {
            return Err(malformed(format!(
                "row {i} has {} fields instead of {dimension}",
                fields.len()
            )));
        }
        for field in fields {
            let cell = field
                .trim()
                .parse::<u8>()
                .ok()
                .and_then(Cell::from_code)
                .ok_or_else(|| malformed(format!("invalid cell '{field}' in row {i}")))?;
            cells.push(cell);
        }
    }

    let last = lines[dimension + 1];
    let active_player = last
        .trim()
        .parse::<u8>()
        .ok()
        .and_then(Player::from_code)
        .ok_or_else(|| malformed(format!("invalid player '{last}'")))?;

    // cannot fail: exactly dimension² cells were pushed
    let grid = Grid::from_cells(dimension, cells)
        .ok_or_else(|| malformed("cell count mismatch".to_string()))?;
    Ok(Snapshot {
        grid,
        active_player,
    })
}

pub fn encode_query(query: &MoveQuery) -> String {
    format!("{},{},{}\n", query.row, query.col, query.player)
}

/// First line of a validator response, without its `\n`. Nothing else is stripped, so
/// `"valid \n"` or `"valid\r\n"` will not compare equal to [`VALID_TOKEN`].
pub fn decode_response_token(text: &str) -> &str {
    text.split('\n').next().unwrap_or_default()
}

/// Parses `<row>,<col>` from an agent response.
///
/// Leading whitespace and whitespace around the comma are skipped; anything after the
/// second integer is ignored.
pub fn decode_coordinate_pair(text: &str) -> Result<(i64, i64), CodecError> {
    let (row, rest) = take_integer(text)
        .ok_or_else(|| CodecError::MalformedResponse(format!("no row in '{text}'")))?;
    let rest = rest
        .trim_start()
        .strip_prefix(',')
        .ok_or_else(|| CodecError::MalformedResponse(format!("missing ',' in '{text}'")))?;
    let (col, _) = take_integer(rest)
        .ok_or_else(|| CodecError::MalformedResponse(format!("no column in '{text}'")))?;
    Ok((row, col))
}

/// Reads an optionally signed integer at the start of `s` (after whitespace) and returns it
/// with the unread remainder.
fn take_integer(s: &str) -> Option<(i64, &str)> {
    let s = s.trim_start();
    let sign_len = usize::from(s.starts_with(['-', '+']));
    let digits = s[sign_len..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    if digits == 0 {
        return None;
    }
    let end = sign_len + digits;
    let value = s[..end].parse().ok()?;
    Some((value, &s[end..]))
}
