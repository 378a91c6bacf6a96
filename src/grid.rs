//! Square board storage.
//!
//! A [`Grid`] owns `dimension²` [`Cell`] tokens in row-major order. Every access is
//! bounds-checked: out-of-range coordinates produce [`GridError::OutOfRange`] instead of
//! being ignored.

use std::fmt;

use thiserror::Error;

/// One of the two sides of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Player {
    /// First to move, written `1` in the exchange format.
    A,
    /// Second to move, written `2` in the exchange format.
    B,
}

impl Player {
    /// The opponent.
    pub fn other(self) -> Player {
        match self {
            Player::A => Player::B,
            Player::B => Player::A,
        }
    }

    /// The token this player leaves on the board.
    pub fn token(self) -> Cell {
        match self {
            Player::A => Cell::PlayerA,
            Player::B => Cell::PlayerB,
        }
    }

    /// Integer code used in the exchange artifacts.
    pub fn code(self) -> u8 {
        match self {
            Player::A => 1,
            Player::B => 2,
        }
    }

    /// Inverse of [`Player::code`].
    pub fn from_code(code: u8) -> Option<Player> {
        match code {
            1 => Some(Player::A),
            2 => Some(Player::B),
            _ => None,
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Occupant of a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Cell {
    #[default]
    Empty,
    PlayerA,
    PlayerB,
}

impl Cell {
    pub fn code(self) -> u8 {
        match self {
            Cell::Empty => 0,
            Cell::PlayerA => 1,
            Cell::PlayerB => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Cell> {
        match code {
            0 => Some(Cell::Empty),
            1 => Some(Cell::PlayerA),
            2 => Some(Cell::PlayerB),
            _ => None,
        }
    }

    /// Owner of the token, `None` for an empty cell.
    pub fn owner(self) -> Option<Player> {
        match self {
            Cell::Empty => None,
            Cell::PlayerA => Some(Player::A),
            Cell::PlayerB => Some(Player::B),
        }
    }

    fn glyph(self) -> char {
        match self {
            Cell::Empty => '.',
            Cell::PlayerA => 'X',
            Cell::PlayerB => 'O',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("cell ({row}, {col}) is outside of the {dimension}x{dimension} grid")]
    OutOfRange {
        row: i64,
        col: i64,
        dimension: usize,
    },
}

/// Fixed-size square matrix of [`Cell`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    dimension: usize,
    cells: Vec<Cell>,
}

impl Grid {
    /// Creates an empty grid.
    ///
    /// # Panics
    /// Panics if `dimension` is zero or if `dimension²` does not fit in a `usize`.
    pub fn new(dimension: usize) -> Grid {
        assert!(dimension >= 1, "a grid needs at least one cell");
        let Some(len) = dimension.checked_mul(dimension) else {
            panic!("a {dimension}x{dimension} grid has too many cells");
        };
        Grid {
            dimension,
            cells: vec![Cell::Empty; len],
        }
    }

    /// Builds a grid from row-major cells. Returns `None` unless `cells` holds exactly
    /// `dimension²` entries.
    pub fn from_cells(dimension: usize, cells: Vec<Cell>) -> Option<Grid> {
        if dimension == 0 || dimension.checked_mul(dimension) != Some(cells.len()) {
            return None;
        }
        Some(Grid { dimension, cells })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// All cells, row-major.
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Iterates over rows, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> {
        self.cells.chunks(self.dimension)
    }

    /// True when `(row, col)` addresses a cell of this grid.
    pub fn contains(&self, row: i64, col: i64) -> bool {
        self.index_of(row, col).is_ok()
    }

    pub fn get(&self, row: i64, col: i64) -> Result<Cell, GridError> {
        let index = self.index_of(row, col)?;
        Ok(self.cells[index])
    }

    pub fn set(&mut self, row: i64, col: i64, cell: Cell) -> Result<(), GridError> {
        let index = self.index_of(row, col)?;
        self.cells[index] = cell;
        Ok(())
    }

    pub fn is_empty(&self, row: i64, col: i64) -> Result<bool, GridError> {
        Ok(self.get(row, col)? == Cell::Empty)
    }

    /// True when no cell is empty.
    pub fn is_full(&self) -> bool {
        self.cells.iter().all(|&cell| cell != Cell::Empty)
    }

    /// Clears every cell.
    pub fn reset(&mut self) {
        self.cells.fill(Cell::Empty);
    }

    fn index_of(&self, row: i64, col: i64) -> Result<usize, GridError> {
        let out_of_range = GridError::OutOfRange {
            row,
            col,
            dimension: self.dimension,
        };
        let (Ok(r), Ok(c)) = (usize::try_from(row), usize::try_from(col)) else {
            return Err(out_of_range);
        };
        if r >= self.dimension || c >= self.dimension {
            return Err(out_of_range);
        }
        Ok(r * self.dimension + c)
    }
}

/// Column indices on top, row index in front of each row, `.` for empty cells, `X` for
/// player A and `O` for player B.
impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "  ")?;
        for col in 0..self.dimension {
            write!(f, "{col} ")?;
        }
        writeln!(f)?;
        for (i, row) in self.rows().enumerate() {
            write!(f, "{i} ")?;
            for cell in row {
                write!(f, "{} ", cell.glyph())?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
