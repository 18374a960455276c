use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Side length of the board.
pub const SIZE: usize = 4;
/// Tile value that latches a win.
pub const WINNING_TILE: u32 = 2048;
/// Largest tile a packed board can hold (exponent 15). Two of these never
/// merge: moves leave them in place and `is_terminal` ignores the pair, so a
/// full board whose only equal neighbours are 32768s is over.
pub const MAX_TILE: u32 = 1 << MAX_EXPONENT;

const MAX_EXPONENT: u64 = 15;
const LINE_TABLE_SIZE: usize = 0x1_0000; // 65,536 possible 16-bit lines

type BoardRaw = u64;
type Line = u64;
type Tile = u64;
pub type Score = u64;

/// A direction to slide/merge tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [Direction::Up, Direction::Down, Direction::Left, Direction::Right];

    /// Clockwise quarter turns that bring this direction's edge to the left.
    #[inline]
    pub fn rotations(self) -> u32 {
        match self {
            Direction::Left => 0,
            Direction::Down => 1,
            Direction::Right => 2,
            Direction::Up => 3,
        }
    }
}

impl FromStr for Direction {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" | "u" | "w" | "k" => Ok(Direction::Up),
            "down" | "s" | "j" => Ok(Direction::Down),
            "left" | "l" | "a" | "h" => Ok(Direction::Left),
            "right" | "r" | "d" => Ok(Direction::Right),
            other => Err(BoardError::UnknownDirection(other.to_string())),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        };
        f.write_str(name)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BoardError {
    #[error("cell ({row}, {col}) holds {value}, expected 0 or a power of two up to 32768")]
    InvalidTile { row: usize, col: usize, value: u32 },
    #[error("unknown direction: {0:?}")]
    UnknownDirection(String),
}

/// Result of sliding a board in one direction, before any tile is spawned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveOutcome {
    pub board: Board,
    /// Sum of the values produced by merges during this move.
    pub score_delta: Score,
    /// True iff any cell changed.
    pub moved: bool,
}

/// A tile placed by [`Board::spawn_tile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Spawn {
    /// Row-major cell index, 0..16.
    pub cell: usize,
    pub value: u32,
}

/// Packed 4x4 board as 16 4-bit exponents in a `u64`.
///
/// Cell 0 (top-left) lives in the highest nibble, rows run top to bottom.
/// An exponent of 0 is an empty cell; exponent `e` is the tile `2^e`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "[[u32; 4]; 4]", into = "[[u32; 4]; 4]")]
pub struct Board(BoardRaw);

impl Board {
    /// A constant empty board (all zeros).
    pub const EMPTY: Board = Board(0);

    /// Construct a `Board` from its raw packed representation.
    #[inline]
    pub fn from_raw(raw: BoardRaw) -> Self { Board(raw) }

    /// Borrow the raw packed `u64` for this `Board`.
    #[inline]
    pub fn raw(&self) -> BoardRaw { self.0 }

    /// Build a board from tile values, rejecting anything that is not 0 or a power of two.
    pub fn from_rows(rows: [[u32; SIZE]; SIZE]) -> Result<Self, BoardError> {
        let mut raw = 0;
        for (row, cells) in rows.iter().enumerate() {
            for (col, &value) in cells.iter().enumerate() {
                let exponent = match value {
                    0 => 0,
                    v if v.is_power_of_two() && (2..=MAX_TILE).contains(&v) => v.trailing_zeros() as u64,
                    _ => return Err(BoardError::InvalidTile { row, col, value }),
                };
                raw |= exponent << shift_for(row * SIZE + col);
            }
        }
        Ok(Board(raw))
    }

    /// Tile values, row by row.
    pub fn rows(self) -> [[u32; SIZE]; SIZE] {
        let mut rows = [[0; SIZE]; SIZE];
        for (idx, cell) in rows.iter_mut().flatten().enumerate() {
            *cell = self.tile_value(idx);
        }
        rows
    }

    /// A fresh board with exactly two random tiles on distinct cells.
    ///
    /// ```
    /// use plasma_learn_hub::engine::Board;
    /// use rand::{SeedableRng, rngs::StdRng};
    /// let mut rng = StdRng::seed_from_u64(123);
    /// let b = Board::initialize(&mut rng);
    /// assert_eq!(b.count_empty(), 14);
    /// ```
    pub fn initialize<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Board::EMPTY.with_random_tile(rng).with_random_tile(rng)
    }

    /// Insert a random 2 (90%) or 4 (10%) tile into a random empty cell. No-op on a full board.
    #[inline]
    pub fn with_random_tile<R: Rng + ?Sized>(self, rng: &mut R) -> Self {
        self.spawn_tile(rng).0
    }

    /// Like [`Board::with_random_tile`] but also reports where the tile went.
    pub fn spawn_tile<R: Rng + ?Sized>(self, rng: &mut R) -> (Self, Option<Spawn>) {
        let empty = self.count_empty();
        if empty == 0 {
            return (self, None);
        }
        let mut index = rng.gen_range(0..empty);
        let tile = generate_random_tile(rng);
        for cell in 0..SIZE * SIZE {
            if extract_tile(self, cell) != 0 {
                continue;
            }
            if index == 0 {
                let board = Board(self.0 | (tile << shift_for(cell)));
                return (board, Some(Spawn { cell, value: 1 << tile }));
            }
            index -= 1;
        }
        (self, None)
    }

    /// Slide and merge every line toward `dir`. No randomness.
    ///
    /// The board is rotated clockwise so that `dir` points left, each row is
    /// reduced through the lookup tables, and the result is rotated back.
    ///
    /// ```
    /// use plasma_learn_hub::engine::{Board, Direction};
    /// let b = Board::from_rows([[2, 2, 2, 0], [0; 4], [0; 4], [0; 4]]).unwrap();
    /// let out = b.apply_move(Direction::Left);
    /// assert_eq!(out.board.rows()[0], [4, 2, 0, 0]);
    /// assert_eq!(out.score_delta, 4);
    /// assert!(out.moved);
    /// ```
    pub fn apply_move(self, dir: Direction) -> MoveOutcome {
        let turns = dir.rotations();
        let rotated = rotate_cw(self.0, turns);
        let s = stores();
        let mut reduced: BoardRaw = 0;
        let mut score_delta: Score = 0;
        for row_idx in 0..4 {
            let line = extract_line(rotated, row_idx) as usize;
            reduced |= get_line_entry(&s.reduce_left, line) << (48 - 16 * row_idx);
            score_delta += get_line_entry(&s.merge_score, line);
        }
        let board = Board(rotate_cw(reduced, (4 - turns) % 4));
        MoveOutcome { board, score_delta, moved: board != self }
    }

    /// Shorthand for `apply_move(dir).board`.
    #[inline]
    pub fn shift(self, dir: Direction) -> Self { self.apply_move(dir).board }

    /// True iff the board is full and no cell has an equal neighbour below or to the right.
    pub fn is_terminal(self) -> bool {
        if self.count_empty() > 0 {
            return false;
        }
        for row in 0..SIZE {
            for col in 0..SIZE {
                let here = extract_tile(self, row * SIZE + col);
                if here == MAX_EXPONENT {
                    continue;
                }
                if row + 1 < SIZE && extract_tile(self, (row + 1) * SIZE + col) == here {
                    return false;
                }
                if col + 1 < SIZE && extract_tile(self, row * SIZE + col + 1) == here {
                    return false;
                }
            }
        }
        true
    }

    /// Return the highest tile value present on the board, 0 when empty.
    pub fn max_tile(self) -> u32 {
        (0..SIZE * SIZE).map(|idx| self.tile_value(idx)).max().unwrap_or(0)
    }

    /// True if some cell holds at least `value`.
    #[inline]
    pub fn has_tile_at_least(self, value: u32) -> bool { self.max_tile() >= value }

    /// Whether some cell holds exactly `value`.
    pub fn contains_tile(self, value: u32) -> bool { (0..SIZE * SIZE).any(|i| self.tile_value(i) == value) }

    /// Count the number of empty cells on the board.
    #[inline]
    pub fn count_empty(self) -> u64 { 16 - count_non_empty(self) }

    /// Sum of all tile values.
    pub fn tile_sum(self) -> u64 {
        (0..SIZE * SIZE).map(|idx| self.tile_value(idx) as u64).sum()
    }

    /// Tile value at `idx` (row-major, 0..16), 0 if empty.
    #[inline]
    pub fn tile_value(self, idx: usize) -> u32 {
        match extract_tile(self, idx) {
            0 => 0,
            e => 1 << e,
        }
    }

    /// Tile value at (`row`, `col`), 0 if empty.
    #[inline]
    pub fn cell(self, row: usize, col: usize) -> u32 { self.tile_value(row * SIZE + col) }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Board({:#018x})", self.0)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "-".repeat(31);
        for (i, row) in self.rows().iter().enumerate() {
            if i > 0 {
                writeln!(f, "{rule}")?;
            }
            let cells: Vec<String> = row.iter().map(|&v| format_val(v)).collect();
            writeln!(f, "{}", cells.join("|"))?;
        }
        Ok(())
    }
}

impl TryFrom<[[u32; SIZE]; SIZE]> for Board {
    type Error = BoardError;
    fn try_from(rows: [[u32; SIZE]; SIZE]) -> Result<Self, Self::Error> { Board::from_rows(rows) }
}

impl From<Board> for [[u32; SIZE]; SIZE] {
    fn from(b: Board) -> Self { b.rows() }
}

struct Stores {
    reduce_left: Box<[u64]>,
    merge_score: Box<[Score]>,
}

static STORES: OnceLock<Stores> = OnceLock::new();

/// Build the line tables now instead of on the first move. Safe to call multiple times.
pub fn init() {
    stores();
}

/// Fresh two-tile board from the thread RNG.
pub fn new_board() -> Board {
    let mut rng = rand::thread_rng();
    Board::initialize(&mut rng)
}

/// [`Board::spawn_tile`] with the thread RNG.
pub fn spawn_random_tile(board: Board) -> (Board, Option<Spawn>) {
    let mut rng = rand::thread_rng();
    board.spawn_tile(&mut rng)
}

#[inline(always)]
fn stores() -> &'static Stores {
    STORES.get_or_init(create_stores)
}

fn create_stores() -> Stores {
    // Allocate on the heap to avoid large stack frames
    let mut reduce_left = vec![0u64; LINE_TABLE_SIZE];
    let mut merge_score = vec![0u64; LINE_TABLE_SIZE];
    for (val, (line_out, score_out)) in reduce_left.iter_mut().zip(merge_score.iter_mut()).enumerate() {
        let (line, score) = reduce_line(val as Line);
        *line_out = line;
        *score_out = score;
    }
    Stores {
        reduce_left: reduce_left.into_boxed_slice(),
        merge_score: merge_score.into_boxed_slice(),
    }
}

#[inline(always)]
fn get_line_entry(table: &[u64], idx: usize) -> u64 {
    debug_assert!(idx < LINE_TABLE_SIZE);
    table[idx]
}

/// Compact, merge first pairs, compact again and pad: one row moving left.
fn reduce_line(line: Line) -> (Line, Score) {
    let packed: Vec<Tile> = line_to_vec(line).into_iter().filter(|&t| t != 0).collect();
    let mut merged = Vec::with_capacity(4);
    let mut score = 0;
    let mut i = 0;
    while i < packed.len() {
        let tile = packed[i];
        if i + 1 < packed.len() && packed[i + 1] == tile && tile < MAX_EXPONENT {
            merged.push(tile + 1);
            score += 1 << (tile + 1);
            i += 2;
        } else {
            merged.push(tile);
            i += 1;
        }
    }
    merged.resize(4, 0);
    (vec_to_line(&merged), score)
}

fn line_to_vec(line: Line) -> Vec<Tile> {
    (0..4).map(|tile_idx| (line >> ((3 - tile_idx) * 4)) & 0xf).collect()
}

fn vec_to_line(tiles: &[Tile]) -> Line {
    tiles[0] << 12 | tiles[1] << 8 | tiles[2] << 4 | tiles[3]
}

#[inline]
fn extract_line(board: BoardRaw, line_idx: u64) -> Line {
    (board >> ((3 - line_idx) * 16)) & 0xffff
}

#[inline]
fn extract_tile(board: Board, idx: usize) -> Tile {
    (board.0 >> shift_for(idx)) & 0xf
}

#[inline]
fn shift_for(idx: usize) -> u64 {
    ((15 - idx) * 4) as u64
}

// Credit to Nneonneo
fn transpose(x: BoardRaw) -> BoardRaw {
    let a1 = x & 0xF0F00F0FF0F00F0F;
    let a2 = x & 0x0000F0F00000F0F0;
    let a3 = x & 0x0F0F00000F0F0000;
    let a = a1 | (a2 << 12) | (a3 >> 12);
    let b1 = a & 0xFF00FF0000FF00FF;
    let b2 = a & 0x00FF00FF00000000;
    let b3 = a & 0x00000000FF00FF00;
    b1 | (b2 >> 24) | (b3 << 24)
}

/// Reverse the cell order inside every row.
fn mirror_rows(x: BoardRaw) -> BoardRaw {
    ((x & 0xF000F000F000F000) >> 12)
        | ((x & 0x0F000F000F000F00) >> 4)
        | ((x & 0x00F000F000F000F0) << 4)
        | ((x & 0x000F000F000F000F) << 12)
}

/// Rotate clockwise by `turns` quarter turns: new[r][c] = old[3 - c][r].
fn rotate_cw(x: BoardRaw, turns: u32) -> BoardRaw {
    (0..turns % 4).fold(x, |acc, _| mirror_rows(transpose(acc)))
}

// https://stackoverflow.com/questions/38225571/count-number-of-zero-nibbles-in-an-unsigned-64-bit-integer
fn count_non_empty(board: Board) -> u64 {
    let mut board_copy = board.0;
    board_copy |= board_copy >> 1;
    board_copy |= board_copy >> 2;
    board_copy &= 0x1111111111111111;
    board_copy.count_ones() as u64
}

fn generate_random_tile<R: Rng + ?Sized>(rng: &mut R) -> Tile { if rng.gen_range(0..10) < 9 { 1 } else { 2 } }

fn format_val(val: u32) -> String {
    match val {
        0 => " ".repeat(7),
        v => format!("{v:^7}"),
    }
}
