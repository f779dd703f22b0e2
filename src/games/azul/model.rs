use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Tile {
    Red,
    Blue,
    Yellow,
    Black,
    White,
    FirstPlayer,
}

pub const BOARD_SIZE: usize = 5;
pub const TILES_PER_COLOR: usize = 20;
pub const FACTORY_CAPACITY: usize = 4;
pub const TOTAL_TILES: usize = TILES_PER_COLOR * COLORS.len();

// Iteration order for every candidate enumeration, so strategies stay
// deterministic for a given board.
pub const COLORS: [Tile; 5] = [Tile::Red, Tile::Blue, Tile::Yellow, Tile::Black, Tile::White];

pub type WallPattern = [[Tile; BOARD_SIZE]; BOARD_SIZE];
pub type Wall = [[Option<Tile>; BOARD_SIZE]; BOARD_SIZE];

pub const WALL_COLORS: WallPattern = [
    [Tile::Blue, Tile::Yellow, Tile::Red, Tile::Black, Tile::White],
    [Tile::White, Tile::Blue, Tile::Yellow, Tile::Red, Tile::Black],
    [Tile::Black, Tile::White, Tile::Blue, Tile::Yellow, Tile::Red],
    [Tile::Red, Tile::Black, Tile::White, Tile::Blue, Tile::Yellow],
    [Tile::Yellow, Tile::Red, Tile::Black, Tile::White, Tile::Blue],
];

impl Tile {
    pub fn is_marker(&self) -> bool {
        *self == Tile::FirstPlayer
    }

    pub fn symbol(&self) -> char {
        match self {
            Tile::Red => 'R',
            Tile::Blue => 'B',
            Tile::Yellow => 'Y',
            Tile::Black => 'K',
            Tile::White => 'W',
            Tile::FirstPlayer => '1',
        }
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    /// Every wall cell accepts one fixed color from the Latin square.
    #[default]
    Pattern,
    /// Any column is fine as long as the color is unique in its row and column.
    Free,
}

impl FromStr for GameMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pattern" => Ok(GameMode::Pattern),
            "free" => Ok(GameMode::Free),
            other => Err(format!("unknown game mode: {other}")),
        }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameMode::Pattern => write!(f, "pattern"),
            GameMode::Free => write!(f, "free"),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum SourceId {
    Factory(usize),
    Center,
}

// Tiles on a factory display or in the center of the table. The center also
// carries the first player marker until somebody picks from it.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub tiles: Vec<Tile>,
}

impl Source {
    pub fn new(tiles: Vec<Tile>) -> Self {
        Self { tiles }
    }

    /// Distinct colors present, marker excluded, in `COLORS` order.
    pub fn colors(&self) -> Vec<Tile> {
        COLORS
            .iter()
            .copied()
            .filter(|c| self.tiles.contains(c))
            .collect()
    }

    pub fn count_color(&self, color: Tile) -> usize {
        self.tiles.iter().filter(|&&t| t == color).count()
    }

    pub fn has_tiles(&self) -> bool {
        self.tiles.iter().any(|t| !t.is_marker())
    }

    pub fn has_marker(&self) -> bool {
        self.tiles.iter().any(|t| t.is_marker())
    }

    pub fn colored_len(&self) -> usize {
        self.tiles.iter().filter(|t| !t.is_marker()).count()
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct PatternLine {
    pub color: Option<Tile>,
    pub count: usize,
}

impl PatternLine {
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    pub pattern_lines: [PatternLine; BOARD_SIZE],
    pub wall: Wall,
    pub floor_line: Vec<Tile>,
    pub score: i32,
}

impl Player {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pattern_lines: [PatternLine::default(); BOARD_SIZE],
            wall: [[None; BOARD_SIZE]; BOARD_SIZE],
            floor_line: Vec::new(),
            score: 0,
        }
    }

    /// Free slots left in pattern line `idx` (capacity is `idx + 1`).
    pub fn spaces(&self, idx: usize) -> usize {
        idx + 1 - self.pattern_lines[idx].count
    }

    pub fn is_line_full(&self, idx: usize) -> bool {
        self.pattern_lines[idx].count == idx + 1
    }

    // Tell if a player has completed at least one row. If this happens, the
    // game gets over after the current round.
    pub fn has_completed_row(&self) -> bool {
        self.wall.iter().any(|row| row.iter().all(|c| c.is_some()))
    }

    pub fn tiles_on_board(&self) -> usize {
        let staged: usize = self.pattern_lines.iter().map(|l| l.count).sum();
        let walled = self.wall.iter().flatten().filter(|c| c.is_some()).count();
        let floor = self.floor_line.iter().filter(|t| !t.is_marker()).count();
        staged + walled + floor
    }
}

// Action that tells which tile stash is picked by a player, which color, and
// which pattern line receives it. `None` routes everything to the floor line.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Move {
    pub source: SourceId,
    pub color: Tile,
    pub line: Option<usize>,
}

impl Move {
    pub fn new(source: SourceId, color: Tile, line: Option<usize>) -> Self {
        Self { source, color, line }
    }
}
