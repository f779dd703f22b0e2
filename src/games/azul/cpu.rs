use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::board::Board;
use super::logic::{calculate_end_game_bonus, calculate_floor_penalty, score_tile, wall_column, WallPlacement};
use super::model::{Move, Player, SourceId, Tile, BOARD_SIZE};
use crate::errors::AzulError;

/// The move selectors a seat can be driven by.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Dummy,
    Greedy,
    Smart,
    Strategic,
    Minmax,
}

impl Strategy {
    pub const ALL: [Strategy; 5] = [
        Strategy::Dummy,
        Strategy::Greedy,
        Strategy::Smart,
        Strategy::Strategic,
        Strategy::Minmax,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Dummy => "dummy",
            Strategy::Greedy => "greedy",
            Strategy::Smart => "smart",
            Strategy::Strategic => "strategic",
            Strategy::Minmax => "minmax",
        }
    }

    /// Pick a move for `board.active_player`.
    pub fn choose_move(&self, board: &Board) -> Result<Move, AzulError> {
        if !board.has_legal_moves() {
            return Err(AzulError::NoLegalMoves);
        }

        match self {
            Strategy::Dummy => play_dummy(board),
            Strategy::Greedy => play_greedy(board),
            Strategy::Smart => play_smart(board),
            Strategy::Strategic => play_strategic(board),
            Strategy::Minmax => play_minmax(board),
        }
    }
}

impl FromStr for Strategy {
    type Err = AzulError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Strategy::ALL
            .iter()
            .copied()
            .find(|strategy| strategy.name() == s.to_lowercase())
            .ok_or_else(|| AzulError::UnknownStrategy(s.to_string()))
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// A placement into a pattern line along with how many tiles it moves and how
// much room the line had before.
#[derive(Clone, Copy, Debug)]
struct Candidate {
    mv: Move,
    tiles: usize,
    spaces: usize,
}

impl Candidate {
    fn fits(&self) -> bool {
        self.tiles <= self.spaces
    }

    fn whitespace(&self) -> usize {
        self.spaces.saturating_sub(self.tiles)
    }

    fn line(&self) -> usize {
        self.mv.line.unwrap_or_default()
    }
}

fn source_tiles(board: &Board, source: SourceId) -> Vec<(Tile, usize)> {
    board
        .source(source)
        .map(|s| s.colors().into_iter().map(|c| (c, s.count_color(c))).collect())
        .unwrap_or_default()
}

// Every (source, color, legal pattern line) for the active player. Factories
// come first in order, then the center.
fn list_candidates(board: &Board) -> Vec<Candidate> {
    let player_idx = board.active_player;
    let player = &board.players[player_idx];
    let mut candidates = Vec::new();

    for source in board.available_sources() {
        for (color, tiles) in source_tiles(board, source) {
            for line in board.get_valid_lines(player_idx, color) {
                candidates.push(Candidate {
                    mv: Move::new(source, color, Some(line)),
                    tiles,
                    spaces: player.spaces(line),
                });
            }
        }
    }

    candidates
}

fn check_adjacents(board: &Board, player: &Player, row: usize, color: Tile) -> (bool, bool) {
    let col = match wall_column(&player.wall, row, color, board.mode, &board.wall_pattern) {
        WallPlacement::Placed(col) => col,
        WallPlacement::NoLegalColumn => return (false, false),
    };
    let wall = &player.wall;

    let horizontal = (col > 0 && wall[row][col - 1].is_some()) || (col + 1 < BOARD_SIZE && wall[row][col + 1].is_some());
    let vertical = (row > 0 && wall[row - 1][col].is_some()) || (row + 1 < BOARD_SIZE && wall[row + 1][col].is_some());

    (horizontal, vertical)
}

fn has_adjacent(board: &Board, player: &Player, row: usize, color: Tile) -> bool {
    let (horizontal, vertical) = check_adjacents(board, player, row, color);
    horizontal || vertical
}

fn is_move_in_diagonal(board: &Board, player: &Player, row: usize, color: Tile) -> bool {
    wall_column(&player.wall, row, color, board.mode, &board.wall_pattern) == WallPlacement::Placed(row)
}

// Dump the smallest pile available straight to the floor.
fn find_least_negative(board: &Board) -> Result<Move, AzulError> {
    let mut best: Option<(usize, Move)> = None;

    for source in board.available_sources() {
        for (color, tiles) in source_tiles(board, source) {
            if best.is_none_or(|(least, _)| tiles < least) {
                best = Some((tiles, Move::new(source, color, None)));
            }
        }
    }

    best.map(|(_, mv)| mv).ok_or(AzulError::NoLegalMoves)
}

// Placement whose tile count is closest to the room left in its line.
fn find_least_overflow(candidates: &[Candidate]) -> Option<Move> {
    candidates
        .iter()
        .min_by_key(|c| c.spaces.abs_diff(c.tiles))
        .map(|c| c.mv)
}

// Choose the first source and color that fits somewhere, into the widest line.
fn play_dummy(board: &Board) -> Result<Move, AzulError> {
    for source in board.available_sources() {
        for (color, _) in source_tiles(board, source) {
            if let Some(&widest) = board.get_valid_lines(board.active_player, color).iter().max() {
                return Ok(Move::new(source, color, Some(widest)));
            }
        }
    }

    find_least_negative(board)
}

// Place as many tiles as possible without spilling over.
fn play_greedy(board: &Board) -> Result<Move, AzulError> {
    let candidates = list_candidates(board);

    let mut best: Option<&Candidate> = None;
    for candidate in candidates.iter().filter(|c| c.fits()) {
        if best.is_none_or(|b| candidate.tiles > b.tiles) {
            best = Some(candidate);
        }
    }

    match best.map(|c| c.mv).or_else(|| find_least_overflow(&candidates)) {
        Some(mv) => Ok(mv),
        None => find_least_negative(board),
    }
}

// Fill lines as tightly as possible, preferring spots next to existing wall
// tiles and then bigger pickups.
fn play_smart(board: &Board) -> Result<Move, AzulError> {
    let player = &board.players[board.active_player];
    let candidates = list_candidates(board);

    let mut best: Option<Move> = None;
    let mut least_whitespace = usize::MAX;
    let mut most_tiles = 0;
    let mut adjacent_found = false;

    for candidate in candidates.iter().filter(|c| c.fits()) {
        let whitespace = candidate.whitespace();
        if whitespace > least_whitespace {
            continue;
        }
        if whitespace < least_whitespace {
            least_whitespace = whitespace;
            adjacent_found = false;
            most_tiles = 0;
        }
        if adjacent_found {
            continue;
        }

        if has_adjacent(board, player, candidate.line(), candidate.mv.color) {
            adjacent_found = true;
            best = Some(candidate.mv);
        } else if candidate.tiles > most_tiles {
            most_tiles = candidate.tiles;
            best = Some(candidate.mv);
        }
    }

    match best.or_else(|| find_least_overflow(&candidates)) {
        Some(mv) => Ok(mv),
        None => find_least_negative(board),
    }
}

// Same tight packing as smart, with a priority cascade inside each
// whitespace tier: first-round diagonal, adjacent on both axes, adjacent on
// one axis, most tiles.
fn play_strategic(board: &Board) -> Result<Move, AzulError> {
    let player = &board.players[board.active_player];
    let candidates = list_candidates(board);

    // (whitespace, priority, tiles, move)
    let mut best: Option<(usize, u8, usize, Move)> = None;

    for candidate in candidates.iter().filter(|c| c.fits()) {
        let line = candidate.line();
        let color = candidate.mv.color;
        let (horizontal, vertical) = check_adjacents(board, player, line, color);

        let priority = if board.round == 1 && is_move_in_diagonal(board, player, line, color) {
            3
        } else if horizontal && vertical {
            2
        } else if horizontal || vertical {
            1
        } else {
            0
        };

        let whitespace = candidate.whitespace();
        let better = match best {
            None => true,
            Some((ws, prio, tiles, _)) => {
                whitespace < ws
                    || (whitespace == ws && priority > prio)
                    || (whitespace == ws && priority == 0 && prio == 0 && candidate.tiles > tiles)
            }
        };
        if better {
            best = Some((whitespace, priority, candidate.tiles, candidate.mv));
        }
    }

    match best.map(|(_, _, _, mv)| mv).or_else(|| find_least_overflow(&candidates)) {
        Some(mv) => Ok(mv),
        None => find_least_negative(board),
    }
}

// Candidate moves worth simulating: every line that can take the color, plus
// the floor when nothing fits or the pile is small enough to throw away.
fn get_efficient_moves(board: &Board) -> Vec<Move> {
    let mut moves = Vec::new();

    for source in board.available_sources() {
        for (color, tiles) in source_tiles(board, source) {
            let lines = board.get_valid_lines(board.active_player, color);
            moves.extend(lines.iter().map(|&line| Move::new(source, color, Some(line))));
            if lines.is_empty() || tiles <= 2 {
                moves.push(Move::new(source, color, None));
            }
        }
    }

    moves
}

fn is_near_game_end(player: &Player) -> bool {
    player.wall.iter().any(|row| row.iter().filter(|c| c.is_some()).count() >= 4)
}

fn evaluate_player(board: &Board, player: &Player) -> i32 {
    let mut score = 0;

    // Existing wall tiles
    for row in 0..BOARD_SIZE {
        for col in 0..BOARD_SIZE {
            if player.wall[row][col].is_some() {
                score += score_tile(&player.wall, row, col);
            }
        }
    }

    // Completed pattern lines that will be tiled this round
    for (i, line) in player.pattern_lines.iter().enumerate() {
        if let (true, Some(color)) = (player.is_line_full(i), line.color) {
            if let WallPlacement::Placed(col) = wall_column(&player.wall, i, color, board.mode, &board.wall_pattern) {
                score += score_tile(&player.wall, i, col);
            }
        }
    }

    score - calculate_floor_penalty(player.floor_line.len())
}

/// Heuristic score difference between `player_idx` and `opponent_idx`.
pub fn evaluate_state(board: &Board, player_idx: usize, opponent_idx: usize) -> i32 {
    let player = &board.players[player_idx];
    let opponent = &board.players[opponent_idx];

    let mut player_score = evaluate_player(board, player);
    let mut opponent_score = evaluate_player(board, opponent);

    if is_near_game_end(player) || is_near_game_end(opponent) {
        let (rows, cols, colors) = calculate_end_game_bonus(&player.wall);
        player_score += rows + cols + colors;
        let (rows, cols, colors) = calculate_end_game_bonus(&opponent.wall);
        opponent_score += rows + cols + colors;
    }

    player_score - opponent_score
}

/// Cheaper estimate used when no opponent reply could be simulated.
pub fn evaluate_state_fast(player: &Player, opponent: &Player) -> i32 {
    let line_estimate = |p: &Player| -> i32 {
        (0..BOARD_SIZE)
            .filter(|&i| p.is_line_full(i))
            .map(|i| i as i32 + 2)
            .sum()
    };

    let mut diff = player.score - opponent.score;
    diff -= calculate_floor_penalty(player.floor_line.len());
    diff += calculate_floor_penalty(opponent.floor_line.len());
    diff + line_estimate(player) - line_estimate(opponent)
}

// One ply of lookahead: try each efficient move, let the next player answer
// with their own strategy, and keep the move with the best evaluation.
fn play_minmax(board: &Board) -> Result<Move, AzulError> {
    let player_idx = board.active_player;
    let opponent_idx = (player_idx + 1) % board.players.len();
    let opponent_strategy = board.seats[opponent_idx];

    let mut best: Option<(i32, Move)> = None;

    for mv in get_efficient_moves(board) {
        let mut sim = board.clone();
        sim.execute_move(player_idx, mv)?;

        // Only the opponent keeps its real strategy, which bounds the recursion
        // when it is a lookahead player too.
        for (i, seat) in sim.seats.iter_mut().enumerate() {
            if i != opponent_idx {
                *seat = Strategy::Dummy;
            }
        }
        sim.active_player = opponent_idx;

        let reply = opponent_strategy
            .choose_move(&sim)
            .and_then(|reply| sim.execute_move(opponent_idx, reply));
        let score = match reply {
            Ok(()) => evaluate_state(&sim, player_idx, opponent_idx),
            Err(err) => {
                log::trace!("Opponent {} has no reply to {:?}: {}", opponent_strategy, mv, err);
                evaluate_state_fast(&sim.players[player_idx], &sim.players[opponent_idx])
            }
        };

        if best.is_none_or(|(top, _)| score > top) {
            best = Some((score, mv));
        }
    }

    match best {
        Some((score, mv)) => {
            log::trace!("Minmax picked {:?} with evaluation {}", mv, score);
            Ok(mv)
        }
        None => find_least_negative(board),
    }
}
