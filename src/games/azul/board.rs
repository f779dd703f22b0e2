use serde::Serialize;

use super::cpu::Strategy;
use super::logic::get_valid_lines;
use super::model::{GameMode, Move, Player, Source, SourceId, Tile, WallPattern, WALL_COLORS};
use crate::errors::AzulError;
use crate::games::GameState;

/// Everything a strategy is allowed to see: the tile sources, every player's
/// board and whose turn it is. The bag, discard pile and RNG stay with
/// `Game`, so a `Board` is cheap to clone for lookahead.
#[derive(Clone, Debug, Serialize)]
pub struct Board {
    pub factories: Vec<Source>,
    pub center: Source,
    pub players: Vec<Player>,
    pub seats: Vec<Strategy>,
    pub mode: GameMode,
    pub wall_pattern: WallPattern,
    pub round: usize,
    pub active_player: usize,
    pub first_player_token: usize,
}

impl Board {
    pub fn new(seats: Vec<Strategy>, mode: GameMode) -> Self {
        let n_players = seats.len();
        Self {
            factories: vec![Source::default(); n_players * 2 + 1],
            center: Source::new(vec![Tile::FirstPlayer]),
            players: (0..n_players).map(|i| Player::new(format!("Player {}", i + 1))).collect(),
            seats,
            mode,
            wall_pattern: WALL_COLORS,
            round: 1,
            active_player: 0,
            first_player_token: 0,
        }
    }

    pub fn source(&self, id: SourceId) -> Option<&Source> {
        match id {
            SourceId::Factory(i) => self.factories.get(i),
            SourceId::Center => Some(&self.center),
        }
    }

    /// Tell if the center holds anything besides the first player marker.
    pub fn is_center_valid_choice(&self) -> bool {
        self.center.has_tiles()
    }

    /// Factories in order, then the center when it has real tiles.
    pub fn available_sources(&self) -> Vec<SourceId> {
        let mut sources: Vec<SourceId> = self
            .factories
            .iter()
            .enumerate()
            .filter(|(_, f)| f.has_tiles())
            .map(|(i, _)| SourceId::Factory(i))
            .collect();
        if self.is_center_valid_choice() {
            sources.push(SourceId::Center);
        }
        sources
    }

    pub fn has_legal_moves(&self) -> bool {
        self.factories.iter().any(|f| f.has_tiles()) || self.is_center_valid_choice()
    }

    pub fn get_valid_lines(&self, player_idx: usize, color: Tile) -> Vec<usize> {
        get_valid_lines(&self.players[player_idx], color, self.mode, &self.wall_pattern)
    }

    pub fn tiles_in_play(&self) -> usize {
        let in_sources: usize = self.factories.iter().map(|f| f.colored_len()).sum::<usize>() + self.center.colored_len();
        let on_boards: usize = self.players.iter().map(|p| p.tiles_on_board()).sum();
        in_sources + on_boards
    }

    fn check_move(&self, player_idx: usize, mv: &Move) -> Result<(), AzulError> {
        let illegal = || AzulError::IllegalMove {
            player: player_idx,
            from: mv.source,
            color: mv.color,
            line: mv.line,
        };

        if player_idx >= self.players.len() || mv.color.is_marker() {
            return Err(illegal());
        }
        match self.source(mv.source) {
            Some(source) if source.count_color(mv.color) > 0 => {}
            _ => return Err(illegal()),
        }
        if let Some(line) = mv.line {
            if !self.get_valid_lines(player_idx, mv.color).contains(&line) {
                return Err(illegal());
            }
        }

        Ok(())
    }

    /// Apply a move for the given player. All tiles of the color leave the
    /// source; a factory's leftovers go to the center. Picking first from the
    /// center also takes the first player marker onto the floor line.
    pub fn execute_move(&mut self, player_idx: usize, mv: Move) -> Result<(), AzulError> {
        self.check_move(player_idx, &mv)?;

        let taken = match mv.source {
            SourceId::Factory(i) => {
                let tiles = std::mem::take(&mut self.factories[i].tiles);
                let (taken, rest): (Vec<Tile>, Vec<Tile>) = tiles.into_iter().partition(|&t| t == mv.color);
                self.center.tiles.extend(rest);
                taken.len()
            }
            SourceId::Center => {
                let taken = self.center.count_color(mv.color);
                self.center.tiles.retain(|&t| t != mv.color);

                if self.center.has_marker() {
                    self.center.tiles.retain(|t| !t.is_marker());
                    self.first_player_token = player_idx;
                    self.players[player_idx].floor_line.push(Tile::FirstPlayer);
                }
                taken
            }
        };

        let player = &mut self.players[player_idx];
        match mv.line {
            Some(idx) => {
                let placed = taken.min(player.spaces(idx));
                player.pattern_lines[idx].color = Some(mv.color);
                player.pattern_lines[idx].count += placed;
                // Penalize for the leftovers
                player.floor_line.extend(std::iter::repeat(mv.color).take(taken - placed));
            }
            None => player.floor_line.extend(std::iter::repeat(mv.color).take(taken)),
        }

        Ok(())
    }
}

impl GameState for Board {
    fn is_round_over(&self) -> bool {
        !self.has_legal_moves()
    }

    // Rows only complete while tiling at round end
    fn is_game_over(&self) -> bool {
        self.players.iter().any(|p| p.has_completed_row())
    }
}
