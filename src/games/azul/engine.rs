use anyhow::{anyhow, Result};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::board::Board;
use super::cpu::Strategy;
use super::logic::{calculate_end_game_bonus, calculate_floor_penalty, score_tile, wall_column, WallPlacement};
use super::model::{GameMode, Move, PatternLine, Tile, BOARD_SIZE, COLORS, FACTORY_CAPACITY, TILES_PER_COLOR, TOTAL_TILES};
use crate::errors::AzulError;
use crate::games::{GameState, Validate};

pub const MIN_PLAYERS: usize = 2;
// Five seats empty the bag and discard into lines that can never fill
pub const MAX_PLAYERS: usize = 4;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub mode: GameMode,
    pub seed: Option<u64>,
    pub max_rounds: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            mode: GameMode::Pattern,
            seed: None,
            max_rounds: 100,
        }
    }
}

impl Validate for GameConfig {
    fn validate(&self) -> Result<()> {
        if self.max_rounds == 0 {
            return Err(anyhow!("max_rounds must be at least 1"));
        }
        Ok(())
    }
}

/// A full game: the shared `Board` plus the bag, the discard pile and the
/// shuffling RNG.
#[derive(Clone, Debug)]
pub struct Game {
    pub board: Board,
    pub bag: Vec<Tile>,
    pub discard: Vec<Tile>,
    pub seed: u64,
    max_rounds: usize,
    rng: ChaCha8Rng,
}

impl Game {
    pub fn new(seats: Vec<Strategy>, config: &GameConfig) -> Result<Self, AzulError> {
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&seats.len()) {
            return Err(AzulError::InvalidPlayerCount(seats.len()));
        }

        let seed = config.seed.unwrap_or_else(|| rand::rng().random());
        log::debug!("Game seed: {}", seed);

        Ok(Self {
            board: Board::new(seats, config.mode),
            bag: Vec::with_capacity(TOTAL_TILES),
            discard: Vec::with_capacity(TOTAL_TILES),
            seed,
            max_rounds: config.max_rounds,
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }

    /// Fill and shuffle the bag, deal the factories and seed the center.
    pub fn setup(&mut self) {
        self.bag = COLORS
            .iter()
            .flat_map(|&c| std::iter::repeat(c).take(TILES_PER_COLOR))
            .collect();
        self.discard.clear();
        self.bag.shuffle(&mut self.rng);
        self.board.round = 1;
        self.board.first_player_token = 0;
        self.refill_tiles();
    }

    // Refill factories from the bag, recycling the discard pile when the bag
    // can't cover a full deal. A factory may come up short once both run dry.
    fn refill_tiles(&mut self) {
        if self.bag.len() < self.board.factories.len() * FACTORY_CAPACITY && !self.discard.is_empty() {
            log::debug!("Recycling {} tiles from discard into the bag", self.discard.len());
            self.bag.append(&mut self.discard);
            self.bag.shuffle(&mut self.rng);
        }

        for factory in &mut self.board.factories {
            factory.tiles.clear();
            for _ in 0..FACTORY_CAPACITY {
                match self.bag.pop() {
                    Some(tile) => factory.tiles.push(tile),
                    None => break,
                }
            }
        }

        self.board.center.tiles = vec![Tile::FirstPlayer];
    }

    pub fn execute_move(&mut self, player_idx: usize, mv: Move) -> Result<(), AzulError> {
        self.board.execute_move(player_idx, mv)
    }

    /// Ask the active seat's strategy for a move and apply it.
    pub fn play_turn(&mut self) -> Result<Move, AzulError> {
        let player_idx = self.board.active_player;
        let mv = self.board.seats[player_idx].choose_move(&self.board)?;
        log::debug!("P{} plays {:?}", player_idx, mv);
        self.execute_move(player_idx, mv)?;
        Ok(mv)
    }

    pub fn play_round(&mut self) -> Result<(), AzulError> {
        self.board.active_player = self.board.first_player_token;
        while !self.board.is_round_over() {
            self.play_turn()?;
            self.board.active_player = (self.board.active_player + 1) % self.board.players.len();
        }
        Ok(())
    }

    /// Tile the walls, score, apply floor penalties and deal the next round.
    pub fn end_round(&mut self) {
        for player_idx in 0..self.board.players.len() {
            self.tile_wall_and_score(player_idx);
        }
        self.refill_tiles();
    }

    fn tile_wall_and_score(&mut self, player_idx: usize) {
        let mode = self.board.mode;
        let pattern = self.board.wall_pattern;
        let player = &mut self.board.players[player_idx];

        for i in 0..BOARD_SIZE {
            if !player.is_line_full(i) {
                continue;
            }
            let line = std::mem::take(&mut player.pattern_lines[i]);
            let Some(color) = line.color else { continue };

            match wall_column(&player.wall, i, color, mode, &pattern) {
                WallPlacement::Placed(col) => {
                    player.wall[i][col] = Some(color);
                    player.score += score_tile(&player.wall, i, col);
                    // One tile goes up on the wall, the rest of the line is discarded
                    self.discard.extend(std::iter::repeat(color).take(line.count - 1));
                }
                WallPlacement::NoLegalColumn => {
                    log::debug!("No valid column for {} in row {}, moving to floor line", color, i);
                    player.floor_line.extend(std::iter::repeat(color).take(line.count));
                }
            }
        }

        let penalty = calculate_floor_penalty(player.floor_line.len());
        player.score = (player.score - penalty).max(0);
        self.discard.extend(player.floor_line.drain(..).filter(|t| !t.is_marker()));
        log::debug!("Score P{}: {}", player_idx, player.score);
    }

    pub fn end_game_scoring(&mut self) {
        for player in &mut self.board.players {
            let (rows, cols, colors) = calculate_end_game_bonus(&player.wall);
            player.score += rows + cols + colors;
        }
    }

    /// Play from setup to the final bonus and return every player's score.
    pub fn play_game(&mut self) -> Result<Vec<i32>, AzulError> {
        self.setup();
        while !self.is_game_over() {
            if self.board.round > self.max_rounds {
                return Err(AzulError::RoundLimitExceeded(self.max_rounds));
            }
            log::debug!("Round: {}", self.board.round);
            self.play_round()?;
            self.end_round();
            self.board.round += 1;
        }

        self.end_game_scoring();
        let scores = self.scores();
        log::debug!("Final scores: {:?}", scores);
        Ok(scores)
    }

    pub fn scores(&self) -> Vec<i32> {
        self.board.players.iter().map(|p| p.score).collect()
    }

    /// Indices of every player sharing the top score.
    pub fn winners(&self) -> Vec<usize> {
        let best = self.board.players.iter().map(|p| p.score).max().unwrap_or(0);
        (0..self.board.players.len())
            .filter(|&i| self.board.players[i].score == best)
            .collect()
    }

    pub fn total_tiles(&self) -> usize {
        self.bag.len() + self.discard.len() + self.board.tiles_in_play()
    }
}

impl GameState for Game {
    fn is_round_over(&self) -> bool {
        self.board.is_round_over()
    }

    fn is_game_over(&self) -> bool {
        self.board.is_game_over()
    }
}

impl Validate for Game {
    fn validate(&self) -> Result<()> {
        let total = self.total_tiles();
        if total != TOTAL_TILES {
            return Err(anyhow!("Tile count is {} instead of {}", total, TOTAL_TILES));
        }

        for (p, player) in self.board.players.iter().enumerate() {
            for (i, line) in player.pattern_lines.iter().enumerate() {
                let consistent = match line {
                    PatternLine { color: None, count } => *count == 0,
                    PatternLine { color: Some(tile), count } => !tile.is_marker() && *count <= i + 1,
                };
                if !consistent {
                    return Err(anyhow!("P{} pattern line {} is inconsistent: {:?}", p, i, line));
                }
            }
        }

        let markers = self.board.center.tiles.iter().filter(|t| t.is_marker()).count()
            + self
                .board
                .players
                .iter()
                .map(|p| p.floor_line.iter().filter(|t| t.is_marker()).count())
                .sum::<usize>();
        if markers > 1 {
            return Err(anyhow!("Found {} first player markers", markers));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::azul::cpu::Strategy;
    use crate::games::azul::model::{Source, SourceId};
    use proptest::prelude::*;

    fn seeded(seats: Vec<Strategy>, mode: GameMode, seed: u64) -> Game {
        let config = GameConfig { mode, seed: Some(seed), ..GameConfig::default() };
        Game::new(seats, &config).unwrap()
    }

    #[test]
    fn test_player_count_bounds() {
        let config = GameConfig::default();
        assert_eq!(Game::new(vec![Strategy::Dummy], &config).unwrap_err(), AzulError::InvalidPlayerCount(1));
        assert!(Game::new(vec![Strategy::Dummy; 4], &config).is_ok());
        assert_eq!(Game::new(vec![Strategy::Dummy; 5], &config).unwrap_err(), AzulError::InvalidPlayerCount(5));
    }

    #[test]
    fn test_setup() {
        let mut game = seeded(vec![Strategy::Dummy, Strategy::Greedy], GameMode::Pattern, 7);
        game.setup();

        assert_eq!(game.board.factories.len(), 5);
        assert!(game.board.factories.iter().all(|f| f.tiles.len() == 4));
        assert_eq!(game.board.center.tiles, vec![Tile::FirstPlayer]);
        assert_eq!(game.bag.len(), 80);
        game.validate().unwrap();
    }

    #[test]
    fn test_short_bag_deals_partial_factory() {
        let mut game = seeded(vec![Strategy::Dummy, Strategy::Dummy], GameMode::Pattern, 7);
        game.setup();
        // Pretend 94 tiles are stuck on the walls by draining them from the game
        game.bag.truncate(6);
        for factory in &mut game.board.factories {
            factory.tiles.clear();
        }
        game.refill_tiles();

        let dealt: Vec<usize> = game.board.factories.iter().map(|f| f.tiles.len()).collect();
        assert_eq!(dealt, vec![4, 2, 0, 0, 0]);
    }

    #[test]
    fn test_end_round_scores_full_lines() {
        let mut game = seeded(vec![Strategy::Dummy, Strategy::Dummy], GameMode::Pattern, 1);
        game.setup();
        // Move three reds from the bag onto line 2, plus two whites on the floor
        for _ in 0..3 {
            let pos = game.bag.iter().position(|&t| t == Tile::Red).unwrap();
            game.bag.remove(pos);
        }
        for _ in 0..2 {
            let pos = game.bag.iter().position(|&t| t == Tile::White).unwrap();
            game.bag.remove(pos);
        }
        game.board.center.tiles.clear();
        let player = &mut game.board.players[0];
        player.pattern_lines[2] = PatternLine { color: Some(Tile::Red), count: 3 };
        player.floor_line = vec![Tile::FirstPlayer, Tile::White, Tile::White];
        player.score = 10;
        game.validate().unwrap();

        game.tile_wall_and_score(0);
        let player = &game.board.players[0];
        assert_eq!(player.wall[2][4], Some(Tile::Red));
        assert!(player.pattern_lines[2].is_empty());
        // +1 for the tile, -4 for three floor tiles
        assert_eq!(player.score, 7);
        assert!(player.floor_line.is_empty());
        assert_eq!(game.discard.len(), 4);
        game.validate().unwrap();
    }

    #[test]
    fn test_score_never_negative() {
        let mut game = seeded(vec![Strategy::Dummy, Strategy::Dummy], GameMode::Pattern, 1);
        game.setup();
        let tiles: Vec<Tile> = game.bag.drain(..7).collect();
        game.board.players[1].floor_line = tiles;
        game.board.players[1].score = 3;
        game.tile_wall_and_score(1);
        assert_eq!(game.board.players[1].score, 0);
        game.validate().unwrap();
    }

    #[test]
    fn test_free_mode_blocked_line_goes_to_floor() {
        let mut game = seeded(vec![Strategy::Dummy, Strategy::Dummy], GameMode::Free, 1);
        game.setup();
        let pos = game.bag.iter().position(|&t| t == Tile::Red).unwrap();
        game.bag.remove(pos);
        let pos = game.bag.iter().position(|&t| t == Tile::Red).unwrap();
        game.bag.remove(pos);
        let player = &mut game.board.players[0];
        player.wall[0][0] = Some(Tile::Red);
        player.pattern_lines[0] = PatternLine { color: Some(Tile::Red), count: 1 };

        game.tile_wall_and_score(0);
        let player = &game.board.players[0];
        assert_eq!(player.wall[0].iter().filter(|c| c.is_some()).count(), 1);
        assert_eq!(player.score, 0);
        assert_eq!(game.discard, vec![Tile::Red]);
        game.validate().unwrap();
    }

    #[test]
    fn test_marker_claim_sets_next_starter() {
        let mut game = seeded(vec![Strategy::Dummy, Strategy::Dummy], GameMode::Pattern, 3);
        game.setup();
        game.board.factories[0].tiles = vec![Tile::Red, Tile::Blue, Tile::Blue, Tile::Blue];
        game.execute_move(0, Move::new(SourceId::Factory(0), Tile::Red, Some(0))).unwrap();
        assert_eq!(game.board.first_player_token, 0);

        game.execute_move(1, Move::new(SourceId::Center, Tile::Blue, Some(2))).unwrap();
        assert_eq!(game.board.first_player_token, 1);
        assert_eq!(game.board.players[1].floor_line, vec![Tile::FirstPlayer]);
    }

    #[test]
    fn test_fixed_seed_game_is_reproducible() {
        let seats = vec![Strategy::Greedy, Strategy::Smart];
        let mut first = seeded(seats.clone(), GameMode::Pattern, 42);
        let mut second = seeded(seats, GameMode::Pattern, 42);

        let scores = first.play_game().unwrap();
        assert_eq!(scores, second.play_game().unwrap());
        assert!(first.board.players.iter().any(|p| p.has_completed_row()));
        assert!(first.board.round <= 15);
        first.validate().unwrap();
    }

    #[test]
    fn test_free_mode_game_finishes() {
        let mut game = seeded(vec![Strategy::Strategic, Strategy::Dummy, Strategy::Greedy], GameMode::Free, 11);
        let scores = game.play_game().unwrap();
        assert_eq!(scores.len(), 3);
        assert!(!game.winners().is_empty());
        game.validate().unwrap();
    }

    #[test]
    fn test_four_dummies_always_finish() {
        for seed in 0..30 {
            for mode in [GameMode::Pattern, GameMode::Free] {
                let mut game = seeded(vec![Strategy::Dummy; 4], mode, seed);
                game.play_game().unwrap();
                assert!(game.is_game_over());
                assert!(game.board.round <= 30, "seed {} took {} rounds", seed, game.board.round);
                game.validate().unwrap();
            }
        }
    }

    #[test]
    fn test_round_limit() {
        let config = GameConfig { seed: Some(5), max_rounds: 1, ..GameConfig::default() };
        let mut game = Game::new(vec![Strategy::Dummy, Strategy::Dummy], &config).unwrap();
        assert_eq!(game.play_game().unwrap_err(), AzulError::RoundLimitExceeded(1));
    }

    #[test]
    fn test_winners_reports_ties() {
        let mut game = seeded(vec![Strategy::Dummy; 3], GameMode::Pattern, 1);
        game.board.players[0].score = 12;
        game.board.players[1].score = 20;
        game.board.players[2].score = 20;
        assert_eq!(game.winners(), vec![1, 2]);
    }

    #[test]
    fn test_sources_stay_consistent_during_round() {
        let mut game = seeded(vec![Strategy::Smart, Strategy::Greedy], GameMode::Pattern, 9);
        game.setup();
        while !game.is_round_over() {
            game.play_turn().unwrap();
            game.board.active_player = (game.board.active_player + 1) % 2;
            game.validate().unwrap();
            assert!(game.board.factories.iter().all(|f: &Source| f.tiles.is_empty() || f.tiles.len() == 4));
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_tiles_are_conserved(seed in any::<u64>(), a in 0usize..5, b in 0usize..5, free in any::<bool>()) {
            let seats = vec![Strategy::ALL[a], Strategy::ALL[b]];
            let mode = if free { GameMode::Free } else { GameMode::Pattern };
            let mut game = seeded(seats, mode, seed);
            game.setup();

            while !game.board.players.iter().any(|p| p.has_completed_row()) && game.board.round <= 30 {
                game.board.active_player = game.board.first_player_token;
                while !game.is_round_over() {
                    game.play_turn().unwrap();
                    game.board.active_player = (game.board.active_player + 1) % 2;
                    prop_assert!(game.validate().is_ok());
                }
                game.end_round();
                game.board.round += 1;
                prop_assert!(game.validate().is_ok());
                for player in &game.board.players {
                    prop_assert!(player.floor_line.is_empty());
                }
            }
        }
    }
}
