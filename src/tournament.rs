use anyhow::{Context, Result};
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::games::azul::{Game, GameConfig, Strategy};
use crate::games::Validate;
use crate::rating::{Outcome, RatingSystem};

/// Every ordered pairing of `strategies`. Mirror matches are included only
/// when `include_self` is set.
pub fn round_robin(strategies: &[Strategy], include_self: bool) -> Vec<(Strategy, Strategy)> {
    let mut pairs = Vec::new();
    for &first in strategies {
        for &second in strategies {
            if first != second || include_self {
                pairs.push((first, second));
            }
        }
    }
    pairs
}

/// Finished two seat game, also the line written to the game log.
#[derive(Clone, Debug, Serialize)]
pub struct MatchResult {
    pub game_id: usize,
    pub seed: u64,
    pub first: Strategy,
    pub second: Strategy,
    pub rounds: usize,
    pub scores: Vec<i32>,
    pub winners: Vec<usize>,
    pub outcome: Outcome,
}

pub fn play_match(game_id: usize, first: Strategy, second: Strategy, config: &GameConfig) -> Result<MatchResult> {
    let mut game = Game::new(vec![first, second], config)?;
    let scores = game
        .play_game()
        .with_context(|| format!("game {} ({} vs {}, seed {})", game_id, first, second, game.seed))?;

    if let Err(err) = game.validate() {
        log::warn!("Game {} ended in an inconsistent state: {}", game_id, err);
    }

    let result = MatchResult {
        game_id,
        seed: game.seed,
        first,
        second,
        rounds: game.board.round - 1,
        outcome: Outcome::from_scores(scores[0], scores[1]),
        winners: game.winners(),
        scores,
    };
    log::info!(
        "Game {}: {} {} - {} {}",
        game_id,
        first,
        result.scores[0],
        result.scores[1],
        second
    );
    Ok(result)
}

/// Play the schedule in parallel, one game per work item. Game `i` is seeded
/// with `base_seed + i`, so results don't depend on thread scheduling.
pub fn play_all(schedule: &[(Strategy, Strategy)], config: &GameConfig, base_seed: u64) -> Vec<Result<MatchResult>> {
    log::info!("Running {} games from base seed {}", schedule.len(), base_seed);

    (0..schedule.len())
        .into_par_iter()
        .map(|game_id| {
            let (first, second) = schedule[game_id];
            let config = GameConfig {
                seed: Some(base_seed.wrapping_add(game_id as u64)),
                ..config.clone()
            };
            play_match(game_id, first, second, &config)
        })
        .collect()
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PairSummary {
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
    pub avg_first: f64,
    pub avg_second: f64,
}

/// Per ordered pair results of a simulation run, keyed first seat then
/// second seat.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimulationSummary(pub BTreeMap<String, BTreeMap<String, PairSummary>>);

impl SimulationSummary {
    pub fn from_results(results: &[MatchResult]) -> Self {
        let mut totals: BTreeMap<(String, String), (PairSummary, i64, i64)> = BTreeMap::new();
        for result in results {
            let key = (result.first.to_string(), result.second.to_string());
            let (pair, first_total, second_total) = totals.entry(key).or_default();
            match result.outcome {
                Outcome::Win => pair.wins += 1,
                Outcome::Loss => pair.losses += 1,
                Outcome::Draw => pair.ties += 1,
            }
            *first_total += result.scores[0] as i64;
            *second_total += result.scores[1] as i64;
        }

        let mut summary = SimulationSummary::default();
        for ((first, second), (mut pair, first_total, second_total)) in totals {
            let games = (pair.wins + pair.losses + pair.ties) as f64;
            pair.avg_first = first_total as f64 / games;
            pair.avg_second = second_total as f64 / games;
            summary.0.entry(first).or_default().insert(second, pair);
        }
        summary
    }

    #[cfg(test)]
    pub fn get(&self, first: &str, second: &str) -> Option<&PairSummary> {
        self.0.get(first).and_then(|row| row.get(second))
    }

    /// Newer pair results replace older ones, other pairs are kept.
    pub fn merge(&mut self, newer: SimulationSummary) {
        for (first, row) in newer.0 {
            self.0.entry(first).or_default().extend(row);
        }
    }
}

/// Wall clock spent in `update_ratings`, per rating system.
#[derive(Clone, Debug, Default)]
pub struct UpdateTimings {
    samples: BTreeMap<&'static str, Vec<Duration>>,
}

impl UpdateTimings {
    pub fn record(&mut self, system: &'static str, elapsed: Duration) {
        self.samples.entry(system).or_default().push(elapsed);
    }

    #[cfg(test)]
    pub fn count(&self, system: &str) -> usize {
        self.samples.get(system).map_or(0, |s| s.len())
    }

    pub fn table(&self) -> String {
        let mut lines = vec![
            "Timing Statistics (seconds):".to_string(),
            format!("{:<12} {:>8} {:>8} {:>8} {:>8}", "System", "Mean", "Min", "Max", "Total"),
            "-".repeat(46),
        ];

        for (name, samples) in &self.samples {
            if samples.is_empty() {
                continue;
            }
            let total: Duration = samples.iter().sum();
            let mean = total.as_secs_f64() / samples.len() as f64;
            let min = samples.iter().min().copied().unwrap_or_default();
            let max = samples.iter().max().copied().unwrap_or_default();
            lines.push(format!(
                "{:<12} {:>8.6} {:>8.6} {:>8.6} {:>8.3}",
                name,
                mean,
                min.as_secs_f64(),
                max.as_secs_f64(),
                total.as_secs_f64()
            ));
        }

        lines.join("\n")
    }
}

/// Apply results to every system in game order.
pub fn feed_ratings(systems: &mut [Box<dyn RatingSystem>], results: &[MatchResult], timings: &mut UpdateTimings) {
    for result in results {
        let first = result.first.name();
        let second = result.second.name();
        for system in systems.iter_mut() {
            let start = Instant::now();
            system.update_ratings(first, second, result.outcome);
            timings.record(system.name(), start.elapsed());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rating::{Elo, Glicko2, TrueSkill};

    fn quick_config() -> GameConfig {
        GameConfig::default()
    }

    #[test]
    fn test_round_robin() {
        assert_eq!(round_robin(&Strategy::ALL, false).len(), 20);
        assert_eq!(round_robin(&Strategy::ALL, true).len(), 25);

        let pairs = round_robin(&[Strategy::Dummy, Strategy::Greedy], false);
        assert_eq!(pairs, vec![(Strategy::Dummy, Strategy::Greedy), (Strategy::Greedy, Strategy::Dummy)]);
    }

    #[test]
    fn test_play_match() {
        let config = GameConfig { seed: Some(5), ..quick_config() };
        let result = play_match(0, Strategy::Greedy, Strategy::Smart, &config).unwrap();

        assert_eq!(result.seed, 5);
        assert_eq!(result.scores.len(), 2);
        assert!(result.rounds >= 1);
        assert_eq!(result.outcome, Outcome::from_scores(result.scores[0], result.scores[1]));
        assert!(result.winners.iter().all(|&w| result.scores[w] == *result.scores.iter().max().unwrap()));
    }

    #[test]
    fn test_play_all_is_reproducible() {
        let schedule = round_robin(&[Strategy::Dummy, Strategy::Greedy, Strategy::Smart], true);
        let first: Vec<MatchResult> = play_all(&schedule, &quick_config(), 100).into_iter().map(|r| r.unwrap()).collect();
        let second: Vec<MatchResult> = play_all(&schedule, &quick_config(), 100).into_iter().map(|r| r.unwrap()).collect();

        assert_eq!(first.len(), 9);
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.game_id, b.game_id);
            assert_eq!(a.seed, 100 + a.game_id as u64);
            assert_eq!(a.scores, b.scores);
            assert_eq!((a.first, a.second), schedule[a.game_id]);
        }
    }

    fn result(first: Strategy, second: Strategy, scores: [i32; 2]) -> MatchResult {
        MatchResult {
            game_id: 0,
            seed: 0,
            first,
            second,
            rounds: 5,
            scores: scores.to_vec(),
            winners: vec![],
            outcome: Outcome::from_scores(scores[0], scores[1]),
        }
    }

    #[test]
    fn test_simulation_summary() {
        let results = vec![
            result(Strategy::Greedy, Strategy::Dummy, [30, 10]),
            result(Strategy::Greedy, Strategy::Dummy, [20, 20]),
            result(Strategy::Greedy, Strategy::Dummy, [10, 15]),
            result(Strategy::Dummy, Strategy::Greedy, [8, 12]),
        ];
        let summary = SimulationSummary::from_results(&results);

        let pair = summary.get("greedy", "dummy").unwrap();
        assert_eq!((pair.wins, pair.losses, pair.ties), (1, 1, 1));
        assert_eq!(pair.avg_first, 20.0);
        assert_eq!(pair.avg_second, 15.0);

        let reverse = summary.get("dummy", "greedy").unwrap();
        assert_eq!((reverse.wins, reverse.losses, reverse.ties), (0, 1, 0));
    }

    #[test]
    fn test_summary_merge_replaces_pairs() {
        let mut stored = SimulationSummary::from_results(&[
            result(Strategy::Greedy, Strategy::Dummy, [30, 10]),
            result(Strategy::Smart, Strategy::Dummy, [30, 10]),
        ]);
        let newer = SimulationSummary::from_results(&[result(Strategy::Greedy, Strategy::Dummy, [1, 2])]);
        stored.merge(newer);

        assert_eq!(stored.get("greedy", "dummy").unwrap().losses, 1);
        assert_eq!(stored.get("smart", "dummy").unwrap().wins, 1);
    }

    #[test]
    fn test_feed_ratings() {
        let mut systems: Vec<Box<dyn RatingSystem>> =
            vec![Box::new(Elo::default()), Box::new(Glicko2::default()), Box::new(TrueSkill::default())];
        let results = vec![
            result(Strategy::Greedy, Strategy::Dummy, [30, 10]),
            result(Strategy::Dummy, Strategy::Greedy, [10, 30]),
        ];
        let mut timings = UpdateTimings::default();
        feed_ratings(&mut systems, &results, &mut timings);

        for system in &systems {
            let record = system.matchups().get("greedy", "dummy").unwrap();
            assert_eq!(record.wins, 2, "{}", system.name());
            assert_eq!(timings.count(system.name()), 2);
        }
        assert!(timings.table().starts_with("Timing Statistics (seconds):"));
        assert_eq!(timings.table().lines().count(), 6);
    }
}
