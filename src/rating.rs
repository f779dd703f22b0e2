use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::games::Validate;

pub mod elo;
pub mod glicko2;
pub mod store;
pub mod trueskill;

pub use elo::{Elo, EloConfig};
pub use glicko2::{Glicko2, Glicko2Config};
pub use store::{JsonFileStore, Store};
pub use trueskill::{TrueSkill, TrueSkillConfig};

/// Result of one game from the first strategy's point of view.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Win,
    Draw,
    Loss,
}

impl Outcome {
    pub fn from_scores(first: i32, second: i32) -> Self {
        match first.cmp(&second) {
            Ordering::Greater => Outcome::Win,
            Ordering::Less => Outcome::Loss,
            Ordering::Equal => Outcome::Draw,
        }
    }

    /// Same game seen from the other side.
    pub fn reversed(self) -> Self {
        match self {
            Outcome::Win => Outcome::Loss,
            Outcome::Loss => Outcome::Win,
            Outcome::Draw => Outcome::Draw,
        }
    }

    pub fn actual_score(self) -> f64 {
        match self {
            Outcome::Win => 1.0,
            Outcome::Draw => 0.5,
            Outcome::Loss => 0.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct MatchupRecord {
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
}

impl MatchupRecord {
    pub fn total(&self) -> u32 {
        self.wins + self.losses + self.draws
    }

    /// Draws count as half a win.
    pub fn win_rate(&self) -> Option<f64> {
        match self.total() {
            0 => None,
            total => Some((self.wins as f64 + 0.5 * self.draws as f64) / total as f64),
        }
    }

    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Win => self.wins += 1,
            Outcome::Loss => self.losses += 1,
            Outcome::Draw => self.draws += 1,
        }
    }
}

/// Head-to-head counters, kept for both directions of every pairing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Matchups(BTreeMap<String, BTreeMap<String, MatchupRecord>>);

impl Matchups {
    pub fn record(&mut self, first: &str, second: &str, outcome: Outcome) {
        self.0
            .entry(first.to_string())
            .or_default()
            .entry(second.to_string())
            .or_default()
            .record(outcome);
        self.0
            .entry(second.to_string())
            .or_default()
            .entry(first.to_string())
            .or_default()
            .record(outcome.reversed());
    }

    pub fn get(&self, first: &str, second: &str) -> Option<&MatchupRecord> {
        self.0.get(first).and_then(|row| row.get(second))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn table(&self) -> String {
        if self.is_empty() {
            return "No matchup data available.".to_string();
        }

        let mut strategies: Vec<&String> = self.0.keys().chain(self.0.values().flat_map(|row| row.keys())).collect();
        strategies.sort();
        strategies.dedup();

        let mut lines = vec!["Head-to-Head Win Rates:".to_string()];
        let mut header = format!("{:<12}", "vs.");
        for strategy in &strategies {
            header += &format!("{:>8}", truncate(strategy, 8));
        }
        lines.push(header);
        lines.push("-".repeat(12 + 8 * strategies.len()));

        for first in &strategies {
            let mut row = format!("{:<11} ", truncate(first, 11));
            for second in &strategies {
                let rate = if first == second {
                    None
                } else {
                    self.get(first, second).and_then(|r| r.win_rate())
                };
                match rate {
                    Some(rate) => row += &format!("{:>7.1}%", rate * 100.0),
                    None => row += "    -   ",
                }
            }
            lines.push(row);
        }

        lines.join("\n")
    }
}

fn truncate(name: &str, width: usize) -> String {
    name.chars().take(width).collect()
}

/// Per-strategy ratings plus the head-to-head counters. This is what a
/// rating system persists through a `Store`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ledger<R> {
    pub ratings: BTreeMap<String, R>,
    #[serde(default)]
    pub matchups: Matchups,
}

impl<R> Default for Ledger<R> {
    fn default() -> Self {
        Self {
            ratings: BTreeMap::new(),
            matchups: Matchups::default(),
        }
    }
}

// Rows sorted by a system specific key, highest first. Ties keep name order.
fn sorted_by_key<'a, R>(ratings: &'a BTreeMap<String, R>, key: impl Fn(&R) -> f64) -> Vec<(&'a String, &'a R)> {
    let mut rows: Vec<(&String, &R)> = ratings.iter().collect();
    rows.sort_by(|a, b| key(b.1).total_cmp(&key(a.1)));
    rows
}

pub trait RatingSystem {
    fn name(&self) -> &'static str;

    /// Update both strategies after one game. `outcome` is from `first`'s
    /// point of view.
    fn update_ratings(&mut self, first: &str, second: &str, outcome: Outcome);

    fn ratings_table(&self) -> String;

    fn matchups(&self) -> &Matchups;

    fn matchup_table(&self) -> String {
        self.matchups().table()
    }

    /// Replace the in-memory state with what the store holds. Missing or
    /// malformed data leaves the system empty.
    fn load(&mut self, store: &dyn Store);

    fn save(&self, store: &dyn Store) -> Result<()>;
}

/// Parameters of every rating system. Missing sections or fields keep their
/// defaults, so a config file only has to name what it changes.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingConfig {
    pub elo: EloConfig,
    pub glicko2: Glicko2Config,
    pub trueskill: TrueSkillConfig,
}

impl RatingConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let config: RatingConfig =
            serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Fresh Elo, Glicko-2 and TrueSkill systems, in that order.
    pub fn systems(&self) -> Vec<Box<dyn RatingSystem>> {
        vec![
            Box::new(Elo::new(self.elo)),
            Box::new(Glicko2::new(self.glicko2)),
            Box::new(TrueSkill::new(self.trueskill)),
        ]
    }
}

impl Validate for RatingConfig {
    fn validate(&self) -> Result<()> {
        let elo = &self.elo;
        if elo.min_k < 0.0 || elo.min_k > elo.initial_k || elo.k_decrease < 0.0 {
            return Err(anyhow!(
                "Elo K must decay from initial_k ({}) down to min_k ({}) by a non-negative step ({})",
                elo.initial_k,
                elo.min_k,
                elo.k_decrease
            ));
        }

        let glicko = &self.glicko2;
        if glicko.initial_rd <= 0.0 || glicko.initial_vol <= 0.0 || glicko.tau <= 0.0 || glicko.epsilon <= 0.0 {
            return Err(anyhow!("Glicko-2 rd, volatility, tau and epsilon must be positive"));
        }

        let trueskill = &self.trueskill;
        if trueskill.sigma <= 0.0 || trueskill.beta <= 0.0 || trueskill.tau < 0.0 {
            return Err(anyhow!("TrueSkill sigma and beta must be positive, tau non-negative"));
        }
        if !(0.0..1.0).contains(&trueskill.draw_probability) {
            return Err(anyhow!("TrueSkill draw probability {} is outside [0, 1)", trueskill.draw_probability));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_from_scores() {
        assert_eq!(Outcome::from_scores(30, 12), Outcome::Win);
        assert_eq!(Outcome::from_scores(12, 30), Outcome::Loss);
        assert_eq!(Outcome::from_scores(7, 7), Outcome::Draw);
        assert_eq!(Outcome::Win.reversed(), Outcome::Loss);
        assert_eq!(Outcome::Draw.reversed(), Outcome::Draw);
    }

    #[test]
    fn test_matchups_are_symmetric() {
        let mut matchups = Matchups::default();
        matchups.record("greedy", "dummy", Outcome::Win);
        matchups.record("greedy", "dummy", Outcome::Draw);
        matchups.record("dummy", "greedy", Outcome::Win);

        let greedy = matchups.get("greedy", "dummy").unwrap();
        assert_eq!(*greedy, MatchupRecord { wins: 1, losses: 1, draws: 1 });
        let dummy = matchups.get("dummy", "greedy").unwrap();
        assert_eq!(*dummy, MatchupRecord { wins: 1, losses: 1, draws: 1 });
        assert_eq!(greedy.win_rate(), Some(0.5));
        assert_eq!(MatchupRecord::default().win_rate(), None);
    }

    #[test]
    fn test_matchup_table() {
        assert_eq!(Matchups::default().table(), "No matchup data available.");

        let mut matchups = Matchups::default();
        matchups.record("smart", "dummy", Outcome::Win);
        matchups.record("smart", "dummy", Outcome::Win);
        matchups.record("smart", "dummy", Outcome::Draw);
        matchups.record("smart", "dummy", Outcome::Loss);

        let table = matchups.table();
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "Head-to-Head Win Rates:");
        assert_eq!(lines[1], "vs.            dummy   smart");
        assert_eq!(lines[2], "-".repeat(28));
        assert_eq!(lines[3], "dummy           -      37.5%");
        assert_eq!(lines[4], "smart          62.5%    -   ");
    }

    #[test]
    fn test_rating_config_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ratings.json");
        fs::write(&path, r#"{"elo": {"initial_k": 40.0}, "trueskill": {"draw_probability": 0.2}}"#).unwrap();

        let config = RatingConfig::from_file(&path).unwrap();
        assert_eq!(config.elo.initial_k, 40.0);
        assert_eq!(config.elo.min_k, 10.0);
        assert_eq!(config.glicko2.tau, 0.5);
        assert_eq!(config.trueskill.draw_probability, 0.2);
        assert_eq!(config.trueskill.mu, 25.0);
    }

    #[test]
    fn test_rating_config_rejects_bad_values() {
        let mut config = RatingConfig::default();
        assert!(config.validate().is_ok());

        config.elo.min_k = 50.0;
        assert!(config.validate().is_err());

        let mut config = RatingConfig::default();
        config.trueskill.draw_probability = 1.0;
        assert!(config.validate().is_err());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ratings.json");
        fs::write(&path, r#"{"glicko2": {"tau": -1.0}}"#).unwrap();
        assert!(RatingConfig::from_file(&path).is_err());
        assert!(RatingConfig::from_file(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_systems_use_configured_parameters() {
        let config = RatingConfig {
            elo: EloConfig { initial_rating: 1000.0, initial_k: 20.0, ..EloConfig::default() },
            ..RatingConfig::default()
        };
        let mut systems = config.systems();
        let names: Vec<&str> = systems.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["ELO", "Glicko2", "TrueSkill"]);

        systems[0].update_ratings("greedy", "dummy", Outcome::Win);
        assert!(systems[0].ratings_table().contains("1010.0"));
        assert!(systems[0].ratings_table().contains("990.0"));
    }
}
