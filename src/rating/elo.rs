use serde::{Deserialize, Serialize};

use super::store::{self, Store};
use super::{sorted_by_key, Ledger, Matchups, Outcome, RatingSystem};

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EloConfig {
    pub initial_rating: f64,
    pub initial_k: f64,
    pub min_k: f64,
    /// K drop per game played
    pub k_decrease: f64,
}

impl Default for EloConfig {
    fn default() -> Self {
        Self {
            initial_rating: 1500.0,
            initial_k: 32.0,
            min_k: 10.0,
            k_decrease: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EloRating {
    pub rating: f64,
    pub k_factor: f64,
    pub games: u32,
}

#[derive(Clone, Debug, Default)]
pub struct Elo {
    config: EloConfig,
    ledger: Ledger<EloRating>,
}

/// Expected score of a player rated `rating` against `opponent`.
pub fn expected_score(rating: f64, opponent: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf((opponent - rating) / 400.0))
}

impl Elo {
    pub fn new(config: EloConfig) -> Self {
        Self {
            config,
            ledger: Ledger::default(),
        }
    }

    pub fn rating(&self, strategy: &str) -> Option<&EloRating> {
        self.ledger.ratings.get(strategy)
    }

    fn get_rating(&self, strategy: &str) -> EloRating {
        self.rating(strategy).copied().unwrap_or(EloRating {
            rating: self.config.initial_rating,
            k_factor: self.config.initial_k,
            games: 0,
        })
    }

    fn apply(&self, current: EloRating, actual: f64, expected: f64) -> EloRating {
        let games = current.games + 1;
        EloRating {
            rating: current.rating + current.k_factor * (actual - expected),
            k_factor: self.config.min_k.max(self.config.initial_k - self.config.k_decrease * games as f64),
            games,
        }
    }
}

impl RatingSystem for Elo {
    fn name(&self) -> &'static str {
        "ELO"
    }

    fn update_ratings(&mut self, first: &str, second: &str, outcome: Outcome) {
        let rating1 = self.get_rating(first);
        let rating2 = self.get_rating(second);

        let expected1 = expected_score(rating1.rating, rating2.rating);
        let expected2 = 1.0 - expected1;

        let updated1 = self.apply(rating1, outcome.actual_score(), expected1);
        let updated2 = self.apply(rating2, outcome.reversed().actual_score(), expected2);

        self.ledger.ratings.insert(first.to_string(), updated1);
        self.ledger.ratings.insert(second.to_string(), updated2);
        self.ledger.matchups.record(first, second, outcome);
    }

    fn ratings_table(&self) -> String {
        if self.ledger.ratings.is_empty() {
            return "No ratings available.".to_string();
        }

        let mut lines = vec![
            format!("{:<15} {:<10} {:<10} {:<10}", "Strategy", "Rating", "K-factor", "Games"),
            "-".repeat(45),
        ];
        for (strategy, data) in sorted_by_key(&self.ledger.ratings, |r| r.rating) {
            lines.push(format!(
                "{:<15} {:<10} {:<10} {:<10}",
                strategy,
                format!("{:.1}", data.rating),
                format!("{:.1}", data.k_factor),
                data.games
            ));
        }

        lines.join("\n")
    }

    fn matchups(&self) -> &Matchups {
        &self.ledger.matchups
    }

    fn load(&mut self, store: &dyn Store) {
        self.ledger = store::load(store);
    }

    fn save(&self, store: &dyn Store) -> anyhow::Result<()> {
        store::save(store, &self.ledger)
    }
}
