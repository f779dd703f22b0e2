use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use super::store::{self, Store};
use super::{sorted_by_key, Ledger, Matchups, Outcome, RatingSystem};

/// Ratio between the Glicko and the Glicko-2 scales (400 / ln 10).
const SCALE: f64 = 173.7178;
const CENTER: f64 = 1500.0;

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Glicko2Config {
    pub initial_rating: f64,
    pub initial_rd: f64,
    pub initial_vol: f64,
    /// Constrains volatility changes over time
    pub tau: f64,
    pub epsilon: f64,
    pub max_iterations: usize,
}

impl Default for Glicko2Config {
    fn default() -> Self {
        Self {
            initial_rating: 1500.0,
            initial_rd: 350.0,
            initial_vol: 0.06,
            tau: 0.5,
            epsilon: 1e-6,
            max_iterations: 100,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Glicko2Rating {
    pub rating: f64,
    pub rd: f64,
    pub vol: f64,
    pub games: u32,
}

#[derive(Clone, Debug, Default)]
pub struct Glicko2 {
    config: Glicko2Config,
    ledger: Ledger<Glicko2Rating>,
}

fn reduce_impact(phi: f64) -> f64 {
    1.0 / (1.0 + 3.0 * phi * phi / (PI * PI)).sqrt()
}

impl Glicko2 {
    pub fn new(config: Glicko2Config) -> Self {
        Self {
            config,
            ledger: Ledger::default(),
        }
    }

    pub fn rating(&self, strategy: &str) -> Option<&Glicko2Rating> {
        self.ledger.ratings.get(strategy)
    }

    fn get_rating(&self, strategy: &str) -> Glicko2Rating {
        self.rating(strategy).copied().unwrap_or(Glicko2Rating {
            rating: self.config.initial_rating,
            rd: self.config.initial_rd,
            vol: self.config.initial_vol,
            games: 0,
        })
    }

    // Illinois variant of regula falsi on the volatility equation, working on
    // x = ln(vol^2).
    fn determine_vol(&self, phi: f64, vol: f64, delta: f64, v: f64) -> f64 {
        let tau = self.config.tau;
        let a = (vol * vol).ln();
        let delta_sq = delta * delta;
        let phi_sq = phi * phi;

        let f = |x: f64| {
            let ex = x.exp();
            let tmp = phi_sq + v + ex;
            ex * (delta_sq - tmp) / (2.0 * tmp * tmp) - (x - a) / (tau * tau)
        };

        let mut big_a = a;
        let mut big_b = if delta_sq > phi_sq + v {
            (delta_sq - phi_sq - v).ln()
        } else {
            let mut k = 1.0;
            while f(a - k * tau) < 0.0 && k < self.config.max_iterations as f64 {
                k += 1.0;
            }
            a - k * tau
        };

        let mut f_a = f(big_a);
        let mut f_b = f(big_b);
        let mut iterations = 0;
        while (big_b - big_a).abs() > self.config.epsilon && iterations < self.config.max_iterations {
            iterations += 1;
            let big_c = big_a + (big_a - big_b) * f_a / (f_b - f_a);
            let f_c = f(big_c);
            if f_c * f_b <= 0.0 {
                big_a = big_b;
                f_a = f_b;
            } else {
                f_a /= 2.0;
            }
            big_b = big_c;
            f_b = f_c;
        }

        (big_a / 2.0).exp()
    }

    /// New rating for `player` after scoring `score` against `opponent`.
    /// Returns the player unchanged when the variance term underflows or the
    /// solve goes non-finite.
    pub fn compute_new_rating(&self, player: &Glicko2Rating, opponent: &Glicko2Rating, score: f64) -> Glicko2Rating {
        let mu = (player.rating - CENTER) / SCALE;
        let phi = player.rd / SCALE;
        let opponent_mu = (opponent.rating - CENTER) / SCALE;
        let opponent_phi = opponent.rd / SCALE;

        let g = reduce_impact(opponent_phi);
        let expected = 1.0 / (1.0 + (-g * (mu - opponent_mu)).exp());
        let v_inv = g * g * expected * (1.0 - expected);
        if v_inv < self.config.epsilon {
            log::debug!("Glicko-2 variance underflow, skipping update");
            return *player;
        }

        let v = 1.0 / v_inv;
        let delta = v * g * (score - expected);

        let vol = self.determine_vol(phi, player.vol, delta, v);
        let phi_star = (phi * phi + vol * vol).sqrt();
        let new_phi = 1.0 / (1.0 / (phi_star * phi_star) + 1.0 / v).sqrt();
        let new_mu = mu + new_phi * new_phi * g * (score - expected);

        let updated = Glicko2Rating {
            rating: new_mu * SCALE + CENTER,
            rd: new_phi * SCALE,
            vol,
            games: player.games,
        };
        if ![updated.rating, updated.rd, updated.vol].iter().all(|x| x.is_finite()) {
            log::warn!("Glicko-2 update went non-finite, keeping previous rating");
            return *player;
        }

        updated
    }
}

impl RatingSystem for Glicko2 {
    fn name(&self) -> &'static str {
        "Glicko2"
    }

    fn update_ratings(&mut self, first: &str, second: &str, outcome: Outcome) {
        let rating1 = self.get_rating(first);
        let rating2 = self.get_rating(second);

        // Both sides are rated from the pre-game values
        let mut updated1 = self.compute_new_rating(&rating1, &rating2, outcome.actual_score());
        let mut updated2 = self.compute_new_rating(&rating2, &rating1, outcome.reversed().actual_score());
        updated1.games = rating1.games + 1;
        updated2.games = rating2.games + 1;

        self.ledger.ratings.insert(first.to_string(), updated1);
        self.ledger.ratings.insert(second.to_string(), updated2);
        self.ledger.matchups.record(first, second, outcome);
    }

    fn ratings_table(&self) -> String {
        if self.ledger.ratings.is_empty() {
            return "No ratings available.".to_string();
        }

        let mut lines = vec![
            format!("{:<15} {:<10} {:<10} {:<10} {:<10}", "Strategy", "Rating", "RD", "Vol", "Games"),
            "-".repeat(55),
        ];
        // Conservative estimate first
        for (strategy, data) in sorted_by_key(&self.ledger.ratings, |r| r.rating - 2.0 * r.rd) {
            lines.push(format!(
                "{:<15} {:<10} {:<10} {:<10} {:<10}",
                strategy,
                format!("{:.1}", data.rating),
                format!("±{:.1}", data.rd),
                format!("{:.3}", data.vol),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rating::store::MemoryStore;

    #[test]
    fn test_winner_goes_up_and_uncertainty_shrinks() {
        let mut glicko = Glicko2::default();
        glicko.update_ratings("greedy", "dummy", Outcome::Win);

        let winner = glicko.rating("greedy").unwrap();
        let loser = glicko.rating("dummy").unwrap();
        assert!(winner.rating > 1500.0);
        assert!(loser.rating < 1500.0);
        assert!(winner.rd < 350.0);
        assert!(loser.rd < 350.0);
        assert!((winner.rating - 1500.0 - (1500.0 - loser.rating)).abs() < 1e-9);
        assert_eq!(winner.games, 1);
    }

    fn assert_rating(actual: &Glicko2Rating, rating: f64, rd: f64) {
        assert!((actual.rating - rating).abs() < 1e-4, "rating {} != {}", actual.rating, rating);
        assert!((actual.rd - rd).abs() < 1e-4, "rd {} != {}", actual.rd, rd);
    }

    #[test]
    fn test_glickman_paper_player() {
        // Player from the Glickman paper, single game against the
        // first opponent, with tau 0.5.
        let glicko = Glicko2::default();
        let player = Glicko2Rating { rating: 1500.0, rd: 200.0, vol: 0.06, games: 0 };
        let opponent = Glicko2Rating { rating: 1400.0, rd: 30.0, vol: 0.06, games: 0 };

        let updated = glicko.compute_new_rating(&player, &opponent, 1.0);
        assert_rating(&updated, 1563.564194, 175.402656);
        assert!((updated.vol - 0.059998657).abs() < 1e-8);
    }

    #[test]
    fn test_newcomer_win_and_favourite_loss() {
        let glicko = Glicko2::default();
        let newcomer = Glicko2Rating { rating: 1500.0, rd: 350.0, vol: 0.06, games: 0 };
        let updated = glicko.compute_new_rating(&newcomer, &newcomer, 1.0);
        assert_rating(&updated, 1662.310894, 290.318964);

        // Settled favourite losing to an uncertain underdog
        let favourite = Glicko2Rating { rating: 1700.0, rd: 80.0, vol: 0.06, games: 30 };
        let underdog = Glicko2Rating { rating: 1500.0, rd: 300.0, vol: 0.06, games: 2 };
        let updated = glicko.compute_new_rating(&favourite, &underdog, 0.0);
        assert_rating(&updated, 1681.524023, 79.729670);
        assert_eq!(updated.games, 30);
    }

    #[test]
    fn test_draw_between_equals_keeps_rating() {
        let mut glicko = Glicko2::default();
        glicko.update_ratings("smart", "strategic", Outcome::Draw);
        let smart = glicko.rating("smart").unwrap();
        assert!((smart.rating - 1500.0).abs() < 1e-9);
        assert!(smart.rd < 350.0);
    }

    #[test]
    fn test_degenerate_variance_is_a_no_op() {
        let glicko = Glicko2::default();
        let player = Glicko2Rating { rating: 3500.0, rd: 30.0, vol: 0.06, games: 12 };
        let opponent = Glicko2Rating { rating: 100.0, rd: 30.0, vol: 0.06, games: 12 };

        let updated = glicko.compute_new_rating(&player, &opponent, 1.0);
        assert_eq!(updated, player);
    }

    #[test]
    fn test_ratings_table_orders_by_conservative_rating() {
        let mut glicko = Glicko2::default();
        for _ in 0..5 {
            glicko.update_ratings("minmax", "dummy", Outcome::Win);
        }

        let table = glicko.ratings_table();
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0].trim_end(), "Strategy        Rating     RD         Vol        Games");
        assert!(lines[2].starts_with("minmax"));
        assert!(lines[3].starts_with("dummy"));
        assert!(lines[2].contains('±'));
    }

    #[test]
    fn test_save_and_load() {
        let store = MemoryStore::default();
        let mut glicko = Glicko2::default();
        glicko.update_ratings("greedy", "smart", Outcome::Win);
        glicko.save(&store).unwrap();

        let mut restored = Glicko2::default();
        restored.load(&store);
        assert_eq!(restored.rating("greedy"), glicko.rating("greedy"));
        assert_eq!(restored.rating("smart"), glicko.rating("smart"));
    }
}
