use serde::{Deserialize, Serialize};
use statrs::distribution::{Continuous, ContinuousCDF, Normal};
use std::f64::consts::SQRT_2;

use super::store::{self, Store};
use super::{sorted_by_key, Ledger, Matchups, Outcome, RatingSystem};

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TrueSkillConfig {
    pub mu: f64,
    pub sigma: f64,
    /// Distance that guarantees about 76% chance of winning
    pub beta: f64,
    /// Dynamic factor added to sigma before every game
    pub tau: f64,
    pub draw_probability: f64,
}

impl Default for TrueSkillConfig {
    fn default() -> Self {
        let sigma = 25.0 / 3.0;
        Self {
            mu: 25.0,
            sigma,
            beta: sigma / 2.0,
            tau: sigma / 100.0,
            draw_probability: 0.10,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrueSkillRating {
    pub mu: f64,
    pub sigma: f64,
}

impl TrueSkillRating {
    /// Conservative skill estimate used for ranking.
    pub fn exposure(&self) -> f64 {
        self.mu - 3.0 * self.sigma
    }
}

#[derive(Clone, Debug, Default)]
pub struct TrueSkill {
    config: TrueSkillConfig,
    ledger: Ledger<TrueSkillRating>,
}

fn pdf(x: f64) -> f64 {
    Normal::standard().pdf(x)
}

fn cdf(x: f64) -> f64 {
    Normal::standard().cdf(x)
}

fn ppf(p: f64) -> f64 {
    Normal::standard().inverse_cdf(p)
}

// Mean and variance correction factors of the truncated Gaussian, for a win
// (difference above the draw margin) or a draw (difference within it).
fn v_win(t: f64, eps: f64) -> f64 {
    let x = t - eps;
    let denom = cdf(x);
    if denom > 0.0 {
        pdf(x) / denom
    } else {
        -x
    }
}

fn w_win(t: f64, eps: f64) -> Option<f64> {
    let v = v_win(t, eps);
    let w = v * (v + t - eps);
    (w > 0.0 && w < 1.0).then_some(w)
}

fn v_draw(t: f64, eps: f64) -> f64 {
    let a = eps - t.abs();
    let b = -eps - t.abs();
    let denom = cdf(a) - cdf(b);
    let v = if denom > 0.0 { (pdf(b) - pdf(a)) / denom } else { a };
    if t < 0.0 {
        -v
    } else {
        v
    }
}

fn w_draw(t: f64, eps: f64) -> Option<f64> {
    let a = eps - t.abs();
    let b = -eps - t.abs();
    let denom = cdf(a) - cdf(b);
    if denom <= 0.0 {
        return None;
    }
    let v = v_draw(t.abs(), eps);
    Some(v * v + (a * pdf(a) - b * pdf(b)) / denom)
}

impl TrueSkill {
    pub fn new(config: TrueSkillConfig) -> Self {
        Self {
            config,
            ledger: Ledger::default(),
        }
    }

    pub fn rating(&self, strategy: &str) -> Option<&TrueSkillRating> {
        self.ledger.ratings.get(strategy)
    }

    fn get_rating(&self, strategy: &str) -> TrueSkillRating {
        self.rating(strategy).copied().unwrap_or(TrueSkillRating {
            mu: self.config.mu,
            sigma: self.config.sigma,
        })
    }

    fn draw_margin(&self) -> f64 {
        ppf((self.config.draw_probability + 1.0) / 2.0) * SQRT_2 * self.config.beta
    }

    /// Two player update. `winner` and `loser` only matter for order when
    /// `drawn` is set. `None` when the numbers degenerate.
    pub fn rate_1vs1(
        &self,
        winner: &TrueSkillRating,
        loser: &TrueSkillRating,
        drawn: bool,
    ) -> Option<(TrueSkillRating, TrueSkillRating)> {
        let tau_sq = self.config.tau * self.config.tau;
        let winner_var = winner.sigma * winner.sigma + tau_sq;
        let loser_var = loser.sigma * loser.sigma + tau_sq;

        let c_sq = 2.0 * self.config.beta * self.config.beta + winner_var + loser_var;
        let c = c_sq.sqrt();
        let t = (winner.mu - loser.mu) / c;
        let eps = self.draw_margin() / c;

        let (v, w) = if drawn {
            (v_draw(t, eps), w_draw(t, eps)?)
        } else {
            (v_win(t, eps), w_win(t, eps)?)
        };

        let update = |mu: f64, var: f64, sign: f64| -> Option<TrueSkillRating> {
            let shrink = 1.0 - var / c_sq * w;
            let rating = TrueSkillRating {
                mu: mu + sign * var / c * v,
                sigma: (var * shrink).sqrt(),
            };
            (shrink > 0.0 && rating.mu.is_finite() && rating.sigma.is_finite()).then_some(rating)
        };

        Some((update(winner.mu, winner_var, 1.0)?, update(loser.mu, loser_var, -1.0)?))
    }
}

impl RatingSystem for TrueSkill {
    fn name(&self) -> &'static str {
        "TrueSkill"
    }

    fn update_ratings(&mut self, first: &str, second: &str, outcome: Outcome) {
        let rating1 = self.get_rating(first);
        let rating2 = self.get_rating(second);

        let rated = match outcome {
            Outcome::Win => self.rate_1vs1(&rating1, &rating2, false),
            Outcome::Draw => self.rate_1vs1(&rating1, &rating2, true),
            Outcome::Loss => self.rate_1vs1(&rating2, &rating1, false).map(|(r2, r1)| (r1, r2)),
        };

        let (updated1, updated2) = rated.unwrap_or_else(|| {
            log::warn!("TrueSkill update for {} vs {} degenerated, keeping ratings", first, second);
            (rating1, rating2)
        });

        self.ledger.ratings.insert(first.to_string(), updated1);
        self.ledger.ratings.insert(second.to_string(), updated2);
        self.ledger.matchups.record(first, second, outcome);
    }

    fn ratings_table(&self) -> String {
        if self.ledger.ratings.is_empty() {
            return "No ratings available.".to_string();
        }

        let mut lines = vec![
            format!("{:<15} {:<10} {:<10}", "Strategy", "Rating", "Uncertainty"),
            "-".repeat(35),
        ];
        for (strategy, data) in sorted_by_key(&self.ledger.ratings, |r| r.exposure()) {
            lines.push(format!(
                "{:<15} {:<10} {:<10}",
                strategy,
                format!("{:.1}", data.mu),
                format!("±{:.1}", data.sigma)
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
