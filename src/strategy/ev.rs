//! Expected-value engine for cash-out and side-bet decisions.
//!
//! Scores HOLD, CASH and ARM_SIDEBET from rug forecasts, the current
//! multiplier and the bankroll. HOLD's score is its edge over cashing now;
//! CASH is the zero baseline; ARM_SIDEBET is the side wager's absolute EV.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

use crate::types::Action;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// EV model parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvConfig {
    /// Execution slippage on an instant cash-out.
    pub cash_slippage_pct: f64,
    /// Side-bet decimal payout.
    pub sidebet_payout: f64,
    /// Fee taken from side-bet winnings.
    pub sidebet_fee_pct: f64,
    /// Length of one hold interval, seconds.
    pub cash_hold_dt_s: f64,
    /// Projected multiplier growth if the round survives one interval.
    pub future_gain_multiplier_if_survive: f64,
    /// Residual value if the round rugs while holding.
    pub safety_floor_x: f64,
    pub min_probability: f64,
    pub max_probability: f64,
    /// Side-bet stake as a fraction of bankroll.
    pub default_stake_pct: f64,
    /// Upper bound on the side-bet stake fraction.
    pub max_stake_pct: f64,
    /// Side-bet EV must exceed this to be considered at all.
    pub ev_threshold: f64,
}

impl Default for EvConfig {
    fn default() -> Self {
        Self {
            cash_slippage_pct: 0.002,
            sidebet_payout: 5.0,
            sidebet_fee_pct: 0.02,
            cash_hold_dt_s: 2.0,
            future_gain_multiplier_if_survive: 1.15,
            safety_floor_x: 1.02,
            min_probability: 1e-6,
            max_probability: 0.999999,
            default_stake_pct: 0.01,
            max_stake_pct: 0.05,
            ev_threshold: 0.001,
        }
    }
}

impl EvConfig {
    /// Load from a standalone JSON file; missing or invalid files yield
    /// defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let Ok(raw) = std::fs::read_to_string(path) else {
            warn!(path = %path.display(), "EV config not found, using defaults");
            return Self::default();
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "EV config invalid, using defaults");
            Self::default()
        })
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Scored decision for one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvResult {
    pub action: Action,
    /// EV delta of each candidate relative to cashing out.
    pub evs: BTreeMap<Action, f64>,
    pub rationale: String,
    /// In [0.05, 0.95]; grows with the margin over the runner-up.
    pub confidence: f64,
}

impl EvResult {
    pub fn ev(&self, action: Action) -> Option<f64> {
        self.evs.get(&action).copied()
    }
}

/// Raw EV figures for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EvBreakdown {
    pub ev_hold: f64,
    pub ev_cash_now: f64,
    pub ev_sidebet: f64,
    pub ev_hold_vs_cash: f64,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct EvEngine {
    config: EvConfig,
}

impl EvEngine {
    pub fn new(config: EvConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EvConfig {
        &self.config
    }

    /// Clamp into `[min_probability, max_probability]`. NaN maps to the
    /// lower bound.
    pub fn clamp_probability(&self, p: f64) -> f64 {
        if p.is_nan() {
            return self.config.min_probability;
        }
        p.clamp(self.config.min_probability, self.config.max_probability)
    }

    /// EV of holding one more interval at multiplier `x`.
    pub fn ev_cash_hold(&self, p_rug_5s: f64, x: f64) -> f64 {
        let p = self.clamp_probability(p_rug_5s);
        (1.0 - p) * x * self.config.future_gain_multiplier_if_survive + p * self.config.safety_floor_x
    }

    /// Value of cashing out now, net of slippage.
    pub fn ev_cash_now(&self, x: f64) -> f64 {
        x * (1.0 - self.config.cash_slippage_pct)
    }

    /// EV of a fixed-odds wager on a rug within 10 seconds.
    pub fn ev_sidebet(&self, p_rug_10s: f64, stake: f64) -> f64 {
        let p = self.clamp_probability(p_rug_10s);
        let win = stake * (self.config.sidebet_payout - 1.0) * (1.0 - self.config.sidebet_fee_pct);
        p * win + (1.0 - p) * -stake
    }

    /// Side-bet stake for a bankroll.
    pub fn sidebet_stake(&self, bankroll: f64) -> f64 {
        let pct = self.config.default_stake_pct.min(self.config.max_stake_pct);
        (bankroll * pct).max(0.0)
    }

    /// Rank the candidate actions and pick the best.
    ///
    /// ARM_SIDEBET is only a candidate when its EV clears `ev_threshold`.
    /// Ties keep insertion order (HOLD, CASH, ARM_SIDEBET).
    pub fn best_action(&self, p5: f64, p10: f64, x: f64, bankroll: f64) -> EvResult {
        let p5 = self.clamp_probability(p5);
        let p10 = self.clamp_probability(p10);

        let ev_hold = self.ev_cash_hold(p5, x);
        let ev_cash = self.ev_cash_now(x);
        let ev_hold_vs_cash = ev_hold - ev_cash;
        let ev_sidebet = self.ev_sidebet(p10, self.sidebet_stake(bankroll));

        let mut candidates: Vec<(Action, f64)> = vec![(Action::Hold, ev_hold_vs_cash), (Action::Cash, 0.0)];
        if ev_sidebet > self.config.ev_threshold {
            candidates.push((Action::ArmSidebet, ev_sidebet));
        }
        let evs: BTreeMap<Action, f64> = candidates.iter().copied().collect();

        // Stable sort: equal EVs keep insertion order.
        candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        let (action, best_ev) = candidates[0];
        let second_ev = candidates.get(1).map(|c| c.1).unwrap_or(0.0);
        let margin = best_ev - second_ev;
        let confidence = confidence_from_margin(margin);

        let rationale = match action {
            Action::Hold if ev_hold_vs_cash > 0.0 => {
                format!("Hold: expected gain of {ev_hold_vs_cash:.4} vs cashing now (margin {margin:.4})")
            }
            Action::Hold => {
                format!("Hold: minimal loss ({ev_hold_vs_cash:.4}) vs potential upside (margin {margin:.4})")
            }
            Action::Cash => format!("Cash: secure {ev_cash:.4} now vs uncertain future (margin {margin:.4})"),
            Action::ArmSidebet => format!("Sidebet: positive EV of {ev_sidebet:.4} (margin {margin:.4})"),
        };

        debug!(
            %action,
            p5,
            p10,
            x,
            ev_hold_vs_cash,
            ev_sidebet,
            confidence,
            "EV decision"
        );

        EvResult {
            action,
            evs,
            rationale,
            confidence,
        }
    }

    /// All raw EV figures for comparison.
    pub fn all_evs(&self, p5: f64, p10: f64, x: f64, bankroll: f64) -> EvBreakdown {
        let ev_hold = self.ev_cash_hold(p5, x);
        let ev_cash_now = self.ev_cash_now(x);
        EvBreakdown {
            ev_hold,
            ev_cash_now,
            ev_sidebet: self.ev_sidebet(p10, self.sidebet_stake(bankroll)),
            ev_hold_vs_cash: ev_hold - ev_cash_now,
        }
    }
}

/// `clamp(0.5 + 10 · margin, 0.05, 0.95)`.
fn confidence_from_margin(margin: f64) -> f64 {
    let c = 0.5 + margin * 10.0;
    if c.is_nan() {
        return 0.05;
    }
    c.clamp(0.05, 0.95)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
