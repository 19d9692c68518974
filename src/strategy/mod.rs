//! Strategy engine — EV scoring, Kelly sizing, bankroll limits and regime
//! detection, combined into one live decision per forecast tick.

pub mod bankroll;
pub mod ev;
pub mod kelly;
pub mod regime;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::data::forecast::{RugForecaster, TickForecast};
use crate::data::TickFeatures;
use crate::storage::thresholds::ThresholdRecord;
use crate::types::{Action, ForecastTick, Regime};
use bankroll::BankrollManager;
use ev::{EvBreakdown, EvEngine, EvResult};

// ---------------------------------------------------------------------------
// Threshold policy
// ---------------------------------------------------------------------------

/// Probability triggers for CASH and ARM_SIDEBET.
///
/// CASH fires on the 5s probability alone. ARM_SIDEBET needs the 10s
/// probability over its trigger *and* the EV engine ranking the sidebet
/// first. Anything else is HOLD.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdPolicy {
    pub cash_threshold: f64,
    pub sidebet_threshold: f64,
}

impl ThresholdPolicy {
    pub fn new(cash_threshold: f64, sidebet_threshold: f64) -> Self {
        Self {
            cash_threshold,
            sidebet_threshold,
        }
    }

    pub fn from_record(record: &ThresholdRecord) -> Self {
        Self::new(record.cash_threshold(), record.sidebet_threshold())
    }

    pub fn choose(&self, p_rug_5s: f64, p_rug_10s: f64, ev: &EvResult) -> Action {
        if p_rug_5s > self.cash_threshold {
            Action::Cash
        } else if p_rug_10s > self.sidebet_threshold && ev.action == Action::ArmSidebet {
            Action::ArmSidebet
        } else {
            Action::Hold
        }
    }
}

// ---------------------------------------------------------------------------
// Live decisions
// ---------------------------------------------------------------------------

/// Outcome of one decision point.
#[derive(Debug, Clone, Serialize)]
pub struct Decision {
    pub action: Action,
    pub regime: Regime,
    pub x: f64,
    pub p_rug_5s: f64,
    pub p_rug_10s: f64,
    /// Kelly-sized sidebet stake in currency; zero unless arming.
    pub sidebet_stake: f64,
    /// Confidence cleared the record's `min_confidence`.
    pub actionable: bool,
    /// A sidebet was downgraded to HOLD by the daily-loss breaker.
    pub risk_blocked: bool,
    pub ev: EvResult,
    pub breakdown: EvBreakdown,
}

/// Turns a forecast tick into an action under the active thresholds and
/// the bankroll's limits. Always produces a decision.
#[derive(Debug, Clone, Default)]
pub struct DecisionEngine {
    ev: EvEngine,
}

impl DecisionEngine {
    pub fn new(ev: EvEngine) -> Self {
        Self { ev }
    }

    pub fn ev_engine(&self) -> &EvEngine {
        &self.ev
    }

    /// Decide for a single tick. Missing forecasts fall back to the floor
    /// heuristic, which leans to HOLD.
    pub fn decide(
        &self,
        tick: &ForecastTick,
        thresholds: &ThresholdRecord,
        bankroll: &BankrollManager,
    ) -> Decision {
        let features = TickFeatures::at(tick);
        let probs = TickForecast.forecast(tick, &features);
        if tick.p_rug_5s.is_none() || tick.p_rug_10s.is_none() {
            warn!(x = tick.x, t = tick.t, "Tick has no forecast, using heuristic fallback");
        }
        let (p5, p10) = (probs.p_rug_5s, probs.p_rug_10s);

        let balance = bankroll.balance();
        let ev = self.ev.best_action(p5, p10, tick.x, balance);
        let policy = ThresholdPolicy::from_record(thresholds);
        let mut action = policy.choose(p5, p10, &ev);

        let mut risk_blocked = false;
        if action == Action::ArmSidebet && !bankroll.apply_daily_loss_cap() {
            warn!(
                daily_loss = format!("${:.2}", bankroll.daily_loss()),
                balance = format!("${:.2}", balance),
                "Daily loss cap reached, sidebet downgraded to HOLD"
            );
            action = Action::Hold;
            risk_blocked = true;
        }

        let sidebet_stake = if action == Action::ArmSidebet {
            bankroll.calculate_bet_amount(p10, self.ev.config().sidebet_payout)
        } else {
            0.0
        };
        let actionable = ev.confidence >= thresholds.confidence_floor();

        if action == Action::Hold {
            debug!(regime = %thresholds.regime, p5, p10, x = tick.x, "Decision: HOLD");
        } else {
            info!(
                %action,
                regime = %thresholds.regime,
                x = tick.x,
                p5 = format!("{:.3}", p5),
                p10 = format!("{:.3}", p10),
                stake = format!("${:.2}", sidebet_stake),
                confidence = format!("{:.0}%", ev.confidence * 100.0),
                actionable,
                "Decision"
            );
        }

        Decision {
            action,
            regime: thresholds.regime,
            x: tick.x,
            p_rug_5s: p5,
            p_rug_10s: p10,
            sidebet_stake,
            actionable,
            risk_blocked,
            breakdown: self.ev.all_evs(p5, p10, tick.x, balance),
            ev,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
