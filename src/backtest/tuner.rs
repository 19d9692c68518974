//! Threshold tuner.
//!
//! Sweeps the (cash, sidebet) trigger grid over replayed rounds, scores each
//! pair on return, Sharpe and drawdown, and extracts the Pareto frontier.
//! The frontier entry with the best Sharpe is published per regime.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use tracing::{debug, info, warn};

use super::metrics::{max_drawdown, ruin_proxy, sharpe_ratio};
use super::ReplayRound;
use crate::storage::thresholds::{ThresholdMetrics, ThresholdRecord, ThresholdStore};
use crate::strategy::bankroll::BankrollConfig;
use crate::strategy::ev::{EvConfig, EvEngine};
use crate::strategy::kelly::KellySizer;
use crate::strategy::ThresholdPolicy;
use crate::types::{Action, Regime, RiskError};

/// A sidebet pays if the rug lands within this many seconds of arming.
pub const SIDEBET_HORIZON_S: f64 = 10.0;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Evenly spaced 1-D threshold grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSpec {
    pub start: f64,
    pub step: f64,
    pub count: usize,
}

impl Default for GridSpec {
    fn default() -> Self {
        Self {
            start: 0.15,
            step: 0.05,
            count: 8,
        }
    }
}

impl GridSpec {
    pub fn new(start: f64, step: f64, count: usize) -> Self {
        Self { start, step, count }
    }

    /// Grid points, computed from the index to avoid accumulated drift.
    pub fn values(&self) -> Vec<f64> {
        (0..self.count).map(|i| self.start + i as f64 * self.step).collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TunerConfig {
    pub cash_grid: GridSpec,
    pub sidebet_grid: GridSpec,
    /// Starting balance of every simulated pair.
    pub initial_bankroll: f64,
    /// Units committed to each round's main position.
    pub entry_stake: f64,
    /// Confidence floor written into published records.
    pub min_confidence: f64,
    /// Sweep threads; 0 lets rayon decide.
    pub workers: usize,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            cash_grid: GridSpec::new(0.15, 0.05, 8),
            sidebet_grid: GridSpec::new(0.25, 0.05, 8),
            initial_bankroll: 1000.0,
            entry_stake: 1.0,
            min_confidence: 0.55,
            workers: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Performance of one threshold pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSweepResult {
    pub cash_threshold: f64,
    pub sidebet_threshold: f64,
    pub total_return: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub prob_ruin: f64,
    pub trades_count: usize,
    pub final_bankroll: f64,
}

impl ThresholdSweepResult {
    /// At least as good on return, Sharpe and drawdown, and strictly better
    /// on one of them.
    pub fn dominates(&self, other: &Self) -> bool {
        let no_worse = self.total_return >= other.total_return
            && self.sharpe_ratio >= other.sharpe_ratio
            && self.max_drawdown <= other.max_drawdown;
        let better = self.total_return > other.total_return
            || self.sharpe_ratio > other.sharpe_ratio
            || self.max_drawdown < other.max_drawdown;
        no_worse && better
    }
}

/// Everything one sweep produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    pub sweep_timestamp: DateTime<Utc>,
    pub regime: Regime,
    /// Rounds in the replayed dataset.
    pub rounds_used: usize,
    pub total_combinations: usize,
    pub valid_results: usize,
    pub pareto_optimal_count: usize,
    pub results: Vec<ThresholdSweepResult>,
    /// Non-dominated results, best Sharpe first.
    pub pareto_optimal: Vec<ThresholdSweepResult>,
}

impl SweepReport {
    /// Highest-Sharpe frontier entry.
    pub fn best(&self) -> Option<&ThresholdSweepResult> {
        self.pareto_optimal.first()
    }
}

/// Non-dominated subset, sorted by Sharpe descending. O(n²).
pub fn find_pareto_optimal(results: &[ThresholdSweepResult]) -> Vec<ThresholdSweepResult> {
    let mut frontier: Vec<ThresholdSweepResult> = results
        .iter()
        .filter(|r| !results.iter().any(|other| other.dominates(r)))
        .cloned()
        .collect();
    frontier.sort_by(|a, b| b.sharpe_ratio.partial_cmp(&a.sharpe_ratio).unwrap_or(Ordering::Equal));
    frontier
}

// ---------------------------------------------------------------------------
// Tuner
// ---------------------------------------------------------------------------

pub struct ThresholdTuner {
    config: TunerConfig,
    ev: EvEngine,
    sizer: KellySizer,
}

impl ThresholdTuner {
    pub fn new(config: TunerConfig, ev: EvConfig, bankroll: BankrollConfig) -> Self {
        Self {
            config,
            ev: EvEngine::new(ev),
            sizer: KellySizer::new(bankroll.kelly_fraction, bankroll.bet_size_cap),
        }
    }

    pub fn config(&self) -> &TunerConfig {
        &self.config
    }

    /// Replay every round under one threshold pair. `None` if no trade settled.
    pub fn simulate_with_thresholds(
        &self,
        rounds: &[ReplayRound],
        cash_threshold: f64,
        sidebet_threshold: f64,
    ) -> Option<ThresholdSweepResult> {
        let policy = ThresholdPolicy::new(cash_threshold, sidebet_threshold);
        let ev_cfg = self.ev.config();
        let entry = self.config.entry_stake;

        let initial = self.config.initial_bankroll;
        let mut balance = initial;
        let mut profits: Vec<f64> = Vec::new();
        let mut equity: Vec<f64> = vec![initial];

        let mut settle = |balance: &mut f64, profit: f64| {
            *balance += profit;
            profits.push(profit);
            equity.push(*balance);
        };

        for round in rounds {
            let mut cashed = false;
            // (stake, arming time)
            let mut sidebet: Option<(f64, f64)> = None;

            for tick in &round.ticks {
                let ev = self.ev.best_action(tick.p_rug_5s, tick.p_rug_10s, tick.x, balance);
                match policy.choose(tick.p_rug_5s, tick.p_rug_10s, &ev) {
                    Action::Cash => {
                        let profit = tick.x * (1.0 - ev_cfg.cash_slippage_pct) - entry;
                        settle(&mut balance, profit);
                        cashed = true;
                        break;
                    }
                    Action::ArmSidebet if sidebet.is_none() => {
                        let stake = balance * self.sizer.size_bet(tick.p_rug_10s, ev_cfg.sidebet_payout);
                        if stake > 0.0 {
                            sidebet = Some((stake, tick.t));
                        }
                    }
                    _ => {}
                }
            }

            if round.rug_time_s.is_none() {
                continue;
            }
            if !cashed {
                settle(&mut balance, -entry);
            }
            if let Some((stake, armed_at)) = sidebet {
                let profit = if round.rugs_within(armed_at, SIDEBET_HORIZON_S) {
                    stake * (ev_cfg.sidebet_payout - 1.0) * (1.0 - ev_cfg.sidebet_fee_pct)
                } else {
                    -stake
                };
                settle(&mut balance, profit);
            }
        }

        if profits.is_empty() {
            return None;
        }

        let max_dd = max_drawdown(&equity);
        Some(ThresholdSweepResult {
            cash_threshold,
            sidebet_threshold,
            total_return: if initial > 0.0 { (balance - initial) / initial } else { 0.0 },
            sharpe_ratio: sharpe_ratio(&profits),
            max_drawdown: max_dd,
            prob_ruin: ruin_proxy(max_dd),
            trades_count: profits.len(),
            final_bankroll: balance,
        })
    }

    /// Evaluate the full grid in parallel. Results keep grid order.
    pub fn run_sweep(&self, rounds: &[ReplayRound], regime: Regime) -> Result<SweepReport> {
        let pairs: Vec<(f64, f64)> = self
            .config
            .cash_grid
            .values()
            .into_iter()
            .flat_map(|c| self.config.sidebet_grid.values().into_iter().map(move |s| (c, s)))
            .collect();
        let total = pairs.len();

        info!(
            regime = %regime,
            rounds = rounds.len(),
            combinations = total,
            workers = self.config.workers,
            "Starting threshold sweep"
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers)
            .build()
            .context("Failed to create rayon thread pool")?;

        let completed = AtomicUsize::new(0);
        let outcomes: Vec<Option<ThresholdSweepResult>> = pool.install(|| {
            pairs
                .par_iter()
                .map(|&(cash, sidebet)| {
                    let result = self.simulate_with_thresholds(rounds, cash, sidebet);
                    let done = completed.fetch_add(1, AtomicOrdering::Relaxed) + 1;
                    debug!(
                        done,
                        total,
                        cash,
                        sidebet,
                        trades = ?result.as_ref().map(|r| r.trades_count),
                        "Pair simulated"
                    );
                    result
                })
                .collect()
        });

        let results: Vec<ThresholdSweepResult> = outcomes.into_iter().flatten().collect();
        let pareto_optimal = find_pareto_optimal(&results);

        if results.is_empty() {
            warn!(regime = %regime, rounds = rounds.len(), "Sweep produced no results");
        } else {
            info!(
                valid = results.len(),
                frontier = pareto_optimal.len(),
                "Threshold sweep complete"
            );
        }

        Ok(SweepReport {
            sweep_timestamp: Utc::now(),
            regime,
            rounds_used: rounds.len(),
            total_combinations: total,
            valid_results: results.len(),
            pareto_optimal_count: pareto_optimal.len(),
            results,
            pareto_optimal,
        })
    }

    /// Record for the best frontier entry. Refuses an empty frontier.
    pub fn recommend(&self, report: &SweepReport) -> Result<ThresholdRecord, RiskError> {
        let best = report.best().ok_or(RiskError::NoFrontier)?;
        Ok(ThresholdRecord::new(
            report.regime,
            best.cash_threshold,
            best.sidebet_threshold,
            self.config.min_confidence,
            report.rounds_used,
            ThresholdMetrics::new(best.total_return, best.sharpe_ratio, best.max_drawdown, best.prob_ruin),
        ))
    }

    /// Save the sweep report and publish the recommendation under the
    /// report's regime. The report is saved even when nothing is published.
    pub fn publish(&self, store: &ThresholdStore, report: &SweepReport) -> Result<ThresholdRecord> {
        store.save_sweep_report(report)?;
        let record = match self.recommend(report) {
            Ok(record) => record,
            Err(e) => {
                warn!(regime = %report.regime, "No Pareto-optimal thresholds, nothing published");
                return Err(e.into());
            }
        };
        store.publish(&record)?;
        Ok(record)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
