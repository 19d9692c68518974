//! Strategy comparison.
//!
//! Replays completed rounds through a fresh in-memory bankroll per strategy
//! and reports return, win rate, drawdown, Sharpe and volatility, so the
//! model-guided policy can be judged against a plain hold-to-target rule
//! and a seeded random baseline.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::info;

use super::metrics::{max_drawdown, period_returns, sharpe_ratio, total_return, volatility};
use super::tuner::SIDEBET_HORIZON_S;
use super::ReplayRound;
use crate::storage::MemoryStore;
use crate::strategy::bankroll::{BankrollConfig, BankrollManager};
use crate::strategy::ev::{EvConfig, EvEngine};
use crate::strategy::ThresholdPolicy;
use crate::types::Action;

/// Fraction of balance committed to each round's main position.
pub const POSITION_PCT: f64 = 0.10;

/// Target multiplier of the fallback hold in the model-guided strategy.
pub const MODEL_HOLD_TARGET: f64 = 2.0;

/// Range the random baseline draws its cash-out target from.
pub const RANDOM_TARGET_MIN: f64 = 1.5;
pub const RANDOM_TARGET_MAX: f64 = 3.0;

/// Seed used by `run_all` unless overridden.
pub const DEFAULT_SEED: u64 = 42;

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct StrategyReport {
    pub strategy_name: String,
    pub initial_balance: f64,
    pub final_balance: f64,
    pub total_return_pct: f64,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate_pct: f64,
    pub volatility_pct: f64,
    pub max_drawdown_pct: f64,
    pub sharpe_ratio: f64,
    /// Balance after every replayed round, starting balance first.
    pub equity_curve: Vec<f64>,
}

impl StrategyReport {
    fn from_replay(name: &str, bm: &BankrollManager, equity_curve: Vec<f64>) -> Self {
        let state = bm.state();
        let returns = period_returns(&equity_curve);
        let trades = state.total_bets as usize;
        Self {
            strategy_name: name.to_string(),
            initial_balance: equity_curve.first().copied().unwrap_or(state.initial_balance),
            final_balance: state.balance,
            total_return_pct: total_return(&equity_curve) * 100.0,
            total_trades: trades,
            winning_trades: state.wins as usize,
            losing_trades: state.losses as usize,
            win_rate_pct: if trades > 0 { state.wins as f64 / trades as f64 * 100.0 } else { 0.0 },
            volatility_pct: volatility(&returns) * 100.0,
            max_drawdown_pct: max_drawdown(&equity_curve) * 100.0,
            sharpe_ratio: sharpe_ratio(&returns),
            equity_curve,
        }
    }
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

pub struct StrategySimulator {
    bankroll: BankrollConfig,
    ev: EvEngine,
    seed: u64,
}

impl StrategySimulator {
    pub fn new(bankroll: BankrollConfig, ev: EvConfig) -> Self {
        Self {
            bankroll,
            ev: EvEngine::new(ev),
            seed: DEFAULT_SEED,
        }
    }

    /// Seed for the random baselines in `run_all`.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn open_bankroll(&self) -> BankrollManager {
        BankrollManager::open(self.bankroll, Box::new(MemoryStore::new()))
    }

    /// Hold every round to `target`; win if the round rugged at or above it.
    pub fn simulate_naive(&self, rounds: &[ReplayRound], target: f64) -> StrategyReport {
        let mut bm = self.open_bankroll();
        let mut equity = vec![bm.balance()];

        for round in rounds {
            let Some(rug_x) = round.rug_x else {
                continue;
            };
            let bet = bm.balance() * POSITION_PCT;
            let profit = if rug_x >= target { bet * (target - 1.0) } else { -bet };
            bm.update_balance(bet, profit);
            equity.push(bm.balance());
        }

        StrategyReport::from_replay(&format!("naive_{target}x"), &bm, equity)
    }

    /// Enter a round with probability `bet_probability` and hold to a target
    /// drawn uniformly from 1.5x to 3x. Skipped rounds still add a point to
    /// the equity curve.
    pub fn simulate_random<R: Rng>(
        &self,
        rounds: &[ReplayRound],
        bet_probability: f64,
        rng: &mut R,
    ) -> StrategyReport {
        let mut bm = self.open_bankroll();
        let mut equity = vec![bm.balance()];

        for round in rounds {
            let Some(rug_x) = round.rug_x else {
                continue;
            };
            if rng.gen::<f64>() < bet_probability {
                let bet = bm.balance() * POSITION_PCT;
                let target = rng.gen_range(RANDOM_TARGET_MIN..RANDOM_TARGET_MAX);
                let profit = if rug_x >= target { bet * (target - 1.0) } else { -bet };
                bm.update_balance(bet, profit);
            }
            equity.push(bm.balance());
        }

        let name = format!("random_{:.0}pct", bet_probability * 100.0);
        StrategyReport::from_replay(&name, &bm, equity)
    }

    /// Cash out when the policy says so, otherwise hold to 2x or the rug.
    /// Sidebets armed on the way settle against the rug time.
    pub fn simulate_model_guided(
        &self,
        rounds: &[ReplayRound],
        name: &str,
        policy: ThresholdPolicy,
    ) -> StrategyReport {
        let mut bm = self.open_bankroll();
        let mut equity = vec![bm.balance()];
        let cfg = self.ev.config();

        for round in rounds {
            let Some(rug_x) = round.rug_x else {
                continue;
            };
            let bet = bm.balance() * POSITION_PCT;
            let mut cashed_at: Option<f64> = None;
            let mut sidebet: Option<(f64, f64)> = None;

            for tick in &round.ticks {
                let ev = self.ev.best_action(tick.p_rug_5s, tick.p_rug_10s, tick.x, bm.balance());
                match policy.choose(tick.p_rug_5s, tick.p_rug_10s, &ev) {
                    Action::Cash => {
                        cashed_at = Some(tick.x);
                        break;
                    }
                    Action::ArmSidebet if sidebet.is_none() && bm.apply_daily_loss_cap() => {
                        let stake = bm.calculate_bet_amount(tick.p_rug_10s, cfg.sidebet_payout);
                        if stake > 0.0 {
                            sidebet = Some((stake, tick.t));
                        }
                    }
                    _ => {}
                }
            }

            let profit = match cashed_at {
                Some(x) => bet * (x * (1.0 - cfg.cash_slippage_pct) - 1.0),
                None if rug_x >= MODEL_HOLD_TARGET => bet * (MODEL_HOLD_TARGET - 1.0),
                None => -bet,
            };
            bm.update_balance(bet, profit);

            if let Some((stake, armed_at)) = sidebet {
                let result = if round.rugs_within(armed_at, SIDEBET_HORIZON_S) {
                    stake * (cfg.sidebet_payout - 1.0) * (1.0 - cfg.sidebet_fee_pct)
                } else {
                    -stake
                };
                bm.update_balance(stake, result);
            }
            equity.push(bm.balance());
        }

        StrategyReport::from_replay(name, &bm, equity)
    }

    /// Standard comparison set, best total return first.
    pub fn run_all(&self, rounds: &[ReplayRound]) -> Vec<StrategyReport> {
        let mut reports = vec![
            self.simulate_naive(rounds, 2.0),
            self.simulate_naive(rounds, 1.5),
            self.simulate_model_guided(rounds, "model_conservative", ThresholdPolicy::new(0.25, 0.35)),
            self.simulate_model_guided(rounds, "model_aggressive", ThresholdPolicy::new(0.35, 0.45)),
            self.simulate_random(rounds, 0.5, &mut StdRng::seed_from_u64(self.seed)),
            self.simulate_random(rounds, 0.25, &mut StdRng::seed_from_u64(self.seed)),
        ];
        reports.sort_by(|a, b| {
            b.total_return_pct
                .partial_cmp(&a.total_return_pct)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        for r in &reports {
            info!(
                strategy = %r.strategy_name,
                total_return = format!("{:.1}%", r.total_return_pct),
                final_balance = format!("${:.0}", r.final_balance),
                win_rate = format!("{:.1}%", r.win_rate_pct),
                trades = r.total_trades,
                max_drawdown = format!("{:.1}%", r.max_drawdown_pct),
                sharpe = format!("{:.2}", r.sharpe_ratio),
                "Strategy result"
            );
        }
        reports
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
