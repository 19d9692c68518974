//! Bankroll manager.
//!
//! Single source of truth for available funds and risk limits: Kelly bet
//! sizing, the daily-loss circuit breaker, win/loss tallies and running
//! balance extrema. State is persisted through a [`BankrollStore`] after
//! every mutation.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

use super::kelly::KellySizer;
use crate::storage::BankrollStore;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Bankroll limits.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct BankrollConfig {
    /// Balance used when no persisted state exists.
    pub initial_balance: f64,
    /// Fractional Kelly multiplier (0.5 = half-Kelly).
    pub kelly_fraction: f64,
    /// Daily loss limit as a fraction of current balance.
    pub max_daily_loss_pct: f64,
    /// Maximum bet as a fraction of current balance.
    pub bet_size_cap: f64,
}

impl Default for BankrollConfig {
    fn default() -> Self {
        Self {
            initial_balance: 1000.0,
            kelly_fraction: 0.5,
            max_daily_loss_pct: 0.20,
            bet_size_cap: 0.05,
        }
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Persisted money state for one bankroll identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankrollState {
    pub balance: f64,
    /// Anchor for cumulative ROI; re-set by `reset_bankroll`.
    pub initial_balance: f64,
    pub daily_loss: f64,
    pub last_reset_date: NaiveDate,
    pub total_bets: u64,
    pub wins: u64,
    pub losses: u64,
    pub total_profit: f64,
    pub max_balance: f64,
    pub min_balance: f64,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl BankrollState {
    pub fn new(balance: f64, today: NaiveDate) -> Self {
        let now = Utc::now();
        Self {
            balance,
            initial_balance: balance,
            daily_loss: 0.0,
            last_reset_date: today,
            total_bets: 0,
            wins: 0,
            losses: 0,
            total_profit: 0.0,
            max_balance: balance,
            min_balance: balance,
            created_at: now,
            last_updated: now,
        }
    }
}

/// Result of applying one bet outcome.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BalanceUpdate {
    pub old_balance: f64,
    pub new_balance: f64,
    pub profit: f64,
    /// Per-bet return on the pre-bet balance, percent.
    pub roi: f64,
    /// Return since the bankroll's inception, percent.
    pub total_roi: f64,
    /// Running win rate, percent.
    pub win_rate: f64,
}

/// Read-only reporting snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BankrollStatus {
    pub balance: f64,
    pub initial_balance: f64,
    pub total_roi: f64,
    pub daily_loss: f64,
    pub daily_loss_pct: f64,
    pub max_daily_loss_pct: f64,
    pub can_bet: bool,
    pub total_bets: u64,
    pub wins: u64,
    pub losses: u64,
    pub win_rate: f64,
    pub max_balance: f64,
    pub min_balance: f64,
    /// Drawdown from peak balance, percent.
    pub max_drawdown: f64,
}

impl fmt::Display for BankrollStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "balance=${:.2} | ROI={:.1}% | bets={} (W{}/L{}) | win_rate={:.1}% | daily_loss=${:.2} ({:.1}%) | drawdown={:.1}% | {}",
            self.balance,
            self.total_roi,
            self.total_bets,
            self.wins,
            self.losses,
            self.win_rate,
            self.daily_loss,
            self.daily_loss_pct,
            self.max_drawdown,
            if self.can_bet { "CAN_BET" } else { "HALTED" },
        )
    }
}

/// Source of "today" for daily rollover.
pub type Clock = fn() -> NaiveDate;

fn utc_today() -> NaiveDate {
    Utc::now().date_naive()
}

/// `numerator / denominator`, or 0 when the denominator is not positive.
fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// Owns one bankroll's state and its store. `update_balance` is the only
/// mutator of the money state; everything else is a projection.
pub struct BankrollManager {
    config: BankrollConfig,
    sizer: KellySizer,
    store: Box<dyn BankrollStore>,
    state: BankrollState,
    clock: Clock,
}

impl BankrollManager {
    /// Open a bankroll, loading persisted state or creating a fresh one.
    pub fn open(config: BankrollConfig, store: Box<dyn BankrollStore>) -> Self {
        Self::open_with_clock(config, store, utc_today)
    }

    /// Open with an explicit clock (tests and replays).
    pub fn open_with_clock(config: BankrollConfig, store: Box<dyn BankrollStore>, clock: Clock) -> Self {
        let today = clock();
        let state = match store.load() {
            Ok(Some(mut s)) => {
                if s.last_reset_date != today {
                    info!(last = %s.last_reset_date, today = %today, "New day, daily loss reset");
                    s.daily_loss = 0.0;
                    s.last_reset_date = today;
                }
                s
            }
            Ok(None) => {
                info!(balance = config.initial_balance, "Fresh bankroll");
                BankrollState::new(config.initial_balance, today)
            }
            Err(e) => {
                warn!(error = %format!("{e:#}"), "Could not load bankroll state, starting fresh");
                BankrollState::new(config.initial_balance, today)
            }
        };

        Self {
            sizer: KellySizer::new(config.kelly_fraction, config.bet_size_cap),
            config,
            store,
            state,
            clock,
        }
    }

    pub fn config(&self) -> &BankrollConfig {
        &self.config
    }

    pub fn state(&self) -> &BankrollState {
        &self.state
    }

    pub fn balance(&self) -> f64 {
        self.state.balance
    }

    /// Daily loss as of today; a stale day counts as zero until the next
    /// mutation writes the reset.
    pub fn daily_loss(&self) -> f64 {
        if self.state.last_reset_date == (self.clock)() {
            self.state.daily_loss
        } else {
            0.0
        }
    }

    /// Recommended bet as a fraction of balance (capped fractional Kelly).
    pub fn size_bet(&self, edge: f64, odds: f64) -> f64 {
        self.sizer.size_bet(edge, odds)
    }

    /// Recommended bet in currency units.
    pub fn calculate_bet_amount(&self, edge: f64, odds: f64) -> f64 {
        self.size_bet(edge, odds) * self.state.balance
    }

    /// Apply a settled bet. `result` is the signed profit or loss.
    pub fn update_balance(&mut self, bet_amount: f64, result: f64) -> BalanceUpdate {
        self.roll_day();

        let old_balance = self.state.balance;
        let new_balance = old_balance + result;

        let s = &mut self.state;
        s.balance = new_balance;
        s.total_bets += 1;
        s.total_profit += result;
        if result > 0.0 {
            s.wins += 1;
        } else {
            s.losses += 1;
            s.daily_loss += result.abs();
        }
        s.max_balance = s.max_balance.max(new_balance);
        s.min_balance = s.min_balance.min(new_balance);

        let update = BalanceUpdate {
            old_balance,
            new_balance,
            profit: result,
            roi: ratio(result, old_balance) * 100.0,
            total_roi: ratio(new_balance - s.initial_balance, s.initial_balance) * 100.0,
            win_rate: ratio(s.wins as f64, s.total_bets as f64) * 100.0,
        };

        debug!(
            bet = format!("${:.2}", bet_amount),
            profit = format!("${:.2}", result),
            balance = format!("${:.2}", new_balance),
            win_rate = format!("{:.1}%", update.win_rate),
            "Bankroll updated"
        );

        self.persist();
        update
    }

    /// True while new risk may be taken: balance is positive and today's
    /// loss is below the configured fraction of balance.
    pub fn apply_daily_loss_cap(&self) -> bool {
        if self.state.balance <= 0.0 {
            return false;
        }
        self.daily_loss() / self.state.balance < self.config.max_daily_loss_pct
    }

    /// Reporting snapshot.
    pub fn get_status(&self) -> BankrollStatus {
        let s = &self.state;
        let daily_loss = self.daily_loss();
        BankrollStatus {
            balance: s.balance,
            initial_balance: s.initial_balance,
            total_roi: ratio(s.balance - s.initial_balance, s.initial_balance) * 100.0,
            daily_loss,
            daily_loss_pct: ratio(daily_loss, s.balance) * 100.0,
            max_daily_loss_pct: self.config.max_daily_loss_pct * 100.0,
            can_bet: self.apply_daily_loss_cap(),
            total_bets: s.total_bets,
            wins: s.wins,
            losses: s.losses,
            win_rate: ratio(s.wins as f64, s.total_bets as f64) * 100.0,
            max_balance: s.max_balance,
            min_balance: s.min_balance,
            max_drawdown: ratio(s.max_balance - s.balance, s.max_balance) * 100.0,
        }
    }

    /// Zero today's loss counter.
    pub fn reset_daily_tracking(&mut self) {
        self.state.daily_loss = 0.0;
        self.state.last_reset_date = (self.clock)();
        info!("Daily loss tracking reset");
        self.persist();
    }

    /// Operator reset: wipe history and re-anchor at `new_balance`
    /// (or the configured initial balance).
    pub fn reset_bankroll(&mut self, new_balance: Option<f64>) {
        let balance = new_balance.unwrap_or(self.config.initial_balance);
        self.state = BankrollState::new(balance, (self.clock)());
        warn!(balance, "Bankroll reset");
        self.persist();
    }

    fn roll_day(&mut self) {
        let today = (self.clock)();
        if self.state.last_reset_date != today {
            self.state.daily_loss = 0.0;
            self.state.last_reset_date = today;
        }
    }

    /// Save state; a failure is logged and the in-memory state kept.
    fn persist(&mut self) {
        self.state.last_updated = Utc::now();
        if let Err(e) = self.store.save(&self.state) {
            warn!(error = %format!("{e:#}"), "Could not save bankroll state");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{JsonFileStore, MemoryStore, MockBankrollStore};

    fn day_one() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
    }

    fn day_two() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 15).unwrap()
    }

    fn manager(balance: f64) -> BankrollManager {
        BankrollManager::open_with_clock(
            BankrollConfig {
                initial_balance: balance,
                ..BankrollConfig::default()
            },
            Box::new(MemoryStore::new()),
            day_one,
        )
    }

    fn assert_invariants(bm: &BankrollManager) {
        let s = bm.state();
        assert_eq!(s.wins + s.losses, s.total_bets);
        assert!(s.min_balance <= s.balance && s.balance <= s.max_balance);
    }

    #[test]
    fn test_fresh_state_from_config() {
        let bm = manager(500.0);
        assert_eq!(bm.balance(), 500.0);
        assert_eq!(bm.state().max_balance, 500.0);
        assert_eq!(bm.state().min_balance, 500.0);
        assert_eq!(bm.state().total_bets, 0);
    }

    #[test]
    fn test_bet_amount_scales_with_balance() {
        let bm = manager(1000.0);
        // p=0.6 at even money: raw 0.2, half 0.1, capped at 0.05
        assert!((bm.size_bet(0.6, 2.0) - 0.05).abs() < 1e-12);
        assert!((bm.calculate_bet_amount(0.6, 2.0) - 50.0).abs() < 1e-9);
        assert_eq!(bm.calculate_bet_amount(0.0, 2.0), 0.0);
    }

    #[test]
    fn test_update_balance_win() {
        let mut bm = manager(1000.0);
        let u = bm.update_balance(50.0, 50.0);
        assert_eq!(u.old_balance, 1000.0);
        assert_eq!(u.new_balance, 1050.0);
        assert!((u.roi - 5.0).abs() < 1e-12);
        assert!((u.total_roi - 5.0).abs() < 1e-12);
        assert_eq!(u.win_rate, 100.0);
        assert_eq!(bm.state().wins, 1);
        assert_eq!(bm.daily_loss(), 0.0);
        assert_eq!(bm.state().max_balance, 1050.0);
    }

    #[test]
    fn test_update_balance_loss_accumulates_daily_loss() {
        let mut bm = manager(1000.0);
        bm.update_balance(30.0, -30.0);
        bm.update_balance(20.0, -20.0);
        assert_eq!(bm.state().losses, 2);
        assert!((bm.daily_loss() - 50.0).abs() < 1e-12);
        assert_eq!(bm.state().min_balance, 950.0);
    }

    #[test]
    fn test_zero_result_counts_as_loss() {
        let mut bm = manager(100.0);
        bm.update_balance(10.0, 0.0);
        assert_eq!(bm.state().losses, 1);
        assert_eq!(bm.state().wins, 0);
    }

    #[test]
    fn test_invariants_over_sequence() {
        let mut bm = manager(100.0);
        let results: [f64; 9] = [5.0, -12.0, 0.0, 40.0, -200.0, 3.5, -0.25, 80.0, -1.0];
        for r in results {
            bm.update_balance(r.abs(), r);
            assert_invariants(&bm);
        }
        assert_eq!(bm.state().total_bets, results.len() as u64);
    }

    #[test]
    fn test_roi_zero_when_old_balance_zero() {
        let mut bm = manager(0.0);
        let u = bm.update_balance(0.0, 10.0);
        assert_eq!(u.roi, 0.0);
        assert_eq!(u.total_roi, 0.0);
        assert!(u.roi.is_finite());
    }

    #[test]
    fn test_daily_loss_cap() {
        let mut bm = manager(100.0);
        assert!(bm.apply_daily_loss_cap());
        // 15 lost on 85 remaining = 17.6% < 20%
        bm.update_balance(15.0, -15.0);
        assert!(bm.apply_daily_loss_cap());
        // 20 lost on 80 remaining = 25% ≥ 20%
        bm.update_balance(5.0, -5.0);
        assert!(!bm.apply_daily_loss_cap());
        assert!(!bm.get_status().can_bet);

        bm.reset_daily_tracking();
        assert!(bm.apply_daily_loss_cap());
    }

    #[test]
    fn test_daily_loss_cap_non_positive_balance() {
        let mut bm = manager(10.0);
        bm.update_balance(20.0, -20.0);
        assert!(bm.balance() < 0.0);
        assert!(!bm.apply_daily_loss_cap());
        let status = bm.get_status();
        assert_eq!(status.daily_loss_pct, 0.0);
        assert!(status.daily_loss_pct.is_finite());
    }

    #[test]
    fn test_status_drawdown_from_peak() {
        let mut bm = manager(100.0);
        bm.update_balance(100.0, 100.0);
        bm.update_balance(50.0, -50.0);
        let status = bm.get_status();
        assert!((status.max_drawdown - 25.0).abs() < 1e-12);
        assert!((status.total_roi - 50.0).abs() < 1e-12);
        assert!((status.win_rate - 50.0).abs() < 1e-12);
    }

    #[test]
    fn test_reset_bankroll() {
        let mut bm = manager(100.0);
        bm.update_balance(10.0, -10.0);
        bm.update_balance(10.0, 30.0);
        bm.reset_bankroll(Some(400.0));
        let s = bm.state();
        assert_eq!(s.balance, 400.0);
        assert_eq!(s.initial_balance, 400.0);
        assert_eq!(s.max_balance, 400.0);
        assert_eq!(s.min_balance, 400.0);
        assert_eq!(s.total_bets, 0);
        assert_eq!(s.daily_loss, 0.0);

        bm.reset_bankroll(None);
        assert_eq!(bm.balance(), 100.0);
    }

    #[test]
    fn test_day_rollover_on_load() {
        let mut stale = BankrollState::new(100.0, day_one());
        stale.daily_loss = 40.0;
        let bm = BankrollManager::open_with_clock(
            BankrollConfig::default(),
            Box::new(MemoryStore::with_state(stale)),
            day_two,
        );
        assert_eq!(bm.state().daily_loss, 0.0);
        assert_eq!(bm.state().last_reset_date, day_two());
        assert_eq!(bm.balance(), 100.0);
    }

    #[test]
    fn test_persist_and_reload_same_day_is_identical() {
        let mut p = std::env::temp_dir();
        p.push(format!("rugs_bm_{}.json", uuid::Uuid::new_v4()));

        let mut bm = BankrollManager::open_with_clock(
            BankrollConfig::default(),
            Box::new(JsonFileStore::new(&p)),
            day_one,
        );
        bm.update_balance(33.3, -33.3);
        bm.update_balance(10.0, 1.0 / 3.0);
        bm.update_balance(7.0, -0.1);
        let before = bm.state().clone();

        let reloaded = BankrollManager::open_with_clock(
            BankrollConfig::default(),
            Box::new(JsonFileStore::new(&p)),
            day_one,
        );
        let after = reloaded.state();
        assert_eq!(after.balance.to_bits(), before.balance.to_bits());
        assert_eq!(after.daily_loss.to_bits(), before.daily_loss.to_bits());
        assert_eq!(after.total_bets, before.total_bets);
        assert_eq!(after.wins, before.wins);
        assert_eq!(after.losses, before.losses);

        JsonFileStore::new(&p).delete().unwrap();
    }

    #[test]
    fn test_load_failure_creates_fresh_state() {
        let mut store = MockBankrollStore::new();
        store
            .expect_load()
            .returning(|| Err(anyhow::anyhow!("corrupt record")));
        store.expect_save().returning(|_| Ok(()));

        let bm = BankrollManager::open_with_clock(
            BankrollConfig {
                initial_balance: 321.0,
                ..BankrollConfig::default()
            },
            Box::new(store),
            day_one,
        );
        assert_eq!(bm.balance(), 321.0);
    }

    #[test]
    fn test_save_failure_keeps_in_memory_state() {
        let mut store = MockBankrollStore::new();
        store.expect_load().returning(|| Ok(None));
        store
            .expect_save()
            .times(2)
            .returning(|_| Err(anyhow::anyhow!("disk full")));

        let mut bm = BankrollManager::open_with_clock(BankrollConfig::default(), Box::new(store), day_one);
        bm.update_balance(10.0, 25.0);
        bm.update_balance(10.0, -5.0);
        assert_eq!(bm.balance(), 1020.0);
        assert_eq!(bm.state().total_bets, 2);
    }

    #[test]
    fn test_every_update_is_persisted() {
        let mut store = MockBankrollStore::new();
        store.expect_load().returning(|| Ok(None));
        store
            .expect_save()
            .withf(|s: &BankrollState| s.wins + s.losses == s.total_bets)
            .times(3)
            .returning(|_| Ok(()));

        let mut bm = BankrollManager::open_with_clock(BankrollConfig::default(), Box::new(store), day_one);
        bm.update_balance(1.0, 1.0);
        bm.update_balance(1.0, -1.0);
        bm.update_balance(1.0, 2.0);
    }
}
