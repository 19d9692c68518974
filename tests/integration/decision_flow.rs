//! Live decisions against published thresholds and a persisted bankroll.

use rugs_risk::storage::thresholds::{ThresholdRecord, ThresholdStore};
use rugs_risk::storage::{BankrollStore, JsonFileStore};
use rugs_risk::strategy::bankroll::BankrollManager;
use rugs_risk::strategy::ev::EvEngine;
use rugs_risk::strategy::DecisionEngine;
use rugs_risk::types::{Action, ForecastTick, Regime};

use crate::common::{config_in, temp_dir};

#[test]
fn test_decide_then_settle_persists() {
    let dir = temp_dir("decide");
    let cfg = config_in(&dir);

    let store = ThresholdStore::new(&cfg.paths.thresholds_dir);
    store.seed_defaults().unwrap();
    let thresholds = store.activate(Regime::Normal).unwrap();

    let engine = DecisionEngine::new(EvEngine::new(cfg.ev));
    let mut bm = BankrollManager::open(cfg.bankroll, Box::new(JsonFileStore::new(&cfg.paths.bankroll)));
    assert_eq!(bm.balance(), 1000.0);

    // Sidebet armed: p10 over 0.40 and the EV engine favours it.
    let tick = ForecastTick::live(1.8, 6.0).with_forecast(0.2, 0.6);
    let decision = engine.decide(&tick, &thresholds, &bm);
    assert_eq!(decision.action, Action::ArmSidebet);
    assert!(decision.sidebet_stake > 0.0);
    assert!(decision.sidebet_stake <= 1000.0 * cfg.bankroll.bet_size_cap + 1e-9);

    // It lost.
    let stake = decision.sidebet_stake;
    let update = bm.update_balance(stake, -stake);
    assert!((update.new_balance - (1000.0 - stake)).abs() < 1e-9);

    // A fresh manager over the same file sees the settled state.
    let reopened = BankrollManager::open(cfg.bankroll, Box::new(JsonFileStore::new(&cfg.paths.bankroll)));
    assert_eq!(reopened.balance().to_bits(), bm.balance().to_bits());
    assert_eq!(reopened.state().losses, 1);
    assert_eq!(reopened.daily_loss(), stake);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_breaker_blocks_new_sidebets_but_not_cash() {
    let dir = temp_dir("breaker");
    let cfg = config_in(&dir);
    let thresholds = ThresholdRecord::default_for(Regime::HighVol);
    let engine = DecisionEngine::new(EvEngine::new(cfg.ev));

    let mut bm = BankrollManager::open(cfg.bankroll, Box::new(JsonFileStore::new(&cfg.paths.bankroll)));
    bm.update_balance(250.0, -250.0);
    assert!(!bm.apply_daily_loss_cap());
    assert!(!bm.get_status().can_bet);

    let sidebet_tick = ForecastTick::live(1.8, 6.0).with_forecast(0.2, 0.7);
    let d = engine.decide(&sidebet_tick, &thresholds, &bm);
    assert_eq!(d.action, Action::Hold);
    assert!(d.risk_blocked);

    let cash_tick = ForecastTick::live(1.8, 6.0).with_forecast(0.8, 0.9);
    assert_eq!(engine.decide(&cash_tick, &thresholds, &bm).action, Action::Cash);

    // Operator reset re-opens risk.
    bm.reset_bankroll(Some(500.0));
    assert!(bm.apply_daily_loss_cap());
    let saved = JsonFileStore::new(&cfg.paths.bankroll).load().unwrap().unwrap();
    assert_eq!(saved.balance, 500.0);
    assert_eq!(saved.total_bets, 0);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_missing_active_thresholds_fall_back_to_defaults() {
    let dir = temp_dir("fallback");
    let store = ThresholdStore::new(&dir);
    let record = store.active_or_default(Regime::LowVol);
    assert_eq!(record, ThresholdRecord { trained_at: record.trained_at, ..ThresholdRecord::default_for(Regime::LowVol) });

    let engine = DecisionEngine::default();
    let cfg = config_in(&dir);
    let bm = BankrollManager::open(cfg.bankroll, Box::new(JsonFileStore::new(&cfg.paths.bankroll)));
    let d = engine.decide(&ForecastTick::live(1.3, 2.0), &record, &bm);
    assert_eq!(d.action, Action::Hold);

    std::fs::remove_dir_all(&dir).unwrap();
}
