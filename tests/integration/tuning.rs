//! Regime detection feeding the threshold sweep and publication.

use rugs_risk::backtest::prepare_rounds;
use rugs_risk::backtest::tuner::ThresholdTuner;
use rugs_risk::data::forecast::HeuristicForecaster;
use rugs_risk::data::{load_rounds, summarize_rounds};
use rugs_risk::storage::thresholds::ThresholdStore;
use rugs_risk::strategy::regime::RegimeDetector;
use rugs_risk::types::{Regime, RiskError};

use crate::common::{calm_rounds, config_in, hot_rounds, temp_dir, write_history};

#[test]
fn test_regime_changes_over_history() {
    let dir = temp_dir("changes");
    let cfg = config_in(&dir);
    let mut rounds = calm_rounds(0, 40);
    rounds.extend(hot_rounds(40, 40));
    write_history(&cfg, &rounds);

    let summaries = summarize_rounds(&load_rounds(&cfg.paths.history).unwrap());
    assert_eq!(summaries.len(), 80);

    let detector = RegimeDetector::new(cfg.regime);
    let segments = detector.detect_regime_changes(&summaries);
    assert!(segments.len() >= 2);
    assert_eq!(segments.first().unwrap().regime, Regime::LowVol);
    assert_eq!(segments.last().unwrap().regime, Regime::HighVol);
    assert_eq!(segments.iter().map(|s| s.round_count).sum::<usize>(), 80);

    assert_eq!(detector.get_current_regime(&summaries).regime, Regime::HighVol);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_sweep_publishes_for_detected_regime() {
    let dir = temp_dir("sweep");
    let cfg = config_in(&dir);
    write_history(&cfg, &calm_rounds(0, 30));

    let rounds = load_rounds(&cfg.paths.history).unwrap();
    let regime = RegimeDetector::new(cfg.regime)
        .get_current_regime(&summarize_rounds(&rounds))
        .regime;
    assert_eq!(regime, Regime::LowVol);

    let replay = prepare_rounds(&rounds, &HeuristicForecaster);
    let tuner = ThresholdTuner::new(cfg.tuner.clone(), cfg.ev, cfg.bankroll);
    let report = tuner.run_sweep(&replay, regime).unwrap();
    assert_eq!(report.total_combinations, 9);
    assert_eq!(report.valid_results, 9);
    assert!(report.pareto_optimal_count >= 1);

    let store = ThresholdStore::new(&dir);
    let record = tuner.publish(&store, &report).unwrap();
    assert_eq!(record.regime, Regime::LowVol);
    assert_eq!(record.rounds_used, 30);
    assert!(store.sweep_report_path().exists());

    store.seed_defaults().unwrap();
    let active = store.activate(Regime::LowVol).unwrap();
    assert_eq!(active, record);
    assert_eq!(store.load_active().unwrap().unwrap(), record);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_empty_history_refuses_to_publish() {
    let dir = temp_dir("empty");
    let cfg = config_in(&dir);
    write_history(&cfg, &[]);

    let rounds = load_rounds(&cfg.paths.history).unwrap();
    let summaries = summarize_rounds(&rounds);
    assert_eq!(
        RegimeDetector::new(cfg.regime).get_current_regime(&summaries).regime,
        Regime::Normal
    );

    let tuner = ThresholdTuner::new(cfg.tuner.clone(), cfg.ev, cfg.bankroll);
    let report = tuner
        .run_sweep(&prepare_rounds(&rounds, &HeuristicForecaster), Regime::Normal)
        .unwrap();
    assert!(report.results.is_empty());
    assert!(report.pareto_optimal.is_empty());

    let store = ThresholdStore::new(&dir);
    let err = tuner.publish(&store, &report).unwrap_err();
    assert!(matches!(err.downcast_ref::<RiskError>(), Some(RiskError::NoFrontier)));
    assert!(store.load(Regime::Normal).unwrap().is_none());
    assert!(store.sweep_report_path().exists());

    std::fs::remove_dir_all(&dir).unwrap();
}
