//! Synthetic round history and temp-dir helpers.

use std::path::PathBuf;

use rugs_risk::config::AppConfig;
use rugs_risk::types::{ForecastTick, RoundRecord};

pub const TICKS_PER_ROUND: usize = 20;

/// Fresh directory under the system temp dir.
pub fn temp_dir(tag: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    dir.push(format!("rugs_it_{tag}_{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Round whose multiplier climbs by `step` per second and rugs just after
/// the last tick.
pub fn round(id: i64, step: f64) -> RoundRecord {
    let ticks: Vec<ForecastTick> = (0..TICKS_PER_ROUND)
        .map(|i| ForecastTick::live(1.0 + step * i as f64, i as f64))
        .collect();
    let last_x = ticks.last().map(|t| t.x).unwrap_or(1.0);
    RoundRecord {
        id,
        started_at: 1_700_000_000_000 + id * 60_000,
        ended_at: Some(1_700_000_000_000 + id * 60_000 + 25_000),
        rug_time_s: Some(TICKS_PER_ROUND as f64 - 0.5),
        rug_x: Some(last_x),
        ticks,
    }
}

/// Slow, steady climbs: low volatility and low slope.
pub fn calm_rounds(start_id: i64, n: i64) -> Vec<RoundRecord> {
    (start_id..start_id + n).map(|id| round(id, 0.01)).collect()
}

/// Steep climbs: slope well above the high threshold.
pub fn hot_rounds(start_id: i64, n: i64) -> Vec<RoundRecord> {
    (start_id..start_id + n).map(|id| round(id, 0.3)).collect()
}

/// Defaults with a small trust minimum and paths inside `dir`.
pub fn config_in(dir: &std::path::Path) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.regime.min_rounds_per_regime = 10;
    cfg.regime.lookback_rounds = 40;
    cfg.tuner.cash_grid.count = 3;
    cfg.tuner.sidebet_grid.count = 3;
    cfg.tuner.workers = 2;
    cfg.paths.history = dir.join("rounds.json");
    cfg.paths.bankroll = dir.join("bankroll.json");
    cfg.paths.thresholds_dir = dir.to_path_buf();
    cfg
}

pub fn write_history(cfg: &AppConfig, rounds: &[RoundRecord]) {
    std::fs::write(&cfg.paths.history, serde_json::to_string(rounds).unwrap()).unwrap();
}
