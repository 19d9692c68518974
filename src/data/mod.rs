//! Historical round data and derived features.
//!
//! Rounds are read from a JSON array of [`RoundRecord`]s. From them we derive
//! round summaries for the regime detector and per-tick features for the
//! rug forecaster stand-ins used by replays.

pub mod forecast;

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info};

use crate::strategy::regime::{mean, sample_std};
use crate::types::{ForecastTick, RoundRecord, RoundSummary};

/// Rounds with fewer live ticks than this are skipped for regime statistics.
pub const MIN_TICKS_PER_ROUND: usize = 10;

/// Ticks in the rolling volatility window.
pub const ROLLING_VOL_WINDOW: usize = 5;

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load rounds from a JSON file, sorted by start time.
pub fn load_rounds(path: impl AsRef<Path>) -> Result<Vec<RoundRecord>> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read round history from {}", path.display()))?;
    let mut rounds: Vec<RoundRecord> = serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse round history from {}", path.display()))?;
    rounds.sort_by_key(|r| r.started_at);

    let ticks: usize = rounds.iter().map(|r| r.ticks.len()).sum();
    info!(path = %path.display(), rounds = rounds.len(), ticks, "Round history loaded");
    Ok(rounds)
}

// ---------------------------------------------------------------------------
// Round-level features
// ---------------------------------------------------------------------------

/// Summarise one round's live ticks. `None` if it has too few.
pub fn summarize_round(round: &RoundRecord) -> Option<RoundSummary> {
    let live = round.live_ticks();
    if live.len() < MIN_TICKS_PER_ROUND {
        return None;
    }

    let xs: Vec<f64> = live.iter().map(|t| t.x).collect();
    let slopes: Vec<f64> = live.windows(2).map(|w| slope(w[0], w[1]).abs()).collect();

    Some(RoundSummary {
        round_id: round.id,
        started_at: round.started_at,
        volatility: sample_std(&xs) / (mean(&xs) + 1e-6),
        slope_magnitude: mean(&slopes),
    })
}

/// Summaries for every round with enough live ticks, in start order.
pub fn summarize_rounds(rounds: &[RoundRecord]) -> Vec<RoundSummary> {
    let mut out: Vec<RoundSummary> = rounds.iter().filter_map(summarize_round).collect();
    out.sort_by_key(|s| s.started_at);
    debug!(rounds = rounds.len(), usable = out.len(), "Rounds summarised");
    out
}

// ---------------------------------------------------------------------------
// Tick-level features
// ---------------------------------------------------------------------------

/// Features for one live tick, computed from the ticks before it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickFeatures {
    pub x: f64,
    pub t: f64,
    /// Δx/Δt against the previous live tick.
    pub slope: f64,
    /// Rolling sample std of `x` over the last few ticks.
    pub volatility: f64,
}

impl TickFeatures {
    /// Features of a tick seen in isolation: no slope, no dispersion.
    pub fn at(tick: &ForecastTick) -> Self {
        Self {
            x: tick.x,
            t: tick.t,
            slope: 0.0,
            volatility: 0.0,
        }
    }
}

/// Features for a round's live ticks, in time order.
pub fn tick_features(ticks: &[&ForecastTick]) -> Vec<TickFeatures> {
    ticks
        .iter()
        .enumerate()
        .map(|(i, tick)| {
            let slope = if i == 0 { 0.0 } else { slope(ticks[i - 1], tick) };
            let from = (i + 1).saturating_sub(ROLLING_VOL_WINDOW);
            let window: Vec<f64> = ticks[from..=i].iter().map(|t| t.x).collect();
            TickFeatures {
                x: tick.x,
                t: tick.t,
                slope,
                volatility: sample_std(&window),
            }
        })
        .collect()
}

fn slope(prev: &ForecastTick, next: &ForecastTick) -> f64 {
    let dt = next.t - prev.t;
    if dt > 0.0 {
        (next.x - prev.x) / dt
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TickPhase;

    fn round_with(id: i64, xs: &[f64]) -> RoundRecord {
        RoundRecord {
            id,
            started_at: id * 60_000,
            ended_at: None,
            rug_time_s: None,
            rug_x: None,
            ticks: xs
                .iter()
                .enumerate()
                .map(|(i, x)| ForecastTick::live(*x, i as f64))
                .collect(),
        }
    }

    #[test]
    fn test_short_round_skipped() {
        let r = round_with(1, &[1.0, 1.1, 1.2]);
        assert!(summarize_round(&r).is_none());
    }

    #[test]
    fn test_flat_round_has_zero_vol_and_slope() {
        let r = round_with(1, &[2.0; 12]);
        let s = summarize_round(&r).unwrap();
        assert_eq!(s.volatility, 0.0);
        assert_eq!(s.slope_magnitude, 0.0);
        assert_eq!(s.round_id, 1);
    }

    #[test]
    fn test_linear_round_slope() {
        let xs: Vec<f64> = (0..12).map(|i| 1.0 + 0.1 * i as f64).collect();
        let s = summarize_round(&round_with(2, &xs)).unwrap();
        assert!((s.slope_magnitude - 0.1).abs() < 1e-9);
        assert!(s.volatility > 0.0);
    }

    #[test]
    fn test_non_live_ticks_ignored() {
        let mut r = round_with(3, &[1.0; 10]);
        let mut spike = ForecastTick::live(50.0, 3.5);
        spike.phase = TickPhase::Cooldown;
        r.ticks.push(spike);
        let s = summarize_round(&r).unwrap();
        assert_eq!(s.volatility, 0.0);
    }

    #[test]
    fn test_summarize_rounds_sorted() {
        let rounds = vec![round_with(5, &[1.0; 10]), round_with(2, &[1.0; 10]), round_with(3, &[1.0; 2])];
        let out = summarize_rounds(&rounds);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].round_id, 2);
        assert_eq!(out[1].round_id, 5);
    }

    #[test]
    fn test_tick_features() {
        let r = round_with(1, &[1.0, 1.5, 2.0, 2.0]);
        let live = r.live_ticks();
        let f = tick_features(&live);
        assert_eq!(f.len(), 4);
        assert_eq!(f[0].slope, 0.0);
        assert_eq!(f[0].volatility, 0.0);
        assert!((f[1].slope - 0.5).abs() < 1e-12);
        assert_eq!(f[3].slope, 0.0);
        assert!(f[2].volatility > 0.0);
    }

    #[test]
    fn test_load_rounds_from_file() {
        let mut p = std::env::temp_dir();
        p.push(format!("rugs_rounds_{}.json", uuid::Uuid::new_v4()));
        let rounds = vec![round_with(9, &[1.0, 1.2]), round_with(4, &[1.0])];
        std::fs::write(&p, serde_json::to_string(&rounds).unwrap()).unwrap();

        let loaded = load_rounds(&p).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id, 4);
        std::fs::remove_file(&p).unwrap();
    }

    #[test]
    fn test_load_rounds_missing_file() {
        assert!(load_rounds("/tmp/rugs_no_rounds_here.json").is_err());
    }
}
