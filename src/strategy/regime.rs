//! Market regime detection.
//!
//! Classifies a window of round summaries as LOW_VOL, NORMAL or HIGH_VOL from
//! mean volatility and mean slope magnitude, and segments a longer history
//! into regime runs.
//!
//! Calm requires both metrics below their low thresholds; danger requires
//! only one metric above its high threshold. There is no hysteresis: one
//! window's statistics can flip the label, so labels may chatter near a
//! threshold boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::types::{Regime, RoundSummary};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct RegimeConfig {
    /// Rounds considered by `get_current_regime`.
    pub lookback_rounds: usize,
    pub vol_low_threshold: f64,
    pub vol_high_threshold: f64,
    pub slope_low_threshold: f64,
    pub slope_high_threshold: f64,
    /// Below this many rounds a judgment is not trusted (NORMAL).
    pub min_rounds_per_regime: usize,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            lookback_rounds: 200,
            vol_low_threshold: 0.1,
            vol_high_threshold: 0.3,
            slope_low_threshold: 0.05,
            slope_high_threshold: 0.15,
            min_rounds_per_regime: 50,
        }
    }
}

// ---------------------------------------------------------------------------
// Regime info
// ---------------------------------------------------------------------------

/// A detected regime over a contiguous run of rounds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegimeInfo {
    pub regime: Regime,
    pub start_round: i64,
    pub end_round: i64,
    pub round_count: usize,
    pub avg_volatility: f64,
    pub avg_slope: f64,
    pub vol_std: f64,
    pub slope_std: f64,
    pub detected_at: DateTime<Utc>,
}

impl RegimeInfo {
    fn from_rows(regime: Regime, rows: &[RoundSummary]) -> Self {
        let vols: Vec<f64> = rows.iter().map(|r| r.volatility).collect();
        let slopes: Vec<f64> = rows.iter().map(|r| r.slope_magnitude).collect();
        Self {
            regime,
            start_round: rows.first().map(|r| r.round_id).unwrap_or(0),
            end_round: rows.last().map(|r| r.round_id).unwrap_or(0),
            round_count: rows.len(),
            avg_volatility: mean(&vols),
            avg_slope: mean(&slopes),
            vol_std: sample_std(&vols),
            slope_std: sample_std(&slopes),
            detected_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct RegimeDetector {
    config: RegimeConfig,
}

impl RegimeDetector {
    pub fn new(config: RegimeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RegimeConfig {
        &self.config
    }

    /// Regime for a window. Fewer than `min_rounds_per_regime` rows is not
    /// enough signal and yields NORMAL.
    pub fn detect_regime(&self, window: &[RoundSummary]) -> Regime {
        if window.len() < self.config.min_rounds_per_regime || window.is_empty() {
            return Regime::Normal;
        }
        self.classify(window)
    }

    /// Threshold test on a window's mean volatility and slope magnitude.
    fn classify(&self, window: &[RoundSummary]) -> Regime {
        let vols: Vec<f64> = window.iter().map(|r| r.volatility).collect();
        let slopes: Vec<f64> = window.iter().map(|r| r.slope_magnitude).collect();
        let avg_vol = mean(&vols);
        let avg_slope = mean(&slopes);
        let c = &self.config;

        if avg_vol < c.vol_low_threshold && avg_slope < c.slope_low_threshold {
            Regime::LowVol
        } else if avg_vol > c.vol_high_threshold || avg_slope > c.slope_high_threshold {
            Regime::HighVol
        } else {
            Regime::Normal
        }
    }

    /// Segment a history into regime runs.
    ///
    /// The history is sorted by start time, then a window of
    /// `min(min_rounds_per_regime, len / 4)` rows slides forward in
    /// half-window steps. Each label change closes the open segment; the
    /// last segment is always emitted. Windows are labelled through
    /// [`detect_regime`](Self::detect_regime), so a window shorter than
    /// `min_rounds_per_regime` (history under four times the minimum) reads
    /// as NORMAL.
    pub fn detect_regime_changes(&self, history: &[RoundSummary]) -> Vec<RegimeInfo> {
        if history.len() < self.config.min_rounds_per_regime || history.is_empty() {
            return Vec::new();
        }

        let mut data = history.to_vec();
        data.sort_by_key(|r| r.started_at);

        let window = self.config.min_rounds_per_regime.min(data.len() / 4).max(1);
        let step = (window / 2).max(1);

        let mut segments = Vec::new();
        let mut current: Option<Regime> = None;
        let mut segment_start = 0usize;

        let mut i = 0usize;
        while i + window <= data.len() {
            let label = self.detect_regime(&data[i..i + window]);
            if current != Some(label) {
                if let Some(prev) = current {
                    let info = RegimeInfo::from_rows(prev, &data[segment_start..i]);
                    debug!(
                        regime = %prev,
                        start = info.start_round,
                        end = info.end_round,
                        rounds = info.round_count,
                        "Regime segment closed"
                    );
                    segments.push(info);
                }
                current = Some(label);
                segment_start = i;
            }
            i += step;
        }

        if let Some(last) = current {
            segments.push(RegimeInfo::from_rows(last, &data[segment_start..]));
        }

        info!(rounds = data.len(), segments = segments.len(), "Regime changes detected");
        segments
    }

    /// Regime over the most recent `lookback_rounds` of `history`.
    pub fn get_current_regime(&self, history: &[RoundSummary]) -> RegimeInfo {
        let mut data = history.to_vec();
        data.sort_by_key(|r| r.started_at);
        let start = data.len().saturating_sub(self.config.lookback_rounds);
        let recent = &data[start..];

        let regime = self.detect_regime(recent);
        let info = RegimeInfo::from_rows(regime, recent);
        info!(
            regime = %info.regime,
            rounds = info.round_count,
            avg_volatility = format!("{:.4}", info.avg_volatility),
            avg_slope = format!("{:.4}", info.avg_slope),
            "Current regime"
        );
        info
    }
}

// ---------------------------------------------------------------------------
// Statistics helpers
// ---------------------------------------------------------------------------

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n − 1); 0 with fewer than two values.
pub(crate) fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() as f64 - 1.0);
    var.sqrt()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
