//! Published operating thresholds.
//!
//! Each regime carries its own record in `thresholds_<regime>.json`. The
//! active record lives in `thresholds.json` and is always a copy of exactly
//! one regime's record, swapped in with an atomic replace.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::write_atomic;
use crate::backtest::tuner::SweepReport;
use crate::types::{Regime, RiskError};

pub const ACTIVE_FILE: &str = "thresholds.json";
pub const SWEEP_REPORT_FILE: &str = "threshold_sweep_results.json";

/// Confidence floor used for seeded and freshly tuned records.
pub const DEFAULT_MIN_CONFIDENCE: Decimal = dec!(0.55);

fn round_dp(value: f64, dp: u32) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default().round_dp(dp)
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Backtest metrics of the published operating point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdMetrics {
    pub total_return: Decimal,
    pub sharpe_ratio: Decimal,
    pub max_drawdown: Decimal,
    pub prob_ruin: Decimal,
}

impl ThresholdMetrics {
    /// Metrics rounded to 4 decimal places.
    pub fn new(total_return: f64, sharpe_ratio: f64, max_drawdown: f64, prob_ruin: f64) -> Self {
        Self {
            total_return: round_dp(total_return, 4),
            sharpe_ratio: round_dp(sharpe_ratio, 4),
            max_drawdown: round_dp(max_drawdown, 4),
            prob_ruin: round_dp(prob_ruin, 4),
        }
    }
}

/// Operating thresholds for one regime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRecord {
    /// CASH when the 5s rug probability exceeds this.
    pub cash_if_p5_gt: Decimal,
    /// ARM_SIDEBET when the 10s rug probability exceeds this.
    pub sidebet_if_p10_gt: Decimal,
    pub min_confidence: Decimal,
    pub regime: Regime,
    pub trained_at: DateTime<Utc>,
    pub rounds_used: usize,
    pub metrics: ThresholdMetrics,
}

impl ThresholdRecord {
    /// Thresholds are rounded to 3 decimal places.
    pub fn new(
        regime: Regime,
        cash_threshold: f64,
        sidebet_threshold: f64,
        min_confidence: f64,
        rounds_used: usize,
        metrics: ThresholdMetrics,
    ) -> Self {
        Self {
            cash_if_p5_gt: round_dp(cash_threshold, 3),
            sidebet_if_p10_gt: round_dp(sidebet_threshold, 3),
            min_confidence: round_dp(min_confidence, 3),
            regime,
            trained_at: Utc::now(),
            rounds_used,
            metrics,
        }
    }

    /// Conservative untrained defaults. Calmer regimes cash out earlier.
    pub fn default_for(regime: Regime) -> Self {
        let (cash, sidebet) = match regime {
            Regime::LowVol => (dec!(0.25), dec!(0.35)),
            Regime::Normal => (dec!(0.30), dec!(0.40)),
            Regime::HighVol => (dec!(0.35), dec!(0.45)),
        };
        Self {
            cash_if_p5_gt: cash,
            sidebet_if_p10_gt: sidebet,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            regime,
            trained_at: Utc::now(),
            rounds_used: 0,
            metrics: ThresholdMetrics::default(),
        }
    }

    pub fn cash_threshold(&self) -> f64 {
        self.cash_if_p5_gt.to_f64().unwrap_or(1.0)
    }

    pub fn sidebet_threshold(&self) -> f64 {
        self.sidebet_if_p10_gt.to_f64().unwrap_or(1.0)
    }

    pub fn confidence_floor(&self) -> f64 {
        self.min_confidence.to_f64().unwrap_or(1.0)
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Directory of per-regime threshold records plus the active alias.
#[derive(Debug, Clone)]
pub struct ThresholdStore {
    dir: PathBuf,
}

impl ThresholdStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn regime_path(&self, regime: Regime) -> PathBuf {
        self.dir.join(format!("thresholds_{}.json", regime.key()))
    }

    pub fn active_path(&self) -> PathBuf {
        self.dir.join(ACTIVE_FILE)
    }

    pub fn sweep_report_path(&self) -> PathBuf {
        self.dir.join(SWEEP_REPORT_FILE)
    }

    /// Write the record under its regime key. Does not touch the active alias.
    pub fn publish(&self, record: &ThresholdRecord) -> Result<PathBuf> {
        let path = self.regime_path(record.regime);
        let json = serde_json::to_string_pretty(record).context("Failed to serialise thresholds")?;
        write_atomic(&path, json.as_bytes())?;
        info!(
            regime = %record.regime,
            cash = %record.cash_if_p5_gt,
            sidebet = %record.sidebet_if_p10_gt,
            rounds_used = record.rounds_used,
            path = %path.display(),
            "Thresholds published"
        );
        Ok(path)
    }

    pub fn load(&self, regime: Regime) -> Result<Option<ThresholdRecord>> {
        read_record(&self.regime_path(regime))
    }

    /// Point the active alias at `regime`'s record.
    pub fn activate(&self, regime: Regime) -> Result<ThresholdRecord> {
        let record = self.load(regime)?.ok_or_else(|| {
            RiskError::Storage(format!("no thresholds published for regime {regime}"))
        })?;
        let json = serde_json::to_string_pretty(&record).context("Failed to serialise thresholds")?;
        write_atomic(&self.active_path(), json.as_bytes())?;
        info!(regime = %regime, "Active thresholds switched");
        Ok(record)
    }

    pub fn load_active(&self) -> Result<Option<ThresholdRecord>> {
        read_record(&self.active_path())
    }

    /// Active record, or `regime`'s defaults if none can be read.
    pub fn active_or_default(&self, regime: Regime) -> ThresholdRecord {
        match self.load_active() {
            Ok(Some(record)) => record,
            Ok(None) => {
                warn!(regime = %regime, "No active thresholds, using defaults");
                ThresholdRecord::default_for(regime)
            }
            Err(e) => {
                warn!(error = %e, regime = %regime, "Active thresholds unreadable, using defaults");
                ThresholdRecord::default_for(regime)
            }
        }
    }

    /// Publish defaults for every regime without a record. Returns the regimes seeded.
    pub fn seed_defaults(&self) -> Result<Vec<Regime>> {
        let mut seeded = Vec::new();
        for regime in Regime::ALL {
            if self.regime_path(regime).exists() {
                continue;
            }
            self.publish(&ThresholdRecord::default_for(regime))?;
            seeded.push(regime);
        }
        if !seeded.is_empty() {
            info!(count = seeded.len(), "Default thresholds seeded");
        }
        Ok(seeded)
    }

    pub fn save_sweep_report(&self, report: &SweepReport) -> Result<PathBuf> {
        let path = self.sweep_report_path();
        let json = serde_json::to_string_pretty(report).context("Failed to serialise sweep report")?;
        write_atomic(&path, json.as_bytes())?;
        info!(
            path = %path.display(),
            results = report.valid_results,
            frontier = report.pareto_optimal_count,
            "Sweep report saved"
        );
        Ok(path)
    }
}

fn read_record(path: &Path) -> Result<Option<ThresholdRecord>> {
    if !path.exists() {
        return Ok(None);
    }
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read thresholds from {}", path.display()))?;
    let record = serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse thresholds from {}", path.display()))?;
    Ok(Some(record))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
