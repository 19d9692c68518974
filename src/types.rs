//! Shared types for the risk-decision engine.
//!
//! These types form the data model used across all modules: the closed set
//! of actions, the regime labels, the forecast tick stream and the round
//! records the detector and tuner replay.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// Candidate action at a decision point.
///
/// Declaration order is also the tie-break order when two actions score the
/// same expected value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Hold,
    Cash,
    ArmSidebet,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Hold => "HOLD",
            Action::Cash => "CASH",
            Action::ArmSidebet => "ARM_SIDEBET",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Regime
// ---------------------------------------------------------------------------

/// Volatility/slope classification of recent market behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    LowVol,
    Normal,
    HighVol,
}

impl Regime {
    pub const ALL: [Regime; 3] = [Regime::LowVol, Regime::Normal, Regime::HighVol];

    /// Key used for file names and serialized records.
    pub fn key(&self) -> &'static str {
        match self {
            Regime::LowVol => "low_vol",
            Regime::Normal => "normal",
            Regime::HighVol => "high_vol",
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Regime::LowVol => write!(f, "LOW_VOL"),
            Regime::Normal => write!(f, "NORMAL"),
            Regime::HighVol => write!(f, "HIGH_VOL"),
        }
    }
}

impl FromStr for Regime {
    type Err = RiskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "low_vol" | "lowvol" => Ok(Regime::LowVol),
            "normal" => Ok(Regime::Normal),
            "high_vol" | "highvol" => Ok(Regime::HighVol),
            other => Err(RiskError::UnknownRegime(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Ticks and rounds
// ---------------------------------------------------------------------------

/// Phase of a round a tick was observed in. Only `Live` ticks are traded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickPhase {
    Presale,
    #[default]
    Live,
    Cooldown,
}

/// One market tick plus the externally produced rug forecasts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastTick {
    /// Current multiplier (> 0).
    pub x: f64,
    /// Seconds since round start.
    pub t: f64,
    #[serde(default)]
    pub players: u32,
    #[serde(default)]
    pub wager: f64,
    #[serde(default)]
    pub phase: TickPhase,
    /// Forecast probability of a rug within 5 seconds.
    #[serde(default)]
    pub p_rug_5s: Option<f64>,
    /// Forecast probability of a rug within 10 seconds.
    #[serde(default)]
    pub p_rug_10s: Option<f64>,
}

impl ForecastTick {
    /// Live tick without forecasts attached.
    pub fn live(x: f64, t: f64) -> Self {
        Self {
            x,
            t,
            players: 0,
            wager: 0.0,
            phase: TickPhase::Live,
            p_rug_5s: None,
            p_rug_10s: None,
        }
    }

    pub fn with_forecast(mut self, p_rug_5s: f64, p_rug_10s: f64) -> Self {
        self.p_rug_5s = Some(p_rug_5s);
        self.p_rug_10s = Some(p_rug_10s);
        self
    }

    pub fn is_live(&self) -> bool {
        self.phase == TickPhase::Live
    }
}

/// A completed (or in-progress) historical round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub id: i64,
    /// Round start, unix milliseconds.
    pub started_at: i64,
    #[serde(default)]
    pub ended_at: Option<i64>,
    /// Seconds from round start to the rug, if the round rugged.
    #[serde(default)]
    pub rug_time_s: Option<f64>,
    /// Multiplier at which the round rugged.
    #[serde(default)]
    pub rug_x: Option<f64>,
    #[serde(default)]
    pub ticks: Vec<ForecastTick>,
}

impl RoundRecord {
    /// Live ticks in time order.
    pub fn live_ticks(&self) -> Vec<&ForecastTick> {
        let mut ticks: Vec<&ForecastTick> = self.ticks.iter().filter(|t| t.is_live()).collect();
        ticks.sort_by(|a, b| a.t.partial_cmp(&b.t).unwrap_or(std::cmp::Ordering::Equal));
        ticks
    }
}

/// Per-round statistics used by the regime detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoundSummary {
    pub round_id: i64,
    pub started_at: i64,
    /// Dispersion of the multiplier divided by its mean.
    pub volatility: f64,
    /// Mean absolute slope of the multiplier.
    pub slope_magnitude: f64,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types.
#[derive(Debug, thiserror::Error)]
pub enum RiskError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("No Pareto-optimal thresholds to publish")]
    NoFrontier,

    #[error("Unknown regime: {0}")]
    UnknownRegime(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
