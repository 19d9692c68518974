//! Rug probability sources.
//!
//! The live probability model runs outside this crate and attaches its
//! forecasts to each tick. Replays that lack them fall back to a
//! feature-based heuristic so the sweep and simulator always have an input.

use crate::data::TickFeatures;
use crate::types::ForecastTick;

/// Rug probabilities over the two forecast horizons.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RugProbabilities {
    pub p_rug_5s: f64,
    pub p_rug_10s: f64,
}

/// Anything that can produce rug probabilities for a live tick.
///
/// Implementations are shared across sweep worker threads.
pub trait RugForecaster: Sync {
    fn name(&self) -> &str;

    fn forecast(&self, tick: &ForecastTick, features: &TickFeatures) -> RugProbabilities;
}

// ---------------------------------------------------------------------------
// Heuristic
// ---------------------------------------------------------------------------

/// Volatility/slope heuristic used when no model output is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicForecaster;

impl HeuristicForecaster {
    pub fn estimate(features: &TickFeatures) -> RugProbabilities {
        let p5 = (features.volatility * 2.0 + features.slope.abs() * 0.1).clamp(0.1, 0.9);
        let p10 = (p5 * 1.2).clamp(0.15, 0.95);
        RugProbabilities {
            p_rug_5s: p5,
            p_rug_10s: p10,
        }
    }
}

impl RugForecaster for HeuristicForecaster {
    fn name(&self) -> &str {
        "heuristic"
    }

    fn forecast(&self, _tick: &ForecastTick, features: &TickFeatures) -> RugProbabilities {
        Self::estimate(features)
    }
}

// ---------------------------------------------------------------------------
// Tick-carried forecasts
// ---------------------------------------------------------------------------

/// Uses the model probabilities recorded on the tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickForecast;

impl RugForecaster for TickForecast {
    fn name(&self) -> &str {
        "tick"
    }

    fn forecast(&self, tick: &ForecastTick, features: &TickFeatures) -> RugProbabilities {
        match (tick.p_rug_5s, tick.p_rug_10s) {
            (Some(p5), Some(p10)) => RugProbabilities {
                p_rug_5s: p5,
                p_rug_10s: p10,
            },
            (Some(p5), None) => RugProbabilities {
                p_rug_5s: p5,
                p_rug_10s: HeuristicForecaster::estimate(features).p_rug_10s.max(p5),
            },
            _ => HeuristicForecaster::estimate(features),
        }
    }
}
