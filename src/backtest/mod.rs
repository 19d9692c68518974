//! Offline replay of historical rounds.
//!
//! Rounds are prepared once (live ticks, features, forecasts) and then
//! replayed by the threshold sweep in [`tuner`] and the strategy comparison
//! in [`runner`].

pub mod metrics;
pub mod runner;
pub mod tuner;

use tracing::debug;

use crate::data::forecast::RugForecaster;
use crate::data::tick_features;
use crate::types::RoundRecord;

/// A live tick with the forecast the replay acts on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplayTick {
    pub x: f64,
    pub t: f64,
    pub p_rug_5s: f64,
    pub p_rug_10s: f64,
}

/// One historical round ready for replay.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayRound {
    pub round_id: i64,
    pub rug_time_s: Option<f64>,
    pub rug_x: Option<f64>,
    pub ticks: Vec<ReplayTick>,
}

impl ReplayRound {
    /// True if the rug lands within `horizon_s` seconds after `t`.
    pub fn rugs_within(&self, t: f64, horizon_s: f64) -> bool {
        match self.rug_time_s {
            Some(rug) => rug >= t && rug - t <= horizon_s,
            None => false,
        }
    }
}

/// Attach features and forecasts to every live tick. Rounds without live
/// ticks are dropped.
pub fn prepare_rounds(rounds: &[RoundRecord], forecaster: &dyn RugForecaster) -> Vec<ReplayRound> {
    let prepared: Vec<ReplayRound> = rounds
        .iter()
        .filter_map(|round| {
            let live = round.live_ticks();
            if live.is_empty() {
                return None;
            }
            let ticks = tick_features(&live)
                .iter()
                .zip(live.iter())
                .map(|(features, tick)| {
                    let p = forecaster.forecast(tick, features);
                    ReplayTick {
                        x: tick.x,
                        t: tick.t,
                        p_rug_5s: p.p_rug_5s,
                        p_rug_10s: p.p_rug_10s,
                    }
                })
                .collect();
            Some(ReplayRound {
                round_id: round.id,
                rug_time_s: round.rug_time_s,
                rug_x: round.rug_x,
                ticks,
            })
        })
        .collect();

    debug!(
        rounds = rounds.len(),
        prepared = prepared.len(),
        forecaster = forecaster.name(),
        "Rounds prepared for replay"
    );
    prepared
}
