//! Kelly criterion position sizing.
//!
//! Computes fractional Kelly bet sizes with a configurable multiplier and a
//! hard cap on the fraction of balance put at risk.

use tracing::debug;

// ---------------------------------------------------------------------------
// Kelly sizer
// ---------------------------------------------------------------------------

/// Fractional, capped Kelly sizer.
#[derive(Debug, Clone, Copy)]
pub struct KellySizer {
    /// Fractional Kelly multiplier (0.5 = half-Kelly).
    pub kelly_fraction: f64,
    /// Maximum bet as a fraction of balance.
    pub bet_size_cap: f64,
}

impl Default for KellySizer {
    fn default() -> Self {
        Self {
            kelly_fraction: 0.5,
            bet_size_cap: 0.05,
        }
    }
}

impl KellySizer {
    pub fn new(kelly_fraction: f64, bet_size_cap: f64) -> Self {
        Self {
            kelly_fraction,
            bet_size_cap,
        }
    }

    /// Raw Kelly fraction for win probability `p` at decimal `odds`.
    ///
    /// Kelly formula: f* = (bp - q) / b
    /// where:
    ///   b = odds - 1 (net payout per unit staked)
    ///   p = win probability
    ///   q = 1 - p
    ///
    /// Returns 0 for degenerate inputs (no edge, certain outcome, odds ≤ 1).
    pub fn raw_fraction(edge: f64, odds: f64) -> f64 {
        if !(edge > 0.0 && edge < 1.0 && odds > 1.0) {
            return 0.0;
        }
        let b = odds - 1.0;
        let q = 1.0 - edge;
        (b * edge - q) / b
    }

    /// Recommended bet as a fraction of balance, in `[0, bet_size_cap]`.
    pub fn size_bet(&self, edge: f64, odds: f64) -> f64 {
        let raw = Self::raw_fraction(edge, odds);
        if raw <= 0.0 {
            return 0.0;
        }
        let sized = (raw * self.kelly_fraction).min(self.bet_size_cap).max(0.0);

        debug!(
            edge,
            odds,
            raw_kelly = format!("{:.2}%", raw * 100.0),
            sized = format!("{:.2}%", sized * 100.0),
            "Bet sized"
        );
        sized
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
