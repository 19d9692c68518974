//! Performance metrics shared by the threshold sweep and the strategy
//! simulator.

/// Mean and population standard deviation.
fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Per-period Sharpe ratio: mean over population std, not annualised.
/// Zero when the series is flat or empty.
pub fn sharpe_ratio(returns: &[f64]) -> f64 {
    let (mean, std_dev) = mean_std(returns);
    if std_dev < 1e-12 {
        return 0.0;
    }
    mean / std_dev
}

/// Largest peak-to-trough decline as a fraction of the peak.
pub fn max_drawdown(equity: &[f64]) -> f64 {
    let Some(&first) = equity.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;
    for &value in equity {
        if value > peak {
            peak = value;
        }
        if peak > 0.0 {
            max_dd = max_dd.max((peak - value) / peak);
        }
    }
    max_dd
}

/// Rough probability-of-ruin proxy: twice the max drawdown, clamped to [0, 1].
pub fn ruin_proxy(max_drawdown: f64) -> f64 {
    (max_drawdown * 2.0).clamp(0.0, 1.0)
}

/// Period-over-period returns of an equity curve. A non-positive base
/// yields a zero return for that period.
pub fn period_returns(equity: &[f64]) -> Vec<f64> {
    equity
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

/// Std of period returns scaled by √n.
pub fn volatility(returns: &[f64]) -> f64 {
    let (_, std_dev) = mean_std(returns);
    std_dev * (returns.len() as f64).sqrt()
}

/// `(last - first) / first`, zero for an empty curve or non-positive start.
pub fn total_return(equity: &[f64]) -> f64 {
    match (equity.first(), equity.last()) {
        (Some(&first), Some(&last)) if first > 0.0 => (last - first) / first,
        _ => 0.0,
    }
}
