//! Small statistical helpers shared by the momentum ranking and screeners.

pub const DEFAULT_MIN_HISTORY: usize = 30;

/// How far `latest` sits from the mean of `history`, in sample standard
/// deviations (ddof = 1). Non-finite history values are ignored.
///
/// Returns `None` when fewer than `min_history` usable values exist or the
/// history has no dispersion.
pub fn z_score(latest: f64, history: &[f64], min_history: usize) -> Option<f64> {
    let finite: Vec<f64> = history.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.len() < min_history || finite.len() < 2 {
        return None;
    }

    let n = finite.len() as f64;
    let mean = finite.iter().sum::<f64>() / n;
    let variance = finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let std = variance.sqrt();
    if std == 0.0 {
        return None;
    }
    Some((latest - mean) / std)
}

/// Map a z-score onto 0..100 with a logistic curve, rounded to 2 decimals.
/// A missing z-score scores 0.
pub fn scale_score(z: Option<f64>) -> f64 {
    match z {
        None => 0.0,
        Some(z) => round_to(100.0 / (1.0 + (-z).exp()), 2),
    }
}

/// Percentage change as a fraction; NaN when `previous` is zero.
pub fn pct_change(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        f64::NAN
    } else {
        current / previous - 1.0
    }
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
