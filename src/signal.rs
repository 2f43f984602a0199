//! Signal conditioning
//!
//! Moving-average detrending plus the small time-series primitives the vital
//! estimators are built from: local maxima, mean crossings and dispersion.

/// Half-width of the centered moving average used for detrending
pub const DETREND_HALF_WINDOW: usize = 5;

/// Remove slow drift by subtracting a centered moving average.
///
/// Formula: `out[i] = v[i + w] - mean(v[i ..= i + 2w])`
///
/// Samples within `w` of either boundary are dropped rather than padded, so the
/// output has length `n - 2w` (empty when `n <= 2w`).
pub fn detrend(values: &[f64], half_window: usize) -> Vec<f64> {
    let span = 2 * half_window + 1;
    if values.len() < span {
        return Vec::new();
    }

    // Sliding sum keeps this O(n)
    let mut window_sum: f64 = values[..span].iter().sum();
    let mut output = Vec::with_capacity(values.len() - 2 * half_window);
    output.push(values[half_window] - window_sum / span as f64);

    for i in 1..=(values.len() - span) {
        window_sum += values[i + span - 1] - values[i - 1];
        output.push(values[i + half_window] - window_sum / span as f64);
    }

    output
}

/// Indices of strict local maxima (greater than both neighbors).
///
/// The first and last samples have only one neighbor and are never peaks.
pub fn local_maxima(values: &[f64]) -> Vec<usize> {
    if values.len() < 3 {
        return Vec::new();
    }
    (1..values.len() - 1)
        .filter(|&i| values[i] > values[i - 1] && values[i] > values[i + 1])
        .collect()
}

/// Arithmetic mean, `None` for an empty series
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Count sign changes of `value - mean` between consecutive samples.
///
/// A value exactly at the mean counts as the non-negative side.
pub fn mean_crossings(values: &[f64]) -> usize {
    let Some(center) = mean(values) else {
        return 0;
    };
    values
        .windows(2)
        .filter(|pair| (pair[0] >= center) != (pair[1] >= center))
        .count()
}

/// Population standard deviation, `None` for an empty series
pub fn population_std_dev(values: &[f64]) -> Option<f64> {
    let center = mean(values)?;
    let variance = values.iter().map(|v| (v - center).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}
