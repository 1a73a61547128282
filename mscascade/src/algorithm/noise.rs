use tracing::debug;

use crate::algorithm::math::median_sorted;

const SIMPLE_MIN: usize = 4;
const MIN_WINDOW_SIZE: usize = 10;
const MIN_MEAN_CROSSINGS: usize = 6;

/// Noise scale factor of an intensity series
///
/// Slides a 10 point window over the series and takes the first window whose values cross their
/// mean at least 6 times; the estimate is the median absolute deviation of that window divided by
/// the square root of its mean. Short series and series without such a window use the simple
/// estimate over the four lowest intensities.
///
/// # Arguments
///
/// * `intensities` - the chromatogram intensities in time order
///
/// # Returns
///
/// * `f64` - the noise factor, never negative; 0 for degenerate input
pub fn noise_estimate(intensities: &[f64]) -> f64 {
    if intensities.len() < MIN_WINDOW_SIZE {
        return simple_estimate(intensities);
    }

    let last_start = intensities.len() - MIN_WINDOW_SIZE;
    // windows start strictly before len - 20
    for start in 0..last_start.saturating_sub(MIN_WINDOW_SIZE) {
        let window = &intensities[start..start + MIN_WINDOW_SIZE];
        if mean_crossings(window) >= MIN_MEAN_CROSSINGS {
            return noise_factor(window);
        }
    }

    debug!(points = intensities.len(), "no noisy window found, using simple noise estimate");
    simple_estimate(intensities)
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sign changes of the deviation from the window mean; the first value seeds the comparison
fn mean_crossings(window: &[f64]) -> usize {
    let mean = mean(window);
    let mut last_delta = window[0];
    let mut crossings = 0;
    for &y in window {
        let delta = y - mean;
        if (delta < 0.0 && last_delta > 0.0) || (delta > 0.0 && last_delta < 0.0) {
            crossings += 1;
        }
        last_delta = delta;
    }
    crossings
}

fn noise_factor(window: &[f64]) -> f64 {
    let mean = mean(window);
    let mut deviations: Vec<f64> = window.iter().map(|y| (y - mean).abs()).collect();
    deviations.sort_by(f64::total_cmp);
    scaled(median_sorted(&deviations), mean)
}

/// `((dev[1] + dev[2]) / 2) / sqrt(mean)` over the four lowest intensities
pub fn simple_estimate(intensities: &[f64]) -> f64 {
    let mut lowest = intensities.to_vec();
    lowest.sort_by(f64::total_cmp);
    lowest.truncate(SIMPLE_MIN);
    if lowest.len() < 3 {
        return 0.0;
    }

    let mean = mean(&lowest);
    let mut deviations: Vec<f64> = lowest.iter().map(|y| (y - mean).abs()).collect();
    deviations.sort_by(f64::total_cmp);
    scaled((deviations[1] + deviations[2]) / 2.0, mean)
}

fn scaled(deviation: f64, mean: f64) -> f64 {
    if mean <= 0.0 {
        return 0.0;
    }
    let value = deviation / mean.sqrt();
    if value.is_finite() { value.max(0.0) } else { 0.0 }
}
