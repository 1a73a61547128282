use std::sync::OnceLock;

use nalgebra::DMatrix;

/// Largest supported filter half width
pub const MAX_LEVEL: usize = 12;

const POLYNOMIAL_ORDER: usize = 4;

static SECOND_DERIVATIVE: OnceLock<Vec<Vec<f64>>> = OnceLock::new();

/// Second derivative Savitzky-Golay coefficients for half widths `0..=MAX_LEVEL`
///
/// Row `m` holds the coefficients for offsets `0..=m` of a `2m+1` point window; the filter is
/// symmetric. Fits are quartic where the window allows and quadratic for three points.
fn table() -> &'static [Vec<f64>] {
    SECOND_DERIVATIVE.get_or_init(|| (0..=MAX_LEVEL).map(second_derivative_coefficients).collect())
}

fn second_derivative_coefficients(m: usize) -> Vec<f64> {
    if m == 0 {
        return vec![0.0];
    }
    let order = POLYNOMIAL_ORDER.min(2 * m);
    let rows = 2 * m + 1;
    let scale = m as f64;
    // abscissae scaled to [-1, 1] to keep the normal matrix well conditioned
    let design = DMatrix::from_fn(rows, order + 1, |r, c| ((r as f64 - scale) / scale).powi(c as i32));
    let normal = design.transpose() * &design;

    match normal.try_inverse() {
        Some(inverse) => {
            let projection = inverse * design.transpose();
            (0..=m).map(|offset| 2.0 * projection[(2, m + offset)] / (scale * scale)).collect()
        }
        None => vec![0.0; m + 1],
    }
}

/// Coefficient for a signed offset within a window of half width `m`
pub fn coefficient(m: usize, offset: isize) -> f64 {
    let m = m.min(MAX_LEVEL);
    table()[m].get(offset.unsigned_abs()).copied().unwrap_or(0.0)
}

/// Smoothed second derivative of a series
///
/// The half width grows from 0 at the first point up to `level` and shrinks again toward the end,
/// so every window stays inside the series.
///
/// # Arguments
///
/// * `values` - the series, equally spaced
/// * `level` - filter half width, capped at `MAX_LEVEL`
///
/// # Returns
///
/// * `Vec<f64>` - the second derivative, one value per input point
pub fn second_derivative(values: &[f64], level: usize) -> Vec<f64> {
    let level = level.min(MAX_LEVEL);
    let n = values.len();
    let mut derivative = vec![0.0; n];
    let mut m = 0usize;

    for k in 0..n {
        if k <= level {
            m = k;
        }
        if k + m > n - 1 {
            m = n - (k + 1);
        }
        derivative[k] = (-(m as isize)..=m as isize)
            .map(|i| values[(k as isize + i) as usize] * coefficient(m, i))
            .sum();
    }
    derivative
}
