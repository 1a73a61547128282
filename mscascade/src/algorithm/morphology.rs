//! Linear time running min/max filters after van Herk and Gil-Werman.

/// Windowed extremum over `2q+1` points using block-wise forward and backward running extrema
///
/// The series is padded by `q` copies of its first and last values; blocks of width `k = 2q+1`
/// start at the first real point.
fn van_herk(y: &[f64], q: usize, pick: fn(f64, f64) -> f64) -> Vec<f64> {
    let n = y.len();
    let k = 2 * q + 1;
    let fn_ = n + 2 * q + (k - n % k);

    let mut ys = vec![0.0; fn_];
    let mut gs = vec![0.0; fn_];
    let mut hs = vec![0.0; fn_];

    ys[q..q + n].copy_from_slice(y);

    for i in 0..q {
        ys[i] = ys[q];
        hs[i] = ys[q];
    }
    let last = ys[q + n - 1];
    for i in q + n..fn_ {
        ys[i] = last;
        gs[i] = last;
    }

    let mut start = q;
    while start < n + q {
        let end = start + k - 1;
        gs[start] = ys[start];
        hs[end] = ys[end];
        for j in 1..k {
            let gi = start + j;
            let hi = end - j;
            gs[gi] = pick(gs[gi - 1], ys[gi]);
            hs[hi] = pick(hs[hi + 1], ys[hi]);
        }
        start += k;
    }

    (0..n).map(|i| pick(gs[k - 1 + i], hs[i])).collect()
}

/// Running minimum with half window `q`
pub fn erosion(y: &[f64], q: usize) -> Vec<f64> {
    if y.is_empty() {
        return Vec::new();
    }
    van_herk(y, q, f64::min)
}

/// Running maximum with half window `q`
pub fn dilation(y: &[f64], q: usize) -> Vec<f64> {
    if y.is_empty() {
        return Vec::new();
    }
    van_herk(y, q, f64::max)
}

/// Morphological opening (erosion then dilation), the baseline estimate of a series
///
/// # Arguments
///
/// * `y` - the intensity series
/// * `q` - half width of the structuring element
///
/// # Returns
///
/// * `Option<Vec<f64>>` - the opened series, `None` if `q < 1` or `2q+1 > n`
pub fn opening(y: &[f64], q: usize) -> Option<Vec<f64>> {
    if q < 1 || 2 * q + 1 > y.len() {
        return None;
    }
    Some(dilation(&erosion(y, q), q))
}
