use serde::{Deserialize, Serialize};
use crate::chemistry::constants::PPM;

/// A closed-open numeric interval `[lo, hi)` that can be widened in place
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub lo: f64,
    pub hi: f64,
}

impl Range {
    /// Creates a range, swapping the bounds if they are given in reverse order
    pub fn new(lo: f64, hi: f64) -> Self {
        if lo <= hi { Range { lo, hi } } else { Range { lo: hi, hi: lo } }
    }

    /// A degenerate range covering a single value, used as a seed for `extend`
    pub fn point(x: f64) -> Self {
        Range { lo: x, hi: x }
    }

    /// Tolerance window of `ppm` parts per million around `x`
    ///
    /// # Arguments
    ///
    /// * `x` - center value, usually an m/z
    /// * `ppm` - tolerance in parts per million
    ///
    /// # Examples
    ///
    /// ```
    /// use mscascade::data::range::Range;
    /// let range = Range::from_ppm(100.0, 10.0);
    /// assert!((range.lo - 99.999).abs() < 1e-9);
    /// assert!((range.hi - 100.001).abs() < 1e-9);
    /// ```
    pub fn from_ppm(x: f64, ppm: f64) -> Self {
        let tolerance = x * ppm / PPM;
        Range::new(x - tolerance, x + tolerance)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.lo && value < self.hi
    }

    /// True if the closed intervals intersect
    pub fn overlaps(&self, other: &Range) -> bool {
        self.lo <= other.hi && other.lo <= self.hi
    }

    pub fn extend(&mut self, value: f64) {
        self.lo = self.lo.min(value);
        self.hi = self.hi.max(value);
    }

    pub fn extend_range(&mut self, other: &Range) {
        self.lo = self.lo.min(other.lo);
        self.hi = self.hi.max(other.hi);
    }

    pub fn width(&self) -> f64 {
        self.hi - self.lo
    }

    pub fn center(&self) -> f64 {
        (self.lo + self.hi) / 2.0
    }
}
