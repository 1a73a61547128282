use nalgebra::{Matrix3, Vector3};

use crate::data::point::Point;

/// A straight line `y = slope * x + intercept`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinearEquation {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearEquation {
    pub fn new(slope: f64, intercept: f64) -> Self {
        LinearEquation { slope, intercept }
    }

    /// Line through two points; a vertical pair yields the horizontal line through their mean
    pub fn through(a: Point, b: Point) -> Self {
        let dx = b.x - a.x;
        if dx == 0.0 {
            return LinearEquation::new(0.0, (a.y + b.y) / 2.0);
        }
        let slope = (b.y - a.y) / dx;
        LinearEquation::new(slope, a.y - slope * a.x)
    }

    pub fn y(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Ordinary least squares line through a set of points
///
/// # Arguments
///
/// * `points` - the points to fit
///
/// # Returns
///
/// * `LinearEquation` - the fitted line, horizontal through the mean y if all x are equal,
///   the zero line if `points` is empty
pub fn least_squares(points: &[Point]) -> LinearEquation {
    if points.is_empty() {
        return LinearEquation::new(0.0, 0.0);
    }
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.x).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.y).sum::<f64>() / n;

    let (sxy, sxx) = points.iter().fold((0.0, 0.0), |(sxy, sxx), p| {
        let dx = p.x - mean_x;
        (sxy + dx * (p.y - mean_y), sxx + dx * dx)
    });

    if sxx == 0.0 {
        return LinearEquation::new(0.0, mean_y);
    }
    let slope = sxy / sxx;
    LinearEquation::new(slope, mean_y - slope * mean_x)
}

/// A parabola `y = a*x^2 + b*x + c`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuadraticEquation {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl QuadraticEquation {
    /// Parabola through three points; degenerate abscissae give the zero parabola
    pub fn through(p1: Point, p2: Point, p3: Point) -> Self {
        if p1.x == p2.x || p2.x == p3.x || p1.x == p3.x {
            return QuadraticEquation { a: 0.0, b: 0.0, c: 0.0 };
        }
        let m = Matrix3::new(
            p1.x * p1.x, p1.x, 1.0,
            p2.x * p2.x, p2.x, 1.0,
            p3.x * p3.x, p3.x, 1.0,
        );
        let rhs = Vector3::new(p1.y, p2.y, p3.y);
        match m.lu().solve(&rhs) {
            Some(s) if s.iter().all(|v| v.is_finite()) => QuadraticEquation { a: s[0], b: s[1], c: s[2] },
            _ => QuadraticEquation { a: 0.0, b: 0.0, c: 0.0 },
        }
    }

    pub fn y(&self, x: f64) -> f64 {
        self.a * x * x + self.b * x + self.c
    }

    /// Vertex of the parabola, `None` for a straight line
    pub fn vertex(&self) -> Option<Point> {
        if self.a == 0.0 {
            return None;
        }
        let x = -self.b / (2.0 * self.a);
        let vertex = Point::new(x, self.y(x));
        (vertex.x.is_finite() && vertex.y.is_finite()).then_some(vertex)
    }
}

/// Apex of the parabola through three neighbouring points
///
/// Falls back to `None` when the points are collinear or the vertex leaves the span `[p1.x, p3.x]`.
pub fn parabola_apex(p1: Point, p2: Point, p3: Point) -> Option<Point> {
    let vertex = QuadraticEquation::through(p1, p2, p3).vertex()?;
    (vertex.x >= p1.x.min(p3.x) && vertex.x <= p1.x.max(p3.x)).then_some(vertex)
}

/// Median of an ascending slice, taking the upper middle element for even lengths
pub fn median_sorted(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values[values.len() / 2]
}

/// Quantile of an ascending slice as the mean of the two ranks around `(n-1)*q`
///
/// # Arguments
///
/// * `values` - sorted values
/// * `q` - quantile, clamped to `[0, 1]`
///
/// # Examples
///
/// ```
/// use mscascade::algorithm::math::quantile_sorted;
/// let values = vec![1.0, 2.0, 3.0, 4.0];
/// assert!((quantile_sorted(&values, 0.5) - 2.5).abs() < 1e-12);
/// ```
pub fn quantile_sorted(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let q = q.clamp(0.0, 1.0);
    let rank = (values.len() - 1) as f64 * q;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    (values[lower] + values[upper]) / 2.0
}

/// Trapezoidal integral over points ordered by x
pub fn trapezoid(points: &[Point]) -> f64 {
    points
        .windows(2)
        .map(|w| (w[1].x - w[0].x) * (w[0].y + w[1].y) / 2.0)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_through() {
        let line = LinearEquation::through(Point::new(0.0, 1.0), Point::new(2.0, 5.0));
        assert!((line.slope - 2.0).abs() < 1e-12);
        assert!((line.y(1.0) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_least_squares() {
        let points: Vec<Point> = (0..5).map(|i| Point::new(i as f64, 3.0 * i as f64 - 1.0)).collect();
        let line = least_squares(&points);
        assert!((line.slope - 3.0).abs() < 1e-9);
        assert!((line.intercept + 1.0).abs() < 1e-9);

        let vertical = least_squares(&[Point::new(1.0, 2.0), Point::new(1.0, 4.0)]);
        assert_eq!(vertical, LinearEquation::new(0.0, 3.0));
    }

    #[test]
    fn test_parabola_apex() {
        // y = -(x - 2)^2 + 4
        let apex = parabola_apex(Point::new(1.0, 3.0), Point::new(2.0, 4.0), Point::new(3.0, 3.0)).unwrap();
        assert!((apex.x - 2.0).abs() < 1e-9);
        assert!((apex.y - 4.0).abs() < 1e-9);

        let shifted = parabola_apex(Point::new(1.0, 2.0), Point::new(2.0, 4.0), Point::new(3.0, 3.0)).unwrap();
        assert!(shifted.x > 2.0 && shifted.x < 2.5);

        assert!(parabola_apex(Point::new(1.0, 1.0), Point::new(2.0, 2.0), Point::new(3.0, 3.0)).is_none());
    }

    #[test]
    fn test_quadratic_degenerate() {
        let q = QuadraticEquation::through(Point::new(1.0, 1.0), Point::new(1.0, 2.0), Point::new(3.0, 3.0));
        assert_eq!(q, QuadraticEquation { a: 0.0, b: 0.0, c: 0.0 });
    }

    #[test]
    fn test_median_and_quantile() {
        assert_eq!(median_sorted(&[1.0, 2.0, 3.0, 4.0]), 3.0);
        assert_eq!(median_sorted(&[1.0, 2.0, 3.0]), 2.0);
        assert_eq!(quantile_sorted(&[1.0, 2.0, 3.0], 1.5), 3.0);
        assert_eq!(quantile_sorted(&[1.0, 2.0, 3.0], 0.0), 1.0);
    }

    #[test]
    fn test_trapezoid() {
        let points = vec![Point::new(0.0, 0.0), Point::new(1.0, 2.0), Point::new(3.0, 0.0)];
        assert!((trapezoid(&points) - 3.0).abs() < 1e-12);
    }
}
