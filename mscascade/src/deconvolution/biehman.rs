use std::collections::BTreeMap;

use ordered_float::OrderedFloat;
use tracing::{debug, info};

use crate::algorithm::math::{least_squares, LinearEquation, QuadraticEquation};
use crate::algorithm::noise::noise_estimate;
use crate::chemistry::constants::MIN_ABUNDANCE;
use crate::data::container::FeatureContainer;
use crate::data::feature::Feature;
use crate::data::point::{Point, Triple};
use crate::deconvolution::deconvolver::{deconvolve_container, Deconvolution};
use crate::errors::{CascadeError, ConfigError};
use crate::params::{Parameter, ParameterMap};
use crate::task::Task;

/// Features with fewer points are not deconvoluted
pub const MIN_SIZE: usize = 5;

/// Peak height over the refined background, in units of `noise * sqrt(max)`, needed to accept
pub const DEFAULT_NOISE_FACTOR: f64 = 4.0;

/// Fraction of the window maximum below which a boundary is terminal
const MIN_PERCENT: f64 = 0.01;

/// Window around the most intense point of an index range
///
/// The walk away from the maximum stops at the first point under 1% of the maximum (terminal
/// boundary) or just before a point rising above `noise * sqrt(running minimum)` (shoulder of a
/// neighbouring peak). The running minimum of each side is tracked as the side's minimum point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BiehmanWindow {
    pub max_index: usize,
    pub left_boundary: usize,
    pub right_boundary: usize,
    pub left_min_index: usize,
    pub right_min_index: usize,
}

impl BiehmanWindow {
    /// Estimates the window inside `[left, right]`
    ///
    /// # Arguments
    ///
    /// * `trace` - (retention time, intensity) points
    /// * `left`, `right` - inclusive index bounds of the search
    /// * `reach` - maximum number of points walked on either side, 0 for unlimited
    /// * `noise` - shoulder threshold factor
    pub fn new(trace: &[Point], left: usize, right: usize, reach: usize, noise: f64) -> Self {
        let mut max_index = left;
        for i in left..=right {
            if trace[max_index].y < trace[i].y {
                max_index = i;
            }
        }
        let threshold = trace[max_index].y * MIN_PERCENT;

        let right_end = if reach > 0 { right.min(max_index + reach) } else { right };
        let left_end = if reach > 0 { left.max(max_index.saturating_sub(reach)) } else { left };

        let (right_boundary, right_min_index) =
            walk(trace, max_index, (max_index + 1..=right_end).collect(), threshold, noise);
        let (left_boundary, left_min_index) =
            walk(trace, max_index, (left_end..max_index).rev().collect(), threshold, noise);

        BiehmanWindow { max_index, left_boundary, right_boundary, left_min_index, right_min_index }
    }
}

/// One side of the window walk, returns (boundary, minimum index)
fn walk(trace: &[Point], start: usize, steps: Vec<usize>, threshold: f64, noise: f64) -> (usize, usize) {
    let mut boundary = start;
    let mut min_index = start;
    let mut previous = start;

    for i in steps {
        let current = trace[i].y;
        if current < threshold {
            return (i, i);
        } else if current < trace[min_index].y {
            min_index = i;
        } else if current > noise * trace[min_index].y.sqrt() {
            return (previous, min_index);
        }
        boundary = i;
        previous = i;
    }
    (boundary, min_index)
}

/// Recursive windowed-maximum deconvolution
///
/// Splits a feature's chromatogram into peaks: the most intense point of a range is accepted as
/// a peak when it rises far enough above a robust linear background, then the ranges beyond the
/// peak's boundaries are searched in turn.
#[derive(Clone, Debug)]
pub struct BiehmanDeconvolution {
    /// `scan_window / 2`, limits the window walk; 0 walks to the range ends
    pub half_window: usize,
    /// shift points onto the parabola-corrected apex time
    pub center: bool,
    pub noise_factor: f64,
}

struct Context<'a> {
    source: &'a Feature,
    trace: Vec<Point>,
    noise: f64,
    /// accepted peaks with their (left, right) boundary indices
    peaks: Vec<(usize, usize, Feature)>,
}

impl BiehmanDeconvolution {
    fn is_noise(trace: &[Point]) -> bool {
        let max = trace.iter().map(|p| p.y).fold(0.0, f64::max);
        let avg = trace.iter().map(|p| p.y).sum::<f64>() / trace.len() as f64;
        max <= 0.0 || avg > max / 2.0
    }

    fn perceive_all(&self, ctx: &mut Context, left: usize, right: usize, parent_boundary: Option<usize>, depth: usize) {
        let last = ctx.trace.len() - 1;
        if left > right || depth > ctx.trace.len() {
            return;
        }

        let window = BiehmanWindow::new(&ctx.trace, left, right, self.half_window, ctx.noise * self.noise_factor);
        let lb = window.left_boundary;
        let rb = window.right_boundary;
        let max_point = ctx.trace[window.max_index];

        let background = LinearEquation::through(ctx.trace[window.left_min_index], ctx.trace[window.right_min_index]);
        let mut deviations: Vec<(usize, f64)> = (lb..=rb)
            .map(|i| (i, (ctx.trace[i].y - background.y(ctx.trace[i].x)).abs()))
            .collect();
        deviations.sort_by(|a, b| a.1.total_cmp(&b.1));
        let keep = (deviations.len() / 2 + 1).min(deviations.len());
        let lower_half: Vec<Point> = deviations[..keep].iter().map(|(i, _)| ctx.trace[*i]).collect();
        let refined = least_squares(&lower_half);

        let height = max_point.y - refined.y(max_point.x);
        if height >= self.noise_factor * ctx.noise * max_point.y.sqrt() {
            let before = ctx.trace[window.max_index.saturating_sub(1)];
            let after = ctx.trace[(window.max_index + 1).min(last)];
            let apex = QuadraticEquation::through(before, max_point, after).vertex().unwrap_or(max_point);

            let peak = if self.center {
                centered_feature(0, ctx.source, &ctx.trace, apex, &window)
            } else {
                framed_feature(0, ctx.source, lb, rb)
            };
            ctx.peaks.push((lb, rb, peak));
        }

        if right == last && right != rb && Some(rb) != parent_boundary {
            self.perceive_all(ctx, rb, last, Some(rb), depth + 1);
        }
        if left == 0 && left != lb && Some(lb) != parent_boundary {
            self.perceive_all(ctx, 0, lb, Some(lb), depth + 1);
        }
    }
}

/// Copies `[lb, rb]` of the source into a new feature framed by zero-intensity anchors
fn framed_feature(id: usize, source: &Feature, lb: usize, rb: usize) -> Feature {
    let data = source.data();
    let last = data.len() - 1;

    let mut feature = if data[lb].intensity != MIN_ABUNDANCE {
        let before = data[lb.saturating_sub(1)];
        let mut feature = Feature::new(id, Triple::new(before.rt, before.mz, MIN_ABUNDANCE));
        feature.push_point(data[lb]);
        feature
    } else {
        Feature::new(id, Triple::new(data[lb].rt, data[lb].mz, MIN_ABUNDANCE))
    };

    for point in &data[lb + 1..=rb] {
        feature.push_point(*point);
    }

    if data[rb].intensity != MIN_ABUNDANCE {
        feature.close_at(data[(rb + 1).min(last)].rt);
    } else {
        feature.close();
    }
    feature
}

/// Shifted (retention time, intensity) points ordered by time, with their m/z
struct ShiftedPoints {
    points: BTreeMap<(OrderedFloat<f64>, OrderedFloat<f64>), f64>,
}

impl ShiftedPoints {
    fn new() -> Self {
        ShiftedPoints { points: BTreeMap::new() }
    }

    /// Inserts a point, negative intensities are clamped to zero
    fn put(&mut self, point: Point, mz: f64) {
        let y = point.y.max(MIN_ABUNDANCE);
        self.points.insert((OrderedFloat(point.x), OrderedFloat(y)), mz);
    }

    fn first(&self, fallback: Point) -> Point {
        self.points.keys().next().map_or(fallback, |(x, y)| Point::new(x.into_inner(), y.into_inner()))
    }

    fn last(&self, fallback: Point) -> Point {
        self.points.keys().next_back().map_or(fallback, |(x, y)| Point::new(x.into_inner(), y.into_inner()))
    }
}

/// Rebuilds the window with every point shifted by the offset between apex and maximum
///
/// Shifted intensities are read from parabolas through each point, its outer neighbour and the
/// last point placed, so the peak keeps its shape around the corrected apex.
fn centered_feature(id: usize, source: &Feature, trace: &[Point], apex: Point, window: &BiehmanWindow) -> Feature {
    let data = source.data();
    let last = data.len() - 1;
    let shift = apex.x - trace[window.max_index].x;

    let mut shifted = ShiftedPoints::new();
    shifted.put(apex, data[window.max_index].mz);

    // toward the left boundary
    for i in (window.left_boundary..window.max_index).rev() {
        let outer = i.saturating_sub(1);
        let mz = data[i].mz;
        if i == window.left_boundary {
            if trace[i].y == MIN_ABUNDANCE {
                shifted.put(Point::new(trace[i].x + shift, MIN_ABUNDANCE), mz);
            } else if outer == i {
                // trace edge, no outer neighbour to anchor a parabola
                shifted.put(Point::new(trace[i].x + shift, trace[i].y), mz);
            } else {
                let zero = Point::new(trace[outer].x, MIN_ABUNDANCE);
                let point = QuadraticEquation::through(zero, trace[i], shifted.first(apex));
                let x = trace[i].x + shift;
                let y = point.y(x);
                shifted.put(Point::new(x, y), mz);
                if y > MIN_ABUNDANCE {
                    shifted.put(Point::new(trace[outer].x + shift, MIN_ABUNDANCE), mz);
                }
            }
            break;
        }
        let parabola = QuadraticEquation::through(trace[outer], trace[i], shifted.first(apex));
        let x = trace[i].x + shift;
        shifted.put(Point::new(x, parabola.y(x)), mz);
    }

    // toward the right boundary
    for i in window.max_index + 1..=window.right_boundary {
        let outer = (i + 1).min(last);
        let mz = data[i].mz;
        if i == window.right_boundary {
            if trace[i].y == MIN_ABUNDANCE {
                shifted.put(Point::new(trace[i].x + shift, MIN_ABUNDANCE), mz);
            } else if outer == i {
                // trace edge, no outer neighbour to anchor a parabola
                shifted.put(Point::new(trace[i].x + shift, trace[i].y), mz);
            } else {
                let zero = Point::new(trace[outer].x, MIN_ABUNDANCE);
                let point = QuadraticEquation::through(zero, trace[i], shifted.last(apex));
                let x = trace[i].x + shift;
                let y = point.y(x);
                shifted.put(Point::new(x, y), mz);
                if y > MIN_ABUNDANCE {
                    shifted.put(Point::new(trace[outer].x + shift, MIN_ABUNDANCE), mz);
                }
            }
            break;
        }
        let parabola = QuadraticEquation::through(trace[outer], trace[i], shifted.last(apex));
        let x = trace[i].x + shift;
        shifted.put(Point::new(x, parabola.y(x)), mz);
    }

    let mut points = shifted.points.into_iter().map(|((x, y), mz)| Triple::new(x.into_inner(), mz, y.into_inner()));
    let first = points.next().unwrap_or(Triple::new(apex.x, data[window.max_index].mz, apex.y));
    let mut feature = Feature::new(id, first);
    for point in points {
        feature.push_point(point);
    }
    feature.close();
    feature
}

impl Deconvolution for BiehmanDeconvolution {
    fn deconvolve(&self, feature: &Feature, next_id: &mut usize) -> Vec<Feature> {
        if feature.len() < MIN_SIZE {
            debug!(feature = feature.id(), "feature too short for deconvolution");
            return Vec::new();
        }
        let trace = feature.trace();
        if Self::is_noise(&trace) {
            debug!(feature = feature.id(), "feature rejected as noise");
            return Vec::new();
        }

        let intensities: Vec<f64> = trace.iter().map(|p| p.y).collect();
        let mut ctx = Context { source: feature, noise: noise_estimate(&intensities), trace, peaks: Vec::new() };
        let last = ctx.trace.len() - 1;
        self.perceive_all(&mut ctx, 0, last, None, 0);

        // recursion visits the tallest peak first; ids follow retention time order
        ctx.peaks.sort_by_key(|(lb, rb, _)| (*lb, *rb));
        ctx.peaks
            .into_iter()
            .map(|(_, _, mut peak)| {
                peak.set_id(*next_id);
                *next_id += 1;
                peak
            })
            .collect()
    }
}

impl Task for BiehmanDeconvolution {
    const NAME: &'static str = "biehman";

    type Input = FeatureContainer;
    type Output = FeatureContainer;

    fn configure(params: &ParameterMap) -> Result<Self, ConfigError> {
        Ok(BiehmanDeconvolution {
            half_window: params.get_usize(Self::NAME, Parameter::ScanWindow)? / 2,
            center: params.get_bool(Self::NAME, Parameter::Center)?,
            noise_factor: params.get_f64_or(Self::NAME, Parameter::NoiseFactor, DEFAULT_NOISE_FACTOR)?,
        })
    }

    fn run(&self, input: &FeatureContainer) -> Result<FeatureContainer, CascadeError> {
        info!(container = %input.id, center = self.center, "Biehman deconvolution");
        Ok(deconvolve_container(self, input, &Self::suffix()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gaussian(x: f64, center: f64, sigma: f64) -> f64 {
        (-((x - center) / sigma).powi(2) / 2.0).exp()
    }

    fn double_peak() -> Feature {
        let data = (0..31)
            .map(|i| {
                let x = i as f64;
                let y = if i == 0 || i == 30 {
                    0.0
                } else {
                    1000.0 * gaussian(x, 10.0, 1.5) + 800.0 * gaussian(x, 20.0, 1.5)
                };
                Triple::new(x, 150.0, y)
            })
            .collect();
        Feature::from_triples(1, data).unwrap()
    }

    fn method(center: bool) -> BiehmanDeconvolution {
        BiehmanDeconvolution { half_window: 0, center, noise_factor: 3.0 }
    }

    #[test]
    fn test_window_stops_below_one_percent() {
        let trace = double_peak().trace();
        let window = BiehmanWindow::new(&trace, 0, trace.len() - 1, 0, 0.0);
        assert_eq!(window.max_index, 10);
        assert_eq!(window.left_boundary, 5);
        assert_eq!(window.right_boundary, 15);
    }

    #[test]
    fn test_overlapping_peaks_are_split() {
        let mut next_id = 1;
        let peaks = method(false).deconvolve(&double_peak(), &mut next_id);
        assert_eq!(peaks.len(), 2);
        assert_eq!(next_id, 3);
        assert_eq!(peaks[0].id(), 1);
        assert_eq!(peaks[1].id(), 2);
        assert!((peaks[0].retention_time() - 10.0).abs() < 0.1);
        assert!((peaks[1].retention_time() - 20.0).abs() < 0.1);

        // boundaries touch but never overlap
        let first = peaks[0].interior();
        let second = peaks[1].interior();
        assert_eq!(first.first().unwrap().rt, 5.0);
        assert_eq!(first.last().unwrap().rt, 15.0);
        assert_eq!(second.first().unwrap().rt, 15.0);
        assert_eq!(second.last().unwrap().rt, 25.0);
        assert!(peaks.iter().all(|p| p.data()[0].intensity == 0.0 && p.is_closed()));
    }

    #[test]
    fn test_peaks_follow_retention_time() {
        let data = (0..41)
            .map(|i| {
                let x = i as f64;
                let y = if i == 0 || i == 40 {
                    0.0
                } else {
                    800.0 * gaussian(x, 10.0, 1.5) + 1000.0 * gaussian(x, 20.0, 1.5) + 700.0 * gaussian(x, 30.0, 1.5)
                };
                Triple::new(x, 150.0, y)
            })
            .collect();
        let source = Feature::from_triples(1, data).unwrap();
        let method = BiehmanDeconvolution { half_window: 2, center: false, noise_factor: 3.0 };

        let mut next_id = 7;
        let peaks = method.deconvolve(&source, &mut next_id);
        assert_eq!(peaks.len(), 3);
        assert_eq!(next_id, 10);
        assert_eq!(peaks.iter().map(|p| p.id()).collect::<Vec<_>>(), vec![7, 8, 9]);

        let apexes: Vec<f64> = peaks.iter().map(|p| p.retention_time()).collect();
        assert!(apexes.windows(2).all(|w| w[0] < w[1]));
        for (peak, expected) in peaks.iter().zip([10.0, 20.0, 30.0]) {
            assert!((peak.retention_time() - expected).abs() < 0.1);
        }
        for pair in peaks.windows(2) {
            assert!(pair[0].interior().last().unwrap().rt <= pair[1].interior().first().unwrap().rt);
        }
    }

    #[test]
    fn test_centered_peaks_keep_apex() {
        let mut next_id = 1;
        let peaks = method(true).deconvolve(&double_peak(), &mut next_id);
        assert_eq!(peaks.len(), 2);
        assert!((peaks[0].retention_time() - 10.0).abs() < 0.1);
        assert!(peaks.iter().all(|p| p.is_closed() && p.len() >= 3));
        assert!(peaks.iter().flat_map(|p| p.data()).all(|p| p.intensity >= 0.0));
    }

    #[test]
    fn test_centering_keeps_trace_edges() {
        let source = Feature::from_triples(
            1,
            [300.0, 600.0, 1000.0, 600.0, 300.0, 50.0, 5.0]
                .iter()
                .enumerate()
                .map(|(i, &y)| Triple::new(i as f64, 150.0, y))
                .collect(),
        )
        .unwrap();
        let method = BiehmanDeconvolution { half_window: 0, center: true, noise_factor: 2.0 };

        let mut next_id = 1;
        let peaks = method.deconvolve(&source, &mut next_id);
        assert_eq!(peaks.len(), 1);
        let data = peaks[0].data();
        assert_eq!(data.len(), 7);
        assert!(data[0].rt.abs() < 1e-6 && (data[0].intensity - 300.0).abs() < 1e-9);
        assert!((data[6].rt - 6.0).abs() < 1e-6 && (data[6].intensity - 5.0).abs() < 1e-9);
        assert!((peaks[0].retention_time() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_short_and_flat_features_are_skipped() {
        let mut next_id = 1;
        let short = Feature::from_triples(
            1,
            (0..4).map(|i| Triple::new(i as f64, 100.0, 10.0 * i as f64)).collect(),
        )
        .unwrap();
        assert!(method(false).deconvolve(&short, &mut next_id).is_empty());

        let flat = Feature::from_triples(
            2,
            (0..20).map(|i| Triple::new(i as f64, 100.0, 100.0 + (i % 2) as f64)).collect(),
        )
        .unwrap();
        assert!(method(false).deconvolve(&flat, &mut next_id).is_empty());
        assert_eq!(next_id, 1);
    }
}
