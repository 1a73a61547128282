use tracing::{debug, info};

use crate::algorithm::math::quantile_sorted;
use crate::algorithm::savitzky_golay::{second_derivative, MAX_LEVEL};
use crate::chemistry::constants::MIN_ABUNDANCE;
use crate::data::container::FeatureContainer;
use crate::data::feature::Feature;
use crate::data::point::Triple;
use crate::deconvolution::deconvolver::{deconvolve_container, Deconvolution};
use crate::errors::{CascadeError, ConfigError};
use crate::params::{Parameter, ParameterMap};
use crate::task::Task;

/// Minimum descent angle, in radians, for moving a region boundary toward a valley
const DESCENT_ANGLE: f64 = -2.0 * std::f64::consts::PI / 180.0;

/// Second-derivative zero-crossing deconvolution
///
/// The feature's chromatogram is padded by `sg_level` points per side and differentiated twice
/// with a Savitzky-Golay filter. Peak regions are read off the zero crossings of the derivative,
/// mapped back to the unpadded data and widened to the nearest valleys.
#[derive(Clone, Debug)]
pub struct SavitzkyGolayDeconvolution {
    /// minimum number of points of a resolved peak
    pub scan_window: usize,
    /// minimum apex height over the lowest positive point of a resolved peak
    /// (`Feature::dif_intensity`), the lowest point is subtracted once
    pub min_feature_intensity: f64,
    /// quantile of the absolute derivative a region must exceed
    pub derivative_threshold: f64,
    pub sg_level: usize,
}

/// State of the zero-crossing automaton over the derivative
struct PeakSearch {
    active_first: bool,
    active_second: bool,
    pass_threshold: bool,
    cross_zero: u32,
    current_start: usize,
    next_start: usize,
    current_end: usize,
    previous: Option<(usize, usize)>,
}

impl PeakSearch {
    fn new(n: usize) -> Self {
        PeakSearch {
            active_first: false,
            active_second: false,
            pass_threshold: false,
            cross_zero: 0,
            current_start: n,
            next_start: n,
            current_end: 0,
            previous: None,
        }
    }
}

impl SavitzkyGolayDeconvolution {
    /// Index regions `[start, end)` of resolved peaks in the feature's data
    fn peak_regions(&self, data: &[Triple], derivative: &[f64], threshold: f64) -> Vec<(usize, usize)> {
        let n = derivative.len();
        let mut state = PeakSearch::new(n);
        let mut regions = Vec::new();

        for i in 1..n {
            let (before, current) = (derivative[i - 1], derivative[i]);

            if (before < 0.0 && current > 0.0) || (before > 0.0 && current < 0.0) {
                if before < 0.0 && current > 0.0 && state.cross_zero == 2 {
                    // a rising crossing after the apex opens an overlapping peak
                    if state.pass_threshold {
                        state.active_second = true;
                        state.next_start = i;
                    } else {
                        state.current_start = i;
                        state.cross_zero = 0;
                        state.active_first = true;
                    }
                }
                if state.cross_zero == 3 {
                    state.active_first = false;
                    state.current_end = i;
                }
                state.pass_threshold = false;
                if state.active_first || state.active_second {
                    state.cross_zero += 1;
                }
            }

            if current.abs() > threshold {
                state.pass_threshold = true;
            }

            if state.cross_zero == 0 && current > 0.0 && !state.active_first {
                state.active_first = true;
                state.current_start = i;
                state.cross_zero += 1;
            }

            if before == 0.0 && current == 0.0 && state.active_first {
                state.current_end = if state.cross_zero < 3 { 0 } else { i };
                state.active_first = false;
                state.active_second = false;
                state.cross_zero = 0;
            }

            let offset = self.sg_level as isize - 1;
            let cor_start = state.current_start as isize - offset;
            let cor_end = state.current_end as isize - offset;
            if cor_end - cor_start <= 0 || state.active_first {
                continue;
            }

            let (start, end) = widen(data, cor_start, cor_end);
            if end <= start || state.previous == Some((start, end)) {
                continue;
            }
            state.previous = Some((start, end));
            regions.push((start, end));

            if state.active_second {
                state.active_second = false;
                state.active_first = true;
                state.cross_zero = if current > 0.0 { 1 } else { 2 };
                state.current_start = state.next_start;
            } else {
                state.cross_zero = 0;
                state.current_start = n;
            }
            state.pass_threshold = false;
            state.next_start = n;
            state.current_end = 0;
        }
        regions
    }
}

/// Moves both region boundaries into the neighbouring intensity valleys
fn widen(data: &[Triple], start: isize, end: isize) -> (usize, usize) {
    let last = data.len() - 1;

    let mut start = (start.max(0) as usize).min(last - 1);
    if data[start].intensity > data[start + 1].intensity {
        while descends_forward(data, start) {
            start += 1;
        }
    } else {
        while descends_backward(data, start) {
            start -= 1;
        }
    }

    let mut end = (end.max(1) as usize).min(last);
    if data[end].intensity > data[end - 1].intensity {
        while descends_backward(data, end) {
            end -= 1;
        }
    } else {
        while descends_forward(data, end) {
            end += 1;
        }
    }
    (start, end)
}

fn descends_forward(data: &[Triple], index: usize) -> bool {
    index + 1 < data.len()
        && (data[index + 1].intensity - data[index].intensity).atan2(data[index + 1].rt - data[index].rt) <= DESCENT_ANGLE
}

fn descends_backward(data: &[Triple], index: usize) -> bool {
    index >= 1
        && (data[index - 1].intensity - data[index].intensity).atan2(data[index].rt - data[index - 1].rt) <= DESCENT_ANGLE
}

/// Copies `[start, end)` into a new feature framed by zero-intensity anchors
fn region_feature(id: usize, data: &[Triple], start: usize, end: usize) -> Feature {
    let mut feature = if data[start].intensity == MIN_ABUNDANCE {
        Feature::new(id, data[start])
    } else {
        let before = data[start.saturating_sub(1)].rt;
        let mut feature = Feature::new(id, Triple::new(before, data[start].mz, MIN_ABUNDANCE));
        feature.push_point(data[start]);
        feature
    };
    for point in &data[start + 1..end] {
        feature.push_point(*point);
    }
    if data[end - 1].intensity == MIN_ABUNDANCE {
        feature.close();
    } else {
        feature.close_at(data[end].rt);
    }
    feature
}

impl Deconvolution for SavitzkyGolayDeconvolution {
    fn deconvolve(&self, feature: &Feature, next_id: &mut usize) -> Vec<Feature> {
        if feature.len() < 2 {
            return Vec::new();
        }
        let padded = feature.padded_trace(self.sg_level);
        let max = padded.iter().map(|p| p.y).fold(0.0, f64::max);
        let avg = padded.iter().map(|p| p.y).sum::<f64>() / padded.len() as f64;
        if avg > max / 2.0 {
            debug!(feature = feature.id(), "feature rejected as noise");
            return Vec::new();
        }

        let values: Vec<f64> = padded.iter().map(|p| p.y).collect();
        let derivative = second_derivative(&values, self.sg_level);
        let mut magnitudes: Vec<f64> = derivative.iter().map(|d| d.abs()).collect();
        magnitudes.sort_by(f64::total_cmp);
        let threshold = quantile_sorted(&magnitudes, self.derivative_threshold);

        let data = feature.data();
        let mut peaks = Vec::new();
        for (start, end) in self.peak_regions(data, &derivative, threshold) {
            let peak = region_feature(*next_id, data, start, end);
            if peak.len() >= self.scan_window && peak.dif_intensity() >= self.min_feature_intensity {
                *next_id += 1;
                peaks.push(peak);
            } else {
                debug!(start, end, "resolved peak filtered out");
            }
        }
        peaks
    }
}

impl Task for SavitzkyGolayDeconvolution {
    const NAME: &'static str = "savitzky_golay";

    type Input = FeatureContainer;
    type Output = FeatureContainer;

    fn configure(params: &ParameterMap) -> Result<Self, ConfigError> {
        Ok(SavitzkyGolayDeconvolution {
            scan_window: params.get_usize(Self::NAME, Parameter::ScanWindow)?,
            min_feature_intensity: params.get_f64(Self::NAME, Parameter::MinFeatureIntensity)?,
            derivative_threshold: params.get_f64(Self::NAME, Parameter::DerivativeThreshold)?,
            sg_level: params.get_usize_or(Self::NAME, Parameter::SgLevel, MAX_LEVEL)?,
        })
    }

    fn run(&self, input: &FeatureContainer) -> Result<FeatureContainer, CascadeError> {
        info!(container = %input.id, level = self.sg_level, "Savitzky-Golay deconvolution");
        Ok(deconvolve_container(self, input, &Self::suffix()))
    }
}
