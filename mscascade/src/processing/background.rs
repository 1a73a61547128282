use tracing::{debug, info, warn};

use crate::data::point::Point;
use crate::data::range::Range;
use crate::data::scan::{Scan, ScanContainer};
use crate::data::trace::{Trace, TraceBuilder, TraceIndex};
use crate::errors::{CascadeError, ConfigError};
use crate::params::{Parameter, ParameterMap};
use crate::task::Task;

/// Bump applied to duplicate average m/z keys within one reference slice
const KEY_EPSILON: f64 = 1e-8;

/// A sample run together with the blank run recorded under the same method
#[derive(Clone, Debug)]
pub struct ScanPair {
    pub sample: ScanContainer,
    pub background: ScanContainer,
}

/// Subtracts scaled blank signal from the MS1 scans of a sample run
#[derive(Clone, Debug)]
pub struct BackgroundSubtraction {
    pub time_window: f64,
    pub ppm: f64,
    pub scale_factor: f64,
}

impl BackgroundSubtraction {
    /// Reference traces of the blank run keyed by the time range they span
    pub fn reference_traces(&self, background: &ScanContainer) -> Vec<(Range, Trace)> {
        let mut builder = TraceBuilder::new(self.ppm);
        for scan in background.scans_at_level(1) {
            builder.add_scan(scan);
        }
        builder.finish_by_time()
    }

    /// Removes blank signal from one MS1 scan
    ///
    /// Each point is matched to the reference trace with the closest average m/z among the traces
    /// overlapping `rt ± time_window/2`. Points without a match inside the ppm window are kept
    /// as they are; matched points lose `max reference intensity * scale_factor` and are dropped
    /// unless the remainder is positive.
    pub fn subtract_scan(&self, scan: &Scan, reference: &[(Range, Trace)]) -> Scan {
        let rt = scan.retention_time;
        let window = Range::new(rt - self.time_window / 2.0, rt + self.time_window / 2.0);

        let mut slice = TraceIndex::new();
        for (position, (range, trace)) in reference.iter().enumerate() {
            if !window.overlaps(range) {
                continue;
            }
            let mut key = trace.avg();
            if slice.contains_key(key) {
                key += KEY_EPSILON;
            }
            slice.insert(key, position);
        }

        if slice.is_empty() {
            return scan.clone();
        }

        let data: Vec<Point> = scan
            .data
            .iter()
            .filter_map(|point| {
                let Some((key, position)) = slice.nearest(point.x) else {
                    return Some(*point);
                };
                if !Range::from_ppm(point.x, self.ppm).contains(key) {
                    return Some(*point);
                }
                let max_intensity = reference[position].1.max_intensity_within(&window);
                let remainder = point.y - max_intensity * self.scale_factor;
                (remainder > 0.0).then(|| Point::new(point.x, remainder))
            })
            .collect();

        scan.with_data(data)
    }
}

impl Task for BackgroundSubtraction {
    const NAME: &'static str = "background";

    type Input = ScanPair;
    type Output = ScanContainer;

    fn configure(params: &ParameterMap) -> Result<Self, ConfigError> {
        Ok(BackgroundSubtraction {
            time_window: params.get_f64(Self::NAME, Parameter::TimeWindow)?,
            ppm: params.get_f64(Self::NAME, Parameter::MzWindowPpm)?,
            scale_factor: params.get_f64(Self::NAME, Parameter::ScaleFactor)?,
        })
    }

    fn run(&self, input: &ScanPair) -> Result<ScanContainer, CascadeError> {
        let ScanPair { sample, background } = input;
        info!(sample = %sample.id, background = %background.id, "subtracting background");

        if sample.ms_levels() != background.ms_levels() {
            warn!(
                sample = ?sample.ms_levels(),
                background = ?background.ms_levels(),
                "sample and background runs differ in MS levels"
            );
        }

        let reference = self.reference_traces(background);
        debug!(traces = reference.len(), "reference traces built");

        let mut output = sample.derive(&Self::suffix());
        let mut points_in = 0;
        let mut points_out = 0;
        for scan in &sample.scans {
            if scan.ms_level == 1 {
                let processed = self.subtract_scan(scan, &reference);
                points_in += scan.data.len();
                points_out += processed.data.len();
                output.push(processed);
            } else {
                output.push(scan.clone());
            }
        }

        info!(points_in, points_out, "background subtraction finished");
        Ok(output)
    }
}
