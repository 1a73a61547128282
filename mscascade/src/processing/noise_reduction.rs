use tracing::info;

use crate::data::point::Point;
use crate::data::scan::ScanContainer;
use crate::data::trace::build_traces;
use crate::errors::{CascadeError, ConfigError};
use crate::params::{Parameter, ParameterMap};
use crate::task::Task;

/// Drops MS1 signal that does not persist over enough consecutive scans
#[derive(Clone, Debug)]
pub struct NoiseReduction {
    pub ppm: f64,
    pub min_trace_width: usize,
}

impl Task for NoiseReduction {
    const NAME: &'static str = "noise_reduction";

    type Input = ScanContainer;
    type Output = ScanContainer;

    fn configure(params: &ParameterMap) -> Result<Self, ConfigError> {
        Ok(NoiseReduction {
            ppm: params.get_f64(Self::NAME, Parameter::MzWindowPpm)?,
            min_trace_width: params.get_usize(Self::NAME, Parameter::MinTraceWidth)?,
        })
    }

    fn run(&self, input: &ScanContainer) -> Result<ScanContainer, CascadeError> {
        info!(container = %input.id, min_width = self.min_trace_width, "reducing noise");

        let ms1: Vec<_> = input.scans_at_level(1).collect();
        let traces = build_traces(ms1.iter().copied(), self.ppm);
        let total = traces.len();

        // trace points occupy consecutive MS1 scans starting at the trace's scan index
        let mut kept: Vec<Vec<Point>> = vec![Vec::new(); ms1.len()];
        let mut retained = 0;
        for trace in traces.iter().filter(|t| t.len() >= self.min_trace_width) {
            retained += 1;
            for (offset, point) in trace.data().iter().enumerate() {
                kept[trace.scan_index + offset].push(point.mass_point());
            }
        }

        let mut output = input.derive(&Self::suffix());
        let mut kept = kept.into_iter();
        for scan in &input.scans {
            if scan.ms_level == 1 {
                output.push(scan.with_data(kept.next().unwrap_or_default()));
            } else {
                output.push(scan.clone());
            }
        }

        info!(traces = total, retained, "noise reduction finished");
        Ok(output)
    }
}
