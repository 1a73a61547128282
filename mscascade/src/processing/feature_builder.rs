use tracing::{debug, info};

use crate::chemistry::constants::MIN_ABUNDANCE;
use crate::data::container::FeatureContainer;
use crate::data::feature::Feature;
use crate::data::point::Triple;
use crate::data::scan::ScanContainer;
use crate::data::trace::build_traces;
use crate::errors::{CascadeError, ConfigError};
use crate::params::{Parameter, ParameterMap};
use crate::task::Task;

/// Turns the mass traces of a run into closed features
///
/// Each trace is framed by zero-intensity anchors at the retention time of the scan before it
/// started and of the scan at which it stopped.
#[derive(Clone, Debug)]
pub struct FeatureBuilder {
    pub ppm: f64,
    pub min_trace_width: usize,
    pub min_intensity: f64,
}

impl Task for FeatureBuilder {
    const NAME: &'static str = "feature_builder";

    type Input = ScanContainer;
    type Output = FeatureContainer;

    fn configure(params: &ParameterMap) -> Result<Self, ConfigError> {
        Ok(FeatureBuilder {
            ppm: params.get_f64(Self::NAME, Parameter::MzWindowPpm)?,
            min_trace_width: params.get_usize(Self::NAME, Parameter::MinTraceWidth)?,
            min_intensity: params.get_f64(Self::NAME, Parameter::MinProfileIntensity)?,
        })
    }

    fn run(&self, input: &ScanContainer) -> Result<FeatureContainer, CascadeError> {
        info!(container = %input.id, "building features");

        let ms1: Vec<_> = input.scans_at_level(1).collect();
        let (Some(first), Some(last)) = (ms1.first(), ms1.last()) else {
            return Ok(FeatureContainer::new(format!("{}{}", input.id, Self::suffix()), input.ion_mode));
        };
        let opening_rt = (first.retention_time - 1.0).max(0.0);
        let closing_rt = last.retention_time + 1.0;

        let traces = build_traces(ms1.iter().copied(), self.ppm);
        let total = traces.len();

        let mut output = FeatureContainer::new(format!("{}{}", input.id, Self::suffix()), input.ion_mode);
        let mut next_id = 1;
        for trace in traces.into_iter().filter(|t| t.len() >= self.min_trace_width) {
            let lead_rt = trace.lead_rt.unwrap_or(opening_rt);
            let tail_rt = trace.tail_rt.unwrap_or(closing_rt);
            let anchor_mz = trace.anchor;

            let mut feature = Feature::new(next_id, Triple::new(lead_rt, anchor_mz, MIN_ABUNDANCE));
            for point in trace.into_data() {
                feature.push_point(point);
            }
            feature.close_at(tail_rt);

            if feature.intensity() >= self.min_intensity {
                output.push(feature);
                next_id += 1;
            } else {
                debug!(mz = anchor_mz, "feature below intensity threshold");
            }
        }

        info!(traces = total, features = output.len(), "feature building finished");
        Ok(output)
    }
}
