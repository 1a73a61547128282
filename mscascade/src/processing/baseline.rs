use tracing::{debug, info};

use crate::algorithm::morphology::opening;
use crate::chemistry::constants::BASE_INTENSITY;
use crate::data::container::FeatureContainer;
use crate::data::feature::Feature;
use crate::data::point::Triple;
use crate::errors::{CascadeError, ConfigError};
use crate::params::{Parameter, ParameterMap};
use crate::task::Task;

/// Morphological top-hat baseline removal per feature
#[derive(Clone, Debug)]
pub struct BaselineSubtraction {
    /// half width of the structuring element, `scan_window / 2`
    pub half_window: usize,
}

impl BaselineSubtraction {
    pub fn new(scan_window: usize) -> Self {
        BaselineSubtraction { half_window: scan_window / 2 }
    }

    /// Subtracts the opened intensity curve from a feature and lifts the result by 10
    ///
    /// Returns an unmodified copy when the window does not fit the feature. The leading anchor
    /// of the feature is kept as it is.
    pub fn apply(&self, feature: &Feature) -> Feature {
        let intensities: Vec<f64> = feature.data().iter().map(|p| p.intensity).collect();
        let Some(baseline) = opening(&intensities, self.half_window) else {
            debug!(feature = feature.id(), points = intensities.len(), "window too large, feature kept");
            return feature.clone();
        };

        let mut corrected = feature.copy_frame();
        for (point, base) in feature.data().iter().zip(&baseline).skip(1) {
            corrected.push_point(Triple::new(point.rt, point.mz, point.intensity - base + BASE_INTENSITY));
        }
        corrected.close();
        corrected
    }
}

impl Task for BaselineSubtraction {
    const NAME: &'static str = "baseline";

    type Input = FeatureContainer;
    type Output = FeatureContainer;

    fn configure(params: &ParameterMap) -> Result<Self, ConfigError> {
        Ok(BaselineSubtraction::new(params.get_usize(Self::NAME, Parameter::ScanWindow)?))
    }

    fn run(&self, input: &FeatureContainer) -> Result<FeatureContainer, CascadeError> {
        info!(container = %input.id, q = self.half_window, "applying top-hat baseline subtraction");
        let mut output = input.derive(&Self::suffix());
        for feature in input.iter() {
            output.push(self.apply(feature));
        }
        Ok(output)
    }
}
