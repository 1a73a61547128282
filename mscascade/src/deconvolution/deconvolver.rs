use tracing::info;

use crate::data::container::FeatureContainer;
use crate::data::feature::Feature;
use crate::deconvolution::biehman::BiehmanDeconvolution;
use crate::deconvolution::savitzky_golay::SavitzkyGolayDeconvolution;
use crate::errors::{CascadeError, ConfigError};
use crate::params::{Parameter, ParameterMap};
use crate::task::Task;

/// Splits one feature into its resolved chromatographic peaks
pub trait Deconvolution {
    /// Resolved peaks of `feature`, numbered consecutively from `next_id`
    ///
    /// `next_id` is advanced past the last id handed out, so ids stay unique across features.
    fn deconvolve(&self, feature: &Feature, next_id: &mut usize) -> Vec<Feature>;
}

/// Deconvolutes every feature of a container into a new container with ids from 1
pub fn deconvolve_container<D: Deconvolution>(method: &D, input: &FeatureContainer, suffix: &str) -> FeatureContainer {
    let mut output = input.derive(suffix);
    let mut next_id = 1;
    for feature in input.iter() {
        for peak in method.deconvolve(feature, &mut next_id) {
            output.push(peak);
        }
    }
    info!(features = input.len(), peaks = output.len(), "deconvolution finished");
    output
}

/// Deconvolution task whose method is chosen by the `method` parameter
#[derive(Clone, Debug)]
pub enum Deconvolver {
    Biehman(BiehmanDeconvolution),
    SavitzkyGolay(SavitzkyGolayDeconvolution),
}

impl Task for Deconvolver {
    const NAME: &'static str = "deconvolution";

    type Input = FeatureContainer;
    type Output = FeatureContainer;

    fn configure(params: &ParameterMap) -> Result<Self, ConfigError> {
        match params.get_str_or(Self::NAME, Parameter::Method, "biehman")? {
            "biehman" => Ok(Deconvolver::Biehman(BiehmanDeconvolution::configure(params)?)),
            "savitzky_golay" | "sg" => Ok(Deconvolver::SavitzkyGolay(SavitzkyGolayDeconvolution::configure(params)?)),
            other => Err(ConfigError::UnknownMethod(other.to_string())),
        }
    }

    fn run(&self, input: &FeatureContainer) -> Result<FeatureContainer, CascadeError> {
        match self {
            Deconvolver::Biehman(method) => method.run(input),
            Deconvolver::SavitzkyGolay(method) => method.run(input),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::point::Triple;
    use crate::data::scan::IonMode;

    fn container() -> FeatureContainer {
        let mut container = FeatureContainer::new("run", IonMode::Positive);
        for (id, mz) in [(1, 100.0), (2, 250.0)] {
            let data = (0..31)
                .map(|i| {
                    let x = i as f64;
                    let y = if i == 0 || i == 30 { 0.0 } else { 1000.0 * (-((x - 15.0) / 2.0).powi(2) / 2.0).exp() };
                    Triple::new(x, mz, y)
                })
                .collect();
            container.push(Feature::from_triples(id, data).unwrap());
        }
        container
    }

    #[test]
    fn test_method_selection() {
        let params = ParameterMap::new()
            .with(Parameter::ScanWindow, 5usize)
            .with(Parameter::Center, false)
            .with(Parameter::NoiseFactor, 3.0);
        assert!(matches!(Deconvolver::configure(&params), Ok(Deconvolver::Biehman(_))));

        let params = ParameterMap::new()
            .with(Parameter::Method, "sg")
            .with(Parameter::ScanWindow, 5usize)
            .with(Parameter::MinFeatureIntensity, 100.0)
            .with(Parameter::DerivativeThreshold, 0.5)
            .with(Parameter::SgLevel, 2usize);
        assert!(matches!(Deconvolver::configure(&params), Ok(Deconvolver::SavitzkyGolay(_))));

        let params = ParameterMap::new().with(Parameter::Method, "wavelet");
        assert!(matches!(Deconvolver::configure(&params), Err(ConfigError::UnknownMethod(m)) if m == "wavelet"));
    }

    #[test]
    fn test_ids_are_unique_across_features() {
        let method = SavitzkyGolayDeconvolution {
            scan_window: 5,
            min_feature_intensity: 100.0,
            derivative_threshold: 0.5,
            sg_level: 2,
        };
        let output = Deconvolver::SavitzkyGolay(method).run(&container()).unwrap();
        assert_eq!(output.id, "run-savitzky_golay");
        let ids: Vec<usize> = output.iter().map(Feature::id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!((output.features[1].mz() - 250.0).abs() < 1e-9);
    }
}
