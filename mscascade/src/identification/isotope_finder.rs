use tracing::info;

use crate::data::container::SpectrumContainer;
use crate::data::feature::Feature;
use crate::errors::{CascadeError, ConfigError};
use crate::identification::isotope_graph::GraphIsotopeDetector;
use crate::identification::isotope_rec::RecursiveIsotopeDetector;
use crate::params::{Parameter, ParameterMap};
use crate::task::Task;

/// Default maximum charge searched for isotope envelopes
pub const DEFAULT_CHARGE: usize = 3;

/// Annotates isotope envelopes among the features of one pseudo-spectrum
pub trait IsotopeDetection {
    fn detect(&self, features: &mut [Feature]);
}

/// Isotope annotation over every pseudo-spectrum of a container
#[derive(Clone, Debug)]
pub enum IsotopeFinder {
    Graph(GraphIsotopeDetector),
    Recursive(RecursiveIsotopeDetector),
}

impl IsotopeFinder {
    fn detector(&self) -> &dyn IsotopeDetection {
        match self {
            IsotopeFinder::Graph(detector) => detector,
            IsotopeFinder::Recursive(detector) => detector,
        }
    }
}

impl Task for IsotopeFinder {
    const NAME: &'static str = "isotopes";

    type Input = SpectrumContainer;
    type Output = SpectrumContainer;

    fn configure(params: &ParameterMap) -> Result<Self, ConfigError> {
        let charge = params.get_usize_or(Self::NAME, Parameter::Charge, DEFAULT_CHARGE)?;
        let ppm = params.get_f64(Self::NAME, Parameter::MzWindowPpm)?;
        match params.get_str_or(Self::NAME, Parameter::IsotopeMethod, "recursive")? {
            "graph" => Ok(IsotopeFinder::Graph(GraphIsotopeDetector::new(charge, ppm))),
            "recursive" => Ok(IsotopeFinder::Recursive(RecursiveIsotopeDetector::new(charge, ppm))),
            other => Err(ConfigError::UnknownMethod(other.to_string())),
        }
    }

    fn run(&self, input: &SpectrumContainer) -> Result<SpectrumContainer, CascadeError> {
        info!(container = %input.id, spectra = input.len(), "detecting isotopes");
        let detector = self.detector();
        let mut output = input.derive(&Self::suffix());
        for spectrum in input.iter() {
            let mut spectrum = spectrum.clone();
            detector.detect(&mut spectrum.features);
            output.push(spectrum);
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::point::Triple;
    use crate::data::scan::IonMode;
    use crate::data::spectrum::PseudoSpectrum;

    fn container() -> SpectrumContainer {
        let features = [(1, 300.0, 1000.0), (2, 301.0033, 180.0)]
            .iter()
            .map(|&(id, mz, intensity)| {
                Feature::from_triples(
                    id,
                    vec![Triple::new(0.0, mz, 0.0), Triple::new(1.0, mz, intensity), Triple::new(2.0, mz, 0.0)],
                )
                .unwrap()
            })
            .collect();
        let mut container = SpectrumContainer::new("run", IonMode::Positive);
        container.push(PseudoSpectrum::from_features(1, features));
        container
    }

    #[test]
    fn test_configure() {
        let params = ParameterMap::new().with(Parameter::MzWindowPpm, 10.0);
        assert!(matches!(IsotopeFinder::configure(&params), Ok(IsotopeFinder::Recursive(d)) if d.max_charge == 3));

        let params = params.with(Parameter::IsotopeMethod, "graph").with(Parameter::Charge, 2usize);
        assert!(matches!(IsotopeFinder::configure(&params), Ok(IsotopeFinder::Graph(d)) if d.max_charge == 2));

        assert!(matches!(
            IsotopeFinder::configure(&ParameterMap::new()),
            Err(ConfigError::MissingParameter { parameter: Parameter::MzWindowPpm, .. })
        ));
    }

    #[test]
    fn test_input_is_not_mutated() {
        let input = container();
        let task = IsotopeFinder::configure(&ParameterMap::new().with(Parameter::MzWindowPpm, 10.0)).unwrap();
        let output = task.run(&input).unwrap();

        assert_eq!(output.id, "run-isotopes");
        assert!(input.spectra[0].features.iter().all(|f| f.properties().is_empty()));
        let labels: Vec<String> = output.spectra[0]
            .features
            .iter()
            .flat_map(|f| f.properties().isotopes().map(|i| i.label.clone()))
            .collect();
        assert_eq!(labels, vec!["M", "M+1", "M+1"]);
    }
}
