use tracing::info;

use crate::data::container::SpectrumContainer;
use crate::data::feature::Feature;
use crate::data::property::PropertyKind;
use crate::data::spectrum::PseudoSpectrum;
use crate::errors::{CascadeError, ConfigError};
use crate::params::{Parameter, ParameterMap};
use crate::task::Task;

/// Whether the feature is the monoisotopic member of an envelope
pub fn is_monoisotopic(feature: &Feature) -> bool {
    feature.properties().isotopes().any(|i| i.position == 0 && i.child_id == feature.id())
}

/// Keeps or removes isotope-annotated features of every pseudo-spectrum
///
/// With `keep` only envelope members survive, together with adduct ions whose parent is a
/// monoisotopic feature that itself carries an adduct annotation; spectra left empty are
/// dropped. Without `keep` every envelope member except the monoisotopic one is removed.
#[derive(Clone, Debug)]
pub struct IsotopeFilter {
    pub keep: bool,
}

impl IsotopeFilter {
    fn keeps(&self, spectrum: &PseudoSpectrum, feature: &Feature) -> bool {
        let properties = feature.properties();
        if !self.keep {
            return !properties.has(PropertyKind::Isotope) || is_monoisotopic(feature);
        }
        if properties.has(PropertyKind::Isotope) {
            return true;
        }
        properties.adducts().any(|adduct| {
            spectrum.get(adduct.parent_id).is_some_and(|parent| {
                is_monoisotopic(parent) && parent.properties().has(PropertyKind::Adduct)
            })
        })
    }
}

impl Task for IsotopeFilter {
    const NAME: &'static str = "isotope_filter";

    type Input = SpectrumContainer;
    type Output = SpectrumContainer;

    fn configure(params: &ParameterMap) -> Result<Self, ConfigError> {
        Ok(IsotopeFilter { keep: params.get_bool_or(Self::NAME, Parameter::Keep, true)? })
    }

    fn run(&self, input: &SpectrumContainer) -> Result<SpectrumContainer, CascadeError> {
        let mut output = input.derive(&Self::suffix());
        for spectrum in input.iter() {
            let features: Vec<Feature> =
                spectrum.features.iter().filter(|f| self.keeps(spectrum, f)).cloned().collect();
            if self.keep && features.is_empty() {
                continue;
            }
            output.push(PseudoSpectrum::new(spectrum.index, features, spectrum.rt_range, spectrum.retention_time));
        }
        info!(
            keep = self.keep,
            before = input.feature_count(),
            after = output.feature_count(),
            "isotope filter applied"
        );
        Ok(output)
    }
}
