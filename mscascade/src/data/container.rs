use serde::{Deserialize, Serialize};

use crate::data::feature::Feature;
use crate::data::scan::IonMode;
use crate::data::spectrum::PseudoSpectrum;

/// Features of one run, unique by id
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureContainer {
    pub id: String,
    pub ion_mode: IonMode,
    pub features: Vec<Feature>,
}

impl FeatureContainer {
    pub fn new(id: impl Into<String>, ion_mode: IonMode) -> Self {
        FeatureContainer { id: id.into(), ion_mode, features: Vec::new() }
    }

    /// An empty container of the same kind whose id carries `suffix`
    pub fn derive(&self, suffix: &str) -> Self {
        FeatureContainer::new(format!("{}{}", self.id, suffix), self.ion_mode)
    }

    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    pub fn get(&self, id: usize) -> Option<&Feature> {
        self.features.iter().find(|f| f.id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Next free sequential id
    pub fn next_id(&self) -> usize {
        self.features.iter().map(Feature::id).max().map_or(1, |id| id + 1)
    }
}

/// Pseudo-spectra of one run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpectrumContainer {
    pub id: String,
    pub ion_mode: IonMode,
    pub spectra: Vec<PseudoSpectrum>,
}

impl SpectrumContainer {
    pub fn new(id: impl Into<String>, ion_mode: IonMode) -> Self {
        SpectrumContainer { id: id.into(), ion_mode, spectra: Vec::new() }
    }

    pub fn derive(&self, suffix: &str) -> Self {
        SpectrumContainer::new(format!("{}{}", self.id, suffix), self.ion_mode)
    }

    pub fn push(&mut self, spectrum: PseudoSpectrum) {
        self.spectra.push(spectrum);
    }

    pub fn iter(&self) -> impl Iterator<Item = &PseudoSpectrum> {
        self.spectra.iter()
    }

    pub fn len(&self) -> usize {
        self.spectra.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spectra.is_empty()
    }

    /// Total number of features over all spectra
    pub fn feature_count(&self) -> usize {
        self.spectra.iter().map(PseudoSpectrum::len).sum()
    }
}
