use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::chemistry::constants::MASS_PROTON;
use crate::data::container::SpectrumContainer;
use crate::data::feature::Feature;
use crate::data::property::Property;
use crate::data::range::Range;
use crate::data::scan::IonMode;
use crate::errors::{CascadeError, ConfigError};
use crate::params::{Parameter, ParameterMap};
use crate::task::Task;

/// Adduct masses in `(-0.5, 0.5)` are treated as "no adduct" unless the adduct is a cluster
const NEUTRAL_MASS: f64 = 0.5;

/// One entry of an adduct list
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdductSingle {
    pub name: String,
    pub charge: i32,
    /// mass difference to the reference ion, negative for losses
    pub mass: f64,
    /// number of monomers, 1 unless the name starts with "2" or "3"
    pub cluster_size: usize,
}

impl AdductSingle {
    pub fn new(name: impl Into<String>, charge: i32, mass: f64) -> Self {
        let name = name.into();
        let cluster_size = match name.chars().next() {
            Some('2') => 2,
            Some('3') => 3,
            _ => 1,
        };
        AdductSingle { name, charge, mass, cluster_size }
    }

    pub fn is_cluster(&self) -> bool {
        self.cluster_size > 1
    }

    /// Monomer m/z of a cluster ion observed at `mz`
    pub fn monomer_mz(&self, mz: f64, ion_mode: IonMode) -> f64 {
        let size = self.cluster_size as f64;
        match ion_mode {
            IonMode::Positive => (mz - self.mass - MASS_PROTON) / size + MASS_PROTON,
            IonMode::Negative => (mz - self.mass + MASS_PROTON) / size - MASS_PROTON,
            IonMode::InSilico | IonMode::Neutral => mz,
        }
    }
}

/// Parses `name,charge,mass` lines; `#` starts a comment line, malformed lines are skipped
pub fn parse_adduct_list(content: &str) -> Vec<AdductSingle> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            let parsed = match fields.as_slice() {
                [name, charge, mass] => charge.parse::<i32>().ok().zip(mass.parse::<f64>().ok()).map(|(c, m)| (name, c, m)),
                _ => None,
            };
            if parsed.is_none() {
                debug!(line, "adduct record not readable");
            }
            parsed.map(|(name, charge, mass)| AdductSingle::new(*name, charge, mass))
        })
        .collect()
}

/// Reads an adduct list file; a missing or unreadable file yields an empty list
pub fn load_adduct_list(path: &Path) -> Vec<AdductSingle> {
    match fs::read_to_string(path) {
        Ok(content) => parse_adduct_list(&content),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "adduct list not readable, no adducts configured");
            Vec::new()
        }
    }
}

/// Pairwise adduct annotation within one group of features
#[derive(Clone, Debug)]
pub struct AdductDetector {
    pub ppm: f64,
    pub ion_mode: IonMode,
    pub adducts: Vec<AdductSingle>,
}

impl AdductDetector {
    pub fn new(ppm: f64, ion_mode: IonMode, adducts: Vec<AdductSingle>) -> Self {
        AdductDetector { ppm, ion_mode, adducts }
    }

    /// Tags every feature pair whose m/z difference matches an adduct
    ///
    /// For a gained adduct the heavier ion is the adduct and the lighter one the reference, for a
    /// lost adduct the other way round. The adduct ion gets the adduct's name, the reference ion
    /// the ion mode's reference label; later matches overwrite earlier ones.
    pub fn detect(&self, features: &mut [Feature]) {
        let mut order: Vec<usize> = (0..features.len()).collect();
        order.sort_by(|&a, &b| features[a].mz().total_cmp(&features[b].mz()));
        let mzs: Vec<f64> = order.iter().map(|&i| features[i].mz()).collect();

        for adduct in &self.adducts {
            if !adduct.is_cluster() && adduct.mass > -NEUTRAL_MASS && adduct.mass < NEUTRAL_MASS {
                continue;
            }
            let window = Range::from_ppm(adduct.mass.abs(), self.ppm);

            for row in 0..mzs.len() {
                for col in 0..row {
                    let delta = mzs[row] - mzs[col];
                    if delta == 0.0 {
                        break;
                    }
                    let matched = if adduct.is_cluster() {
                        Range::from_ppm(adduct.monomer_mz(mzs[row], self.ion_mode), self.ppm).contains(mzs[col])
                    } else {
                        window.contains(delta)
                    };
                    if !matched {
                        continue;
                    }

                    let (parent, child) = if adduct.mass > 0.0 {
                        (order[col], order[row])
                    } else if adduct.mass < 0.0 {
                        (order[row], order[col])
                    } else {
                        continue;
                    };
                    self.tag(features, adduct, parent, child);
                }
            }
        }
    }

    fn tag(&self, features: &mut [Feature], adduct: &AdductSingle, parent: usize, child: usize) {
        let parent_id = features[parent].id();
        let child_id = features[child].id();
        debug!(adduct = %adduct.name, parent_id, child_id, "adduct match");
        features[child].set_property(Property::adduct(adduct.name.clone(), adduct.mass, parent_id, child_id));
        features[parent].set_property(Property::adduct(self.ion_mode.reference_label(), 0.0, parent_id, child_id));
    }
}

/// Adduct annotation over every pseudo-spectrum of a container
#[derive(Clone, Debug)]
pub struct AdductFinder {
    pub ppm: f64,
    pub adducts: Vec<AdductSingle>,
}

impl Task for AdductFinder {
    const NAME: &'static str = "adducts";

    type Input = SpectrumContainer;
    type Output = SpectrumContainer;

    fn configure(params: &ParameterMap) -> Result<Self, ConfigError> {
        let ppm = params.get_f64(Self::NAME, Parameter::MzWindowPpm)?;
        let path = params.get_str(Self::NAME, Parameter::AdductList)?;
        Ok(AdductFinder { ppm, adducts: load_adduct_list(Path::new(path)) })
    }

    fn run(&self, input: &SpectrumContainer) -> Result<SpectrumContainer, CascadeError> {
        info!(container = %input.id, adducts = self.adducts.len(), "detecting adducts");
        let detector = AdductDetector::new(self.ppm, input.ion_mode, self.adducts.clone());
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
    use crate::data::property::Adduct;

    fn feature(id: usize, mz: f64) -> Feature {
        Feature::from_triples(
            id,
            vec![Triple::new(0.0, mz, 0.0), Triple::new(1.0, mz, 500.0), Triple::new(2.0, mz, 0.0)],
        )
        .unwrap()
    }

    fn adduct(feature: &Feature) -> &Adduct {
        feature.properties().adducts().next().unwrap()
    }

    #[test]
    fn test_proton_adduct_in_positive_mode() {
        let mut features = vec![feature(2, 101.0073), feature(1, 100.0)];
        let detector = AdductDetector::new(10.0, IonMode::Positive, vec![AdductSingle::new("M+H", 1, 1.0073)]);
        detector.detect(&mut features);

        let child = adduct(&features[0]);
        assert_eq!((child.name.as_str(), child.parent_id, child.child_id), ("M+H", 1, 2));
        assert!((child.mass - 1.0073).abs() < 1e-12);
        let reference = adduct(&features[1]);
        assert_eq!((reference.name.as_str(), reference.parent_id, reference.child_id), ("M+H", 1, 2));
        assert_eq!(reference.mass, 0.0);
    }

    #[test]
    fn test_loss_is_oriented_downwards() {
        let mut features = vec![feature(1, 200.0), feature(2, 181.9894)];
        let detector =
            AdductDetector::new(10.0, IonMode::Negative, vec![AdductSingle::new("M-H2O-H", -1, -18.0106)]);
        detector.detect(&mut features);

        let child = adduct(&features[1]);
        assert_eq!((child.name.as_str(), child.parent_id), ("M-H2O-H", 1));
        assert_eq!(adduct(&features[0]).name, "M-H");
    }

    #[test]
    fn test_neutral_entries_and_misses_are_ignored() {
        let mut features = vec![feature(1, 100.0), feature(2, 100.2), feature(3, 150.0)];
        let detector = AdductDetector::new(
            10.0,
            IonMode::Positive,
            vec![AdductSingle::new("M", 1, 0.2), AdductSingle::new("M+Na", 1, 21.9819)],
        );
        detector.detect(&mut features);
        assert!(features.iter().all(|f| f.properties().is_empty()));
    }

    #[test]
    fn test_cluster_needs_monomer() {
        // [2M+H]+ of a monomer observed as [M+H]+ at 151.0754
        let monomer = 151.0754;
        let dimer = 2.0 * (monomer - MASS_PROTON) + MASS_PROTON;
        let mut features = vec![feature(1, monomer), feature(2, dimer), feature(3, 180.0)];
        let detector = AdductDetector::new(5.0, IonMode::Positive, vec![AdductSingle::new("2M+H", 1, 0.0)]);
        assert!(detector.adducts[0].is_cluster());
        detector.detect(&mut features);
        // zero mass gives no orientation
        assert!(features.iter().all(|f| f.properties().is_empty()));

        let detector = AdductDetector::new(5.0, IonMode::Positive, vec![AdductSingle::new("2M+Na", 1, 21.9819)]);
        let sodium_dimer = dimer + 21.9819;
        let mut features = vec![feature(1, monomer), feature(2, sodium_dimer), feature(3, 180.0)];
        detector.detect(&mut features);
        let child = adduct(&features[1]);
        assert_eq!((child.name.as_str(), child.parent_id, child.child_id), ("2M+Na", 1, 2));
        assert!(features[2].properties().is_empty());
    }

    #[test]
    fn test_parse_adduct_list() {
        let list = parse_adduct_list("# name,charge,mass\nM+Na,1,21.9819\nbroken line\n2M+H,1,0.0\nM+K,x,37.9\n");
        assert_eq!(list.len(), 2);
        assert_eq!(list[0], AdductSingle::new("M+Na", 1, 21.9819));
        assert_eq!(list[1].cluster_size, 2);
        assert!(load_adduct_list(Path::new("/nonexistent/adducts.csv")).is_empty());
    }
}
