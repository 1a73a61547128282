use std::collections::HashSet;

use tracing::debug;

use crate::algorithm::math::LinearEquation;
use crate::chemistry::constants::{ISOTOPE_SPACING, PPM};
use crate::data::feature::Feature;
use crate::data::property::Property;
use crate::identification::isotope_finder::IsotopeDetection;

/// Deepest isotope searched past the monoisotopic feature
pub const MAX_DEPTH: usize = 3;

/// m/z is divided by this before evaluating the ratio models
const MZ_BIN: f64 = 10.0;

/// Expected intensity ratio of an isotope to its parent and the relative tolerance around it
struct RatioModel {
    ratio: LinearEquation,
    tolerance: f64,
}

/// Models for isotope depths 1 to 3
const RATIO_MODELS: [RatioModel; MAX_DEPTH] = [
    RatioModel { ratio: LinearEquation { slope: 0.006359, intercept: -0.001681 }, tolerance: 0.5 },
    RatioModel { ratio: LinearEquation { slope: 0.0009969, intercept: -0.0068281 }, tolerance: 0.9 },
    RatioModel { ratio: LinearEquation { slope: 0.0001437, intercept: -0.0016528 }, tolerance: 0.9 },
];

/// Whether `ratio` matches the model for `depth` at m/z `mz`
pub fn matches_ratio(depth: usize, mz: f64, ratio: f64) -> bool {
    let Some(model) = depth.checked_sub(1).and_then(|i| RATIO_MODELS.get(i)) else {
        return false;
    };
    let expected = model.ratio.y(mz / MZ_BIN);
    ratio >= expected * (1.0 - model.tolerance) && ratio < expected * (1.0 + model.tolerance)
}

/// Isotope envelopes grown feature by feature in ascending m/z
///
/// Starting from every feature not yet part of an envelope, all chains of features spaced by the
/// isotope distance (divided by the charge) whose intensity ratios fit the ratio models are
/// enumerated. The longest chain wins; ties go to the chain closest to the exact spacing.
#[derive(Clone, Debug)]
pub struct RecursiveIsotopeDetector {
    pub max_charge: usize,
    pub ppm: f64,
}

/// Features of one spectrum seen in m/z order
struct Sorted {
    mzs: Vec<f64>,
    intensities: Vec<f64>,
}

impl RecursiveIsotopeDetector {
    pub fn new(max_charge: usize, ppm: f64) -> Self {
        RecursiveIsotopeDetector { max_charge, ppm }
    }

    /// Collects every maximal chain below `parent` into `paths`
    fn build(
        &self,
        sorted: &Sorted,
        visited: &HashSet<usize>,
        parent: usize,
        charge: usize,
        path: &mut Vec<usize>,
        paths: &mut Vec<Vec<usize>>,
    ) {
        let mut extended = false;
        if path.len() < MAX_DEPTH {
            let target = sorted.mzs[parent] + ISOTOPE_SPACING / charge as f64;
            for candidate in parent + 1..sorted.mzs.len() {
                let mz = sorted.mzs[candidate];
                let tolerance = mz * self.ppm / PPM;
                if mz >= target + tolerance {
                    break;
                }
                if mz < target - tolerance || visited.contains(&candidate) {
                    continue;
                }
                let ratio = sorted.intensities[candidate] / sorted.intensities[parent];
                if matches_ratio(path.len() + 1, mz, ratio) {
                    extended = true;
                    path.push(candidate);
                    self.build(sorted, visited, candidate, charge, path, paths);
                    path.pop();
                }
            }
        }
        if !extended && !path.is_empty() {
            paths.push(path.clone());
        }
    }

    /// Longest chain, then the one with the least cumulative spacing error
    fn resolve(sorted: &Sorted, root: usize, charge: usize, paths: Vec<Vec<usize>>) -> Option<Vec<usize>> {
        let longest = paths.iter().map(Vec::len).max()?;
        let spacing = ISOTOPE_SPACING / charge as f64;
        let deviation = |path: &Vec<usize>| {
            let mut previous = sorted.mzs[root];
            path.iter().fold(0.0, |sum, &i| {
                let step = (sorted.mzs[i] - previous - spacing).abs();
                previous = sorted.mzs[i];
                sum + step
            })
        };
        paths
            .into_iter()
            .filter(|p| p.len() == longest)
            .map(|p| (deviation(&p), p))
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, p)| p)
    }

    fn annotate(features: &mut [Feature], root: usize, members: &[usize]) {
        let root_id = features[root].id();
        features[root].set_property(Property::isotope("M", 0, root_id, root_id));
        for (depth, &member) in members.iter().enumerate() {
            let position = depth as i32 + 1;
            let property = Property::isotope(format!("M+{}", position), position, root_id, features[member].id());
            features[root].add_property(property.clone());
            features[member].set_property(property);
        }
    }
}

impl IsotopeDetection for RecursiveIsotopeDetector {
    fn detect(&self, features: &mut [Feature]) {
        let mut order: Vec<usize> = (0..features.len()).collect();
        order.sort_by(|&a, &b| features[a].mz().total_cmp(&features[b].mz()));
        let sorted = Sorted {
            mzs: order.iter().map(|&i| features[i].mz()).collect(),
            intensities: order.iter().map(|&i| features[i].intensity()).collect(),
        };

        let mut visited = HashSet::new();
        for charge in 1..=self.max_charge {
            for root in 0..order.len() {
                if visited.contains(&root) {
                    continue;
                }
                let mut paths = Vec::new();
                self.build(&sorted, &visited, root, charge, &mut Vec::new(), &mut paths);
                let Some(best) = Self::resolve(&sorted, root, charge, paths) else {
                    continue;
                };

                debug!(charge, mz = sorted.mzs[root], isotopes = best.len(), "isotope envelope");
                visited.insert(root);
                visited.extend(best.iter().copied());
                let members: Vec<usize> = best.iter().map(|&i| order[i]).collect();
                Self::annotate(features, order[root], &members);
            }
        }
    }
}
