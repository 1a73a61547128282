use tracing::debug;

use crate::algorithm::graph::Dag;
use crate::chemistry::constants::{ISOTOPE_SPACING, PPM};
use crate::data::feature::Feature;
use crate::data::property::Property;
use crate::data::range::Range;
use crate::identification::isotope_finder::IsotopeDetection;

/// Upper bound on root to leaf paths enumerated per component
pub const MAX_PATHS: usize = 50;

/// Isotope envelopes from the connected components of per-charge spacing graphs
///
/// For every charge an edge joins two features whose m/z difference matches the isotope spacing
/// divided by the charge. Every root to leaf path of a component is one envelope, labelled
/// around its most intense member. A later path sharing a feature with an earlier envelope
/// replaces that envelope whole, so each feature ends up in at most one envelope.
#[derive(Clone, Debug)]
pub struct GraphIsotopeDetector {
    pub max_charge: usize,
    pub ppm: f64,
}

impl GraphIsotopeDetector {
    pub fn new(max_charge: usize, ppm: f64) -> Self {
        GraphIsotopeDetector { max_charge, ppm }
    }

    /// Spacing graph over m/z ordered positions for one charge
    fn spacing_graph(&self, mzs: &[f64], charge: usize) -> Dag {
        let mut dag = Dag::new(mzs.len());
        for j in 0..mzs.len() {
            let sigma = mzs[j] * self.ppm / PPM;
            let window = Range::new(
                (ISOTOPE_SPACING - sigma) / charge as f64,
                (ISOTOPE_SPACING + sigma) / charge as f64,
            );
            for i in 0..j {
                let delta = mzs[j] - mzs[i];
                if delta > 0.0 && window.contains(delta) {
                    dag.add_edge(i, j);
                }
            }
        }
        dag
    }

    /// Dissolves every earlier envelope that shares a feature with `path`
    fn claim(envelopes: &mut [Vec<usize>], owner: &mut [Option<usize>], path: &[usize]) {
        for &member in path {
            if let Some(previous) = owner[member] {
                for freed in std::mem::take(&mut envelopes[previous]) {
                    owner[freed] = None;
                }
            }
        }
    }

    /// Labels one envelope given as feature indices
    fn label(features: &mut [Feature], path: &[usize]) {
        let mut members = path.to_vec();
        members.sort_by(|&a, &b| features[a].mz().total_cmp(&features[b].mz()));

        let mut main = 0;
        for (position, &member) in members.iter().enumerate() {
            if features[member].intensity() > features[members[main]].intensity() {
                main = position;
            }
        }
        let main_index = members[main];
        let main_id = features[main_index].id();
        features[main_index].set_property(Property::isotope("M", 0, main_id, main_id));

        for (position, &member) in members.iter().enumerate() {
            if position == main {
                continue;
            }
            let offset = position as i32 - main as i32;
            let label = if offset > 0 { format!("M+{}", offset) } else { format!("M{}", offset) };
            let property = Property::isotope(label, offset, main_id, features[member].id());
            features[member].set_property(property.clone());
            features[main_index].add_property(property);
        }
    }
}

impl IsotopeDetection for GraphIsotopeDetector {
    fn detect(&self, features: &mut [Feature]) {
        let mut order: Vec<usize> = (0..features.len()).collect();
        order.sort_by(|&a, &b| features[a].mz().total_cmp(&features[b].mz()));
        let mzs: Vec<f64> = order.iter().map(|&i| features[i].mz()).collect();

        let mut envelopes: Vec<Vec<usize>> = Vec::new();
        let mut owner: Vec<Option<usize>> = vec![None; features.len()];
        for charge in 1..=self.max_charge {
            let dag = self.spacing_graph(&mzs, charge);
            if dag.edge_count() == 0 {
                continue;
            }
            for component in dag.components() {
                let paths = dag.root_leaf_paths(&component, MAX_PATHS);
                debug!(charge, members = component.len(), paths = paths.len(), "isotope component");
                for path in paths {
                    let path: Vec<usize> = path.iter().map(|&p| order[p]).collect();
                    Self::claim(&mut envelopes, &mut owner, &path);
                    for &member in &path {
                        owner[member] = Some(envelopes.len());
                    }
                    envelopes.push(path);
                }
            }
        }

        for envelope in envelopes.iter().filter(|e| e.len() > 1) {
            Self::label(features, envelope);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::point::Triple;
    use crate::identification::isotope_filter::is_monoisotopic;

    fn feature(id: usize, mz: f64, intensity: f64) -> Feature {
        Feature::from_triples(
            id,
            vec![
                Triple::new(0.0, mz, 0.0),
                Triple::new(1.0, mz, intensity / 2.0),
                Triple::new(2.0, mz, intensity),
                Triple::new(3.0, mz, intensity / 2.0),
                Triple::new(4.0, mz, 0.0),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_single_charge_envelope() {
        let mut features = vec![
            feature(3, 301.0033, 300.0),
            feature(1, 300.0, 1000.0),
            feature(2, 300.50165, 50.0),
            feature(4, 250.0, 80.0),
        ];
        // 300.50165 is half a spacing above 300.0 and only matches at charge 2
        GraphIsotopeDetector::new(1, 10.0).detect(&mut features);

        let main = &features[1];
        let labels: Vec<(&str, i32)> = main.properties().isotopes().map(|i| (i.label.as_str(), i.position)).collect();
        assert_eq!(labels, vec![("M", 0), ("M+1", 1)]);

        let child = features[0].properties().isotopes().next().unwrap();
        assert_eq!((child.label.as_str(), child.parent_id, child.child_id), ("M+1", 1, 3));
        assert!(features[2].properties().is_empty());
        assert!(features[3].properties().is_empty());
    }

    #[test]
    fn test_monoisotopic_is_most_intense_member() {
        let mut features = vec![
            feature(1, 500.0, 100.0),
            feature(2, 500.5016, 900.0),
            feature(3, 501.0033, 400.0),
        ];
        GraphIsotopeDetector::new(2, 10.0).detect(&mut features);

        let main = features[1].properties().isotopes().find(|i| i.position == 0).unwrap();
        assert_eq!(main.parent_id, 2);
        let before = features[0].properties().isotopes().next().unwrap();
        assert_eq!((before.label.as_str(), before.position, before.parent_id), ("M-1", -1, 2));
        let after = features[2].properties().isotopes().next().unwrap();
        assert_eq!((after.label.as_str(), after.parent_id), ("M+1", 2));
    }

    #[test]
    fn test_overlapping_paths_keep_one_parent() {
        let mut features = vec![
            feature(1, 400.0, 1000.0),
            feature(2, 401.0033, 500.0),
            feature(3, 401.0040, 450.0),
            feature(4, 401.5050, 300.0),
            feature(5, 402.0066, 200.0),
        ];
        // charge 1: 1-2-5 and 1-3-5, charge 2: 2-4-5 and 3-4-5
        GraphIsotopeDetector::new(2, 10.0).detect(&mut features);

        let mains: Vec<&Feature> = features.iter().filter(|f| is_monoisotopic(f)).collect();
        assert_eq!(mains.len(), 1);
        let main_id = mains[0].id();
        assert!(main_id == 2 || main_id == 3);
        assert!(features[0].properties().isotopes().next().is_none());

        let labelled: Vec<&Feature> = features.iter().filter(|f| f.properties().isotopes().next().is_some()).collect();
        assert_eq!(labelled.len(), 3);
        for feature in labelled.iter().filter(|f| f.id() != main_id) {
            let labels: Vec<_> = feature.properties().isotopes().collect();
            assert_eq!(labels.len(), 1);
            assert_eq!(labels[0].parent_id, main_id);
        }
        let d = features[3].properties().isotopes().next().unwrap();
        let c = features[4].properties().isotopes().next().unwrap();
        assert_eq!((d.label.as_str(), c.label.as_str()), ("M+1", "M+2"));
    }
}
