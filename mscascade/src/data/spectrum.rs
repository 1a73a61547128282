use serde::{Deserialize, Serialize};

use crate::data::feature::Feature;
use crate::data::point::Point;
use crate::data::range::Range;

/// Features sharing approximately the same retention time
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PseudoSpectrum {
    pub index: usize,
    pub features: Vec<Feature>,
    pub rt_range: Range,
    pub retention_time: f64,
}

impl PseudoSpectrum {
    pub fn new(index: usize, features: Vec<Feature>, rt_range: Range, retention_time: f64) -> Self {
        PseudoSpectrum { index, features, rt_range, retention_time }
    }

    /// Builds a spectrum whose range and retention time are derived from its features
    pub fn from_features(index: usize, features: Vec<Feature>) -> Self {
        let mut rt_range = Range::point(features.first().map_or(0.0, Feature::retention_time));
        features.iter().for_each(|f| rt_range.extend(f.retention_time()));
        let retention_time = if features.is_empty() {
            0.0
        } else {
            features.iter().map(Feature::retention_time).sum::<f64>() / features.len() as f64
        };
        PseudoSpectrum { index, features, rt_range, retention_time }
    }

    /// Mass spectrum of the features' representative points, ascending in m/z
    pub fn data(&self) -> Vec<Point> {
        let mut data: Vec<Point> = self.features.iter().map(Feature::mass_point).collect();
        data.sort_by(|a, b| a.x.total_cmp(&b.x));
        data
    }

    pub fn get(&self, id: usize) -> Option<&Feature> {
        self.features.iter().find(|f| f.id() == id)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}
