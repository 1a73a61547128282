use serde::{Deserialize, Deserializer, Serialize};
use statrs::statistics::Statistics;
use tracing::warn;

use crate::algorithm::math::{parabola_apex, trapezoid};
use crate::chemistry::constants::MIN_ABUNDANCE;
use crate::data::point::{Point, Triple};
use crate::data::property::{Property, PropertyBag};
use crate::data::range::Range;

/// A chromatographic peak: a run of triples between two zero-intensity anchors
///
/// Features are filled point by point and then closed. Closing computes the derived statistics
/// (apex, m/z, deviation, area, ranges); accessors of derived fields are only meaningful once
/// the feature is closed. Closing twice is a no-op.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    id: usize,
    #[serde(deserialize_with = "non_empty")]
    data: Vec<Triple>,
    #[serde(default)]
    properties: PropertyBag,
    closed: bool,
    retention_time: f64,
    mz: f64,
    intensity: f64,
    deviation: f64,
    area: f64,
    min_intensity: f64,
    rt_range: Range,
    mz_range: Range,
}

impl Feature {
    /// Creates an open feature holding its leading anchor point
    pub fn new(id: usize, anchor: Triple) -> Self {
        Feature {
            id,
            data: vec![anchor],
            properties: PropertyBag::new(),
            closed: false,
            retention_time: anchor.rt,
            mz: anchor.mz,
            intensity: anchor.intensity,
            deviation: 0.0,
            area: 0.0,
            min_intensity: 0.0,
            rt_range: Range::point(anchor.rt),
            mz_range: Range::point(anchor.mz),
        }
    }

    /// Builds and closes a feature from a complete point list
    pub fn from_triples(id: usize, data: Vec<Triple>) -> Option<Self> {
        let mut iter = data.into_iter();
        let mut feature = Feature::new(id, iter.next()?);
        for point in iter {
            feature.push_point(point);
        }
        feature.close();
        Some(feature)
    }

    pub fn push_point(&mut self, point: Triple) {
        if self.closed {
            warn!(feature = self.id, "point pushed to a closed feature was ignored");
            return;
        }
        self.data.push(point);
    }

    /// Appends a zero-intensity point at `rt` carrying the last m/z, then closes
    pub fn close_at(&mut self, rt: f64) {
        if self.closed {
            return;
        }
        let mz = self.data.last().map_or(self.mz, |p| p.mz);
        self.data.push(Triple::new(rt, mz, MIN_ABUNDANCE));
        self.close();
    }

    pub fn close(&mut self) {
        if self.closed || self.data.is_empty() {
            return;
        }
        self.closed = true;

        let interior = interior(&self.data);

        let (apex_index, apex) = interior
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.intensity.total_cmp(&b.1.intensity))
            .map(|(i, p)| (i + self.offset(), *p))
            .unwrap_or((0, self.data[0]));

        let refined = if apex_index > 0 && apex_index + 1 < self.data.len() {
            parabola_apex(
                self.data[apex_index - 1].time_point(),
                apex.time_point(),
                self.data[apex_index + 1].time_point(),
            )
        } else {
            None
        };
        let refined = refined.filter(|v| v.y >= apex.intensity).unwrap_or(apex.time_point());
        self.retention_time = refined.x;
        self.intensity = refined.y;

        let weight: f64 = interior.iter().map(|p| p.intensity).sum();
        self.mz = if weight > 0.0 {
            interior.iter().map(|p| p.mz * p.intensity).sum::<f64>() / weight
        } else {
            interior.iter().map(|p| p.mz).mean()
        };

        self.deviation = if interior.len() > 1 {
            let sd = interior.iter().map(|p| p.mz).std_dev();
            if sd.is_finite() { sd } else { 0.0 }
        } else {
            0.0
        };

        self.area = trapezoid(&self.trace());
        self.min_intensity = self
            .data
            .iter()
            .map(|p| p.intensity)
            .filter(|&i| i > 0.0)
            .fold(f64::INFINITY, f64::min);
        if !self.min_intensity.is_finite() {
            self.min_intensity = 0.0;
        }

        let mut rt_range = Range::point(self.data[0].rt);
        self.data.iter().for_each(|p| rt_range.extend(p.rt));
        self.rt_range = rt_range;

        let mut mz_range = Range::point(interior[0].mz);
        interior.iter().for_each(|p| mz_range.extend(p.mz));
        self.mz_range = mz_range;
    }

    /// An open copy with the same id, leading point and properties but no other data
    pub fn copy_frame(&self) -> Self {
        let lead = self.data.first().copied().unwrap_or(Triple::new(self.retention_time, self.mz, MIN_ABUNDANCE));
        let mut frame = Feature::new(self.id, lead);
        frame.properties = self.properties.clone();
        frame
    }

    /// Index of the first interior point in `data`
    fn offset(&self) -> usize {
        if self.data.len() > 2 { 1 } else { 0 }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn set_id(&mut self, id: usize) {
        self.id = id;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn data(&self) -> &[Triple] {
        &self.data
    }

    /// Points without the leading and trailing anchors
    pub fn interior(&self) -> &[Triple] {
        interior(&self.data)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Chromatographic projection (retention time, intensity) of all points
    pub fn trace(&self) -> Vec<Point> {
        self.data.iter().map(Triple::time_point).collect()
    }

    /// Interior chromatogram padded by `width` points on either side
    ///
    /// Padding points sit at the feature's minimum intensity and are spaced by the first time
    /// step of the interior.
    ///
    /// # Arguments
    ///
    /// * `width` - number of padding points per side
    ///
    /// # Returns
    ///
    /// * `Vec<Point>` - the padded (retention time, intensity) series
    pub fn padded_trace(&self, width: usize) -> Vec<Point> {
        let inner = self.interior();
        let step = match inner {
            [a, b, ..] if b.rt > a.rt => b.rt - a.rt,
            _ => 1.0,
        };
        let first = inner.first().map_or(0.0, |p| p.rt);
        let last = inner.last().map_or(0.0, |p| p.rt);
        let floor = self.min_intensity;

        let mut padded = Vec::with_capacity(inner.len() + 2 * width);
        padded.extend((0..width).rev().map(|k| Point::new(first - (k + 1) as f64 * step, floor)));
        padded.extend(inner.iter().map(Triple::time_point));
        padded.extend((0..width).map(|k| Point::new(last + (k + 1) as f64 * step, floor)));
        padded
    }

    pub fn retention_time(&self) -> f64 {
        self.retention_time
    }

    pub fn mz(&self) -> f64 {
        self.mz
    }

    pub fn intensity(&self) -> f64 {
        self.intensity
    }

    pub fn deviation(&self) -> f64 {
        self.deviation
    }

    pub fn area(&self) -> f64 {
        self.area
    }

    pub fn min_intensity(&self) -> f64 {
        self.min_intensity
    }

    /// Apex intensity above the feature's lowest nonzero intensity
    pub fn dif_intensity(&self) -> f64 {
        self.intensity - self.min_intensity
    }

    pub fn rt_range(&self) -> Range {
        self.rt_range
    }

    pub fn mz_range(&self) -> Range {
        self.mz_range
    }

    /// Representative (m/z, intensity) point
    pub fn mass_point(&self) -> Point {
        Point::new(self.mz, self.intensity)
    }

    pub fn properties(&self) -> &PropertyBag {
        &self.properties
    }

    pub fn add_property(&mut self, property: Property) {
        self.properties.add(property);
    }

    /// Replaces all properties of the same kind, last write wins
    pub fn set_property(&mut self, property: Property) {
        self.properties.set(property);
    }
}

/// A feature always holds at least its leading anchor
fn non_empty<'de, D>(deserializer: D) -> Result<Vec<Triple>, D::Error>
where
    D: Deserializer<'de>,
{
    let data = Vec::<Triple>::deserialize(deserializer)?;
    if data.is_empty() {
        return Err(serde::de::Error::custom("feature without data points"));
    }
    Ok(data)
}

fn interior(data: &[Triple]) -> &[Triple] {
    if data.len() > 2 { &data[1..data.len() - 1] } else { data }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peak() -> Feature {
        let mut feature = Feature::new(1, Triple::new(0.0, 100.0, 0.0));
        feature.push_point(Triple::new(1.0, 100.001, 10.0));
        feature.push_point(Triple::new(2.0, 100.0, 20.0));
        feature.push_point(Triple::new(3.0, 99.999, 10.0));
        feature.close_at(4.0);
        feature
    }

    #[test]
    fn test_close_statistics() {
        let feature = peak();
        assert!(feature.is_closed());
        assert_eq!(feature.len(), 5);
        assert!((feature.retention_time() - 2.0).abs() < 1e-9);
        assert!((feature.intensity() - 20.0).abs() < 1e-9);
        assert!((feature.mz() - 100.0).abs() < 1e-9);
        assert!((feature.area() - 40.0).abs() < 1e-9);
        assert_eq!(feature.min_intensity(), 10.0);
        assert_eq!(feature.rt_range(), Range::new(0.0, 4.0));
        assert!((feature.mz_range().width() - 0.002).abs() < 1e-9);
        assert!((feature.deviation() - 0.001).abs() < 1e-9);
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut feature = peak();
        let before = feature.clone();
        feature.close();
        feature.close_at(9.0);
        feature.push_point(Triple::new(5.0, 100.0, 3.0));
        assert_eq!(feature, before);
    }

    #[test]
    fn test_parabola_refines_apex() {
        let feature = Feature::from_triples(
            7,
            vec![
                Triple::new(0.0, 50.0, 0.0),
                Triple::new(1.0, 50.0, 10.0),
                Triple::new(2.0, 50.0, 20.0),
                Triple::new(3.0, 50.0, 15.0),
                Triple::new(4.0, 50.0, 0.0),
            ],
        )
        .unwrap();
        assert!(feature.retention_time() > 2.0 && feature.retention_time() < 2.5);
        assert!(feature.intensity() >= 20.0);
    }

    #[test]
    fn test_empty_data_is_rejected_on_load() {
        let mut value = serde_json::to_value(peak()).unwrap();
        let restored: Feature = serde_json::from_value(value.clone()).unwrap();
        assert_eq!((restored.id(), restored.len()), (1, 5));

        value["data"] = serde_json::json!([]);
        value["closed"] = serde_json::json!(false);
        let error = serde_json::from_value::<Feature>(value).unwrap_err();
        assert!(error.to_string().contains("feature without data points"));
    }

    #[test]
    fn test_copy_frame() {
        let mut feature = peak();
        feature.add_property(Property::score("dw", 1.0));
        let frame = feature.copy_frame();
        assert_eq!(frame.id(), 1);
        assert_eq!(frame.len(), 1);
        assert!(!frame.is_closed());
        assert_eq!(frame.properties(), feature.properties());
    }

    #[test]
    fn test_padded_trace() {
        let feature = peak();
        let padded = feature.padded_trace(2);
        assert_eq!(padded.len(), 7);
        assert!((padded[0].x + 1.0).abs() < 1e-12);
        assert_eq!(padded[0].y, 10.0);
        assert!((padded[6].x - 5.0).abs() < 1e-12);
        assert_eq!(padded[2], Point::new(1.0, 10.0));
    }
}
