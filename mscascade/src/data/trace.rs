use std::collections::{BTreeSet, HashSet};
use std::ops::Bound;

use ordered_float::OrderedFloat;
use tracing::debug;

use crate::data::point::Triple;
use crate::data::range::Range;
use crate::data::scan::Scan;

pub type TraceId = usize;

/// A mass trace: points of one ion species accumulated scan by scan
///
/// The running average m/z is updated on every push; traces are ordered by that average
/// in a `TraceIndex`, never by mutating a key in place.
#[derive(Clone, Debug, PartialEq)]
pub struct Trace {
    pub anchor: f64,
    avg: f64,
    data: Vec<Triple>,
    /// position of the scan in which the trace started
    pub scan_index: usize,
    /// retention time of the scan before the first point
    pub lead_rt: Option<f64>,
    /// retention time of the first scan that did not extend the trace
    pub tail_rt: Option<f64>,
}

impl Trace {
    pub fn new(point: Triple, scan_index: usize) -> Self {
        Trace {
            anchor: point.mz,
            avg: point.mz,
            data: vec![point],
            scan_index,
            lead_rt: None,
            tail_rt: None,
        }
    }

    pub fn push(&mut self, point: Triple) {
        let n = self.data.len() as f64;
        self.avg = (self.avg * n + point.mz) / (n + 1.0);
        self.data.push(point);
    }

    pub fn avg(&self) -> f64 {
        self.avg
    }

    pub fn data(&self) -> &[Triple] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Retention time span from the first to the last point
    pub fn rt_range(&self) -> Range {
        match (self.data.first(), self.data.last()) {
            (Some(first), Some(last)) => Range::new(first.rt, last.rt),
            _ => Range::point(0.0),
        }
    }

    /// Tolerance window around the current average m/z
    pub fn tolerance(&self, ppm: f64) -> Range {
        Range::from_ppm(self.avg, ppm)
    }

    /// Largest intensity among points whose retention time lies in `window`, 0 if none
    pub fn max_intensity_within(&self, window: &Range) -> f64 {
        self.data
            .iter()
            .filter(|p| window.contains(p.rt))
            .map(|p| p.intensity)
            .fold(0.0, f64::max)
    }

    pub fn into_data(self) -> Vec<Triple> {
        self.data
    }
}

/// Sorted index over (average m/z, id) pairs with nearest-key lookup
#[derive(Clone, Debug, Default)]
pub struct TraceIndex {
    keys: BTreeSet<(OrderedFloat<f64>, TraceId)>,
}

impl TraceIndex {
    pub fn new() -> Self {
        TraceIndex { keys: BTreeSet::new() }
    }

    pub fn insert(&mut self, key: f64, id: TraceId) {
        self.keys.insert((OrderedFloat(key), id));
    }

    pub fn remove(&mut self, key: f64, id: TraceId) -> bool {
        self.keys.remove(&(OrderedFloat(key), id))
    }

    /// Re-keys an entry after its average has changed
    pub fn update(&mut self, old_key: f64, new_key: f64, id: TraceId) {
        self.remove(old_key, id);
        self.insert(new_key, id);
    }

    pub fn contains_key(&self, key: f64) -> bool {
        self.keys
            .range((OrderedFloat(key), TraceId::MIN)..=(OrderedFloat(key), TraceId::MAX))
            .next()
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = TraceId> + '_ {
        self.keys.iter().map(|(_, id)| *id)
    }

    /// Nearest key to `value` by absolute distance, ties resolved toward the floor
    ///
    /// # Arguments
    ///
    /// * `value` - the query, usually an m/z
    ///
    /// # Returns
    ///
    /// * `Option<(f64, TraceId)>` - key and id of the closest entry, `None` if the index is empty
    pub fn nearest(&self, value: f64) -> Option<(f64, TraceId)> {
        let probe = (OrderedFloat(value), TraceId::MAX);
        let floor = self.keys.range(..=probe).next_back();
        let ceiling = self.keys.range((Bound::Excluded(probe), Bound::Unbounded)).next();

        let best = match (floor, ceiling) {
            (Some(f), Some(c)) => {
                if (value - f.0.into_inner()).abs() <= (c.0.into_inner() - value).abs() { f } else { c }
            }
            (Some(f), None) => f,
            (None, Some(c)) => c,
            (None, None) => return None,
        };
        Some((best.0.into_inner(), best.1))
    }
}

/// Groups the points of consecutive scans into mass traces
///
/// A point extends the trace with the closest running average m/z when the point lies in the
/// ppm window of that average, is at least as close to it as the next point of the scan, and the
/// trace has not been extended in the current scan. Otherwise the point starts a new trace.
/// Traces not extended by a scan are finalized.
#[derive(Clone, Debug)]
pub struct TraceBuilder {
    ppm: f64,
    arena: Vec<Trace>,
    index: TraceIndex,
    finished: Vec<TraceId>,
    previous_rt: Option<f64>,
    scans_seen: usize,
}

impl TraceBuilder {
    pub fn new(ppm: f64) -> Self {
        TraceBuilder {
            ppm,
            arena: Vec::new(),
            index: TraceIndex::new(),
            finished: Vec::new(),
            previous_rt: None,
            scans_seen: 0,
        }
    }

    pub fn add_scan(&mut self, scan: &Scan) {
        let rt = scan.retention_time;
        let mut extended: HashSet<TraceId> = HashSet::new();
        let mut created: Vec<TraceId> = Vec::new();

        for (i, point) in scan.data.iter().enumerate() {
            let next_mz = scan.data.get(i + 1).map(|p| p.x);
            let triple = Triple::new(rt, point.x, point.y);

            let target = self.index.nearest(point.x).filter(|(avg, id)| {
                !extended.contains(id)
                    && Range::from_ppm(*avg, self.ppm).contains(point.x)
                    && next_mz.map_or(true, |next| (avg - point.x).abs() <= (avg - next).abs())
            });

            match target {
                Some((avg, id)) => {
                    let trace = &mut self.arena[id];
                    trace.push(triple);
                    self.index.update(avg, trace.avg(), id);
                    extended.insert(id);
                }
                None => {
                    let id = self.arena.len();
                    let mut trace = Trace::new(triple, self.scans_seen);
                    trace.lead_rt = self.previous_rt;
                    self.arena.push(trace);
                    created.push(id);
                }
            }
        }

        let stale: Vec<(f64, TraceId)> = self
            .index
            .ids()
            .filter(|id| !extended.contains(id))
            .map(|id| (self.arena[id].avg(), id))
            .collect();

        for (avg, id) in stale {
            self.index.remove(avg, id);
            self.arena[id].tail_rt = Some(rt);
            self.finished.push(id);
        }

        for id in created {
            self.index.insert(self.arena[id].avg(), id);
        }

        self.previous_rt = Some(rt);
        self.scans_seen += 1;
    }

    /// Number of scans consumed so far
    pub fn scans_seen(&self) -> usize {
        self.scans_seen
    }

    /// Finalizes all open traces and returns every trace ordered by start time, then m/z
    pub fn finish(self) -> Vec<Trace> {
        let TraceBuilder { arena, index, mut finished, .. } = self;
        finished.extend(index.ids());

        let mut slots: Vec<Option<Trace>> = arena.into_iter().map(Some).collect();
        let mut traces: Vec<Trace> = finished.into_iter().filter_map(|id| slots[id].take()).collect();
        traces.sort_by(|a, b| a.scan_index.cmp(&b.scan_index).then(a.anchor.total_cmp(&b.anchor)));

        debug!(traces = traces.len(), "trace building finished");
        traces
    }

    /// Finalized traces keyed by the retention time span they cover
    pub fn finish_by_time(self) -> Vec<(Range, Trace)> {
        self.finish().into_iter().map(|trace| (trace.rt_range(), trace)).collect()
    }
}

/// Builds all traces over a sequence of scans
pub fn build_traces<'a>(scans: impl IntoIterator<Item = &'a Scan>, ppm: f64) -> Vec<Trace> {
    let mut builder = TraceBuilder::new(ppm);
    for scan in scans {
        builder.add_scan(scan);
    }
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::point::Point;
    use crate::data::scan::IonMode;

    fn scan(index: usize, rt: f64, points: &[(f64, f64)]) -> Scan {
        Scan::new(index, 1, IonMode::Positive, rt, points.iter().map(|&(x, y)| Point::new(x, y)).collect())
    }

    #[test]
    fn test_running_average() {
        let mut trace = Trace::new(Triple::new(1.0, 100.0, 10.0), 0);
        trace.push(Triple::new(2.0, 100.002, 10.0));
        assert!((trace.avg() - 100.001).abs() < 1e-9);
        trace.push(Triple::new(3.0, 100.004, 10.0));
        assert!((trace.avg() - 100.002).abs() < 1e-9);
        assert_eq!(trace.anchor, 100.0);
    }

    #[test]
    fn test_nearest_ties_go_to_floor() {
        let mut index = TraceIndex::new();
        index.insert(10.0, 0);
        index.insert(12.0, 1);
        assert_eq!(index.nearest(11.0), Some((10.0, 0)));
        assert_eq!(index.nearest(11.5), Some((12.0, 1)));
        assert_eq!(index.nearest(5.0), Some((10.0, 0)));
        assert_eq!(index.nearest(50.0), Some((12.0, 1)));
        assert!(TraceIndex::new().nearest(1.0).is_none());
    }

    #[test]
    fn test_update_rekeys() {
        let mut index = TraceIndex::new();
        index.insert(10.0, 0);
        index.update(10.0, 11.0, 0);
        assert!(!index.contains_key(10.0));
        assert!(index.contains_key(11.0));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_builder_groups_within_tolerance() {
        let scans = vec![
            scan(0, 1.0, &[(100.0, 5.0), (200.0, 5.0)]),
            scan(1, 2.0, &[(100.0005, 6.0), (200.1, 6.0)]),
            scan(2, 3.0, &[(100.0002, 7.0)]),
        ];
        let traces = build_traces(&scans, 10.0);
        // 100 trace, 200.0 trace, 200.1 trace
        assert_eq!(traces.len(), 3);
        let main = traces.iter().find(|t| t.anchor == 100.0).unwrap();
        assert_eq!(main.len(), 3);
        assert_eq!(main.lead_rt, None);
        let first = traces.iter().find(|t| t.anchor == 200.0).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first.tail_rt, Some(2.0));
        let late = traces.iter().find(|t| t.anchor == 200.1).unwrap();
        assert_eq!(late.lead_rt, Some(1.0));
        assert_eq!(late.tail_rt, Some(3.0));
    }

    #[test]
    fn test_trace_extended_once_per_scan() {
        let scans = vec![
            scan(0, 1.0, &[(100.0, 5.0)]),
            scan(1, 2.0, &[(100.0001, 6.0), (100.0002, 6.0)]),
        ];
        let traces = build_traces(&scans, 10.0);
        assert_eq!(traces.len(), 2);
        assert_eq!(traces.iter().map(|t| t.len()).sum::<usize>(), 3);
    }

    #[test]
    fn test_max_intensity_within() {
        let mut trace = Trace::new(Triple::new(1.0, 100.0, 3.0), 0);
        trace.push(Triple::new(2.0, 100.0, 9.0));
        trace.push(Triple::new(3.0, 100.0, 4.0));
        assert_eq!(trace.max_intensity_within(&Range::new(2.5, 3.5)), 4.0);
        assert_eq!(trace.max_intensity_within(&Range::new(0.0, 5.0)), 9.0);
        assert_eq!(trace.max_intensity_within(&Range::new(5.0, 6.0)), 0.0);
    }
}
