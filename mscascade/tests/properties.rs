use proptest::prelude::*;

use mscascade::data::feature::Feature;
use mscascade::data::point::{Point, Triple};
use mscascade::data::range::Range;
use mscascade::data::scan::{IonMode, Scan, ScanContainer};
use mscascade::data::trace::build_traces;
use mscascade::deconvolution::biehman::BiehmanDeconvolution;
use mscascade::deconvolution::deconvolver::Deconvolution;
use mscascade::identification::isotope_filter::is_monoisotopic;
use mscascade::identification::isotope_finder::IsotopeDetection;
use mscascade::identification::isotope_graph::GraphIsotopeDetector;
use mscascade::identification::isotope_rec::RecursiveIsotopeDetector;
use mscascade::processing::background::BackgroundSubtraction;
use mscascade::processing::baseline::BaselineSubtraction;

const PPM: f64 = 10.0;

fn scan(index: usize, mzs: &[f64], intensity: f64) -> Scan {
    let data = mzs.iter().map(|&mz| Point::new(mz, intensity)).collect();
    Scan::new(index, 1, IonMode::Positive, index as f64, data)
}

/// m/z values on a 0.5 mDa grid so that neighbours compete for the same trace
fn scan_mzs() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::btree_set(0u32..60, 1..12)
        .prop_map(|steps| steps.into_iter().map(|k| 100.0 + k as f64 * 0.0005).collect())
}

fn feature(intensities: &[f64]) -> Feature {
    let data = intensities
        .iter()
        .enumerate()
        .map(|(i, &y)| Triple::new(i as f64, 250.0 + i as f64 * 1e-4, y))
        .collect();
    Feature::from_triples(1, data).unwrap()
}

fn gaussian_feature(len: usize, peaks: &[(f64, f64, f64)], noise: &[f64]) -> Feature {
    let intensities: Vec<f64> = (0..len)
        .map(|i| {
            if i == 0 || i == len - 1 {
                return 0.0;
            }
            let x = i as f64;
            let signal: f64 = peaks
                .iter()
                .map(|(height, center, sigma)| height * (-((x - center) / sigma).powi(2) / 2.0).exp())
                .sum();
            signal + noise[i % noise.len()]
        })
        .collect();
    feature(&intensities)
}

proptest! {
    /// Every point joined a trace within the ppm window of the trace's running average
    #[test]
    fn prop_trace_points_within_tolerance(scans in prop::collection::vec(scan_mzs(), 2..12)) {
        let scans: Vec<Scan> = scans.iter().enumerate().map(|(i, mzs)| scan(i, mzs, 100.0)).collect();
        let traces = build_traces(scans.iter(), PPM);

        let total: usize = traces.iter().map(|t| t.len()).sum();
        prop_assert_eq!(total, scans.iter().map(|s| s.data.len()).sum::<usize>());

        for trace in &traces {
            let data = trace.data();
            let mut avg = data[0].mz;
            for (n, point) in data.iter().enumerate().skip(1) {
                prop_assert!(Range::from_ppm(avg, PPM).contains(point.mz));
                prop_assert!(point.rt > data[n - 1].rt);
                avg = (avg * n as f64 + point.mz) / (n as f64 + 1.0);
            }
        }
    }

    /// Closing twice leaves the derived statistics untouched
    #[test]
    fn prop_close_is_idempotent(intensities in prop::collection::vec(0.0f64..1e6, 1..40), rt in 0.0f64..100.0) {
        let mut feature = feature(&intensities);
        let closed = feature.clone();
        feature.close();
        feature.close_at(rt);
        prop_assert_eq!(feature, closed);
    }

    /// A window that does not fit the series returns the feature unchanged
    #[test]
    fn prop_top_hat_boundary(intensities in prop::collection::vec(0.0f64..1e4, 1..30), small in any::<bool>()) {
        let feature = feature(&intensities);
        let scan_window = if small { 1 } else { 2 * intensities.len() };
        let corrected = BaselineSubtraction::new(scan_window).apply(&feature);
        prop_assert_eq!(corrected.data(), feature.data());
    }

    /// Points without a reference trace inside the ppm window keep their intensity exactly
    #[test]
    fn prop_background_keeps_unmatched_points(
        blank in prop::collection::vec(200.0f64..201.0, 1..10),
        sample in prop::collection::vec((300.0f64..310.0, 1.0f64..1e5), 1..20),
        scale_factor in 0.1f64..10.0,
    ) {
        let mut background = ScanContainer::new("blank", IonMode::Positive);
        for index in 0..3 {
            background.push(scan(index, &blank, 5000.0));
        }
        let task = BackgroundSubtraction { time_window: 4.0, ppm: PPM, scale_factor };
        let reference = task.reference_traces(&background);

        let points: Vec<Point> = sample.iter().map(|&(mz, y)| Point::new(mz, y)).collect();
        let sample_scan = Scan::new(1, 1, IonMode::Positive, 1.0, points);
        let subtracted = task.subtract_scan(&sample_scan, &reference);
        prop_assert_eq!(subtracted.data, sample_scan.data);
    }

    /// Accepted Biehman peaks cover disjoint, increasing index ranges; neighbours may share a boundary point
    #[test]
    fn prop_biehman_boundaries_do_not_overlap(
        len in 12usize..60,
        peaks in prop::collection::vec((50.0f64..1000.0, 0.0f64..1.0, 1.0f64..4.0), 1..4),
        noise in prop::collection::vec(0.0f64..5.0, 1..7),
        half_window in 0usize..6,
    ) {
        let peaks: Vec<(f64, f64, f64)> =
            peaks.iter().map(|&(h, c, s)| (h, 1.0 + c * (len - 3) as f64, s)).collect();
        let source = gaussian_feature(len, &peaks, &noise);
        let method = BiehmanDeconvolution { half_window, center: false, noise_factor: 4.0 };

        let mut next_id = 1;
        let resolved = method.deconvolve(&source, &mut next_id);
        prop_assert_eq!(next_id, resolved.len() + 1);

        let span = |f: &Feature| {
            let interior = f.interior();
            (interior[0].rt, interior[interior.len() - 1].rt)
        };
        for pair in resolved.windows(2) {
            prop_assert!(span(&pair[0]).1 <= span(&pair[1]).0);
            prop_assert!(pair[0].id() < pair[1].id());
        }
    }

    /// Each envelope has exactly one monoisotopic member and every other member points to it
    #[test]
    fn prop_isotope_envelopes_are_unique(
        bases in prop::collection::vec((150.0f64..600.0, 1e3f64..1e5), 1..6),
        depth in prop::collection::vec(0usize..4, 1..6),
        graph in any::<bool>(),
    ) {
        let mut features = Vec::new();
        for (k, &(mz, intensity)) in bases.iter().enumerate() {
            let mut parent_intensity = intensity;
            for d in 0..=depth[k % depth.len()] {
                let ratio = match d {
                    0 => 1.0,
                    1 => 0.006359 * (mz / 10.0) - 0.001681,
                    _ => 0.0009969 * (mz / 10.0) - 0.0068281,
                };
                let y = parent_intensity * ratio;
                parent_intensity = y;
                let id = features.len() + 1;
                let peak_mz = mz + d as f64 * 1.0033;
                features.push(Feature::from_triples(id, vec![
                    Triple::new(0.0, peak_mz, 0.0),
                    Triple::new(1.0, peak_mz, y),
                    Triple::new(2.0, peak_mz, 0.0),
                ]).unwrap());
            }
        }
        let detector: Box<dyn IsotopeDetection> = if graph {
            Box::new(GraphIsotopeDetector::new(3, PPM))
        } else {
            Box::new(RecursiveIsotopeDetector::new(3, PPM))
        };
        detector.detect(&mut features);

        for main in features.iter().filter(|f| is_monoisotopic(f)) {
            for member in main.properties().isotopes().filter(|i| i.position != 0) {
                prop_assert_eq!(member.parent_id, main.id());
                let child = features.iter().find(|f| f.id() == member.child_id).unwrap();
                prop_assert!(!is_monoisotopic(child));
                let labels: Vec<_> = child.properties().isotopes().collect();
                prop_assert_eq!(labels.len(), 1);
                prop_assert_eq!(labels[0].parent_id, main.id());
            }
        }
        for feature in features.iter().filter(|f| !is_monoisotopic(f)) {
            for isotope in feature.properties().isotopes() {
                let parent = features.iter().find(|f| f.id() == isotope.parent_id).unwrap();
                prop_assert!(is_monoisotopic(parent));
            }
        }
    }
}
