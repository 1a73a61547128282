//! Group features into pseudo-spectra by the sharpness of their apexes in retention time.

use tracing::{debug, info};

use crate::data::container::{FeatureContainer, SpectrumContainer};
use crate::data::feature::Feature;
use crate::data::spectrum::PseudoSpectrum;
use crate::errors::{CascadeError, ConfigError};
use crate::params::{Parameter, ParameterMap};
use crate::task::Task;

/// Points inspected on each side of the apex for the sharpness value
const SHARPNESS_REACH: usize = 3;

/// Upper bound on the number of retention time bins of one run
pub const MAX_BINS: usize = 1 << 20;

// ---------------------------------------------------------------------------
// Sharpness
// ---------------------------------------------------------------------------

/// Peak sharpness of a feature around its apex.
///
/// For up to three interior points on either side the drop from the apex is normalized by the
/// distance in points and by `sqrt(apex intensity)`; the maximum of each side is taken and both
/// sides are averaged.
pub fn sharpness(feature: &Feature) -> f64 {
    let data = feature.data();
    if data.len() < 3 {
        return 0.0;
    }
    let apex = apex_index(feature);
    let apex_intensity = data[apex].intensity;
    if apex_intensity <= 0.0 {
        return 0.0;
    }
    let scale = apex_intensity.sqrt();
    let last_interior = data.len() - 2;

    let left = (1..=SHARPNESS_REACH)
        .take_while(|k| *k <= apex && apex - k >= 1)
        .map(|k| (apex_intensity - data[apex - k].intensity) / (k as f64 * scale))
        .fold(0.0, f64::max);
    let right = (1..=SHARPNESS_REACH)
        .take_while(|k| apex + k <= last_interior)
        .map(|k| (apex_intensity - data[apex + k].intensity) / (k as f64 * scale))
        .fold(0.0, f64::max);

    (left + right) / 2.0
}

/// Index of the data point closest in time to the feature's apex
fn apex_index(feature: &Feature) -> usize {
    let rt = feature.retention_time();
    feature
        .data()
        .iter()
        .enumerate()
        .min_by(|a, b| (a.1.rt - rt).abs().total_cmp(&(b.1.rt - rt).abs()))
        .map_or(0, |(i, _)| i)
}

// ---------------------------------------------------------------------------
// Binning
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default)]
struct Bin {
    value: f64,
    members: Vec<usize>,
    taken: bool,
}

/// Pseudo-spectrum builder over retention time bins
#[derive(Clone, Debug)]
pub struct PseudoSpectra {
    /// retention time span covered by `bins` bins
    pub time_window: f64,
    pub bins: usize,
}

impl PseudoSpectra {
    fn bin(&self, features: &[Feature]) -> Result<Vec<Bin>, CascadeError> {
        let (lo, hi) = features.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), f| {
            (lo.min(f.retention_time()), hi.max(f.retention_time()))
        });
        let width = self.time_window / self.bins.max(1) as f64;
        let span = ((hi - lo) / width).floor();
        if !(span < MAX_BINS as f64) {
            return Err(CascadeError::InvalidInput(format!(
                "bin width {} over {} time units needs more than {} bins",
                width,
                hi - lo,
                MAX_BINS
            )));
        }
        let count = span as usize + 1;

        let mut bins = vec![Bin::default(); count];
        for (position, feature) in features.iter().enumerate() {
            let index = (((feature.retention_time() - lo) / width) as usize).min(count - 1);
            bins[index].value += sharpness(feature);
            bins[index].members.push(position);
        }
        Ok(bins)
    }

    /// Whether bin `i` is a strict local maximum within its reach
    fn is_component(&self, bins: &[Bin], i: usize) -> bool {
        let m = bins[i].value;
        let l = bins[i - 1].value;
        let r = bins[i + 1].value;
        if bins[i].members.is_empty() || m <= l || m <= r {
            return false;
        }
        let reach = ((self.bins as f64 / (m + l + r)) * 10.0).round().max(1.0) as usize;
        let down = bins[i.saturating_sub(reach)..i].iter();
        let up = bins[i + 1..(i + 1 + reach).min(bins.len())].iter();
        !down.chain(up).any(|bin| bin.value > m)
    }
}

impl Task for PseudoSpectra {
    const NAME: &'static str = "pseudo_spectra";

    type Input = FeatureContainer;
    type Output = SpectrumContainer;

    fn configure(params: &ParameterMap) -> Result<Self, ConfigError> {
        Ok(PseudoSpectra {
            time_window: params.get_f64(Self::NAME, Parameter::TimeWindow)?,
            bins: params.get_usize(Self::NAME, Parameter::Bins)?,
        })
    }

    fn run(&self, input: &FeatureContainer) -> Result<SpectrumContainer, CascadeError> {
        if !(self.time_window > 0.0) || self.bins == 0 {
            return Err(CascadeError::InvalidInput(format!(
                "time window {} and bin count {} must be positive",
                self.time_window, self.bins
            )));
        }
        info!(container = %input.id, features = input.len(), "grouping features into pseudo-spectra");

        let mut output = SpectrumContainer::new(format!("{}{}", input.id, Self::suffix()), input.ion_mode);
        if input.is_empty() {
            return Ok(output);
        }

        let features = &input.features;
        let mut bins = self.bin(features)?;
        let mut grouped = vec![false; features.len()];
        let mut index = 1;

        for i in 1..bins.len().saturating_sub(1) {
            if bins[i].taken || !self.is_component(&bins, i) {
                continue;
            }
            let mut members = Vec::new();
            for bin in &mut bins[i - 1..=i + 1] {
                if !bin.taken {
                    bin.taken = true;
                    members.extend(bin.members.iter().copied());
                }
            }
            members.iter().for_each(|&m| grouped[m] = true);
            let spectrum = PseudoSpectrum::from_features(index, members.iter().map(|&m| features[m].clone()).collect());
            debug!(index, rt = spectrum.retention_time, features = spectrum.len(), "pseudo-spectrum");
            output.push(spectrum);
            index += 1;
        }

        for (position, feature) in features.iter().enumerate() {
            if !grouped[position] {
                output.push(PseudoSpectrum::from_features(index, vec![feature.clone()]));
                index += 1;
            }
        }

        info!(spectra = output.len(), "pseudo-spectra built");
        Ok(output)
    }
}
