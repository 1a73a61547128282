use tracing::info;

use crate::data::container::FeatureContainer;
use crate::data::feature::Feature;
use crate::data::property::Property;
use crate::errors::{CascadeError, ConfigError};
use crate::params::{Parameter, ParameterMap};
use crate::task::Task;

// ----------------------------------------------------------------------------
// Scores
// ----------------------------------------------------------------------------

/// Modified CODA quality (MCQ) of a chromatogram
///
/// Correlates the length-normalised raw intensities with the standardised moving average of width
/// `window`. Chromatograms dominated by smooth peaks score close to 1, spiky noise close to 0.
///
/// # Arguments
///
/// * `intensities` - chromatogram intensities including both anchors
/// * `window` - moving average width
///
/// # Returns
///
/// * `f64` - the score, 0 for series too short for the window or without variance
pub fn mcq(intensities: &[f64], window: usize) -> f64 {
    let n_points = intensities.len();
    if window == 0 || n_points <= window + 3 {
        return 0.0;
    }
    let len = n_points - window - 2;

    let mut smoothed = Vec::with_capacity(len);
    let mut scale = 0.0;
    let (mut n, mut mean, mut m2) = (0.0, 0.0, 0.0);

    for i in 1..=len {
        let value = intensities[i..i + window].iter().sum::<f64>() / window as f64;
        scale += intensities[i] * intensities[i];

        n += 1.0;
        let delta = value - mean;
        mean += delta / n;
        m2 += delta * (value - mean);

        smoothed.push(value);
    }
    scale += intensities[n_points - window..n_points - 1].iter().map(|y| y * y).sum::<f64>();
    let scale = scale.sqrt();
    let std_dev = (m2 / (n - 1.0)).sqrt();

    if scale == 0.0 || std_dev == 0.0 || !std_dev.is_finite() {
        return 0.0;
    }

    let score: f64 = smoothed
        .iter()
        .enumerate()
        .map(|(i, s)| (intensities[i + 1] / scale) * ((s - mean) / std_dev))
        .sum();

    let score = score.max(0.0) / ((n_points - window) as f64).sqrt();
    if score.is_finite() { score } else { 0.0 }
}

/// Durbin-Watson statistic of the first differences of the interior intensities
///
/// Returns 0 for fewer than four points or when all differences vanish.
pub fn durbin_watson(intensities: &[f64]) -> f64 {
    if intensities.len() < 4 {
        return 0.0;
    }
    let mut differences = vec![0.0; intensities.len() - 2];
    let mut squares = 0.0;
    for i in 1..differences.len() {
        differences[i] = intensities[i + 1] - intensities[i];
        squares += differences[i] * differences[i];
    }
    if squares == 0.0 {
        return 0.0;
    }
    let successive: f64 = differences.windows(2).map(|w| (w[1] - w[0]) * (w[1] - w[0])).sum();
    successive / squares
}

fn intensities(feature: &Feature) -> Vec<f64> {
    feature.data().iter().map(|p| p.intensity).collect()
}

// ----------------------------------------------------------------------------
// Tasks
// ----------------------------------------------------------------------------

/// Keeps features whose MCQ score reaches the threshold
#[derive(Clone, Debug)]
pub struct CodaFilter {
    pub threshold: f64,
    pub window: usize,
}

impl Task for CodaFilter {
    const NAME: &'static str = "coda";

    type Input = FeatureContainer;
    type Output = FeatureContainer;

    fn configure(params: &ParameterMap) -> Result<Self, ConfigError> {
        Ok(CodaFilter {
            threshold: params.get_f64(Self::NAME, Parameter::Coda)?,
            window: params.get_usize(Self::NAME, Parameter::ScanWindow)?,
        })
    }

    fn run(&self, input: &FeatureContainer) -> Result<FeatureContainer, CascadeError> {
        let mut output = input.derive(&Self::suffix());
        for feature in input.iter() {
            let score = mcq(&intensities(feature), self.window);
            if score >= self.threshold {
                let mut kept = feature.clone();
                kept.add_property(Property::score("mcq", score));
                output.push(kept);
            }
        }
        info!(features_in = input.len(), features_out = output.len(), "CODA filter finished");
        Ok(output)
    }
}

/// Keeps features whose Durbin-Watson statistic stays below the threshold
#[derive(Clone, Debug)]
pub struct DurbinWatsonFilter {
    pub threshold: f64,
}

impl Task for DurbinWatsonFilter {
    const NAME: &'static str = "durbin_watson";

    type Input = FeatureContainer;
    type Output = FeatureContainer;

    fn configure(params: &ParameterMap) -> Result<Self, ConfigError> {
        Ok(DurbinWatsonFilter { threshold: params.get_f64(Self::NAME, Parameter::Durbin)? })
    }

    fn run(&self, input: &FeatureContainer) -> Result<FeatureContainer, CascadeError> {
        let mut output = input.derive(&Self::suffix());
        for feature in input.iter() {
            let score = durbin_watson(&intensities(feature));
            if score <= self.threshold {
                let mut kept = feature.clone();
                kept.add_property(Property::score("dw", score));
                output.push(kept);
            }
        }
        info!(features_in = input.len(), features_out = output.len(), "Durbin-Watson filter finished");
        Ok(output)
    }
}
