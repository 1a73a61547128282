use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use mscascade::data::container::{FeatureContainer, SpectrumContainer};
use mscascade::data::scan::ScanContainer;
use mscascade::deconvolution::deconvolver::Deconvolver;
use mscascade::identification::adduct::AdductFinder;
use mscascade::identification::isotope_filter::IsotopeFilter;
use mscascade::identification::isotope_finder::IsotopeFinder;
use mscascade::identification::pseudo::PseudoSpectra;
use mscascade::params::ParameterMap;
use mscascade::processing::background::{BackgroundSubtraction, ScanPair};
use mscascade::processing::baseline::BaselineSubtraction;
use mscascade::processing::feature_builder::FeatureBuilder;
use mscascade::processing::noise_reduction::NoiseReduction;
use mscascade::processing::quality::{CodaFilter, DurbinWatsonFilter};
use tracing::{info, instrument};

use crate::cli::{AnnotateArgs, RunArgs, SerializationFormat};
use crate::error::CliError;
use crate::pipeline::{apply, apply_optional, PipelineConfig};

/// Main function for the 'run' subcommand.
#[instrument(skip(args), fields(samples = args.scans.len()))]
pub fn main_run(args: RunArgs) -> Result<(), CliError> {
    let start = Instant::now();
    let config = PipelineConfig::from_toml_file(&args.config)?;
    config.report_unknown_keys();
    info!("Running stages: {:?}", config.enabled());

    let builder_params = config.feature_builder.as_ref().ok_or(CliError::MissingStage("feature_builder"))?;

    let mut samples = Vec::with_capacity(args.scans.len());
    for path in &args.scans {
        let scans: ScanContainer = read_json(path)?;
        info!("Loaded {} scans from {}", scans.scans.len(), path.display());
        samples.push(scans);
    }

    let samples = match (config.background.as_ref(), args.background.as_ref()) {
        (Some(params), Some(path)) => {
            let blank: ScanContainer = read_json(path)?;
            let pairs: Vec<ScanPair> = samples
                .into_iter()
                .map(|sample| ScanPair { sample, background: blank.clone() })
                .collect();
            apply::<BackgroundSubtraction>(params, &pairs)?
        }
        (Some(_), None) => return Err(CliError::MissingBackground),
        (None, _) => samples,
    };

    let samples = apply_optional::<NoiseReduction, _>(config.noise_reduction.as_ref(), samples)?;
    let features = apply::<FeatureBuilder>(builder_params, &samples)?;
    drop(samples);

    let features = process_features(&config, features)?;

    std::fs::create_dir_all(&args.output_dir)?;
    let outputs = args.scans.iter().map(|path| {
        let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        args.output_dir.join(format!("{}.json", stem))
    });

    match config.pseudo_spectra.as_ref() {
        Some(params) => {
            let spectra = annotate(&config, params, features)?;
            for (container, output) in spectra.iter().zip(outputs) {
                info!("Writing {} spectra to {}", container.len(), output.display());
                write_json(&output, container, args.format)?;
            }
        }
        None => {
            for (container, output) in features.iter().zip(outputs) {
                info!("Writing {} features to {}", container.len(), output.display());
                write_json(&output, container, args.format)?;
            }
        }
    }

    info!("Pipeline finished in {:?}", start.elapsed());
    Ok(())
}

/// Main function for the 'annotate' subcommand.
#[instrument(skip(args))]
pub fn main_annotate(args: AnnotateArgs) -> Result<(), CliError> {
    let config = PipelineConfig::from_toml_file(&args.config)?;
    config.report_unknown_keys();
    let params = config.pseudo_spectra.as_ref().ok_or(CliError::MissingStage("pseudo_spectra"))?;

    let features: FeatureContainer = read_json(&args.features)?;
    info!("Loaded {} features from {}", features.len(), args.features.display());

    let spectra = annotate(&config, params, vec![features])?;
    for container in &spectra {
        info!("Writing {} spectra to {}", container.len(), args.output.display());
        write_json(&args.output, container, args.format)?;
    }
    Ok(())
}

/// Feature stages between building and grouping
fn process_features(config: &PipelineConfig, features: Vec<FeatureContainer>) -> Result<Vec<FeatureContainer>, CliError> {
    let features = apply_optional::<BaselineSubtraction, _>(config.baseline.as_ref(), features)?;
    let features = apply_optional::<Deconvolver, _>(config.deconvolution.as_ref(), features)?;
    let features = apply_optional::<CodaFilter, _>(config.coda.as_ref(), features)?;
    apply_optional::<DurbinWatsonFilter, _>(config.durbin_watson.as_ref(), features)
}

/// Grouping into pseudo-spectra followed by isotope and adduct annotation
fn annotate(
    config: &PipelineConfig,
    grouping: &ParameterMap,
    features: Vec<FeatureContainer>,
) -> Result<Vec<SpectrumContainer>, CliError> {
    let spectra = apply::<PseudoSpectra>(grouping, &features)?;
    let spectra = apply_optional::<IsotopeFinder, _>(config.isotopes.as_ref(), spectra)?;
    let spectra = apply_optional::<AdductFinder, _>(config.adducts.as_ref(), spectra)?;
    apply_optional::<IsotopeFilter, _>(config.isotope_filter.as_ref(), spectra)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

fn write_json<T: Serialize>(path: &Path, value: &T, format: SerializationFormat) -> Result<(), CliError> {
    let mut writer = BufWriter::new(File::create(path)?);
    match format {
        SerializationFormat::Json => serde_json::to_writer(&mut writer, value)?,
        SerializationFormat::PrettyJson => serde_json::to_writer_pretty(&mut writer, value)?,
    }
    writer.flush()?;
    Ok(())
}
