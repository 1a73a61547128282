use std::path::Path;

use mscascade::errors::ConfigError;
use mscascade::params::ParameterMap;
use mscascade::task::{run_parallel, Task};
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::CliError;

/// Parameter tables of a pipeline file, one per stage; absent tables skip the stage
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    pub background: Option<ParameterMap>,
    pub noise_reduction: Option<ParameterMap>,
    pub feature_builder: Option<ParameterMap>,
    pub baseline: Option<ParameterMap>,
    pub deconvolution: Option<ParameterMap>,
    pub coda: Option<ParameterMap>,
    pub durbin_watson: Option<ParameterMap>,
    pub pseudo_spectra: Option<ParameterMap>,
    pub isotopes: Option<ParameterMap>,
    pub adducts: Option<ParameterMap>,
    pub isotope_filter: Option<ParameterMap>,
}

impl PipelineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&content)
    }

    fn tables(&self) -> [(&'static str, Option<&ParameterMap>); 11] {
        [
            ("background", self.background.as_ref()),
            ("noise_reduction", self.noise_reduction.as_ref()),
            ("feature_builder", self.feature_builder.as_ref()),
            ("baseline", self.baseline.as_ref()),
            ("deconvolution", self.deconvolution.as_ref()),
            ("coda", self.coda.as_ref()),
            ("durbin_watson", self.durbin_watson.as_ref()),
            ("pseudo_spectra", self.pseudo_spectra.as_ref()),
            ("isotopes", self.isotopes.as_ref()),
            ("adducts", self.adducts.as_ref()),
            ("isotope_filter", self.isotope_filter.as_ref()),
        ]
    }

    /// Warns about parameter keys no task understands
    pub fn report_unknown_keys(&self) {
        for (table, params) in self.tables() {
            let Some(params) = params else { continue };
            for key in params.unknown_keys() {
                warn!(table, key, "ignoring unknown parameter");
            }
        }
    }

    /// Names of the stages that will run, in table order
    pub fn enabled(&self) -> Vec<&'static str> {
        self.tables()
            .into_iter()
            .filter_map(|(table, params)| params.map(|_| table))
            .collect()
    }
}

/// Configures `T` and runs it over every input, failing on the first error
pub fn apply<T: Task>(params: &ParameterMap, inputs: &[T::Input]) -> Result<Vec<T::Output>, CliError> {
    let task = T::configure(params)?;
    let outputs = run_parallel(&task, inputs).into_iter().collect::<Result<Vec<_>, _>>()?;
    Ok(outputs)
}

/// Runs a same-typed stage when its table is present and passes inputs through otherwise
pub fn apply_optional<T, C>(params: Option<&ParameterMap>, inputs: Vec<C>) -> Result<Vec<C>, CliError>
where
    T: Task<Input = C, Output = C>,
    C: Sync + Send,
{
    match params {
        Some(params) => apply::<T>(params, &inputs),
        None => {
            info!(task = T::NAME, "stage not configured, skipping");
            Ok(inputs)
        }
    }
}
