use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// Named task parameters, written in snake_case in parameter files
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Parameter {
    TimeWindow,
    MzWindowPpm,
    ScaleFactor,
    ScanWindow,
    MinTraceWidth,
    MinFeatureIntensity,
    MinProfileIntensity,
    NoiseFactor,
    Center,
    DerivativeThreshold,
    SgLevel,
    Charge,
    Coda,
    Durbin,
    Bins,
    AdductList,
    Method,
    IsotopeMethod,
    Keep,
}

impl Parameter {
    pub const ALL: [Parameter; 19] = [
        Parameter::TimeWindow,
        Parameter::MzWindowPpm,
        Parameter::ScaleFactor,
        Parameter::ScanWindow,
        Parameter::MinTraceWidth,
        Parameter::MinFeatureIntensity,
        Parameter::MinProfileIntensity,
        Parameter::NoiseFactor,
        Parameter::Center,
        Parameter::DerivativeThreshold,
        Parameter::SgLevel,
        Parameter::Charge,
        Parameter::Coda,
        Parameter::Durbin,
        Parameter::Bins,
        Parameter::AdductList,
        Parameter::Method,
        Parameter::IsotopeMethod,
        Parameter::Keep,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Parameter::TimeWindow => "time_window",
            Parameter::MzWindowPpm => "mz_window_ppm",
            Parameter::ScaleFactor => "scale_factor",
            Parameter::ScanWindow => "scan_window",
            Parameter::MinTraceWidth => "min_trace_width",
            Parameter::MinFeatureIntensity => "min_feature_intensity",
            Parameter::MinProfileIntensity => "min_profile_intensity",
            Parameter::NoiseFactor => "noise_factor",
            Parameter::Center => "center",
            Parameter::DerivativeThreshold => "derivative_threshold",
            Parameter::SgLevel => "sg_level",
            Parameter::Charge => "charge",
            Parameter::Coda => "coda",
            Parameter::Durbin => "durbin",
            Parameter::Bins => "bins",
            Parameter::AdductList => "adduct_list",
            Parameter::Method => "method",
            Parameter::IsotopeMethod => "isotope_method",
            Parameter::Keep => "keep",
        }
    }

    pub fn from_key(key: &str) -> Option<Parameter> {
        Parameter::ALL.into_iter().find(|p| p.key() == key)
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A raw parameter value as read from a parameter file
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

/// Parameters of one task, checked for presence and shape only
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterMap {
    values: BTreeMap<String, ParameterValue>,
}

impl ParameterMap {
    pub fn new() -> Self {
        ParameterMap { values: BTreeMap::new() }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&content)
    }

    /// Builder style insertion
    pub fn with(mut self, parameter: Parameter, value: impl Into<ParameterValue>) -> Self {
        self.insert(parameter, value);
        self
    }

    pub fn insert(&mut self, parameter: Parameter, value: impl Into<ParameterValue>) {
        self.values.insert(parameter.key().to_string(), value.into());
    }

    pub fn contains(&self, parameter: Parameter) -> bool {
        self.values.contains_key(parameter.key())
    }

    /// Keys that do not name any known parameter
    pub fn unknown_keys(&self) -> Vec<&str> {
        self.values.keys().filter(|k| Parameter::from_key(k).is_none()).map(String::as_str).collect()
    }

    fn require(&self, task: &'static str, parameter: Parameter) -> Result<&ParameterValue, ConfigError> {
        self.values
            .get(parameter.key())
            .ok_or(ConfigError::MissingParameter { task, parameter })
    }

    pub fn get_f64(&self, task: &'static str, parameter: Parameter) -> Result<f64, ConfigError> {
        match self.require(task, parameter)? {
            ParameterValue::Float(v) => Ok(*v),
            ParameterValue::Integer(v) => Ok(*v as f64),
            _ => Err(ConfigError::WrongType { parameter, expected: "number" }),
        }
    }

    pub fn get_usize(&self, task: &'static str, parameter: Parameter) -> Result<usize, ConfigError> {
        match self.require(task, parameter)? {
            ParameterValue::Integer(v) if *v >= 0 => Ok(*v as usize),
            _ => Err(ConfigError::WrongType { parameter, expected: "non-negative integer" }),
        }
    }

    pub fn get_bool(&self, task: &'static str, parameter: Parameter) -> Result<bool, ConfigError> {
        match self.require(task, parameter)? {
            ParameterValue::Bool(v) => Ok(*v),
            _ => Err(ConfigError::WrongType { parameter, expected: "boolean" }),
        }
    }

    pub fn get_str(&self, task: &'static str, parameter: Parameter) -> Result<&str, ConfigError> {
        match self.require(task, parameter)? {
            ParameterValue::Text(v) => Ok(v.as_str()),
            _ => Err(ConfigError::WrongType { parameter, expected: "string" }),
        }
    }

    pub fn get_f64_or(&self, task: &'static str, parameter: Parameter, default: f64) -> Result<f64, ConfigError> {
        if self.contains(parameter) { self.get_f64(task, parameter) } else { Ok(default) }
    }

    /// Like `get_usize`, but an absent parameter yields `default`
    pub fn get_usize_or(&self, task: &'static str, parameter: Parameter, default: usize) -> Result<usize, ConfigError> {
        if self.contains(parameter) { self.get_usize(task, parameter) } else { Ok(default) }
    }

    pub fn get_bool_or(&self, task: &'static str, parameter: Parameter, default: bool) -> Result<bool, ConfigError> {
        if self.contains(parameter) { self.get_bool(task, parameter) } else { Ok(default) }
    }

    pub fn get_str_or<'a>(&'a self, task: &'static str, parameter: Parameter, default: &'a str) -> Result<&'a str, ConfigError> {
        if self.contains(parameter) { self.get_str(task, parameter) } else { Ok(default) }
    }
}

impl From<bool> for ParameterValue {
    fn from(value: bool) -> Self {
        ParameterValue::Bool(value)
    }
}

impl From<i64> for ParameterValue {
    fn from(value: i64) -> Self {
        ParameterValue::Integer(value)
    }
}

impl From<usize> for ParameterValue {
    fn from(value: usize) -> Self {
        ParameterValue::Integer(value as i64)
    }
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        ParameterValue::Float(value)
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        ParameterValue::Text(value.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(value: String) -> Self {
        ParameterValue::Text(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_getters() {
        let params = ParameterMap::new()
            .with(Parameter::TimeWindow, 6.0)
            .with(Parameter::ScanWindow, 10usize)
            .with(Parameter::Center, true)
            .with(Parameter::Method, "biehman");
        assert_eq!(params.get_f64("test", Parameter::TimeWindow).unwrap(), 6.0);
        assert_eq!(params.get_f64("test", Parameter::ScanWindow).unwrap(), 10.0);
        assert_eq!(params.get_usize("test", Parameter::ScanWindow).unwrap(), 10);
        assert!(params.get_bool("test", Parameter::Center).unwrap());
        assert_eq!(params.get_str("test", Parameter::Method).unwrap(), "biehman");
        assert_eq!(params.get_usize_or("test", Parameter::Charge, 3).unwrap(), 3);
    }

    #[test]
    fn test_missing_and_wrong_type() {
        let params = ParameterMap::new().with(Parameter::Center, 1.5);
        assert!(matches!(
            params.get_f64("baseline", Parameter::ScanWindow),
            Err(ConfigError::MissingParameter { task: "baseline", parameter: Parameter::ScanWindow })
        ));
        assert!(matches!(params.get_bool("baseline", Parameter::Center), Err(ConfigError::WrongType { .. })));
    }

    #[test]
    fn test_from_toml() {
        let params = ParameterMap::from_toml_str(
            "time_window = 6\nmz_window_ppm = 10.5\ncenter = false\nmethod = \"sg\"\nbogus = 1\n",
        )
        .unwrap();
        assert_eq!(params.get_f64("t", Parameter::TimeWindow).unwrap(), 6.0);
        assert_eq!(params.get_f64("t", Parameter::MzWindowPpm).unwrap(), 10.5);
        assert!(!params.get_bool("t", Parameter::Center).unwrap());
        assert_eq!(params.unknown_keys(), vec!["bogus"]);
    }
}
