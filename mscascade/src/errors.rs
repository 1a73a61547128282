use std::path::PathBuf;

use crate::params::Parameter;

/// Errors raised while configuring a task
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required parameter was not supplied
    #[error("Task '{task}' requires parameter '{parameter}'")]
    MissingParameter { task: &'static str, parameter: Parameter },

    /// A parameter holds a value of the wrong shape
    #[error("Parameter '{parameter}' must be a {expected}")]
    WrongType { parameter: Parameter, expected: &'static str },

    /// A method selector names no known implementation
    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    #[error("Invalid parameter file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Cannot read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while running a task
#[derive(Debug, thiserror::Error)]
pub enum CascadeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Input containers that cannot be processed together
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
