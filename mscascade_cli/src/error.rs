use mscascade::errors::{CascadeError, ConfigError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] CascadeError),

    #[error("Pipeline file has no [{0}] table")]
    MissingStage(&'static str),

    #[error("Stage [background] needs a --background scan file")]
    MissingBackground,

    #[error("Logging setup failed: {0}")]
    Logging(String),
}
