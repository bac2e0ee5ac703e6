use std::path::PathBuf;

use sd_model::ModelError;
use sd_speculative::SpecError;
use thiserror::Error;

use crate::logging::LogError;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("missing required option: {0}")]
    Missing(&'static str),
    #[error("{context}: {source}")]
    Model {
        context: &'static str,
        #[source]
        source: ModelError,
    },
    #[error(transparent)]
    Generation(#[from] SpecError),
    #[error(transparent)]
    Logging(#[from] LogError),
}

impl CliError {
    pub fn model(context: &'static str) -> impl FnOnce(ModelError) -> CliError {
        move |source| CliError::Model { context, source }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;
