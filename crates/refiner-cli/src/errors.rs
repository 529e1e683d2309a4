//! Error types for the CLI runtime.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use refiner_config::{ConfigError, PipelineError};
use thiserror::Error;

use crate::telemetry::TelemetryError;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(ConfigError),
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error("failed to load pipeline definition: {0}")]
    LoadPipeline(PipelineError),
    #[error("workspace {path} is not a directory")]
    MissingWorkspace { path: PathBuf },
    #[error("failed to read file list from stdin: {0}")]
    ReadInput(io::Error),
    #[error("failed to serialise run summary: {0}")]
    SerialiseOutput(serde_json::Error),
    #[error("failed to write run summary: {0}")]
    WriteOutput(io::Error),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
}
