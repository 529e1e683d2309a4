//! Shared configuration for the refiner toolchain.
//!
//! Two layers live here. [`Config`] holds runtime settings resolved by
//! `ortho_config` from defaults, a configuration file, `REFINER_*`
//! environment variables and command-line flags, in increasing precedence.
//! [`PipelineDefinition`] is the declarative pass list and validation command
//! read from a YAML file named by [`Config::pipeline_path`].

mod defaults;
mod logging;
pub mod pipeline;
mod rollback;

use std::borrow::Cow;
use std::ffi::OsString;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::declarative::LayerComposition;
use ortho_config::serde_json::Value;
use ortho_config::{MergeLayer, MergeProvenance, OrthoConfig, OrthoResult};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use defaults::{
    DEFAULT_CONCURRENCY, DEFAULT_LOG_FILTER, DEFAULT_MAX_ITERATIONS, DEFAULT_PIPELINE_PATH,
    default_log_filter_string, default_log_format, default_pipeline_path,
    default_rollback_scope,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use pipeline::{
    CommandTemplate, PassDefinition, PipelineDefinition, PipelineError, TemplateError,
};
pub use rollback::{RollbackScope, RollbackScopeParseError};

/// Runtime settings shared by the CLI and the pipeline core.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "REFINER")]
pub struct Config {
    /// Tracing filter expression, e.g. `info` or `refiner_pipeline=debug`.
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Output format for log events written to stderr.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
    /// YAML file declaring the passes and the validation command.
    #[ortho_config(default = default_pipeline_path())]
    pub pipeline_path: Utf8PathBuf,
    /// Number of files processed at once.
    #[ortho_config(default = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,
    /// Attempts allowed per pass before rolling the file back.
    #[ortho_config(default = DEFAULT_MAX_ITERATIONS)]
    pub max_iterations: u32,
    /// Keep going with later passes and files after an unresolved failure.
    #[ortho_config(default = false)]
    pub ignore_failure: bool,
    /// Per-invocation timeout in seconds for tools and validation; `0`
    /// disables it.
    #[ortho_config(default = 0)]
    pub timeout_secs: u64,
    /// Content restored when a pass exhausts its iterations.
    #[ortho_config(default = default_rollback_scope())]
    pub rollback_scope: RollbackScope,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            pipeline_path: default_pipeline_path(),
            concurrency: DEFAULT_CONCURRENCY,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            ignore_failure: false,
            timeout_secs: 0,
            rollback_scope: default_rollback_scope(),
        }
    }
}

/// Boolean flags parsed as `clap` switches. An absent switch still parses as
/// `false`, which would otherwise mask file and environment values.
const SWITCH_KEYS: &[&str] = &["ignore_failure"];

impl Config {
    /// Resolves configuration from `args` layered over defaults, the
    /// configuration file and `REFINER_*` environment variables.
    ///
    /// Switches left off the command line do not override lower layers.
    ///
    /// # Errors
    ///
    /// Returns the `ortho_config` error when a layer cannot be parsed or the
    /// merged values do not deserialise.
    pub fn load_from_args<I, T>(args: I) -> OrthoResult<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let (layers, errors) = Self::compose_layers_from_iter(args).into_parts();
        let layers = layers.into_iter().map(without_unset_switches).collect();
        LayerComposition::new(layers, errors)
            .into_merge_result(|layers| Self::merge_from_layers(layers))
    }

    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Location of the pipeline definition.
    #[must_use]
    pub fn pipeline_path(&self) -> &Utf8Path {
        self.pipeline_path.as_path()
    }

    /// Per-invocation timeout, when one is configured.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        if self.timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.timeout_secs))
        }
    }

    /// Rejects settings the pipeline cannot honour.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when `concurrency` or `max_iterations` is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::ZeroIterations);
        }
        Ok(())
    }
}

fn without_unset_switches(layer: MergeLayer<'static>) -> MergeLayer<'static> {
    if layer.provenance() != MergeProvenance::Cli {
        return layer;
    }
    let mut value = layer.into_value();
    if let Some(fields) = value.as_object_mut() {
        for key in SWITCH_KEYS {
            if fields.get(*key) == Some(&Value::Bool(false)) {
                fields.remove(*key);
            }
        }
    }
    MergeLayer::cli(Cow::Owned(value))
}

/// Runtime settings that were loaded but cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The worker pool must hold at least one worker.
    #[error("concurrency must be at least 1")]
    ZeroConcurrency,
    /// Every pass needs at least one attempt.
    #[error("max_iterations must be at least 1")]
    ZeroIterations,
}
