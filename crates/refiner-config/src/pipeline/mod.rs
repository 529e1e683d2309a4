//! Declarative pipeline definitions.
//!
//! A pipeline file lists the passes to run, in order, and the command that
//! validates each change:
//!
//! ```yaml
//! validation_command: ["pytest", "-q"]
//! passes:
//!   - name: black
//!     command: ["black", "{file}"]
//!   - name: flake8
//!     command: ["flake8", "{file}"]
//!     timeout_secs: 60
//! ```
//!
//! Definitions are validated on load so that a broken pass or validation
//! command is reported before any file is touched.

mod template;

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub use template::{CommandTemplate, TemplateError};

/// Errors raised while loading or validating a pipeline definition.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// The pipeline file could not be read.
    #[error("failed to read pipeline file {path}: {source}")]
    Read {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },
    /// The pipeline file is not valid YAML for the expected shape.
    #[error("failed to parse pipeline file {origin}: {message}")]
    Parse {
        /// File path, or `<inline>` for in-memory sources.
        origin: String,
        /// Parser diagnostic.
        message: String,
    },
    /// No passes were declared.
    #[error("pipeline declares no passes")]
    NoPasses,
    /// The validation command is unusable.
    #[error("invalid validation command: {source}")]
    ValidationCommand {
        /// Template problem.
        #[source]
        source: TemplateError,
    },
    /// A pass has an empty name.
    #[error("pass #{position} has an empty name")]
    UnnamedPass {
        /// One-based position of the pass in the file.
        position: usize,
    },
    /// Two passes share a name.
    #[error("pass '{name}' is declared more than once")]
    DuplicatePass {
        /// Name declared twice.
        name: String,
    },
    /// A pass command is unusable.
    #[error("invalid command for pass '{name}': {source}")]
    PassCommand {
        /// Pass name.
        name: String,
        /// Template problem.
        #[source]
        source: TemplateError,
    },
}

/// One external tool applied to each file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassDefinition {
    name: String,
    command: CommandTemplate,
    timeout: Option<Duration>,
}

impl PassDefinition {
    /// Creates a pass from a parsed command.
    #[must_use]
    pub fn new(name: impl Into<String>, command: CommandTemplate) -> Self {
        Self {
            name: name.into(),
            command,
            timeout: None,
        }
    }

    /// Overrides the run-wide invocation timeout for this pass.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Pass name as declared.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Command run for each file.
    #[must_use]
    pub const fn command(&self) -> &CommandTemplate {
        &self.command
    }

    /// Timeout override for this pass.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

/// Ordered passes plus the command that validates each change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineDefinition {
    validation_command: CommandTemplate,
    passes: Vec<PassDefinition>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPipeline {
    validation_command: Vec<String>,
    #[serde(default)]
    passes: Vec<RawPass>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPass {
    name: String,
    command: Vec<String>,
    #[serde(default)]
    timeout_secs: Option<u64>,
}

impl PipelineDefinition {
    /// Builds a definition from already parsed parts.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] when no passes are given or pass names are
    /// blank or repeated.
    pub fn new(
        validation_command: CommandTemplate,
        passes: Vec<PassDefinition>,
    ) -> Result<Self, PipelineError> {
        if passes.is_empty() {
            return Err(PipelineError::NoPasses);
        }
        let mut seen = HashSet::new();
        for (index, pass) in passes.iter().enumerate() {
            if pass.name().trim().is_empty() {
                return Err(PipelineError::UnnamedPass {
                    position: index + 1,
                });
            }
            if !seen.insert(pass.name()) {
                return Err(PipelineError::DuplicatePass {
                    name: pass.name().to_owned(),
                });
            }
        }
        Ok(Self {
            validation_command,
            passes,
        })
    }

    /// Reads and validates a pipeline file.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Read`] when the file cannot be read, and the
    /// errors of [`PipelineDefinition::from_yaml_str`] otherwise.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, PipelineError> {
        let path = path.into();
        let text = fs::read_to_string(&path).map_err(|source| PipelineError::Read {
            path: path.clone(),
            source: Arc::new(source),
        })?;
        Self::parse(&text, &path.display().to_string())
    }

    /// Parses and validates a pipeline held in memory.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] for malformed YAML, an unusable validation
    /// command, or an invalid pass.
    pub fn from_yaml_str(text: &str) -> Result<Self, PipelineError> {
        Self::parse(text, "<inline>")
    }

    fn parse(text: &str, origin: &str) -> Result<Self, PipelineError> {
        let raw: RawPipeline =
            serde_saphyr::from_str(text).map_err(|err| PipelineError::Parse {
                origin: origin.to_owned(),
                message: err.to_string(),
            })?;

        let validation_command = CommandTemplate::parse(&raw.validation_command)
            .map_err(|source| PipelineError::ValidationCommand { source })?;

        let passes = raw
            .passes
            .into_iter()
            .map(|pass| {
                let command = CommandTemplate::parse(&pass.command).map_err(|source| {
                    PipelineError::PassCommand {
                        name: pass.name.clone(),
                        source,
                    }
                })?;
                let definition = PassDefinition::new(pass.name, command);
                Ok(match pass.timeout_secs {
                    Some(secs) if secs > 0 => definition.with_timeout(Duration::from_secs(secs)),
                    _ => definition,
                })
            })
            .collect::<Result<Vec<_>, PipelineError>>()?;

        Self::new(validation_command, passes)
    }

    /// Command used to validate each applied pass.
    #[must_use]
    pub const fn validation_command(&self) -> &CommandTemplate {
        &self.validation_command
    }

    /// Passes in execution order.
    #[must_use]
    pub fn passes(&self) -> &[PassDefinition] {
        &self.passes
    }
}
