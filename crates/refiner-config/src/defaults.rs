use camino::Utf8PathBuf;

use crate::logging::LogFormat;
use crate::rollback::RollbackScope;

/// Default log filter expression used by the binary.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default pipeline definition file, resolved against the workspace root.
pub const DEFAULT_PIPELINE_PATH: &str = "refiner.yaml";

/// Number of workers processing files when nothing else is configured.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Attempts allowed per pass before the file is rolled back.
pub const DEFAULT_MAX_ITERATIONS: u32 = 3;

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binary.
pub fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

/// Default location of the pipeline definition.
pub fn default_pipeline_path() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_PIPELINE_PATH)
}

/// Default rollback scope.
pub fn default_rollback_scope() -> RollbackScope {
    RollbackScope::WholeFile
}
