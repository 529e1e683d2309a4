//! Log event encodings understood by the CLI subscriber.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Encoding of log events written to stderr.
///
/// Parsed case-insensitively from `--log-format`, `REFINER_LOG_FORMAT` or the
/// `log_format` key of a configuration file.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per event with the fields flattened.
    Json,
    /// One terse line per event.
    #[default]
    Compact,
}

/// Errors encountered while parsing a [`LogFormat`] from text.
pub type LogFormatParseError = strum::ParseError;
