//! Rollback scope applied when a pass exhausts its iterations.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Content restored over a file once a pass has used every iteration.
///
/// `WholeFile` discards every pass applied earlier in the same run, including
/// ones that validated. `SinceLastSuccess` keeps validated work.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum RollbackScope {
    /// Restore the content captured before the first pass ran.
    #[default]
    WholeFile,
    /// Restore the content captured after the most recent validated pass.
    SinceLastSuccess,
}

/// Errors encountered while parsing a [`RollbackScope`] from text.
pub type RollbackScopeParseError = strum::ParseError;
