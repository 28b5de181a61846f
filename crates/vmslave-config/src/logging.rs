//! Local logging settings and the threshold for forwarded diagnostics.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use vmslave_types::Priority;

/// Default `tracing-subscriber` filter directive.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Line format of the service's own stderr log.
///
/// This only affects local logging. Diagnostics forwarded to the controller
/// are always `logging` envelopes on the response channel.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per event with fields flattened.
    #[default]
    Json,
    /// Terse text lines for interactive runs.
    Compact,
}

/// Errors encountered while parsing a [`LogFormat`] from text.
pub type LogFormatParseError = strum::ParseError;

/// Default log filter expression used by the binary.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

pub(crate) fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default local log format.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Lowest priority forwarded by default; everything reaches the controller.
#[must_use]
pub const fn default_forward_level() -> Priority {
    Priority::Debug
}
