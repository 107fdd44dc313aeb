//! Output choices for host logs and flash records.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Shape of the host's diagnostic log lines.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per event, for lab log collectors.
    #[default]
    Json,
    /// Single-line text for an operator watching the console.
    Compact,
}

/// Where the per-attempt flash record goes.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum FlashRecordSink {
    /// Emitted as `flashwright::telemetry` events in the host log.
    #[default]
    Log,
    /// Appended as JSON lines to `flash_record_path`.
    JsonLines,
}

impl FlashRecordSink {
    /// Returns `true` when records are written to their own file.
    #[must_use]
    pub const fn writes_file(self) -> bool {
        matches!(self, Self::JsonLines)
    }
}

/// Error returned when a log format or record sink name is unknown.
pub type OutputChoiceParseError = strum::ParseError;
