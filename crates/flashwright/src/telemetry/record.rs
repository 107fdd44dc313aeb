//! Flash telemetry records and sinks.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::flasher::SystemFlashStatus;

pub(super) const TELEMETRY_TARGET: &str = "flashwright::telemetry";

/// Metrics emitted once per provisioning attempt that reached the system
/// partition stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlashRecord {
    /// Branch the build came from.
    pub branch: String,
    /// Build flavor.
    pub build_flavor: String,
    /// Build identifier.
    pub build_id: String,
    /// Device serial.
    pub serial: String,
    /// Time spent waiting for a flash permit.
    #[serde(rename = "queue_time_ms", serialize_with = "millis")]
    pub queue_time: Duration,
    /// Time spent flashing and verifying the boot.
    #[serde(rename = "flashing_time_ms", serialize_with = "millis")]
    pub flashing_time: Duration,
    /// Outcome of the system partition stage.
    pub system_flash_status: SystemFlashStatus,
}

fn millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(as_millis(*duration))
}

fn as_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Errors raised by telemetry sinks.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The record could not be serialised.
    #[error("failed to serialise flash record: {0}")]
    Serialize(#[from] serde_json::Error),
    /// The record could not be written.
    #[error("failed to write flash record: {0}")]
    Io(#[from] io::Error),
}

/// Destination for flash telemetry.
pub trait TelemetrySink: Send + Sync {
    /// Records one flash attempt.
    ///
    /// # Errors
    ///
    /// Returns a [`SinkError`] when the record could not be stored. Callers
    /// log and discard these errors.
    fn record_flash(&self, record: &FlashRecord) -> Result<(), SinkError>;
}

impl<T> TelemetrySink for Arc<T>
where
    T: TelemetrySink,
{
    fn record_flash(&self, record: &FlashRecord) -> Result<(), SinkError> {
        (**self).record_flash(record)
    }
}

/// Sink that emits records as structured `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetrySink;

impl TelemetrySink for TracingTelemetrySink {
    fn record_flash(&self, record: &FlashRecord) -> Result<(), SinkError> {
        tracing::info!(
            target: TELEMETRY_TARGET,
            event = "flash_completed",
            branch = %record.branch,
            build_flavor = %record.build_flavor,
            build_id = %record.build_id,
            serial = %record.serial,
            queue_time_ms = as_millis(record.queue_time),
            flashing_time_ms = as_millis(record.flashing_time),
            system_flash_status = %record.system_flash_status,
            "flash attempt recorded"
        );
        Ok(())
    }
}

/// Sink that appends one JSON object per line to a writer.
#[derive(Debug)]
pub struct JsonLinesTelemetrySink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesTelemetrySink<W> {
    /// Wraps `writer`.
    pub const fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> TelemetrySink for JsonLinesTelemetrySink<W> {
    fn record_flash(&self, record: &FlashRecord) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(&line)?;
        writer.flush()?;
        Ok(())
    }
}
