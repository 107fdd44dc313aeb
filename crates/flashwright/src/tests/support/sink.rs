//! Telemetry sink double that keeps every record in memory.

use std::io;
use std::sync::Mutex;

use crate::telemetry::{FlashRecord, SinkError, TelemetrySink};

/// Records flash telemetry for assertions.
#[derive(Debug, Default)]
pub struct RecordingTelemetrySink {
    records: Mutex<Vec<FlashRecord>>,
    failing: bool,
}

impl RecordingTelemetrySink {
    /// Sink whose writes fail after recording the attempt.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            records: Mutex::default(),
            failing: true,
        }
    }

    /// Captures a copy of the recorded telemetry.
    #[must_use]
    pub fn records(&self) -> Vec<FlashRecord> {
        self.records
            .lock()
            .expect("telemetry sink mutex poisoned")
            .clone()
    }
}

impl TelemetrySink for RecordingTelemetrySink {
    fn record_flash(&self, record: &FlashRecord) -> Result<(), SinkError> {
        self.records
            .lock()
            .expect("telemetry sink mutex poisoned")
            .push(record.clone());
        if self.failing {
            return Err(SinkError::Io(io::Error::other("telemetry store offline")));
        }
        Ok(())
    }
}
