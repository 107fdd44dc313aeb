//! Host logging and flash-record delivery.
//!
//! [`initialise`] installs the process-wide `tracing` subscriber once and
//! opens the flash-record sink chosen in the configuration. When records go
//! to the host log, the `flashwright::telemetry` target is kept at `info`
//! even under a quieter filter, so every attempt is still reported.

mod record;

use std::fs::{File, OpenOptions};
use std::io::{self, IsTerminal};
use std::path::PathBuf;

use once_cell::sync::OnceCell;
use tracing::{Subscriber, debug, subscriber::SetGlobalDefaultError};
use tracing_subscriber::filter::{Directive, ParseError};
use tracing_subscriber::{EnvFilter, fmt};

use flashwright_config::{FlashRecordSink, LogFormat, ProvisionConfig};

use record::TELEMETRY_TARGET;
pub use record::{
    FlashRecord, JsonLinesTelemetrySink, SinkError, TelemetrySink, TracingTelemetrySink,
};

static INSTALLED_FORMAT: OnceCell<LogFormat> = OnceCell::new();

/// Flash-record sink selected by [`ProvisionConfig::flash_record_sink`].
#[derive(Debug)]
pub enum ConfiguredSink {
    /// Records are emitted as host log events.
    Log(TracingTelemetrySink),
    /// Records are appended to the configured file.
    JsonLines(JsonLinesTelemetrySink<File>),
}

impl TelemetrySink for ConfiguredSink {
    fn record_flash(&self, record: &FlashRecord) -> Result<(), SinkError> {
        match self {
            Self::Log(sink) => sink.record_flash(record),
            Self::JsonLines(sink) => sink.record_flash(record),
        }
    }
}

/// Errors raised while setting up logging or the flash-record sink.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured filter expression could not be parsed.
    #[error("invalid log filter '{filter}': {message}")]
    Filter {
        /// Filter text as configured.
        filter: String,
        /// Parser diagnostic.
        message: String,
    },
    /// Another global subscriber was installed first.
    #[error("failed to install log subscriber: {0}")]
    Subscriber(#[source] SetGlobalDefaultError),
    /// `json_lines` records were requested without a destination file.
    #[error("flash records are written as json lines but flash_record_path is not set")]
    MissingRecordPath,
    /// The flash-record file could not be opened for appending.
    #[error("failed to open flash record file {path}: {source}")]
    RecordFile {
        /// Configured record file.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
}

/// Installs host logging and opens the configured flash-record sink.
///
/// Logging is installed by the first call only; later calls reuse it and
/// still open a fresh sink.
///
/// # Examples
///
/// ```rust
/// use flashwright::{ProvisionLifecycle, TelemetryError, initialise};
/// use flashwright_config::ProvisionConfig;
///
/// # fn main() -> Result<(), TelemetryError> {
/// let config = ProvisionConfig::default();
/// let sink = initialise(&config)?;
/// let lifecycle = ProvisionLifecycle::from_config(&config, sink);
/// # drop(lifecycle);
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns [`TelemetryError`] when the filter is invalid, another subscriber
/// is already global, or the record file cannot be opened.
pub fn initialise(config: &ProvisionConfig) -> Result<ConfiguredSink, TelemetryError> {
    let installed = INSTALLED_FORMAT
        .get_or_try_init(|| install_subscriber(config).map(|()| config.log_format()))?;
    if *installed != config.log_format() {
        debug!(
            target: TELEMETRY_TARGET,
            active = %installed,
            requested = %config.log_format(),
            "logging already installed; keeping the active format"
        );
    }
    open_record_sink(config)
}

/// Opens the flash-record sink named by `config` without touching logging.
///
/// # Errors
///
/// Returns [`TelemetryError::MissingRecordPath`] or
/// [`TelemetryError::RecordFile`] when a `json_lines` sink cannot be opened.
pub fn open_record_sink(config: &ProvisionConfig) -> Result<ConfiguredSink, TelemetryError> {
    match config.flash_record_sink() {
        FlashRecordSink::Log => Ok(ConfiguredSink::Log(TracingTelemetrySink)),
        FlashRecordSink::JsonLines => {
            let path = config
                .flash_record_path
                .as_deref()
                .map(PathBuf::from)
                .ok_or(TelemetryError::MissingRecordPath)?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|source| TelemetryError::RecordFile {
                    path: path.clone(),
                    source,
                })?;
            Ok(ConfiguredSink::JsonLines(JsonLinesTelemetrySink::new(file)))
        }
    }
}

/// Builds the log filter, keeping flash records visible when they are logged.
fn log_filter(config: &ProvisionConfig) -> Result<EnvFilter, TelemetryError> {
    let invalid = |message: String| TelemetryError::Filter {
        filter: config.log_filter().to_owned(),
        message,
    };
    let filter =
        EnvFilter::try_new(config.log_filter()).map_err(|error| invalid(error.to_string()))?;

    let records_logged = !config.flash_record_sink().writes_file();
    if !records_logged || config.log_filter().contains(TELEMETRY_TARGET) {
        return Ok(filter);
    }
    let records: Directive = format!("{TELEMETRY_TARGET}=info")
        .parse()
        .map_err(|error: ParseError| invalid(error.to_string()))?;
    Ok(filter.add_directive(records))
}

fn install_subscriber(config: &ProvisionConfig) -> Result<(), TelemetryError> {
    let filter = log_filter(config)?;
    let timer = fmt::time::UtcTime::rfc_3339();

    let subscriber: Box<dyn Subscriber + Send + Sync> = match config.log_format() {
        LogFormat::Json => Box::new(
            fmt::Subscriber::builder()
                .with_env_filter(filter)
                .with_writer(io::stderr)
                .with_timer(timer)
                .with_ansi(false)
                .with_thread_names(true)
                .json()
                .flatten_event(true)
                .with_current_span(false)
                .finish(),
        ),
        LogFormat::Compact => Box::new(
            fmt::Subscriber::builder()
                .with_env_filter(filter)
                .with_writer(io::stderr)
                .with_timer(timer)
                .with_ansi(io::stderr().is_terminal())
                .with_thread_names(true)
                .compact()
                .finish(),
        ),
    };

    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}
