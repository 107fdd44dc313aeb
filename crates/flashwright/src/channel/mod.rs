//! Device control channel abstraction.
//!
//! A [`ControlChannel`] bundles the two interfaces a provisioning host uses to
//! drive a device: a bootloader control protocol for flashing and a
//! normal-boot shell for inspection and file transfer. The orchestrator and
//! lifecycle depend only on this trait; [`HostToolChannel`] is the production
//! implementation backed by the host `adb` and `fastboot` tools.

mod host;
mod output;

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use strum::Display;
use thiserror::Error;

use crate::failure::ProvisionFailure;

pub use host::{HostToolChannel, HostToolOptions};
pub use output::{CommandOutput, CommandStatus, parse_variable};

/// Mode a device currently reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum DeviceMode {
    /// Booted and reachable through the normal-boot shell.
    Online,
    /// Waiting in the bootloader.
    Bootloader,
    /// Not visible through either interface.
    Unavailable,
}

/// Errors raised by a control channel.
#[derive(Debug, Clone, Error)]
pub enum ChannelError {
    /// The device disappeared from the host.
    #[error("device {serial} is no longer reachable")]
    DeviceGone {
        /// Serial of the lost device.
        serial: String,
    },
    /// An operation did not finish in time.
    #[error("{operation} on {serial} timed out after {timeout_ms} ms")]
    Timeout {
        /// Serial of the device.
        serial: String,
        /// Operation that timed out.
        operation: String,
        /// Timeout that elapsed.
        timeout_ms: u64,
    },
    /// A shell or transfer command reported failure.
    #[error("{operation} on {serial} failed: {message}")]
    CommandFailed {
        /// Serial of the device.
        serial: String,
        /// Operation that failed.
        operation: String,
        /// Output or status describing the failure.
        message: String,
    },
    /// The host tool could not be run.
    #[error("I/O error during {operation}: {source}")]
    Io {
        /// Operation that failed.
        operation: String,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },
}

impl ChannelError {
    /// Returns `true` when the device itself has disappeared.
    #[must_use]
    pub const fn is_device_gone(&self) -> bool {
        matches!(self, Self::DeviceGone { .. })
    }
}

/// Operations the provisioning core performs against a device.
///
/// Implementations block the calling thread until each operation completes,
/// fails, or times out. The orchestrator never interleaves calls across
/// threads for a single device.
pub trait ControlChannel {
    /// Serial number identifying the device on the host.
    fn serial(&self) -> &str;

    /// Reports the mode the device is in right now.
    fn mode(&self) -> Result<DeviceMode, ChannelError>;

    /// Runs a command in the normal-boot shell and returns its output.
    fn execute_shell(&self, command: &str) -> Result<String, ChannelError>;

    /// Runs a bootloader command, waiting at most `timeout`.
    ///
    /// A command that runs but reports failure is returned as an
    /// `Ok(CommandOutput)` with a non-success status. `Err` is reserved for
    /// the channel itself failing.
    fn execute_bootloader(
        &self,
        args: &[String],
        timeout: Duration,
    ) -> Result<CommandOutput, ChannelError>;

    /// Copies a host file onto the device.
    fn push_file(&self, local: &Path, remote: &str) -> Result<(), ChannelError>;

    /// Copies a device file onto the host.
    fn pull_file(&self, remote: &str, local: &Path) -> Result<(), ChannelError>;

    /// Reboots into the bootloader and waits until it responds.
    fn reboot_into_bootloader(&self) -> Result<(), ChannelError>;

    /// Reboots into the normal system and waits until the shell responds.
    fn reboot_until_online(&self) -> Result<(), ChannelError>;

    /// Waits until the normal-boot shell responds.
    fn wait_for_online(&self, timeout: Duration) -> Result<(), ChannelError>;

    /// Waits until the booted system reports itself ready for use.
    fn wait_for_available(&self, timeout: Duration) -> Result<(), ChannelError>;

    /// Reads a system property from the booted device.
    fn property(&self, name: &str) -> Result<Option<String>, ChannelError>;

    /// Reads the board or product identifier, lower-cased.
    fn product_identifier(&self) -> Result<Option<String>, ChannelError>;

    /// Reads the build id installed on the booted device.
    fn current_build_id(&self) -> Result<Option<String>, ChannelError>;

    /// Reads the build flavor installed on the booted device.
    fn current_build_flavor(&self) -> Result<Option<String>, ChannelError>;

    /// Restarts the shell with root privileges, returning whether root was
    /// granted.
    fn enable_root(&self) -> Result<bool, ChannelError>;

    /// Whether the bootloader supports `erase` for wiping partitions.
    fn supports_erase(&self) -> bool {
        false
    }
}

/// Maps a channel error raised while flashing into a provisioning failure.
pub(crate) fn unavailable(action: &str, error: ChannelError) -> ProvisionFailure {
    ProvisionFailure::device_unavailable(format!("{action} failed: {error}"))
        .with_source(error)
}
