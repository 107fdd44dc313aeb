//! Control channel backed by the host `adb` and `fastboot` tools.

use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use flashwright_config::ProvisionConfig;
use tracing::{debug, warn};

use super::{
    ChannelError, CommandOutput, CommandStatus, ControlChannel, DeviceMode, parse_variable,
};

const CHANNEL_TARGET: &str = "flashwright::channel";
const PROCESS_POLL_INTERVAL: Duration = Duration::from_millis(50);
const READER_GRACE: Duration = Duration::from_millis(500);
const DEFAULT_MODE_POLL_INTERVAL: Duration = Duration::from_secs(1);
const MISSING_DEVICE_MARKERS: &[&str] = &[
    "no devices/emulators found",
    "device offline",
    "not found",
];

const BUILD_ID_PROPERTY: &str = "ro.build.version.incremental";
const BUILD_FLAVOR_PROPERTY: &str = "ro.build.flavor";
const PRODUCT_NAME_PROPERTY: &str = "ro.product.name";
const BUILD_TYPE_PROPERTY: &str = "ro.build.type";
const BOARD_PROPERTY: &str = "ro.product.board";
const HARDWARE_PROPERTY: &str = "ro.hardware";
const BOOT_COMPLETED_PROPERTY: &str = "sys.boot_completed";

/// Settings for [`HostToolChannel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostToolOptions {
    adb: String,
    fastboot: String,
    command_timeout: Duration,
    transfer_timeout: Duration,
    reboot_timeout: Duration,
    poll_interval: Duration,
    use_erase: bool,
}

impl HostToolOptions {
    /// Derives tool settings from the provisioning configuration.
    #[must_use]
    pub fn from_config(config: &ProvisionConfig) -> Self {
        Self {
            adb: config.adb_path.clone(),
            fastboot: config.fastboot_path.clone(),
            command_timeout: config.command_timeout(),
            transfer_timeout: config.long_command_timeout(),
            reboot_timeout: config.reboot_timeout(),
            poll_interval: DEFAULT_MODE_POLL_INTERVAL,
            use_erase: config.use_erase,
        }
    }

    /// Overrides the interval used while waiting for mode changes.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

impl Default for HostToolOptions {
    fn default() -> Self {
        Self::from_config(&ProvisionConfig::default())
    }
}

/// Drives one device through the host `adb` and `fastboot` binaries.
#[derive(Debug, Clone)]
pub struct HostToolChannel {
    serial: String,
    options: HostToolOptions,
}

impl HostToolChannel {
    /// Creates a channel for the device with the given serial.
    pub fn new(serial: impl Into<String>, options: HostToolOptions) -> Self {
        Self {
            serial: serial.into(),
            options,
        }
    }

    fn adb(&self, args: &[&str], timeout: Duration) -> Result<String, ChannelError> {
        let operation = format!("adb {}", args.join(" "));
        let mut full_args = vec![String::from("-s"), self.serial.clone()];
        full_args.extend(args.iter().map(|arg| (*arg).to_owned()));

        let output = run_process(&self.options.adb, &full_args, timeout)
            .map_err(|source| self.io_error(&operation, source))?;
        match output.outcome {
            ProcessOutcome::TimedOut => Err(self.timeout_error(&operation, timeout)),
            ProcessOutcome::Exited(_) if mentions_missing_device(&output.stderr) => {
                Err(ChannelError::DeviceGone {
                    serial: self.serial.clone(),
                })
            }
            ProcessOutcome::Exited(true) => Ok(output.stdout),
            ProcessOutcome::Exited(false) => Err(ChannelError::CommandFailed {
                serial: self.serial.clone(),
                operation,
                message: output.diagnostic().to_owned(),
            }),
        }
    }

    fn fastboot(&self, args: &[String], timeout: Duration) -> Result<CommandOutput, ChannelError> {
        let mut full_args = vec![String::from("-s"), self.serial.clone()];
        full_args.extend(args.iter().cloned());

        let output = run_process(&self.options.fastboot, &full_args, timeout).map_err(|source| {
            self.io_error(&format!("fastboot {}", args.join(" ")), source)
        })?;
        let status = match output.outcome {
            ProcessOutcome::Exited(true) => CommandStatus::Success,
            ProcessOutcome::Exited(false) => CommandStatus::Failed,
            ProcessOutcome::TimedOut => CommandStatus::TimedOut,
        };
        Ok(CommandOutput::new(status, output.stdout, output.stderr))
    }

    fn fastboot_checked(&self, args: &[&str]) -> Result<(), ChannelError> {
        let owned: Vec<String> = args.iter().map(|arg| (*arg).to_owned()).collect();
        let output = self.fastboot(&owned, self.options.command_timeout)?;
        match output.status {
            CommandStatus::Success => Ok(()),
            CommandStatus::TimedOut => Err(self.timeout_error(
                &format!("fastboot {}", args.join(" ")),
                self.options.command_timeout,
            )),
            CommandStatus::Failed => Err(ChannelError::CommandFailed {
                serial: self.serial.clone(),
                operation: format!("fastboot {}", args.join(" ")),
                message: output.diagnostic().to_owned(),
            }),
        }
    }

    fn in_bootloader(&self) -> Result<bool, ChannelError> {
        let args = [String::from("devices")];
        let output = run_process(&self.options.fastboot, &args, self.options.command_timeout)
            .map_err(|source| self.io_error("fastboot devices", source))?;
        Ok(listing_contains(&output.stdout, &self.serial))
    }

    fn wait_for_mode(&self, wanted: DeviceMode, timeout: Duration) -> Result<(), ChannelError> {
        let deadline = Instant::now().checked_add(timeout);
        loop {
            match self.mode() {
                Ok(mode) if mode == wanted => return Ok(()),
                Ok(_) => {}
                Err(error) if error.is_device_gone() => {}
                Err(error) => return Err(error),
            }
            if deadline.is_some_and(|limit| Instant::now() >= limit) {
                return Err(self.timeout_error(&format!("waiting for {wanted}"), timeout));
            }
            thread::sleep(self.options.poll_interval);
        }
    }

    fn finish_reboot(&self, wanted: DeviceMode) -> Result<(), ChannelError> {
        thread::sleep(self.options.poll_interval);
        self.wait_for_mode(wanted, self.options.reboot_timeout)
            .map_err(|error| match error {
                ChannelError::Timeout { .. } => {
                    warn!(
                        target: CHANNEL_TARGET,
                        serial = %self.serial,
                        mode = %wanted,
                        "device did not return after reboot"
                    );
                    ChannelError::DeviceGone {
                        serial: self.serial.clone(),
                    }
                }
                other => other,
            })
    }

    fn boot_completed(&self) -> bool {
        let booted = matches!(
            self.property(BOOT_COMPLETED_PROPERTY),
            Ok(Some(value)) if value == "1"
        );
        booted
            && self
                .execute_shell("pm path android")
                .is_ok_and(|output| output.trim_start().starts_with("package:"))
    }

    fn gone(&self) -> ChannelError {
        ChannelError::DeviceGone {
            serial: self.serial.clone(),
        }
    }

    fn timeout_error(&self, operation: &str, timeout: Duration) -> ChannelError {
        ChannelError::Timeout {
            serial: self.serial.clone(),
            operation: operation.to_owned(),
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }

    fn io_error(&self, operation: &str, source: io::Error) -> ChannelError {
        debug!(
            target: CHANNEL_TARGET,
            serial = %self.serial,
            operation,
            error = %source,
            "host tool could not be run"
        );
        ChannelError::Io {
            operation: operation.to_owned(),
            source: Arc::new(source),
        }
    }
}

impl ControlChannel for HostToolChannel {
    fn serial(&self) -> &str {
        &self.serial
    }

    fn mode(&self) -> Result<DeviceMode, ChannelError> {
        if self.in_bootloader()? {
            return Ok(DeviceMode::Bootloader);
        }
        match self.adb(&["get-state"], self.options.command_timeout) {
            Ok(state) if state.trim() == "device" => Ok(DeviceMode::Online),
            Ok(_) => Ok(DeviceMode::Unavailable),
            Err(ChannelError::DeviceGone { .. } | ChannelError::CommandFailed { .. }) => {
                Ok(DeviceMode::Unavailable)
            }
            Err(error) => Err(error),
        }
    }

    fn execute_shell(&self, command: &str) -> Result<String, ChannelError> {
        debug!(target: CHANNEL_TARGET, serial = %self.serial, command, "running shell command");
        self.adb(&["shell", command], self.options.command_timeout)
    }

    fn execute_bootloader(
        &self,
        args: &[String],
        timeout: Duration,
    ) -> Result<CommandOutput, ChannelError> {
        debug!(
            target: CHANNEL_TARGET,
            serial = %self.serial,
            command = %args.join(" "),
            timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            "running bootloader command"
        );
        self.fastboot(args, timeout)
    }

    fn push_file(&self, local: &Path, remote: &str) -> Result<(), ChannelError> {
        let local_text = local.to_string_lossy().into_owned();
        self.adb(&["push", local_text.as_str(), remote], self.options.transfer_timeout)
            .map(drop)
    }

    fn pull_file(&self, remote: &str, local: &Path) -> Result<(), ChannelError> {
        let local_text = local.to_string_lossy().into_owned();
        self.adb(&["pull", remote, local_text.as_str()], self.options.transfer_timeout)
            .map(drop)
    }

    fn reboot_into_bootloader(&self) -> Result<(), ChannelError> {
        match self.mode()? {
            DeviceMode::Bootloader => self.fastboot_checked(&["reboot-bootloader"])?,
            DeviceMode::Online => self
                .adb(&["reboot", "bootloader"], self.options.command_timeout)
                .map(drop)?,
            DeviceMode::Unavailable => return Err(self.gone()),
        }
        self.finish_reboot(DeviceMode::Bootloader)
    }

    fn reboot_until_online(&self) -> Result<(), ChannelError> {
        match self.mode()? {
            DeviceMode::Bootloader => self.fastboot_checked(&["reboot"])?,
            DeviceMode::Online => self
                .adb(&["reboot"], self.options.command_timeout)
                .map(drop)?,
            DeviceMode::Unavailable => return Err(self.gone()),
        }
        self.finish_reboot(DeviceMode::Online)
    }

    fn wait_for_online(&self, timeout: Duration) -> Result<(), ChannelError> {
        self.wait_for_mode(DeviceMode::Online, timeout)
    }

    fn wait_for_available(&self, timeout: Duration) -> Result<(), ChannelError> {
        let deadline = Instant::now().checked_add(timeout);
        while !self.boot_completed() {
            if deadline.is_some_and(|limit| Instant::now() >= limit) {
                return Err(self.timeout_error("waiting for boot completion", timeout));
            }
            thread::sleep(self.options.poll_interval);
        }
        Ok(())
    }

    fn property(&self, name: &str) -> Result<Option<String>, ChannelError> {
        let value = self.execute_shell(&format!("getprop {name}"))?;
        let trimmed = value.trim();
        Ok((!trimmed.is_empty()).then(|| trimmed.to_owned()))
    }

    fn product_identifier(&self) -> Result<Option<String>, ChannelError> {
        let identifier = match self.mode()? {
            DeviceMode::Bootloader => {
                let args = [String::from("getvar"), String::from("product")];
                let output = self.fastboot(&args, self.options.command_timeout)?;
                parse_variable(&output, "product")
            }
            DeviceMode::Online => match self.property(BOARD_PROPERTY)? {
                Some(board) => Some(board),
                None => self.property(HARDWARE_PROPERTY)?,
            },
            DeviceMode::Unavailable => return Err(self.gone()),
        };
        Ok(identifier.map(|value| value.to_ascii_lowercase()))
    }

    fn current_build_id(&self) -> Result<Option<String>, ChannelError> {
        self.property(BUILD_ID_PROPERTY)
    }

    fn current_build_flavor(&self) -> Result<Option<String>, ChannelError> {
        if let Some(flavor) = self.property(BUILD_FLAVOR_PROPERTY)? {
            return Ok(Some(flavor));
        }
        let product = self.property(PRODUCT_NAME_PROPERTY)?;
        let build_type = self.property(BUILD_TYPE_PROPERTY)?;
        Ok(product
            .zip(build_type)
            .map(|(name, kind)| format!("{name}-{kind}")))
    }

    fn enable_root(&self) -> Result<bool, ChannelError> {
        self.adb(&["root"], self.options.command_timeout)?;
        self.finish_reboot(DeviceMode::Online)?;
        let identity = self.execute_shell("id")?;
        Ok(identity.contains("uid=0"))
    }

    fn supports_erase(&self) -> bool {
        self.options.use_erase
    }
}

#[derive(Debug)]
enum ProcessOutcome {
    Exited(bool),
    TimedOut,
}

#[derive(Debug)]
struct ProcessOutput {
    stdout: String,
    stderr: String,
    outcome: ProcessOutcome,
}

impl ProcessOutput {
    fn diagnostic(&self) -> &str {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim()
        } else {
            stderr
        }
    }
}

/// Runs a host tool, killing it once `timeout` elapses.
fn run_process(program: &str, args: &[String], timeout: Duration) -> io::Result<ProcessOutput> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout = spawn_reader(child.stdout.take());
    let stderr = spawn_reader(child.stderr.take());
    let outcome = wait_with_deadline(&mut child, timeout)?;

    Ok(ProcessOutput {
        stdout: collect_reader(stdout.as_ref(), program),
        stderr: collect_reader(stderr.as_ref(), program),
        outcome,
    })
}

fn wait_with_deadline(child: &mut Child, timeout: Duration) -> io::Result<ProcessOutcome> {
    let deadline = Instant::now().checked_add(timeout);
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(ProcessOutcome::Exited(status.success())),
            Ok(None) => {
                if deadline.is_some_and(|limit| Instant::now() >= limit) {
                    drop(child.kill());
                    drop(child.wait());
                    return Ok(ProcessOutcome::TimedOut);
                }
                thread::sleep(PROCESS_POLL_INTERVAL);
            }
            Err(error) => {
                drop(child.kill());
                return Err(error);
            }
        }
    }
}

fn spawn_reader(stream: Option<impl Read + Send + 'static>) -> Option<Receiver<String>> {
    stream.map(|mut reader| {
        let (sender, receiver) = mpsc::channel();
        thread::spawn(move || {
            let mut buffer = Vec::new();
            drop(reader.read_to_end(&mut buffer));
            drop(sender.send(String::from_utf8_lossy(&buffer).into_owned()));
        });
        receiver
    })
}

/// Collects a reader's output once the tool has exited.
///
/// Processes spawned by the tool may keep the pipe open; their output is
/// abandoned after a short grace period and the reader thread is left to
/// finish on its own.
fn collect_reader(receiver: Option<&Receiver<String>>, program: &str) -> String {
    receiver.map_or_else(String::new, |pending| {
        pending.recv_timeout(READER_GRACE).unwrap_or_else(|_| {
            debug!(
                target: CHANNEL_TARGET,
                program,
                "output pipe still held open; abandoning reader"
            );
            String::new()
        })
    })
}

fn mentions_missing_device(stderr: &str) -> bool {
    let lowered = stderr.to_ascii_lowercase();
    lowered.starts_with("error:")
        && MISSING_DEVICE_MARKERS
            .iter()
            .any(|marker| lowered.contains(marker))
}

fn listing_contains(listing: &str, serial: &str) -> bool {
    listing
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .any(|entry| entry == serial)
}
