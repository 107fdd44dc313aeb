//! Scripted [`ControlChannel`] that records every command it receives.
//!
//! The channel models just enough device behaviour for orchestration tests:
//! mode transitions on reboot, bootloader variables, a data root that can be
//! listed and probed, and boot readiness.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use crate::channel::{ChannelError, CommandOutput, CommandStatus, ControlChannel, DeviceMode};

/// Commands observed by the channel, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// Bootloader command with its arguments.
    Bootloader(Vec<String>),
    /// Normal-boot shell command.
    Shell(String),
    /// File pushed to the device.
    Push { local: PathBuf, remote: String },
    /// File pulled from the device.
    Pull { remote: String },
    /// Reboot into the bootloader.
    RebootBootloader,
    /// Reboot into the normal system.
    RebootOnline,
    /// Wait for the shell.
    WaitOnline,
    /// Wait for boot completion.
    WaitAvailable,
    /// Root request.
    EnableRoot,
}

#[derive(Debug)]
struct Script {
    mode: DeviceMode,
    product: Option<String>,
    blank_product_reads: u32,
    build_id: Option<String>,
    build_flavor: Option<String>,
    variables: HashMap<String, String>,
    properties: HashMap<String, String>,
    failing_commands: Vec<(String, CommandStatus)>,
    vanishing_commands: Vec<String>,
    writable: bool,
    data_entries: Vec<String>,
    boots: bool,
    returns_from_reboot: bool,
    becomes_available: bool,
    grants_root: bool,
    supports_erase: bool,
    calls: Vec<Call>,
}

impl Default for Script {
    fn default() -> Self {
        let variables = [
            ("version-bootloader", "bl-1"),
            ("version-baseband", "bb-1"),
            ("partition-type:cache", "ext4"),
            ("current-slot", "a"),
        ]
        .into_iter()
        .map(|(name, value)| (name.to_owned(), value.to_owned()))
        .collect();
        Self {
            mode: DeviceMode::Online,
            product: Some(String::from("walleye")),
            blank_product_reads: 0,
            build_id: Some(String::from("OLD.1")),
            build_flavor: Some(String::from("walleye-userdebug")),
            variables,
            properties: HashMap::new(),
            failing_commands: Vec::new(),
            vanishing_commands: Vec::new(),
            writable: true,
            data_entries: vec![
                String::from("app"),
                String::from("local"),
                String::from("media"),
            ],
            boots: true,
            returns_from_reboot: true,
            becomes_available: true,
            grants_root: true,
            supports_erase: false,
            calls: Vec::new(),
        }
    }
}

/// Channel double driven by a mutable script.
#[derive(Debug)]
pub struct ScriptedChannel {
    serial: String,
    script: Mutex<Script>,
}

impl ScriptedChannel {
    /// Creates a booted device running `OLD.1` on a `walleye` board.
    #[must_use]
    pub fn new(serial: &str) -> Self {
        Self {
            serial: serial.to_owned(),
            script: Mutex::new(Script::default()),
        }
    }

    fn with_script<R>(&self, edit: impl FnOnce(&mut Script) -> R) -> R {
        let mut script = self.script.lock().expect("channel script mutex poisoned");
        edit(&mut script)
    }

    pub fn set_mode(&self, mode: DeviceMode) {
        self.with_script(|script| script.mode = mode);
    }

    pub fn set_product(&self, product: Option<&str>) {
        self.with_script(|script| script.product = product.map(str::to_owned));
    }

    /// Makes the next `count` product reads come back blank.
    pub fn blank_product_reads(&self, count: u32) {
        self.with_script(|script| script.blank_product_reads = count);
    }

    pub fn set_installed_build(&self, id: &str, flavor: &str) {
        self.with_script(|script| {
            script.build_id = Some(id.to_owned());
            script.build_flavor = Some(flavor.to_owned());
        });
    }

    pub fn set_variable(&self, name: &str, value: &str) {
        self.with_script(|script| {
            script.variables.insert(name.to_owned(), value.to_owned());
        });
    }

    pub fn clear_variable(&self, name: &str) {
        self.with_script(|script| {
            script.variables.remove(name);
        });
    }

    pub fn set_property(&self, name: &str, value: &str) {
        self.with_script(|script| {
            script.properties.insert(name.to_owned(), value.to_owned());
        });
    }

    /// Bootloader commands containing `fragment` finish with `status`.
    pub fn fail_command(&self, fragment: &str, status: CommandStatus) {
        self.with_script(|script| script.failing_commands.push((fragment.to_owned(), status)));
    }

    /// Bootloader commands containing `fragment` report the device as gone.
    pub fn vanish_on(&self, fragment: &str) {
        self.with_script(|script| script.vanishing_commands.push(fragment.to_owned()));
    }

    pub fn set_writable(&self, writable: bool) {
        self.with_script(|script| script.writable = writable);
    }

    pub fn set_data_entries(&self, entries: &[&str]) {
        self.with_script(|script| {
            script.data_entries = entries.iter().map(|entry| (*entry).to_owned()).collect();
        });
    }

    pub fn set_boots(&self, boots: bool) {
        self.with_script(|script| script.boots = boots);
    }

    pub fn set_returns_from_reboot(&self, returns: bool) {
        self.with_script(|script| script.returns_from_reboot = returns);
    }

    pub fn set_becomes_available(&self, available: bool) {
        self.with_script(|script| script.becomes_available = available);
    }

    pub fn set_grants_root(&self, granted: bool) {
        self.with_script(|script| script.grants_root = granted);
    }

    pub fn set_supports_erase(&self, supported: bool) {
        self.with_script(|script| script.supports_erase = supported);
    }

    /// Snapshot of every recorded call.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.with_script(|script| script.calls.clone())
    }

    /// Bootloader commands joined with spaces.
    #[must_use]
    pub fn bootloader_commands(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Bootloader(args) => Some(args.join(" ")),
                _ => None,
            })
            .collect()
    }

    /// Bootloader commands other than variable queries.
    #[must_use]
    pub fn flash_commands(&self) -> Vec<String> {
        self.bootloader_commands()
            .into_iter()
            .filter(|command| !command.starts_with("getvar "))
            .collect()
    }

    /// Shell commands in order.
    #[must_use]
    pub fn shell_commands(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Shell(command) => Some(command),
                _ => None,
            })
            .collect()
    }

    /// Counts shell commands starting with `prefix`.
    #[must_use]
    pub fn shell_count(&self, prefix: &str) -> usize {
        self.shell_commands()
            .iter()
            .filter(|command| command.starts_with(prefix))
            .count()
    }

    fn record(&self, call: Call) {
        self.with_script(|script| script.calls.push(call));
    }

    fn gone(&self) -> ChannelError {
        ChannelError::DeviceGone {
            serial: self.serial.clone(),
        }
    }

    fn timeout(&self, operation: &str, timeout: Duration) -> ChannelError {
        ChannelError::Timeout {
            serial: self.serial.clone(),
            operation: operation.to_owned(),
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl ControlChannel for ScriptedChannel {
    fn serial(&self) -> &str {
        &self.serial
    }

    fn mode(&self) -> Result<DeviceMode, ChannelError> {
        Ok(self.with_script(|script| script.mode))
    }

    fn execute_shell(&self, command: &str) -> Result<String, ChannelError> {
        self.record(Call::Shell(command.to_owned()));
        self.with_script(|script| {
            if let Some(rest) = command.strip_prefix("echo ") {
                if !script.writable {
                    return Err(ChannelError::CommandFailed {
                        serial: self.serial.clone(),
                        operation: String::from("shell"),
                        message: String::from("Read-only file system"),
                    });
                }
                let token = rest.split(" >").next().unwrap_or_default();
                return Ok(format!("{token}\n"));
            }
            if command.starts_with("ls -1 ") {
                return Ok(script.data_entries.join("\n"));
            }
            Ok(String::new())
        })
    }

    fn execute_bootloader(
        &self,
        args: &[String],
        _timeout: Duration,
    ) -> Result<CommandOutput, ChannelError> {
        self.record(Call::Bootloader(args.to_vec()));
        let command = args.join(" ");
        self.with_script(|script| {
            if script
                .vanishing_commands
                .iter()
                .any(|fragment| command.contains(fragment.as_str()))
            {
                return Err(self.gone());
            }
            if let [verb, variable] = args {
                if verb == "getvar" {
                    let value = script.variables.get(variable).cloned().unwrap_or_default();
                    return Ok(CommandOutput::success(format!(
                        "{variable}: {value}\nFinished. Total time: 0.001s"
                    )));
                }
            }
            if let Some((_, status)) = script
                .failing_commands
                .iter()
                .find(|(fragment, _)| command.contains(fragment.as_str()))
            {
                return Ok(CommandOutput::new(*status, "", "FAILED (remote: 'scripted')"));
            }
            Ok(CommandOutput::success("OKAY"))
        })
    }

    fn push_file(&self, local: &Path, remote: &str) -> Result<(), ChannelError> {
        self.record(Call::Push {
            local: local.to_path_buf(),
            remote: remote.to_owned(),
        });
        Ok(())
    }

    fn pull_file(&self, remote: &str, _local: &Path) -> Result<(), ChannelError> {
        self.record(Call::Pull {
            remote: remote.to_owned(),
        });
        Ok(())
    }

    fn reboot_into_bootloader(&self) -> Result<(), ChannelError> {
        self.record(Call::RebootBootloader);
        self.with_script(|script| script.mode = DeviceMode::Bootloader);
        Ok(())
    }

    fn reboot_until_online(&self) -> Result<(), ChannelError> {
        self.record(Call::RebootOnline);
        let returned = self.with_script(|script| {
            script.mode = if script.returns_from_reboot {
                DeviceMode::Online
            } else {
                DeviceMode::Unavailable
            };
            script.returns_from_reboot
        });
        if returned { Ok(()) } else { Err(self.gone()) }
    }

    fn wait_for_online(&self, timeout: Duration) -> Result<(), ChannelError> {
        self.record(Call::WaitOnline);
        if self.with_script(|script| script.boots) {
            Ok(())
        } else {
            Err(self.timeout("wait for online", timeout))
        }
    }

    fn wait_for_available(&self, timeout: Duration) -> Result<(), ChannelError> {
        self.record(Call::WaitAvailable);
        if self.with_script(|script| script.becomes_available) {
            Ok(())
        } else {
            Err(self.timeout("wait for boot completion", timeout))
        }
    }

    fn property(&self, name: &str) -> Result<Option<String>, ChannelError> {
        Ok(self.with_script(|script| script.properties.get(name).cloned()))
    }

    fn product_identifier(&self) -> Result<Option<String>, ChannelError> {
        Ok(self.with_script(|script| {
            if script.blank_product_reads > 0 {
                script.blank_product_reads -= 1;
                return Some(String::new());
            }
            script.product.clone()
        }))
    }

    fn current_build_id(&self) -> Result<Option<String>, ChannelError> {
        Ok(self.with_script(|script| script.build_id.clone()))
    }

    fn current_build_flavor(&self) -> Result<Option<String>, ChannelError> {
        Ok(self.with_script(|script| script.build_flavor.clone()))
    }

    fn enable_root(&self) -> Result<bool, ChannelError> {
        self.record(Call::EnableRoot);
        Ok(self.with_script(|script| script.grants_root))
    }

    fn supports_erase(&self) -> bool {
        self.with_script(|script| script.supports_erase)
    }
}
