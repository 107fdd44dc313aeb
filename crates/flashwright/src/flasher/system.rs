//! System partition stage.

use std::path::Path;

use tracing::{debug, info, warn};

use super::{FLASHER_TARGET, FastbootFlasher, FlashAttemptState, FlashStage, SystemFlashStatus};
use crate::channel::{ChannelError, CommandStatus, ControlChannel, DeviceMode, unavailable};
use crate::descriptor::BuildDescriptor;
use crate::failure::ProvisionFailure;
use crate::query::Sleeper;
use crate::slot::Slot;
use crate::source::{ImageBuilder, ManifestSource};

/// Build the device reported before flashing began.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct InstalledBuild {
    id: Option<String>,
    flavor: Option<String>,
}

impl InstalledBuild {
    fn matches(&self, build: &BuildDescriptor) -> bool {
        self.id.as_deref() == Some(build.build_id())
            && self.flavor.as_deref() == Some(build.build_flavor())
    }
}

/// Reads the installed build while the device is still booted.
///
/// A device already waiting in the bootloader cannot report its build, so
/// the installed build is unknown and the system stage always flashes.
pub(super) fn read_installed_build(
    device: &dyn ControlChannel,
) -> Result<Option<InstalledBuild>, ProvisionFailure> {
    match device.mode() {
        Ok(DeviceMode::Online) => {}
        Ok(DeviceMode::Bootloader) => {
            debug!(
                target: FLASHER_TARGET,
                serial = device.serial(),
                "device is in the bootloader; installed build unknown"
            );
            return Ok(None);
        }
        Ok(DeviceMode::Unavailable) => {
            return Err(ProvisionFailure::device_unavailable(format!(
                "device {} is not visible to the host",
                device.serial()
            )));
        }
        Err(error) => return Err(unavailable("read device mode", error)),
    }

    let id = tolerate(device, "build id", device.current_build_id())?;
    let flavor = tolerate(device, "build flavor", device.current_build_flavor())?;
    Ok(Some(InstalledBuild { id, flavor }))
}

fn tolerate(
    device: &dyn ControlChannel,
    what: &str,
    result: Result<Option<String>, ChannelError>,
) -> Result<Option<String>, ProvisionFailure> {
    match result {
        Ok(value) => Ok(value),
        Err(error) if error.is_device_gone() => Err(unavailable(&format!("read {what}"), error)),
        Err(error) => {
            warn!(
                target: FLASHER_TARGET,
                serial = device.serial(),
                error = %error,
                "could not read installed {what}; treating it as unknown"
            );
            Ok(None)
        }
    }
}

impl<M, I, S> FastbootFlasher<M, I, S>
where
    M: ManifestSource,
    I: ImageBuilder,
    S: Sleeper,
{
    pub(super) fn flash_system(
        &self,
        device: &dyn ControlChannel,
        build: &BuildDescriptor,
        installed: Option<&InstalledBuild>,
        state: &mut FlashAttemptState,
    ) -> Result<(), ProvisionFailure> {
        state.enter(FlashStage::System);

        if installed.is_some_and(|current| current.matches(build)) {
            if self.options.force_system_flash() {
                info!(
                    target: FLASHER_TARGET,
                    serial = device.serial(),
                    build_id = build.build_id(),
                    "device already runs the build; flashing anyway"
                );
            } else {
                info!(
                    target: FLASHER_TARGET,
                    serial = device.serial(),
                    build_id = build.build_id(),
                    "device already runs the build; skipping system flash"
                );
                state.skip_system_flash();
                return Ok(());
            }
        }

        let image = self.images.update_image(build)?;
        let args = self.update_command(&image, state.slot());
        let command = args.join(" ");
        info!(
            target: FLASHER_TARGET,
            serial = device.serial(),
            command = %command,
            "updating system partitions"
        );

        match device.execute_bootloader(&args, self.options.long_command_timeout()) {
            Ok(output) => match output.status {
                CommandStatus::Success => {
                    state.record_system_flash(SystemFlashStatus::Success);
                    Ok(())
                }
                CommandStatus::Failed => {
                    state.record_system_flash(SystemFlashStatus::Failed);
                    Err(ProvisionFailure::setup_impossible(format!(
                        "system update on {} failed: {}",
                        device.serial(),
                        output.diagnostic()
                    )))
                }
                CommandStatus::TimedOut => {
                    state.record_system_flash(SystemFlashStatus::Exception);
                    Err(ProvisionFailure::device_unavailable(format!(
                        "system update on {} timed out",
                        device.serial()
                    )))
                }
            },
            Err(error) => {
                state.record_system_flash(SystemFlashStatus::Exception);
                Err(unavailable("system update", error))
            }
        }
    }

    /// Builds `[flags...] [--slot <s>] update <image>`.
    pub(super) fn update_command(&self, image: &Path, slot: Option<Slot>) -> Vec<String> {
        let mut args = self.options.extra_flags().to_vec();
        if self.options.flash_to_current_slot() {
            if let Some(active) = slot {
                args.push(String::from("--slot"));
                args.push(active.to_string());
            }
        }
        args.push(String::from("update"));
        args.push(image.display().to_string());
        args
    }
}
