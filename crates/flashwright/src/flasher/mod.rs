//! Flashing orchestrator.
//!
//! [`FastbootFlasher`] drives one device from an unknown state to the target
//! build through ordered stages: resource resolution, bootloader, baseband,
//! system partitions, user data, and cache. Each stage may end the attempt
//! early with a classified [`ProvisionFailure`]. Firmware stages compare the
//! device's reported versions with the requirement document and only flash
//! what differs.

mod cache;
mod firmware;
mod options;
mod state;
mod system;
mod userdata;

use std::time::Duration;

use flashwright_manifest::RequirementMap;
use tracing::{debug, info, warn};

use crate::channel::{
    CommandOutput, CommandStatus, ControlChannel, parse_variable, unavailable,
};
use crate::descriptor::BuildDescriptor;
use crate::failure::ProvisionFailure;
use crate::query::{QueryError, Sleeper, ThreadSleeper};
use crate::slot::current_slot;
use crate::source::{FileManifestSource, ImageBuilder, ManifestSource, PassthroughImageBuilder};

use firmware::Firmware;

pub use options::{DEFAULT_DATA_ROOT, FlashOptions};
pub use state::{FlashAttemptState, FlashStage, SystemFlashStatus};

pub(crate) const FLASHER_TARGET: &str = "flashwright::flasher";

/// Installs a build on a device.
pub trait DeviceFlasher {
    /// Flashes `build` onto `device`, recording progress in `state`.
    ///
    /// # Errors
    ///
    /// Returns a classified failure from the first stage that could not
    /// complete.
    fn flash(
        &self,
        device: &dyn ControlChannel,
        build: &BuildDescriptor,
        state: &mut FlashAttemptState,
    ) -> Result<(), ProvisionFailure>;
}

/// Inputs resolved before any partition is touched.
#[derive(Debug)]
struct Resources {
    product: String,
    requirements: RequirementMap,
}

/// Orchestrates bootloader-driven flashing.
///
/// Collaborators are injected: `M` locates the requirement document, `I`
/// produces the system update image, and `S` pauses between query retries.
#[derive(Debug, Clone)]
pub struct FastbootFlasher<
    M = FileManifestSource,
    I = PassthroughImageBuilder,
    S = ThreadSleeper,
> {
    options: FlashOptions,
    manifests: M,
    images: I,
    sleeper: S,
}

impl FastbootFlasher {
    /// Creates a flasher with the filesystem manifest source, passthrough
    /// images, and real sleeps.
    #[must_use]
    pub const fn with_defaults(options: FlashOptions) -> Self {
        Self::new(options, FileManifestSource, PassthroughImageBuilder, ThreadSleeper)
    }
}

impl<M, I, S> FastbootFlasher<M, I, S> {
    /// Creates a flasher from explicit collaborators.
    pub const fn new(options: FlashOptions, manifests: M, images: I, sleeper: S) -> Self {
        Self {
            options,
            manifests,
            images,
            sleeper,
        }
    }

    /// Options applied to every attempt.
    #[must_use]
    pub const fn options(&self) -> &FlashOptions {
        &self.options
    }
}

impl<M, I, S> DeviceFlasher for FastbootFlasher<M, I, S>
where
    M: ManifestSource,
    I: ImageBuilder,
    S: Sleeper,
{
    fn flash(
        &self,
        device: &dyn ControlChannel,
        build: &BuildDescriptor,
        state: &mut FlashAttemptState,
    ) -> Result<(), ProvisionFailure> {
        info!(
            target: FLASHER_TARGET,
            serial = device.serial(),
            build_id = build.build_id(),
            build_flavor = build.build_flavor(),
            user_data = %state.user_data_strategy(),
            "flashing device"
        );

        let installed = system::read_installed_build(device)?;
        device
            .reboot_into_bootloader()
            .map_err(|error| unavailable("reboot into bootloader", error))?;

        let resources = self.resolve_resources(device, build, state)?;
        self.flash_firmware(device, Firmware::Bootloader, build.bootloader(), &resources, state)?;
        self.flash_firmware(device, Firmware::Baseband, build.baseband(), &resources, state)?;
        self.flash_system(device, build, installed.as_ref(), state)?;
        self.handle_user_data(device, build, state)?;
        self.wipe_cache(device, state)?;

        boot_flashed_build(device, state, "reboot after flashing")?;

        info!(
            target: FLASHER_TARGET,
            serial = device.serial(),
            build_id = build.build_id(),
            system_flash = %state.system_flash_status(),
            "flashing finished"
        );
        Ok(())
    }
}

impl<M, I, S> FastbootFlasher<M, I, S>
where
    M: ManifestSource,
    I: ImageBuilder,
    S: Sleeper,
{
    fn resolve_resources(
        &self,
        device: &dyn ControlChannel,
        build: &BuildDescriptor,
        state: &mut FlashAttemptState,
    ) -> Result<Resources, ProvisionFailure> {
        state.enter(FlashStage::ResolveResources);

        let product = self
            .options
            .query()
            .run("product", &self.sleeper, || device.product_identifier())
            .map_err(|error| match error {
                QueryError::Channel(channel) => unavailable("read product identifier", channel),
                exhausted @ QueryError::Exhausted { .. } => ProvisionFailure::device_unavailable(
                    format!("device {} reported no product identifier", device.serial()),
                )
                .with_source(exhausted),
            })?
            .to_ascii_lowercase();

        let requirements = self.manifests.load(build)?;
        match requirements.required_boards(Some(product.as_str())) {
            None => warn!(
                target: FLASHER_TARGET,
                serial = device.serial(),
                build_id = build.build_id(),
                "requirement document names no boards; skipping board check"
            ),
            Some(boards) if boards.contains(&product) => debug!(
                target: FLASHER_TARGET,
                serial = device.serial(),
                product = %product,
                "device board accepted by build"
            ),
            Some(boards) => {
                let accepted: Vec<&str> = boards.iter().map(String::as_str).collect();
                return Err(ProvisionFailure::setup_impossible(format!(
                    "build {} supports boards [{}] but device {} is '{product}'",
                    build.build_id(),
                    accepted.join(", "),
                    device.serial()
                )));
            }
        }

        let slot = current_slot(device, self.options.command_timeout())
            .map_err(|error| unavailable("read current slot", error))?;
        debug!(
            target: FLASHER_TARGET,
            serial = device.serial(),
            slot = ?slot,
            "resolved active slot"
        );
        state.set_slot(slot);

        Ok(Resources {
            product,
            requirements,
        })
    }

    /// Reads a bootloader variable with bounded retries.
    fn query_variable(
        &self,
        device: &dyn ControlChannel,
        variable: &str,
    ) -> Result<String, ProvisionFailure> {
        let args = [String::from("getvar"), variable.to_owned()];
        self.options
            .query()
            .run(variable, &self.sleeper, || {
                let output = device.execute_bootloader(&args, self.options.command_timeout())?;
                Ok(parse_variable(&output, variable))
            })
            .map_err(|error| match error {
                QueryError::Channel(channel) => {
                    unavailable(&format!("query '{variable}'"), channel)
                }
                exhausted @ QueryError::Exhausted { .. } => {
                    ProvisionFailure::setup_impossible(exhausted.to_string()).with_source(exhausted)
                }
            })
    }

    /// Runs a bootloader command that must succeed.
    fn run_bootloader(
        &self,
        device: &dyn ControlChannel,
        args: &[String],
        timeout: Duration,
    ) -> Result<CommandOutput, ProvisionFailure> {
        let command = args.join(" ");
        let output = device
            .execute_bootloader(args, timeout)
            .map_err(|error| unavailable(&format!("bootloader command '{command}'"), error))?;
        match output.status {
            CommandStatus::Success => Ok(output),
            CommandStatus::TimedOut => Err(ProvisionFailure::device_unavailable(format!(
                "bootloader command '{command}' on {} timed out",
                device.serial()
            ))),
            CommandStatus::Failed => Err(ProvisionFailure::setup_impossible(format!(
                "bootloader command '{command}' on {} failed: {}",
                device.serial(),
                output.diagnostic()
            ))),
        }
    }
}

fn owned_args(args: &[&str]) -> Vec<String> {
    args.iter().map(|arg| (*arg).to_owned()).collect()
}

/// Reboots into the normal OS. Once new system images are installed, a device
/// that does not come back is blamed on the build.
fn boot_flashed_build(
    device: &dyn ControlChannel,
    state: &FlashAttemptState,
    action: &str,
) -> Result<(), ProvisionFailure> {
    device.reboot_until_online().map_err(|error| {
        if state.system_flash_status() == SystemFlashStatus::Success {
            ProvisionFailure::build_defective(format!(
                "{action} failed on {}: {error}",
                device.serial()
            ))
            .with_source(error)
        } else {
            unavailable(action, error)
        }
    })
}

fn shell(device: &dyn ControlChannel, command: &str) -> Result<String, ProvisionFailure> {
    device
        .execute_shell(command)
        .map_err(|error| unavailable(&format!("shell command '{command}'"), error))
}
