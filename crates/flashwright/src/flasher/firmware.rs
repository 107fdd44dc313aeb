//! Bootloader and baseband firmware stages.

use tracing::{debug, info, warn};

use super::{FLASHER_TARGET, FastbootFlasher, FlashAttemptState, FlashStage, Resources};
use crate::channel::{ControlChannel, unavailable};
use crate::descriptor::VersionedArtifact;
use crate::failure::ProvisionFailure;
use crate::query::Sleeper;
use crate::source::{ImageBuilder, ManifestSource};

/// Firmware images checked before the system partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Firmware {
    Bootloader,
    Baseband,
}

impl Firmware {
    /// Bootloader variable reporting the installed version, also used as the
    /// requirement document key.
    pub(super) const fn version_variable(self) -> &'static str {
        match self {
            Self::Bootloader => "version-bootloader",
            Self::Baseband => "version-baseband",
        }
    }

    pub(super) const fn partition(self) -> &'static str {
        match self {
            Self::Bootloader => "bootloader",
            Self::Baseband => "radio",
        }
    }

    const fn stage(self) -> FlashStage {
        match self {
            Self::Bootloader => FlashStage::Bootloader,
            Self::Baseband => FlashStage::Baseband,
        }
    }
}

impl<M, I, S> FastbootFlasher<M, I, S>
where
    M: ManifestSource,
    I: ImageBuilder,
    S: Sleeper,
{
    pub(super) fn flash_firmware(
        &self,
        device: &dyn ControlChannel,
        firmware: Firmware,
        artifact: Option<&VersionedArtifact>,
        resources: &Resources,
        state: &mut FlashAttemptState,
    ) -> Result<(), ProvisionFailure> {
        let Some(artifact) = artifact else {
            debug!(
                target: FLASHER_TARGET,
                serial = device.serial(),
                partition = firmware.partition(),
                "build carries no image; skipping firmware stage"
            );
            return Ok(());
        };
        state.enter(firmware.stage());

        let variable = firmware.version_variable();
        let required = resources
            .requirements
            .required_value(variable, Some(resources.product.as_str()))
            .unwrap_or_else(|| artifact.version());
        let installed = self.query_variable(device, variable)?;

        if installed == required {
            info!(
                target: FLASHER_TARGET,
                serial = device.serial(),
                partition = firmware.partition(),
                version = %installed,
                "firmware already at required version"
            );
            return Ok(());
        }
        if artifact.version() != required {
            warn!(
                target: FLASHER_TARGET,
                serial = device.serial(),
                partition = firmware.partition(),
                required,
                artifact_version = artifact.version(),
                "firmware image version differs from requirement document"
            );
        }

        info!(
            target: FLASHER_TARGET,
            serial = device.serial(),
            partition = firmware.partition(),
            installed = %installed,
            required,
            "flashing firmware"
        );
        let args = vec![
            String::from("flash"),
            firmware.partition().to_owned(),
            artifact.path().display().to_string(),
        ];
        self.run_bootloader(device, &args, self.options.long_command_timeout())?;
        device
            .reboot_into_bootloader()
            .map_err(|error| unavailable("reboot after firmware update", error))
    }
}
