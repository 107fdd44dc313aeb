//! Cache partition stage. Failures here never end the attempt unless the
//! device disappears.

use tracing::{debug, info, warn};

use super::{FLASHER_TARGET, FastbootFlasher, FlashAttemptState, FlashStage, owned_args};
use crate::channel::{ControlChannel, parse_variable, unavailable};
use crate::failure::ProvisionFailure;
use crate::query::Sleeper;
use crate::source::{ImageBuilder, ManifestSource};

const CACHE_TYPE_VARIABLE: &str = "partition-type:cache";

impl<M, I, S> FastbootFlasher<M, I, S>
where
    M: ManifestSource,
    I: ImageBuilder,
    S: Sleeper,
{
    pub(super) fn wipe_cache(
        &self,
        device: &dyn ControlChannel,
        state: &mut FlashAttemptState,
    ) -> Result<(), ProvisionFailure> {
        state.enter(FlashStage::Cache);

        if !self.cache_partition_present(device)? {
            debug!(
                target: FLASHER_TARGET,
                serial = device.serial(),
                "device has no cache partition"
            );
            return Ok(());
        }

        let verb = if device.supports_erase() { "erase" } else { "format" };
        let args = owned_args(&[verb, "cache"]);
        match device.execute_bootloader(&args, self.options.long_command_timeout()) {
            Ok(output) if output.succeeded() => {
                info!(target: FLASHER_TARGET, serial = device.serial(), verb, "wiped cache");
            }
            Ok(output) => warn!(
                target: FLASHER_TARGET,
                serial = device.serial(),
                verb,
                status = %output.status,
                diagnostic = output.diagnostic(),
                "cache wipe failed; continuing"
            ),
            Err(error) if error.is_device_gone() => {
                return Err(unavailable("wipe cache", error));
            }
            Err(error) => warn!(
                target: FLASHER_TARGET,
                serial = device.serial(),
                error = %error,
                "cache wipe failed; continuing"
            ),
        }
        Ok(())
    }

    fn cache_partition_present(
        &self,
        device: &dyn ControlChannel,
    ) -> Result<bool, ProvisionFailure> {
        let args = owned_args(&["getvar", CACHE_TYPE_VARIABLE]);
        match device.execute_bootloader(&args, self.options.command_timeout()) {
            Ok(output) => Ok(parse_variable(&output, CACHE_TYPE_VARIABLE).is_some()),
            Err(error) if error.is_device_gone() => {
                Err(unavailable("query cache partition", error))
            }
            Err(error) => {
                warn!(
                    target: FLASHER_TARGET,
                    serial = device.serial(),
                    error = %error,
                    "cache partition query failed; skipping cache wipe"
                );
                Ok(false)
            }
        }
    }
}
