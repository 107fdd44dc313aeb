//! User-data stage.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use flashwright_config::UserDataStrategy;
use tracing::{debug, info};

use super::{
    FLASHER_TARGET, FastbootFlasher, FlashAttemptState, FlashStage, boot_flashed_build,
    owned_args, shell,
};
use crate::channel::{ControlChannel, unavailable};
use crate::descriptor::BuildDescriptor;
use crate::failure::ProvisionFailure;
use crate::query::Sleeper;
use crate::source::{ImageBuilder, ManifestSource};

const PROBE_FILE_NAME: &str = ".flashwright-write-probe";

impl<M, I, S> FastbootFlasher<M, I, S>
where
    M: ManifestSource,
    I: ImageBuilder,
    S: Sleeper,
{
    pub(super) fn handle_user_data(
        &self,
        device: &dyn ControlChannel,
        build: &BuildDescriptor,
        state: &mut FlashAttemptState,
    ) -> Result<(), ProvisionFailure> {
        state.enter(FlashStage::UserData);

        match state.user_data_strategy() {
            UserDataStrategy::Retain => {
                debug!(target: FLASHER_TARGET, serial = device.serial(), "retaining user data");
                Ok(())
            }
            UserDataStrategy::Wipe if state.system_flash_skipped() => {
                info!(
                    target: FLASHER_TARGET,
                    serial = device.serial(),
                    "device already runs the build; skipping user-data wipe"
                );
                Ok(())
            }
            UserDataStrategy::Wipe | UserDataStrategy::ForceWipe => {
                info!(target: FLASHER_TARGET, serial = device.serial(), "wiping user data");
                self.run_bootloader(device, &owned_args(&["-w"]), self.options.wipe_timeout())
                    .map(drop)
            }
            UserDataStrategy::WipeViaFilesystemDelete => {
                self.replace_user_data(device, state, None)
            }
            UserDataStrategy::PushTestContent => {
                let archive = build.tests_archive().ok_or_else(|| {
                    ProvisionFailure::setup_impossible(format!(
                        "build {} has no test-content archive to push",
                        build.build_id()
                    ))
                })?;
                self.replace_user_data(device, state, Some(archive))
            }
        }
    }

    /// Deletes data-root contents from the booted shell, optionally pushes
    /// test content, and returns the device to the bootloader.
    fn replace_user_data(
        &self,
        device: &dyn ControlChannel,
        state: &FlashAttemptState,
        archive: Option<&Path>,
    ) -> Result<(), ProvisionFailure> {
        boot_flashed_build(device, state, "reboot before deleting user data")?;

        self.probe_data_root(device)?;
        shell(device, "stop")?;
        self.delete_data_entries(device)?;
        if let Some(path) = archive {
            self.push_test_content(device, path)?;
        }

        device
            .reboot_into_bootloader()
            .map_err(|error| unavailable("reboot after deleting user data", error))
    }

    /// Writes a token under the data root and reads it back.
    fn probe_data_root(&self, device: &dyn ControlChannel) -> Result<(), ProvisionFailure> {
        let probe = quoted(&format!("{}/{PROBE_FILE_NAME}", self.options.data_root()));
        let token = probe_token();
        let command = format!("echo {token} > {probe} && cat {probe}");

        let not_writable = |detail: String| {
            ProvisionFailure::setup_impossible(format!(
                "data partition on {} is not writable: {detail}",
                device.serial()
            ))
        };
        match device.execute_shell(&command) {
            Ok(answer) if answer.trim() == token => {}
            Ok(answer) => {
                return Err(not_writable(format!("probe read back '{}'", answer.trim())));
            }
            Err(error) if error.is_device_gone() => {
                return Err(unavailable("probe data partition", error));
            }
            Err(error) => return Err(not_writable(error.to_string()).with_source(error)),
        }

        shell(device, &format!("rm -f {probe}")).map(drop)
    }

    fn delete_data_entries(&self, device: &dyn ControlChannel) -> Result<(), ProvisionFailure> {
        let root = self.options.data_root();
        let listing = shell(device, &format!("ls -1 {}", quoted(root)))?;

        for entry in listing.lines().map(str::trim).filter(|entry| !entry.is_empty()) {
            if self.options.data_skip_list().iter().any(|skip| skip == entry) {
                debug!(
                    target: FLASHER_TARGET,
                    serial = device.serial(),
                    entry,
                    "preserving data entry"
                );
                continue;
            }
            shell(device, &format!("rm -rf {}", quoted(&format!("{root}/{entry}"))))?;
        }
        info!(target: FLASHER_TARGET, serial = device.serial(), "deleted user data");
        Ok(())
    }

    fn push_test_content(
        &self,
        device: &dyn ControlChannel,
        archive: &Path,
    ) -> Result<(), ProvisionFailure> {
        let root = self.options.data_root();
        let name = archive
            .file_name()
            .map_or_else(|| String::from("tests.zip"), |name| name.to_string_lossy().into_owned());
        let remote = format!("{root}/{name}");

        info!(
            target: FLASHER_TARGET,
            serial = device.serial(),
            archive = %archive.display(),
            "pushing test content"
        );
        device
            .push_file(archive, &remote)
            .map_err(|error| unavailable("push test content", error))?;
        let archive_arg = quoted(&remote);
        shell(device, &format!("unzip -o -q {archive_arg} -d {}", quoted(root)))?;
        shell(device, &format!("rm -f {archive_arg}")).map(drop)
    }
}

/// Single-quotes `value` for the device shell.
fn quoted(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn probe_token() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default();
    format!("flashwright-{nanos}")
}
