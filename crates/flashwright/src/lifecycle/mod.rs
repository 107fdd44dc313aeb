//! Provisioning lifecycle: the entry point used by test harnesses.
//!
//! [`ProvisionLifecycle::set_up`] validates the build descriptor, waits for a
//! flash permit, delegates to a [`DeviceFlasher`], verifies the new build
//! boots, and runs the post-boot hook. Failures after flashing are
//! reclassified as [`FailureKind::BuildDefective`]. Exactly one
//! [`FlashRecord`] is emitted per attempt that reached the system stage.
//! [`ProvisionLifecycle::tear_down`] is best effort and never fails.

mod hook;
mod options;

use std::time::{Duration, Instant};

use flashwright_config::ProvisionConfig;
use tracing::{debug, info, warn};

use crate::channel::{ChannelError, ControlChannel};
use crate::descriptor::BuildDescriptor;
use crate::failure::{FailureKind, ProvisionFailure, SetupError};
use crate::flasher::{
    DeviceFlasher, FastbootFlasher, FlashAttemptState, FlashOptions, SystemFlashStatus,
};
use crate::permits::FlashPermits;
use crate::telemetry::{FlashRecord, TelemetrySink};

pub use hook::{PostBootHook, StandardPostBootHook};
pub use options::LifecycleOptions;

pub(crate) const LIFECYCLE_TARGET: &str = "flashwright::lifecycle";

/// Drives set-up and tear-down for one device at a time.
#[derive(Debug)]
pub struct ProvisionLifecycle<F, H, T> {
    options: LifecycleOptions,
    flasher: F,
    hook: H,
    sink: T,
    permits: FlashPermits,
}

impl<T> ProvisionLifecycle<FastbootFlasher, StandardPostBootHook, T>
where
    T: TelemetrySink,
{
    /// Builds the production lifecycle from configuration.
    ///
    /// Flashing is gated by the host-wide pool sized from
    /// `concurrent_flash_limit`.
    #[must_use]
    pub fn from_config(config: &ProvisionConfig, sink: T) -> Self {
        Self::new(
            LifecycleOptions::from_config(config),
            FastbootFlasher::with_defaults(FlashOptions::from_config(config)),
            StandardPostBootHook::new(config.enable_root, config.dismiss_keyguard),
            sink,
            FlashPermits::host(config.concurrent_flash_limit),
        )
    }
}

impl<F, H, T> ProvisionLifecycle<F, H, T>
where
    F: DeviceFlasher,
    H: PostBootHook,
    T: TelemetrySink,
{
    /// Creates a lifecycle from explicit collaborators.
    pub const fn new(
        options: LifecycleOptions,
        flasher: F,
        hook: H,
        sink: T,
        permits: FlashPermits,
    ) -> Self {
        Self {
            options,
            flasher,
            hook,
            sink,
            permits,
        }
    }

    /// Limiter gating the flashing step.
    #[must_use]
    pub const fn permits(&self) -> &FlashPermits {
        &self.permits
    }

    /// Flashes `build` onto `device` and verifies that it boots.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::InvalidDescriptor`] when the build has no device
    /// image, and [`SetupError::Failure`] with the classified failure
    /// otherwise.
    pub fn set_up(
        &self,
        device: &dyn ControlChannel,
        build: &BuildDescriptor,
    ) -> Result<(), SetupError> {
        if build.device_image().is_none() {
            warn!(
                target: LIFECYCLE_TARGET,
                serial = device.serial(),
                build_id = build.build_id(),
                "build has no device image"
            );
            return Err(SetupError::InvalidDescriptor {
                build_id: build.build_id().to_owned(),
            });
        }

        let mut state = FlashAttemptState::new(device.serial(), self.options.user_data_strategy());

        let queued = Instant::now();
        let permit = self.permits.acquire();
        let queue_time = queued.elapsed();

        let started = Instant::now();
        let flashed = self.flasher.flash(device, build, &mut state);
        drop(permit);
        let outcome = flashed.and_then(|()| self.verify_boot(device));
        let flashing_time = started.elapsed();

        self.report(build, &state, queue_time, flashing_time);

        match &outcome {
            Ok(()) => info!(
                target: LIFECYCLE_TARGET,
                serial = device.serial(),
                build_id = build.build_id(),
                flashing_ms = millis(flashing_time),
                "device provisioned"
            ),
            Err(failure) => warn!(
                target: LIFECYCLE_TARGET,
                serial = device.serial(),
                build_id = build.build_id(),
                kind = %failure.kind(),
                error = %failure,
                "provisioning failed"
            ),
        }
        outcome.map_err(SetupError::from)
    }

    /// Best-effort clean-up after a test run. Never fails.
    ///
    /// Skipped entirely when `prior` shows the device was lost.
    pub fn tear_down(
        &self,
        device: &dyn ControlChannel,
        build: &BuildDescriptor,
        prior: Option<&ProvisionFailure>,
    ) {
        if prior.is_some_and(|failure| failure.kind() == FailureKind::DeviceUnavailable) {
            debug!(
                target: LIFECYCLE_TARGET,
                serial = device.serial(),
                "device unavailable; skipping tear-down"
            );
            return;
        }
        if !self.options.wipe_on_teardown() {
            return;
        }
        if let Err(error) = self.wipe_for_teardown(device) {
            warn!(
                target: LIFECYCLE_TARGET,
                serial = device.serial(),
                build_id = build.build_id(),
                error = %error,
                "tear-down wipe failed"
            );
        }
    }

    fn verify_boot(&self, device: &dyn ControlChannel) -> Result<(), ProvisionFailure> {
        let online = self.options.online_timeout();
        device.wait_for_online(online).map_err(|error| {
            ProvisionFailure::build_defective(format!(
                "device {} did not come online within {} ms of flashing",
                device.serial(),
                millis(online)
            ))
            .with_source(error)
        })?;

        let available = self.options.available_timeout();
        device.wait_for_available(available).map_err(|error| {
            ProvisionFailure::build_defective(format!(
                "device {} did not become available within {} ms of booting",
                device.serial(),
                millis(available)
            ))
            .with_source(error)
        })?;

        self.hook.run(device).map_err(|failure| {
            let message = format!(
                "post-boot setup failed on {}: {}",
                device.serial(),
                failure.message()
            );
            failure.reclassify(FailureKind::BuildDefective, message)
        })
    }

    fn report(
        &self,
        build: &BuildDescriptor,
        state: &FlashAttemptState,
        queue_time: Duration,
        flashing_time: Duration,
    ) {
        if state.system_flash_status() == SystemFlashStatus::NotAttempted {
            debug!(
                target: LIFECYCLE_TARGET,
                serial = state.serial(),
                "system flash not attempted; no flash record"
            );
            return;
        }

        let record = FlashRecord {
            branch: build.branch().to_owned(),
            build_flavor: build.build_flavor().to_owned(),
            build_id: build.build_id().to_owned(),
            serial: state.serial().to_owned(),
            queue_time,
            flashing_time,
            system_flash_status: state.system_flash_status(),
        };
        if let Err(error) = self.sink.record_flash(&record) {
            warn!(
                target: LIFECYCLE_TARGET,
                serial = state.serial(),
                error = %error,
                "failed to record flash telemetry"
            );
        }
    }

    fn wipe_for_teardown(&self, device: &dyn ControlChannel) -> Result<(), ChannelError> {
        device.reboot_into_bootloader()?;
        let output =
            device.execute_bootloader(&[String::from("-w")], self.options.wipe_timeout())?;
        if !output.succeeded() {
            warn!(
                target: LIFECYCLE_TARGET,
                serial = device.serial(),
                diagnostic = output.diagnostic(),
                "tear-down wipe reported failure"
            );
        }
        device.reboot_until_online()
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests;
