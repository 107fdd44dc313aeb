//! Post-boot setup run once the flashed build has booted.

use std::sync::Arc;

use tracing::debug;

use crate::channel::{ControlChannel, unavailable};
use crate::failure::ProvisionFailure;

use super::LIFECYCLE_TARGET;

/// Prepares a booted device for the test run.
///
/// Any failure is reclassified as a defective build by the lifecycle.
pub trait PostBootHook: Send + Sync {
    /// Runs setup against the booted device.
    ///
    /// # Errors
    ///
    /// Returns a failure describing the step that could not complete.
    fn run(&self, device: &dyn ControlChannel) -> Result<(), ProvisionFailure>;
}

impl<T> PostBootHook for Arc<T>
where
    T: PostBootHook,
{
    fn run(&self, device: &dyn ControlChannel) -> Result<(), ProvisionFailure> {
        (**self).run(device)
    }
}

/// Default hook: optionally enables root and dismisses the keyguard.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StandardPostBootHook {
    enable_root: bool,
    dismiss_keyguard: bool,
}

impl StandardPostBootHook {
    /// Creates a hook with the given steps enabled.
    #[must_use]
    pub const fn new(enable_root: bool, dismiss_keyguard: bool) -> Self {
        Self {
            enable_root,
            dismiss_keyguard,
        }
    }
}

impl PostBootHook for StandardPostBootHook {
    fn run(&self, device: &dyn ControlChannel) -> Result<(), ProvisionFailure> {
        if self.enable_root {
            let granted = device
                .enable_root()
                .map_err(|error| unavailable("enable root", error))?;
            if !granted {
                return Err(ProvisionFailure::build_defective(format!(
                    "device {} refused root access",
                    device.serial()
                )));
            }
            debug!(target: LIFECYCLE_TARGET, serial = device.serial(), "root enabled");
        }
        if self.dismiss_keyguard {
            device
                .execute_shell("wm dismiss-keyguard")
                .map_err(|error| unavailable("dismiss keyguard", error))?;
            debug!(target: LIFECYCLE_TARGET, serial = device.serial(), "keyguard dismissed");
        }
        Ok(())
    }
}
