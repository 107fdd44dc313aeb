//! Per-attempt flashing state.

use serde::Serialize;
use strum::Display;

use flashwright_config::UserDataStrategy;

use crate::slot::Slot;

/// Outcome of the system partition stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SystemFlashStatus {
    /// No update command was issued.
    #[default]
    NotAttempted,
    /// The update command reported success.
    Success,
    /// The update command ran and reported failure.
    Failed,
    /// The channel failed while the update command was running.
    Exception,
}

/// Stages of a flash attempt, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum FlashStage {
    /// Identifier, requirement document, and slot resolution.
    ResolveResources,
    /// Bootloader firmware check and update.
    Bootloader,
    /// Baseband firmware check and update.
    Baseband,
    /// System partition update.
    System,
    /// User-data handling.
    UserData,
    /// Cache partition wipe.
    Cache,
}

/// State owned by a single flash attempt.
///
/// The lifecycle allocates it before flashing so the terminal
/// [`SystemFlashStatus`] survives an error return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashAttemptState {
    serial: String,
    user_data_strategy: UserDataStrategy,
    system_flash_status: SystemFlashStatus,
    slot: Option<Slot>,
    system_flash_skipped: bool,
    stages: Vec<FlashStage>,
}

impl FlashAttemptState {
    /// Creates state for an attempt against `serial`.
    pub fn new(serial: impl Into<String>, user_data_strategy: UserDataStrategy) -> Self {
        Self {
            serial: serial.into(),
            user_data_strategy,
            system_flash_status: SystemFlashStatus::NotAttempted,
            slot: None,
            system_flash_skipped: false,
            stages: Vec::new(),
        }
    }

    /// Serial of the device being flashed.
    #[must_use]
    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// Strategy applied to user data.
    #[must_use]
    pub const fn user_data_strategy(&self) -> UserDataStrategy {
        self.user_data_strategy
    }

    /// Outcome of the system stage so far.
    #[must_use]
    pub const fn system_flash_status(&self) -> SystemFlashStatus {
        self.system_flash_status
    }

    /// Active slot, when the device has one.
    #[must_use]
    pub const fn slot(&self) -> Option<Slot> {
        self.slot
    }

    /// Whether the system stage was skipped because the device already ran
    /// the target build.
    #[must_use]
    pub const fn system_flash_skipped(&self) -> bool {
        self.system_flash_skipped
    }

    /// Stages entered so far.
    #[must_use]
    pub fn stages(&self) -> &[FlashStage] {
        &self.stages
    }

    /// Records the outcome of the system stage.
    pub const fn record_system_flash(&mut self, status: SystemFlashStatus) {
        self.system_flash_status = status;
    }

    pub(crate) const fn skip_system_flash(&mut self) {
        self.system_flash_status = SystemFlashStatus::NotAttempted;
        self.system_flash_skipped = true;
    }

    pub(crate) const fn set_slot(&mut self, slot: Option<Slot>) {
        self.slot = slot;
    }

    pub(crate) fn enter(&mut self, stage: FlashStage) {
        self.stages.push(stage);
    }
}
