use std::time::Duration;

use flashwright_config::{ProvisionConfig, UserDataStrategy};

/// Settings for the lifecycle around flashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleOptions {
    user_data_strategy: UserDataStrategy,
    online_timeout: Duration,
    available_timeout: Duration,
    wipe_timeout: Duration,
    wipe_on_teardown: bool,
}

impl LifecycleOptions {
    /// Derives lifecycle settings from the provisioning configuration.
    #[must_use]
    pub fn from_config(config: &ProvisionConfig) -> Self {
        Self {
            user_data_strategy: config.user_data_strategy(),
            online_timeout: config.online_timeout(),
            available_timeout: config.available_timeout(),
            wipe_timeout: config.wipe_timeout(),
            wipe_on_teardown: config.wipe_on_teardown,
        }
    }

    /// Sets the user-data strategy for new attempts.
    #[must_use]
    pub const fn with_user_data_strategy(mut self, strategy: UserDataStrategy) -> Self {
        self.user_data_strategy = strategy;
        self
    }

    /// Sets the boot verification timeouts.
    #[must_use]
    pub const fn with_boot_timeouts(mut self, online: Duration, available: Duration) -> Self {
        self.online_timeout = online;
        self.available_timeout = available;
        self
    }

    /// Enables a bootloader wipe during tear-down.
    #[must_use]
    pub const fn with_wipe_on_teardown(mut self, enabled: bool) -> Self {
        self.wipe_on_teardown = enabled;
        self
    }

    /// User-data strategy for new attempts.
    #[must_use]
    pub const fn user_data_strategy(&self) -> UserDataStrategy {
        self.user_data_strategy
    }

    /// Time a flashed device has to come online.
    #[must_use]
    pub const fn online_timeout(&self) -> Duration {
        self.online_timeout
    }

    /// Time a booted device has to become available.
    #[must_use]
    pub const fn available_timeout(&self) -> Duration {
        self.available_timeout
    }

    /// Timeout for the tear-down wipe.
    #[must_use]
    pub const fn wipe_timeout(&self) -> Duration {
        self.wipe_timeout
    }

    /// Whether tear-down wipes user data.
    #[must_use]
    pub const fn wipe_on_teardown(&self) -> bool {
        self.wipe_on_teardown
    }
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self::from_config(&ProvisionConfig::default())
    }
}
