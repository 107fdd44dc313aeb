use std::time::Duration;

use flashwright_config::ProvisionConfig;

use crate::query::BoundedQuery;

/// Default mount point of the user-data partition.
pub const DEFAULT_DATA_ROOT: &str = "/data";

/// Settings applied to every stage of a flash attempt.
///
/// Derived once from [`ProvisionConfig`] so stages never read ambient
/// configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashOptions {
    query: BoundedQuery,
    command_timeout: Duration,
    long_command_timeout: Duration,
    wipe_timeout: Duration,
    extra_flags: Vec<String>,
    force_system_flash: bool,
    flash_to_current_slot: bool,
    data_root: String,
    data_skip_list: Vec<String>,
}

impl FlashOptions {
    /// Derives options from the provisioning configuration.
    #[must_use]
    pub fn from_config(config: &ProvisionConfig) -> Self {
        Self {
            query: BoundedQuery::new(config.query_attempts, config.query_retry_interval()),
            command_timeout: config.command_timeout(),
            long_command_timeout: config.long_command_timeout(),
            wipe_timeout: config.wipe_timeout(),
            extra_flags: config.flash_options.clone(),
            force_system_flash: config.force_system_flash,
            flash_to_current_slot: config.flash_to_current_slot,
            data_root: String::from(DEFAULT_DATA_ROOT),
            data_skip_list: config.data_skip_list.clone(),
        }
    }

    /// Replaces the retry policy for short queries.
    #[must_use]
    pub const fn with_query(mut self, query: BoundedQuery) -> Self {
        self.query = query;
        self
    }

    /// Sets flags inserted before the `update` command.
    #[must_use]
    pub fn with_extra_flags<I, T>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.extra_flags = flags.into_iter().map(Into::into).collect();
        self
    }

    /// Flashes the system image even when the device already runs the build.
    #[must_use]
    pub const fn with_force_system_flash(mut self, force: bool) -> Self {
        self.force_system_flash = force;
        self
    }

    /// Targets the active slot explicitly when updating.
    #[must_use]
    pub const fn with_flash_to_current_slot(mut self, enabled: bool) -> Self {
        self.flash_to_current_slot = enabled;
        self
    }

    /// Sets the data-root entries preserved by filesystem deletes.
    #[must_use]
    pub fn with_data_skip_list<I, T>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.data_skip_list = entries.into_iter().map(Into::into).collect();
        self
    }

    /// Retry policy for short queries.
    #[must_use]
    pub const fn query(&self) -> &BoundedQuery {
        &self.query
    }

    /// Timeout for short bootloader commands.
    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        self.command_timeout
    }

    /// Timeout for firmware and system updates.
    #[must_use]
    pub const fn long_command_timeout(&self) -> Duration {
        self.long_command_timeout
    }

    /// Timeout for a bootloader user-data wipe.
    #[must_use]
    pub const fn wipe_timeout(&self) -> Duration {
        self.wipe_timeout
    }

    /// Flags inserted before the `update` command.
    #[must_use]
    pub fn extra_flags(&self) -> &[String] {
        &self.extra_flags
    }

    /// Whether matching builds are flashed anyway.
    #[must_use]
    pub const fn force_system_flash(&self) -> bool {
        self.force_system_flash
    }

    /// Whether updates target the active slot explicitly.
    #[must_use]
    pub const fn flash_to_current_slot(&self) -> bool {
        self.flash_to_current_slot
    }

    /// Mount point of the user-data partition.
    #[must_use]
    pub fn data_root(&self) -> &str {
        &self.data_root
    }

    /// Data-root entries preserved by filesystem deletes.
    #[must_use]
    pub fn data_skip_list(&self) -> &[String] {
        &self.data_skip_list
    }
}

impl Default for FlashOptions {
    fn default() -> Self {
        Self::from_config(&ProvisionConfig::default())
    }
}
