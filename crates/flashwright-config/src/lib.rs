//! Shared configuration for Flashwright provisioning hosts.
//!
//! [`ProvisionConfig`] is loaded once per host through `ortho_config`, merging
//! built-in defaults, an optional TOML file (`--config-path` or
//! `FLASHWRIGHT_CONFIG_PATH`), `FLASHWRIGHT_*` environment variables, and CLI
//! flags in increasing order of precedence. The provisioning core converts the
//! loaded value into explicit option structs so no stage reads ambient
//! settings.

mod defaults;
mod logging;
mod strategy;

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_AVAILABLE_TIMEOUT_MS, DEFAULT_BOOT_POLL_COUNT, DEFAULT_BOOT_POLL_INTERVAL_MS,
    DEFAULT_COMMAND_TIMEOUT_MS, DEFAULT_DATA_SKIP_LIST, DEFAULT_LOG_FILTER,
    DEFAULT_LONG_COMMAND_TIMEOUT_MS, DEFAULT_QUERY_ATTEMPTS, DEFAULT_QUERY_RETRY_INTERVAL_MS,
    DEFAULT_REBOOT_TIMEOUT_MS, DEFAULT_WIPE_TIMEOUT_MS, default_log_filter,
    default_log_filter_string, default_log_format, default_user_data_strategy,
};
pub use logging::{FlashRecordSink, LogFormat, OutputChoiceParseError};
pub use strategy::{UserDataStrategy, UserDataStrategyParseError};

/// Provisioning configuration shared by the orchestrator and lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "FLASHWRIGHT")]
pub struct ProvisionConfig {
    /// Tracing filter expression applied to log output.
    #[serde(default = "defaults::default_log_filter_string")]
    pub log_filter: String,
    /// Output format for log lines.
    #[serde(default = "defaults::default_log_format")]
    pub log_format: LogFormat,
    /// Destination for per-attempt flash records.
    #[serde(default)]
    pub flash_record_sink: FlashRecordSink,
    /// File receiving flash records when the sink is `json_lines`.
    #[serde(default)]
    pub flash_record_path: Option<String>,
    /// Strategy applied to the user-data partition.
    #[serde(default = "defaults::default_user_data_strategy")]
    pub user_data_strategy: UserDataStrategy,
    /// Timeout for a bootloader user-data wipe, in milliseconds.
    #[serde(default = "defaults::default_wipe_timeout_ms")]
    pub wipe_timeout_ms: u64,
    /// Timeout for image updates and other long bootloader commands.
    #[serde(default = "defaults::default_long_command_timeout_ms")]
    pub long_command_timeout_ms: u64,
    /// Timeout for short host tool invocations such as variable queries.
    #[serde(default = "defaults::default_command_timeout_ms")]
    pub command_timeout_ms: u64,
    /// Time allowed for a reboot to reach the requested mode.
    #[serde(default = "defaults::default_reboot_timeout_ms")]
    pub reboot_timeout_ms: u64,
    /// Attempts made by bounded device queries before giving up.
    #[serde(default = "defaults::default_query_attempts")]
    pub query_attempts: u32,
    /// Pause between bounded query attempts, in milliseconds.
    #[serde(default = "defaults::default_query_retry_interval_ms")]
    pub query_retry_interval_ms: u64,
    /// Interval between boot polls after flashing, in milliseconds.
    #[serde(default = "defaults::default_boot_poll_interval_ms")]
    pub boot_poll_interval_ms: u64,
    /// Number of boot polls before the build counts as not booting.
    #[serde(default = "defaults::default_boot_poll_count")]
    pub boot_poll_count: u32,
    /// Time allowed for a booted device to report itself available.
    #[serde(default = "defaults::default_available_timeout_ms")]
    pub available_timeout_ms: u64,
    /// Extra flags passed to the bootloader tool before `update`.
    #[serde(default)]
    pub flash_options: Vec<String>,
    /// Flash the system image even when the device already runs the build.
    #[serde(default)]
    pub force_system_flash: bool,
    /// Target the currently active slot explicitly when updating.
    #[serde(default)]
    pub flash_to_current_slot: bool,
    /// Prefer `erase` over `format` when wiping the cache partition.
    #[serde(default)]
    pub use_erase: bool,
    /// Data-root entries preserved by filesystem deletes.
    #[serde(default = "defaults::default_data_skip_list")]
    pub data_skip_list: Vec<String>,
    /// Request root access on the booted device before handing it over.
    #[serde(default)]
    pub enable_root: bool,
    /// Dismiss the keyguard on the booted device before handing it over.
    #[serde(default)]
    pub dismiss_keyguard: bool,
    /// Maximum number of devices flashing at once on this host.
    #[serde(default)]
    pub concurrent_flash_limit: Option<usize>,
    /// Wipe user data through the bootloader during tear-down.
    #[serde(default)]
    pub wipe_on_teardown: bool,
    /// Location of the normal-boot shell tool.
    #[serde(default = "defaults::default_adb_path")]
    pub adb_path: String,
    /// Location of the bootloader control tool.
    #[serde(default = "defaults::default_fastboot_path")]
    pub fastboot_path: String,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            log_filter: defaults::default_log_filter_string(),
            log_format: defaults::default_log_format(),
            flash_record_sink: FlashRecordSink::default(),
            flash_record_path: None,
            user_data_strategy: defaults::default_user_data_strategy(),
            wipe_timeout_ms: defaults::default_wipe_timeout_ms(),
            long_command_timeout_ms: defaults::default_long_command_timeout_ms(),
            command_timeout_ms: defaults::default_command_timeout_ms(),
            reboot_timeout_ms: defaults::default_reboot_timeout_ms(),
            query_attempts: defaults::default_query_attempts(),
            query_retry_interval_ms: defaults::default_query_retry_interval_ms(),
            boot_poll_interval_ms: defaults::default_boot_poll_interval_ms(),
            boot_poll_count: defaults::default_boot_poll_count(),
            available_timeout_ms: defaults::default_available_timeout_ms(),
            flash_options: Vec::new(),
            force_system_flash: false,
            flash_to_current_slot: false,
            use_erase: false,
            data_skip_list: defaults::default_data_skip_list(),
            enable_root: false,
            dismiss_keyguard: false,
            concurrent_flash_limit: None,
            wipe_on_teardown: false,
            adb_path: defaults::default_adb_path(),
            fastboot_path: defaults::default_fastboot_path(),
        }
    }
}

impl ProvisionConfig {
    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Configured log format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Configured flash-record destination.
    #[must_use]
    pub const fn flash_record_sink(&self) -> FlashRecordSink {
        self.flash_record_sink
    }

    /// Configured user-data strategy.
    #[must_use]
    pub const fn user_data_strategy(&self) -> UserDataStrategy {
        self.user_data_strategy
    }

    /// Timeout for a bootloader user-data wipe.
    #[must_use]
    pub const fn wipe_timeout(&self) -> Duration {
        Duration::from_millis(self.wipe_timeout_ms)
    }

    /// Timeout for long bootloader commands.
    #[must_use]
    pub const fn long_command_timeout(&self) -> Duration {
        Duration::from_millis(self.long_command_timeout_ms)
    }

    /// Timeout for short host tool invocations.
    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    /// Time allowed for a reboot to complete.
    #[must_use]
    pub const fn reboot_timeout(&self) -> Duration {
        Duration::from_millis(self.reboot_timeout_ms)
    }

    /// Pause between bounded query attempts.
    #[must_use]
    pub const fn query_retry_interval(&self) -> Duration {
        Duration::from_millis(self.query_retry_interval_ms)
    }

    /// Interval between boot polls.
    #[must_use]
    pub const fn boot_poll_interval(&self) -> Duration {
        Duration::from_millis(self.boot_poll_interval_ms)
    }

    /// Time allowed for a booted device to become available.
    #[must_use]
    pub const fn available_timeout(&self) -> Duration {
        Duration::from_millis(self.available_timeout_ms)
    }

    /// Total time a flashed device has to come back online.
    ///
    /// Computed as the boot poll interval multiplied by the poll count,
    /// saturating on overflow.
    #[must_use]
    pub fn online_timeout(&self) -> Duration {
        self.boot_poll_interval()
            .checked_mul(self.boot_poll_count)
            .unwrap_or(Duration::MAX)
    }
}
