use crate::logging::LogFormat;
use crate::strategy::UserDataStrategy;

/// Default log filter expression used by provisioning hosts.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default number of attempts made by bounded device queries.
pub const DEFAULT_QUERY_ATTEMPTS: u32 = 3;

/// Default pause between bounded query attempts, in milliseconds.
pub const DEFAULT_QUERY_RETRY_INTERVAL_MS: u64 = 1_000;

/// Default timeout for a bootloader user-data wipe, in milliseconds.
pub const DEFAULT_WIPE_TIMEOUT_MS: u64 = 4 * 60 * 1_000;

/// Default timeout for long bootloader commands such as image updates.
pub const DEFAULT_LONG_COMMAND_TIMEOUT_MS: u64 = 10 * 60 * 1_000;

/// Default timeout for short host tool invocations, in milliseconds.
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 60 * 1_000;

/// Default time allowed for a device to finish a reboot, in milliseconds.
pub const DEFAULT_REBOOT_TIMEOUT_MS: u64 = 3 * 60 * 1_000;

/// Default interval between boot polls, in milliseconds.
pub const DEFAULT_BOOT_POLL_INTERVAL_MS: u64 = 5_000;

/// Default number of boot polls before the device counts as not booting.
pub const DEFAULT_BOOT_POLL_COUNT: u32 = 60;

/// Default time allowed for a booted device to become available.
pub const DEFAULT_AVAILABLE_TIMEOUT_MS: u64 = 5 * 60 * 1_000;

/// Data-root entries always preserved by filesystem deletes.
pub const DEFAULT_DATA_SKIP_LIST: &[&str] = &["media"];

/// Default log filter expression used by provisioning hosts.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Default user-data strategy.
#[must_use]
pub const fn default_user_data_strategy() -> UserDataStrategy {
    UserDataStrategy::Retain
}

pub(crate) const fn default_query_attempts() -> u32 {
    DEFAULT_QUERY_ATTEMPTS
}

pub(crate) const fn default_query_retry_interval_ms() -> u64 {
    DEFAULT_QUERY_RETRY_INTERVAL_MS
}

pub(crate) const fn default_wipe_timeout_ms() -> u64 {
    DEFAULT_WIPE_TIMEOUT_MS
}

pub(crate) const fn default_long_command_timeout_ms() -> u64 {
    DEFAULT_LONG_COMMAND_TIMEOUT_MS
}

pub(crate) const fn default_command_timeout_ms() -> u64 {
    DEFAULT_COMMAND_TIMEOUT_MS
}

pub(crate) const fn default_reboot_timeout_ms() -> u64 {
    DEFAULT_REBOOT_TIMEOUT_MS
}

pub(crate) const fn default_boot_poll_interval_ms() -> u64 {
    DEFAULT_BOOT_POLL_INTERVAL_MS
}

pub(crate) const fn default_boot_poll_count() -> u32 {
    DEFAULT_BOOT_POLL_COUNT
}

pub(crate) const fn default_available_timeout_ms() -> u64 {
    DEFAULT_AVAILABLE_TIMEOUT_MS
}

pub(crate) fn default_adb_path() -> String {
    String::from("adb")
}

pub(crate) fn default_fastboot_path() -> String {
    String::from("fastboot")
}

pub(crate) fn default_data_skip_list() -> Vec<String> {
    DEFAULT_DATA_SKIP_LIST
        .iter()
        .map(|entry| (*entry).to_owned())
        .collect()
}
