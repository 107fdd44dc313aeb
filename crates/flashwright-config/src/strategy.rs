//! User-data handling strategies applied after the system partitions flash.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Determines what happens to the user-data partition during provisioning.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, Hash, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum UserDataStrategy {
    /// Leave user data untouched.
    #[default]
    Retain,
    /// Wipe through the bootloader unless the device already runs the
    /// target build.
    Wipe,
    /// Wipe through the bootloader unconditionally.
    ForceWipe,
    /// Boot the device and delete the data partition contents from the shell.
    WipeViaFilesystemDelete,
    /// Delete the data partition contents, then push and extract the build's
    /// test-content archive.
    PushTestContent,
}

impl UserDataStrategy {
    /// Returns `true` when the strategy deletes data from a booted device
    /// rather than through the bootloader.
    #[must_use]
    pub const fn deletes_from_filesystem(self) -> bool {
        matches!(self, Self::WipeViaFilesystemDelete | Self::PushTestContent)
    }
}

/// Errors encountered while parsing a [`UserDataStrategy`] from text.
pub type UserDataStrategyParseError = strum::ParseError;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("retain", UserDataStrategy::Retain)]
    #[case("WIPE", UserDataStrategy::Wipe)]
    #[case("force_wipe", UserDataStrategy::ForceWipe)]
    #[case("wipe_via_filesystem_delete", UserDataStrategy::WipeViaFilesystemDelete)]
    #[case("Push_Test_Content", UserDataStrategy::PushTestContent)]
    fn parses_strategy_names(#[case] text: &str, #[case] expected: UserDataStrategy) {
        let parsed: UserDataStrategy = text.parse().expect("strategy should parse");
        assert_eq!(parsed, expected);
    }

    #[test]
    fn rejects_unknown_strategy() {
        assert!("scrub".parse::<UserDataStrategy>().is_err());
    }

    #[rstest]
    #[case(UserDataStrategy::Retain, false)]
    #[case(UserDataStrategy::ForceWipe, false)]
    #[case(UserDataStrategy::WipeViaFilesystemDelete, true)]
    #[case(UserDataStrategy::PushTestContent, true)]
    fn identifies_filesystem_strategies(
        #[case] strategy: UserDataStrategy,
        #[case] expected: bool,
    ) {
        assert_eq!(strategy.deletes_from_filesystem(), expected);
    }
}
