//! Captured output of bootloader commands.

use strum::Display;

/// Completion status of a bootloader command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum CommandStatus {
    /// The command reported success.
    Success,
    /// The command ran and reported failure.
    Failed,
    /// The command was killed after its timeout elapsed.
    TimedOut,
}

/// Output captured from a bootloader command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Completion status.
    pub status: CommandStatus,
}

impl CommandOutput {
    /// Builds an output record.
    pub fn new(
        status: CommandStatus,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            status,
        }
    }

    /// Successful output with text on standard error, the stream the
    /// bootloader tool uses for variable reports.
    pub fn success(stderr: impl Into<String>) -> Self {
        Self::new(CommandStatus::Success, String::new(), stderr)
    }

    /// Failed output with the given diagnostic.
    pub fn failed(stderr: impl Into<String>) -> Self {
        Self::new(CommandStatus::Failed, String::new(), stderr)
    }

    /// Returns `true` for [`CommandStatus::Success`].
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.status == CommandStatus::Success
    }

    /// The most useful diagnostic text, preferring standard error.
    #[must_use]
    pub fn diagnostic(&self) -> &str {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim()
        } else {
            stderr
        }
    }
}

/// Extracts `name: value` from a successful variable query.
///
/// The bootloader tool prints the report on either stream, so standard
/// output is searched first and standard error second. Blank values count as
/// missing.
#[must_use]
pub fn parse_variable(output: &CommandOutput, name: &str) -> Option<String> {
    if !output.succeeded() {
        return None;
    }
    let prefix = format!("{name}:");
    [output.stdout.as_str(), output.stderr.as_str()]
        .into_iter()
        .flat_map(str::lines)
        .filter_map(|line| line.trim().strip_prefix(prefix.as_str()))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_owned)
}
