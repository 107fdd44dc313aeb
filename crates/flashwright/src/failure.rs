//! Failure taxonomy for provisioning attempts.
//!
//! Every failure carries an explicit [`FailureKind`] so harnesses can decide
//! whether to retry on another device, blame the build, or give up. Kinds are
//! assigned where the failure is detected; the lifecycle only reclassifies
//! failures raised after flashing has finished.

use std::error::Error as StdError;

use strum::{Display, EnumString};
use thiserror::Error;

/// Boxed cause attached to a [`ProvisionFailure`].
pub type FailureSource = Box<dyn StdError + Send + Sync + 'static>;

/// Classification of a provisioning failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    /// The descriptor, configuration, requirement document, or device identity
    /// makes the requested setup impossible. Never retryable.
    SetupImpossible,
    /// The device was flashed but the build failed to boot or run.
    BuildDefective,
    /// Communication with the device was lost.
    DeviceUnavailable,
}

impl FailureKind {
    /// Returns `true` when the same attempt may succeed on another device.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::DeviceUnavailable)
    }

    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SetupImpossible => "setup_impossible",
            Self::BuildDefective => "build_defective",
            Self::DeviceUnavailable => "device_unavailable",
        }
    }
}

/// A classified provisioning failure.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct ProvisionFailure {
    kind: FailureKind,
    message: String,
    #[source]
    source: Option<FailureSource>,
}

impl ProvisionFailure {
    /// Creates a failure of the given kind.
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a [`FailureKind::SetupImpossible`] failure.
    pub fn setup_impossible(message: impl Into<String>) -> Self {
        Self::new(FailureKind::SetupImpossible, message)
    }

    /// Creates a [`FailureKind::BuildDefective`] failure.
    pub fn build_defective(message: impl Into<String>) -> Self {
        Self::new(FailureKind::BuildDefective, message)
    }

    /// Creates a [`FailureKind::DeviceUnavailable`] failure.
    pub fn device_unavailable(message: impl Into<String>) -> Self {
        Self::new(FailureKind::DeviceUnavailable, message)
    }

    /// Attaches the underlying cause.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<FailureSource>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Wraps this failure as the cause of a new failure of another kind.
    #[must_use]
    pub fn reclassify(self, kind: FailureKind, message: impl Into<String>) -> Self {
        Self::new(kind, message).with_source(self)
    }

    /// Failure classification.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        self.kind
    }

    /// Human-readable description.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns `true` when the failure may be retried on another device.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

/// Errors returned from [`crate::ProvisionLifecycle::set_up`].
#[derive(Debug, Error)]
pub enum SetupError {
    /// The build descriptor cannot be provisioned at all.
    #[error("build {build_id} has no device image to flash")]
    InvalidDescriptor {
        /// Build the descriptor described.
        build_id: String,
    },
    /// Provisioning failed with a classified failure.
    #[error(transparent)]
    Failure(#[from] ProvisionFailure),
}

impl SetupError {
    /// Classification of the failure, if any.
    #[must_use]
    pub const fn kind(&self) -> Option<FailureKind> {
        match self {
            Self::InvalidDescriptor { .. } => None,
            Self::Failure(failure) => Some(failure.kind()),
        }
    }

    /// Returns the classified failure, if any.
    #[must_use]
    pub const fn failure(&self) -> Option<&ProvisionFailure> {
        match self {
            Self::InvalidDescriptor { .. } => None,
            Self::Failure(failure) => Some(failure),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;
    use std::io;

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(FailureKind::SetupImpossible, false)]
    #[case(FailureKind::BuildDefective, false)]
    #[case(FailureKind::DeviceUnavailable, true)]
    fn only_device_loss_is_retryable(#[case] kind: FailureKind, #[case] expected: bool) {
        assert_eq!(kind.is_retryable(), expected);
        assert_eq!(ProvisionFailure::new(kind, "x").is_retryable(), expected);
    }

    #[rstest]
    #[case(FailureKind::SetupImpossible)]
    #[case(FailureKind::BuildDefective)]
    #[case(FailureKind::DeviceUnavailable)]
    fn display_matches_canonical_name(#[case] kind: FailureKind) {
        assert_eq!(kind.to_string(), kind.as_str());
        assert_eq!(kind.as_str().parse::<FailureKind>().ok(), Some(kind));
    }

    #[test]
    fn reclassify_keeps_original_as_source() {
        let original = ProvisionFailure::device_unavailable("adb went away")
            .with_source(io::Error::other("broken pipe"));
        let reclassified =
            original.reclassify(FailureKind::BuildDefective, "post-boot setup failed");

        assert_eq!(reclassified.kind(), FailureKind::BuildDefective);
        let source = reclassified.source().expect("source should be kept");
        assert!(source.to_string().contains("adb went away"));
    }

    #[test]
    fn setup_error_exposes_kind() {
        let invalid = SetupError::InvalidDescriptor {
            build_id: String::from("1234"),
        };
        assert_eq!(invalid.kind(), None);

        let failure = SetupError::from(ProvisionFailure::setup_impossible("board mismatch"));
        assert_eq!(failure.kind(), Some(FailureKind::SetupImpossible));
        assert_eq!(failure.to_string(), "setup_impossible: board mismatch");
    }
}
