//! Build descriptors handed over by the build resolver.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A firmware artifact tagged with the version it installs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedArtifact {
    path: PathBuf,
    version: String,
}

impl VersionedArtifact {
    /// Creates an artifact record.
    pub fn new(path: impl Into<PathBuf>, version: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            version: version.into(),
        }
    }

    /// Location of the image on the host.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Version the image installs.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }
}

/// Everything the provisioning core knows about the build to install.
///
/// # Example
///
/// ```
/// use flashwright::{BuildDescriptor, VersionedArtifact};
///
/// let build = BuildDescriptor::new("8812345", "sailfish-userdebug")
///     .with_branch("main")
///     .with_device_image("/builds/8812345/sailfish-img.zip")
///     .with_bootloader(VersionedArtifact::new("/builds/8812345/bootloader.img", "8996-012001"));
/// assert_eq!(build.build_id(), "8812345");
/// assert!(build.device_image().is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildDescriptor {
    build_id: String,
    build_flavor: String,
    #[serde(default)]
    branch: String,
    #[serde(default)]
    device_image: Option<PathBuf>,
    #[serde(default)]
    user_data_image: Option<PathBuf>,
    #[serde(default)]
    baseband: Option<VersionedArtifact>,
    #[serde(default)]
    bootloader: Option<VersionedArtifact>,
    #[serde(default)]
    ota_package: Option<PathBuf>,
    #[serde(default)]
    tests_archive: Option<PathBuf>,
    #[serde(default)]
    requirements: Option<PathBuf>,
}

impl BuildDescriptor {
    /// Creates a descriptor with only the build identity filled in.
    pub fn new(build_id: impl Into<String>, build_flavor: impl Into<String>) -> Self {
        Self {
            build_id: build_id.into(),
            build_flavor: build_flavor.into(),
            branch: String::new(),
            device_image: None,
            user_data_image: None,
            baseband: None,
            bootloader: None,
            ota_package: None,
            tests_archive: None,
            requirements: None,
        }
    }

    /// Sets the branch the build came from.
    #[must_use]
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    /// Sets the system update image.
    #[must_use]
    pub fn with_device_image(mut self, path: impl Into<PathBuf>) -> Self {
        self.device_image = Some(path.into());
        self
    }

    /// Sets the user-data image.
    #[must_use]
    pub fn with_user_data_image(mut self, path: impl Into<PathBuf>) -> Self {
        self.user_data_image = Some(path.into());
        self
    }

    /// Sets the baseband firmware.
    #[must_use]
    pub fn with_baseband(mut self, artifact: VersionedArtifact) -> Self {
        self.baseband = Some(artifact);
        self
    }

    /// Sets the bootloader firmware.
    #[must_use]
    pub fn with_bootloader(mut self, artifact: VersionedArtifact) -> Self {
        self.bootloader = Some(artifact);
        self
    }

    /// Sets the over-the-air package.
    #[must_use]
    pub fn with_ota_package(mut self, path: impl Into<PathBuf>) -> Self {
        self.ota_package = Some(path.into());
        self
    }

    /// Sets the test-content archive pushed by the
    /// [`PushTestContent`](flashwright_config::UserDataStrategy::PushTestContent)
    /// strategy.
    #[must_use]
    pub fn with_tests_archive(mut self, path: impl Into<PathBuf>) -> Self {
        self.tests_archive = Some(path.into());
        self
    }

    /// Sets the requirement document location.
    #[must_use]
    pub fn with_requirements(mut self, path: impl Into<PathBuf>) -> Self {
        self.requirements = Some(path.into());
        self
    }

    /// Build identifier.
    #[must_use]
    pub fn build_id(&self) -> &str {
        &self.build_id
    }

    /// Build flavor, such as `sailfish-userdebug`.
    #[must_use]
    pub fn build_flavor(&self) -> &str {
        &self.build_flavor
    }

    /// Branch the build came from; may be empty.
    #[must_use]
    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// System update image.
    #[must_use]
    pub fn device_image(&self) -> Option<&Path> {
        self.device_image.as_deref()
    }

    /// User-data image.
    #[must_use]
    pub fn user_data_image(&self) -> Option<&Path> {
        self.user_data_image.as_deref()
    }

    /// Baseband firmware.
    #[must_use]
    pub const fn baseband(&self) -> Option<&VersionedArtifact> {
        self.baseband.as_ref()
    }

    /// Bootloader firmware.
    #[must_use]
    pub const fn bootloader(&self) -> Option<&VersionedArtifact> {
        self.bootloader.as_ref()
    }

    /// Over-the-air package.
    #[must_use]
    pub fn ota_package(&self) -> Option<&Path> {
        self.ota_package.as_deref()
    }

    /// Test-content archive.
    #[must_use]
    pub fn tests_archive(&self) -> Option<&Path> {
        self.tests_archive.as_deref()
    }

    /// Requirement document location.
    #[must_use]
    pub fn requirements(&self) -> Option<&Path> {
        self.requirements.as_deref()
    }
}
