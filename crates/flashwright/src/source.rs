//! Strategies that turn a build descriptor into flashable inputs.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use flashwright_manifest::RequirementMap;

use crate::descriptor::BuildDescriptor;
use crate::failure::ProvisionFailure;

/// Conventional requirement document name shipped beside device images.
pub const REQUIREMENTS_FILE_NAME: &str = "android-info.txt";

/// Loads the requirement document for a build.
pub trait ManifestSource {
    /// Returns the parsed requirements.
    ///
    /// # Errors
    ///
    /// Returns [`crate::FailureKind::SetupImpossible`] when the document
    /// cannot be located or read.
    fn load(&self, build: &BuildDescriptor) -> Result<RequirementMap, ProvisionFailure>;
}

/// Reads the requirement document from the host filesystem.
///
/// The descriptor's explicit requirements path wins. Otherwise the document
/// is expected inside the device image directory, or beside the device image
/// file.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileManifestSource;

impl FileManifestSource {
    fn locate(build: &BuildDescriptor) -> Option<PathBuf> {
        if let Some(path) = build.requirements() {
            return Some(path.to_path_buf());
        }
        let image = build.device_image()?;
        if image.is_dir() {
            return Some(image.join(REQUIREMENTS_FILE_NAME));
        }
        let parent = image.parent().unwrap_or_else(|| Path::new("."));
        Some(parent.join(REQUIREMENTS_FILE_NAME))
    }
}

impl ManifestSource for FileManifestSource {
    fn load(&self, build: &BuildDescriptor) -> Result<RequirementMap, ProvisionFailure> {
        let path = Self::locate(build).ok_or_else(|| {
            ProvisionFailure::setup_impossible(format!(
                "build {} names no requirement document or device image",
                build.build_id()
            ))
        })?;
        let file = File::open(&path).map_err(|error| {
            ProvisionFailure::setup_impossible(format!(
                "cannot open requirement document {}",
                path.display()
            ))
            .with_source(error)
        })?;
        RequirementMap::from_reader(BufReader::new(file)).map_err(|error| {
            ProvisionFailure::setup_impossible(format!(
                "cannot read requirement document {}",
                path.display()
            ))
            .with_source(error)
        })
    }
}

/// Serves a fixed requirement document regardless of the build.
#[derive(Debug, Clone, Default)]
pub struct StaticManifestSource {
    map: RequirementMap,
}

impl StaticManifestSource {
    /// Parses `document` once and serves it for every build.
    #[must_use]
    pub fn new(document: &str) -> Self {
        Self {
            map: RequirementMap::parse(document),
        }
    }
}

impl ManifestSource for StaticManifestSource {
    fn load(&self, _build: &BuildDescriptor) -> Result<RequirementMap, ProvisionFailure> {
        Ok(self.map.clone())
    }
}

/// Produces the system update image for a build.
pub trait ImageBuilder {
    /// Returns the host path of the image to pass to `update`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::FailureKind::SetupImpossible`] when no image can be
    /// produced.
    fn update_image(&self, build: &BuildDescriptor) -> Result<PathBuf, ProvisionFailure>;
}

/// Uses the descriptor's device image as-is.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughImageBuilder;

impl ImageBuilder for PassthroughImageBuilder {
    fn update_image(&self, build: &BuildDescriptor) -> Result<PathBuf, ProvisionFailure> {
        build.device_image().map(Path::to_path_buf).ok_or_else(|| {
            ProvisionFailure::setup_impossible(format!(
                "build {} has no device image",
                build.build_id()
            ))
        })
    }
}
