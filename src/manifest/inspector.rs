use super::{JarManifest, ManifestError};
use std::path::Path;
use tracing::trace;

pub const DEFAULT_SIGNATURE: &str = "ForgeGradle";

/// The marker values a package must carry to count as obfuscated by us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObfuscationMarkers {
    /// Expected value of `Obfuscated-By`
    pub signature: String,
}

impl Default for ObfuscationMarkers {
    fn default() -> Self {
        Self {
            signature: DEFAULT_SIGNATURE.to_string(),
        }
    }
}

/// Decides whether a binary package was produced by a prior obfuscation pass.
///
/// Read-only; a missing manifest or missing attribute is simply "not obfuscated",
/// only failing to read the package is an error.
#[derive(Debug, Clone, Default)]
pub struct ArtifactManifestInspector {
    markers: ObfuscationMarkers,
}

impl ArtifactManifestInspector {
    pub fn new(markers: ObfuscationMarkers) -> Self {
        Self { markers }
    }

    pub fn with_signature(signature: impl Into<String>) -> Self {
        Self::new(ObfuscationMarkers {
            signature: signature.into(),
        })
    }

    pub fn markers(&self) -> &ObfuscationMarkers {
        &self.markers
    }

    pub fn is_obfuscated(&self, artifact: &Path) -> Result<bool, ManifestError> {
        let manifest = JarManifest::read_from(artifact)?;
        let result = manifest
            .as_ref()
            .is_some_and(|manifest| self.matches(manifest));

        trace!(
            artifact = %artifact.display(),
            has_manifest = manifest.is_some(),
            obfuscated = result,
            "Inspected manifest"
        );
        Ok(result)
    }

    pub fn matches(&self, manifest: &JarManifest) -> bool {
        manifest.is_obfuscated() && manifest.obfuscated_by() == Some(self.markers.signature.as_str())
    }
}
