use crate::dependency::Coordinates;
use crate::runtime::StepHandle;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One entry of a rewritten dependency list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyDescriptor {
    pub coordinates: Coordinates,
    /// Whether `coordinates` point at a deobfuscated replacement
    pub replaced: bool,
}

/// What the host resolver needs to substitute a replaced dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacementDescriptor {
    pub original: Coordinates,
    pub coordinates: Coordinates,
    pub raw: PathBuf,
    pub sources: PathBuf,
    #[serde(default)]
    pub dependencies: Vec<DependencyDescriptor>,
}

/// Decision for a node that gets deobfuscated.
///
/// `raw` and `sources` are placeholder steps until the rewriter is finalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub descriptor: ReplacementDescriptor,
    pub raw: StepHandle,
    pub sources: StepHandle,
    pub children: Vec<Arc<Replacement>>,
}

impl Replacement {
    pub fn original(&self) -> &Coordinates {
        &self.descriptor.original
    }

    pub fn coordinates(&self) -> &Coordinates {
        &self.descriptor.coordinates
    }

    pub fn raw_path(&self) -> &Path {
        &self.descriptor.raw
    }

    pub fn sources_path(&self) -> &Path {
        &self.descriptor.sources
    }
}

/// Directory layout of per-dependency working directories under the build dir.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyLayout {
    root: PathBuf,
}

impl DependencyLayout {
    pub fn new(build_dir: impl AsRef<Path>) -> Self {
        Self {
            root: build_dir.as_ref().join("dependencies"),
        }
    }

    pub fn raw_root(&self) -> PathBuf {
        self.root.join("raw")
    }

    pub fn sources_root(&self) -> PathBuf {
        self.root.join("sources")
    }

    pub fn raw_dir(&self, coordinates: &Coordinates) -> PathBuf {
        self.raw_root().join(coordinates.directory_key())
    }

    pub fn sources_dir(&self, coordinates: &Coordinates) -> PathBuf {
        self.sources_root().join(coordinates.directory_key())
    }

    pub fn raw_cache(&self) -> PathBuf {
        self.raw_root().join("cache")
    }

    pub fn sources_cache(&self) -> PathBuf {
        self.sources_root().join("cache")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let layout = DependencyLayout::new("/project/build");
        let coordinates = Coordinates::new("com.example", "lib", "1.0");

        assert_eq!(
            layout.raw_dir(&coordinates),
            PathBuf::from("/project/build/dependencies/raw/com.example_lib_1.0")
        );
        assert_eq!(
            layout.sources_cache(),
            PathBuf::from("/project/build/dependencies/sources/cache")
        );
    }

    #[test]
    fn test_descriptor_serializes() {
        let descriptor = ReplacementDescriptor {
            original: Coordinates::new("com.example", "lib", "1.0"),
            coordinates: Coordinates::new("fg.deobf.official.com.example", "lib", "1.0"),
            raw: PathBuf::from("/raw/lib-1.0.jar"),
            sources: PathBuf::from("/sources/lib-1.0-sources.jar"),
            dependencies: vec![DependencyDescriptor {
                coordinates: Coordinates::new("org.other", "util", "2.0"),
                replaced: false,
            }],
        };

        let json = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(json["coordinates"]["group"], "fg.deobf.official.com.example");
        assert_eq!(json["dependencies"][0]["replaced"], false);
    }
}
