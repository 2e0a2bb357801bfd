//! Resolved dependency tree as handed over by a resolver

use super::Coordinates;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A file produced by resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedArtifact {
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifier: Option<String>,
    #[serde(default = "default_extension")]
    pub extension: String,
}

fn default_extension() -> String {
    "jar".to_string()
}

impl ResolvedArtifact {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_string)
            .unwrap_or_else(default_extension);
        Self {
            path,
            classifier: None,
            extension,
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// One module in a resolved dependency tree.
///
/// Nodes are immutable once built. A well-formed node carries exactly one
/// artifact; anything else is treated as unresolved or ambiguous by callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyNode {
    pub coordinates: Coordinates,
    #[serde(default)]
    pub artifacts: Vec<ResolvedArtifact>,
    #[serde(default)]
    pub children: Vec<DependencyNode>,
}

impl DependencyNode {
    pub fn new(coordinates: Coordinates) -> Self {
        Self {
            coordinates,
            artifacts: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_artifact(mut self, path: impl Into<PathBuf>) -> Self {
        let mut artifact = ResolvedArtifact::new(path);
        artifact.classifier = self.coordinates.classifier.clone();
        self.artifacts.push(artifact);
        self
    }

    pub fn with_child(mut self, child: DependencyNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn identity(&self) -> &Coordinates {
        &self.coordinates
    }

    /// The single resolved artifact, if the node has exactly one.
    pub fn single_artifact(&self) -> Option<&ResolvedArtifact> {
        match self.artifacts.as_slice() {
            [artifact] => Some(artifact),
            _ => None,
        }
    }

    pub fn single_file(&self) -> Option<&Path> {
        self.single_artifact().map(|artifact| artifact.path.as_path())
    }
}
