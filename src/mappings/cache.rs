use super::{GameArtifact, Side};
use crate::runtime::{Binding, RegistrationError, StepGraph, StepHandle, StepSpec};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Provides the vanilla reference artifacts of a game version as steps.
pub trait VersionArtifactCache: Send + Sync {
    /// Registers (or reuses) the steps exposing the artifacts `side` needs.
    ///
    /// `cache_dir` is where freshly registered steps place their outputs.
    fn cache_version_artifacts(
        &self,
        graph: &mut StepGraph,
        cache_dir: &Path,
        version: &str,
        side: Side,
    ) -> Result<HashMap<GameArtifact, StepHandle>, RegistrationError>;
}

/// Artifact cache over a local directory of `<version>/<artifact file>`.
///
/// Registration does not touch the file system; a missing file surfaces when
/// the step runs.
#[derive(Debug)]
pub struct LocalArtifactCache {
    root: PathBuf,
    registered: Mutex<HashMap<(String, Side), HashMap<GameArtifact, StepHandle>>>,
}

impl LocalArtifactCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            registered: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn artifact_path(&self, version: &str, artifact: GameArtifact) -> PathBuf {
        self.root.join(version).join(artifact.file_name())
    }
}

fn step_name(version: &str, side: Side, artifact: GameArtifact) -> String {
    let artifact = artifact.binding_name();
    let mut chars = artifact.chars();
    let artifact = match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    };
    format!("cache{}[{}:{}]", artifact, version, side)
}

impl VersionArtifactCache for LocalArtifactCache {
    fn cache_version_artifacts(
        &self,
        graph: &mut StepGraph,
        cache_dir: &Path,
        version: &str,
        side: Side,
    ) -> Result<HashMap<GameArtifact, StepHandle>, RegistrationError> {
        let mut registered = self
            .registered
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let key = (version.to_string(), side);
        if let Some(existing) = registered.get(&key) {
            return Ok(existing.clone());
        }

        let mut handles = HashMap::new();
        for artifact in side.artifacts() {
            let spec = StepSpec::provide(
                step_name(version, side, *artifact),
                Binding::File(self.artifact_path(version, *artifact)),
                cache_dir
                    .join(version)
                    .join(side.as_str())
                    .join(artifact.file_name()),
            );
            handles.insert(*artifact, graph.register(spec)?);
        }

        debug!(version, side = %side, artifacts = handles.len(), "Registered version artifacts");
        registered.insert(key, handles.clone());
        Ok(handles)
    }
}
