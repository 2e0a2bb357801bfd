//! Phase one: walk resolved dependency trees and register placeholder steps

use super::replacement::{DependencyDescriptor, DependencyLayout, Replacement, ReplacementDescriptor};
use crate::dependency::{Coordinates, DependencyNode, DependencyResolver, ResolvedArtifact};
use crate::manifest::ArtifactManifestInspector;
use crate::mappings::MappingChannel;
use crate::progress::{NoOpHandler, ProgressEvent, ProgressHandler, SkipReason};
use crate::runtime::{RegistrationError, StepGraph, StepSpec};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

pub const DEFAULT_GROUP_PREFIX: &str = "fg.deobf";
pub const DEFAULT_CONFIGURATION: &str = "implementation";

/// A replacement waiting for its step chains to be bound
#[derive(Debug, Clone)]
pub(crate) struct PendingReplacement {
    pub replacement: Arc<Replacement>,
    pub artifact: ResolvedArtifact,
    pub configuration: String,
}

/// Rewrites resolved dependency trees into trees of deobfuscated replacements.
///
/// Decisions are memoized per node identity for the lifetime of the rewriter,
/// so a node reached through several parents is registered once.
pub struct DependencyGraphRewriter {
    pub(crate) inspector: ArtifactManifestInspector,
    pub(crate) resolver: Arc<dyn DependencyResolver>,
    pub(crate) channel: Arc<dyn MappingChannel>,
    pub(crate) progress: Arc<dyn ProgressHandler>,
    pub(crate) layout: DependencyLayout,
    group_prefix: String,
    configuration: String,
    decisions: HashMap<Coordinates, Option<Arc<Replacement>>>,
    pub(crate) pending: Vec<PendingReplacement>,
}

impl DependencyGraphRewriter {
    pub fn new(
        resolver: Arc<dyn DependencyResolver>,
        channel: Arc<dyn MappingChannel>,
        build_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            inspector: ArtifactManifestInspector::default(),
            resolver,
            channel,
            progress: Arc::new(NoOpHandler),
            layout: DependencyLayout::new(build_dir.into()),
            group_prefix: DEFAULT_GROUP_PREFIX.to_string(),
            configuration: DEFAULT_CONFIGURATION.to_string(),
            decisions: HashMap::new(),
            pending: Vec::new(),
        }
    }

    pub fn with_inspector(mut self, inspector: ArtifactManifestInspector) -> Self {
        self.inspector = inspector;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressHandler>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_group_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.group_prefix = prefix.into();
        self
    }

    /// Configuration subsequent rewrites are attributed to
    pub fn set_configuration(&mut self, configuration: impl Into<String>) {
        self.configuration = configuration.into();
    }

    pub fn layout(&self) -> &DependencyLayout {
        &self.layout
    }

    /// Group of the rewritten coordinates for an original group
    pub fn replacement_group(&self, group: &str) -> String {
        format!(
            "{}.{}.{}",
            self.group_prefix,
            self.channel.group_segment(),
            group
        )
    }

    /// Every replacement registered so far, ordered by original coordinates
    pub fn replacements(&self) -> Vec<Arc<Replacement>> {
        let mut replacements: Vec<_> = self.decisions.values().flatten().cloned().collect();
        replacements.sort_by(|a, b| a.original().cmp(b.original()));
        replacements
    }

    /// Replacements still waiting for [`Self::finalize`]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Resolves declared coordinates and rewrites the single resulting node.
    pub fn rewrite_declared(
        &mut self,
        graph: &mut StepGraph,
        coordinates: &Coordinates,
    ) -> Result<Option<Arc<Replacement>>, RegistrationError> {
        let nodes = match self.resolver.resolve(coordinates) {
            Ok(nodes) => nodes,
            Err(err) => {
                self.skip(coordinates, SkipReason::Resolve {
                    message: err.to_string(),
                });
                return Ok(None);
            }
        };

        match nodes.as_slice() {
            [] => {
                debug!(dependency = %coordinates, "Dependency did not resolve");
                Ok(None)
            }
            [node] => self.rewrite(graph, node),
            _ => {
                self.skip(coordinates, SkipReason::AmbiguousResolution { count: nodes.len() });
                Ok(None)
            }
        }
    }

    /// Decides replacement or passthrough (`None`) for a node.
    pub fn rewrite(
        &mut self,
        graph: &mut StepGraph,
        node: &DependencyNode,
    ) -> Result<Option<Arc<Replacement>>, RegistrationError> {
        if let Some(decision) = self.decisions.get(node.identity()) {
            return Ok(decision.clone());
        }

        let decision = self.decide(graph, node)?;
        self.decisions.insert(node.identity().clone(), decision.clone());
        Ok(decision)
    }

    fn decide(
        &mut self,
        graph: &mut StepGraph,
        node: &DependencyNode,
    ) -> Result<Option<Arc<Replacement>>, RegistrationError> {
        let coordinates = node.identity();
        let artifact = match node.artifacts.as_slice() {
            [] => {
                self.skip(coordinates, SkipReason::Unresolved);
                return Ok(None);
            }
            [artifact] => artifact,
            artifacts => {
                self.skip(coordinates, SkipReason::AmbiguousResolution {
                    count: artifacts.len(),
                });
                return Ok(None);
            }
        };

        match self.inspector.is_obfuscated(&artifact.path) {
            Ok(true) => {}
            Ok(false) => {
                self.skip(coordinates, SkipReason::NotObfuscated);
                return Ok(None);
            }
            Err(err) => {
                self.skip(coordinates, SkipReason::ManifestRead {
                    message: err.to_string(),
                });
                return Ok(None);
            }
        }

        let mut children = Vec::new();
        let mut dependencies = Vec::with_capacity(node.children.len());
        for child in &node.children {
            match self.rewrite(graph, child)? {
                Some(replacement) => {
                    dependencies.push(DependencyDescriptor {
                        coordinates: replacement.coordinates().clone(),
                        replaced: true,
                    });
                    children.push(replacement);
                }
                None => dependencies.push(DependencyDescriptor {
                    coordinates: child.identity().clone(),
                    replaced: false,
                }),
            }
        }

        let key = coordinates.step_key();
        let raw_spec = StepSpec::placeholder(
            format!("deobfuscateRawFrom[{}]", key),
            self.layout.raw_dir(coordinates).join(artifact.file_name()),
        );
        let sources_spec = StepSpec::placeholder(
            format!("deobfuscateSourcesFrom[{}]", key),
            self.layout
                .sources_dir(coordinates)
                .join(coordinates.sources().file_name()),
        );

        // Both placeholders or neither.
        if let Some(step) = [&raw_spec, &sources_spec]
            .into_iter()
            .find_map(|spec| graph.conflict(spec))
        {
            warn!(
                dependency = %coordinates,
                step = %step,
                "Step names or outputs already taken, leaving dependency untouched"
            );
            self.skip(coordinates, SkipReason::StepCollision { step });
            return Ok(None);
        }

        let raw_output = raw_spec.output.clone();
        let sources_output = sources_spec.output.clone();
        let raw = graph.register(raw_spec)?;
        let sources = graph.register(sources_spec)?;

        let group = self.replacement_group(&coordinates.group);
        let replacement = Arc::new(Replacement {
            descriptor: ReplacementDescriptor {
                original: coordinates.clone(),
                coordinates: coordinates.clone().with_group(group.clone()),
                raw: raw_output,
                sources: sources_output,
                dependencies,
            },
            raw,
            sources,
            children,
        });

        self.pending.push(PendingReplacement {
            replacement: replacement.clone(),
            artifact: artifact.clone(),
            configuration: self.configuration.clone(),
        });
        self.progress.on_progress(&ProgressEvent::ReplacementRegistered {
            dependency: coordinates.to_string(),
            group,
        });

        Ok(Some(replacement))
    }

    fn skip(&self, coordinates: &Coordinates, reason: SkipReason) {
        self.progress.on_progress(&ProgressEvent::NodeSkipped {
            dependency: coordinates.to_string(),
            reason,
        });
    }
}
