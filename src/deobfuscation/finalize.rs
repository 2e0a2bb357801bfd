//! Phase two: bind the placeholder steps once every dependency is known

use super::rewriter::{DependencyGraphRewriter, PendingReplacement};
use super::RuntimeDefinition;
use crate::dependency::Coordinates;
use crate::mappings::{ApplyMappingsContext, DecompilerTool, VersionArtifactCache};
use crate::progress::ProgressEvent;
use crate::runtime::{
    Binding, RegistrationError, StepGraph, StepHandle, StepSpec, UnboundInputs, PROVIDE_INPUT,
};
use std::path::PathBuf;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum FinalizeError {
    #[error("No runtime definition found for configuration '{configuration}' (needed by {dependency})")]
    NoRuntimeDefinition {
        configuration: String,
        dependency: String,
    },

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Unbound(#[from] UnboundInputs),
}

/// Collaborators the second phase registers steps with
pub struct FinalizeContext<'a> {
    pub runtimes: &'a [RuntimeDefinition],
    pub cache: &'a dyn VersionArtifactCache,
    pub decompiler: &'a DecompilerTool,
}

impl DependencyGraphRewriter {
    /// Registers the raw and sources chains of every pending replacement and
    /// binds their placeholders. Returns the number of replacements bound.
    ///
    /// Fails if any placeholder in the graph is still pending afterwards.
    /// Runtime definitions are looked up before anything is registered, so a
    /// missing definition leaves every replacement pending for another call.
    pub fn finalize(
        &mut self,
        graph: &mut StepGraph,
        context: &FinalizeContext<'_>,
    ) -> Result<usize, FinalizeError> {
        let runtimes = self
            .pending
            .iter()
            .map(|entry| self.runtime_for(entry, context.runtimes))
            .collect::<Result<Vec<_>, _>>()?;
        let pending = std::mem::take(&mut self.pending);
        let count = pending.len();

        for (entry, runtime) in pending.iter().zip(runtimes) {
            self.bind_raw(graph, entry, runtime, context)?;
            self.bind_sources(graph, entry, runtime, context)?;
        }

        self.progress
            .on_progress(&ProgressEvent::Finalized { replacements: count });
        graph.verify_bound()?;
        Ok(count)
    }

    fn runtime_for<'r>(
        &self,
        entry: &PendingReplacement,
        runtimes: &'r [RuntimeDefinition],
    ) -> Result<&'r RuntimeDefinition, FinalizeError> {
        let matching: Vec<_> = runtimes
            .iter()
            .filter(|runtime| runtime.configuration == entry.configuration)
            .collect();

        match matching.as_slice() {
            [] => Err(FinalizeError::NoRuntimeDefinition {
                configuration: entry.configuration.clone(),
                dependency: entry.replacement.original().to_string(),
            }),
            [runtime] => Ok(*runtime),
            [first, ..] => {
                warn!(
                    configuration = %entry.configuration,
                    count = matching.len(),
                    version = %first.minecraft_version,
                    "Found several runtime definitions, deobfuscation might not target the correct version"
                );
                Ok(*first)
            }
        }
    }

    fn bind_raw(
        &self,
        graph: &mut StepGraph,
        entry: &PendingReplacement,
        runtime: &RuntimeDefinition,
        context: &FinalizeContext<'_>,
    ) -> Result<(), FinalizeError> {
        let original = entry.replacement.original();
        let label = format!("[{}]", original.step_key());
        let working_dir = self.layout.raw_dir(original);
        let file_name = entry.artifact.file_name();

        let game_artifacts = context.cache.cache_version_artifacts(
            graph,
            &self.layout.raw_cache(),
            &runtime.minecraft_version,
            runtime.side,
        )?;

        let provide = graph.register(StepSpec::provide(
            format!("provide{}", label),
            Binding::File(entry.artifact.path.clone()),
            working_dir.join("input").join(&file_name),
        ))?;

        let mapped = self.channel.compiled_builder().build(
            graph,
            &ApplyMappingsContext {
                label,
                input: provide,
                output_name: file_name,
                version_data: &runtime.mapping_version_data,
                game_artifacts: &game_artifacts,
                working_dir,
            },
        )?;

        graph.bind(entry.replacement.raw, PROVIDE_INPUT, Binding::Output(mapped))?;
        Ok(())
    }

    fn bind_sources(
        &self,
        graph: &mut StepGraph,
        entry: &PendingReplacement,
        runtime: &RuntimeDefinition,
        context: &FinalizeContext<'_>,
    ) -> Result<(), FinalizeError> {
        let original = entry.replacement.original();
        let label = format!("[{}]", original.step_key());
        let working_dir = self.layout.sources_dir(original);
        let sources_name = original.sources().file_name();

        let generated = match self.find_sources(original) {
            Some(sources) => {
                let game_artifacts = context.cache.cache_version_artifacts(
                    graph,
                    &self.layout.sources_cache(),
                    &runtime.minecraft_version,
                    runtime.side,
                )?;
                let provide = graph.register(StepSpec::provide(
                    format!("provideSources{}", label),
                    Binding::File(sources),
                    working_dir.join("input").join(&sources_name),
                ))?;
                self.channel.source_builder().build(
                    graph,
                    &ApplyMappingsContext {
                        label,
                        input: provide,
                        output_name: sources_name,
                        version_data: &runtime.mapping_version_data,
                        game_artifacts: &game_artifacts,
                        working_dir,
                    },
                )?
            }
            None => {
                self.progress.on_progress(&ProgressEvent::MissingSources {
                    dependency: original.to_string(),
                });
                self.decompile_chain(graph, entry, &label, working_dir, &sources_name, context)?
            }
        };

        graph.bind(entry.replacement.sources, PROVIDE_INPUT, Binding::Output(generated))?;
        Ok(())
    }

    fn decompile_chain(
        &self,
        graph: &mut StepGraph,
        entry: &PendingReplacement,
        label: &str,
        working_dir: PathBuf,
        sources_name: &str,
        context: &FinalizeContext<'_>,
    ) -> Result<StepHandle, RegistrationError> {
        let provide = graph.register(StepSpec::provide(
            format!("provideSources{}", label),
            Binding::Output(entry.replacement.raw),
            working_dir.join("input").join(entry.artifact.file_name()),
        ))?;
        context
            .decompiler
            .register(graph, label, provide, &working_dir, sources_name)
    }

    /// The single sources file for `coordinates`, if one resolves
    fn find_sources(&self, coordinates: &Coordinates) -> Option<PathBuf> {
        let sources = coordinates.sources();
        let nodes = match self.resolver.resolve(&sources) {
            Ok(nodes) => nodes,
            Err(err) => {
                warn!(dependency = %sources, error = %err, "Failed to resolve sources");
                return None;
            }
        };
        match nodes.as_slice() {
            [node] => node.single_file().map(|path| path.to_path_buf()),
            _ => None,
        }
    }
}
