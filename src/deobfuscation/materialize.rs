use super::Replacement;
use crate::dependency::Coordinates;
use crate::runtime::{Artifact, StepError, StepGraph};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("Failed to materialize {dependency}: {source}")]
    Step {
        dependency: Coordinates,
        #[source]
        source: Arc<StepError>,
    },

    #[error("Materialization worker failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Produced artifacts of one replacement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedReplacement {
    pub dependency: Coordinates,
    pub raw: Artifact,
    pub sources: Artifact,
}

/// Runs the step chains of independent replacements on a bounded worker pool.
///
/// Step execution stays blocking; each replacement occupies one blocking
/// thread while its chain runs.
pub struct Materializer {
    graph: Arc<StepGraph>,
    workers: usize,
}

impl Materializer {
    pub fn new(graph: Arc<StepGraph>, workers: usize) -> Self {
        Self {
            graph,
            workers: workers.max(1),
        }
    }

    pub fn graph(&self) -> &Arc<StepGraph> {
        &self.graph
    }

    /// Materializes every replacement, in input order.
    ///
    /// After the first failure nothing new is scheduled; work already running
    /// completes and the first failure is returned.
    pub async fn materialize_all(
        &self,
        replacements: &[Arc<Replacement>],
    ) -> Result<Vec<MaterializedReplacement>, MaterializeError> {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let failed = Arc::new(AtomicBool::new(false));
        let mut tasks = JoinSet::new();

        info!(
            replacements = replacements.len(),
            workers = self.workers,
            "Materializing deobfuscated dependencies"
        );

        for (index, replacement) in replacements.iter().enumerate() {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            if failed.load(Ordering::SeqCst) {
                break;
            }

            let graph = self.graph.clone();
            let replacement = replacement.clone();
            let failed = failed.clone();
            tasks.spawn_blocking(move || {
                let _permit = permit;
                let result = materialize_one(&graph, &replacement);
                if result.is_err() {
                    failed.store(true, Ordering::SeqCst);
                }
                (index, result)
            });
        }

        let mut results = Vec::with_capacity(replacements.len());
        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Ok(materialized))) => results.push((index, materialized)),
                Ok((_, Err(err))) => {
                    first_error.get_or_insert(err);
                }
                Err(join_error) => {
                    first_error.get_or_insert(MaterializeError::Join(join_error));
                }
            }
        }

        if let Some(err) = first_error {
            return Err(err);
        }
        results.sort_by_key(|(index, _)| *index);
        Ok(results.into_iter().map(|(_, materialized)| materialized).collect())
    }
}

fn materialize_one(
    graph: &StepGraph,
    replacement: &Replacement,
) -> Result<MaterializedReplacement, MaterializeError> {
    let dependency = replacement.original().clone();
    let failure = |source| MaterializeError::Step {
        dependency: dependency.clone(),
        source,
    };

    let raw = graph.materialize(replacement.raw).map_err(failure)?;
    let sources = graph.materialize(replacement.sources).map_err(failure)?;
    debug!(dependency = %dependency, raw = %raw.path.display(), "Materialized replacement");

    Ok(MaterializedReplacement {
        dependency,
        raw,
        sources,
    })
}
