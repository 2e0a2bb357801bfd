//! Command handlers
//!
//! Each handler returns the process exit code; failures are logged and
//! reported on stderr rather than propagated to `main`.

use super::commands::{InspectArgs, RewriteArgs};
use super::output::{InspectReport, OutputFormatter, RewriteReport, SkippedDependency};
use crate::config::DepforgeConfig;
use crate::deobfuscation::{DependencyGraphRewriter, FinalizeContext, Materializer};
use crate::dependency::{DependencyResolver, MavenLocalResolver, StaticResolver};
use crate::manifest::JarManifest;
use crate::progress::{CollectingHandler, FanOutHandler, LoggingHandler, ProgressHandler};
use crate::runtime::StepGraph;
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Loads the configuration file if given, else the environment defaults.
pub fn load_config(path: Option<&Path>) -> Result<DepforgeConfig> {
    let config = match path {
        Some(path) => DepforgeConfig::load(path)?,
        None => DepforgeConfig::default(),
    };
    config.validate()?;
    debug!("Loaded configuration:\n{}", config);
    Ok(config)
}

pub async fn handle_rewrite(args: &RewriteArgs, config_path: Option<&Path>, quiet: bool) -> i32 {
    match run_rewrite(args, config_path, quiet).await {
        Ok(()) => 0,
        Err(e) => {
            error!("Rewrite failed: {:#}", e);
            eprintln!("Error: {:#}", e);
            1
        }
    }
}

pub fn handle_inspect(args: &InspectArgs, config_path: Option<&Path>) -> i32 {
    match run_inspect(args, config_path) {
        Ok(()) => 0,
        Err(e) => {
            error!("Inspect failed: {:#}", e);
            eprintln!("Error: {:#}", e);
            1
        }
    }
}

fn build_resolver(args: &RewriteArgs) -> Result<Arc<dyn DependencyResolver>> {
    match (&args.repository, &args.graph) {
        (Some(repository), _) => {
            if !repository.is_dir() {
                return Err(anyhow!(
                    "Repository directory does not exist: {}",
                    repository.display()
                ));
            }
            Ok(Arc::new(MavenLocalResolver::new(repository.clone())))
        }
        (None, Some(graph)) => {
            let resolver = StaticResolver::load(graph)
                .with_context(|| format!("Failed to load dependency graph {}", graph.display()))?;
            Ok(Arc::new(resolver))
        }
        (None, None) => Err(anyhow!("Either --repository or --graph is required")),
    }
}

async fn run_rewrite(args: &RewriteArgs, config_path: Option<&Path>, quiet: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let configuration = args
        .configuration
        .clone()
        .unwrap_or_else(|| config.configuration.clone());

    let resolver = build_resolver(args)?;
    let collector = Arc::new(CollectingHandler::new());
    let progress: Arc<dyn ProgressHandler> = Arc::new(FanOutHandler::new(vec![
        Arc::new(LoggingHandler) as Arc<dyn ProgressHandler>,
        collector.clone() as Arc<dyn ProgressHandler>,
    ]));

    let mut graph = StepGraph::new().with_progress(progress.clone());
    let mut rewriter =
        DependencyGraphRewriter::new(resolver, Arc::new(config.channel()), &config.build_dir)
            .with_inspector(config.inspector())
            .with_progress(progress)
            .with_group_prefix(config.group_prefix.clone());
    rewriter.set_configuration(configuration.clone());

    info!(
        dependencies = args.dependencies.len(),
        configuration = %configuration,
        "Rewriting declared dependencies"
    );
    for dependency in &args.dependencies {
        rewriter
            .rewrite_declared(&mut graph, dependency)
            .with_context(|| format!("Failed to register steps for {}", dependency))?;
    }

    let cache = config.artifact_cache();
    let decompiler = config.decompiler();
    let context = FinalizeContext {
        runtimes: &config.runtimes,
        cache: &cache,
        decompiler: &decompiler,
    };
    rewriter
        .finalize(&mut graph, &context)
        .context("Failed to bind deobfuscation steps")?;

    let replacements = rewriter.replacements();
    if args.execute && !replacements.is_empty() {
        let workers = args.workers.unwrap_or(config.workers);
        let materializer = Materializer::new(Arc::new(graph), workers);
        let materialized = materializer.materialize_all(&replacements).await?;
        info!(artifacts = materialized.len(), "Materialized replacements");
    }

    let report = RewriteReport {
        configuration,
        replacements: replacements
            .iter()
            .map(|replacement| replacement.descriptor.clone())
            .collect(),
        skipped: collector
            .skipped()
            .into_iter()
            .map(|(dependency, reason)| SkippedDependency {
                dependency,
                reason: reason.to_string(),
            })
            .collect(),
        missing_sources: collector.missing_sources(),
        executed: args.execute,
    };

    let output = OutputFormatter::new(args.format.into()).format_rewrite(&report)?;
    write_output(&output, args.output.as_deref(), quiet)
}

fn run_inspect(args: &InspectArgs, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let inspector = config.inspector();

    let manifest = JarManifest::read_from(&args.jar)
        .with_context(|| format!("Failed to inspect {}", args.jar.display()))?;
    let report = InspectReport {
        path: args.jar.clone(),
        has_manifest: manifest.is_some(),
        obfuscated_by: manifest
            .as_ref()
            .and_then(|manifest| manifest.obfuscated_by())
            .map(str::to_string),
        signature: inspector.markers().signature.clone(),
        obfuscated: manifest
            .as_ref()
            .is_some_and(|manifest| inspector.matches(manifest)),
    };

    let output = OutputFormatter::new(args.format.into()).format_inspect(&report)?;
    write_output(&output, None, false)
}

fn write_output(output: &str, path: Option<&Path>, quiet: bool) -> Result<()> {
    match path {
        Some(path) => {
            fs::write(path, output)
                .with_context(|| format!("Failed to write output to {}", path.display()))?;
            if !quiet {
                eprintln!("Output written to {}", path.display());
            }
        }
        None => print!("{}", output),
    }
    Ok(())
}
