//! depforge - deobfuscating rewriter for build dependency graphs
//!
//! Packages that a previous obfuscation pass marked in their manifest
//! (`Obfuscated: true`, `Obfuscated-By: <signature>`) are swapped for
//! replacements under a new group. The replacement artifacts are produced by
//! a lazily executed graph of steps: copying inputs, running mapping tools
//! and decompiling sources when no sources artifact exists.
//!
//! # Core Concepts
//!
//! - **Rewriter**: walks resolved dependency trees, memoizes a decision per
//!   node and registers placeholder steps for every replacement
//! - **Finalize**: once all dependencies are known, binds each placeholder to
//!   its raw and sources step chains
//! - **Step graph**: named steps with `{name}` argument substitution, run at
//!   most once, with failures cached like results
//!
//! # Example Usage
//!
//! ```no_run
//! use depforge::deobfuscation::{DependencyGraphRewriter, FinalizeContext, RuntimeDefinition};
//! use depforge::dependency::{Coordinates, StaticResolver};
//! use depforge::mappings::{
//!     DecompilerTool, LocalArtifactCache, RenamerTool, Side, ToolMappingChannel,
//! };
//! use depforge::runtime::StepGraph;
//! use std::sync::Arc;
//!
//! # fn main() -> anyhow::Result<()> {
//! let resolver = StaticResolver::load("deps.json".as_ref())?;
//! let channel = ToolMappingChannel::new(
//!     "official",
//!     Some("official.tsrg".into()),
//!     RenamerTool::default(),
//!     RenamerTool::default(),
//! );
//!
//! let mut graph = StepGraph::new();
//! let mut rewriter = DependencyGraphRewriter::new(Arc::new(resolver), Arc::new(channel), "build");
//! let declared: Coordinates = "com.example:lib:1.0".parse()?;
//! let replacement = rewriter.rewrite_declared(&mut graph, &declared)?;
//!
//! let runtime = RuntimeDefinition {
//!     configuration: "implementation".to_string(),
//!     minecraft_version: "1.20.1".to_string(),
//!     side: Side::Joined,
//!     mapping_version_data: Default::default(),
//! };
//! rewriter.finalize(
//!     &mut graph,
//!     &FinalizeContext {
//!         runtimes: &[runtime],
//!         cache: &LocalArtifactCache::new("versions"),
//!         decompiler: &DecompilerTool::default(),
//!     },
//! )?;
//!
//! if let Some(replacement) = replacement {
//!     let raw = graph.materialize(replacement.raw)?;
//!     println!("{}", raw.path.display());
//! }
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod deobfuscation;
pub mod dependency;
pub mod manifest;
pub mod mappings;
pub mod progress;
pub mod runtime;
pub mod util;

pub use config::{ConfigError, DepforgeConfig};
pub use deobfuscation::{
    DependencyGraphRewriter, FinalizeContext, FinalizeError, Materializer, Replacement,
    ReplacementDescriptor, RuntimeDefinition,
};
pub use dependency::{Coordinates, DependencyNode, DependencyResolver};
pub use manifest::ArtifactManifestInspector;
pub use runtime::{StepError, StepGraph};
pub use util::{init_default, init_from_env, init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_exists() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_name_is_depforge() {
        assert_eq!(NAME, "depforge");
    }
}
