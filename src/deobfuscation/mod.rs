//! Dependency deobfuscation: graph rewriting, step chain finalization and
//! materialization of the rewritten artifacts

mod finalize;
mod materialize;
mod replacement;
mod rewriter;

pub use finalize::{FinalizeContext, FinalizeError};
pub use materialize::{MaterializeError, MaterializedReplacement, Materializer};
pub use replacement::{DependencyDescriptor, DependencyLayout, Replacement, ReplacementDescriptor};
pub use rewriter::{DependencyGraphRewriter, DEFAULT_CONFIGURATION, DEFAULT_GROUP_PREFIX};

use crate::mappings::Side;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The game runtime a dependency configuration is compiled against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeDefinition {
    #[serde(default = "default_configuration")]
    pub configuration: String,
    pub minecraft_version: String,
    pub side: Side,
    /// Literal values handed to mapping steps, e.g. `mcVersion`
    #[serde(default)]
    pub mapping_version_data: BTreeMap<String, String>,
}

fn default_configuration() -> String {
    DEFAULT_CONFIGURATION.to_string()
}
