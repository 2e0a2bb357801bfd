//! Mapping channels and the step builders they expose

mod cache;
mod channel;
mod decompile;

pub use cache::{LocalArtifactCache, VersionArtifactCache};
pub use channel::{RenamerTool, ToolMappingChannel, ToolMappingsBuilder, MAPPINGS_DATA};
pub use decompile::{DecompilerTool, DEFAULT_JVM_ARGS, DEFAULT_PROGRAM_ARGS};

use crate::runtime::{RegistrationError, StepGraph, StepHandle};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Which distribution of the game a runtime targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Client,
    Server,
    Joined,
}

impl Side {
    /// Reference artifacts a mapping step may need for this side
    pub fn artifacts(&self) -> &'static [GameArtifact] {
        match self {
            Side::Client => &[GameArtifact::ClientJar, GameArtifact::ClientMappings],
            Side::Server => &[GameArtifact::ServerJar, GameArtifact::ServerMappings],
            Side::Joined => &[
                GameArtifact::ClientJar,
                GameArtifact::ServerJar,
                GameArtifact::ClientMappings,
                GameArtifact::ServerMappings,
            ],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Client => "client",
            Side::Server => "server",
            Side::Joined => "joined",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "client" => Ok(Side::Client),
            "server" => Ok(Side::Server),
            "joined" => Ok(Side::Joined),
            other => Err(format!("Unknown side '{}', expected client, server or joined", other)),
        }
    }
}

/// Vanilla reference artifacts of one game version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GameArtifact {
    ClientJar,
    ServerJar,
    ClientMappings,
    ServerMappings,
}

impl GameArtifact {
    /// Name under which mapping steps see this artifact
    pub fn binding_name(&self) -> &'static str {
        match self {
            GameArtifact::ClientJar => "client",
            GameArtifact::ServerJar => "server",
            GameArtifact::ClientMappings => "clientMappings",
            GameArtifact::ServerMappings => "serverMappings",
        }
    }

    /// File name inside a version directory of the artifact cache
    pub fn file_name(&self) -> &'static str {
        match self {
            GameArtifact::ClientJar => "client.jar",
            GameArtifact::ServerJar => "server.jar",
            GameArtifact::ClientMappings => "client_mappings.txt",
            GameArtifact::ServerMappings => "server_mappings.txt",
        }
    }
}

/// Everything a builder needs to register one mapping application chain.
#[derive(Debug, Clone)]
pub struct ApplyMappingsContext<'a> {
    /// Suffix for step names, unique per dependency and chain
    pub label: String,
    /// Step whose output gets remapped
    pub input: StepHandle,
    /// File name of the remapped output
    pub output_name: String,
    pub version_data: &'a BTreeMap<String, String>,
    pub game_artifacts: &'a HashMap<GameArtifact, StepHandle>,
    /// Directory the builder may place its steps under
    pub working_dir: PathBuf,
}

/// Registers the steps applying a mapping table to an artifact.
pub trait ApplyMappingsBuilder: Send + Sync {
    /// Returns the step producing the remapped artifact.
    fn build(
        &self,
        graph: &mut StepGraph,
        context: &ApplyMappingsContext<'_>,
    ) -> Result<StepHandle, RegistrationError>;
}

/// A source of mapping tables, e.g. official or community names.
pub trait MappingChannel: Send + Sync {
    fn name(&self) -> &str;

    /// Group segment for rewritten coordinates, if the channel defines one
    fn deobfuscation_group_prefix(&self) -> Option<&str> {
        None
    }

    fn compiled_builder(&self) -> &dyn ApplyMappingsBuilder;

    fn source_builder(&self) -> &dyn ApplyMappingsBuilder;

    /// The configured prefix, or the channel name when it is absent or blank
    fn group_segment(&self) -> &str {
        match self.deobfuscation_group_prefix() {
            Some(prefix) if !prefix.trim().is_empty() => prefix,
            _ => self.name(),
        }
    }
}
