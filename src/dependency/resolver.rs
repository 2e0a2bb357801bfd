//! Dependency resolution oracles

use super::{Coordinates, DependencyNode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Resolves declared coordinates into the first-level nodes of a dependency tree.
///
/// An empty result means the coordinates are unresolved; that is not an error.
pub trait DependencyResolver: Send + Sync {
    fn resolve(&self, coordinates: &Coordinates) -> Result<Vec<DependencyNode>, ResolveError>;
}

/// In-memory coordinate table.
///
/// Every node added is indexed together with its whole subtree, so sibling
/// lookups (such as sources artifacts) work for transitive nodes too.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    nodes: HashMap<Coordinates, Vec<DependencyNode>>,
}

#[derive(Debug, Deserialize, Serialize)]
struct GraphFile {
    #[serde(default)]
    nodes: Vec<DependencyNode>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_nodes(nodes: impl IntoIterator<Item = DependencyNode>) -> Self {
        let mut resolver = Self::new();
        for node in nodes {
            resolver.add(node);
        }
        resolver
    }

    /// Loads a JSON document of the form `{ "nodes": [ ... ] }`.
    pub fn load(path: &Path) -> Result<Self, ResolveError> {
        let content = fs::read_to_string(path).map_err(|source| ResolveError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let graph: GraphFile =
            serde_json::from_str(&content).map_err(|e| ResolveError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        Ok(Self::from_nodes(graph.nodes))
    }

    /// Indexes `node` and its subtree. A node already indexed under the same
    /// coordinates is kept; a second, different node makes the entry ambiguous.
    pub fn add(&mut self, node: DependencyNode) {
        for child in &node.children {
            self.add(child.clone());
        }

        let entry = self.nodes.entry(node.coordinates.clone()).or_default();
        if !entry.contains(&node) {
            entry.push(node);
        }
    }

    /// Registers `nodes` under `coordinates` verbatim, without indexing subtrees.
    pub fn insert(&mut self, coordinates: Coordinates, nodes: Vec<DependencyNode>) {
        self.nodes.insert(coordinates, nodes);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl DependencyResolver for StaticResolver {
    fn resolve(&self, coordinates: &Coordinates) -> Result<Vec<DependencyNode>, ResolveError> {
        Ok(self.nodes.get(coordinates).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn leaf(artifact: &str) -> DependencyNode {
        DependencyNode::new(Coordinates::new("com.example", artifact, "1.0"))
            .with_artifact(format!("/repo/{}-1.0.jar", artifact))
    }

    #[test]
    fn test_static_resolver_indexes_subtree() {
        let root = leaf("root").with_child(leaf("child"));
        let resolver = StaticResolver::from_nodes([root.clone()]);

        assert_eq!(resolver.len(), 2);
        let child = resolver
            .resolve(&Coordinates::new("com.example", "child", "1.0"))
            .unwrap();
        assert_eq!(child.len(), 1);
        assert_eq!(resolver.resolve(root.identity()).unwrap(), vec![root]);
    }

    #[test]
    fn test_static_resolver_unknown_is_empty() {
        let resolver = StaticResolver::new();
        let result = resolver
            .resolve(&Coordinates::new("com.example", "missing", "1.0"))
            .unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_static_resolver_ambiguous_entry() {
        let mut resolver = StaticResolver::new();
        let coordinates = Coordinates::new("com.example", "lib", "1.0");
        resolver.insert(coordinates.clone(), vec![leaf("lib"), leaf("lib-other")]);
        assert_eq!(resolver.resolve(&coordinates).unwrap().len(), 2);
    }

    #[test]
    fn test_load_graph_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("graph.json");
        fs::write(
            &path,
            r#"{ "nodes": [ {
                "coordinates": { "group": "com.example", "artifact": "lib", "version": "1.0" },
                "artifacts": [ { "path": "/repo/lib-1.0.jar" } ]
            } ] }"#,
        )
        .unwrap();

        let resolver = StaticResolver::load(&path).unwrap();
        assert_eq!(resolver.len(), 1);
    }

    #[test]
    fn test_load_graph_file_invalid_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("graph.json");
        fs::write(&path, "not json").unwrap();

        match StaticResolver::load(&path) {
            Err(ResolveError::Parse { path: p, .. }) => assert_eq!(p, path),
            other => panic!("Expected parse error, got {:?}", other),
        }
    }
}

