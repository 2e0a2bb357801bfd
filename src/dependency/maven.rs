//! Resolver over a Maven-layout local repository directory

use super::{Coordinates, DependencyNode, DependencyResolver, ResolveError};
use roxmltree::Document;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Resolves coordinates against `<root>/<group path>/<artifact>/<version>/`.
///
/// Transitive dependencies come from the module's `.pom`, restricted to
/// `compile`/`runtime` scope and non-optional entries with literal versions.
/// Transitive modules that are missing from the repository are left out.
#[derive(Debug, Clone)]
pub struct MavenLocalResolver {
    root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PomDependency {
    coordinates: Coordinates,
}

impl MavenLocalResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn module_dir(&self, coordinates: &Coordinates) -> PathBuf {
        let mut dir = self.root.clone();
        for segment in coordinates.group.split('.') {
            dir.push(segment);
        }
        dir.join(&coordinates.artifact).join(&coordinates.version)
    }

    fn artifact_path(&self, coordinates: &Coordinates) -> PathBuf {
        self.module_dir(coordinates).join(coordinates.file_name())
    }

    fn pom_path(&self, coordinates: &Coordinates) -> PathBuf {
        self.module_dir(coordinates).join(format!(
            "{}-{}.pom",
            coordinates.artifact, coordinates.version
        ))
    }

    fn resolve_node(
        &self,
        coordinates: &Coordinates,
        stack: &mut Vec<Coordinates>,
    ) -> Result<Option<DependencyNode>, ResolveError> {
        let artifact = self.artifact_path(coordinates);
        if !artifact.is_file() {
            debug!(dependency = %coordinates, path = %artifact.display(), "Artifact not found in local repository");
            return Ok(None);
        }

        let mut node = DependencyNode::new(coordinates.clone()).with_artifact(artifact);

        if stack.contains(coordinates) {
            warn!(dependency = %coordinates, "Dependency cycle in POM metadata, not descending");
            return Ok(Some(node));
        }

        stack.push(coordinates.clone());
        for dependency in self.read_pom_dependencies(coordinates)? {
            if let Some(child) = self.resolve_node(&dependency.coordinates, stack)? {
                node.children.push(child);
            }
        }
        stack.pop();

        Ok(Some(node))
    }

    fn read_pom_dependencies(
        &self,
        coordinates: &Coordinates,
    ) -> Result<Vec<PomDependency>, ResolveError> {
        let pom = self.pom_path(coordinates);
        if !pom.is_file() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&pom).map_err(|source| ResolveError::Io {
            path: pom.clone(),
            source,
        })?;
        parse_pom_dependencies(&content).map_err(|message| ResolveError::Parse {
            path: pom,
            message,
        })
    }
}

impl DependencyResolver for MavenLocalResolver {
    fn resolve(&self, coordinates: &Coordinates) -> Result<Vec<DependencyNode>, ResolveError> {
        let mut stack = Vec::new();
        let nodes: Vec<DependencyNode> = self
            .resolve_node(coordinates, &mut stack)?
            .into_iter()
            .collect();
        debug!(dependency = %coordinates, resolved = nodes.len(), "Resolved from local repository");
        Ok(nodes)
    }
}

fn parse_pom_dependencies(content: &str) -> Result<Vec<PomDependency>, String> {
    let doc = Document::parse(content).map_err(|e| e.to_string())?;
    let root = doc.root_element();

    let Some(dependencies) = root
        .children()
        .find(|child| child.has_tag_name("dependencies"))
    else {
        return Ok(Vec::new());
    };

    let mut result = Vec::new();
    for dependency in dependencies
        .children()
        .filter(|child| child.has_tag_name("dependency"))
    {
        let field = |name: &str| {
            dependency
                .children()
                .find(|child| child.has_tag_name(name))
                .and_then(|child| child.text())
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty())
        };

        let (Some(group), Some(artifact), Some(version)) =
            (field("groupId"), field("artifactId"), field("version"))
        else {
            continue;
        };

        if version.contains("${") || version.starts_with('[') || version.starts_with('(') {
            debug!(group = %group, artifact = %artifact, version = %version, "Skipping non-literal version");
            continue;
        }

        let scope = field("scope").unwrap_or_else(|| "compile".to_string());
        if scope != "compile" && scope != "runtime" {
            continue;
        }
        if field("optional").is_some_and(|optional| optional == "true") {
            continue;
        }

        let mut coordinates = Coordinates::new(group, artifact, version);
        if let Some(classifier) = field("classifier") {
            coordinates = coordinates.with_classifier(classifier);
        }
        if let Some(kind) = field("type") {
            if kind != "bundle" {
                coordinates = coordinates.with_extension(kind);
            }
        }

        result.push(PomDependency { coordinates });
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn install(root: &Path, coordinates: &Coordinates, pom: Option<&str>) {
        let resolver = MavenLocalResolver::new(root);
        let artifact = resolver.artifact_path(coordinates);
        fs::create_dir_all(artifact.parent().unwrap()).unwrap();
        fs::write(&artifact, b"jar").unwrap();
        if let Some(pom) = pom {
            fs::write(resolver.pom_path(coordinates), pom).unwrap();
        }
    }

    const POM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<project xmlns="http://maven.apache.org/POM/4.0.0">
  <modelVersion>4.0.0</modelVersion>
  <groupId>com.example</groupId>
  <artifactId>app</artifactId>
  <version>1.0</version>
  <dependencies>
    <dependency>
      <groupId>com.example</groupId>
      <artifactId>core</artifactId>
      <version>2.0</version>
    </dependency>
    <dependency>
      <groupId>com.example</groupId>
      <artifactId>testing</artifactId>
      <version>1.0</version>
      <scope>test</scope>
    </dependency>
    <dependency>
      <groupId>com.example</groupId>
      <artifactId>extra</artifactId>
      <version>1.0</version>
      <optional>true</optional>
    </dependency>
    <dependency>
      <groupId>com.example</groupId>
      <artifactId>managed</artifactId>
      <version>${managed.version}</version>
    </dependency>
    <dependency>
      <groupId>com.example</groupId>
      <artifactId>absent</artifactId>
      <version>1.0</version>
      <scope>runtime</scope>
    </dependency>
  </dependencies>
</project>"#;

    #[test]
    fn test_parse_pom_filters_scopes() {
        let deps = parse_pom_dependencies(POM).unwrap();
        let names: Vec<_> = deps
            .iter()
            .map(|d| d.coordinates.artifact.as_str())
            .collect();
        assert_eq!(names, vec!["core", "absent"]);
    }

    #[test]
    fn test_parse_pom_invalid_xml() {
        assert!(parse_pom_dependencies("<project>").is_err());
    }

    #[test]
    fn test_resolve_tree() {
        let temp_dir = TempDir::new().unwrap();
        let app = Coordinates::new("com.example", "app", "1.0");
        let core = Coordinates::new("com.example", "core", "2.0");
        install(temp_dir.path(), &app, Some(POM));
        install(temp_dir.path(), &core, None);

        let resolver = MavenLocalResolver::new(temp_dir.path());
        let nodes = resolver.resolve(&app).unwrap();

        assert_eq!(nodes.len(), 1);
        let node = &nodes[0];
        assert!(node.single_file().unwrap().ends_with("com/example/app/1.0/app-1.0.jar"));
        assert_eq!(node.children.len(), 1);
        assert_eq!(node.children[0].coordinates, core);
    }

    #[test]
    fn test_resolve_missing_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let resolver = MavenLocalResolver::new(temp_dir.path());
        let nodes = resolver
            .resolve(&Coordinates::new("com.example", "lib", "1.0").sources())
            .unwrap();
        assert!(nodes.is_empty());
    }

    #[test]
    fn test_resolve_classified_artifact() {
        let temp_dir = TempDir::new().unwrap();
        let sources = Coordinates::new("com.example", "lib", "1.0").sources();
        install(temp_dir.path(), &sources, None);

        let resolver = MavenLocalResolver::new(temp_dir.path());
        let nodes = resolver.resolve(&sources).unwrap();
        assert_eq!(nodes.len(), 1);
        assert!(nodes[0]
            .single_file()
            .unwrap()
            .ends_with("lib-1.0-sources.jar"));
    }
}
