//! Configuration management for depforge
//!
//! Settings are read from `DEPFORGE_*` environment variables with defaults,
//! optionally overlaid by a TOML file, and then validated.
//!
//! # Environment Variables
//!
//! - `DEPFORGE_BUILD_DIR`: build directory - default: `build`
//! - `DEPFORGE_GROUP_PREFIX`: group prefix of rewritten coordinates - default: `fg.deobf`
//! - `DEPFORGE_OBFUSCATION_SIGNATURE`: expected `Obfuscated-By` value - default: `ForgeGradle`
//! - `DEPFORGE_JAVA`: JVM used for jar tools - default: `java`
//! - `DEPFORGE_WORKERS`: parallel materialization workers - default: `4`
//! - `DEPFORGE_LOG_LEVEL`: logging level - default: `info`
//! - `DEPFORGE_ARTIFACT_CACHE_DIR`: vanilla artifact directory - default: user cache dir + `depforge/versions`
//! - `DEPFORGE_CONFIGURATION`: configuration rewritten dependencies belong to - default: `implementation`
//! - `DEPFORGE_MAPPING_CHANNEL`: mapping channel name - default: `official`
//! - `DEPFORGE_MAPPINGS`: mapping table file
//! - `DEPFORGE_DECOMPILER_JAR`: decompiler jar
//! - `DEPFORGE_MINECRAFT_VERSION` / `DEPFORGE_SIDE`: a single runtime definition
//!
//! # File format
//!
//! ```toml
//! build_dir = "build"
//! workers = 8
//!
//! [mapping_channel]
//! name = "official"
//! mappings = "mappings/official.tsrg"
//!
//! [mapping_channel.compiled]
//! jar = "tools/renamer.jar"
//!
//! [decompiler]
//! jar = "tools/forgeflower.jar"
//!
//! [[runtimes]]
//! minecraft_version = "1.20.1"
//! side = "joined"
//! ```

use crate::deobfuscation::{RuntimeDefinition, DEFAULT_CONFIGURATION, DEFAULT_GROUP_PREFIX};
use crate::manifest::inspector::DEFAULT_SIGNATURE;
use crate::manifest::ArtifactManifestInspector;
use crate::mappings::{DecompilerTool, LocalArtifactCache, RenamerTool, Side, ToolMappingChannel};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const DEFAULT_BUILD_DIR: &str = "build";
const DEFAULT_JAVA: &str = "java";
const DEFAULT_WORKERS: usize = 4;
const MAX_WORKERS: usize = 64;
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_CHANNEL: &str = "official";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("Failed to parse {field}: {error}")]
    ParseError { field: String, error: String },

    #[error("Failed to read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration file {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Mapping channel settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingChannelConfig {
    #[serde(default = "default_channel")]
    pub name: String,
    #[serde(default)]
    pub group_prefix: Option<String>,
    /// Mapping table; without it steps read the `mappings` named data
    #[serde(default)]
    pub mappings: Option<PathBuf>,
    #[serde(default)]
    pub compiled: RenamerTool,
    #[serde(default)]
    pub sources: RenamerTool,
}

fn default_channel() -> String {
    DEFAULT_CHANNEL.to_string()
}

impl Default for MappingChannelConfig {
    fn default() -> Self {
        Self {
            name: default_channel(),
            group_prefix: None,
            mappings: None,
            compiled: RenamerTool::default(),
            sources: RenamerTool::default(),
        }
    }
}

/// TOML overlay; absent keys keep the environment/default value
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    build_dir: Option<PathBuf>,
    group_prefix: Option<String>,
    obfuscation_signature: Option<String>,
    java_executable: Option<PathBuf>,
    workers: Option<usize>,
    log_level: Option<String>,
    artifact_cache_dir: Option<PathBuf>,
    configuration: Option<String>,
    mapping_channel: Option<MappingChannelConfig>,
    decompiler: Option<DecompilerTool>,
    #[serde(default)]
    runtimes: Vec<RuntimeDefinition>,
}

#[derive(Debug, Clone)]
pub struct DepforgeConfig {
    pub build_dir: PathBuf,
    pub group_prefix: String,
    pub obfuscation_signature: String,
    pub java_executable: PathBuf,
    pub workers: usize,
    pub log_level: String,
    pub artifact_cache_dir: PathBuf,
    /// Configuration rewritten dependencies are attributed to
    pub configuration: String,
    pub mapping_channel: MappingChannelConfig,
    pub decompiler: DecompilerTool,
    pub runtimes: Vec<RuntimeDefinition>,
}

fn default_artifact_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(env::temp_dir)
        .join("depforge")
        .join("versions")
}

impl Default for DepforgeConfig {
    /// Loads from environment variables, falling back to defaults
    fn default() -> Self {
        let var = |key: &str| env::var(key).ok().filter(|value| !value.trim().is_empty());

        let workers = var("DEPFORGE_WORKERS")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(DEFAULT_WORKERS);

        let mut mapping_channel = MappingChannelConfig::default();
        if let Some(name) = var("DEPFORGE_MAPPING_CHANNEL") {
            mapping_channel.name = name;
        }
        mapping_channel.mappings = var("DEPFORGE_MAPPINGS").map(PathBuf::from);

        let mut decompiler = DecompilerTool::default();
        if let Some(jar) = var("DEPFORGE_DECOMPILER_JAR") {
            decompiler.jar = PathBuf::from(jar);
        }

        let configuration =
            var("DEPFORGE_CONFIGURATION").unwrap_or_else(|| DEFAULT_CONFIGURATION.to_string());

        let runtimes = var("DEPFORGE_MINECRAFT_VERSION")
            .map(|version| {
                let side = var("DEPFORGE_SIDE")
                    .and_then(|side| side.parse::<Side>().ok())
                    .unwrap_or(Side::Joined);
                vec![RuntimeDefinition {
                    configuration: configuration.clone(),
                    mapping_version_data: BTreeMap::from([(
                        "mcVersion".to_string(),
                        version.clone(),
                    )]),
                    minecraft_version: version,
                    side,
                }]
            })
            .unwrap_or_default();

        Self {
            build_dir: var("DEPFORGE_BUILD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_BUILD_DIR)),
            group_prefix: var("DEPFORGE_GROUP_PREFIX")
                .unwrap_or_else(|| DEFAULT_GROUP_PREFIX.to_string()),
            obfuscation_signature: var("DEPFORGE_OBFUSCATION_SIGNATURE")
                .unwrap_or_else(|| DEFAULT_SIGNATURE.to_string()),
            java_executable: var("DEPFORGE_JAVA")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_JAVA)),
            workers,
            log_level: var("DEPFORGE_LOG_LEVEL")
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
                .to_lowercase(),
            artifact_cache_dir: var("DEPFORGE_ARTIFACT_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(default_artifact_cache_dir),
            configuration,
            mapping_channel,
            decompiler,
            runtimes,
        }
    }
}

impl DepforgeConfig {
    /// Environment/defaults overlaid with the TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::default();
        config.apply_toml(&content).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(config)
    }

    fn apply_toml(&mut self, content: &str) -> Result<(), toml::de::Error> {
        let file: ConfigFile = toml::from_str(content)?;

        if let Some(build_dir) = file.build_dir {
            self.build_dir = build_dir;
        }
        if let Some(prefix) = file.group_prefix {
            self.group_prefix = prefix;
        }
        if let Some(signature) = file.obfuscation_signature {
            self.obfuscation_signature = signature;
        }
        if let Some(java) = file.java_executable {
            self.java_executable = java;
        }
        if let Some(workers) = file.workers {
            self.workers = workers;
        }
        if let Some(level) = file.log_level {
            self.log_level = level.to_lowercase();
        }
        if let Some(dir) = file.artifact_cache_dir {
            self.artifact_cache_dir = dir;
        }
        if let Some(configuration) = file.configuration {
            self.configuration = configuration;
        }
        if let Some(channel) = file.mapping_channel {
            self.mapping_channel = channel;
        }
        if let Some(decompiler) = file.decompiler {
            self.decompiler = decompiler;
        }
        if !file.runtimes.is_empty() {
            self.runtimes = file.runtimes;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(ConfigError::ValidationFailed(format!(
                "Workers must be between 1 and {}, got {}",
                MAX_WORKERS, self.workers
            )));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        if self.group_prefix.trim().is_empty() || self.group_prefix.contains(':') {
            return Err(ConfigError::ValidationFailed(format!(
                "Invalid group prefix '{}'",
                self.group_prefix
            )));
        }
        if self.obfuscation_signature.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "Obfuscation signature must not be empty".to_string(),
            ));
        }
        if self.mapping_channel.name.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "Mapping channel name must not be empty".to_string(),
            ));
        }
        if let Some(runtime) = self
            .runtimes
            .iter()
            .find(|runtime| runtime.minecraft_version.trim().is_empty())
        {
            return Err(ConfigError::ValidationFailed(format!(
                "Runtime for configuration '{}' has no game version",
                runtime.configuration
            )));
        }

        Ok(())
    }

    pub fn inspector(&self) -> ArtifactManifestInspector {
        ArtifactManifestInspector::with_signature(self.obfuscation_signature.clone())
    }

    pub fn channel(&self) -> ToolMappingChannel {
        let config = &self.mapping_channel;
        let channel = ToolMappingChannel::new(
            config.name.clone(),
            config.mappings.clone(),
            self.with_java(&config.compiled),
            self.with_java(&config.sources),
        );
        match &config.group_prefix {
            Some(prefix) => channel.with_group_prefix(prefix.clone()),
            None => channel,
        }
    }

    pub fn artifact_cache(&self) -> LocalArtifactCache {
        LocalArtifactCache::new(self.artifact_cache_dir.clone())
    }

    /// The decompiler, run with the configured JVM unless it names its own
    pub fn decompiler(&self) -> DecompilerTool {
        if self.decompiler.java == Path::new(DEFAULT_JAVA) {
            self.decompiler.clone().with_java(self.java_executable.clone())
        } else {
            self.decompiler.clone()
        }
    }

    fn with_java(&self, tool: &RenamerTool) -> RenamerTool {
        let mut tool = tool.clone();
        if tool.jar.is_some() && tool.executable == Path::new(DEFAULT_JAVA) {
            tool.executable = self.java_executable.clone();
        }
        tool
    }

    pub fn to_display_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert("build_dir".to_string(), self.build_dir.display().to_string());
        map.insert("group_prefix".to_string(), self.group_prefix.clone());
        map.insert(
            "obfuscation_signature".to_string(),
            self.obfuscation_signature.clone(),
        );
        map.insert(
            "java_executable".to_string(),
            self.java_executable.display().to_string(),
        );
        map.insert("workers".to_string(), self.workers.to_string());
        map.insert("log_level".to_string(), self.log_level.clone());
        map.insert(
            "artifact_cache_dir".to_string(),
            self.artifact_cache_dir.display().to_string(),
        );
        map.insert("configuration".to_string(), self.configuration.clone());
        map.insert("mapping_channel".to_string(), self.mapping_channel.name.clone());
        map.insert(
            "decompiler".to_string(),
            self.decompiler.jar.display().to_string(),
        );
        map.insert("runtimes".to_string(), self.runtimes.len().to_string());
        map
    }
}

impl fmt::Display for DepforgeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "DepforgeConfig {{")?;
        for (key, value) in self.to_display_map() {
            writeln!(f, "  {}: {}", key, value)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Temporarily sets an environment variable
    struct EnvGuard {
        key: String,
        old_value: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &str, value: &str) -> Self {
            let old_value = env::var(key).ok();
            env::set_var(key, value);
            Self {
                key: key.to_string(),
                old_value,
            }
        }

        fn unset(key: &str) -> Self {
            let old_value = env::var(key).ok();
            env::remove_var(key);
            Self {
                key: key.to_string(),
                old_value,
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.old_value {
                Some(v) => env::set_var(&self.key, v),
                None => env::remove_var(&self.key),
            }
        }
    }

    fn clean_env() -> Vec<EnvGuard> {
        [
            "DEPFORGE_BUILD_DIR",
            "DEPFORGE_GROUP_PREFIX",
            "DEPFORGE_OBFUSCATION_SIGNATURE",
            "DEPFORGE_JAVA",
            "DEPFORGE_WORKERS",
            "DEPFORGE_LOG_LEVEL",
            "DEPFORGE_ARTIFACT_CACHE_DIR",
            "DEPFORGE_CONFIGURATION",
            "DEPFORGE_MAPPING_CHANNEL",
            "DEPFORGE_MAPPINGS",
            "DEPFORGE_DECOMPILER_JAR",
            "DEPFORGE_MINECRAFT_VERSION",
            "DEPFORGE_SIDE",
        ]
        .iter()
        .map(|key| EnvGuard::unset(key))
        .collect()
    }

    #[test]
    #[serial]
    fn test_default_configuration() {
        let _guards = clean_env();

        let config = DepforgeConfig::default();

        assert_eq!(config.build_dir, PathBuf::from(DEFAULT_BUILD_DIR));
        assert_eq!(config.group_prefix, "fg.deobf");
        assert_eq!(config.obfuscation_signature, "ForgeGradle");
        assert_eq!(config.workers, DEFAULT_WORKERS);
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.configuration, "implementation");
        assert_eq!(config.mapping_channel.name, "official");
        assert!(config.runtimes.is_empty());
        assert!(config.artifact_cache_dir.ends_with("depforge/versions"));
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_environment_variable_parsing() {
        let mut guards = clean_env();
        guards.extend([
            EnvGuard::set("DEPFORGE_BUILD_DIR", "/tmp/build"),
            EnvGuard::set("DEPFORGE_WORKERS", "8"),
            EnvGuard::set("DEPFORGE_LOG_LEVEL", "DEBUG"),
            EnvGuard::set("DEPFORGE_MAPPING_CHANNEL", "parchment"),
            EnvGuard::set("DEPFORGE_MINECRAFT_VERSION", "1.20.1"),
            EnvGuard::set("DEPFORGE_SIDE", "client"),
        ]);

        let config = DepforgeConfig::default();

        assert_eq!(config.build_dir, PathBuf::from("/tmp/build"));
        assert_eq!(config.workers, 8);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.mapping_channel.name, "parchment");
        assert_eq!(config.runtimes.len(), 1);
        assert_eq!(config.runtimes[0].side, Side::Client);
        assert_eq!(
            config.runtimes[0].mapping_version_data.get("mcVersion"),
            Some(&"1.20.1".to_string())
        );
    }

    #[test]
    #[serial]
    fn test_unparsable_workers_fall_back() {
        let mut guards = clean_env();
        guards.push(EnvGuard::set("DEPFORGE_WORKERS", "many"));

        assert_eq!(DepforgeConfig::default().workers, DEFAULT_WORKERS);
    }

    #[test]
    #[serial]
    fn test_toml_overlay() {
        let _guards = clean_env();
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
build_dir = "out"
workers = 2

[mapping_channel]
name = "official"
group_prefix = "mojmap"
mappings = "maps/official.tsrg"

[mapping_channel.compiled]
jar = "tools/renamer.jar"

[decompiler]
jar = "tools/ff.jar"

[[runtimes]]
minecraft_version = "1.19.4"
side = "server"
"#
        )
        .unwrap();

        let config = DepforgeConfig::load(file.path()).unwrap();

        assert_eq!(config.build_dir, PathBuf::from("out"));
        assert_eq!(config.workers, 2);
        assert_eq!(config.mapping_channel.group_prefix.as_deref(), Some("mojmap"));
        assert_eq!(config.decompiler.jar, PathBuf::from("tools/ff.jar"));
        assert_eq!(config.runtimes[0].configuration, "implementation");
        assert_eq!(config.runtimes[0].side, Side::Server);
        assert_eq!(config.group_prefix, "fg.deobf");
    }

    #[test]
    #[serial]
    fn test_unknown_key_rejected() {
        let _guards = clean_env();
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "wokers = 2\n").unwrap();

        assert!(matches!(
            DepforgeConfig::load(file.path()),
            Err(ConfigError::Toml { .. })
        ));
    }

    #[test]
    #[serial]
    fn test_validation() {
        let _guards = clean_env();
        let mut config = DepforgeConfig::default();

        config.workers = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationFailed(_))
        ));

        config.workers = 4;
        config.log_level = "loud".to_string();
        assert!(config.validate().is_err());

        config.log_level = "info".to_string();
        config.group_prefix = "bad:prefix".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_java_applies_to_jar_tools() {
        let mut guards = clean_env();
        guards.push(EnvGuard::set("DEPFORGE_JAVA", "/opt/jdk/bin/java"));

        let mut config = DepforgeConfig::default();
        config.mapping_channel.compiled.jar = Some(PathBuf::from("renamer.jar"));

        assert_eq!(config.decompiler().java, PathBuf::from("/opt/jdk/bin/java"));
        let channel = config.channel();
        assert_eq!(crate::mappings::MappingChannel::name(&channel), "official");
    }

    #[test]
    #[serial]
    fn test_config_display() {
        let _guards = clean_env();
        let display = DepforgeConfig::default().to_string();
        assert!(display.contains("group_prefix: fg.deobf"));
        assert!(display.contains("workers: 4"));
    }
}
