//! Jar manifest reading and obfuscation-marker inspection

pub mod inspector;

pub use inspector::{ArtifactManifestInspector, ObfuscationMarkers};

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use zip::result::ZipError;
use zip::ZipArchive;

pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

pub const ATTR_OBFUSCATED: &str = "Obfuscated";
pub const ATTR_OBFUSCATED_BY: &str = "Obfuscated-By";
pub const ATTR_MAIN_CLASS: &str = "Main-Class";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open {path} as a package: {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: ZipError,
    },
}

/// Main-section attributes of a jar manifest.
///
/// Lookups are case-insensitive, like `java.util.jar.Attributes.Name`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JarManifest {
    attributes: BTreeMap<String, (String, String)>,
}

impl JarManifest {
    /// Parses the main section: everything up to the first blank line.
    /// Continuation lines start with a single space and extend the previous value.
    pub fn parse(content: &str) -> Self {
        let mut manifest = Self::default();
        let mut current: Option<(String, String)> = None;

        for line in content.lines() {
            let line = line.strip_suffix('\r').unwrap_or(line);

            if let Some(continuation) = line.strip_prefix(' ') {
                if let Some((_, value)) = current.as_mut() {
                    value.push_str(continuation);
                }
                continue;
            }

            if let Some((name, value)) = current.take() {
                manifest.insert(name, value);
            }

            if line.is_empty() {
                break;
            }

            if let Some((name, value)) = line.split_once(':') {
                let value = value.strip_prefix(' ').unwrap_or(value);
                current = Some((name.trim().to_string(), value.to_string()));
            }
        }

        if let Some((name, value)) = current {
            manifest.insert(name, value);
        }

        manifest
    }

    /// Reads the manifest of the package at `path`.
    ///
    /// `Ok(None)` when the package has no manifest entry.
    pub fn read_from(path: &Path) -> Result<Option<Self>, ManifestError> {
        let file = File::open(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut archive =
            ZipArchive::new(BufReader::new(file)).map_err(|source| zip_error(path, source))?;

        let mut entry = match archive.by_name(MANIFEST_PATH) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(source) => return Err(zip_error(path, source)),
        };

        let mut bytes = Vec::new();
        entry
            .read_to_end(&mut bytes)
            .map_err(|source| ManifestError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Some(Self::parse(&String::from_utf8_lossy(&bytes))))
    }

    fn insert(&mut self, name: String, value: String) {
        self.attributes
            .insert(name.to_ascii_lowercase(), (name, value));
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(&name.to_ascii_lowercase())
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(&name.to_ascii_lowercase())
    }

    /// `Obfuscated` parsed like `Boolean.parseBoolean`; absent means false.
    pub fn is_obfuscated(&self) -> bool {
        self.attribute(ATTR_OBFUSCATED)
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("true"))
    }

    pub fn obfuscated_by(&self) -> Option<&str> {
        self.attribute(ATTR_OBFUSCATED_BY)
    }

    pub fn main_class(&self) -> Option<&str> {
        self.attribute(ATTR_MAIN_CLASS)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

fn zip_error(path: &Path, source: ZipError) -> ManifestError {
    match source {
        ZipError::Io(source) => ManifestError::Io {
            path: path.to_path_buf(),
            source,
        },
        source => ManifestError::Zip {
            path: path.to_path_buf(),
            source,
        },
    }
}
