//! Maven-style dependency coordinates

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const DEFAULT_EXTENSION: &str = "jar";
const SOURCES_CLASSIFIER: &str = "sources";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoordinatesError {
    #[error("Invalid coordinates '{0}': expected group:artifact:version[:classifier][@extension]")]
    Malformed(String),

    #[error("Invalid coordinates '{input}': {field} must not be empty")]
    EmptyField { input: String, field: &'static str },
}

/// Identity of a module artifact: `group:artifact:version[:classifier][@extension]`.
///
/// Equality covers all five fields, which makes this the memoization key of a
/// rewrite pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coordinates {
    pub group: String,
    pub artifact: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifier: Option<String>,
    #[serde(default = "default_extension")]
    pub extension: String,
}

fn default_extension() -> String {
    DEFAULT_EXTENSION.to_string()
}

impl Coordinates {
    pub fn new(
        group: impl Into<String>,
        artifact: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            artifact: artifact.into(),
            version: version.into(),
            classifier: None,
            extension: default_extension(),
        }
    }

    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
        let classifier = classifier.into();
        self.classifier = if classifier.trim().is_empty() {
            None
        } else {
            Some(classifier)
        };
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    /// Coordinates of the sibling sources artifact.
    ///
    /// An existing classifier `c` becomes `c-sources`; a jar extension is kept
    /// implicit while any other extension is carried over.
    pub fn sources(&self) -> Self {
        let classifier = match &self.classifier {
            Some(classifier) => format!("{}-{}", classifier, SOURCES_CLASSIFIER),
            None => SOURCES_CLASSIFIER.to_string(),
        };

        let extension = if self.extension.trim().is_empty()
            || self.extension.trim().eq_ignore_ascii_case(DEFAULT_EXTENSION)
        {
            default_extension()
        } else {
            self.extension.clone()
        };

        Self {
            group: self.group.clone(),
            artifact: self.artifact.clone(),
            version: self.version.clone(),
            classifier: Some(classifier),
            extension,
        }
    }

    /// `group:artifact:version`, the module part without classifier/extension
    pub fn module_id(&self) -> String {
        format!("{}:{}:{}", self.group, self.artifact, self.version)
    }

    /// File name the artifact has in a Maven repository layout
    pub fn file_name(&self) -> String {
        match &self.classifier {
            Some(classifier) => format!(
                "{}-{}-{}.{}",
                self.artifact, self.version, classifier, self.extension
            ),
            None => format!("{}-{}.{}", self.artifact, self.version, self.extension),
        }
    }

    /// Directory key used for per-dependency working directories:
    /// `group_artifact_version[_classifier][@extension]`.
    ///
    /// Separators occurring inside a field are percent-escaped, so distinct
    /// coordinates never share a directory.
    pub fn directory_key(&self) -> String {
        self.joined('_', DIRECTORY_RESERVED)
    }

    /// Key embedded in step names, e.g. `com.example:lib:1.0`.
    ///
    /// Like [`Self::directory_key`] this is unique per identity, including the
    /// classifier and a non-default extension.
    pub fn step_key(&self) -> String {
        self.joined(':', STEP_RESERVED)
    }

    fn joined(&self, separator: char, reserved: &[char]) -> String {
        let mut key = [&self.group, &self.artifact, &self.version]
            .iter()
            .map(|field| escape(field, reserved))
            .collect::<Vec<_>>()
            .join(&separator.to_string());
        if let Some(classifier) = &self.classifier {
            key.push(separator);
            key.push_str(&escape(classifier, reserved));
        }
        if self.extension != DEFAULT_EXTENSION {
            key.push('@');
            key.push_str(&escape(&self.extension, reserved));
        }
        key
    }
}

const DIRECTORY_RESERVED: &[char] = &['_', '@', '/', '\\', ':'];
const STEP_RESERVED: &[char] = &[':', '@'];

/// Percent-escapes `%` and every reserved character
fn escape(field: &str, reserved: &[char]) -> String {
    let mut escaped = String::with_capacity(field.len());
    for c in field.chars() {
        if c == '%' || reserved.contains(&c) {
            escaped.push_str(&format!("%{:02X}", c as u32));
        } else {
            escaped.push(c);
        }
    }
    escaped
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.artifact, self.version)?;
        if let Some(classifier) = &self.classifier {
            write!(f, ":{}", classifier)?;
        }
        if !self.extension.eq_ignore_ascii_case(DEFAULT_EXTENSION) {
            write!(f, "@{}", self.extension)?;
        }
        Ok(())
    }
}

impl FromStr for Coordinates {
    type Err = CoordinatesError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (body, extension) = match input.split_once('@') {
            Some((body, extension)) => (body, Some(extension)),
            None => (input, None),
        };

        let parts: Vec<&str> = body.split(':').collect();
        if !(3..=4).contains(&parts.len()) {
            return Err(CoordinatesError::Malformed(input.to_string()));
        }

        for (field, value) in ["group", "artifact", "version"].iter().zip(&parts) {
            if value.trim().is_empty() {
                return Err(CoordinatesError::EmptyField {
                    input: input.to_string(),
                    field,
                });
            }
        }

        let mut coordinates = Coordinates::new(parts[0].trim(), parts[1].trim(), parts[2].trim());
        if let Some(classifier) = parts.get(3) {
            coordinates = coordinates.with_classifier(classifier.trim());
        }
        if let Some(extension) = extension {
            if extension.trim().is_empty() {
                return Err(CoordinatesError::EmptyField {
                    input: input.to_string(),
                    field: "extension",
                });
            }
            coordinates = coordinates.with_extension(extension.trim());
        }

        Ok(coordinates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    #[parameterized(
        plain = { "com.example:lib:1.0", "com.example:lib:1.0:sources" },
        classified = { "com.example:lib:1.0:universal", "com.example:lib:1.0:universal-sources" },
        zip_extension = { "com.example:lib:1.0@zip", "com.example:lib:1.0:sources@zip" },
        upper_jar = { "com.example:lib:1.0@JAR", "com.example:lib:1.0:sources" },
    )]
    fn test_sources_coordinates(input: &str, expected: &str) {
        let coordinates: Coordinates = input.parse().unwrap();
        assert_eq!(coordinates.sources().to_string(), expected);
    }

    #[test]
    fn test_parse_full() {
        let coordinates: Coordinates = "net.minecraft:client:1.20.1:extra@zip".parse().unwrap();
        assert_eq!(coordinates.group, "net.minecraft");
        assert_eq!(coordinates.artifact, "client");
        assert_eq!(coordinates.version, "1.20.1");
        assert_eq!(coordinates.classifier.as_deref(), Some("extra"));
        assert_eq!(coordinates.extension, "zip");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!(
            "com.example:lib".parse::<Coordinates>(),
            Err(CoordinatesError::Malformed(_))
        ));
        assert!(matches!(
            "com.example::1.0".parse::<Coordinates>(),
            Err(CoordinatesError::EmptyField { field: "artifact", .. })
        ));
    }

    #[test]
    fn test_file_name() {
        let plain = Coordinates::new("a", "lib", "1.0");
        assert_eq!(plain.file_name(), "lib-1.0.jar");

        let sources = plain.sources();
        assert_eq!(sources.file_name(), "lib-1.0-sources.jar");
    }

    #[parameterized(
        plain = { "com.example:my-lib:1.0", "com.example:my-lib:1.0", "com.example_my-lib_1.0" },
        classified = { "a:lib:1:natives", "a:lib:1:natives", "a_lib_1_natives" },
        zip_extension = { "a:lib:1@zip", "a:lib:1@zip", "a_lib_1@zip" },
        underscores = { "a_b:c:1", "a_b:c:1", "a%5Fb_c_1" },
    )]
    fn test_keys(input: &str, step_key: &str, directory_key: &str) {
        let coordinates: Coordinates = input.parse().unwrap();
        assert_eq!(coordinates.step_key(), step_key);
        assert_eq!(coordinates.directory_key(), directory_key);
    }

    #[test]
    fn test_keys_distinguish_every_field() {
        let distinct = [
            Coordinates::new("a.b", "c", "1"),
            Coordinates::new("a", "b.c", "1"),
            Coordinates::new("a", "b", "1.0"),
            Coordinates::new("a", "b", "10"),
            Coordinates::new("a", "lib", "1"),
            Coordinates::new("a", "Lib", "1"),
            Coordinates::new("x", "lib", "1"),
            Coordinates::new("x", "lib", "1").with_extension("zip"),
            Coordinates::new("x", "lib", "1").with_classifier("zip"),
            Coordinates::new("a_b", "c", "1"),
            Coordinates::new("a", "b_c", "1"),
            Coordinates::new("a:b", "c", "1"),
            Coordinates::new("a", "b:c", "1"),
            Coordinates::new("a%3Ab", "c", "1"),
        ];

        let step_keys: std::collections::HashSet<_> =
            distinct.iter().map(Coordinates::step_key).collect();
        let directory_keys: std::collections::HashSet<_> =
            distinct.iter().map(Coordinates::directory_key).collect();
        assert_eq!(step_keys.len(), distinct.len());
        assert_eq!(directory_keys.len(), distinct.len());
    }

    #[test]
    fn test_identity_includes_classifier_and_extension() {
        let plain = Coordinates::new("a", "b", "1");
        assert_ne!(plain, plain.clone().with_classifier("x"));
        assert_ne!(plain, plain.clone().with_extension("zip"));
        assert_eq!(plain, plain.clone().with_classifier(" "));
    }
}
