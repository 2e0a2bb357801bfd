//! `{name}` placeholder substitution for step arguments

use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

/// A whole-string placeholder; `--out={output}` is not one.
fn replace_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\{(\w+)\}$").expect("placeholder pattern is valid"))
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("The string '{value}' did not return a valid substitution match for '{name}'")]
pub struct UnresolvedSubstitutionError {
    /// The offending argument string
    pub value: String,
    /// The placeholder name inside the braces
    pub name: String,
}

/// One resolved per-step argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    Literal(String),
    File(PathBuf),
}

impl ArgValue {
    fn render(&self) -> String {
        match self {
            ArgValue::Literal(value) => value.clone(),
            ArgValue::File(path) => absolute(path).display().to_string(),
        }
    }
}

/// Variables visible to one step invocation.
///
/// Step arguments take priority over the shared named data.
#[derive(Debug, Clone, Default)]
pub struct SubstitutionContext<'a> {
    arguments: BTreeMap<String, ArgValue>,
    data: Option<&'a BTreeMap<String, PathBuf>>,
}

impl<'a> SubstitutionContext<'a> {
    pub fn new(arguments: BTreeMap<String, ArgValue>) -> Self {
        Self {
            arguments,
            data: None,
        }
    }

    pub fn with_data(mut self, data: &'a BTreeMap<String, PathBuf>) -> Self {
        self.data = Some(data);
        self
    }

    pub fn argument(&self, name: &str) -> Option<&ArgValue> {
        self.arguments.get(name)
    }

    pub fn arguments(&self) -> &BTreeMap<String, ArgValue> {
        &self.arguments
    }

    pub fn substitute(&self, value: &str) -> Result<String, UnresolvedSubstitutionError> {
        let Some(captures) = replace_pattern().captures(value) else {
            return Ok(value.to_string());
        };
        let name = &captures[1];

        if let Some(argument) = self.arguments.get(name) {
            return Ok(argument.render());
        }

        if let Some(path) = self.data.and_then(|data| data.get(name)) {
            return Ok(absolute(path).display().to_string());
        }

        Err(UnresolvedSubstitutionError {
            value: value.to_string(),
            name: name.to_string(),
        })
    }

    pub fn substitute_all(&self, values: &[String]) -> Result<Vec<String>, UnresolvedSubstitutionError> {
        values.iter().map(|value| self.substitute(value)).collect()
    }
}

pub(crate) fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    fn context<'a>(arguments: &[(&str, ArgValue)]) -> SubstitutionContext<'a> {
        SubstitutionContext::new(
            arguments
                .iter()
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect(),
        )
    }

    #[test]
    fn test_literal_argument() {
        let ctx = context(&[("mcVersion", ArgValue::Literal("1.20.1".to_string()))]);
        assert_eq!(ctx.substitute("{mcVersion}").unwrap(), "1.20.1");
    }

    #[parameterized(
        plain = { "plain-text" },
        embedded = { "--version={mcVersion}" },
        spaced = { "{ mcVersion }" },
        unclosed = { "{mcVersion" },
        empty_braces = { "{}" },
    )]
    fn test_non_placeholders_pass_through(value: &str) {
        let ctx = context(&[("mcVersion", ArgValue::Literal("1.20.1".to_string()))]);
        assert_eq!(ctx.substitute(value).unwrap(), value);
    }

    #[test]
    fn test_unknown_placeholder_is_error() {
        let ctx = context(&[]);
        let err = ctx.substitute("{unknown}").unwrap_err();
        assert_eq!(err.name, "unknown");
        assert_eq!(err.value, "{unknown}");
        assert!(err.to_string().contains("unknown"));
    }

    #[test]
    fn test_file_argument_is_absolute() {
        let ctx = context(&[("input", ArgValue::File(PathBuf::from("/tmp/in.jar")))]);
        assert_eq!(ctx.substitute("{input}").unwrap(), "/tmp/in.jar");

        let ctx = context(&[("input", ArgValue::File(PathBuf::from("rel/in.jar")))]);
        let resolved = PathBuf::from(ctx.substitute("{input}").unwrap());
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("rel/in.jar"));
    }

    #[test]
    fn test_data_fallback_and_priority() {
        let mut data = BTreeMap::new();
        data.insert("mappings".to_string(), PathBuf::from("/data/mappings.tsrg"));
        data.insert("input".to_string(), PathBuf::from("/data/ignored.jar"));

        let ctx = context(&[("input", ArgValue::File(PathBuf::from("/tmp/in.jar")))]).with_data(&data);

        assert_eq!(ctx.substitute("{mappings}").unwrap(), "/data/mappings.tsrg");
        assert_eq!(ctx.substitute("{input}").unwrap(), "/tmp/in.jar");
    }

    #[test]
    fn test_substitute_all_stops_at_first_error() {
        let ctx = context(&[("a", ArgValue::Literal("1".to_string()))]);
        let values = vec!["{a}".to_string(), "x".to_string()];
        assert_eq!(ctx.substitute_all(&values).unwrap(), vec!["1", "x"]);

        let values = vec!["{a}".to_string(), "{b}".to_string()];
        assert_eq!(ctx.substitute_all(&values).unwrap_err().name, "b");
    }
}
