//! Output formatting for command results
//!
//! JSON and YAML are machine-readable renderings of the same report; the human
//! format is a short summary meant for a terminal.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::PathBuf;

use crate::deobfuscation::ReplacementDescriptor;

/// Output format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Yaml,
    Human,
}

/// A dependency the rewrite left untouched, with the reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedDependency {
    pub dependency: String,
    pub reason: String,
}

/// Result of a `rewrite` run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RewriteReport {
    pub configuration: String,
    pub replacements: Vec<ReplacementDescriptor>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedDependency>,
    /// Dependencies whose sources are decompiled
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_sources: Vec<String>,
    pub executed: bool,
}

/// Result of an `inspect` run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InspectReport {
    pub path: PathBuf,
    pub has_manifest: bool,
    pub obfuscated_by: Option<String>,
    pub signature: String,
    pub obfuscated: bool,
}

pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format_rewrite(&self, report: &RewriteReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report)
                .context("Failed to serialize rewrite report to JSON"),
            OutputFormat::Yaml => {
                serde_yaml::to_string(report).context("Failed to serialize rewrite report to YAML")
            }
            OutputFormat::Human => Ok(self.format_rewrite_human(report)),
        }
    }

    pub fn format_inspect(&self, report: &InspectReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report)
                .context("Failed to serialize inspect report to JSON"),
            OutputFormat::Yaml => {
                serde_yaml::to_string(report).context("Failed to serialize inspect report to YAML")
            }
            OutputFormat::Human => Ok(self.format_inspect_human(report)),
        }
    }

    fn format_rewrite_human(&self, report: &RewriteReport) -> String {
        let mut output = String::new();

        let _ = writeln!(
            output,
            "{} replacement(s) for configuration '{}'",
            report.replacements.len(),
            report.configuration
        );

        for replacement in &report.replacements {
            let _ = writeln!(output);
            let _ = writeln!(output, "{}", replacement.original);
            let _ = writeln!(output, "  -> {}", replacement.coordinates);
            let _ = writeln!(output, "  raw:     {}", replacement.raw.display());
            let _ = writeln!(output, "  sources: {}", replacement.sources.display());
            if !replacement.dependencies.is_empty() {
                let _ = writeln!(output, "  dependencies:");
                for dependency in &replacement.dependencies {
                    let marker = if dependency.replaced { "*" } else { " " };
                    let _ = writeln!(output, "    {} {}", marker, dependency.coordinates);
                }
            }
        }

        if !report.missing_sources.is_empty() {
            let _ = writeln!(output);
            let _ = writeln!(output, "Decompiled sources:");
            for dependency in &report.missing_sources {
                let _ = writeln!(output, "  {}", dependency);
            }
        }

        if !report.skipped.is_empty() {
            let _ = writeln!(output);
            let _ = writeln!(output, "Skipped:");
            for skipped in &report.skipped {
                let _ = writeln!(output, "  {} ({})", skipped.dependency, skipped.reason);
            }
        }

        if report.executed {
            let _ = writeln!(output);
            let _ = writeln!(output, "All artifacts materialized.");
        }

        output
    }

    fn format_inspect_human(&self, report: &InspectReport) -> String {
        let verdict = if report.obfuscated {
            "obfuscated"
        } else {
            "not obfuscated"
        };
        let mut output = format!("{}: {}\n", report.path.display(), verdict);
        if !report.has_manifest {
            output.push_str("  no manifest\n");
        } else if let Some(by) = &report.obfuscated_by {
            let _ = writeln!(output, "  Obfuscated-By: {} (expected {})", by, report.signature);
        }
        output
    }
}
