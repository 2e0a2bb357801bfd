//! Errors raised while registering and executing steps

use super::substitution::UnresolvedSubstitutionError;
use crate::manifest::ManifestError;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Failure of a single step. Fatal for the build that requested the step.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("Step '{step}': {source}")]
    UnresolvedSubstitution {
        step: String,
        #[source]
        source: UnresolvedSubstitutionError,
    },

    #[error("Step '{step}' input '{input}' was never bound")]
    UnboundInput { step: String, input: String },

    #[error("Step '{step}' references unknown data '{name}'")]
    UnknownData { step: String, name: String },

    #[error("Step '{step}' input '{input}' must be a file")]
    NotAFile { step: String, input: String },

    #[error("Step '{step}': process exited with code {code}")]
    ProcessExit { step: String, code: i32 },

    #[error("Step '{step}': failed to launch '{program}': {source}")]
    ProcessSpawn {
        step: String,
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Step '{step}': I/O error on {path}: {source}")]
    Io {
        step: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Step '{step}' finished without producing {path}")]
    MissingOutput { step: String, path: PathBuf },

    #[error("Step '{step}': no main class configured and {classpath} declares none")]
    MissingMainClass { step: String, classpath: PathBuf },

    #[error("Step '{step}': {source}")]
    Manifest {
        step: String,
        #[source]
        source: ManifestError,
    },

    #[error("Step '{step}' depends on '{upstream}', which failed")]
    Upstream {
        step: String,
        upstream: String,
        #[source]
        source: Arc<StepError>,
    },
}

impl StepError {
    pub fn step(&self) -> &str {
        match self {
            StepError::UnresolvedSubstitution { step, .. }
            | StepError::UnboundInput { step, .. }
            | StepError::UnknownData { step, .. }
            | StepError::NotAFile { step, .. }
            | StepError::ProcessExit { step, .. }
            | StepError::ProcessSpawn { step, .. }
            | StepError::Io { step, .. }
            | StepError::MissingOutput { step, .. }
            | StepError::MissingMainClass { step, .. }
            | StepError::Manifest { step, .. }
            | StepError::Upstream { step, .. } => step,
        }
    }

    /// The innermost failure, following `Upstream` links.
    pub fn root_cause(&self) -> &StepError {
        match self {
            StepError::Upstream { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self.root_cause() {
            StepError::ProcessExit { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Misuse of the step graph while it is being built.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("A step named '{0}' is already registered")]
    DuplicateStep(String),

    #[error("Step '{step}' would write {path}, which step '{owner}' already owns")]
    DuplicateOutput {
        step: String,
        path: PathBuf,
        owner: String,
    },

    #[error("No step registered for handle {0}")]
    UnknownStep(String),

    #[error("Step '{step}' has no input named '{input}'")]
    UnknownInput { step: String, input: String },

    #[error("Step '{step}' input '{input}' is already bound")]
    AlreadyBound { step: String, input: String },

    #[error("Binding '{upstream}' into '{step}' would create a cycle")]
    Cycle { step: String, upstream: String },
}

/// A placeholder input still pending after finalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingInput {
    pub step: String,
    pub input: String,
}

impl std::fmt::Display for PendingInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.step, self.input)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{} step input(s) left unbound: {}", .0.len(), join_pending(.0))]
pub struct UnboundInputs(pub Vec<PendingInput>);

fn join_pending(pending: &[PendingInput]) -> String {
    pending
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_cause_and_exit_code() {
        let inner = Arc::new(StepError::ProcessExit {
            step: "decompile".to_string(),
            code: 137,
        });
        let outer = StepError::Upstream {
            step: "provide".to_string(),
            upstream: "decompile".to_string(),
            source: inner,
        };

        assert_eq!(outer.step(), "provide");
        assert_eq!(outer.root_cause().step(), "decompile");
        assert_eq!(outer.exit_code(), Some(137));
    }

    #[test]
    fn test_error_messages() {
        let err = StepError::UnboundInput {
            step: "deobfuscateRawFromLib".to_string(),
            input: "input".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Step 'deobfuscateRawFromLib' input 'input' was never bound"
        );

        let err = RegistrationError::DuplicateStep("provideLib".to_string());
        assert!(err.to_string().contains("provideLib"));
    }

    #[test]
    fn test_unbound_inputs_message() {
        let err = UnboundInputs(vec![
            PendingInput {
                step: "deobfuscateRawFromLib".to_string(),
                input: "input".to_string(),
            },
            PendingInput {
                step: "deobfuscateSourcesFromLib".to_string(),
                input: "input".to_string(),
            },
        ]);
        assert_eq!(
            err.to_string(),
            "2 step input(s) left unbound: deobfuscateRawFromLib.input, deobfuscateSourcesFromLib.input"
        );
    }
}
