//! Step graph runtime: registration, substitution and process execution

mod error;
mod graph;
mod process;
mod step;
mod substitution;

pub use error::{PendingInput, RegistrationError, StepError, UnboundInputs};
pub use graph::StepGraph;
pub use process::{
    exit_code, ExternalProcessRunner, Invocation, ProcessRunner, RunRecord,
    CONSOLE_LOG_FILE_NAME, LOG_FILE_NAME,
};
pub use step::{
    Artifact, Binding, ExecSpec, StepAction, StepHandle, StepSpec, ToolReference, PROVIDE_INPUT,
};
pub use substitution::{ArgValue, SubstitutionContext, UnresolvedSubstitutionError};
