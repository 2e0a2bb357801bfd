//! Declarative step descriptions

use std::fmt;
use std::path::{Path, PathBuf};

/// Opaque reference to a step registered in a [`super::StepGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StepHandle(pub(crate) usize);

impl fmt::Display for StepHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A file produced by a step, or handed in from outside
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub name: String,
    pub path: PathBuf,
}

impl Artifact {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// Where a step input comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    Literal(String),
    File(PathBuf),
    /// Output of another step, materialized on demand
    Output(StepHandle),
    /// Entry of the graph's shared named data
    Data(String),
    /// Forward reference bound during finalization
    Pending,
}

impl Binding {
    pub fn is_pending(&self) -> bool {
        matches!(self, Binding::Pending)
    }

    pub fn upstream(&self) -> Option<StepHandle> {
        match self {
            Binding::Output(handle) => Some(*handle),
            _ => None,
        }
    }
}

/// Program (or classpath entry) a step runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolReference {
    /// A path, or a bare program name looked up on `PATH`
    Path(PathBuf),
    /// An artifact managed by another step
    Output(StepHandle),
}

impl ToolReference {
    pub fn upstream(&self) -> Option<StepHandle> {
        match self {
            ToolReference::Output(handle) => Some(*handle),
            ToolReference::Path(_) => None,
        }
    }
}

impl From<&str> for ToolReference {
    fn from(value: &str) -> Self {
        ToolReference::Path(PathBuf::from(value))
    }
}

impl From<PathBuf> for ToolReference {
    fn from(value: PathBuf) -> Self {
        ToolReference::Path(value)
    }
}

/// An external program invocation.
///
/// With a classpath the command line is
/// `<executable> <jvm_args> -cp <classpath> <main class> <program_args>`,
/// otherwise `<executable> <jvm_args> <program_args>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecSpec {
    pub executable: ToolReference,
    pub jvm_args: Vec<String>,
    pub program_args: Vec<String>,
    pub classpath: Option<ToolReference>,
    pub main_class: Option<String>,
}

impl ExecSpec {
    pub fn new(executable: impl Into<ToolReference>) -> Self {
        Self {
            executable: executable.into(),
            jvm_args: Vec::new(),
            program_args: Vec::new(),
            classpath: None,
            main_class: None,
        }
    }

    /// A JVM program: `java` plus the jar to run
    pub fn java(java: impl Into<ToolReference>, jar: impl Into<ToolReference>) -> Self {
        Self {
            classpath: Some(jar.into()),
            ..Self::new(java)
        }
    }

    pub fn jvm_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.jvm_args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.program_args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn main_class(mut self, main_class: impl Into<String>) -> Self {
        self.main_class = Some(main_class.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepAction {
    /// Copies the `input` binding to the output location
    Provide,
    /// Runs an external program expected to write the output
    Execute(ExecSpec),
}

/// Input binding name used by provide steps
pub const PROVIDE_INPUT: &str = "input";

/// Everything needed to register a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSpec {
    pub name: String,
    pub action: StepAction,
    pub inputs: Vec<(String, Binding)>,
    pub output: PathBuf,
    pub working_dir: Option<PathBuf>,
}

impl StepSpec {
    pub fn provide(name: impl Into<String>, input: Binding, output: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            action: StepAction::Provide,
            inputs: vec![(PROVIDE_INPUT.to_string(), input)],
            output: output.into(),
            working_dir: None,
        }
    }

    /// A provide step whose input is bound later.
    pub fn placeholder(name: impl Into<String>, output: impl Into<PathBuf>) -> Self {
        Self::provide(name, Binding::Pending, output)
    }

    pub fn execute(name: impl Into<String>, exec: ExecSpec, output: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            action: StepAction::Execute(exec),
            inputs: Vec::new(),
            output: output.into(),
            working_dir: None,
        }
    }

    pub fn input(mut self, name: impl Into<String>, binding: Binding) -> Self {
        let name = name.into();
        match self.inputs.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, existing)) => *existing = binding,
            None => self.inputs.push((name, binding)),
        }
        self
    }

    pub fn has_input(&self, name: &str) -> bool {
        self.inputs.iter().any(|(existing, _)| existing == name)
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Explicit working directory, or the output's parent
    pub fn resolved_working_dir(&self) -> PathBuf {
        self.working_dir.clone().unwrap_or_else(|| {
            self.output
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default()
        })
    }

    /// Steps this one reads from, in declaration order
    pub fn upstreams(&self) -> Vec<StepHandle> {
        let mut upstreams: Vec<StepHandle> = self
            .inputs
            .iter()
            .filter_map(|(_, binding)| binding.upstream())
            .collect();
        if let StepAction::Execute(exec) = &self.action {
            upstreams.extend(exec.executable.upstream());
            upstreams.extend(exec.classpath.as_ref().and_then(ToolReference::upstream));
        }
        upstreams
    }
}
