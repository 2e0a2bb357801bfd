use crate::runtime::{Binding, ExecSpec, RegistrationError, StepGraph, StepHandle, StepSpec};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_JVM_ARGS: &[&str] = &["-Xmx4g"];

pub const DEFAULT_PROGRAM_ARGS: &[&str] = &[
    "-din=1", "-rsy=1", "-dgs=1", "-dsc=1", "-das=1", "-log=WARN", "{input}", "{output}",
];

fn default_java() -> PathBuf {
    PathBuf::from("java")
}

fn default_jar() -> PathBuf {
    PathBuf::from("forgeflower.jar")
}

fn to_strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|arg| arg.to_string()).collect()
}

fn default_jvm_args() -> Vec<String> {
    to_strings(DEFAULT_JVM_ARGS)
}

fn default_program_args() -> Vec<String> {
    to_strings(DEFAULT_PROGRAM_ARGS)
}

/// A JVM decompiler used when no sources artifact exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecompilerTool {
    #[serde(default = "default_java")]
    pub java: PathBuf,
    #[serde(default = "default_jar")]
    pub jar: PathBuf,
    /// Read from the jar manifest when absent
    #[serde(default)]
    pub main_class: Option<String>,
    #[serde(default = "default_jvm_args")]
    pub jvm_args: Vec<String>,
    #[serde(default = "default_program_args")]
    pub program_args: Vec<String>,
}

impl Default for DecompilerTool {
    fn default() -> Self {
        Self {
            java: default_java(),
            jar: default_jar(),
            main_class: None,
            jvm_args: default_jvm_args(),
            program_args: default_program_args(),
        }
    }
}

impl DecompilerTool {
    pub fn new(jar: impl Into<PathBuf>) -> Self {
        Self {
            jar: jar.into(),
            ..Self::default()
        }
    }

    pub fn with_java(mut self, java: impl Into<PathBuf>) -> Self {
        self.java = java.into();
        self
    }

    pub fn exec_spec(&self) -> ExecSpec {
        let spec = ExecSpec::java(self.java.clone(), self.jar.clone())
            .jvm_args(self.jvm_args.iter().cloned())
            .program_args(self.program_args.iter().cloned());
        match &self.main_class {
            Some(main_class) => spec.main_class(main_class.clone()),
            None => spec,
        }
    }

    /// Registers `decompile<label>`, reading `input` and writing
    /// `<working_dir>/decompile/<output_name>`.
    pub fn register(
        &self,
        graph: &mut StepGraph,
        label: &str,
        input: StepHandle,
        working_dir: &Path,
        output_name: &str,
    ) -> Result<StepHandle, RegistrationError> {
        let working_dir = working_dir.join("decompile");
        let spec = StepSpec::execute(
            format!("decompile{}", label),
            self.exec_spec(),
            working_dir.join(output_name),
        )
        .working_dir(working_dir)
        .input("input", Binding::Output(input));
        graph.register(spec)
    }
}
