//! External process execution with console capture

use super::error::StepError;
use super::substitution::absolute;
use crate::manifest::JarManifest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::time::Instant;
use tracing::{debug, info};

/// Default name of the structured run log inside a step's working directory
pub const LOG_FILE_NAME: &str = "log.log";
/// Default name of the console capture inside a step's working directory
pub const CONSOLE_LOG_FILE_NAME: &str = "console.log";

/// A fully resolved process launch. Arguments are already substituted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub step: String,
    pub executable: PathBuf,
    pub jvm_args: Vec<String>,
    pub program_args: Vec<String>,
    pub classpath: Option<PathBuf>,
    pub main_class: Option<String>,
    pub working_dir: PathBuf,
    pub output: PathBuf,
    pub log_file: PathBuf,
    pub console_log: PathBuf,
}

impl Invocation {
    /// Arguments passed to the executable, in order.
    pub fn command_args(&self, main_class: Option<&str>) -> Vec<String> {
        let mut args = self.jvm_args.clone();
        if let Some(classpath) = &self.classpath {
            args.push("-cp".to_string());
            args.push(absolute(classpath).display().to_string());
            if let Some(main_class) = main_class {
                args.push(main_class.to_string());
            }
        }
        args.extend(self.program_args.iter().cloned());
        args
    }

    fn header(&self, main_class: Option<&str>) -> String {
        let quote = |args: &[String]| {
            args.iter()
                .map(|arg| format!("\"{}\"", arg))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let classpath = self
            .classpath
            .as_deref()
            .map(|path| absolute(path).display().to_string())
            .unwrap_or_default();

        let mut header = String::new();
        header.push_str(&format!("JVM:               {}\n", self.executable.display()));
        header.push_str(&format!("JVM Args:          {}\n", quote(&self.jvm_args)));
        header.push_str(&format!("Run Args:          {}\n", quote(&self.program_args)));
        header.push_str(&format!("Classpath:         {}\n", classpath));
        header.push_str(&format!(
            "Working Dir:       {}\n",
            absolute(&self.working_dir).display()
        ));
        header.push_str(&format!("Main Class:        {}\n", main_class.unwrap_or_default()));
        header.push_str(&format!(
            "Program log file:  {}\n",
            absolute(&self.log_file).display()
        ));
        header.push_str(&format!(
            "Output file:       {}\n",
            absolute(&self.output).display()
        ));
        header
    }
}

/// Record of one launch, written as JSON to the run log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunRecord {
    pub step: String,
    pub executable: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub output: PathBuf,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// Launches the program behind an executing step.
pub trait ProcessRunner: Send + Sync {
    /// Blocks until the program exits. A non-zero exit is an error.
    fn run(&self, invocation: &Invocation) -> Result<(), StepError>;
}

/// Runs programs as child processes of this one
#[derive(Debug, Default, Clone, Copy)]
pub struct ExternalProcessRunner;

impl ExternalProcessRunner {
    pub fn new() -> Self {
        Self
    }

    fn resolve_main_class(&self, invocation: &Invocation) -> Result<Option<String>, StepError> {
        let Some(classpath) = &invocation.classpath else {
            return Ok(invocation.main_class.clone());
        };
        if let Some(main_class) = &invocation.main_class {
            return Ok(Some(main_class.clone()));
        }

        let manifest = JarManifest::read_from(classpath).map_err(|source| StepError::Manifest {
            step: invocation.step.clone(),
            source,
        })?;
        match manifest.as_ref().and_then(JarManifest::main_class) {
            Some(main_class) => Ok(Some(main_class.to_string())),
            None => Err(StepError::MissingMainClass {
                step: invocation.step.clone(),
                classpath: classpath.clone(),
            }),
        }
    }

    fn write_record(&self, invocation: &Invocation, record: &RunRecord) -> Result<String, StepError> {
        let json = serde_json::to_string_pretty(record).map_err(|e| StepError::Io {
            step: invocation.step.clone(),
            path: invocation.log_file.clone(),
            source: e.into(),
        })?;
        fs::write(&invocation.log_file, &json).map_err(|source| StepError::Io {
            step: invocation.step.clone(),
            path: invocation.log_file.clone(),
            source,
        })?;
        Ok(json)
    }
}

fn ensure_parent(step: &str, path: &Path) -> Result<(), StepError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|source| StepError::Io {
                step: step.to_string(),
                path: parent.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}

/// Exit code of a finished process; death by signal `n` maps to `128 + n`.
pub fn exit_code(status: &ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

impl ProcessRunner for ExternalProcessRunner {
    fn run(&self, invocation: &Invocation) -> Result<(), StepError> {
        let step = invocation.step.as_str();
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source: std::io::Error| StepError::Io {
                step: step.to_string(),
                path,
                source,
            }
        };

        fs::create_dir_all(&invocation.working_dir).map_err(io_err(&invocation.working_dir))?;
        ensure_parent(step, &invocation.output)?;
        ensure_parent(step, &invocation.log_file)?;
        ensure_parent(step, &invocation.console_log)?;

        // The header lands in the console log even when nothing else does.
        let mut console = File::create(&invocation.console_log).map_err(io_err(&invocation.console_log))?;
        let main_class = match self.resolve_main_class(invocation) {
            Ok(main_class) => main_class,
            Err(err) => {
                let _ = console.write_all(invocation.header(None).as_bytes());
                return Err(err);
            }
        };
        console
            .write_all(invocation.header(main_class.as_deref()).as_bytes())
            .and_then(|_| console.flush())
            .map_err(io_err(&invocation.console_log))?;

        let args = invocation.command_args(main_class.as_deref());
        let mut record = RunRecord {
            step: step.to_string(),
            executable: invocation.executable.display().to_string(),
            args: args.clone(),
            working_dir: absolute(&invocation.working_dir),
            output: absolute(&invocation.output),
            started_at: Utc::now(),
            finished_at: None,
            exit_code: None,
            duration_ms: None,
        };
        let written = self.write_record(invocation, &record)?;

        let stdout = console.try_clone().map_err(io_err(&invocation.console_log))?;
        let stderr = console.try_clone().map_err(io_err(&invocation.console_log))?;

        info!(
            step = %step,
            executable = %invocation.executable.display(),
            working_dir = %invocation.working_dir.display(),
            "Launching external process"
        );
        debug!(step = %step, args = ?args, "Process arguments");

        let started = Instant::now();
        let status = Command::new(&invocation.executable)
            .args(&args)
            .current_dir(&invocation.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .status()
            .map_err(|source| StepError::ProcessSpawn {
                step: step.to_string(),
                program: invocation.executable.display().to_string(),
                source,
            })?;
        let code = exit_code(&status);

        // Leave the log alone if the program wrote its own.
        if fs::read_to_string(&invocation.log_file).ok().as_deref() == Some(written.as_str()) {
            record.finished_at = Some(Utc::now());
            record.exit_code = Some(code);
            record.duration_ms = Some(started.elapsed().as_millis() as u64);
            self.write_record(invocation, &record)?;
        }

        debug!(step = %step, code, duration_ms = started.elapsed().as_millis(), "Process exited");

        if !status.success() {
            return Err(StepError::ProcessExit {
                step: step.to_string(),
                code,
            });
        }
        Ok(())
    }
}
