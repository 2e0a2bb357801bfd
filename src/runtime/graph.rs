//! Lazily executed step graph
//!
//! Registration is cheap bookkeeping: a step only runs when its output is
//! first requested through [`StepGraph::materialize`]. Each step runs at most
//! once; its result (success or failure) is cached for the life of the graph.

use super::error::{PendingInput, RegistrationError, StepError, UnboundInputs};
use super::process::{
    ExternalProcessRunner, Invocation, ProcessRunner, CONSOLE_LOG_FILE_NAME, LOG_FILE_NAME,
};
use super::step::{
    Artifact, Binding, ExecSpec, StepAction, StepHandle, StepSpec, ToolReference, PROVIDE_INPUT,
};
use super::substitution::{ArgValue, SubstitutionContext, UnresolvedSubstitutionError};
use crate::progress::{NoOpHandler, ProgressEvent, ProgressHandler};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::debug;

type StepResult = Result<Artifact, Arc<StepError>>;

struct Step {
    spec: StepSpec,
    state: Mutex<Option<StepResult>>,
}

pub struct StepGraph {
    steps: Vec<Step>,
    by_name: HashMap<String, StepHandle>,
    outputs: HashMap<PathBuf, StepHandle>,
    working_dirs: HashMap<PathBuf, StepHandle>,
    data: BTreeMap<String, PathBuf>,
    progress: Arc<dyn ProgressHandler>,
    runner: Arc<dyn ProcessRunner>,
}

impl Default for StepGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl StepGraph {
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            by_name: HashMap::new(),
            outputs: HashMap::new(),
            working_dirs: HashMap::new(),
            data: BTreeMap::new(),
            progress: Arc::new(NoOpHandler),
            runner: Arc::new(ExternalProcessRunner::new()),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressHandler>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_runner(mut self, runner: Arc<dyn ProcessRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Adds a shared named data file, visible to every step as `{name}`.
    pub fn insert_data(&mut self, name: impl Into<String>, path: impl Into<PathBuf>) {
        self.data.insert(name.into(), path.into());
    }

    pub fn data(&self) -> &BTreeMap<String, PathBuf> {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn handle(&self, name: &str) -> Option<StepHandle> {
        self.by_name.get(name).copied()
    }

    /// Name of the registered step that `spec` would clash with, by name,
    /// output or working directory. `None` if [`Self::register`] would not
    /// reject it for a duplicate.
    pub fn conflict(&self, spec: &StepSpec) -> Option<String> {
        if self.by_name.contains_key(&spec.name) {
            return Some(spec.name.clone());
        }
        let owner = match &spec.action {
            StepAction::Execute(_) => self
                .outputs
                .get(&spec.output)
                .or_else(|| self.working_dirs.get(&spec.resolved_working_dir())),
            StepAction::Provide => self.outputs.get(&spec.output),
        };
        owner.map(|owner| self.steps[owner.0].spec.name.clone())
    }

    pub fn handles(&self) -> impl Iterator<Item = StepHandle> + '_ {
        (0..self.steps.len()).map(StepHandle)
    }

    pub fn spec(&self, handle: StepHandle) -> Option<&StepSpec> {
        self.steps.get(handle.0).map(|step| &step.spec)
    }

    pub fn name(&self, handle: StepHandle) -> Option<&str> {
        self.spec(handle).map(|spec| spec.name.as_str())
    }

    pub fn output(&self, handle: StepHandle) -> Option<&Path> {
        self.spec(handle).map(|spec| spec.output.as_path())
    }

    /// Whether the step has already run, successfully or not
    pub fn is_executed(&self, handle: StepHandle) -> bool {
        self.steps
            .get(handle.0)
            .map(|step| self.lock(step).is_some())
            .unwrap_or(false)
    }

    pub fn register(&mut self, spec: StepSpec) -> Result<StepHandle, RegistrationError> {
        if self.by_name.contains_key(&spec.name) {
            return Err(RegistrationError::DuplicateStep(spec.name));
        }
        if let Some(owner) = self.outputs.get(&spec.output) {
            return Err(RegistrationError::DuplicateOutput {
                step: spec.name.clone(),
                path: spec.output.clone(),
                owner: self.steps[owner.0].spec.name.clone(),
            });
        }
        for upstream in spec.upstreams() {
            if upstream.0 >= self.steps.len() {
                return Err(RegistrationError::UnknownStep(upstream.to_string()));
            }
        }

        let working_dir = match &spec.action {
            StepAction::Execute(_) => {
                let dir = spec.resolved_working_dir();
                if let Some(owner) = self.working_dirs.get(&dir) {
                    return Err(RegistrationError::DuplicateOutput {
                        step: spec.name.clone(),
                        path: dir,
                        owner: self.steps[owner.0].spec.name.clone(),
                    });
                }
                Some(dir)
            }
            StepAction::Provide => None,
        };

        let handle = StepHandle(self.steps.len());
        debug!(step = %spec.name, output = %spec.output.display(), "Registered step");

        self.by_name.insert(spec.name.clone(), handle);
        self.outputs.insert(spec.output.clone(), handle);
        if let Some(dir) = working_dir {
            self.working_dirs.insert(dir, handle);
        }
        self.steps.push(Step {
            spec,
            state: Mutex::new(None),
        });
        Ok(handle)
    }

    /// Binds a pending input. Each placeholder can be bound exactly once.
    pub fn bind(
        &mut self,
        handle: StepHandle,
        input: &str,
        binding: Binding,
    ) -> Result<(), RegistrationError> {
        let step_name = self
            .name(handle)
            .ok_or_else(|| RegistrationError::UnknownStep(handle.to_string()))?
            .to_string();

        if let Some(upstream) = binding.upstream() {
            let upstream_name = self
                .name(upstream)
                .ok_or_else(|| RegistrationError::UnknownStep(upstream.to_string()))?
                .to_string();
            if self.reaches(upstream, handle) {
                return Err(RegistrationError::Cycle {
                    step: step_name,
                    upstream: upstream_name,
                });
            }
        }

        let step = &mut self.steps[handle.0];
        let slot = step
            .spec
            .inputs
            .iter_mut()
            .find(|(name, _)| name == input)
            .map(|(_, binding)| binding)
            .ok_or_else(|| RegistrationError::UnknownInput {
                step: step_name.clone(),
                input: input.to_string(),
            })?;
        if !slot.is_pending() {
            return Err(RegistrationError::AlreadyBound {
                step: step_name,
                input: input.to_string(),
            });
        }
        *slot = binding;
        Ok(())
    }

    /// Every placeholder input that is still pending.
    pub fn pending_inputs(&self) -> Vec<PendingInput> {
        self.steps
            .iter()
            .flat_map(|step| {
                step.spec
                    .inputs
                    .iter()
                    .filter(|(_, binding)| binding.is_pending())
                    .map(|(input, _)| PendingInput {
                        step: step.spec.name.clone(),
                        input: input.clone(),
                    })
            })
            .collect()
    }

    pub fn verify_bound(&self) -> Result<(), UnboundInputs> {
        let pending = self.pending_inputs();
        if pending.is_empty() {
            Ok(())
        } else {
            Err(UnboundInputs(pending))
        }
    }

    /// Produces the step's output, running it and its upstream steps first if
    /// they have not run yet.
    ///
    /// Concurrent callers for the same step block until the first one is done.
    ///
    /// # Panics
    ///
    /// Panics if `handle` was not issued by this graph.
    pub fn materialize(&self, handle: StepHandle) -> StepResult {
        let step = &self.steps[handle.0];
        let mut state = self.lock(step);
        if let Some(result) = state.as_ref() {
            return result.clone();
        }

        let started = Instant::now();
        self.progress.on_progress(&ProgressEvent::StepStarted {
            step: step.spec.name.clone(),
        });

        let result = self.execute(handle).map_err(Arc::new);
        match &result {
            Ok(_) => self.progress.on_progress(&ProgressEvent::StepFinished {
                step: step.spec.name.clone(),
                duration: started.elapsed(),
            }),
            Err(err) => self.progress.on_progress(&ProgressEvent::StepFailed {
                step: step.spec.name.clone(),
                error: err.to_string(),
            }),
        }

        *state = Some(result.clone());
        result
    }

    fn lock<'a>(&self, step: &'a Step) -> std::sync::MutexGuard<'a, Option<StepResult>> {
        step.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether `to` is `from` or one of its transitive upstreams
    fn reaches(&self, from: StepHandle, to: StepHandle) -> bool {
        let mut stack = vec![from];
        let mut seen = HashSet::new();
        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            if let Some(spec) = self.spec(current) {
                stack.extend(spec.upstreams());
            }
        }
        false
    }

    /// First pending input among the step and everything upstream of it
    fn find_pending(&self, handle: StepHandle) -> Option<(StepHandle, String)> {
        let mut stack = vec![handle];
        let mut seen = HashSet::new();
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            let spec = self.spec(current)?;
            if let Some((input, _)) = spec.inputs.iter().find(|(_, b)| b.is_pending()) {
                return Some((current, input.clone()));
            }
            stack.extend(spec.upstreams());
        }
        None
    }

    fn upstream_error(&self, step: &str, upstream: StepHandle, source: Arc<StepError>) -> StepError {
        StepError::Upstream {
            step: step.to_string(),
            upstream: self.name(upstream).unwrap_or_default().to_string(),
            source,
        }
    }

    fn execute(&self, handle: StepHandle) -> Result<Artifact, StepError> {
        let spec = &self.steps[handle.0].spec;
        let name = spec.name.as_str();

        if let Some((owner, input)) = self.find_pending(handle) {
            let unbound = StepError::UnboundInput {
                step: self.name(owner).unwrap_or_default().to_string(),
                input,
            };
            if owner == handle {
                return Err(unbound);
            }
            return Err(self.upstream_error(name, owner, Arc::new(unbound)));
        }

        let mut arguments = BTreeMap::new();
        for (input, binding) in &spec.inputs {
            let value = match binding {
                Binding::Literal(value) => ArgValue::Literal(value.clone()),
                Binding::File(path) => ArgValue::File(path.clone()),
                Binding::Output(upstream) => ArgValue::File(self.upstream_path(name, *upstream)?),
                Binding::Data(key) => match self.data.get(key) {
                    Some(path) => ArgValue::File(path.clone()),
                    None => {
                        return Err(StepError::UnknownData {
                            step: name.to_string(),
                            name: key.clone(),
                        })
                    }
                },
                Binding::Pending => {
                    return Err(StepError::UnboundInput {
                        step: name.to_string(),
                        input: input.clone(),
                    })
                }
            };
            arguments.insert(input.clone(), value);
        }

        match &spec.action {
            StepAction::Provide => self.provide(spec, &arguments)?,
            StepAction::Execute(exec) => self.run(spec, exec, arguments)?,
        }

        if !spec.output.exists() {
            return Err(StepError::MissingOutput {
                step: name.to_string(),
                path: spec.output.clone(),
            });
        }
        Ok(Artifact::new(name, spec.output.clone()))
    }

    fn upstream_path(&self, step: &str, upstream: StepHandle) -> Result<PathBuf, StepError> {
        self.materialize(upstream)
            .map(|artifact| artifact.path)
            .map_err(|source| self.upstream_error(step, upstream, source))
    }

    fn tool_path(&self, step: &str, tool: &ToolReference) -> Result<PathBuf, StepError> {
        match tool {
            ToolReference::Path(path) => Ok(path.clone()),
            ToolReference::Output(upstream) => self.upstream_path(step, *upstream),
        }
    }

    fn provide(&self, spec: &StepSpec, arguments: &BTreeMap<String, ArgValue>) -> Result<(), StepError> {
        let source = match arguments.get(PROVIDE_INPUT) {
            Some(ArgValue::File(path)) => path,
            _ => {
                return Err(StepError::NotAFile {
                    step: spec.name.clone(),
                    input: PROVIDE_INPUT.to_string(),
                })
            }
        };
        if source == &spec.output {
            return Ok(());
        }

        let io_err = |path: &Path, source: std::io::Error| StepError::Io {
            step: spec.name.clone(),
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = spec.output.parent() {
            fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        fs::copy(source, &spec.output).map_err(|e| io_err(source, e))?;
        debug!(step = %spec.name, from = %source.display(), to = %spec.output.display(), "Provided artifact");
        Ok(())
    }

    fn run(
        &self,
        spec: &StepSpec,
        exec: &ExecSpec,
        mut arguments: BTreeMap<String, ArgValue>,
    ) -> Result<(), StepError> {
        let name = spec.name.as_str();
        let working_dir = spec.resolved_working_dir();
        let executable = self.tool_path(name, &exec.executable)?;
        let classpath = exec
            .classpath
            .as_ref()
            .map(|tool| self.tool_path(name, tool))
            .transpose()?;

        let log_file = log_location(&arguments, "log", &working_dir, LOG_FILE_NAME);
        let console_log = log_location(&arguments, "console.log", &working_dir, CONSOLE_LOG_FILE_NAME);

        arguments
            .entry("output".to_string())
            .or_insert_with(|| ArgValue::File(spec.output.clone()));
        arguments
            .entry("outputDir".to_string())
            .or_insert_with(|| ArgValue::File(working_dir.clone()));
        arguments
            .entry("log".to_string())
            .or_insert_with(|| ArgValue::File(log_file.clone()));
        arguments
            .entry("console.log".to_string())
            .or_insert_with(|| ArgValue::File(console_log.clone()));

        let context = SubstitutionContext::new(arguments).with_data(&self.data);
        let substitution_err = |source: UnresolvedSubstitutionError| StepError::UnresolvedSubstitution {
            step: name.to_string(),
            source,
        };
        let jvm_args = context.substitute_all(&exec.jvm_args).map_err(substitution_err)?;
        let program_args = context
            .substitute_all(&exec.program_args)
            .map_err(substitution_err)?;

        let invocation = Invocation {
            step: name.to_string(),
            executable,
            jvm_args,
            program_args,
            classpath,
            main_class: exec.main_class.clone(),
            working_dir,
            output: spec.output.clone(),
            log_file,
            console_log,
        };
        self.runner.run(&invocation)
    }
}

/// Log file named by an explicit binding, or the default inside the working dir.
fn log_location(
    arguments: &BTreeMap<String, ArgValue>,
    key: &str,
    working_dir: &Path,
    default_name: &str,
) -> PathBuf {
    match arguments.get(key) {
        Some(ArgValue::File(path)) => path.clone(),
        Some(ArgValue::Literal(name)) => working_dir.join(name),
        None => working_dir.join(default_name),
    }
}
