use super::{ApplyMappingsBuilder, ApplyMappingsContext, MappingChannel};
use crate::runtime::{Binding, ExecSpec, RegistrationError, StepGraph, StepHandle, StepSpec};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

/// Named-data key the mapping table is published under
pub const MAPPINGS_DATA: &str = "mappings";

/// Arguments the runner derives from the step itself
const RESERVED_ARGUMENTS: &[&str] = &["output", "outputDir"];

fn default_executable() -> PathBuf {
    PathBuf::from("java")
}

fn default_args() -> Vec<String> {
    ["--input", "{input}", "--output", "{output}", "--map", "{mappings}"]
        .iter()
        .map(|arg| arg.to_string())
        .collect()
}

/// An external renaming program and its argument templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenamerTool {
    #[serde(default = "default_executable")]
    pub executable: PathBuf,
    /// Jar to run; the executable is then treated as a JVM
    #[serde(default)]
    pub jar: Option<PathBuf>,
    #[serde(default)]
    pub main_class: Option<String>,
    #[serde(default)]
    pub jvm_args: Vec<String>,
    #[serde(default = "default_args")]
    pub args: Vec<String>,
}

impl Default for RenamerTool {
    fn default() -> Self {
        Self {
            executable: default_executable(),
            jar: None,
            main_class: None,
            jvm_args: Vec::new(),
            args: default_args(),
        }
    }
}

impl RenamerTool {
    pub fn exec_spec(&self) -> ExecSpec {
        let spec = match &self.jar {
            Some(jar) => ExecSpec::java(self.executable.clone(), jar.clone()),
            None => ExecSpec::new(self.executable.clone()),
        };
        let spec = spec
            .jvm_args(self.jvm_args.iter().cloned())
            .program_args(self.args.iter().cloned());
        match &self.main_class {
            Some(main_class) => spec.main_class(main_class.clone()),
            None => spec,
        }
    }
}

/// Registers a single executing step that runs a [`RenamerTool`].
#[derive(Debug, Clone)]
pub struct ToolMappingsBuilder {
    step_prefix: String,
    tool: RenamerTool,
    mappings: Option<PathBuf>,
}

impl ToolMappingsBuilder {
    pub fn new(step_prefix: impl Into<String>, tool: RenamerTool, mappings: Option<PathBuf>) -> Self {
        Self {
            step_prefix: step_prefix.into(),
            tool,
            mappings,
        }
    }
}

impl ApplyMappingsBuilder for ToolMappingsBuilder {
    fn build(
        &self,
        graph: &mut StepGraph,
        context: &ApplyMappingsContext<'_>,
    ) -> Result<StepHandle, RegistrationError> {
        let name = format!("{}{}", self.step_prefix, context.label);
        let working_dir = context.working_dir.join("remapped");

        let mappings = match &self.mappings {
            Some(path) => Binding::File(path.clone()),
            None => Binding::Data(MAPPINGS_DATA.to_string()),
        };

        let mut spec = StepSpec::execute(
            name,
            self.tool.exec_spec(),
            working_dir.join(&context.output_name),
        )
        .working_dir(&working_dir)
        .input("input", Binding::Output(context.input))
        .input(MAPPINGS_DATA, mappings);

        let mut artifacts: Vec<_> = context.game_artifacts.iter().collect();
        artifacts.sort();
        for (artifact, handle) in artifacts {
            spec = spec.input(artifact.binding_name(), Binding::Output(*handle));
        }
        for (key, value) in context.version_data {
            if spec.has_input(key) || RESERVED_ARGUMENTS.contains(&key.as_str()) {
                warn!(step = %spec.name, key = %key, "Ignoring version data that shadows a step input");
                continue;
            }
            spec = spec.input(key.clone(), Binding::Literal(value.clone()));
        }

        graph.register(spec)
    }
}

/// Mapping channel backed by external renamer programs.
#[derive(Debug, Clone)]
pub struct ToolMappingChannel {
    name: String,
    group_prefix: Option<String>,
    compiled: ToolMappingsBuilder,
    sources: ToolMappingsBuilder,
}

impl ToolMappingChannel {
    pub fn new(
        name: impl Into<String>,
        mappings: Option<PathBuf>,
        compiled: RenamerTool,
        sources: RenamerTool,
    ) -> Self {
        Self {
            name: name.into(),
            group_prefix: None,
            compiled: ToolMappingsBuilder::new("applyCompiledMappings", compiled, mappings.clone()),
            sources: ToolMappingsBuilder::new("applySourceMappings", sources, mappings),
        }
    }

    pub fn with_group_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.group_prefix = Some(prefix.into());
        self
    }
}

impl MappingChannel for ToolMappingChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn deobfuscation_group_prefix(&self) -> Option<&str> {
        self.group_prefix.as_deref()
    }

    fn compiled_builder(&self) -> &dyn ApplyMappingsBuilder {
        &self.compiled
    }

    fn source_builder(&self) -> &dyn ApplyMappingsBuilder {
        &self.sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mappings::GameArtifact;
    use crate::runtime::{StepAction, StepSpec};
    use std::collections::{BTreeMap, HashMap};

    #[test]
    fn test_builder_registers_bound_step() {
        let mut graph = StepGraph::new();
        let input = graph
            .register(StepSpec::provide(
                "provideLib",
                Binding::File(PathBuf::from("/repo/lib.jar")),
                "/build/raw/lib/input/lib.jar",
            ))
            .unwrap();
        let client = graph
            .register(StepSpec::provide(
                "cacheClient",
                Binding::File(PathBuf::from("/cache/1.20.1/client.jar")),
                "/build/raw/cache/client.jar",
            ))
            .unwrap();

        let mut version_data = BTreeMap::new();
        version_data.insert("mcVersion".to_string(), "1.20.1".to_string());
        let mut game_artifacts = HashMap::new();
        game_artifacts.insert(GameArtifact::ClientJar, client);

        let channel = ToolMappingChannel::new(
            "official",
            Some(PathBuf::from("/maps/official.tsrg")),
            RenamerTool::default(),
            RenamerTool::default(),
        );
        let context = ApplyMappingsContext {
            label: "Lib".to_string(),
            input,
            output_name: "lib.jar".to_string(),
            version_data: &version_data,
            game_artifacts: &game_artifacts,
            working_dir: PathBuf::from("/build/raw/lib"),
        };

        let handle = channel.compiled_builder().build(&mut graph, &context).unwrap();
        let spec = graph.spec(handle).unwrap();

        assert_eq!(spec.name, "applyCompiledMappingsLib");
        assert_eq!(spec.output, PathBuf::from("/build/raw/lib/remapped/lib.jar"));
        assert!(matches!(spec.action, StepAction::Execute(_)));

        let binding = |name: &str| {
            spec.inputs
                .iter()
                .find(|(input, _)| input == name)
                .map(|(_, binding)| binding.clone())
        };
        assert_eq!(binding("input"), Some(Binding::Output(input)));
        assert_eq!(
            binding("mappings"),
            Some(Binding::File(PathBuf::from("/maps/official.tsrg")))
        );
        assert_eq!(binding("client"), Some(Binding::Output(client)));
        assert_eq!(binding("mcVersion"), Some(Binding::Literal("1.20.1".into())));
    }

    #[test]
    fn test_version_data_cannot_shadow_step_inputs() {
        let mut graph = StepGraph::new();
        let input = graph
            .register(StepSpec::placeholder("in", "/build/in.jar"))
            .unwrap();
        let builder = ToolMappingsBuilder::new("applyCompiledMappings", RenamerTool::default(), None);
        let version_data = BTreeMap::from([
            ("input".to_string(), "/tmp/evil.jar".to_string()),
            ("mappings".to_string(), "/tmp/evil.tsrg".to_string()),
            ("output".to_string(), "/tmp/out.jar".to_string()),
            ("client".to_string(), "/tmp/client.jar".to_string()),
            ("mcVersion".to_string(), "1.20.1".to_string()),
        ]);
        let game_artifacts = HashMap::new();
        let context = ApplyMappingsContext {
            label: "[a:lib:1]".to_string(),
            input,
            output_name: "lib.jar".to_string(),
            version_data: &version_data,
            game_artifacts: &game_artifacts,
            working_dir: PathBuf::from("/build/raw/a_lib_1"),
        };

        let handle = builder.build(&mut graph, &context).unwrap();
        let spec = graph.spec(handle).unwrap();

        assert!(spec.inputs.contains(&("input".to_string(), Binding::Output(input))));
        assert!(spec
            .inputs
            .contains(&("mappings".to_string(), Binding::Data("mappings".to_string()))));
        assert!(!spec.has_input("output"));
        assert!(spec
            .inputs
            .contains(&("client".to_string(), Binding::Literal("/tmp/client.jar".into()))));
        assert!(spec
            .inputs
            .contains(&("mcVersion".to_string(), Binding::Literal("1.20.1".into()))));
        assert_eq!(graph.spec(handle).unwrap().upstreams(), vec![input]);
    }

    #[test]
    fn test_mappings_fall_back_to_named_data() {
        let mut graph = StepGraph::new();
        let input = graph
            .register(StepSpec::placeholder("in", "/build/in.jar"))
            .unwrap();
        let builder = ToolMappingsBuilder::new("applySourceMappings", RenamerTool::default(), None);
        let version_data = BTreeMap::new();
        let game_artifacts = HashMap::new();
        let context = ApplyMappingsContext {
            label: "LibSources".to_string(),
            input,
            output_name: "lib-sources.jar".to_string(),
            version_data: &version_data,
            game_artifacts: &game_artifacts,
            working_dir: PathBuf::from("/build/sources/lib"),
        };

        let handle = builder.build(&mut graph, &context).unwrap();
        let spec = graph.spec(handle).unwrap();
        assert!(spec
            .inputs
            .contains(&("mappings".to_string(), Binding::Data("mappings".to_string()))));
    }

    #[test]
    fn test_jar_tool_exec_spec() {
        let tool = RenamerTool {
            jar: Some(PathBuf::from("/tools/renamer.jar")),
            jvm_args: vec!["-Xmx2g".to_string()],
            ..RenamerTool::default()
        };
        let exec = tool.exec_spec();
        assert!(exec.classpath.is_some());
        assert_eq!(exec.jvm_args, vec!["-Xmx2g"]);
        assert_eq!(exec.program_args, default_args());
    }
}
