use crate::dependency::Coordinates;
use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Rewrites obfuscated build dependencies into deobfuscated replacements
#[derive(Parser, Debug)]
#[command(
    name = "depforge",
    about = "Rewrites obfuscated build dependencies into deobfuscated replacements",
    version,
    author,
    long_about = "depforge walks a resolved dependency tree, finds packages whose manifest \
                  carries obfuscation markers and registers the steps that remap them \
                  (and their sources) under a replacement group."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        short = 'c',
        long,
        global = true,
        value_name = "FILE",
        help = "TOML configuration file"
    )]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Rewrite declared dependencies",
        long_about = "Resolves the declared dependencies, registers deobfuscation steps for \
                      every obfuscated package and prints the replacement descriptors.\n\n\
                      Examples:\n  \
                      depforge rewrite --repository ~/.m2/repository -d com.example:lib:1.0\n  \
                      depforge rewrite --graph deps.json -d com.example:lib:1.0 --format json\n  \
                      depforge rewrite --graph deps.json -d com.example:lib:1.0 --execute"
    )]
    Rewrite(RewriteArgs),

    #[command(
        about = "Check a package for obfuscation markers",
        long_about = "Reads the manifest of a package and reports whether it would be \
                      deobfuscated.\n\n\
                      Examples:\n  \
                      depforge inspect libs/mod-1.0.jar"
    )]
    Inspect(InspectArgs),
}

#[derive(Parser, Debug, Clone)]
#[command(group(
    ArgGroup::new("source")
        .required(true)
        .args(["repository", "graph"])
))]
pub struct RewriteArgs {
    #[arg(long, value_name = "DIR", help = "Maven-layout local repository")]
    pub repository: Option<PathBuf>,

    #[arg(long, value_name = "FILE", help = "JSON dependency graph")]
    pub graph: Option<PathBuf>,

    #[arg(
        short = 'd',
        long = "dependency",
        value_name = "COORDINATES",
        required = true,
        help = "Declared dependency as group:artifact:version[:classifier][@extension]"
    )]
    pub dependencies: Vec<Coordinates>,

    #[arg(
        long,
        value_name = "NAME",
        help = "Configuration the dependencies belong to (defaults to the configured one)"
    )]
    pub configuration: Option<String>,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,

    #[arg(
        short = 'o',
        long,
        value_name = "FILE",
        help = "Write output to file instead of stdout"
    )]
    pub output: Option<PathBuf>,

    #[arg(long, help = "Run the registered steps and produce every artifact")]
    pub execute: bool,

    #[arg(long, value_name = "N", help = "Parallel workers for --execute")]
    pub workers: Option<usize>,
}

#[derive(Parser, Debug, Clone)]
pub struct InspectArgs {
    #[arg(value_name = "JAR", help = "Package to inspect")]
    pub jar: PathBuf,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Yaml,
    Human,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Yaml => super::output::OutputFormat::Yaml,
            OutputFormatArg::Human => super::output::OutputFormat::Human,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_args_verify() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn test_rewrite_defaults() {
        let args = CliArgs::parse_from([
            "depforge",
            "rewrite",
            "--graph",
            "deps.json",
            "-d",
            "com.example:lib:1.0",
        ]);
        match args.command {
            Commands::Rewrite(rewrite) => {
                assert_eq!(rewrite.graph, Some(PathBuf::from("deps.json")));
                assert!(rewrite.repository.is_none());
                assert_eq!(rewrite.format, OutputFormatArg::Human);
                assert_eq!(rewrite.dependencies.len(), 1);
                assert_eq!(rewrite.dependencies[0].artifact, "lib");
                assert!(!rewrite.execute);
                assert!(rewrite.configuration.is_none());
            }
            _ => panic!("Expected Rewrite command"),
        }
    }

    #[test]
    fn test_rewrite_with_options() {
        let args = CliArgs::parse_from([
            "depforge",
            "rewrite",
            "--repository",
            "/tmp/repo",
            "--dependency",
            "com.example:a:1.0",
            "--dependency",
            "com.example:b:2.0:natives@zip",
            "--configuration",
            "compileOnly",
            "--format",
            "yaml",
            "--output",
            "out.yaml",
            "--execute",
            "--workers",
            "2",
        ]);
        match args.command {
            Commands::Rewrite(rewrite) => {
                assert_eq!(rewrite.repository, Some(PathBuf::from("/tmp/repo")));
                assert_eq!(rewrite.dependencies.len(), 2);
                assert_eq!(rewrite.dependencies[1].classifier.as_deref(), Some("natives"));
                assert_eq!(rewrite.dependencies[1].extension, "zip");
                assert_eq!(rewrite.configuration.as_deref(), Some("compileOnly"));
                assert_eq!(rewrite.format, OutputFormatArg::Yaml);
                assert_eq!(rewrite.output, Some(PathBuf::from("out.yaml")));
                assert!(rewrite.execute);
                assert_eq!(rewrite.workers, Some(2));
            }
            _ => panic!("Expected Rewrite command"),
        }
    }

    #[test]
    fn test_rewrite_requires_a_source() {
        let result = CliArgs::try_parse_from(["depforge", "rewrite", "-d", "com.example:lib:1.0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_rewrite_sources_conflict() {
        let result = CliArgs::try_parse_from([
            "depforge",
            "rewrite",
            "--graph",
            "deps.json",
            "--repository",
            "/tmp/repo",
            "-d",
            "com.example:lib:1.0",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_rewrite_rejects_bad_coordinates() {
        let result =
            CliArgs::try_parse_from(["depforge", "rewrite", "--graph", "deps.json", "-d", "lib"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_inspect_command() {
        let args = CliArgs::parse_from(["depforge", "inspect", "mod.jar", "-f", "json"]);
        match args.command {
            Commands::Inspect(inspect) => {
                assert_eq!(inspect.jar, PathBuf::from("mod.jar"));
                assert_eq!(inspect.format, OutputFormatArg::Json);
            }
            _ => panic!("Expected Inspect command"),
        }
    }

    #[test]
    fn test_global_flags() {
        let args = CliArgs::parse_from(["depforge", "-v", "--config", "depforge.toml", "inspect", "a.jar"]);
        assert!(args.verbose);
        assert!(!args.quiet);
        assert_eq!(args.config, Some(PathBuf::from("depforge.toml")));

        let args = CliArgs::parse_from(["depforge", "inspect", "a.jar", "-q"]);
        assert!(args.quiet);

        assert!(CliArgs::try_parse_from(["depforge", "-v", "-q", "inspect", "a.jar"]).is_err());
    }

    #[test]
    fn test_log_level_flag() {
        let args = CliArgs::parse_from(["depforge", "--log-level", "debug", "inspect", "a.jar"]);
        assert_eq!(args.log_level, Some("debug".to_string()));
    }
}
