pub mod commands;
pub mod handlers;
pub mod output;

pub use commands::{CliArgs, Commands, InspectArgs, OutputFormatArg, RewriteArgs};
pub use handlers::{handle_inspect, handle_rewrite, load_config};
pub use output::{InspectReport, OutputFormat, OutputFormatter, RewriteReport, SkippedDependency};
