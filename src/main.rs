use depforge::cli::commands::{CliArgs, Commands};
use depforge::cli::handlers::{handle_inspect, handle_rewrite};
use depforge::util::logging::{self, LoggingConfig, LOG_LEVEL_ENV};
use depforge::VERSION;

use clap::Parser;
use std::env;
use tracing::{debug, Level};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging_from_args(&args);

    debug!("depforge v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let config_path = args.config.as_deref();
    let exit_code = match &args.command {
        Commands::Rewrite(rewrite_args) => {
            handle_rewrite(rewrite_args, config_path, args.quiet).await
        }
        Commands::Inspect(inspect_args) => handle_inspect(inspect_args, config_path),
    };

    std::process::exit(exit_code);
}

fn init_logging_from_args(args: &CliArgs) {
    let level = if let Some(level_str) = &args.log_level {
        logging::parse_level(level_str)
    } else if args.verbose {
        Level::DEBUG
    } else if args.quiet {
        Level::ERROR
    } else {
        let level_str = env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| "info".to_string());
        logging::parse_level(&level_str)
    };

    logging::init_logging(LoggingConfig {
        level,
        ..logging::config_from_env()
    });
}
