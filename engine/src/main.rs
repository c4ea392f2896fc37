// Devagent
// Main entry point for the devagent binary

use clap::Parser;
use std::process::ExitCode;
use devagent_engine::cli::{Cli, Command, ConfigAction};
use devagent_engine::config::Config;
use devagent_engine::handlers::{
    handle_config_path, handle_config_show, handle_run, handle_tools, OutputFormat,
};
use devagent_engine::telemetry::init_telemetry_with_level;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    // Load configuration (or use custom path if provided)
    let mut config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    if let Some(level) = &cli.log {
        config.core.log_level = level.to_lowercase();
        config.validate()?;
    }

    // RUST_LOG still wins over the configured level
    init_telemetry_with_level(&config.core.log_level);

    let version = env!("CARGO_PKG_VERSION");
    let commit = env!("GIT_COMMIT_HASH");
    let timestamp = env!("BUILD_TIMESTAMP");
    tracing::info!("Devagent v{} ({} - {})", version, commit, timestamp);

    match cli.command {
        Command::Run(args) => {
            tracing::info!("Starting run from branch {}", args.parent_branch_id);
            handle_run(args, &config, format).await
        }

        Command::Tools => handle_tools(&config, format).map(|_| ExitCode::SUCCESS),

        Command::Config { action } => match action {
            ConfigAction::Show => handle_config_show(&config, format),
            ConfigAction::Path => handle_config_path(cli.config.as_deref()),
        }
        .map(|_| ExitCode::SUCCESS),
    }
}
