//! Lumen CLI
//!
//! Main entry point for the lumen command-line tool.
//! Chat about the lamp catalog, or query it directly.

mod commands;

use anyhow::Context;
use clap::{Parser, Subcommand};
use commands::{AskCommand, ChatCommand, FilterCommand, PromptsCommand, SchemaCommand};
use lumen_core::config::{AppConfig, ConfigOverrides};
use lumen_core::logging;
use std::path::PathBuf;

/// Lumen - chat assistant for a lamp product catalog
#[derive(Parser, Debug)]
#[command(name = "lumen")]
#[command(about = "Chat assistant for a lamp product catalog", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "LUMEN_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "LUMEN_CONFIG")]
    config: Option<PathBuf>,

    /// Catalog JSONL file (relative to the workspace)
    #[arg(long, global = true, env = "LUMEN_CATALOG")]
    catalog: Option<PathBuf>,

    /// Infer the catalog schema from the data instead of the built-in one
    #[arg(long, global = true)]
    infer_schema: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// LLM provider (openai, ollama, mock)
    #[arg(short, long, global = true, env = "LUMEN_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "LUMEN_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Interactive chat session
    Chat(ChatCommand),

    /// Ask a single question
    Ask(AskCommand),

    /// Filter the catalog with a JSON filter spec
    Filter(FilterCommand),

    /// Show the catalog schema
    Schema(SchemaCommand),

    /// List available prompts
    Prompts(PromptsCommand),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Chat(_) => "chat",
            Commands::Ask(_) => "ask",
            Commands::Filter(_) => "filter",
            Commands::Schema(_) => "schema",
            Commands::Prompts(_) => "prompts",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Load base configuration from environment and the default config file
    let mut config = AppConfig::load().context("Failed to load configuration")?;

    // A config file given only on the command line still needs merging
    if let Some(ref path) = cli.config {
        if config.config_file.as_ref() != Some(path) {
            config = config
                .merge_yaml(path)
                .with_context(|| format!("Failed to load config file {:?}", path))?;
        }
    }

    // Apply CLI overrides
    let config = config.with_overrides(ConfigOverrides {
        workspace: cli.workspace,
        config_file: cli.config,
        provider: cli.provider,
        model: cli.model,
        catalog: cli.catalog,
        log_level: cli.log_level,
        infer_schema: cli.infer_schema,
        verbose: cli.verbose,
        no_color: cli.no_color,
    });

    // Initialize logging with final configuration
    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("Lumen CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    let command_name = cli.command.name();
    let _span = tracing::info_span!("command", name = command_name).entered();

    // Route to command handlers
    let result = match cli.command {
        Commands::Chat(cmd) => cmd.execute(&config).await,
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Filter(cmd) => cmd.execute(&config).await,
        Commands::Schema(cmd) => cmd.execute(&config).await,
        Commands::Prompts(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result.with_context(|| format!("lumen {} failed", command_name))
}
