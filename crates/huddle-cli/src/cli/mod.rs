//! CLI entry and dispatch.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use huddle_core::{config, interrupt, logging};

mod commands;

#[derive(Parser)]
#[command(name = "huddle")]
#[command(version)]
#[command(about = "Ask the huddle research agent from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Write logs to this file instead of stderr (filter with HUDDLE_LOG)
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Ask a question and stream the answer
    Ask(commands::ask::AskArgs),

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
    /// Print the effective configuration
    Show,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = config::Config::load().context("load config")?;
    let log_file = cli.log_file.as_deref().or(config.log_file.as_deref());
    let _log_guard = logging::init(log_file)?;

    interrupt::init()?;

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli.command, &config).await })
}

async fn dispatch(command: Commands, config: &config::Config) -> Result<()> {
    match command {
        Commands::Ask(args) => commands::ask::run(args, config).await,
        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
            ConfigCommands::Show => commands::config::show(config),
        },
    }
}
