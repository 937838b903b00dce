//! CLI entry point for agh

use std::path::PathBuf;

use agh_channels::channel_workers;
use agh_core::config::{Config, ConfigLoader};
use agh_core::core::Core;
use agh_core::heartbeat::HeartbeatWorker;
use agh_core::logging::init_logging;
use agh_core::protocol::{Arg, Command};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use tracing::info;

#[derive(Parser)]
#[command(name = "agh")]
#[command(about = "Agent coordinating worker threads over a private command bus")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration directory
    #[arg(short, long, global = true)]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent until SIGINT or a `quit` command
    Run,
    /// Parse one command line and show the result
    Check {
        /// Command text, e.g. 'AT = ( 1, "ping" )'
        text: String,
        /// Source tag to attach, e.g. CONSOLE=stdin
        #[arg(short, long)]
        from: Option<String>,
    },
    /// Print the effective configuration
    Config,
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_loader = if let Some(dir) = cli.config_dir {
        ConfigLoader::with_dir(dir)
    } else {
        ConfigLoader::new()
    };

    match cli.command {
        Commands::Run => run_agent(&config_loader),
        Commands::Check { text, from } => run_check(&config_loader, &text, from.as_deref()),
        Commands::Config => run_config(&config_loader),
        Commands::Init { force } => run_init(&config_loader, force),
    }
}

/// Run the agent with the workers enabled in config
fn run_agent(loader: &ConfigLoader) -> Result<()> {
    let config = loader.load()?;
    let _log_guard = init_logging(&config.logging);

    // Stdout belongs to the console channel.
    eprintln!("{}", style("Starting AGH...").bold().cyan());
    eprintln!("Config directory: {}", loader.config_dir().display());

    let mut core = Core::new(config.clone()).context("failed to build the core")?;
    for worker in channel_workers(&config) {
        core.register_thread(worker);
    }
    if config.heartbeat.enabled {
        core.register_thread(Box::new(HeartbeatWorker::new(config.heartbeat.clone())));
    }

    eprintln!(
        "{}",
        style("AGH is running. Press Ctrl+C to stop.").green()
    );
    core.run()?;

    info!("Agent stopped");
    eprintln!("{}", style("AGH stopped.").green());
    Ok(())
}

/// Parse `text` with the configured limits
fn run_check(loader: &ConfigLoader, text: &str, from: Option<&str>) -> Result<()> {
    let config = loader.load()?;
    let command = match Command::parse_with(text, from, &config.protocol) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{} {}", style("rejected:").red().bold(), e);
            bail!("command rejected");
        }
    };

    println!("{}", style("accepted").green().bold());
    println!("  id: {}", command.id());
    println!("  operation: {}", command.operation());
    for (i, arg) in command.args().iter().enumerate() {
        println!("  arg {}: {} {}", i + 1, arg.kind_name(), describe(arg));
    }
    if let Some(source) = command.source() {
        println!(
            "  source: {} (channel {}, address {})",
            source,
            source.channel(),
            source.address()
        );
    }
    Ok(())
}

fn describe(arg: &Arg) -> String {
    match arg {
        Arg::Str(s) => format!("{:?}", s),
        other => other.to_string(),
    }
}

fn run_config(loader: &ConfigLoader) -> Result<()> {
    let config = loader.load()?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn run_init(loader: &ConfigLoader, force: bool) -> Result<()> {
    let path = loader.config_path();
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    loader.save(&Config::default())?;
    println!(
        "{} {}",
        style("Configuration written to").green(),
        path.display()
    );
    Ok(())
}
