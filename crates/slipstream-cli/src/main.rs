mod commands;
mod shutdown;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use slipstream_core::{Config, builtin_signatures, load_signatures};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use commands::ghost::GhostCommand;

#[derive(Parser)]
#[command(name = "slipstream")]
#[command(about = "Live race telemetry and ghost split comparison")]
struct Args {
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Signature table override (JSON); defaults to the built-in table
    #[arg(short, long)]
    signatures: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Attach to the game and track races against the active ghost
    Run,
    /// Scan the signature table and report matches without injecting
    Probe,
    /// Ghost file maintenance
    Ghost {
        #[command(subcommand)]
        command: GhostCommand,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("slipstream=info".parse()?))
        .init();

    let args = Args::parse();

    let config = Config::load_or_default(&args.config);

    let signatures = match &args.signatures {
        Some(path) => {
            let set = load_signatures(path)?;
            info!("Loaded signature table {} from {}", set.version, path.display());
            set
        }
        None => builtin_signatures(),
    };

    match args.command.unwrap_or(Command::Run) {
        Command::Run => {
            info!("Slipstream starting (table {})", signatures.version);
            if let Err(e) = commands::run::execute(config, signatures) {
                warn!("Tracker stopped: {}", e);
                return Err(e);
            }
            Ok(())
        }
        Command::Probe => commands::probe::execute(&config, &signatures),
        Command::Ghost { command } => commands::ghost::execute(command),
    }
}
