//! Inlet CLI - document ingestion and reindex orchestration.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use inlet_core::Config;

mod commands;
mod logging;

use commands::{cmd_daemon, cmd_ingest, cmd_reindex, cmd_search, cmd_status};
use logging::{init_cli_logging, init_daemon_logging};

#[derive(Parser)]
#[command(name = "inlet")]
#[command(about = "Document ingestion and vector reindex orchestration")]
struct Cli {
  /// Path to the config file (default: the standard config location)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Run the ingestion daemon
  Daemon {
    /// Log to the console instead of the log file
    #[arg(long)]
    foreground: bool,
  },
  /// Run one ingestion pass for a scope and wait for it to finish
  Ingest {
    /// Scope identifier
    scope: String,
  },
  /// Rebuild the vector index for a scope
  Reindex {
    /// Scope identifier
    scope: String,
  },
  /// Search a scope's vector index
  Search {
    /// Scope identifier
    scope: String,
    /// Search query
    query: String,
    #[arg(short, long, default_value = "10")]
    limit: usize,
  },
  /// Show document counts for a scope
  Status {
    /// Scope identifier
    scope: String,
  },
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
  match path {
    Some(p) => Ok(Config::load(p)?),
    None => Ok(Config::load_or_default()),
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();
  let config = load_config(cli.config.as_ref())?;

  match cli.command {
    Commands::Daemon { foreground } => {
      let _guard = init_daemon_logging(&config, foreground);
      cmd_daemon(config).await
    }
    Commands::Ingest { scope } => {
      init_cli_logging();
      cmd_ingest(config, &scope).await
    }
    Commands::Reindex { scope } => {
      init_cli_logging();
      cmd_reindex(config, &scope).await
    }
    Commands::Search { scope, query, limit } => {
      init_cli_logging();
      cmd_search(config, &scope, &query, limit).await
    }
    Commands::Status { scope } => {
      init_cli_logging();
      cmd_status(config, &scope).await
    }
  }
}
