//! Tessera - administration CLI for server-side sessions
//!
//! Main entry point for the Tessera CLI.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tessera_config::LoggingSection;
use tracing_appender::non_blocking::WorkerGuard;

mod backend;
mod commands;

use commands::{config, delete, list, ping, show};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Tessera - inspect and manage server-side sessions
#[derive(Parser)]
#[command(name = "tessera")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Config file to use instead of discovery
    #[arg(long, global = true, env = "TESSERA_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List stored session ids
    List(list::ListArgs),

    /// Print the data stored for a session
    Show(show::ShowArgs),

    /// Delete a stored session
    Delete(delete::DeleteArgs),

    /// Check that the cache backend answers
    Ping(ping::PingArgs),

    /// Show the effective configuration
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, sources, warnings) = match cli.config {
        Some(ref path) => {
            let config = tessera_config::load_config_file(path)
                .with_context(|| format!("loading {}", path.display()))?;
            (config, vec![path.clone()], Vec::new())
        }
        None => {
            let loaded = tessera_config::load_config(None)?;
            let sources = loaded
                .loaded_from()
                .into_iter()
                .map(PathBuf::from)
                .collect();
            (loaded.config, sources, loaded.warnings)
        }
    };

    let _guard = init_tracing(&config.logging(), cli.verbose);
    for warning in &warnings {
        tracing::warn!("{}", warning);
    }

    let ctx = commands::Context {
        config,
        sources,
        json_output: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::List(args) => list::run(args, &ctx).await,
        Commands::Show(args) => show::run(args, &ctx).await,
        Commands::Delete(args) => delete::run(args, &ctx).await,
        Commands::Ping(args) => ping::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}

/// Our crates; log directives name each of them explicitly.
const LOG_TARGETS: [&str; 4] = ["tessera", "tessera_session", "tessera_memcache", "tessera_config"];

/// `target=level,...` directives for our crates followed by `default`.
fn filter_directives(level: &str, default: &str) -> String {
    let mut directives: Vec<String> = LOG_TARGETS
        .iter()
        .map(|target| format!("{}={}", target, level))
        .collect();
    directives.push(default.to_string());
    directives.join(",")
}

/// Console logs go to stderr so `--json` output on stdout stays parseable.
/// A JSON log file is added when `[logging] dir` is set.
fn init_tracing(logging: &LoggingSection, verbose: bool) -> Option<WorkerGuard> {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::prelude::*;

    let level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = filter_directives(level, "warn");
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter));

    let (file_layer, guard) = match logging.dir {
        Some(ref dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "tessera.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(EnvFilter::new(filter_directives("trace", "info")));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .with(file_layer)
        .init();

    guard
}
