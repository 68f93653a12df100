//! List command - enumerate stored sessions.

use anyhow::Result;
use clap::Args;
use console::{Style, style};
use serde::Serialize;
use tessera_config::BackendKind;
use tessera_session::SessionStore;

use super::Context;

/// Arguments for the list command.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Show at most this many ids
    #[arg(short, long)]
    pub limit: Option<usize>,
}

/// List output for JSON.
#[derive(Debug, Serialize)]
struct ListOutput {
    backend: String,
    count: usize,
    sessions: Vec<String>,
}

/// Run the list command.
pub async fn run(args: ListArgs, ctx: &Context) -> Result<()> {
    let backend = ctx.open_backend().await?;
    let kind = backend.kind();
    let location = backend.location();
    let store = SessionStore::new(ctx.config.session_config(), backend.into_shared());

    let mut sessions: Vec<String> = store
        .list_sessions()
        .await
        .into_iter()
        .map(|id| id.into_string())
        .collect();
    sessions.sort();
    let count = sessions.len();
    if let Some(limit) = args.limit {
        sessions.truncate(limit);
    }

    if ctx.json_output {
        let output = ListOutput {
            backend: location,
            count,
            sessions,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let dim = Style::new().dim();

    println!();
    println!("{}", style("Stored Sessions").bold());
    println!("{}", dim.apply_to("─".repeat(40)));
    println!();
    for id in &sessions {
        println!("  {}", id);
    }
    if sessions.len() < count {
        println!("  {}", dim.apply_to(format!("... and {} more", count - sessions.len())));
    }
    if count == 0 {
        println!("  {}", dim.apply_to("No sessions found"));
        if kind == BackendKind::Memory {
            println!(
                "  {}",
                dim.apply_to("The in-process backend keeps nothing between invocations")
            );
        } else if ctx.verbose {
            println!(
                "  {}",
                dim.apply_to("Listing needs memcached's lru_crawler; older servers report nothing")
            );
        }
    }
    println!();
    println!("  {} {}", dim.apply_to("Backend:"), location);
    println!("  {} {}", dim.apply_to("Total:"), count);
    println!();

    Ok(())
}
