//! Show command - print one stored session.

use anyhow::{Result, bail};
use clap::Args;
use console::{Style, style};
use serde::Serialize;
use tessera_session::SessionData;

use super::{Context, parse_session_id};

/// Arguments for the show command.
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Session id
    pub id: String,
}

#[derive(Debug, Serialize)]
struct ShowOutput<'a> {
    id: &'a str,
    data: &'a SessionData,
}

/// Run the show command.
pub async fn run(args: ShowArgs, ctx: &Context) -> Result<()> {
    let id = parse_session_id(&args.id)?;
    let store = ctx.open_store().await?;

    let Some(data) = store.load(&id).await? else {
        bail!("session '{}' not found", id);
    };

    if ctx.json_output {
        let output = ShowOutput {
            id: id.as_str(),
            data: &data,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let dim = Style::new().dim();

    println!();
    println!("{} {}", style("Session").bold(), id);
    println!("{}", dim.apply_to("─".repeat(40)));
    println!();
    if data.is_empty() {
        println!("  {}", dim.apply_to("(empty)"));
    }
    for (key, value) in &data {
        println!("  {} {}", dim.apply_to(format!("{}:", key)), value);
    }
    println!();

    Ok(())
}
