//! Delete command - remove one stored session.

use anyhow::Result;
use clap::Args;
use console::Style;
use serde::Serialize;

use super::{Context, parse_session_id};

/// Arguments for the delete command.
#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Session id
    pub id: String,
}

#[derive(Debug, Serialize)]
struct DeleteOutput {
    id: String,
    existed: bool,
}

/// Run the delete command.
///
/// Deleting an id that is not stored succeeds; the output says so.
pub async fn run(args: DeleteArgs, ctx: &Context) -> Result<()> {
    let id = parse_session_id(&args.id)?;
    let store = ctx.open_store().await?;

    let existed = store.load(&id).await?.is_some();
    store.remove(&id).await?;

    if ctx.json_output {
        let output = DeleteOutput {
            id: id.into_string(),
            existed,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if existed {
        println!("{} Deleted session {}", Style::new().green().apply_to("✓"), id);
    } else {
        println!("{} Session {} was not stored", Style::new().dim().apply_to("·"), id);
    }

    Ok(())
}
