//! Config command - show the effective configuration.

use anyhow::Result;
use clap::{Args, Subcommand};
use tessera_config::TesseraConfig;

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: Option<ConfigCommand>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration with defaults filled in (default)
    Show,

    /// Show which config files were loaded
    Which,

    /// Show the user config file path
    Path,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command.unwrap_or(ConfigCommand::Show) {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Which => cmd_which(ctx),
        ConfigCommand::Path => cmd_path(ctx),
    }
}

/// Every section present, so the output documents all settings.
fn effective(config: &TesseraConfig) -> TesseraConfig {
    TesseraConfig {
        session: Some(config.session.clone().unwrap_or_default()),
        backend: Some(config.backend()),
        logging: Some(config.logging()),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let config = effective(&ctx.config);

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    println!("# Tessera Configuration\n");
    if ctx.sources.is_empty() {
        println!("# No config files loaded (using defaults)\n");
    } else {
        for source in &ctx.sources {
            println!("# from {}", source.display());
        }
        println!();
    }
    print!("{}", config.to_toml()?);

    Ok(())
}

fn cmd_which(ctx: &Context) -> Result<()> {
    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&ctx.sources)?);
        return Ok(());
    }

    if ctx.sources.is_empty() {
        println!("No config files found. Create ./tessera.toml or use --config.");
    } else {
        println!("Config files (later overrides earlier):\n");
        for source in &ctx.sources {
            println!("  ✓ {}", source.display());
        }
    }

    Ok(())
}

fn cmd_path(ctx: &Context) -> Result<()> {
    match tessera_config::xdg_config_path() {
        Some(path) if ctx.json_output => println!("{}", serde_json::to_string(&path)?),
        Some(path) => println!("{}", path.display()),
        None => println!("Could not determine config directory"),
    }
    Ok(())
}
