//! Ping command - check the backend answers.

use std::time::Instant;

use anyhow::Result;
use clap::Args;
use console::{Style, style};
use serde::Serialize;
use tessera_config::BackendKind;

use super::Context;
use crate::backend::OpenedBackend;

/// Arguments for the ping command.
#[derive(Args, Debug)]
pub struct PingArgs {}

#[derive(Debug, Serialize)]
struct PingOutput {
    ok: bool,
    backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    latency_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Run the ping command.
///
/// Exits non-zero when the backend cannot be reached.
pub async fn run(_args: PingArgs, ctx: &Context) -> Result<()> {
    let section = ctx.config.backend();
    let location = match section.kind {
        BackendKind::Memory => "in-process".to_string(),
        BackendKind::Memcache => section.address,
    };
    let started = Instant::now();

    match probe(ctx).await {
        Ok((backend, version)) => {
            let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
            let output = PingOutput {
                ok: true,
                backend: backend.location(),
                version,
                latency_ms: Some(latency_ms),
                error: None,
            };
            if ctx.json_output {
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                let dim = Style::new().dim();
                println!();
                println!("{}", style("Backend Status").bold());
                println!("{}", dim.apply_to("─".repeat(40)));
                println!();
                let status = Style::new().green().apply_to("● reachable");
                println!("  {} {}", dim.apply_to("Status:"), status);
                println!("  {} {}", dim.apply_to("Backend:"), output.backend);
                if let Some(ref version) = output.version {
                    println!("  {} {}", dim.apply_to("Version:"), version);
                }
                println!("  {} {:.2} ms", dim.apply_to("Latency:"), latency_ms);
                println!();
            }
            Ok(())
        }
        Err(e) => {
            if ctx.json_output {
                let output = PingOutput {
                    ok: false,
                    backend: location,
                    version: None,
                    latency_ms: None,
                    error: Some(format!("{:#}", e)),
                };
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                let dim = Style::new().dim();
                println!();
                println!("{}", style("Backend Status").bold());
                println!("{}", dim.apply_to("─".repeat(40)));
                println!();
                let status = Style::new().red().apply_to("● unreachable");
                println!("  {} {}", dim.apply_to("Status:"), status);
                println!("  {} {}", dim.apply_to("Backend:"), location);
                println!();
            }
            Err(e)
        }
    }
}

/// Open the backend and make one read round-trip. A miss is a success.
async fn probe(ctx: &Context) -> Result<(OpenedBackend, Option<String>)> {
    let backend = ctx.open_backend().await?;
    let session = ctx.config.session_config();
    backend.as_cache().get(&session.backend_key("ping")).await?;

    let version = match backend {
        OpenedBackend::Memcache(ref memcache) => Some(memcache.version().await?),
        OpenedBackend::Memory(_) => None,
    };
    Ok((backend, version))
}
