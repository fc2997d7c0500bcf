//! CLI entry point for mediahub.

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use mediahub_core::{EngineConfig, RequestContext};
use tracing::{debug, info, warn};

mod app_config;
mod cli;
mod commands;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // stdout carries the JSON result
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let config = resolve_engine_config(&args)?;
    debug!(?config, "Engine configuration resolved");

    let ctx = RequestContext::new();
    let interrupt = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; cancelling in-flight requests");
            interrupt.cancel();
        }
    });

    let output = commands::run_command(&args.command, &config, &ctx).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);

    if ctx.is_cancelled() {
        info!("Printed partial results after interruption");
    }
    Ok(())
}

/// Defaults, then the config file, then environment, then CLI flags.
fn resolve_engine_config(args: &Args) -> Result<EngineConfig> {
    let mut config = EngineConfig::default();
    if let Some(file) = app_config::load_file_config(args.config.as_deref())? {
        debug!("Applying config file values");
        file.apply_to(&mut config);
    }
    app_config::apply_env_overrides(&mut config, app_config::env_lookup);
    if let Some(url) = &args.config_url {
        config.config_url.clone_from(url);
    }
    if let Some(secs) = args.timeout {
        config.provider_timeout = Duration::from_secs(secs);
    }
    Ok(config)
}
