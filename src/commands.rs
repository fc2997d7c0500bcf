//! CLI command handlers. Each returns the JSON document printed on stdout.

use anyhow::{Context, Result};
use mediahub_core::{
    EngineConfig, ExtractError, FetchClient, GenericExtractor, RedirectChainExtractor,
    RequestContext, Stream, StreamExtractor, build_default_provider_manager,
};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cli::{Command, ExtractMode};

/// Runs one command against a freshly built engine.
pub async fn run_command(
    command: &Command,
    config: &EngineConfig,
    ctx: &RequestContext,
) -> Result<Value> {
    if let Command::Extract { url, mode } = command {
        return run_extract(url, *mode, config, ctx).await;
    }

    let manager = build_default_provider_manager(config)?;
    debug!(?manager, "Engine ready");

    let value = match command {
        Command::Providers => serde_json::to_value(manager.get_stats())?,
        Command::Posts { filter, page } => {
            serde_json::to_value(manager.list_all_posts(filter, *page, ctx).await?)?
        }
        Command::Search { query, page } => {
            serde_json::to_value(manager.search_all(query, *page, ctx).await?)?
        }
        Command::Meta { link, provider } => serde_json::to_value(
            manager
                .get_metadata_with_fallback(link, provider.as_deref(), ctx)
                .await?,
        )?,
        Command::Streams { link, kind } => {
            let streams = manager.get_streams_from_all(link, *kind, ctx).await?;
            info!(count = streams.len(), "Collected candidate streams");
            serde_json::to_value(streams)?
        }
        Command::Episodes { url, provider } => serde_json::to_value(
            manager
                .get_episodes_with_fallback(url, provider.as_deref(), ctx)
                .await?,
        )?,
        Command::Extract { .. } => Value::Null,
    };
    Ok(value)
}

async fn run_extract(
    url: &str,
    mode: ExtractMode,
    config: &EngineConfig,
    ctx: &RequestContext,
) -> Result<Value> {
    let client = FetchClient::with_settings(&config.fetch_settings())?;
    let extractor: Box<dyn StreamExtractor> = match mode {
        ExtractMode::Generic => Box::new(GenericExtractor::new(client)),
        ExtractMode::Redirect => Box::new(RedirectChainExtractor::new(client)),
    };
    let streams = keep_on_cancel(extractor.extract(url, ctx).await)
        .with_context(|| format!("{} extractor failed for {url}", extractor.name()))?;
    info!(count = streams.len(), extractor = extractor.name(), "Extraction finished");
    Ok(serde_json::to_value(streams)?)
}

/// An interrupted extraction prints an empty list instead of failing.
fn keep_on_cancel(result: Result<Vec<Stream>, ExtractError>) -> Result<Vec<Stream>, ExtractError> {
    match result {
        Err(error) if error.is_cancelled() => {
            warn!("Extraction interrupted; no streams collected");
            Ok(Vec::new())
        }
        other => other,
    }
}
