use anyhow::{Context, Result};
use futures_util::StreamExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub mod cache;
pub mod error;
pub mod fixed;
pub mod logging;
mod paths;
pub mod record;
pub mod resolver;
pub mod server;
pub mod settings;
pub mod sources;
#[cfg(test)]
mod test_util;
pub mod tts;

pub use cache::WordCache;
pub use error::LookupError;
pub use fixed::FixedTable;
pub use record::{PartialRecord, WordRecord};
pub use resolver::{FixedEnrichment, Resolver, ResolverOptions};
pub use sources::{Source, SourceFuture, SourceRole};

const CLI_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub words: Vec<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub settings_path: Option<String>,
}

/// Serves HTTP when no words are given; otherwise resolves each word and
/// prints one JSON record per line.
pub async fn run(config: Config) -> Result<()> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let mut settings = settings::load_settings(settings_path)?;
    if let Some(host) = config.host {
        settings.host = host;
    }
    if let Some(port) = config.port {
        settings.port = port;
    }

    let resolver = Arc::new(build_resolver(&settings).await?);
    if config.words.is_empty() {
        let addr = format!("{}:{}", settings.host, settings.port);
        return server::run_server(resolver, addr).await;
    }

    for line in lookup_lines(&resolver, config.words).await {
        println!("{}", line);
    }
    resolver.shutdown().await;
    Ok(())
}

/// Resolves `words` with bounded concurrency and returns one JSON line per
/// resolved word, in input order. Invalid words are logged and skipped.
pub async fn lookup_lines(resolver: &Arc<Resolver>, words: Vec<String>) -> Vec<String> {
    let mut results = futures_util::stream::iter(words)
        .map(|word| {
            let resolver = resolver.clone();
            async move {
                let result = resolver.resolve(&word).await;
                (word, result)
            }
        })
        .buffered(CLI_CONCURRENCY);
    let mut lines = Vec::new();
    while let Some((word, result)) = results.next().await {
        match result.map(|record| serde_json::to_string(&record)) {
            Ok(Ok(line)) => lines.push(line),
            Ok(Err(err)) => warn!("failed to encode '{}': {}", word, err),
            Err(err) => warn!("skipping '{}': {}", word, err),
        }
    }
    lines
}

/// Loads the fixed table and cache described by `settings` and wires the
/// configured sources into a [`Resolver`].
pub async fn build_resolver(settings: &settings::Settings) -> Result<Resolver> {
    let client = sources::build_client(Duration::from_millis(settings.source_timeout_ms))?;

    let mut fixed = FixedTable::empty();
    if let Some(url) = settings.fixed_url.as_deref() {
        match FixedTable::fetch(&client, url).await {
            Ok(remote) => fixed.extend(remote),
            Err(err) => warn!("failed to fetch fixed words from {}: {:#}", url, err),
        }
    }
    if let Some(path) = settings.fixed_path() {
        let local = FixedTable::load_file(&path)
            .with_context(|| format!("failed to load fixed words: {}", path.display()))?;
        fixed.extend(local);
    }

    let cache = match settings.cache_path() {
        Some(path) => WordCache::open(
            path,
            settings.cache_limit,
            Duration::from_millis(settings.cache_flush_ms),
        )
        .await
        .with_context(|| "failed to open word cache")?,
        None => WordCache::in_memory(settings.cache_limit),
    };

    let sources = sources::build_sources(settings, &client)?;
    Ok(Resolver::new(
        Arc::new(cache),
        Arc::new(fixed),
        sources,
        ResolverOptions::from_settings(settings),
    ))
}
