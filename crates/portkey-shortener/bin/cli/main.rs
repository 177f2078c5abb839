mod cli;

use crate::cli::{Command, LogFormatArg, CLI};
use anyhow::Context;
use clap::Parser;
use portkey_cache::LruCache;
use portkey_generator::{CodeSpace, CodeSpaceSettings};
use portkey_core::StorageError;
use portkey_records::{Namespace, Records};
use portkey_shortener::{ShortenerError, ShortenerService, ShortenerSettings};
use portkey_storage::RedisStore;
use serde_json::json;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// How long to wait for background counter updates before exiting.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Exit status when the backing store was slow or unreachable (EX_UNAVAILABLE).
const EXIT_UPSTREAM: u8 = 69;

fn init_tracing(format: LogFormatArg) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormatArg::Text => subscriber.init(),
        LogFormatArg::Json => subscriber.json().init(),
    }
}

fn secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Whether `err` was caused by the backing store rather than the request.
fn is_upstream(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<ShortenerError>()
            .is_some_and(ShortenerError::is_upstream)
            || cause
                .downcast_ref::<StorageError>()
                .is_some_and(StorageError::is_transient)
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = CLI::parse();
    init_tracing(config.log_format);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:?}");
            if is_upstream(&e) {
                ExitCode::from(EXIT_UPSTREAM)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

async fn run(config: CLI) -> anyhow::Result<()> {
    info!(
        environment = %config.environment,
        code_width = config.code_width,
        cache_capacity = config.cache_capacity,
        log_format = %config.log_format,
        "starting portkey"
    );

    let store = RedisStore::connect(
        &config.redis_url,
        Duration::from_millis(config.store_timeout_ms),
    )
    .await
    .context("failed to connect to the backing store")?;

    let space = CodeSpace::new(
        CodeSpaceSettings::builder()
            .alphabet(config.alphabet.as_str())
            .width(config.code_width)
            .build(),
    )
    .context("invalid code space configuration")?;

    let records = Records::new(
        Arc::new(store),
        LruCache::new(
            config.cache_capacity,
            Duration::from_secs(config.cache_expiration_secs),
        ),
        Namespace::new(&config.environment),
    );
    let service = ShortenerService::new(
        records,
        ShortenerSettings::builder()
            .space(space)
            .default_ttl(secs(config.default_ttl_secs))
            .build(),
    );

    if config.build_pool {
        let available = service.build_pool().await?;
        info!(available, "code pool ready");
    }

    let output = match config.command {
        Command::Mint { url, ttl_secs } => {
            let code = service.mint(&url, ttl_secs.and_then(secs)).await?;
            json!({ "code": code, "url": url })
        }
        Command::Set {
            code,
            url,
            ttl_secs,
        } => {
            service.set(&code, &url, ttl_secs.and_then(secs)).await?;
            json!({ "code": code, "url": url })
        }
        Command::Resolve { code } => {
            let url = service.resolve(&code).await?;
            json!({ "code": code, "url": url })
        }
        Command::Delete { code } => {
            let deleted = service.delete(&code).await?;
            json!({ "code": code, "deleted": deleted })
        }
        Command::Stats => serde_json::to_value(service.stats().await?)?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);

    if !service.drain(DRAIN_TIMEOUT).await {
        warn!("exiting with counter updates still pending");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_outages_are_upstream_failures() {
        let timeout = anyhow::Error::from(ShortenerError::Storage(StorageError::Timeout(
            "get".into(),
        )));
        assert!(is_upstream(&timeout));

        let refused: anyhow::Result<()> =
            Err(StorageError::Unavailable("connection refused".into()).into());
        let refused = refused
            .context("failed to connect to the backing store")
            .unwrap_err();
        assert!(is_upstream(&refused));
    }

    #[test]
    fn bad_requests_are_not_upstream_failures() {
        let not_found = anyhow::Error::from(ShortenerError::NotFound("abcd".into()));
        assert!(!is_upstream(&not_found));

        let corrupt = anyhow::Error::from(ShortenerError::Storage(StorageError::InvalidData(
            "nan".into(),
        )));
        assert!(!is_upstream(&corrupt));
    }
}
