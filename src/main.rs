use std::sync::Arc;

use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use iptv_ingest::config::{Config, StoreKind};
use iptv_ingest::db::{create_pool, health_check, run_migrations, MemoryStore, PgStore, PlaylistStore};
use iptv_ingest::models::PlaylistSnapshot;
use iptv_ingest::services::fetcher::HttpFetcher;
use iptv_ingest::services::metrics;
use iptv_ingest::services::sync::{SyncError, SyncPolicy};

fn usage() -> ! {
    eprintln!("usage: iptv-ingest <playlist-url | playlist-id>...");
    std::process::exit(2);
}

fn is_url(arg: &str) -> bool {
    url::Url::parse(arg)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Add URLs, sync ids
async fn sync_one(policy: &SyncPolicy, arg: &str) -> Result<PlaylistSnapshot, SyncError> {
    if is_url(arg) {
        policy.add_playlist(arg, None).await
    } else {
        policy.get_playlist(arg).await
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "iptv_ingest=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        usage();
    }

    let config = Config::from_env();
    tracing::info!("Starting iptv-ingest v{}", env!("CARGO_PKG_VERSION"));

    let store: Arc<dyn PlaylistStore> = match config.store {
        StoreKind::Postgres => {
            let pool = create_pool(&config).await?;
            run_migrations(&pool).await?;
            if !health_check(&pool).await {
                anyhow::bail!("database health check failed");
            }
            Arc::new(PgStore::new(pool))
        }
        StoreKind::Memory => {
            tracing::warn!("Using in-memory store, nothing survives this process");
            Arc::new(MemoryStore::new())
        }
    };

    let fetcher = Arc::new(HttpFetcher::from_config(&config));
    let policy = SyncPolicy::from_config(&config, store, fetcher);

    let results =
        futures::future::join_all(args.iter().map(|arg| sync_one(&policy, arg))).await;

    let mut failures = 0;
    for (arg, result) in args.iter().zip(results) {
        match result {
            Ok(snapshot) => {
                let state = policy.state_of(&snapshot.header.id).await.ok();
                let summary = json!({
                    "id": snapshot.header.id,
                    "name": snapshot.header.name,
                    "url": snapshot.header.url,
                    "lastUpdated": snapshot.header.last_updated,
                    "epgUrl": snapshot.header.epg_url,
                    "state": state,
                    "channels": snapshot.playlist.channels.len(),
                    "groups": snapshot.playlist.groups.len(),
                    "programs": snapshot.playlist.programs.len(),
                });
                println!("{}", summary);
            }
            Err(e) => {
                failures += 1;
                tracing::error!("Failed to sync {}: {}", arg, e);
            }
        }
    }

    tracing::debug!("metrics" = %metrics::render(), "Run finished");

    if failures == args.len() {
        anyhow::bail!("no playlist could be synced");
    }
    Ok(())
}
