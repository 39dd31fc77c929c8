use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::Router;
use common::utils::logging::init_logging_default;
use configs::SyncStrategy;
use dotenvy::dotenv;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::routes::{self, ServerState};
use service::overrides::{BlobOverrideStore, GithubOverrideStore, OverrideStore};
use service::quotes::QuoteProxy;

/// Initialize logging via shared common utils
fn init_logging() {
    init_logging_default();
}

fn build_cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

/// Shared outbound client, built once at boot. Per-call timeouts tighten the
/// client-wide cap; requests without one (the blob write) still stay bounded.
fn build_outbound_client() -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .user_agent(concat!("override-sync/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(30))
        .build()?)
}

/// Select the configured storage strategy. Exactly one is active per
/// deployment; callers of the HTTP contract cannot tell which.
fn build_store(
    client: &reqwest::Client,
    sync: &configs::SyncConfig,
) -> Arc<dyn OverrideStore> {
    match sync.strategy {
        SyncStrategy::Blob => {
            Arc::new(BlobOverrideStore::new(client.clone(), sync.blob.clone()))
        }
        SyncStrategy::Github => {
            Arc::new(GithubOverrideStore::new(client.clone(), sync.github.clone()))
        }
    }
}

/// Public entry: build the app and run the HTTP server
pub async fn run() -> anyhow::Result<()> {
    dotenv().ok();
    init_logging();

    let mut cfg = configs::load_default().unwrap_or_default();
    cfg.normalize_and_validate()?;

    let client = build_outbound_client()?;
    let store = build_store(&client, &cfg.sync);
    info!(strategy = ?cfg.sync.strategy, "override store ready");

    let state = ServerState {
        store,
        quotes: QuoteProxy::new(client, cfg.quotes.clone()),
    };

    let app: Router = routes::build_router(build_cors(), state);

    let addr: SocketAddr = format!("{}:{}", cfg.server.host, cfg.server.port).parse()?;
    info!(%addr, "starting override sync proxy");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
