use std::net::SocketAddr;
use std::sync::Arc;

use joinery_core::{DiscoveryConfig, JoinDiscovery};
use joinery_http::{app, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "joinery_core=info,joinery_http=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = DiscoveryConfig::from_env()?;
    let es_url = std::env::var("JOINERY_ES_URL").ok();
    let sketch_url = std::env::var("JOINERY_SKETCH_URL").ok();
    let discovery = JoinDiscovery::connect(es_url.as_deref(), sketch_url.as_deref(), config)?;

    let app = app(AppState {
        discovery: Arc::new(discovery),
    });

    let addr: SocketAddr = std::env::var("JOINERY_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:7000".into())
        .parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "join discovery server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
