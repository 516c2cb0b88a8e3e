//! Document server binary.

use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clinica_docs::{documents_router, AppState, DocsConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("clinica_docs=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = DocsConfig::from_env()?;
    let addr = config.addr();
    tracing::info!(%addr, clinic = config.clinic_name(), "Starting document server");

    let app = documents_router(AppState::new(config)).layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
