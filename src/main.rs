use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use promptforge::config::Config;
use promptforge::routes;
use promptforge::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("promptforge=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env();
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    if config.api_key.is_none() {
        tracing::warn!("OPENROUTER_API_KEY not set; pro tier will serve deterministic fallbacks");
    }
    tracing::info!(
        models = ?config.models,
        rate_limit_max = config.rate_limit_max,
        "starting promptforge"
    );

    let state = Arc::new(AppState::new(config)?);
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
