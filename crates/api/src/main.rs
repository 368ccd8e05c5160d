use anyhow::Result;
use wayfare_api::{build_router, build_state, AppConfig};
use wayfare_observability::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("wayfare_api");

    let config = AppConfig::from_env();
    let bind = config.bind.clone();
    let state = build_state(config).await?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!(bind = %bind, "wayfare api started");

    axum::serve(listener, app).await?;
    Ok(())
}
