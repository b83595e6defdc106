use expense_dashboard::{AppState, load_settings, resolve_config_path, router};
use std::{env, net::SocketAddr};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config_path = resolve_config_path();
    let settings = load_settings(config_path.as_deref())
        .await
        .with_overrides(|key| env::var(key).ok());
    let port = settings.port;
    info!("summaries from {}", settings.base_url);

    let state = AppState::new(settings)?;
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
