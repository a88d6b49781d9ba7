//! rack-admin - user-management service
//!
//! Runs the privileged endpoints with the backend's service-role key.

use rack_admin::{AppState, Config, app, cors_layer};
use rack_client::AdminClient;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("rack_admin=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        environment = %config.environment,
        port = config.http_port,
        backend = %config.client.url,
        version = env!("CARGO_PKG_VERSION"),
        "Starting rack-admin"
    );

    let state = match AdminClient::new(config.client.clone()) {
        Ok(client) => AppState::new(Arc::new(client)),
        Err(e) if config.is_development() => {
            tracing::warn!(error = %e, "Admin client unavailable, admin endpoints disabled");
            AppState::without_admin()
        }
        Err(e) => return Err(e.into()),
    };

    let cors = cors_layer(config.cors_origin.as_deref())?;
    let router = app(state, cors);

    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}
