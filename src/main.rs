mod api;
mod config;
mod dispatcher;
mod error;
mod filters;
mod logging;
mod lookup;
mod openapi;
mod polling;
mod renderer;
mod server;
mod state;
mod store;
mod supervisor;
mod vendor;

use anyhow::{Context, Result};
use log::{error, info};
use state::AppState;
use std::net::SocketAddr;

/// Generate a secure random auth token for the host-to-core `/dispatch` gate.
fn generate_auth_token() -> String {
    use rand::Rng;
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}

/// Binds and serves the REST API on the loopback interface (or `BIND_ADDR`
/// if set), returning once the server has shut down.
async fn run_server(app_state: std::sync::Arc<AppState>) -> Result<()> {
    use tokio::net::TcpListener;

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:0".to_string());
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    let actual_addr: SocketAddr = listener.local_addr().context("failed to read local address")?;

    let app = server::create_router(app_state.clone());

    info!("REST API server listening on http://{actual_addr}");
    info!("  GET  http://{actual_addr}/health - health check (no auth)");
    info!("  GET  http://{actual_addr}/openapi.json - OpenAPI spec (no auth)");
    info!("  POST http://{actual_addr}/dispatch - dispatch action (requires Bearer token)");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal(app_state))
        .await
        .context("server error")
}

async fn shutdown_signal(app_state: std::sync::Arc<AppState>) {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
    app_state.supervisor.shutdown();
}

#[tokio::main]
async fn main() {
    logging::init_logging();
    info!("alert-ingest-core starting...");

    let app_config = config::load_config();
    let credentials = config::load_credentials();

    let (client_id, client_secret) = match credentials {
        Some(c) => (c.client_id, c.client_secret),
        None => {
            info!("VENDOR_CLIENT_ID/VENDOR_CLIENT_SECRET not set; polling will stay dormant until configured");
            (String::new(), String::new())
        }
    };

    if !config::is_valid_vendor_url(&app_config.vendor.url) {
        info!("no valid vendor URL configured; the dispatcher will serve from an empty cache until configured");
    } else if client_id.is_empty() || client_secret.is_empty() {
        info!("vendor URL configured but credentials are missing; polling will refuse to start until both are set");
    }

    let auth_token = generate_auth_token();
    info!("generated REST API auth token");

    let app_state = AppState::new(auth_token, app_config, client_id, client_secret);
    app_state.supervisor.startup();

    if let Err(e) = run_server(app_state).await {
        error!("failed to run REST API server: {e:#}");
        std::process::exit(1);
    }
}
