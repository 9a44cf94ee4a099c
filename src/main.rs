mod backend;
mod config;
mod error;
mod routes;
mod services;
mod state;
mod user;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::backend::supabase::SupabaseClient;
use crate::config::{BackendConfig, ServerConfig};
use crate::services::coordinator::AuthCoordinator;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let backend_config = BackendConfig::from_env().expect("invalid backend config");
    let server_config = ServerConfig::from_env().expect("invalid server config");

    let supabase = Arc::new(
        SupabaseClient::connect(&backend_config)
            .await
            .expect("backend client init failed"),
    );
    let auth = AuthCoordinator::start(supabase.clone(), supabase);
    auth.settled().await;
    let user = auth.get_state();
    tracing::info!(authenticated = user.is_authenticated(), email = ?user.email, "session restored");

    let app = routes::app(state::AppState::new(auth));
    let addr = SocketAddr::new(server_config.bind_addr, server_config.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");

    tracing::info!(%addr, "gambito auth listening");
    axum::serve(listener, app).await.expect("server failed");
}
