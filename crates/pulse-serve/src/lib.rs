pub mod config;
pub mod hub;
mod poller;
pub mod routes;
pub mod sse;

use axum::Router;
use config::StreamConfig;
use hub::BroadcastHub;
use pulse_core::OriginStore;
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<BroadcastHub>,
    pub origin: Arc<dyn OriginStore>,
    pub config: StreamConfig,
}

pub fn app(state: AppState) -> Router {
    routes::router(state)
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await
}
