pub mod error;
pub mod events;
pub mod health;

use crate::AppState;
use axum::http::Method;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers(Any);

    let api = Router::new()
        .merge(events::router(state.clone()))
        .merge(health::router(state))
        .layer(cors);

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
}
