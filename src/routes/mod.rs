pub mod auth;
pub mod pages;
pub mod posts;

use axum::middleware;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::extractors::session_layer;
use crate::state::AppState;

/// The full application router with session handling and request tracing.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(auth::router())
        .merge(pages::router())
        .merge(posts::router())
        .layer(middleware::from_fn_with_state(state.clone(), session_layer))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
