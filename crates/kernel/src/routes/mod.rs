//! HTTP route handlers.

pub mod article;
pub mod health;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::session::create_session_layer;
use crate::state::AppState;

/// Build the application router with its middleware layers.
pub fn app(state: AppState) -> Router {
    let secure_cookies = state.config().cookie_secure;
    Router::new()
        .merge(health::router())
        .merge(article::router())
        // TraceLayer → session → routes
        .layer(create_session_layer(secure_cookies))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
