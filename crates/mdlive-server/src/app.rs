//! Router construction.
//!
//! Builds the axum router with all routes and middleware.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::live_reload;
use crate::state::AppState;

/// Create the application router.
///
/// # Arguments
///
/// * `state` - Shared application state
pub(crate) fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/refresh", get(live_reload::refresh_handler))
        .route("/refresh/", get(live_reload::refresh_handler))
        .fallback(handlers::documents::serve_document)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
