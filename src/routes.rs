use axum::{Router, routing::get};

use crate::AppState;
use crate::handlers;

/// Create the server routes: the bare root plus a wildcard for everything
/// beneath it.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::serve_root))
        .route("/{*path}", get(handlers::serve_path))
}
