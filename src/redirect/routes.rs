use axum::{routing::get, Router};
use std::sync::Arc;

use super::handlers::{health_check, redirect_identifier, RedirectState};

pub fn create_redirect_router(state: Arc<RedirectState>) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/{identifier}", get(redirect_identifier))
        .with_state(state)
}
