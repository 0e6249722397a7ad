use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use super::handlers::{
    click_beacon, create_bulk, create_bulk_public, create_link, create_link_public, delete_link,
    get_link, health_check, link_analytics, list_links, owner_stats, update_link, AppState,
};

pub fn create_api_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/links", post(create_link).get(list_links))
        .route("/links/public", post(create_link_public))
        .route("/links/bulk", post(create_bulk))
        .route("/links/bulk/public", post(create_bulk_public))
        .route(
            "/links/{identifier}",
            get(get_link).put(update_link).delete(delete_link),
        )
        .route("/links/{identifier}/click", post(click_beacon))
        .route("/links/{identifier}/analytics", get(link_analytics))
        .route("/stats", get(owner_stats))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
