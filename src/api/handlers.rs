use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::analytics::{AnalyticsAggregator, LinkAnalytics};
use crate::models::{CreateLinkRequest, Link, LinkPatch, OwnerStats};
use crate::redirect::handlers::click_request_from;
use crate::service::{LinkService, ServiceError};

use super::auth::Owner;

/// Per-call caps on bulk creation.
pub const BULK_LIMIT: usize = 100;
pub const BULK_LIMIT_ANONYMOUS: usize = 50;

pub struct AppState {
    pub service: Arc<LinkService>,
    pub analytics: Arc<AnalyticsAggregator>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// One entry of a bulk-create response: either the created link or the
/// per-item error, never both.
#[derive(Debug, Serialize)]
pub struct BulkItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<Link>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_response(err: ServiceError) -> ApiError {
    let status = match &err {
        ServiceError::InvalidUrl | ServiceError::InvalidAlias => StatusCode::BAD_REQUEST,
        ServiceError::AliasTaken => StatusCode::CONFLICT,
        ServiceError::NotFound | ServiceError::NotFoundOrForbidden => StatusCode::NOT_FOUND,
        ServiceError::GenerationExhausted => StatusCode::INTERNAL_SERVER_ERROR,
        ServiceError::Internal(e) => {
            tracing::error!(error = %e, "request failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "internal error".to_string(),
                }),
            );
        }
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

/// Create a link owned by the caller.
pub async fn create_link(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Json(payload): Json<CreateLinkRequest>,
) -> Result<(StatusCode, Json<Link>), ApiError> {
    let link = state
        .service
        .create_link(payload, Some(owner))
        .await
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(link)))
}

/// Create an anonymous (ownerless) link.
pub async fn create_link_public(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateLinkRequest>,
) -> Result<(StatusCode, Json<Link>), ApiError> {
    let link = state
        .service
        .create_link(payload, None)
        .await
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(link)))
}

async fn bulk_create(
    state: &AppState,
    payload: Vec<CreateLinkRequest>,
    owner: Option<String>,
    cap: usize,
) -> Result<Json<Vec<BulkItem>>, ApiError> {
    if payload.len() > cap {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!("bulk requests are limited to {cap} items"),
            }),
        ));
    }

    let items = state
        .service
        .create_bulk(payload, owner)
        .await
        .into_iter()
        .map(|result| match result {
            Ok(link) => BulkItem {
                link: Some(link),
                error: None,
            },
            Err(err) => BulkItem {
                link: None,
                error: Some(err.to_string()),
            },
        })
        .collect();

    Ok(Json(items))
}

pub async fn create_bulk(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Json(payload): Json<Vec<CreateLinkRequest>>,
) -> Result<Json<Vec<BulkItem>>, ApiError> {
    bulk_create(&state, payload, Some(owner), BULK_LIMIT).await
}

pub async fn create_bulk_public(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Vec<CreateLinkRequest>>,
) -> Result<Json<Vec<BulkItem>>, ApiError> {
    bulk_create(&state, payload, None, BULK_LIMIT_ANONYMOUS).await
}

pub async fn list_links(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Link>>, ApiError> {
    let links = state
        .service
        .list_links(&owner, query.limit, query.offset)
        .await
        .map_err(error_response)?;
    Ok(Json(links))
}

/// Metadata lookup by code or alias. Never records a click.
pub async fn get_link(
    State(state): State<Arc<AppState>>,
    Path(identifier): Path<String>,
) -> Result<Json<Link>, ApiError> {
    let link = state
        .service
        .resolve(&identifier)
        .await
        .map_err(error_response)?;
    Ok(Json(link))
}

/// Explicit click-tracking beacon for clients that handle the navigation
/// themselves.
pub async fn click_beacon(
    State(state): State<Arc<AppState>>,
    Path(identifier): Path<String>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let click = click_request_from(&headers, addr);
    state
        .service
        .record_click(&identifier, click)
        .await
        .map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_link(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(id): Path<String>,
    Json(patch): Json<LinkPatch>,
) -> Result<Json<Link>, ApiError> {
    // Non-numeric ids fall into the same "not found" bucket as foreign ones.
    let id: i64 = id
        .parse()
        .map_err(|_| error_response(ServiceError::NotFoundOrForbidden))?;
    let link = state
        .service
        .update_link(id, &owner, patch)
        .await
        .map_err(error_response)?;
    Ok(Json(link))
}

pub async fn delete_link(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id: i64 = id
        .parse()
        .map_err(|_| error_response(ServiceError::NotFoundOrForbidden))?;
    state
        .service
        .delete_link(id, &owner)
        .await
        .map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn owner_stats(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
) -> Result<Json<OwnerStats>, ApiError> {
    let stats = state
        .analytics
        .owner_stats(&owner)
        .await
        .map_err(error_response)?;
    Ok(Json(stats))
}

pub async fn link_analytics(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<Json<LinkAnalytics>, ApiError> {
    let id: i64 = id
        .parse()
        .map_err(|_| error_response(ServiceError::NotFoundOrForbidden))?;
    let analytics = state
        .analytics
        .link_analytics(id, &owner)
        .await
        .map_err(error_response)?;
    Ok(Json(analytics))
}

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "OK" }))
}
