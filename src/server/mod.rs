//! HTTP surface: the owner-facing API and the public token resolver.
//!
//! Owner routes assume the caller has already authenticated the owner
//! and verified that `entity_id` belongs to them; that enforcement
//! lives in the surrounding application, not here. `GET /p/{token}` is
//! the only unauthenticated route and never exposes why a token failed
//! to resolve.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::adapters::SqliteStorage;
use crate::application::{AlertService, ShareService};
use crate::domain::{AlertItem, SeverityCounts, SharePermissions, ShareToken, DEFAULT_ALERT_CAP};
use crate::PawvaultError;

/// Application state shared across handlers.
pub struct AppState {
    pub alerts: AlertService<SqliteStorage>,
    pub shares: ShareService<SqliteStorage, SqliteStorage>,
}

impl AppState {
    /// Wire the services over one storage adapter.
    #[must_use]
    pub fn new(storage: Arc<SqliteStorage>) -> Self {
        Self {
            alerts: AlertService::new(Arc::clone(&storage)),
            shares: ShareService::new(Arc::clone(&storage), storage),
        }
    }
}

pub type SharedState = Arc<AppState>;

/// Build the router for both surfaces.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/alerts", get(get_alerts))
        .route("/shares", post(create_share).get(list_shares))
        .route("/shares/:id", delete(revoke_share))
        .route("/p/:token", get(resolve_share))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

/// Map an engine error onto the owner-facing surface. Internal detail
/// never reaches the response body.
fn owner_error(err: &PawvaultError) -> Response {
    match err {
        PawvaultError::Validation(reason) => error_response(StatusCode::BAD_REQUEST, reason),
        PawvaultError::Rule(rule) => {
            error_response(StatusCode::BAD_REQUEST, &rule.to_string())
        }
        PawvaultError::NotFound => error_response(StatusCode::NOT_FOUND, "not found"),
        PawvaultError::Aggregation { .. } => {
            error_response(StatusCode::SERVICE_UNAVAILABLE, "alerts unavailable")
        }
        PawvaultError::Conflict(_) => {
            error_response(StatusCode::SERVICE_UNAVAILABLE, "try again")
        }
        PawvaultError::Storage(_) | PawvaultError::Serialization(_) => {
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

#[derive(Debug, Deserialize)]
struct EntityQuery {
    entity_id: String,
}

#[derive(Debug, Serialize)]
struct AlertsResponse {
    alerts: Vec<AlertItem>,
    total: usize,
    counts: SeverityCounts,
}

/// GET /alerts?entity_id=
async fn get_alerts(
    State(state): State<SharedState>,
    Query(query): Query<EntityQuery>,
) -> Response {
    let now = Utc::now().date_naive();
    match state.alerts.alerts(&query.entity_id, now).await {
        Ok(ranked) => Json(AlertsResponse {
            alerts: ranked.top(DEFAULT_ALERT_CAP).to_vec(),
            total: ranked.items.len(),
            counts: ranked.counts,
        })
        .into_response(),
        Err(e) => {
            tracing::warn!("Alert fetch failed for {}: {e}", query.entity_id);
            owner_error(&e)
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreateShareRequest {
    entity_id: String,
    permissions: SharePermissions,
}

/// POST /shares — the raw token value is returned here, once.
async fn create_share(
    State(state): State<SharedState>,
    Json(request): Json<CreateShareRequest>,
) -> Response {
    if request.entity_id.trim().is_empty() {
        return owner_error(&PawvaultError::Validation(
            "entity_id must not be empty".to_string(),
        ));
    }

    match state
        .shares
        .generate(&request.entity_id, request.permissions)
        .await
    {
        Ok(token) => (StatusCode::CREATED, Json(token)).into_response(),
        Err(e) => {
            tracing::warn!("Share creation failed for {}: {e}", request.entity_id);
            owner_error(&e)
        }
    }
}

/// A share listing entry. The raw token value is omitted so listings
/// never re-leak it after creation.
#[derive(Debug, Serialize)]
struct ShareSummary {
    id: String,
    entity_id: String,
    permissions: SharePermissions,
    active: bool,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    accessed_count: u64,
}

impl From<ShareToken> for ShareSummary {
    fn from(token: ShareToken) -> Self {
        Self {
            id: token.id,
            entity_id: token.entity_id,
            permissions: token.permissions,
            active: token.active,
            created_at: token.created_at,
            expires_at: token.expires_at,
            accessed_count: token.accessed_count,
        }
    }
}

/// GET /shares?entity_id=
async fn list_shares(
    State(state): State<SharedState>,
    Query(query): Query<EntityQuery>,
) -> Response {
    match state.shares.list_active(&query.entity_id).await {
        Ok(tokens) => {
            let summaries: Vec<ShareSummary> =
                tokens.into_iter().map(ShareSummary::from).collect();
            Json(summaries).into_response()
        }
        Err(e) => {
            tracing::warn!("Share listing failed for {}: {e}", query.entity_id);
            owner_error(&e)
        }
    }
}

/// DELETE /shares/{id}
async fn revoke_share(State(state): State<SharedState>, Path(id): Path<String>) -> Response {
    match state.shares.revoke(&id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            tracing::warn!("Share revocation failed for {id}: {e}");
            owner_error(&e)
        }
    }
}

/// GET /p/{token} — public, unauthenticated. Every failure renders the
/// same generic 404 so unknown, expired, and revoked tokens (and even
/// internal faults) are indistinguishable to a viewer.
async fn resolve_share(State(state): State<SharedState>, Path(token): Path<String>) -> Response {
    match state.shares.resolve(&token, Utc::now()).await {
        Ok(view) => Json(view).into_response(),
        Err(e) => {
            if !matches!(e, PawvaultError::NotFound) {
                tracing::warn!("Share resolution failed: {e}");
            }
            error_response(StatusCode::NOT_FOUND, "link not available")
        }
    }
}
