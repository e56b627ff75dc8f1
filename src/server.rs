//! HTTP surface: panel API, Site webhook, panel page and health checks.
use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequestParts, Path, State},
    http::{request::Parts, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument, warn};

use crate::actions::ActionProcessor;
use crate::auth::{InitDataVerifier, Moderator};
use crate::error::ModerationError;
use crate::model::{ActionRequest, ItemKind, ModerationItem};
use crate::notify::NotificationDispatcher;
use crate::state::{ModerationState, HISTORY_READ_LIMIT};
use crate::texts;

pub const INIT_DATA_HEADER: &str = "X-Init-Data";
pub const WEBHOOK_SECRET_HEADER: &str = "X-Secret";

/// Shared application state for Axum handlers.
pub struct AppState {
    pub verifier: InitDataVerifier,
    pub processor: ActionProcessor,
    pub state: Arc<ModerationState>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub webhook_secret: String,
    /// When set, webhook announcements also count as seen for the poller.
    pub share_webhook_dedup: bool,
    pub panel_html: PathBuf,
}

/// Build the Axum router with all endpoints.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handle_root))
        .route("/ping", get(handle_ping))
        .route("/app", get(handle_panel_page))
        .route("/api/pending", get(handle_pending))
        .route("/api/action", post(handle_action))
        .route("/api/history", get(handle_history))
        .route("/api/rules", get(handle_rules))
        .route("/api/reasons/:item_type", get(handle_reasons))
        .route("/site-webhook", post(handle_webhook))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Moderator identity verified from the `X-Init-Data` header.
pub struct AuthedModerator(pub Moderator);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthedModerator {
    type Rejection = ModerationError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let init_data = parts
            .headers
            .get(INIT_DATA_HEADER)
            .and_then(|v| v.to_str().ok());
        state
            .verifier
            .authenticate(init_data)
            .map(AuthedModerator)
            .ok_or(ModerationError::Unauthorized)
    }
}

async fn handle_root() -> &'static str {
    "ok"
}

async fn handle_ping() -> Json<Value> {
    Json(json!({ "status": "ok", "time": Utc::now().to_rfc3339() }))
}

/// GET /app -- the panel page rendered inside Telegram
async fn handle_panel_page(State(state): State<Arc<AppState>>) -> Response {
    match tokio::fs::read_to_string(&state.panel_html).await {
        Ok(html) => Html(html).into_response(),
        Err(err) => {
            warn!(?err, path = %state.panel_html.display(), "panel page unavailable");
            (StatusCode::NOT_FOUND, "panel page not found").into_response()
        }
    }
}

/// GET /api/pending -- Site queue annotated with resolvers
async fn handle_pending(
    State(state): State<Arc<AppState>>,
    AuthedModerator(_moderator): AuthedModerator,
) -> Result<Response, ModerationError> {
    let view = state.processor.pending_view().await?;
    Ok(Json(view).into_response())
}

/// POST /api/action -- approve / reject / sign
async fn handle_action(
    State(state): State<Arc<AppState>>,
    AuthedModerator(moderator): AuthedModerator,
    Json(request): Json<ActionRequest>,
) -> Result<Json<Value>, ModerationError> {
    state.processor.apply(&moderator, request).await?;
    Ok(Json(json!({ "ok": true })))
}

/// GET /api/history -- most recent decisions, newest first
async fn handle_history(
    State(state): State<Arc<AppState>>,
    AuthedModerator(_moderator): AuthedModerator,
) -> Json<Value> {
    Json(json!({ "history": state.state.history(HISTORY_READ_LIMIT) }))
}

/// GET /api/rules -- public
async fn handle_rules() -> Json<Value> {
    Json(json!({ "rules": texts::RULES_TEXT }))
}

/// GET /api/reasons/:item_type
async fn handle_reasons(
    Path(item_type): Path<String>,
    AuthedModerator(_moderator): AuthedModerator,
) -> Json<Value> {
    let reasons = item_type
        .parse::<ItemKind>()
        .map(texts::reject_reasons)
        .unwrap_or(&[]);
    Json(json!({ "reasons": reasons }))
}

fn secrets_match(expected: &str, supplied: &str) -> bool {
    expected.as_bytes().ct_eq(supplied.as_bytes()).into()
}

/// POST /site-webhook -- new item announced by the Site
#[instrument(skip_all)]
async fn handle_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ModerationError> {
    let supplied = headers
        .get(WEBHOOK_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !secrets_match(&state.webhook_secret, supplied) {
        warn!("webhook with wrong secret");
        return Err(ModerationError::Forbidden);
    }

    let item: ModerationItem = match serde_json::from_slice(&body) {
        Ok(item) => item,
        Err(err) => {
            warn!(%err, "unrecognized webhook event");
            let body = Json(json!({ "error": "unknown_event" }));
            return Ok((StatusCode::BAD_REQUEST, body).into_response());
        }
    };

    info!(key = %item.key(), "webhook event");
    // marked before sending so a concurrent poll cycle does not announce it too
    if state.share_webhook_dedup {
        state.state.mark_seen(item.kind(), [item.id()]);
    }
    state.dispatcher.broadcast(&texts::notification(&item)).await;
    Ok(Json(json!({ "ok": true })).into_response())
}
