//! HTTP surface
//!
//! Endpoints:
//!   POST /auth/login   - Log in (registers unknown users), returns a token
//!   POST /auth/logout  - Revoke the presented token
//!   GET  /messages     - One page of messages, `?fromId=<id>` for the next page
//!   POST /messages     - Post a message
//!   GET  /health       - Liveness and version

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, Query, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::context::ChatContext;
use crate::error::ChatError;
use crate::gate::Principal;
use crate::model::{LoginRequest, LoginResponse, Message, MessageRequest};

pub type AppState = Arc<ChatContext>;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ListQuery {
    #[serde(rename = "fromId")]
    from_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

// ============================================================================
// Errors
// ============================================================================

impl ChatError {
    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ChatError::Unauthenticated | ChatError::InvalidCredentials => StatusCode::FORBIDDEN,
            ChatError::CursorNotFound(_) => StatusCode::NOT_FOUND,
            ChatError::Validation(_) => StatusCode::BAD_REQUEST,
            ChatError::Conflict(_) => StatusCode::CONFLICT,
            ChatError::StoreUnavailable(_) | ChatError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        (status, Json(ErrorResponse { error: self.to_string() })).into_response()
    }
}

// ============================================================================
// Gate
// ============================================================================

/// Extractor running the access control gate. Rejects with 403 before the
/// body is read.
pub struct Authenticated(pub Principal);

#[async_trait]
impl FromRequestParts<AppState> for Authenticated {
    type Rejection = ChatError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts.headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
        state.authorize(header).map(Authenticated)
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn login(
    State(ctx): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ChatError> {
    ctx.login(&req).map(Json)
}

async fn logout(
    State(ctx): State<AppState>,
    Authenticated(principal): Authenticated,
) -> Result<StatusCode, ChatError> {
    ctx.logout(&principal)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_messages(
    State(ctx): State<AppState>,
    Authenticated(principal): Authenticated,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Message>>, ChatError> {
    ctx.list_messages(&principal, query.from_id.as_deref()).map(Json)
}

async fn post_message(
    State(ctx): State<AppState>,
    Authenticated(principal): Authenticated,
    Json(req): Json<MessageRequest>,
) -> Result<Json<Message>, ChatError> {
    ctx.post_message(&principal, req).map(Json)
}

// ============================================================================
// Router
// ============================================================================

pub fn router(ctx: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/messages", get(list_messages).post(post_message))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}
