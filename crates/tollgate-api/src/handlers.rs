//! API handlers.
//!
//! Each handler delegates to the engine and maps its typed result onto a
//! status code and the JSON envelope.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tollgate_core::{EngineError, HealthStatus, secret_matches};
use tollgate_engine::ChatRequest;
use tollgate_eval::{EvalError, EvalSelection};
use tracing::{debug, error};

use crate::ApiState;

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";
pub const EVAL_SECRET_HEADER: &str = "x-eval-secret";
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Response wrapper for consistent API format.
#[derive(Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
        .into_response()
}

/// HTTP status for each engine error kind.
pub fn status_for(err: &EngineError) -> StatusCode {
    match err {
        EngineError::Validation(_) | EngineError::SafetyRejection => StatusCode::BAD_REQUEST,
        EngineError::Admission { .. } => StatusCode::TOO_MANY_REQUESTS,
        EngineError::Upstream => StatusCode::BAD_GATEWAY,
        EngineError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn engine_error_response(err: &EngineError, now_ms: u64) -> Response {
    let status = status_for(err);
    match err {
        EngineError::Admission {
            remaining,
            reset_at_ms,
            ..
        } => {
            let retry_after = reset_at_ms.saturating_sub(now_ms).div_ceil(1000);
            (
                status,
                [("retry-after", retry_after.to_string())],
                Json(ApiResponse {
                    success: false,
                    data: Some(json!({ "remaining": remaining, "reset_at_ms": reset_at_ms })),
                    error: Some(err.to_string()),
                }),
            )
                .into_response()
        }
        _ => error_response(&err.to_string(), status),
    }
}

// ── Health ─────────────────────────────────────────────────────

/// GET /health
pub async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let report = state.engine.health();
    let status = match report.status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };
    (status, Json(report))
}

// ── Dashboard ──────────────────────────────────────────────────

/// GET /api/v1/dashboard
pub async fn dashboard(State(state): State<ApiState>, headers: HeaderMap) -> Response {
    let admin_token = state.engine.config().server.admin_token.as_deref();
    if let Some(token) = admin_token.filter(|t| !t.is_empty()) {
        let presented = headers
            .get(ADMIN_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !secret_matches(token, presented) {
            return error_response("unauthorized", StatusCode::UNAUTHORIZED);
        }
    }
    let engine = &state.engine;
    let snapshot = state
        .dashboard
        .get_or_compose(engine.now_ms(), || engine.dashboard());
    ApiResponse::ok(&*snapshot).into_response()
}

// ── Chat ───────────────────────────────────────────────────────

/// Chat request body.
#[derive(Deserialize)]
pub struct ChatBody {
    pub messages: Value,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// First hop in `x-forwarded-for`, or `local`.
pub fn source_key(headers: &HeaderMap) -> String {
    headers
        .get(FORWARDED_FOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("local")
        .to_string()
}

/// POST /api/v1/chat
pub async fn chat(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Result<Json<ChatBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            debug!(error = %rejection, "chat body rejected");
            return error_response("Request body must be JSON with a messages array.", StatusCode::BAD_REQUEST);
        }
    };

    let request = ChatRequest {
        source_key: source_key(&headers),
        session_id: body.session_id,
        messages: body.messages,
    };
    match state.engine.chat(request).await {
        Ok(reply) => ApiResponse::ok(reply).into_response(),
        Err(e) => engine_error_response(&e, state.engine.now_ms()),
    }
}

// ── Evaluation ─────────────────────────────────────────────────

/// POST /api/v1/eval
pub async fn eval(State(state): State<ApiState>, headers: HeaderMap, body: Bytes) -> Response {
    let selection: EvalSelection = if body.iter().all(u8::is_ascii_whitespace) {
        EvalSelection::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(selection) => selection,
            Err(e) => {
                debug!(error = %e, "eval body rejected");
                return error_response("invalid evaluation request body", StatusCode::BAD_REQUEST);
            }
        }
    };
    let secret = headers.get(EVAL_SECRET_HEADER).and_then(|v| v.to_str().ok());

    match state.engine.run_eval(&selection, secret).await {
        Ok(report) => ApiResponse::ok(report).into_response(),
        Err(EvalError::Unauthorized) => error_response("unauthorized", StatusCode::UNAUTHORIZED),
        Err(EvalError::NoCases) => error_response("no matching evaluation cases", StatusCode::BAD_REQUEST),
        Err(e) => {
            error!(error = %e, "evaluation failed");
            error_response("internal error", StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

// ── Metrics ────────────────────────────────────────────────────

/// GET /metrics — Prometheus text exposition.
pub async fn prometheus_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        state.engine.prometheus(),
    )
}
