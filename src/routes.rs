//! HTTP surface and request orchestration.
//!
//! The enhance handler walks one request through
//! validate -> rate-check -> tier branch. The free path is purely
//! deterministic; the pro path tries the external caller and funnels
//! every provider failure into the deterministic fallback, so a valid
//! request on either tier always gets a 200 with a usable `enhanced`
//! field. Only validation and rate-limit failures surface as errors.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::connect_info::ConnectInfo;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequestParts, Json, State};
use axum::http::HeaderValue;
use axum::http::request::Parts;
use axum::response::Html;
use axum::routing::{get, post};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::enhance::{EnhanceRequest, EnhanceResult, Tier, deterministic_enhance, truncate_chars};
use crate::error::{Result, ServiceError};
use crate::limiter::client_key;
use crate::state::{AppState, MetricsSnapshot};

/// Max characters of the provider diagnostic attached to fallback notes.
const NOTE_CAUSE_CHARS: usize = 120;

const LANDING_PAGE: &str = r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>promptforge</title></head>
<body>
<h1>promptforge</h1>
<p>Rewrites raw text into a structured LLM prompt.</p>
<p>POST /enhance with <code>{"input": "...", "mode": "auto", "tone": "concise", "tier": "free"}</code></p>
</body>
</html>
"#;

/// Build the service router over shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = if state.config.cors_origins.is_empty() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        CorsLayer::new().allow_origin(AllowOrigin::list(origins))
    };

    Router::new()
        .route("/", get(landing))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/enhance", post(enhance))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Client identity for rate limiting: first `X-Forwarded-For` value,
/// else the peer address, else a sentinel. Never rejects.
pub struct ClientIdentity(pub String);

impl<S> FromRequestParts<S> for ClientIdentity
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> std::result::Result<Self, Self::Rejection> {
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok());
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0.ip());
        Ok(ClientIdentity(client_key(forwarded, peer)))
    }
}

async fn landing() -> Html<&'static str> {
    Html(LANDING_PAGE)
}

async fn health() -> &'static str {
    "ok"
}

async fn metrics(State(state): State<Arc<AppState>>) -> Json<MetricsSnapshot> {
    Json(state.metrics())
}

async fn enhance(
    State(state): State<Arc<AppState>>,
    ClientIdentity(client): ClientIdentity,
    body: std::result::Result<Json<EnhanceRequest>, JsonRejection>,
) -> Result<Json<EnhanceResult>> {
    let Json(request) = body
        .map_err(|rejection| ServiceError::BadRequest(format!("invalid request body: {rejection}")))?;

    let input = request.input.trim();
    if input.is_empty() {
        return Err(ServiceError::BadRequest("input is required".to_string()));
    }
    let pro = match request.tier {
        Tier::Free => false,
        Tier::Pro => true,
        Tier::Unknown(label) => {
            return Err(ServiceError::BadRequest(format!("unknown tier '{label}'")));
        }
    };

    if state.limiter.is_limited(&client) {
        state.bump(|c| c.blocked_rate += 1);
        tracing::warn!(client = %client, "request rejected by rate limiter");
        return Err(ServiceError::RateLimited);
    }

    if !pro {
        state.bump(|c| c.free_calls += 1);
        return Ok(Json(deterministic_enhance(input, request.mode, &request.tone)));
    }

    state.bump(|c| c.pro_calls += 1);
    match state.provider.enhance(input, request.mode, &request.tone).await {
        Ok(result) => Ok(Json(result)),
        Err(err) => {
            state.bump(|c| c.fallback_uses += 1);
            tracing::warn!(error = %err, "pro tier degraded to deterministic fallback");
            let cause = err.to_string();
            let mut fallback = deterministic_enhance(input, request.mode, &request.tone);
            fallback.note = Some(format!(
                "provider unavailable: {}",
                truncate_chars(&cause, NOTE_CAUSE_CHARS)
            ));
            Ok(Json(fallback))
        }
    }
}
