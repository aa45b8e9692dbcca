//! End-to-end tests driving the axum router directly.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::util::ServiceExt;

use promptforge::config::Config;
use promptforge::routes::router;
use promptforge::state::AppState;

fn test_config() -> Config {
    Config {
        // No credential: the pro tier must degrade, never error.
        api_key: None,
        rate_limit_max: 10,
        rate_limit_window: Duration::from_secs(60),
        ..Config::default()
    }
}

fn app(config: Config) -> Router {
    let state = AppState::new(config).expect("state builds from test config");
    router(Arc::new(state))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("infallible router");
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn enhance_request(body: &Value, client: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/enhance")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", client)
        .body(Body::from(body.to_string()))
        .expect("valid request")
}

#[tokio::test]
async fn free_tier_returns_structured_prompt() {
    let app = app(test_config());
    let (status, body) = send(
        &app,
        enhance_request(&json!({"input": "compare index funds to bonds"}), "10.0.0.1"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let enhanced = body["enhanced"].as_str().unwrap();
    assert!(!enhanced.is_empty());
    assert!(enhanced.contains("# Role"));
    assert!(enhanced.contains("compare index funds to bonds"));
    assert_eq!(body["model_used"], "deterministic-fallback");
    assert!(body["improvements"].as_array().unwrap().len() >= 4);
    assert!(body.get("note").is_none(), "no note on the free path");
}

#[tokio::test]
async fn empty_input_is_rejected_regardless_of_tier() {
    let app = app(test_config());
    for tier in ["free", "pro"] {
        let (status, body) = send(
            &app,
            enhance_request(&json!({"input": "   ", "tier": tier}), "10.0.0.2"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "tier {tier}");
        assert!(body["error"].as_str().unwrap().contains("input"));
    }
}

#[tokio::test]
async fn malformed_body_is_rejected() {
    let app = app(test_config());
    let request = Request::builder()
        .method("POST")
        .uri("/enhance")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", "10.0.0.3")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("invalid request body"));
}

#[tokio::test]
async fn unknown_tier_is_rejected() {
    let app = app(test_config());
    let (status, body) = send(
        &app,
        enhance_request(
            &json!({"input": "valid input here", "tier": "enterprise"}),
            "10.0.0.4",
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("enterprise"));
}

#[tokio::test]
async fn eleventh_request_in_burst_is_rate_limited() {
    let app = app(test_config());
    let body = json!({"input": "hello there"});

    for i in 0..10 {
        let (status, _) = send(&app, enhance_request(&body, "203.0.113.50")).await;
        assert_eq!(status, StatusCode::OK, "request {i} should pass");
    }
    let (status, error) = send(&app, enhance_request(&body, "203.0.113.50")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(!error["error"].as_str().unwrap().is_empty());

    // A different client identity is unaffected.
    let (status, _) = send(&app, enhance_request(&body, "203.0.113.51")).await;
    assert_eq!(status, StatusCode::OK);

    let metrics_request = Request::builder()
        .uri("/metrics")
        .body(Body::empty())
        .unwrap();
    let (status, metrics) = send(&app, metrics_request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(metrics["blocked_rate"], 1);
    assert_eq!(metrics["free_calls"], 11);
}

#[tokio::test]
async fn pro_tier_without_credential_falls_back_with_note() {
    let app = app(test_config());
    let (status, body) = send(
        &app,
        enhance_request(
            &json!({"input": "rewrite my landing page copy", "tier": "pro"}),
            "10.0.0.5",
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(!body["enhanced"].as_str().unwrap().is_empty());
    assert_eq!(body["model_used"], "deterministic-fallback");
    let note = body["note"].as_str().unwrap();
    assert!(note.starts_with("provider unavailable:"), "note was {note:?}");

    let metrics_request = Request::builder()
        .uri("/metrics")
        .body(Body::empty())
        .unwrap();
    let (_, metrics) = send(&app, metrics_request).await;
    assert_eq!(metrics["pro_calls"], 1);
    assert_eq!(metrics["fallback_uses"], 1);
}

#[tokio::test]
async fn coriander_scenario_infers_health_mode() {
    let app = app(test_config());
    let (status, body) = send(
        &app,
        enhance_request(
            &json!({
                "input": "My stomach hurts after eating coriander",
                "tier": "free",
                "tone": "formal"
            }),
            "10.0.0.6",
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let enhanced = body["enhanced"].as_str().unwrap();
    assert!(enhanced.contains("You are a clinician/nutritionist."));
    assert!(enhanced.contains("- Formal."));
    for token in ["stomach", "hurts", "eating", "coriander"] {
        assert!(enhanced.contains(token), "missing entity hint {token}");
    }
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let app = app(test_config());
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn metrics_start_at_zero_with_a_start_timestamp() {
    let app = app(test_config());
    let request = Request::builder()
        .uri("/metrics")
        .body(Body::empty())
        .unwrap();
    let (status, metrics) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(metrics["free_calls"], 0);
    assert_eq!(metrics["pro_calls"], 0);
    assert_eq!(metrics["fallback_uses"], 0);
    assert_eq!(metrics["blocked_rate"], 0);
    assert!(!metrics["since"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn landing_page_is_served() {
    let app = app(test_config());
    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let html = std::str::from_utf8(&bytes).unwrap();
    assert!(html.contains("promptforge"));
}

#[tokio::test]
async fn explicit_valid_mode_is_respected_over_inference() {
    let app = app(test_config());
    let (status, body) = send(
        &app,
        enhance_request(
            &json!({"input": "write a poem about my diet", "mode": "creative"}),
            "10.0.0.7",
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(
        body["enhanced"]
            .as_str()
            .unwrap()
            .contains("You are a creative editor.")
    );
}
