//! HTTP routes: the Slack events webhook and admin endpoints

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use dakoku_domain::TokenStatus;
use serde::Deserialize;
use tracing::{error, warn};

use crate::handlers::{self, InboundEvent};
use crate::state::AppState;
use crate::verify;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/slack/events", post(slack_events))
        .route("/admin/tokens", post(seed_tokens))
        .route("/admin/token-status", get(token_status))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// Envelope of the Slack Events API.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum SlackEnvelope {
    UrlVerification { challenge: String },
    EventCallback { event: InboundEvent },
    #[serde(other)]
    Other,
}

async fn slack_events(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Response {
    if let Err(reason) =
        verify::verify_slack(state.config.slack.signing_secret.as_deref(), &headers, body.as_bytes())
    {
        warn!(reason, "rejected Slack webhook");
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let envelope: SlackEnvelope = match serde_json::from_str(&body) {
        Ok(envelope) => envelope,
        Err(err) => {
            warn!(error = %err, "unparseable Slack event payload");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    match envelope {
        SlackEnvelope::UrlVerification { challenge } => {
            Json(serde_json::json!({ "challenge": challenge })).into_response()
        }
        SlackEnvelope::EventCallback { event } => {
            // Slack retries deliveries that take longer than its deadline;
            // acknowledge now and process in the background.
            tokio::spawn(handlers::handle_message(state.clone(), event));
            StatusCode::OK.into_response()
        }
        SlackEnvelope::Other => StatusCode::OK.into_response(),
    }
}

/// Request body for the token seeding endpoint.
#[derive(Debug, Deserialize)]
struct SeedTokensRequest {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

async fn seed_tokens(
    State(state): State<AppState>,
    Json(request): Json<SeedTokensRequest>,
) -> Response {
    if request.access_token.is_empty() || request.refresh_token.is_empty() {
        return (StatusCode::BAD_REQUEST, "Missing tokens").into_response();
    }

    match state
        .tokens
        .seed_tokens(&request.access_token, &request.refresh_token, request.expires_in)
        .await
    {
        Ok(()) => Json(serde_json::json!({ "status": "ok" })).into_response(),
        Err(err) => {
            error!(error = %err, "token seeding failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "status": "error", "message": err.to_string() })),
            )
                .into_response()
        }
    }
}

async fn token_status(State(state): State<AppState>) -> Json<TokenStatus> {
    Json(state.tokens.get_token_status().await)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::Request;
    use dakoku_domain::{
        Config, CredentialsConfig, FreeeConfig, SchedulerConfig, ServerConfig, SlackConfig,
    };
    use dakoku_infra::credentials::MemoryCredentialStore;
    use dakoku_infra::{FreeeClient, HttpClient, SlackClient, TokenManager};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;

    fn test_state() -> AppState {
        let config = Arc::new(Config {
            freee: FreeeConfig {
                client_id: "cid".to_string(),
                client_secret: "secret".to_string(),
                api_base_url: "http://unused.invalid".to_string(),
                token_url: "http://unused.invalid".to_string(),
                fallback_access_token: None,
                fallback_refresh_token: None,
            },
            slack: SlackConfig {
                bot_token: "xoxb-test".to_string(),
                signing_secret: None,
                target_channel: "C012345".to_string(),
                api_base_url: "http://unused.invalid".to_string(),
                user_overrides: std::collections::HashMap::new(),
            },
            scheduler: SchedulerConfig::default(),
            server: ServerConfig::default(),
            credentials: CredentialsConfig::default(),
        });

        let store = Arc::new(MemoryCredentialStore::new());
        let http = HttpClient::new().expect("http client");
        let tokens = Arc::new(TokenManager::new(store, http.clone(), &config.freee));
        let freee = Arc::new(FreeeClient::new(
            "http://unused.invalid",
            http.clone(),
            Arc::clone(&tokens),
        ));
        let slack = Arc::new(SlackClient::new("http://unused.invalid", "xoxb-test", http));

        AppState::new(config, tokens, freee, slack)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint_answers() {
        let app = router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn url_verification_echoes_challenge() {
        let app = router(test_state());
        let payload = r#"{"type":"url_verification","challenge":"abc123"}"#;

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/slack/events")
                    .header("content-type", "application/json")
                    .body(Body::from(payload))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["challenge"], "abc123");
    }

    #[tokio::test]
    async fn unknown_envelope_types_are_acknowledged() {
        let app = router(test_state());
        let payload = r#"{"type":"app_rate_limited"}"#;

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/slack/events")
                    .header("content-type", "application/json")
                    .body(Body::from(payload))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn malformed_payload_is_rejected() {
        let app = router(test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/slack/events")
                    .header("content-type", "application/json")
                    .body(Body::from("not json"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn seeding_then_status_round_trips() {
        let state = test_state();

        let seed = router(state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/admin/tokens")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"access_token":"boot-a","refresh_token":"boot-r","expires_in":21600}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(seed.status(), StatusCode::OK);

        let status = router(state)
            .oneshot(Request::builder().uri("/admin/token-status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(status.status(), StatusCode::OK);

        let json = body_json(status).await;
        assert_eq!(json["storage"], "store");
        assert_eq!(json["has_access_token"], true);
        assert_eq!(json["has_refresh_token"], true);
    }

    #[tokio::test]
    async fn seeding_requires_both_tokens() {
        let response = router(test_state())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/admin/tokens")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"access_token":"","refresh_token":""}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn signed_requests_are_enforced_when_secret_is_set() {
        let mut state = test_state();
        let mut config = (*state.config).clone();
        config.slack.signing_secret = Some("topsecret".to_string());
        state.config = Arc::new(config);

        let response = router(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/slack/events")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"type":"url_verification","challenge":"x"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
