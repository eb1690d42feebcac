//! HTTP Endpoints
//!
//! REST API for the study assistant.

use axum::{
    extract::{DefaultBodyLimit, MatchedPath, Request, State},
    http::{HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::analyze::analyze;
use crate::auth::{login, register};
use crate::messages::{create_message, list_messages};
use crate::metrics::{metrics_handler, record_request};
use crate::quiz::quiz;
use crate::state::AppState;

const READY_TIMEOUT: Duration = Duration::from_secs(2);

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let config = state.config.read();
    let cors_layer = build_cors_layer(&config.server.cors_origins, config.server.cors_enabled);
    let body_limit = config.server.max_upload_bytes;
    let request_timeout = Duration::from_secs(config.server.timeout_seconds);
    drop(config); // Release lock before building router

    Router::new()
        // Study API
        .route("/api/analyze", post(analyze))
        .route("/api/quiz", post(quiz))
        .route(
            "/api/messages/:course_id",
            get(list_messages).post(create_message),
        )
        // Accounts
        .route("/api/register", post(register))
        .route("/api/login", post(login))
        // Health check
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        // Prometheus metrics
        .route("/metrics", get(metrics_handler))
        // Admin endpoints
        .route("/admin/reload-config", post(reload_config))
        .layer(middleware::from_fn(track_requests))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

/// Count responses per matched route
async fn track_requests(request: Request, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string());

    let response = next.run(request).await;
    if let Some(route) = route {
        record_request(&route, response.status());
    }
    response
}

/// Build CORS layer from configured origins
///
/// - If cors_enabled is false, returns permissive layer (for dev)
/// - If cors_origins is empty, defaults to localhost:3000
/// - Otherwise, uses the configured origins
fn build_cors_layer(origins: &[String], enabled: bool) -> CorsLayer {
    if !enabled {
        tracing::warn!("CORS is disabled - allowing all origins (NOT FOR PRODUCTION)");
        return CorsLayer::permissive();
    }

    let localhost = || {
        CorsLayer::new()
            .allow_origin(HeaderValue::from_static("http://localhost:3000"))
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
    };

    if origins.is_empty() {
        tracing::info!("No CORS origins configured, defaulting to localhost:3000");
        return localhost();
    }

    if origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any);
    }

    let parsed_origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("Invalid CORS origin: {}", origin);
                None
            })
        })
        .collect();

    if parsed_origins.is_empty() {
        tracing::error!("All configured CORS origins are invalid, falling back to localhost");
        return localhost();
    }

    tracing::info!("CORS configured with {} origins", parsed_origins.len());
    CorsLayer::new()
        .allow_origin(parsed_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

/// Liveness plus a summary of the running configuration
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let analysis = state.analysis();
    let (environment, persistence) = {
        let config = state.get_config();
        (config.environment, config.persistence.enabled)
    };

    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": environment,
        "checks": {
            "llm": {
                "mode": if analysis.is_mock() { "mock" } else { "live" },
                "model": analysis.model_name(),
            },
            "persistence": {
                "scylla": persistence,
            }
        }
    }))
}

/// Ready once the LLM backend answers; always ready in mock mode
async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let analysis = state.analysis();

    let (ready, llm_status) =
        match tokio::time::timeout(READY_TIMEOUT, analysis.backend_available()).await {
            Ok(None) => (true, "mock"),
            Ok(Some(true)) => (true, "ok"),
            Ok(Some(false)) => (false, "unreachable"),
            Err(_) => (false, "timeout"),
        };

    let status_code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(serde_json::json!({
            "status": if ready { "ready" } else { "not_ready" },
            "checks": {
                "llm_backend": { "status": llm_status }
            }
        })),
    )
}

/// POST /admin/reload-config
///
/// CORS, the body limit and the request timeout are only applied at startup.
async fn reload_config(State(state): State<AppState>) -> impl IntoResponse {
    match state.reload_config() {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "success",
                "message": "Configuration reloaded successfully"
            })),
        ),
        Err(e) => {
            tracing::error!("Config reload failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "status": "error",
                    "message": e
                })),
            )
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
    use std::sync::Arc;
    use tower::ServiceExt;

    use loominary_config::Settings;
    use loominary_llm::{
        AnalysisService, FinishReason, GenerationOptions, GenerationResult, LlmBackend, LlmError,
        Message, TurnService,
    };
    use loominary_persistence::PersistenceLayer;

    use crate::quiz::QUIZ_FAILED;

    const BOUNDARY: &str = "loominary-test-boundary";

    /// Mock-mode state regardless of the environment's credentials
    fn test_router() -> Router {
        let settings = Settings::default();
        let analysis = AnalysisService::new(None, &settings);
        let turns = TurnService::new(None, &settings);
        let state = AppState::from_parts(settings, analysis, turns, PersistenceLayer::in_memory());
        create_router(state)
    }

    /// Backend standing in for a misbehaving upstream model
    enum BrokenBackend {
        Unreachable,
        Garbled,
        Stalled,
    }

    #[axum::async_trait]
    impl LlmBackend for BrokenBackend {
        async fn generate(
            &self,
            _messages: &[Message],
            _options: GenerationOptions,
        ) -> Result<GenerationResult, LlmError> {
            match self {
                BrokenBackend::Unreachable => Err(LlmError::Api("upstream down".to_string())),
                BrokenBackend::Garbled => Ok(GenerationResult {
                    text: "not json".to_string(),
                    tokens: 2,
                    total_time_ms: 1,
                    finish_reason: FinishReason::Stop,
                }),
                BrokenBackend::Stalled => {
                    tokio::time::sleep(Duration::from_secs(600)).await;
                    Err(LlmError::Timeout)
                },
            }
        }

        async fn is_available(&self) -> bool {
            false
        }

        fn model_name(&self) -> &str {
            "broken"
        }
    }

    fn router_with_backend(backend: BrokenBackend, settings: Settings) -> Router {
        let backend: Arc<dyn LlmBackend> = Arc::new(backend);
        let analysis = AnalysisService::new(Some(backend.clone()), &settings);
        let turns = TurnService::new(Some(backend), &settings);
        let state = AppState::from_parts(settings, analysis, turns, PersistenceLayer::in_memory());
        create_router(state)
    }

    fn raw_request(uri: &str, content_type: Option<&str>, body: &'static str) -> Request {
        let mut builder = Request::builder().method(Method::POST).uri(uri);
        if let Some(content_type) = content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        builder.body(Body::from(body)).unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_request(method: Method, uri: &str, body: serde_json::Value) -> Request {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn multipart_request(files: &[(&str, &str)]) -> Request {
        let mut body = String::new();
        for (name, content) in files {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\nContent-Type: text/plain\r\n\r\n{content}\r\n"
            ));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));

        Request::builder()
            .method(Method::POST)
            .uri("/api/analyze")
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn login_token(router: &Router) -> String {
        let response = router
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/register",
                serde_json::json!({"name": "Ada", "email": "Ada@Example.com", "password": "s3cret"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = router
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/login",
                serde_json::json!({"email": "ada@example.com", "password": "s3cret"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        body_json(response).await["token"].as_str().unwrap().to_string()
    }

    #[test]
    fn test_router_creation() {
        let _ = test_router();
    }

    #[tokio::test]
    async fn test_mock_analysis_of_text_notes() {
        let response = test_router()
            .oneshot(multipart_request(&[("notes.txt", "Mitochondria make ATP.")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        let documents = body["documents"].as_array().unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0]["fileName"], "notes.txt");
        assert!(documents[0]["summary"].as_str().unwrap().starts_with("[MOCK]"));
        assert_eq!(documents[0]["questions"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_analysis_input_errors() {
        let response = test_router().oneshot(multipart_request(&[])).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "No files provided");

        let response = test_router()
            .oneshot(multipart_request(&[("blank.txt", "   ")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["error"],
            "Could not extract text from any of the files"
        );
    }

    #[tokio::test]
    async fn test_mock_quiz_turn() {
        let response = test_router()
            .oneshot(json_request(
                Method::POST,
                "/api/quiz",
                serde_json::json!({
                    "userAnswer": "Plants convert light into energy",
                    "currentQuestion": "What is photosynthesis?",
                    "documentSummary": "Photosynthesis basics",
                    "fileName": "bio.pdf"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert!(body["spokenResponse"]
            .as_str()
            .unwrap()
            .contains("Since I'm in mock mode without an API key"));
        assert_eq!(body["analysis"]["status"], "correct");
    }

    #[tokio::test]
    async fn test_messages_require_session() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .uri("/api/messages/physics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "Unauthorized");

        let response = test_router()
            .oneshot(
                Request::builder()
                    .uri("/api/messages/physics")
                    .header(AUTHORIZATION, "Bearer forged")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_chat_flow() {
        let router = test_router();
        let token = login_token(&router).await;

        let mut blank = json_request(
            Method::POST,
            "/api/messages/Physics%20101",
            serde_json::json!({"content": "   "}),
        );
        blank
            .headers_mut()
            .insert(AUTHORIZATION, format!("Bearer {}", token).parse().unwrap());
        let response = router.clone().oneshot(blank).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "Message content required");

        let mut post = json_request(
            Method::POST,
            "/api/messages/Physics%20101",
            serde_json::json!({"content": "Lab at 3?"}),
        );
        post.headers_mut()
            .insert(AUTHORIZATION, format!("Bearer {}", token).parse().unwrap());
        let response = router.clone().oneshot(post).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let created = body_json(response).await;
        assert_eq!(created["courseId"], "Physics 101");
        assert_eq!(created["user"]["name"], "Ada");

        let list = Request::builder()
            .uri("/api/messages/Physics%20101")
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(list).await.unwrap();
        let messages = body_json(response).await;
        assert_eq!(messages.as_array().unwrap().len(), 1);
        assert_eq!(messages[0]["content"], "Lab at 3?");
    }

    #[tokio::test]
    async fn test_registration_errors() {
        let router = test_router();
        let _ = login_token(&router).await;

        let response = router
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/register",
                serde_json::json!({"name": "Ada", "email": "ada@example.com", "password": "x"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = router
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/register",
                serde_json::json!({"email": "bob@example.com"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = router
            .oneshot(json_request(
                Method::POST,
                "/api/login",
                serde_json::json!({"email": "ada@example.com", "password": "wrong"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_health_and_ready_in_mock_mode() {
        let response = test_router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["checks"]["llm"]["mode"], "mock");

        let response = test_router()
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_malformed_bodies_get_json_errors() {
        let router = test_router();

        let response = router
            .clone()
            .oneshot(raw_request("/api/quiz", Some("application/json"), "{not json"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["error"], QUIZ_FAILED);

        let response = router
            .clone()
            .oneshot(raw_request("/api/quiz", None, r#"{"userAnswer":"x"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["error"], QUIZ_FAILED);

        let response = router
            .clone()
            .oneshot(raw_request("/api/analyze", Some("application/json"), "{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"].is_string());

        let response = router
            .clone()
            .oneshot(raw_request("/api/register", Some("application/json"), "nope"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"].is_string());

        let token = login_token(&router).await;
        let mut post = raw_request("/api/messages/physics", Some("application/json"), "{\"content\":");
        post.headers_mut()
            .insert(AUTHORIZATION, format!("Bearer {}", token).parse().unwrap());
        let response = router.oneshot(post).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_llm_failures_are_server_errors() {
        let router = router_with_backend(BrokenBackend::Unreachable, Settings::default());
        let response = router
            .oneshot(multipart_request(&[("notes.txt", "Mitochondria make ATP.")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["error"], "API error: upstream down");

        let router = router_with_backend(BrokenBackend::Garbled, Settings::default());
        let response = router
            .oneshot(json_request(
                Method::POST,
                "/api/quiz",
                serde_json::json!({
                    "userAnswer": "Plants convert light into energy",
                    "currentQuestion": "What is photosynthesis?",
                    "documentSummary": "Photosynthesis basics",
                    "fileName": "bio.pdf"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["error"], QUIZ_FAILED);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_llm_call_times_out() {
        let mut settings = Settings::default();
        settings.server.timeout_seconds = 1;
        let router = router_with_backend(BrokenBackend::Stalled, settings);

        let response = router
            .oneshot(multipart_request(&[("notes.txt", "Mitochondria make ATP.")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    }
}
