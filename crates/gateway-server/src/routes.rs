//! Route definitions for the gateway API.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::{handlers, middleware, state::AppState};

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health_check))
        .route("/healthz", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/readyz", get(handlers::readiness_check))
        .route("/live", get(handlers::liveness_check))
        .route("/livez", get(handlers::liveness_check))
        // Metrics endpoint
        .route("/metrics", get(handlers::metrics_endpoint))
        // OpenAI-compatible endpoints
        .nest("/v1", openai_routes())
        // Admin endpoints
        .nest("/admin", admin_routes())
        // Apply middleware
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(middleware::cors_layer())
        // Add state
        .with_state(state)
}

/// OpenAI-compatible API routes
fn openai_routes() -> Router<AppState> {
    Router::new()
        .route("/chat/completions", post(handlers::chat_completion))
        .route("/models", get(handlers::list_models))
        .route("/models/:model_id", get(handlers::get_model))
}

/// Admin routes
fn admin_routes() -> Router<AppState> {
    Router::new().route("/providers", get(handlers::list_providers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::StreamExt;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use gateway_config::GatewayConfig;
    use gateway_core::{
        ChatChunk, ChatCompletion, ChatRequest, ChunkStream, FinishReason, GatewayError,
        LanguageModel, MessageRole, ModelDescriptor, ProviderKind, Usage,
    };
    use gateway_providers::{BespokeConfig, BespokeProvider};
    use gateway_routing::Catalog;
    use http_body_util::BodyExt;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Records the last request it saw and answers with canned content
    struct EchoModel {
        kind: ProviderKind,
        models: Vec<ModelDescriptor>,
        seen: Mutex<Option<ChatRequest>>,
        fail_with: Option<fn() -> GatewayError>,
    }

    impl EchoModel {
        fn new(kind: ProviderKind, models: Vec<ModelDescriptor>) -> Self {
            Self {
                kind,
                models,
                seen: Mutex::new(None),
                fail_with: None,
            }
        }
    }

    #[async_trait]
    impl LanguageModel for EchoModel {
        fn id(&self) -> &str {
            self.kind.id()
        }

        fn kind(&self) -> ProviderKind {
            self.kind
        }

        fn has_credential(&self) -> bool {
            true
        }

        fn models(&self) -> &[ModelDescriptor] {
            &self.models
        }

        async fn generate(&self, request: &ChatRequest) -> Result<ChatCompletion, GatewayError> {
            *self.seen.lock().unwrap() = Some(request.clone());
            if let Some(fail) = self.fail_with {
                return Err(fail());
            }
            Ok(ChatCompletion::assistant_text(
                request.model.clone(),
                "hello from the stub",
                Usage::estimate(request.prompt_chars(), 19),
            ))
        }

        async fn stream(&self, request: &ChatRequest) -> Result<ChunkStream, GatewayError> {
            *self.seen.lock().unwrap() = Some(request.clone());
            let model = request.model.clone();
            let chunks = vec![
                Ok(ChatChunk::content(
                    "chatcmpl-1",
                    &model,
                    0,
                    Some(MessageRole::Assistant),
                    "hi",
                )),
                Ok(ChatChunk::finish(
                    "chatcmpl-1",
                    &model,
                    0,
                    FinishReason::Stop,
                    Some(Usage::estimate(2, 2)),
                )),
            ];
            Ok(futures::stream::iter(chunks).boxed())
        }
    }

    fn descriptor(kind: ProviderKind, id: &str, name: &str) -> ModelDescriptor {
        ModelDescriptor::new(kind.id(), id).with_display_name(name)
    }

    fn build_state(providers: Vec<Arc<dyn LanguageModel>>) -> AppState {
        let config = GatewayConfig::default();
        let catalog = Catalog::new(
            providers,
            &config.display_order,
            config.search_variants.clone(),
        );
        AppState::builder()
            .config(config)
            .catalog(catalog)
            .build()
            .unwrap()
    }

    fn create_test_state() -> (AppState, Arc<EchoModel>) {
        let google = Arc::new(EchoModel::new(
            ProviderKind::Google,
            vec![
                descriptor(ProviderKind::Google, "gemini-2.0-flash", "Gemini 2.0 Flash"),
                descriptor(
                    ProviderKind::Google,
                    "gemini-2.0-flash-search",
                    "Gemini 2.0 Flash Search",
                ),
            ],
        ));
        let grok: Arc<dyn LanguageModel> = Arc::new(EchoModel::new(
            ProviderKind::Grok,
            vec![descriptor(ProviderKind::Grok, "grok-3", "Grok 3")],
        ));
        let state = build_state(vec![grok, google.clone() as Arc<dyn LanguageModel>]);
        (state, google)
    }

    fn chat_request(model: &str, content: &str, stream: bool) -> Request<Body> {
        let body = serde_json::json!({
            "model": model,
            "stream": stream,
            "messages": [{"role": "user", "content": content}],
        });
        Request::builder()
            .method("POST")
            .uri("/v1/chat/completions")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (state, _) = create_test_state();
        let app = create_router(state);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["models"], 3);
    }

    #[tokio::test]
    async fn test_readiness_without_providers() {
        let app = create_router(build_state(Vec::new()));

        let response = app
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_models_endpoint() {
        let (state, _) = create_test_state();
        let app = create_router(state);

        let response = app
            .oneshot(Request::builder().uri("/v1/models").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["object"], "list");
        let data = body["data"].as_array().unwrap();
        assert_eq!(data.len(), 3);
        // Google ranks ahead of Grok in the default display order
        assert_eq!(data[0]["id"], "gemini-2.0-flash");
        assert_eq!(data[0]["display_name"], "Gemini 2.0 Flash");
        assert_eq!(data[0]["provider"], "Google");
        assert_eq!(data[2]["id"], "grok-3");
    }

    #[tokio::test]
    async fn test_get_model_by_display_name() {
        let (state, _) = create_test_state();
        let app = create_router(state);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/v1/models/Grok%203")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["id"], "grok-3");

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1/models/missing")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"]["type"], "model_not_found");
    }

    #[tokio::test]
    async fn test_providers_endpoint() {
        let (state, _) = create_test_state();
        let app = create_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/admin/providers")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = body_json(response).await;
        assert_eq!(body[0]["provider_id"], "google");
        assert_eq!(body[1]["provider_id"], "grok");
        assert_eq!(body[0]["order_rank"], 0);
    }

    #[tokio::test]
    async fn test_chat_completion_json() {
        let (state, google) = create_test_state();
        let app = create_router(state);

        let response = app
            .oneshot(chat_request("Gemini 2.0 Flash", "write a poem", false))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["object"], "chat.completion");
        assert_eq!(body["choices"][0]["message"]["content"], "hello from the stub");
        assert_eq!(body["model"], "gemini-2.0-flash");

        let seen = google.seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.model, "gemini-2.0-flash");
    }

    #[tokio::test]
    async fn test_search_query_reroutes() {
        let (state, google) = create_test_state();
        let metrics = state.metrics.clone();
        let app = create_router(state);

        let response = app
            .oneshot(chat_request(
                "gemini-2.0-flash",
                "what is the current price of bitcoin",
                false,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let seen = google.seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.model, "gemini-2.0-flash-search");
        assert!(metrics
            .gather()
            .unwrap()
            .contains("gateway_search_reroutes_total 1"));
    }

    #[tokio::test]
    async fn test_long_prompt_truncated() {
        let (state, _) = create_test_state();
        let grok = state.catalog.resolve("grok-3", None).unwrap();
        assert_eq!(grok.descriptor.context_char_limit, 6_000);
        let app = create_router(state);

        let response = app
            .oneshot(chat_request("grok-3", &"a".repeat(50_000), false))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        // 50,000 characters are ~12,500 tokens; the truncated prompt is far smaller
        let body = body_json(response).await;
        assert!(body["usage"]["prompt_tokens"].as_u64().unwrap() < 1_600);
    }

    #[tokio::test]
    async fn test_streaming_response() {
        let (state, _) = create_test_state();
        let app = create_router(state);

        let response = app
            .oneshot(chat_request("gemini-2.0-flash", "hello", true))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );
        let text = body_text(response).await;
        assert!(text.contains("\"object\":\"chat.completion.chunk\""));
        assert!(text.contains("\"finish_reason\":\"stop\""));
        assert!(text.trim_end().ends_with("data: [DONE]"));
    }

    #[tokio::test]
    async fn test_unknown_model_404() {
        let (state, _) = create_test_state();
        let app = create_router(state);

        let response = app
            .oneshot(chat_request("no-such-model", "hi", false))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"]["type"], "model_not_found");
    }

    #[tokio::test]
    async fn test_invalid_body_400() {
        let (state, _) = create_test_state();
        let app = create_router(state);

        let request = Request::builder()
            .method("POST")
            .uri("/v1/chat/completions")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"model": "grok-3", "messages": []}"#))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["type"], "invalid_request_error");
    }

    #[tokio::test]
    async fn test_upstream_failure_is_500() {
        fn all_keys_rejected() -> GatewayError {
            GatewayError::exhausted(3, "all keys rejected")
        }
        let mut failing = EchoModel::new(
            ProviderKind::DeepInfra,
            vec![descriptor(ProviderKind::DeepInfra, "llama", "Llama")],
        );
        failing.fail_with = Some(all_keys_rejected as fn() -> GatewayError);
        let failing: Arc<dyn LanguageModel> = Arc::new(failing);
        let app = create_router(build_state(vec![failing]));

        let response = app
            .oneshot(chat_request("llama", "hi", false))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"]["type"], "all_attempts_failed");
    }

    #[tokio::test]
    async fn test_synthetic_stream_end_to_end() {
        let upstream = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ask"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"response": "Hello brave new world"})),
            )
            .mount(&upstream)
            .await;

        let config = BespokeConfig::new(ProviderKind::Grok, &format!("{}/ask", upstream.uri()))
            .unwrap()
            .with_word_delay(Duration::ZERO);
        let grok: Arc<dyn LanguageModel> = Arc::new(BespokeProvider::new(config).unwrap());
        let state = build_state(vec![grok]);
        let metrics = state.metrics.clone();
        let app = create_router(state);

        let response = app
            .oneshot(chat_request("grok-3", "greet me", true))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let text = body_text(response).await;
        let frames: Vec<&str> = text
            .split("\n\n")
            .filter(|f| f.starts_with("data: "))
            .collect();
        // four word chunks, the finish chunk, then [DONE]
        assert_eq!(frames.len(), 6);
        assert_eq!(frames.last(), Some(&"data: [DONE]"));
        assert!(frames[4].contains("\"usage\""));
        assert!(metrics
            .gather()
            .unwrap()
            .contains(r#"gateway_synthetic_streams_total{provider="grok"} 1"#));
    }
}
