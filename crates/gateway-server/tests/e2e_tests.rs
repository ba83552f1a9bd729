//! End-to-end tests for the chat model gateway.
//!
//! Each test builds the catalog from a `GatewayConfig` whose providers point
//! at `wiremock` upstreams, then drives the axum router with `oneshot`.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use gateway_config::GatewayConfig;
use gateway_core::ProviderKind;
use gateway_routing::build_registry_with_observer;
use gateway_server::routes::create_router;
use gateway_server::AppState;
use gateway_telemetry::Metrics;
use http_body_util::BodyExt;
use secrecy::SecretString;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{header as header_eq, method, path, query_param};
use wiremock::{Mock, MockServer, Request as MockRequest, Respond, ResponseTemplate};

fn secret(value: &str) -> Option<SecretString> {
    Some(SecretString::new(value.to_string()))
}

/// Disable every provider, then let the test enable what it needs
fn isolated_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    for kind in ProviderKind::ALL {
        config.provider_mut(kind).enabled = false;
    }
    config.stream_word_delay = Duration::ZERO;
    config
}

fn enable(config: &mut GatewayConfig, kind: ProviderKind, base_url: String) {
    let settings = config.provider_mut(kind);
    settings.enabled = true;
    settings.base_url = Some(base_url);
}

fn app(config: GatewayConfig) -> (axum::Router, Metrics) {
    let metrics = Metrics::new().unwrap();
    let catalog = build_registry_with_observer(&config, metrics.attempt_observer()).unwrap();
    let state = AppState::builder()
        .config(config)
        .catalog(catalog)
        .metrics(metrics.clone())
        .build()
        .unwrap();
    (create_router(state), metrics)
}

fn chat(model: &str, content: &str, stream: bool) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/v1/chat/completions")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({
                "model": model,
                "stream": stream,
                "messages": [
                    {"role": "system", "content": "Be brief."},
                    {"role": "user", "content": content}
                ]
            })
            .to_string(),
        ))
        .unwrap()
}

async fn read_json(response: axum::response::Response) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

async fn read_text(response: axum::response::Response) -> String {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(body.to_vec()).unwrap()
}

fn openai_reply(model: &str, content: &str) -> Value {
    json!({
        "id": "chatcmpl-upstream",
        "object": "chat.completion",
        "created": 1_700_000_000,
        "model": model,
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 4, "completion_tokens": 2, "total_tokens": 6}
    })
}

fn gemini_reply(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }],
        "usageMetadata": {"promptTokenCount": 4, "candidatesTokenCount": 2, "totalTokenCount": 6}
    })
}

/// Rate-limits the first `failures` calls, then answers
struct FlakyUpstream {
    failures: u32,
    calls: Arc<AtomicU32>,
    reply: Value,
}

impl Respond for FlakyUpstream {
    fn respond(&self, _request: &MockRequest) -> ResponseTemplate {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            ResponseTemplate::new(429).set_body_json(json!({"error": {"message": "slow down"}}))
        } else {
            ResponseTemplate::new(200).set_body_json(self.reply.clone())
        }
    }
}

#[cfg(test)]
mod openai_compatible_tests {
    use super::*;

    #[tokio::test]
    async fn test_deepinfra_model_id_mapping() {
        let upstream = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header_eq("authorization", "Bearer di-test-key"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(openai_reply("meta-llama/Llama-3.3-70B-Instruct", "Hi!")),
            )
            .expect(1)
            .mount(&upstream)
            .await;

        let mut config = isolated_config();
        enable(&mut config, ProviderKind::DeepInfra, upstream.uri());
        config.provider_mut(ProviderKind::DeepInfra).api_key = secret("di-test-key");
        let (app, _) = app(config);

        let response = app
            .oneshot(chat("Llama 3.3 70B", "hello", false))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = read_json(response).await;
        assert_eq!(json["object"], "chat.completion");
        assert_eq!(json["model"], "meta-llama-Llama-3.3-70B-Instruct");
        assert_eq!(json["choices"][0]["message"]["content"], "Hi!");
    }

    #[tokio::test]
    async fn test_deepinfra_retries_rate_limits() {
        let upstream = MockServer::start().await;
        let calls = Arc::new(AtomicU32::new(0));
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(FlakyUpstream {
                failures: 2,
                calls: Arc::clone(&calls),
                reply: openai_reply("deepseek-ai/DeepSeek-V3", "third time lucky"),
            })
            .mount(&upstream)
            .await;

        let mut config = isolated_config();
        enable(&mut config, ProviderKind::DeepInfra, upstream.uri());
        let (app, _) = app(config);

        let response = app
            .oneshot(chat("deepseek-ai-DeepSeek-V3", "hello", false))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_upstream_error_envelope() {
        let upstream = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({"error": {"message": "invalid api key"}})),
            )
            .mount(&upstream)
            .await;

        let mut config = isolated_config();
        enable(&mut config, ProviderKind::MakeHub, upstream.uri());
        let (app, metrics) = app(config);

        let response = app
            .oneshot(chat("openai-gpt-4o", "hello", false))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = read_json(response).await;
        assert_eq!(json["error"]["type"], "authentication_error");
        assert!(json["error"]["message"]
            .as_str()
            .unwrap()
            .contains("invalid api key"));
        assert!(metrics.gather().unwrap().contains(
            r#"gateway_chat_completions_total{mode="json",outcome="error",provider="makehub"} 1"#
        ));
    }
}

#[cfg(test)]
mod upstream_not_found_tests {
    use super::*;

    #[tokio::test]
    async fn test_upstream_404_is_a_500_envelope() {
        let upstream = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(json!({"error": {"message": "model xyz does not exist"}})),
            )
            .mount(&upstream)
            .await;

        let mut config = isolated_config();
        enable(&mut config, ProviderKind::TypeGpt, upstream.uri());
        let (app, _) = app(config);

        let response = app
            .oneshot(chat("gpt-4.1", "hello", false))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = read_json(response).await;
        assert_eq!(json["error"]["type"], "upstream_error");
        let message = json["error"]["message"].as_str().unwrap();
        assert!(message.contains("model xyz does not exist"));
        assert!(!message.starts_with("Model not found"));
    }
}

#[cfg(test)]
mod google_tests {
    use super::*;

    #[tokio::test]
    async fn test_key_rotation_through_the_api() {
        let upstream = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.0-flash:generateContent"))
            .and(header_eq("x-goog-api-key", "AIzaSy-good-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply("rotated")))
            .expect(1)
            .mount(&upstream)
            .await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.0-flash:generateContent"))
            .and(header_eq("x-goog-api-key", "AIzaSy-spent-key"))
            .respond_with(
                ResponseTemplate::new(429)
                    .set_body_json(json!({"error": {"message": "quota exceeded"}})),
            )
            .mount(&upstream)
            .await;

        let mut config = isolated_config();
        enable(&mut config, ProviderKind::Google, upstream.uri());
        config.provider_mut(ProviderKind::Google).api_key =
            secret("AIzaSy-spent-key;AIzaSy-good-key");
        let (app, metrics) = app(config);

        let response = app
            .oneshot(chat("gemini-2.0-flash", "write a haiku", false))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = read_json(response).await;
        assert_eq!(json["choices"][0]["message"]["content"], "rotated");
        assert!(metrics.gather().unwrap().contains(
            r#"gateway_credential_attempts_total{outcome="success",provider="google"} 1"#
        ));
    }

    #[tokio::test]
    async fn test_search_query_uses_search_variant() {
        let upstream = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.0-flash:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply("42,000 USD")))
            .expect(1)
            .mount(&upstream)
            .await;

        let mut config = isolated_config();
        enable(&mut config, ProviderKind::Google, upstream.uri());
        config.provider_mut(ProviderKind::Google).api_key = secret("AIzaSy-only-key");
        let (app, _) = app(config);

        let response = app
            .oneshot(chat(
                "gemini-2.0-flash",
                "what is the current price of bitcoin",
                false,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = read_json(response).await;
        assert_eq!(json["model"], "gemini-2.0-flash-search");

        let requests = upstream.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert!(body["tools"][0].get("googleSearch").is_some());
    }
}

#[cfg(test)]
mod synthetic_stream_tests {
    use super::*;

    #[tokio::test]
    async fn test_sonnet_free_stream() {
        let upstream = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chat"))
            .and(query_param("text", "say hi"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"response": "Hi there friend"})),
            )
            .expect(1)
            .mount(&upstream)
            .await;

        let mut config = isolated_config();
        enable(
            &mut config,
            ProviderKind::SonnetFree,
            format!("{}/chat", upstream.uri()),
        );
        let (app, _) = app(config);

        let response = app
            .oneshot(chat("Claude Sonnet 4 (Free)", "say hi", true))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let text = read_text(response).await;
        let payloads: Vec<&str> = text
            .split("\n\n")
            .filter_map(|frame| frame.strip_prefix("data: "))
            .collect();

        assert_eq!(payloads.len(), 5);
        assert_eq!(payloads[4], "[DONE]");

        let chunks: Vec<Value> = payloads[..4]
            .iter()
            .map(|p| serde_json::from_str(p).unwrap())
            .collect();
        let content: String = chunks
            .iter()
            .filter_map(|c| c["choices"][0]["delta"]["content"].as_str())
            .collect();
        assert_eq!(content, "Hi there friend");
        assert!(chunks.iter().all(|c| c["id"] == chunks[0]["id"]));
        assert_eq!(chunks[3]["choices"][0]["finish_reason"], "stop");
        assert!(chunks[3]["usage"]["total_tokens"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_stream_open_failure_is_json_error() {
        let upstream = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&upstream)
            .await;

        let mut config = isolated_config();
        enable(&mut config, ProviderKind::GptOss, upstream.uri());
        let (app, _) = app(config);

        let response = app
            .oneshot(chat("gpt-oss-120b", "hello", true))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );
    }
}

#[cfg(test)]
mod listing_tests {
    use super::*;

    #[tokio::test]
    async fn test_models_and_providers_listing_order() {
        let upstream = MockServer::start().await;
        let mut config = isolated_config();
        enable(&mut config, ProviderKind::TypeGpt, upstream.uri());
        enable(&mut config, ProviderKind::Grok, format!("{}/ask", upstream.uri()));
        enable(&mut config, ProviderKind::Google, upstream.uri());
        config.provider_mut(ProviderKind::Google).api_key = secret("AIzaSy-only-key");
        let (app, _) = app(config);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/admin/providers")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let providers = read_json(response).await;
        let ids: Vec<&str> = providers
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["provider_id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["google", "grok", "typegpt"]);

        let response = app
            .oneshot(Request::builder().uri("/v1/models").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let models = read_json(response).await;
        let data = models["data"].as_array().unwrap();
        assert_eq!(data[0]["owned_by"], "google");
        assert_eq!(data.last().unwrap()["owned_by"], "typegpt");
        assert!(data.iter().all(|m| m["display_name"].is_string()));
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let (app, _) = app(isolated_config());

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let text = read_text(response).await;
        assert!(text.contains("gateway_search_reroutes_total 0"));
    }
}
