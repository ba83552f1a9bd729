//! Adapter for upstreams that speak the OpenAI chat-completions protocol.
//!
//! One [`OpenAICompatibleProvider`] is configured per upstream (DeepInfra,
//! MakeHub, LaoZhang, TypeGPT, Codex, A4F, Workers). The adapter supplies
//! the base URL and bearer key, swaps the internal model id for the
//! upstream id, and normalizes whatever the upstream returns into the
//! canonical completion and chunk shapes.

use crate::catalog::default_models;
use crate::http::{build_client, status_error, transport_error};
use async_stream::try_stream;
use async_trait::async_trait;
use futures_util::StreamExt;
use gateway_core::{
    ChatChunk, ChatCompletion, ChatMessage, ChatRequest, Choice, ChunkChoice, ChunkDelta,
    ChunkStream, FinishReason, GatewayError, LanguageModel, MessageRole, ModelDescriptor,
    ProviderKind, ResponseMessage, Usage,
};
use gateway_resilience::{RetryPolicy, RetryPolicyBuilder};
use reqwest::{Client, RequestBuilder};
use reqwest_eventsource::{Event, EventSource};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, trace, warn};

/// Default API root for a provider kind, `None` when it must be configured
#[must_use]
pub fn default_base_url(kind: ProviderKind) -> Option<&'static str> {
    match kind {
        ProviderKind::DeepInfra => Some("https://api.deepinfra.com/v1/openai"),
        ProviderKind::MakeHub => Some("https://api.makehub.ai/v1"),
        ProviderKind::LaoZhang => Some("https://api.laozhang.ai/v1"),
        ProviderKind::TypeGpt => Some("https://api.typegpt.net/v1"),
        ProviderKind::A4f => Some("https://api.a4f.co/v1"),
        _ => None,
    }
}

/// OpenAI-compatible provider configuration
#[derive(Debug, Clone)]
pub struct OpenAICompatibleConfig {
    /// Provider kind
    pub kind: ProviderKind,
    /// API root, without the trailing `/chat/completions`
    pub base_url: String,
    /// Bearer key; requests go out unauthenticated without one
    pub api_key: Option<SecretString>,
    /// Request timeout
    pub timeout: Duration,
    /// Served models
    pub models: Vec<ModelDescriptor>,
    /// Retry policy wrapped around each call
    pub retry: Option<RetryPolicy>,
}

impl OpenAICompatibleConfig {
    /// Configuration with the kind's default base URL and model list.
    ///
    /// DeepInfra calls are retried up to three times on 429 and 5xx.
    ///
    /// # Errors
    /// Returns error if the kind has no default base URL
    pub fn for_kind(kind: ProviderKind) -> Result<Self, GatewayError> {
        let base_url = default_base_url(kind).ok_or_else(|| {
            GatewayError::configuration(format!("{kind} requires a configured base_url"))
        })?;
        Ok(Self::new(kind, base_url))
    }

    /// Configuration with an explicit base URL
    #[must_use]
    pub fn new(kind: ProviderKind, base_url: impl Into<String>) -> Self {
        let retry = (kind == ProviderKind::DeepInfra).then(|| {
            RetryPolicyBuilder::new()
                .max_attempts(3)
                .base_delay(Duration::from_millis(250))
                .retry_on_status(vec![429, 500, 502, 503, 504])
                .build()
        });

        Self {
            kind,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            timeout: Duration::from_secs(120),
            models: default_models(kind),
            retry,
        }
    }

    /// Set the API key
    #[must_use]
    pub fn with_api_key(mut self, key: SecretString) -> Self {
        self.api_key = Some(key);
        self
    }

    /// Set the timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set custom models
    #[must_use]
    pub fn with_models(mut self, models: Vec<ModelDescriptor>) -> Self {
        self.models = models;
        self
    }

    /// Set or clear the retry policy
    #[must_use]
    pub fn with_retry(mut self, retry: Option<RetryPolicy>) -> Self {
        self.retry = retry;
        self
    }
}

/// Provider for OpenAI-compatible upstreams
pub struct OpenAICompatibleProvider {
    config: OpenAICompatibleConfig,
    client: Client,
    completions_url: String,
}

impl OpenAICompatibleProvider {
    /// Create a new provider
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(config: OpenAICompatibleConfig) -> Result<Self, GatewayError> {
        let client = build_client(config.timeout)?;
        let completions_url = format!("{}/chat/completions", config.base_url);
        Ok(Self {
            config,
            client,
            completions_url,
        })
    }

    fn descriptor(&self, model: &str) -> Result<&ModelDescriptor, GatewayError> {
        self.model(model)
            .ok_or_else(|| GatewayError::model_not_found(model))
    }

    fn transform_request<'a>(
        request: &'a ChatRequest,
        model: &'a ModelDescriptor,
        stream: bool,
    ) -> UpstreamRequest<'a> {
        UpstreamRequest {
            model: &model.upstream_id,
            messages: &request.messages,
            stream,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            top_p: request.top_p,
            stop: request.stop.as_deref(),
            tools: request
                .tools
                .as_deref()
                .filter(|tools| model.supports_tools && !tools.is_empty()),
        }
    }

    fn request_builder(&self, body: &UpstreamRequest<'_>) -> RequestBuilder {
        let builder = self.client.post(&self.completions_url).json(body);
        match &self.config.api_key {
            Some(key) => builder.bearer_auth(key.expose_secret()),
            None => builder,
        }
    }

    async fn send_once(
        &self,
        body: &UpstreamRequest<'_>,
    ) -> Result<UpstreamCompletion, GatewayError> {
        let id = self.id();
        let response = self
            .request_builder(body)
            .send()
            .await
            .map_err(|e| transport_error(id, self.config.timeout, &e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            GatewayError::provider(id, format!("Failed to read response: {e}"), None, true)
        })?;
        trace!(provider = id, status = %status, "Received upstream response");

        if !status.is_success() {
            return Err(status_error(id, status.as_u16(), &text));
        }

        serde_json::from_str(&text).map_err(|e| {
            GatewayError::provider(id, format!("Invalid response JSON: {e}"), None, false)
        })
    }

    async fn open_stream_once(
        &self,
        body: &UpstreamRequest<'_>,
    ) -> Result<EventSource, GatewayError> {
        let id = self.id();
        let mut source = EventSource::new(self.request_builder(body)).map_err(|e| {
            GatewayError::provider(id, format!("Failed to create event source: {e}"), None, false)
        })?;
        source.set_retry_policy(Box::new(reqwest_eventsource::retry::Never));

        // The first event settles the HTTP status, so failures surface before
        // any chunk is handed to the caller
        match source.next().await {
            Some(Ok(Event::Open)) => Ok(source),
            Some(Ok(Event::Message(_))) => Err(GatewayError::streaming(
                "upstream sent data before the stream opened",
            )),
            Some(Err(reqwest_eventsource::Error::InvalidStatusCode(status, response))) => {
                source.close();
                let text = response.text().await.unwrap_or_default();
                Err(status_error(id, status.as_u16(), &text))
            }
            Some(Err(reqwest_eventsource::Error::Transport(e))) => {
                source.close();
                Err(transport_error(id, self.config.timeout, &e))
            }
            Some(Err(e)) => {
                source.close();
                Err(GatewayError::provider(id, format!("Stream error: {e}"), None, false))
            }
            None => Err(GatewayError::streaming("upstream closed the stream immediately")),
        }
    }

    fn normalize_completion(
        &self,
        upstream: UpstreamCompletion,
        model: &str,
        prompt_chars: usize,
    ) -> Result<ChatCompletion, GatewayError> {
        if upstream.choices.is_empty() {
            return Err(GatewayError::provider(
                self.id(),
                "No choices in response",
                None,
                false,
            ));
        }

        let choices: Vec<Choice> = upstream
            .choices
            .into_iter()
            .enumerate()
            .map(|(i, c)| Choice {
                index: c.index.unwrap_or(i as u32),
                message: ResponseMessage {
                    role: MessageRole::Assistant,
                    content: c.message.content,
                    tool_calls: c.message.tool_calls,
                },
                finish_reason: c
                    .finish_reason
                    .as_deref()
                    .and_then(FinishReason::from_openai)
                    .or(Some(FinishReason::Stop)),
            })
            .collect();

        let usage = upstream.usage.unwrap_or_else(|| {
            let completion_chars = choices
                .iter()
                .filter_map(|c| c.message.content.as_deref())
                .map(|c| c.chars().count())
                .sum();
            Usage::estimate(prompt_chars, completion_chars)
        });

        Ok(ChatCompletion {
            id: upstream
                .id
                .unwrap_or_else(|| format!("chatcmpl-{}", uuid::Uuid::new_v4().simple())),
            object: "chat.completion".to_string(),
            created: upstream
                .created
                .unwrap_or_else(|| chrono::Utc::now().timestamp()),
            model: model.to_string(),
            choices,
            usage,
        })
    }
}

#[async_trait]
impl LanguageModel for OpenAICompatibleProvider {
    fn id(&self) -> &str {
        self.config.kind.id()
    }

    fn kind(&self) -> ProviderKind {
        self.config.kind
    }

    fn has_credential(&self) -> bool {
        self.config.api_key.is_some()
    }

    fn models(&self) -> &[ModelDescriptor] {
        &self.config.models
    }

    async fn generate(&self, request: &ChatRequest) -> Result<ChatCompletion, GatewayError> {
        let model = self.descriptor(&request.model)?;
        let body = Self::transform_request(request, model, false);

        debug!(
            provider = self.id(),
            model = %model.upstream_id,
            "Sending chat completion request"
        );

        let upstream = match &self.config.retry {
            Some(policy) => policy.execute(|_| self.send_once(&body)).await?,
            None => self.send_once(&body).await?,
        };

        self.normalize_completion(upstream, &model.internal_id, request.prompt_chars())
    }

    async fn stream(&self, request: &ChatRequest) -> Result<ChunkStream, GatewayError> {
        let model = self.descriptor(&request.model)?;
        let body = Self::transform_request(request, model, true);

        debug!(
            provider = self.id(),
            model = %model.upstream_id,
            "Starting streaming request"
        );

        let source = match &self.config.retry {
            Some(policy) => policy.execute(|_| self.open_stream_once(&body)).await?,
            None => self.open_stream_once(&body).await?,
        };

        let model_id = model.internal_id.clone();
        let provider_id = self.id().to_string();

        let stream = try_stream! {
            let mut es = source;

            while let Some(event) = es.next().await {
                match event {
                    Ok(Event::Open) => {}
                    Ok(Event::Message(msg)) => {
                        let data = msg.data.trim();
                        if data == "[DONE]" {
                            es.close();
                            break;
                        }
                        match serde_json::from_str::<UpstreamChunk>(data) {
                            Ok(chunk) => yield chunk.into_chunk(&model_id),
                            Err(e) => {
                                warn!(provider = %provider_id, error = %e, "Skipping unparseable chunk");
                            }
                        }
                    }
                    Err(reqwest_eventsource::Error::StreamEnded) => break,
                    Err(e) => {
                        error!(provider = %provider_id, error = %e, "Upstream stream error");
                        es.close();
                        Err(GatewayError::streaming(format!("Stream error: {e}")))?;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

// Wire types

#[derive(Debug, Serialize)]
struct UpstreamRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [serde_json::Value]>,
}

#[derive(Debug, Deserialize)]
struct UpstreamCompletion {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    created: Option<i64>,
    #[serde(default)]
    choices: Vec<UpstreamChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct UpstreamChoice {
    #[serde(default)]
    index: Option<u32>,
    message: UpstreamMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct UpstreamMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct UpstreamChunk {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    created: Option<i64>,
    #[serde(default)]
    choices: Vec<UpstreamChunkChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct UpstreamChunkChoice {
    #[serde(default)]
    index: u32,
    #[serde(default)]
    delta: UpstreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct UpstreamDelta {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

impl UpstreamChunk {
    fn into_chunk(self, model: &str) -> ChatChunk {
        ChatChunk {
            id: self
                .id
                .unwrap_or_else(|| format!("chatcmpl-{}", uuid::Uuid::new_v4().simple())),
            object: "chat.completion.chunk".to_string(),
            created: self
                .created
                .unwrap_or_else(|| chrono::Utc::now().timestamp()),
            model: model.to_string(),
            choices: self
                .choices
                .into_iter()
                .map(|c| ChunkChoice {
                    index: c.index,
                    delta: ChunkDelta {
                        role: c
                            .delta
                            .role
                            .as_deref()
                            .filter(|r| *r == "assistant")
                            .map(|_| MessageRole::Assistant),
                        content: c.delta.content,
                    },
                    finish_reason: c.finish_reason.as_deref().and_then(FinishReason::from_openai),
                })
                .collect(),
            usage: self.usage,
        }
    }
}
