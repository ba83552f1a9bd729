//! Google Gemini provider implementation.
//!
//! Talks to the Generative Language API directly and runs every call
//! through a [`CredentialRotator`], so a key that is rate limited, revoked
//! or over quota is skipped in favor of the next one in the pool.
//!
//! # API Format
//! - `{base}/models/{MODEL}:generateContent`
//! - `{base}/models/{MODEL}:streamGenerateContent?alt=sse`

use crate::catalog::{default_models, SEARCH_SUFFIX};
use crate::http::{build_client, error_message, transport_error};
use async_stream::try_stream;
use async_trait::async_trait;
use futures_util::StreamExt;
use gateway_core::{
    ChatChunk, ChatCompletion, ChatRequest, ChunkStream, ContentPart, FinishReason, GatewayError,
    LanguageModel, MessageContent, MessageRole, ModelDescriptor, ProviderKind, Usage,
};
use gateway_resilience::{AttemptObserver, CredentialPool, CredentialRotator};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Default Generative Language API root
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google provider configuration
#[derive(Clone)]
pub struct GoogleConfig {
    /// API root
    pub base_url: String,
    /// Keys to rotate through
    pub pool: CredentialPool,
    /// Request timeout
    pub timeout: Duration,
    /// Supported models
    pub models: Vec<ModelDescriptor>,
    /// Per-attempt callback handed to the rotator
    pub observer: Option<AttemptObserver>,
}

impl GoogleConfig {
    /// Configuration for a delimited key list
    #[must_use]
    pub fn new(keys: &SecretString) -> Self {
        Self::with_pool(CredentialPool::from_secret(keys))
    }

    /// Configuration for an already parsed pool
    #[must_use]
    pub fn with_pool(pool: CredentialPool) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            pool,
            timeout: Duration::from_secs(120),
            models: default_models(ProviderKind::Google),
            observer: None,
        }
    }

    /// Set the API root
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Report rotation attempts to `observer`
    #[must_use]
    pub fn with_observer(mut self, observer: AttemptObserver) -> Self {
        self.observer = Some(observer);
        self
    }
}

impl std::fmt::Debug for GoogleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleConfig")
            .field("base_url", &self.base_url)
            .field("pool", &self.pool)
            .field("timeout", &self.timeout)
            .field("models", &self.models.len())
            .finish_non_exhaustive()
    }
}

/// Google Gemini provider implementation
pub struct GoogleProvider {
    base_url: String,
    timeout: Duration,
    models: Vec<ModelDescriptor>,
    client: Client,
    rotator: CredentialRotator,
}

impl GoogleProvider {
    /// Create a new Google provider
    ///
    /// # Errors
    /// Returns error if the pool is empty or the HTTP client cannot be created
    pub fn new(config: GoogleConfig) -> Result<Self, GatewayError> {
        if config.pool.is_empty() {
            return Err(GatewayError::configuration(
                "Google requires at least one API key of 10 or more characters",
            ));
        }

        let client = build_client(config.timeout)?;
        let mut rotator = CredentialRotator::new(ProviderKind::Google.id(), config.pool);
        if let Some(observer) = config.observer {
            rotator = rotator.with_observer(observer);
        }

        Ok(Self {
            base_url: config.base_url,
            timeout: config.timeout,
            models: config.models,
            client,
            rotator,
        })
    }

    /// Build the endpoint URL for a model
    fn endpoint_url(&self, model: &str, streaming: bool) -> String {
        if streaming {
            format!("{}/models/{model}:streamGenerateContent?alt=sse", self.base_url)
        } else {
            format!("{}/models/{model}:generateContent", self.base_url)
        }
    }

    /// Transform a canonical request to Google's format
    fn transform_request(request: &ChatRequest, model: &ModelDescriptor) -> GoogleRequest {
        let mut contents = Vec::new();
        let mut system_parts = Vec::new();

        for message in &request.messages {
            match message.role {
                // Gemini takes system prompts separately
                MessageRole::System => system_parts.push(GooglePart::Text {
                    text: message.content.joined_text(),
                }),
                MessageRole::User | MessageRole::Tool => contents.push(GoogleContent {
                    role: Some("user".to_string()),
                    parts: Self::transform_content(&message.content),
                }),
                MessageRole::Assistant => contents.push(GoogleContent {
                    role: Some("model".to_string()),
                    parts: Self::transform_content(&message.content),
                }),
            }
        }

        let system_instruction = (!system_parts.is_empty()).then(|| GoogleContent {
            role: None,
            parts: system_parts,
        });

        let generation_config = GoogleGenerationConfig {
            temperature: request.temperature,
            top_p: request.top_p,
            max_output_tokens: request.max_tokens,
            stop_sequences: request.stop.clone(),
        };

        let tools = if model.internal_id.ends_with(SEARCH_SUFFIX) {
            Some(vec![GoogleTool::search()])
        } else if model.supports_tools {
            request
                .tools
                .as_deref()
                .map(Self::function_declarations)
                .filter(|decls| !decls.is_empty())
                .map(|function_declarations| {
                    vec![GoogleTool {
                        function_declarations: Some(function_declarations),
                        google_search: None,
                    }]
                })
        } else {
            None
        };

        GoogleRequest {
            contents,
            system_instruction,
            generation_config: Some(generation_config),
            tools,
        }
    }

    /// Pull function declarations out of OpenAI-style tool definitions
    fn function_declarations(tools: &[serde_json::Value]) -> Vec<GoogleFunctionDeclaration> {
        tools
            .iter()
            .filter_map(|tool| {
                let function = tool.get("function")?;
                Some(GoogleFunctionDeclaration {
                    name: function.get("name")?.as_str()?.to_string(),
                    description: function
                        .get("description")
                        .and_then(|d| d.as_str())
                        .map(str::to_string),
                    parameters: function.get("parameters").cloned(),
                })
            })
            .collect()
    }

    /// Transform message content to Google parts
    fn transform_content(content: &MessageContent) -> Vec<GooglePart> {
        match content {
            MessageContent::Text(text) => vec![GooglePart::Text { text: text.clone() }],
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(GooglePart::Text { text: text.clone() }),
                    ContentPart::ImageUrl { image_url } => {
                        if let Some((mime_type, data)) = Self::parse_data_url(&image_url.url) {
                            Some(GooglePart::InlineData {
                                inline_data: GoogleInlineData { mime_type, data },
                            })
                        } else {
                            warn!("External image URLs not supported by Gemini, skipping");
                            None
                        }
                    }
                })
                .collect(),
        }
    }

    /// Parse a data URL into mime type and base64 data
    fn parse_data_url(url: &str) -> Option<(String, String)> {
        let without_prefix = url.strip_prefix("data:")?;
        let (meta, data) = without_prefix.split_once(',')?;

        let mime_type = meta.strip_suffix(";base64").unwrap_or(meta).to_string();
        Some((mime_type, data.to_string()))
    }

    /// Text of the first candidate
    fn candidate_text(candidate: &GoogleCandidate) -> String {
        candidate
            .content
            .as_ref()
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| match p {
                        GooglePart::Text { text } => Some(text.as_str()),
                        _ => None,
                    })
                    .collect::<String>()
            })
            .unwrap_or_default()
    }

    /// Transform Google response to the canonical completion
    fn transform_response(
        response: GoogleResponse,
        model: &str,
        prompt_chars: usize,
    ) -> Result<ChatCompletion, GatewayError> {
        let candidate = response.candidates.into_iter().next().ok_or_else(|| {
            GatewayError::provider("google", "No candidates in response", None, false)
        })?;

        let content = Self::candidate_text(&candidate);
        let usage = response.usage_metadata.map_or_else(
            || Usage::estimate(prompt_chars, content.chars().count()),
            GoogleUsageMetadata::into_usage,
        );

        let mut completion = ChatCompletion::assistant_text(model, content, usage);
        if let Some(choice) = completion.choices.first_mut() {
            choice.finish_reason = candidate
                .finish_reason
                .as_deref()
                .map(Self::map_finish_reason)
                .or(Some(FinishReason::Stop));
        }
        Ok(completion)
    }

    /// Map Google finish reason to the canonical one
    fn map_finish_reason(reason: &str) -> FinishReason {
        match reason {
            "MAX_TOKENS" => FinishReason::Length,
            "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" => {
                FinishReason::ContentFilter
            }
            _ => FinishReason::Stop,
        }
    }

    /// Parse error response, keeping the exact status for rotation
    fn parse_error(status: u16, body: &str) -> GatewayError {
        let message = error_message(body);
        match status {
            401 | 403 => GatewayError::authentication(message, status),
            429 => GatewayError::rate_limit(None, Some(message)),
            500..=599 => GatewayError::provider("google", message, Some(status), true),
            _ => GatewayError::provider("google", message, Some(status), false),
        }
    }

    async fn post(
        &self,
        url: &str,
        body: &GoogleRequest,
        key: SecretString,
    ) -> Result<reqwest::Response, GatewayError> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", key.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error("google", self.timeout, &e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().await.unwrap_or_default();
        Err(Self::parse_error(status.as_u16(), &text))
    }

    async fn generate_with_key(
        &self,
        url: &str,
        body: &GoogleRequest,
        key: SecretString,
    ) -> Result<GoogleResponse, GatewayError> {
        let response = self.post(url, body, key).await?;
        let text = response.text().await.map_err(|e| {
            GatewayError::provider("google", format!("Failed to read response: {e}"), None, true)
        })?;
        trace!(body = %text, "Received Google response");

        serde_json::from_str(&text).map_err(|e| {
            GatewayError::provider("google", format!("Invalid response JSON: {e}"), None, false)
        })
    }

    fn descriptor(&self, model: &str) -> Result<&ModelDescriptor, GatewayError> {
        self.model(model)
            .ok_or_else(|| GatewayError::model_not_found(model))
    }
}

#[async_trait]
impl LanguageModel for GoogleProvider {
    fn id(&self) -> &str {
        ProviderKind::Google.id()
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    fn has_credential(&self) -> bool {
        !self.rotator.pool().is_empty()
    }

    fn models(&self) -> &[ModelDescriptor] {
        &self.models
    }

    async fn generate(&self, request: &ChatRequest) -> Result<ChatCompletion, GatewayError> {
        let model = self.descriptor(&request.model)?;
        let url = self.endpoint_url(&model.upstream_id, false);
        let body = Self::transform_request(request, model);

        debug!(
            provider = "google",
            model = %model.internal_id,
            keys = self.rotator.pool().len(),
            "Sending chat completion request"
        );

        let response = self
            .rotator
            .execute(|key| self.generate_with_key(&url, &body, key))
            .await?;

        Self::transform_response(response, &model.internal_id, request.prompt_chars())
    }

    async fn stream(&self, request: &ChatRequest) -> Result<ChunkStream, GatewayError> {
        let model = self.descriptor(&request.model)?;
        let url = self.endpoint_url(&model.upstream_id, true);
        let body = Self::transform_request(request, model);

        debug!(
            provider = "google",
            model = %model.internal_id,
            "Sending streaming chat completion request"
        );

        // Rotation covers opening the stream; once bytes flow the key is fixed
        let response = self
            .rotator
            .execute(|key| self.post(&url, &body, key))
            .await?;

        let model_id = model.internal_id.clone();
        let prompt_chars = request.prompt_chars();
        let id = format!("chatcmpl-{}", uuid::Uuid::new_v4().simple());
        let created = chrono::Utc::now().timestamp();

        let stream = try_stream! {
            let mut byte_stream = response.bytes_stream();
            let mut buffer: Vec<u8> = Vec::new();
            let mut first = true;
            let mut completion_chars = 0usize;
            let mut usage = None;
            let mut finish = None;

            while let Some(chunk_result) = byte_stream.next().await {
                let chunk = chunk_result.map_err(|e| {
                    GatewayError::streaming(format!("Stream error: {e}"))
                })?;
                buffer.extend_from_slice(&chunk);

                while let Some(event) = drain_event(&mut buffer) {

                    for line in event.lines() {
                        let Some(data) = line.strip_prefix("data:").map(str::trim) else {
                            continue;
                        };
                        let Ok(response) = serde_json::from_str::<GoogleResponse>(data) else {
                            warn!("Skipping unparseable Gemini chunk");
                            continue;
                        };
                        if let Some(metadata) = response.usage_metadata {
                            usage = Some(metadata.into_usage());
                        }
                        let Some(candidate) = response.candidates.into_iter().next() else {
                            continue;
                        };
                        if let Some(reason) = candidate.finish_reason.as_deref() {
                            finish = Some(Self::map_finish_reason(reason));
                        }
                        let text = Self::candidate_text(&candidate);
                        if text.is_empty() {
                            continue;
                        }
                        completion_chars += text.chars().count();
                        let role = first.then_some(MessageRole::Assistant);
                        first = false;
                        yield ChatChunk::content(id.clone(), model_id.clone(), created, role, text);
                    }
                }
            }

            let usage = usage.unwrap_or_else(|| Usage::estimate(prompt_chars, completion_chars));
            yield ChatChunk::finish(
                id.clone(),
                model_id.clone(),
                created,
                finish.unwrap_or(FinishReason::Stop),
                Some(usage),
            );
        };

        Ok(Box::pin(stream))
    }
}

// Google API Types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GoogleRequest {
    contents: Vec<GoogleContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GoogleContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GoogleGenerationConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GoogleTool>>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GooglePart>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum GooglePart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GoogleInlineData,
    },
    Other(serde_json::Value),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GoogleGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GoogleTool {
    #[serde(skip_serializing_if = "Option::is_none")]
    function_declarations: Option<Vec<GoogleFunctionDeclaration>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    google_search: Option<serde_json::Value>,
}

impl GoogleTool {
    fn search() -> Self {
        Self {
            function_declarations: None,
            google_search: Some(serde_json::json!({})),
        }
    }
}

#[derive(Debug, Serialize)]
struct GoogleFunctionDeclaration {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleResponse {
    #[serde(default)]
    candidates: Vec<GoogleCandidate>,
    #[serde(default)]
    usage_metadata: Option<GoogleUsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleCandidate {
    #[serde(default)]
    content: Option<GoogleContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleUsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: Option<u32>,
    #[serde(default)]
    total_token_count: Option<u32>,
}

impl GoogleUsageMetadata {
    fn into_usage(self) -> Usage {
        let completion = self.candidates_token_count.unwrap_or(0);
        Usage {
            prompt_tokens: self.prompt_token_count,
            completion_tokens: completion,
            total_tokens: self
                .total_token_count
                .unwrap_or(self.prompt_token_count + completion),
        }
    }
}

/// Remove the next complete SSE event from `buffer` and decode it.
///
/// Decoding waits for the blank-line terminator, so a multi-byte character
/// split across network reads is reassembled before it becomes text.
fn drain_event(buffer: &mut Vec<u8>) -> Option<String> {
    let end = buffer.windows(2).position(|w| w == b"\n\n")? + 2;
    let event: Vec<u8> = buffer.drain(..end).collect();
    Some(String::from_utf8_lossy(&event).into_owned())
}
