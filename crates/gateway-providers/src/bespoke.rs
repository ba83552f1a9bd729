//! Adapters for single-prompt upstreams (Grok, GPT-OSS, Sonnet-Free).
//!
//! These endpoints take one prompt and answer `{"response": "..."}` in a
//! single piece. The adapter sends the last user message, then shapes the
//! reply as a completion or replays it through a [`SyntheticStream`].

use crate::catalog::default_models;
use crate::http::{build_client, error_message, transport_error};
use crate::synthetic::SyntheticStream;
use async_trait::async_trait;
use gateway_core::{
    ChatCompletion, ChatRequest, ChunkStream, GatewayError, LanguageModel, ModelDescriptor,
    ProviderKind, Usage,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// How the prompt travels to the upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptTransport {
    /// `GET {url}?text=<prompt>`
    Query,
    /// `POST {url}` with `{"text": prompt}`
    JsonBody,
}

impl PromptTransport {
    /// Transport used by a provider kind
    #[must_use]
    pub fn for_kind(kind: ProviderKind) -> Self {
        match kind {
            ProviderKind::GptOss => Self::JsonBody,
            _ => Self::Query,
        }
    }
}

/// Single-prompt provider configuration
#[derive(Debug, Clone)]
pub struct BespokeConfig {
    /// Provider kind
    pub kind: ProviderKind,
    /// Endpoint URL
    pub url: Url,
    /// Request timeout
    pub timeout: Duration,
    /// Pause between words of a synthesized stream
    pub word_delay: Duration,
    /// Served models
    pub models: Vec<ModelDescriptor>,
}

impl BespokeConfig {
    /// Create a configuration for `kind` at `url`
    ///
    /// # Errors
    /// Returns error if `url` does not parse
    pub fn new(kind: ProviderKind, url: &str) -> Result<Self, GatewayError> {
        let url = Url::parse(url).map_err(|e| {
            GatewayError::configuration(format!("invalid {kind} endpoint {url}: {e}"))
        })?;
        Ok(Self {
            kind,
            url,
            timeout: Duration::from_secs(120),
            word_delay: Duration::from_millis(20),
            models: default_models(kind),
        })
    }

    /// Set the timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the synthetic stream pacing
    #[must_use]
    pub fn with_word_delay(mut self, delay: Duration) -> Self {
        self.word_delay = delay;
        self
    }
}

/// Provider for single-prompt upstreams
#[derive(Debug)]
pub struct BespokeProvider {
    config: BespokeConfig,
    transport: PromptTransport,
    client: Client,
}

#[derive(Serialize)]
struct PromptBody<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct PromptReply {
    #[serde(default)]
    response: Option<String>,
}

impl BespokeProvider {
    /// Create a new provider
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(config: BespokeConfig) -> Result<Self, GatewayError> {
        let client = build_client(config.timeout)?;
        let transport = PromptTransport::for_kind(config.kind);
        Ok(Self {
            config,
            transport,
            client,
        })
    }

    /// Extract the prompt and check the model
    fn prompt(&self, request: &ChatRequest) -> Result<(String, &ModelDescriptor), GatewayError> {
        let model = self
            .model(&request.model)
            .ok_or_else(|| GatewayError::model_not_found(&request.model))?;
        let prompt = request.last_user_text().ok_or_else(|| {
            GatewayError::validation(
                "a user message with text is required",
                Some("messages".to_string()),
                "missing_user_message",
            )
        })?;
        Ok((prompt, model))
    }

    /// Call the endpoint once and return the reply text
    async fn ask(&self, prompt: &str) -> Result<String, GatewayError> {
        let id = self.id();
        let builder = match self.transport {
            PromptTransport::Query => {
                let mut url = self.config.url.clone();
                url.query_pairs_mut().append_pair("text", prompt);
                self.client.get(url)
            }
            PromptTransport::JsonBody => self
                .client
                .post(self.config.url.clone())
                .json(&PromptBody { text: prompt }),
        };

        debug!(provider = id, prompt_chars = prompt.chars().count(), "Calling upstream");

        let response = builder
            .send()
            .await
            .map_err(|e| transport_error(id, self.config.timeout, &e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            GatewayError::provider(id, format!("Failed to read response: {e}"), None, false)
        })?;

        if !status.is_success() {
            warn!(provider = id, status = status.as_u16(), "Upstream returned an error");
            return Err(GatewayError::provider(
                id,
                error_message(&text),
                Some(status.as_u16()),
                false,
            ));
        }

        let reply: PromptReply = serde_json::from_str(&text).map_err(|e| {
            GatewayError::provider(id, format!("Invalid response JSON: {e}"), None, false)
        })?;
        reply.response.ok_or_else(|| {
            GatewayError::provider(id, "response field missing from upstream reply", None, false)
        })
    }
}

#[async_trait]
impl LanguageModel for BespokeProvider {
    fn id(&self) -> &str {
        self.config.kind.id()
    }

    fn kind(&self) -> ProviderKind {
        self.config.kind
    }

    fn has_credential(&self) -> bool {
        // Keyless: a configured endpoint is all these upstreams need
        true
    }

    fn models(&self) -> &[ModelDescriptor] {
        &self.config.models
    }

    async fn generate(&self, request: &ChatRequest) -> Result<ChatCompletion, GatewayError> {
        let (prompt, model) = self.prompt(request)?;
        let reply = self.ask(&prompt).await?;
        let usage = Usage::estimate(prompt.chars().count(), reply.chars().count());
        Ok(ChatCompletion::assistant_text(
            model.internal_id.clone(),
            reply,
            usage,
        ))
    }

    async fn stream(&self, request: &ChatRequest) -> Result<ChunkStream, GatewayError> {
        let (prompt, model) = self.prompt(request)?;
        let reply = self.ask(&prompt).await?;
        let synthetic = SyntheticStream::new(
            model.internal_id.clone(),
            &reply,
            prompt.chars().count(),
        );
        debug!(
            provider = self.id(),
            words = synthetic.word_count(),
            "Replaying reply as a synthetic stream"
        );
        Ok(synthetic.into_paced_stream(self.config.word_delay))
    }
}
