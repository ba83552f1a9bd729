//! Provider abstraction: the `LanguageModel` trait, model descriptors and
//! provider profiles.

use crate::error::GatewayError;
use crate::request::ChatRequest;
use crate::response::ChatCompletion;
use crate::streaming::ChunkStream;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Upstream provider kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    /// DeepInfra (OpenAI-compatible)
    DeepInfra,
    /// MakeHub (OpenAI-compatible)
    MakeHub,
    /// LaoZhang (OpenAI-compatible)
    LaoZhang,
    /// TypeGPT (OpenAI-compatible)
    TypeGpt,
    /// Codex (OpenAI-compatible)
    Codex,
    /// A4F (OpenAI-compatible)
    A4f,
    /// Workers / FeatherLabs (OpenAI-compatible)
    Workers,
    /// Google Gemini with a rotating key pool
    Google,
    /// Grok single-prompt endpoint
    Grok,
    /// GPT-OSS single-prompt endpoint
    GptOss,
    /// Sonnet-Free single-prompt endpoint
    SonnetFree,
}

impl ProviderKind {
    /// Every provider kind
    pub const ALL: [Self; 11] = [
        Self::DeepInfra,
        Self::MakeHub,
        Self::LaoZhang,
        Self::TypeGpt,
        Self::Codex,
        Self::A4f,
        Self::Workers,
        Self::Google,
        Self::Grok,
        Self::GptOss,
        Self::SonnetFree,
    ];

    /// Stable provider id
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::DeepInfra => "deepinfra",
            Self::MakeHub => "makehub",
            Self::LaoZhang => "laozhang",
            Self::TypeGpt => "typegpt",
            Self::Codex => "codex",
            Self::A4f => "a4f",
            Self::Workers => "workers",
            Self::Google => "google",
            Self::Grok => "grok",
            Self::GptOss => "gpt-oss",
            Self::SonnetFree => "sonnet-free",
        }
    }

    /// User-facing provider name
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::DeepInfra => "DeepInfra",
            Self::MakeHub => "MakeHub",
            Self::LaoZhang => "LaoZhang",
            Self::TypeGpt => "TypeGPT",
            Self::Codex => "Codex",
            Self::A4f => "A4F",
            Self::Workers => "FeatherLabs",
            Self::Google => "Google",
            Self::Grok => "Grok",
            Self::GptOss => "GPT-OSS",
            Self::SonnetFree => "Sonnet Free",
        }
    }

    /// Upstream speaks the OpenAI chat-completions protocol natively
    #[must_use]
    pub fn is_openai_compatible(self) -> bool {
        !matches!(self, Self::Google | Self::Grok | Self::GptOss | Self::SonnetFree)
    }

    /// Look up a kind by its id
    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.id() == id)
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Catalog entry for one model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Gateway-side id (`upstream_id` with `/` replaced by `-`)
    pub internal_id: String,
    /// Id sent to the upstream
    pub upstream_id: String,
    /// User-facing name
    pub display_name: String,
    /// Owning provider id
    pub provider_id: String,
    /// Accepts tool definitions
    pub supports_tools: bool,
    /// Accepts image parts
    pub supports_image_input: bool,
    /// Character budget for the last user message
    pub context_char_limit: usize,
}

impl ModelDescriptor {
    /// Describe an upstream model; the internal id is derived from it
    #[must_use]
    pub fn new(provider_id: impl Into<String>, upstream_id: impl Into<String>) -> Self {
        let upstream_id = upstream_id.into();
        let internal_id = internal_model_id(&upstream_id);
        Self {
            display_name: internal_id.clone(),
            internal_id,
            upstream_id,
            provider_id: provider_id.into(),
            supports_tools: false,
            supports_image_input: false,
            context_char_limit: 0,
        }
    }

    /// Override the internal id, for several entries backed by one upstream model
    #[must_use]
    pub fn with_internal_id(mut self, internal_id: impl Into<String>) -> Self {
        let internal_id = internal_id.into();
        if self.display_name == self.internal_id {
            self.display_name.clone_from(&internal_id);
        }
        self.internal_id = internal_id;
        self
    }

    /// Set the display name
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Mark tool support
    #[must_use]
    pub fn with_tools(mut self) -> Self {
        self.supports_tools = true;
        self
    }

    /// Mark image input support
    #[must_use]
    pub fn with_vision(mut self) -> Self {
        self.supports_image_input = true;
        self
    }

    /// Set the context character budget
    #[must_use]
    pub fn with_context_char_limit(mut self, limit: usize) -> Self {
        self.context_char_limit = limit;
        self
    }
}

/// Internal id for an upstream model id: slashes become dashes
#[must_use]
pub fn internal_model_id(upstream_id: &str) -> String {
    upstream_id.replace('/', "-")
}

/// Provider metadata used to order listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderProfile {
    /// Provider id
    pub provider_id: String,
    /// User-facing provider name
    pub display_name: String,
    /// A credential (or endpoint, for keyless upstreams) is configured
    pub has_credential: bool,
    /// Position in the configured display order; `None` sorts last
    pub order_rank: Option<usize>,
}

/// Capability interface implemented by every provider adapter.
///
/// Cancellation is by drop: dropping the returned future or stream aborts
/// the in-flight upstream call.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Provider id
    fn id(&self) -> &str;

    /// Provider kind
    fn kind(&self) -> ProviderKind;

    /// User-facing provider name
    fn display_name(&self) -> &str {
        self.kind().display_name()
    }

    /// Whether a credential is configured
    fn has_credential(&self) -> bool;

    /// Models served by this provider
    fn models(&self) -> &[ModelDescriptor];

    /// Look up one of this provider's models by internal id
    fn model(&self, internal_id: &str) -> Option<&ModelDescriptor> {
        self.models().iter().find(|m| m.internal_id == internal_id)
    }

    /// Non-streaming completion
    async fn generate(&self, request: &ChatRequest) -> Result<ChatCompletion, GatewayError>;

    /// Streaming completion
    async fn stream(&self, request: &ChatRequest) -> Result<ChunkStream, GatewayError>;
}
