//! # Gateway Providers
//!
//! Upstream adapters behind the [`gateway_core::LanguageModel`] trait:
//! - OpenAI-compatible upstreams (DeepInfra, MakeHub, LaoZhang, TypeGPT, Codex, A4F, Workers)
//! - Google Gemini with per-call key rotation
//! - Single-prompt upstreams (Grok, GPT-OSS, Sonnet-Free) with synthetic streaming

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bespoke;
pub mod catalog;
pub mod google;
pub mod http;
pub mod openai_compatible;
pub mod synthetic;

// Re-export main types
pub use bespoke::{BespokeConfig, BespokeProvider, PromptTransport};
pub use catalog::default_models;
pub use google::{GoogleConfig, GoogleProvider};
pub use openai_compatible::{default_base_url, OpenAICompatibleConfig, OpenAICompatibleProvider};
pub use synthetic::SyntheticStream;
