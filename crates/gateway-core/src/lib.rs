//! # Gateway Core
//!
//! Core types, traits, and error handling for the chat model gateway.
//!
//! This crate provides the foundational types used throughout the gateway:
//! - The canonical chat request, completion and chunk shapes
//! - The `LanguageModel` trait every provider adapter implements
//! - Model descriptors and provider profiles
//! - Error types and the OpenAI-shaped error envelope
//! - Server-Sent Events framing

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod provider;
pub mod request;
pub mod response;
pub mod streaming;

// Re-export commonly used types
pub use error::{GatewayError, GatewayResult};
pub use provider::{LanguageModel, ModelDescriptor, ProviderKind, ProviderProfile};
pub use request::{ChatMessage, ChatRequest, ContentPart, ImageUrl, MessageContent, MessageRole};
pub use response::{
    ChatCompletion, Choice, FinishReason, ModelObject, ModelsResponse, ResponseMessage, Usage,
};
pub use streaming::{sse_frames, ChatChunk, ChunkChoice, ChunkDelta, ChunkStream, SseFrame};
