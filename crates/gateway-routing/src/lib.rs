//! # Gateway Routing
//!
//! Model catalog and request routing for the chat model gateway.
//!
//! This crate provides:
//! - [`build_registry`], which constructs every enabled adapter once at startup
//! - An immutable [`Catalog`] with presentation ordering and name resolution
//! - Display-name mapping in both directions
//! - Search-intent detection and per-model context truncation

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod catalog;
pub mod context;
pub mod display;
pub mod registry;
pub mod search;

// Re-export main types
pub use catalog::{Catalog, Resolution};
pub use context::{
    context_char_limit, truncate_last_user_message, truncate_to_limit, DEFAULT_CONTEXT_CHAR_LIMIT,
};
pub use display::DisplayNames;
pub use registry::{build_registry, build_registry_with_observer};
pub use search::is_search_query;
