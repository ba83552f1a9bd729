//! Synthetic token stream for upstreams that only answer in one piece.
//!
//! [`SyntheticStream`] turns a complete reply into the same chunk sequence
//! a streaming upstream would produce: one chunk per word, then a final
//! chunk with `finish_reason: "stop"` and estimated usage. Each word chunk
//! carries the whitespace that follows it, so the deltas concatenate back
//! to the exact reply. It is a plain
//! iterator so the chunking can be checked without a runtime;
//! [`SyntheticStream::into_paced_stream`] adds the per-word delay.

use async_stream::stream;
use gateway_core::{ChatChunk, ChunkStream, FinishReason, GatewayError, MessageRole, Usage};
use std::time::Duration;

/// Lazy, finite chunk sequence built from one reply
#[derive(Debug)]
pub struct SyntheticStream {
    id: String,
    model: String,
    created: i64,
    words: Vec<String>,
    position: usize,
    usage: Usage,
    finished: bool,
}

impl SyntheticStream {
    /// Build the sequence for `reply`; `prompt_chars` feeds the usage estimate
    #[must_use]
    pub fn new(model: impl Into<String>, reply: &str, prompt_chars: usize) -> Self {
        Self {
            id: format!("chatcmpl-{}", uuid::Uuid::new_v4().simple()),
            model: model.into(),
            created: chrono::Utc::now().timestamp(),
            words: word_pieces(reply),
            position: 0,
            usage: Usage::estimate(prompt_chars, reply.chars().count()),
            finished: false,
        }
    }

    /// Completion id shared by every chunk
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Number of word chunks, excluding the final chunk
    #[must_use]
    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    /// Yield the chunks as a stream, sleeping `delay` between word chunks
    #[must_use]
    pub fn into_paced_stream(self, delay: Duration) -> ChunkStream {
        let paced = stream! {
            let mut first = true;
            for chunk in self {
                if !first && !delay.is_zero() && chunk.delta_content().is_some() {
                    tokio::time::sleep(delay).await;
                }
                first = false;
                yield Ok::<_, GatewayError>(chunk);
            }
        };
        Box::pin(paced)
    }
}

impl Iterator for SyntheticStream {
    type Item = ChatChunk;

    fn next(&mut self) -> Option<ChatChunk> {
        if let Some(word) = self.words.get(self.position) {
            let is_first = self.position == 0;
            let content = word.clone();
            self.position += 1;

            let role = is_first.then_some(MessageRole::Assistant);
            return Some(ChatChunk::content(
                self.id.clone(),
                self.model.clone(),
                self.created,
                role,
                content,
            ));
        }

        if self.finished {
            return None;
        }
        self.finished = true;
        Some(ChatChunk::finish(
            self.id.clone(),
            self.model.clone(),
            self.created,
            FinishReason::Stop,
            Some(self.usage),
        ))
    }
}

/// Split `reply` before every word but the first, keeping all whitespace.
///
/// Leading whitespace stays on the first piece. A blank reply has no pieces.
fn word_pieces(reply: &str) -> Vec<String> {
    if reply.trim().is_empty() {
        return Vec::new();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    let mut in_word = false;
    let mut seen_word = false;
    for (i, c) in reply.char_indices() {
        if c.is_whitespace() {
            in_word = false;
            continue;
        }
        if !in_word {
            if seen_word {
                pieces.push(reply[start..i].to_string());
                start = i;
            }
            seen_word = true;
            in_word = true;
        }
    }
    pieces.push(reply[start..].to_string());
    pieces
}
