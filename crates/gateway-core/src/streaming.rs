//! Streaming chunk types and Server-Sent Events framing.

use crate::error::GatewayError;
use crate::request::MessageRole;
use crate::response::{FinishReason, Usage};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use serde::{Deserialize, Serialize};

/// Stream of canonical chunks returned by every adapter
pub type ChunkStream = BoxStream<'static, Result<ChatChunk, GatewayError>>;

/// Canonical streaming chunk (`chat.completion.chunk`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChunk {
    /// Completion id, shared by every chunk of one stream
    pub id: String,
    /// Always `chat.completion.chunk`
    pub object: String,
    /// Unix timestamp (seconds)
    pub created: i64,
    /// Model name
    pub model: String,
    /// Chunk choices
    pub choices: Vec<ChunkChoice>,
    /// Usage, present on the final chunk when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl ChatChunk {
    /// Content delta chunk
    #[must_use]
    pub fn content(
        id: impl Into<String>,
        model: impl Into<String>,
        created: i64,
        role: Option<MessageRole>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            object: "chat.completion.chunk".to_string(),
            created,
            model: model.into(),
            choices: vec![ChunkChoice {
                index: 0,
                delta: ChunkDelta {
                    role,
                    content: Some(content.into()),
                },
                finish_reason: None,
            }],
            usage: None,
        }
    }

    /// Final chunk carrying the finish reason and usage
    #[must_use]
    pub fn finish(
        id: impl Into<String>,
        model: impl Into<String>,
        created: i64,
        finish_reason: FinishReason,
        usage: Option<Usage>,
    ) -> Self {
        Self {
            id: id.into(),
            object: "chat.completion.chunk".to_string(),
            created,
            model: model.into(),
            choices: vec![ChunkChoice {
                index: 0,
                delta: ChunkDelta::default(),
                finish_reason: Some(finish_reason),
            }],
            usage,
        }
    }

    /// Content of the first choice's delta
    #[must_use]
    pub fn delta_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.delta.content.as_deref())
    }
}

/// A streaming choice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkChoice {
    /// Choice index
    pub index: u32,
    /// Incremental content
    pub delta: ChunkDelta,
    /// Set on the last chunk
    #[serde(default)]
    pub finish_reason: Option<FinishReason>,
}

/// Incremental message content
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkDelta {
    /// Role, usually only on the first chunk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<MessageRole>,
    /// Text fragment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// One Server-Sent Events frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    /// `data: {json}`
    Data(String),
    /// `data: [DONE]`
    Done,
}

impl SseFrame {
    /// Frame carrying a serialized value
    pub fn json<T: Serialize>(value: &T) -> Self {
        Self::Data(serde_json::to_string(value).unwrap_or_default())
    }

    /// Payload after `data: `
    #[must_use]
    pub fn payload(&self) -> &str {
        match self {
            Self::Data(data) => data,
            Self::Done => "[DONE]",
        }
    }

    /// Wire encoding, `data: ...\n\n`
    #[must_use]
    pub fn encode(&self) -> String {
        format!("data: {}\n\n", self.payload())
    }
}

/// Frame a chunk stream for the wire.
///
/// Errors become an error-envelope frame; the output always ends with
/// [`SseFrame::Done`].
pub fn sse_frames<S>(chunks: S) -> impl Stream<Item = SseFrame> + Send
where
    S: Stream<Item = Result<ChatChunk, GatewayError>> + Send,
{
    chunks
        .map(|result| match result {
            Ok(chunk) => SseFrame::json(&chunk),
            Err(e) => SseFrame::Data(e.envelope().to_string()),
        })
        .chain(stream::once(async { SseFrame::Done }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_encoding() {
        assert_eq!(SseFrame::Done.encode(), "data: [DONE]\n\n");
        assert_eq!(
            SseFrame::Data("{\"a\":1}".to_string()).encode(),
            "data: {\"a\":1}\n\n"
        );
    }

    #[test]
    fn test_chunk_serialization() {
        let chunk = ChatChunk::content("c-1", "m", 1, Some(MessageRole::Assistant), "Hi ");
        let json = serde_json::to_value(&chunk).unwrap();

        assert_eq!(json["object"], "chat.completion.chunk");
        assert_eq!(json["choices"][0]["delta"]["content"], "Hi ");
        assert_eq!(json["choices"][0]["delta"]["role"], "assistant");
        assert!(json.get("usage").is_none());
    }

    #[tokio::test]
    async fn test_sse_frames_terminates_with_done() {
        let chunks = stream::iter(vec![
            Ok(ChatChunk::content("c", "m", 0, None, "a")),
            Err(GatewayError::streaming("cut off")),
        ]);

        let frames: Vec<SseFrame> = sse_frames(chunks).collect().await;

        assert_eq!(frames.len(), 3);
        assert!(frames[0].payload().contains("\"content\":\"a\""));
        assert!(frames[1].payload().contains("\"error\""));
        assert_eq!(frames[2], SseFrame::Done);
    }

    #[tokio::test]
    async fn test_sse_frames_empty_stream() {
        let frames: Vec<SseFrame> = sse_frames(stream::empty()).collect().await;
        assert_eq!(frames, vec![SseFrame::Done]);
    }
}
