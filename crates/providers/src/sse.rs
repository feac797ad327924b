//! Server-sent-events framing for chat-completion streams.
//!
//! Bytes arrive in arbitrary network-sized pieces; [`SseLineBuffer`] turns
//! them into complete lines and [`parse_line`] turns a line into an event.

use serde::Deserialize;
use toolrelay_core::message::ToolCallKind;
use toolrelay_core::provider::{DeltaFragment, StreamChunk, Usage};

/// Splits a byte stream into `\n`-terminated lines.
///
/// Bytes are buffered until a full line is available so multi-byte UTF-8
/// sequences split across network reads decode correctly.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    pending: Vec<u8>,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes; returns every line completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line[..line.len() - 1]);
            lines.push(text.trim_end_matches('\r').to_string());
        }
        lines
    }

    /// Whatever is left once the byte stream ends without a final newline.
    pub fn finish(self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        Some(
            String::from_utf8_lossy(&self.pending)
                .trim_end_matches('\r')
                .to_string(),
        )
    }
}

/// What a single SSE line means for the stream.
#[derive(Debug, PartialEq)]
pub enum SseEvent {
    /// A parsed completion chunk
    Chunk(StreamChunk),
    /// The `[DONE]` sentinel
    Done,
    /// Blank line, comment, non-data field, or undecodable payload
    Skip,
}

/// Interpret one SSE line.
pub fn parse_line(line: &str) -> SseEvent {
    if line.is_empty() || line.starts_with(':') {
        return SseEvent::Skip;
    }

    let Some(data) = line.strip_prefix("data:") else {
        return SseEvent::Skip;
    };
    let data = data.trim();

    if data == "[DONE]" {
        return SseEvent::Done;
    }

    match serde_json::from_str::<StreamResponse>(data) {
        Ok(resp) => SseEvent::Chunk(resp.into_chunk()),
        Err(e) => {
            tracing::trace!(data = %data, error = %e, "Ignoring unparseable SSE chunk");
            SseEvent::Skip
        }
    }
}

// --- Streaming wire types ---

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<StreamDelta>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<StreamToolCallDelta>>,
}

/// A tool call delta; arrives incrementally across chunks.
#[derive(Debug, Deserialize)]
struct StreamToolCallDelta {
    index: u32,
    #[serde(default)]
    id: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    function: Option<StreamFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl StreamResponse {
    fn into_chunk(self) -> StreamChunk {
        let usage = self.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        // Only the first choice is consumed; n > 1 is never requested.
        let Some(choice) = self.choices.into_iter().next() else {
            return StreamChunk {
                usage,
                ..StreamChunk::default()
            };
        };

        let delta = choice.delta.unwrap_or_default();
        let tool_calls = delta
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| {
                let (name, arguments) = match tc.function {
                    Some(f) => (f.name, f.arguments),
                    None => (None, None),
                };
                DeltaFragment {
                    index: tc.index,
                    id: tc.id,
                    name,
                    arguments,
                    kind: tc.kind.map(ToolCallKind::from),
                }
            })
            .collect();

        StreamChunk {
            content: delta.content,
            tool_calls,
            finish_reason: choice.finish_reason,
            usage,
        }
    }
}
