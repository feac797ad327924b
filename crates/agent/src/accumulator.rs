//! Reassembles one assistant message from a stream of deltas.
//!
//! Content tokens are appended to a running buffer. Tool call fragments are
//! merged per stream index: argument text is concatenated, while `id`, `name`
//! and `kind` are set from whichever fragment supplies them. The accumulator
//! itself does no I/O; [`StreamAccumulator::collect`] drives it over an open
//! provider stream.

use std::collections::BTreeMap;

use toolrelay_core::error::ProviderError;
use toolrelay_core::message::{Message, ToolCallKind, ToolCallRequest};
use toolrelay_core::provider::{ChunkReceiver, DeltaFragment, StreamChunk, Usage};
use tracing::trace;

/// How to treat a fragment that re-supplies an already known field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MergePolicy {
    /// The latest non-empty value replaces the previous one.
    #[default]
    LastWriteWins,
    /// A different non-empty value for `id`, `name` or `kind` is an error.
    Strict,
}

/// In-progress tool call for one stream index.
#[derive(Debug, Clone, Default)]
struct ToolCallBuilder {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
    kind: Option<ToolCallKind>,
}

impl ToolCallBuilder {
    fn merge(
        &mut self,
        fragment: &DeltaFragment,
        policy: MergePolicy,
    ) -> Result<(), ProviderError> {
        let index = fragment.index;

        if let Some(id) = non_empty(fragment.id.as_deref()) {
            assign(&mut self.id, id.to_string(), index, "id", policy)?;
        }
        if let Some(name) = non_empty(fragment.name.as_deref()) {
            assign(&mut self.name, name.to_string(), index, "name", policy)?;
        }
        if let Some(chunk) = &fragment.arguments {
            self.arguments.push_str(chunk);
        }
        if let Some(kind) = &fragment.kind
            && *kind != ToolCallKind::Other(String::new())
        {
            assign(&mut self.kind, kind.clone(), index, "kind", policy)?;
        }
        Ok(())
    }

    fn build(self) -> ToolCallRequest {
        ToolCallRequest {
            id: self.id,
            name: self.name,
            arguments: self.arguments,
            kind: self.kind,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn assign<T>(
    slot: &mut Option<T>,
    incoming: T,
    index: u32,
    field: &'static str,
    policy: MergePolicy,
) -> Result<(), ProviderError>
where
    T: Clone + PartialEq + Into<String>,
{
    if policy == MergePolicy::Strict
        && let Some(previous) = slot.as_ref()
        && *previous != incoming
    {
        return Err(ProviderError::FragmentConflict {
            index,
            field,
            previous: previous.clone().into(),
            incoming: incoming.into(),
        });
    }
    *slot = Some(incoming);
    Ok(())
}

/// Accumulation state for a single streamed assistant turn.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    policy: MergePolicy,
    content: String,
    calls: BTreeMap<u32, ToolCallBuilder>,
    finish_reason: Option<String>,
    usage: Option<Usage>,
}

impl StreamAccumulator {
    pub fn new(policy: MergePolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Merge one chunk.
    ///
    /// Returns the chunk's content token, if any, so the caller can display
    /// it as it arrives.
    pub fn push<'c>(&mut self, chunk: &'c StreamChunk) -> Result<Option<&'c str>, ProviderError> {
        for fragment in &chunk.tool_calls {
            self.calls
                .entry(fragment.index)
                .or_default()
                .merge(fragment, self.policy)?;
        }

        if let Some(reason) = &chunk.finish_reason {
            self.finish_reason = Some(reason.clone());
        }
        if let Some(usage) = &chunk.usage {
            self.usage = Some(usage.clone());
        }

        match chunk.content.as_deref() {
            Some(token) if !token.is_empty() => {
                self.content.push_str(token);
                Ok(Some(token))
            }
            _ => Ok(None),
        }
    }

    /// Text received so far.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Number of distinct tool call indices seen so far.
    pub fn tool_call_count(&self) -> usize {
        self.calls.len()
    }

    pub fn finish_reason(&self) -> Option<&str> {
        self.finish_reason.as_deref()
    }

    pub fn usage(&self) -> Option<&Usage> {
        self.usage.as_ref()
    }

    /// Finalize into an assistant message.
    ///
    /// Tool calls come out in ascending index order. An index that never
    /// received an id or name is kept with those fields unset.
    pub fn finish(self) -> Message {
        if self.calls.is_empty() {
            return Message::assistant(self.content);
        }
        let calls = self
            .calls
            .into_values()
            .map(ToolCallBuilder::build)
            .collect();
        Message::assistant_with_tools(self.content, calls)
    }

    /// Drain a provider stream into a finished message.
    ///
    /// `on_token` is called for every content token in arrival order. The
    /// first transport error ends collection and is returned as-is.
    pub async fn collect<F>(
        mut self,
        mut receiver: ChunkReceiver,
        mut on_token: F,
    ) -> Result<Message, ProviderError>
    where
        F: FnMut(&str),
    {
        while let Some(item) = receiver.recv().await {
            let chunk = item?;
            if let Some(token) = self.push(&chunk)? {
                on_token(token);
            }
        }

        trace!(
            tool_calls = self.tool_call_count(),
            finish_reason = ?self.finish_reason,
            "Stream drained"
        );
        Ok(self.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use toolrelay_core::message::Role;

    fn push_all(acc: &mut StreamAccumulator, chunks: &[StreamChunk]) {
        for chunk in chunks {
            acc.push(chunk).unwrap();
        }
    }

    #[test]
    fn argument_chunks_concatenate() {
        let mut acc = StreamAccumulator::default();
        push_all(
            &mut acc,
            &[
                StreamChunk::fragments(vec![
                    DeltaFragment::at(0)
                        .with_id("call_1")
                        .with_name("get_user_by_id")
                        .with_kind(ToolCallKind::Function)
                        .with_arguments("a1"),
                ]),
                StreamChunk::fragments(vec![DeltaFragment::at(0).with_arguments("a2")]),
                StreamChunk::fragments(vec![DeltaFragment::at(0).with_arguments("a3")]),
            ],
        );

        let msg = acc.finish();
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.tool_calls.len(), 1);
        assert_eq!(msg.tool_calls[0].arguments, "a1a2a3");
        assert_eq!(msg.tool_calls[0].id.as_deref(), Some("call_1"));
        assert_eq!(msg.tool_calls[0].kind, Some(ToolCallKind::Function));
    }

    #[test]
    fn interleaved_indices_stay_separate() {
        let mut acc = StreamAccumulator::default();
        push_all(
            &mut acc,
            &[
                StreamChunk::fragments(vec![DeltaFragment::at(1).with_name("search_user")]),
                StreamChunk::fragments(vec![
                    DeltaFragment::at(0).with_id("call_a"),
                    DeltaFragment::at(1).with_arguments("{\"name\":"),
                ]),
                StreamChunk::fragments(vec![DeltaFragment::at(0).with_arguments("{}")]),
                StreamChunk::fragments(vec![DeltaFragment::at(1).with_arguments("\"Ada\"}")]),
                StreamChunk::fragments(vec![DeltaFragment::at(1).with_id("call_b")]),
            ],
        );

        let calls = acc.finish().tool_calls;
        assert_eq!(calls.len(), 2);

        assert_eq!(calls[0].id.as_deref(), Some("call_a"));
        assert!(calls[0].name.is_none());
        assert_eq!(calls[0].arguments, "{}");

        assert_eq!(calls[1].id.as_deref(), Some("call_b"));
        assert_eq!(calls[1].name.as_deref(), Some("search_user"));
        assert_eq!(calls[1].arguments, "{\"name\":\"Ada\"}");
    }

    #[test]
    fn calls_come_out_in_index_order() {
        let mut acc = StreamAccumulator::default();
        push_all(
            &mut acc,
            &[
                StreamChunk::fragments(vec![DeltaFragment::at(2).with_name("c")]),
                StreamChunk::fragments(vec![DeltaFragment::at(0).with_name("a")]),
                StreamChunk::fragments(vec![DeltaFragment::at(1).with_name("b")]),
            ],
        );
        let names: Vec<_> = acc
            .finish()
            .tool_calls
            .iter()
            .map(|c| c.name_or_empty().to_string())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn content_only_stream_has_no_tool_calls() {
        let mut acc = StreamAccumulator::default();
        let chunks = [
            StreamChunk::token("Hello"),
            StreamChunk::token(", "),
            StreamChunk::token("Ada"),
        ];
        let mut seen = Vec::new();
        for chunk in &chunks {
            if let Some(token) = acc.push(chunk).unwrap() {
                seen.push(token.to_string());
            }
        }

        assert_eq!(seen, vec!["Hello", ", ", "Ada"]);
        let msg = acc.finish();
        assert_eq!(msg.content, "Hello, Ada");
        assert!(!msg.has_tool_calls());
    }

    #[test]
    fn index_without_id_or_name_is_kept() {
        let mut acc = StreamAccumulator::default();
        push_all(
            &mut acc,
            &[StreamChunk::fragments(vec![
                DeltaFragment::at(0).with_arguments("{}"),
            ])],
        );
        let calls = acc.finish().tool_calls;
        assert_eq!(calls.len(), 1);
        assert!(calls[0].id.is_none());
        assert!(calls[0].name.is_none());
        assert!(calls[0].kind.is_none());
    }

    #[test]
    fn empty_fields_do_not_erase_known_values() {
        let mut acc = StreamAccumulator::new(MergePolicy::Strict);
        push_all(
            &mut acc,
            &[
                StreamChunk::fragments(vec![
                    DeltaFragment::at(0).with_id("call_1").with_name("search_user"),
                ]),
                StreamChunk::fragments(vec![
                    DeltaFragment::at(0)
                        .with_id("")
                        .with_name("")
                        .with_arguments("{}"),
                ]),
            ],
        );
        let call = &acc.finish().tool_calls[0];
        assert_eq!(call.id.as_deref(), Some("call_1"));
        assert_eq!(call.name.as_deref(), Some("search_user"));
    }

    #[test]
    fn last_write_wins_by_default() {
        let mut acc = StreamAccumulator::default();
        push_all(
            &mut acc,
            &[
                StreamChunk::fragments(vec![DeltaFragment::at(0).with_name("get_user_by_id")]),
                StreamChunk::fragments(vec![DeltaFragment::at(0).with_name("delete_user")]),
            ],
        );
        assert_eq!(
            acc.finish().tool_calls[0].name.as_deref(),
            Some("delete_user")
        );
    }

    #[test]
    fn strict_policy_rejects_conflicting_name() {
        let mut acc = StreamAccumulator::new(MergePolicy::Strict);
        acc.push(&StreamChunk::fragments(vec![
            DeltaFragment::at(3).with_name("get_user_by_id"),
        ]))
        .unwrap();

        let err = acc
            .push(&StreamChunk::fragments(vec![
                DeltaFragment::at(3).with_name("delete_user"),
            ]))
            .unwrap_err();

        match err {
            ProviderError::FragmentConflict {
                index,
                field,
                previous,
                incoming,
            } => {
                assert_eq!(index, 3);
                assert_eq!(field, "name");
                assert_eq!(previous, "get_user_by_id");
                assert_eq!(incoming, "delete_user");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn strict_policy_accepts_repeated_identical_values() {
        let mut acc = StreamAccumulator::new(MergePolicy::Strict);
        let chunk = StreamChunk::fragments(vec![
            DeltaFragment::at(0)
                .with_id("call_1")
                .with_kind(ToolCallKind::Function),
        ]);
        acc.push(&chunk).unwrap();
        acc.push(&chunk).unwrap();
        assert_eq!(acc.tool_call_count(), 1);
    }

    #[test]
    fn records_finish_reason_and_usage() {
        let mut acc = StreamAccumulator::default();
        acc.push(&StreamChunk {
            finish_reason: Some("tool_calls".into()),
            usage: Some(Usage {
                prompt_tokens: 12,
                completion_tokens: 3,
                total_tokens: 15,
            }),
            ..StreamChunk::default()
        })
        .unwrap();
        assert_eq!(acc.finish_reason(), Some("tool_calls"));
        assert_eq!(acc.usage().map(|u| u.total_tokens), Some(15));
    }

    #[tokio::test]
    async fn collect_emits_tokens_and_builds_message() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(Ok(StreamChunk::token("Looking up"))).await.unwrap();
        tx.send(Ok(StreamChunk::token(" the user"))).await.unwrap();
        tx.send(Ok(StreamChunk::fragments(vec![
            DeltaFragment::at(0)
                .with_id("call_1")
                .with_name("get_user_by_id")
                .with_arguments("{\"id\": 7}"),
        ])))
        .await
        .unwrap();
        drop(tx);

        let mut tokens = Vec::new();
        let msg = StreamAccumulator::default()
            .collect(rx, |t| tokens.push(t.to_string()))
            .await
            .unwrap();

        assert_eq!(tokens, vec!["Looking up", " the user"]);
        assert_eq!(msg.content, "Looking up the user");
        assert_eq!(msg.tool_calls[0].arguments, "{\"id\": 7}");
    }

    #[tokio::test]
    async fn collect_propagates_transport_error() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(Ok(StreamChunk::token("partial"))).await.unwrap();
        tx.send(Err(ProviderError::StreamInterrupted("connection reset".into())))
            .await
            .unwrap();
        drop(tx);

        let err = StreamAccumulator::default()
            .collect(rx, |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::StreamInterrupted(_)));
    }
}
