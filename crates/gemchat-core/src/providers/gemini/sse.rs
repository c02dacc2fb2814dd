//! Gemini SSE stream parser.
//!
//! `streamGenerateContent?alt=sse` sends one JSON chunk per event. Each chunk
//! carries only the text generated since the previous one, so chunk text is
//! forwarded as-is even when it repeats what came before.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use eventsource_stream::{EventStream, Eventsource};
use futures_util::Stream;
use serde_json::Value;

use super::api::{SAFETY_BLOCK_MESSAGE, block_reason, candidate_text};
use crate::providers::shared::{ProviderError, ProviderResult};

/// Events emitted while a reply streams in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// New reply text
    TextDelta(String),
    /// The model finished; carries the normalized finish reason
    Finished { reason: Option<String> },
}

/// Gemini SSE stream parser.
pub struct GeminiSseParser<S> {
    inner: EventStream<S>,
    pending: VecDeque<ProviderResult<StreamEvent>>,
    finished: bool,
}

impl<S> GeminiSseParser<S> {
    pub fn new(stream: S) -> Self
    where
        S: Eventsource,
    {
        Self {
            inner: stream.eventsource(),
            pending: VecDeque::new(),
            finished: false,
        }
    }

    fn handle_event_data(&mut self, data: &str) {
        let trimmed = data.trim();
        if trimmed.is_empty() || trimmed == "[DONE]" {
            return;
        }

        match serde_json::from_str::<Value>(trimmed) {
            Ok(value) => self.handle_chunk(&value),
            Err(err) => self.pending.push_back(Err(ProviderError::parse(format!(
                "Failed to parse SSE JSON: {err}"
            )))),
        }
    }

    fn handle_chunk(&mut self, value: &Value) {
        if let Some(error) = value.get("error") {
            let status = error
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or("error");
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error");
            self.pending
                .push_back(Err(ProviderError::api_error(format!("{status}: {message}"))));
            return;
        }

        if let Some(reason) = block_reason(value) {
            self.pending.push_back(Err(ProviderError::api_error(format!(
                "{SAFETY_BLOCK_MESSAGE} ({reason})"
            ))));
            return;
        }

        let Some(candidate) = value
            .get("candidates")
            .and_then(Value::as_array)
            .and_then(|candidates| candidates.first())
        else {
            return;
        };

        let text = candidate_text(candidate);
        if !text.is_empty() {
            self.pending.push_back(Ok(StreamEvent::TextDelta(text)));
        }

        if let Some(reason) = candidate.get("finishReason").and_then(Value::as_str)
            && !self.finished
        {
            self.finished = true;
            if reason == "SAFETY" {
                self.pending.push_back(Err(ProviderError::api_error(format!(
                    "{SAFETY_BLOCK_MESSAGE} ({reason})"
                ))));
            } else {
                self.pending.push_back(Ok(StreamEvent::Finished {
                    reason: Some(map_finish_reason(reason)),
                }));
            }
        }
    }
}

impl<S, E> Stream for GeminiSseParser<S>
where
    S: Stream<Item = std::result::Result<bytes::Bytes, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    type Item = ProviderResult<StreamEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Poll::Ready(Some(event));
            }

            let inner = Pin::new(&mut self.inner);
            match inner.poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => self.handle_event_data(&event.data),
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(ProviderError::timeout(format!(
                        "network error: SSE stream failed: {e}"
                    )))));
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Maps Gemini finish reasons to normalized stop reasons.
pub fn map_finish_reason(reason: &str) -> String {
    match reason {
        "MAX_TOKENS" => "max_tokens".to_string(),
        "STOP" => "stop".to_string(),
        other => other.to_lowercase(),
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{StreamExt, stream};

    use super::*;

    fn sse_body(chunks: &[&str]) -> Vec<Result<bytes::Bytes, std::io::Error>> {
        chunks
            .iter()
            .map(|chunk| Ok(bytes::Bytes::from(format!("data: {chunk}\n\n"))))
            .collect()
    }

    async fn collect(chunks: &[&str]) -> Vec<ProviderResult<StreamEvent>> {
        GeminiSseParser::new(stream::iter(sse_body(chunks)))
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_incremental_chunks_become_deltas() {
        let events = collect(&[
            r#"{"candidates":[{"content":{"parts":[{"text":"Hello"}],"role":"model"}}]}"#,
            r#"{"candidates":[{"content":{"parts":[{"text":" world"}],"role":"model"},"finishReason":"STOP"}]}"#,
        ])
        .await;

        let events: Vec<StreamEvent> = events.into_iter().map(Result::unwrap).collect();
        assert_eq!(
            events,
            vec![
                StreamEvent::TextDelta("Hello".to_string()),
                StreamEvent::TextDelta(" world".to_string()),
                StreamEvent::Finished {
                    reason: Some("stop".to_string())
                },
            ]
        );
    }

    fn reassemble(events: Vec<ProviderResult<StreamEvent>>) -> String {
        events
            .into_iter()
            .filter_map(|event| match event.unwrap() {
                StreamEvent::TextDelta(text) => Some(text),
                StreamEvent::Finished { .. } => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_chunk_repeating_earlier_text_is_kept() {
        let events = collect(&[
            r#"{"candidates":[{"content":{"parts":[{"text":"*"}]}}]}"#,
            r#"{"candidates":[{"content":{"parts":[{"text":"* item"}]},"finishReason":"STOP"}]}"#,
        ])
        .await;

        assert_eq!(reassemble(events), "** item");
    }

    #[tokio::test]
    async fn test_repeated_words_are_not_collapsed() {
        let events = collect(&[
            r#"{"candidates":[{"content":{"parts":[{"text":"Hel"}]}}]}"#,
            r#"{"candidates":[{"content":{"parts":[{"text":"Hello"}]}}]}"#,
        ])
        .await;

        assert_eq!(reassemble(events), "HelHello");
    }

    #[tokio::test]
    async fn test_safety_finish_is_an_error() {
        let events = collect(&[
            r#"{"candidates":[{"content":{"parts":[]},"finishReason":"SAFETY"}]}"#,
        ])
        .await;

        assert_eq!(events.len(), 1);
        let err = events.into_iter().next().unwrap().unwrap_err();
        assert!(err.message.contains("safety"));
    }

    #[tokio::test]
    async fn test_error_chunk_is_forwarded() {
        let events = collect(&[
            r#"{"error":{"code":429,"message":"You exceeded your current quota","status":"RESOURCE_EXHAUSTED"}}"#,
        ])
        .await;

        let err = events.into_iter().next().unwrap().unwrap_err();
        assert_eq!(
            err.message,
            "RESOURCE_EXHAUSTED: You exceeded your current quota"
        );
    }

    #[tokio::test]
    async fn test_bad_json_is_parse_error() {
        let events = collect(&["{not json"]).await;
        let err = events.into_iter().next().unwrap().unwrap_err();
        assert_eq!(
            err.kind,
            crate::providers::shared::ProviderErrorKind::Parse
        );
    }
}
