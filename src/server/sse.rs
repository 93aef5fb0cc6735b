//! SSE bridging for answer streams.
//!
//! Each stream message is one JSON object on a single `data:` line
//! followed by a blank line. Clients rely on this framing, so the JSON
//! shape is covered by tests below.

use crate::rag::AnswerEvent;
use axum::response::sse::Event;
use futures::Stream;
use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Adapts an answer-event receiver into an SSE event stream.
pub struct AnswerEventStream {
    rx: mpsc::Receiver<AnswerEvent>,
}

impl AnswerEventStream {
    pub fn new(rx: mpsc::Receiver<AnswerEvent>) -> Self {
        Self { rx }
    }
}

impl Stream for AnswerEventStream {
    type Item = Result<Event, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.rx.poll_recv(cx) {
            Poll::Ready(Some(event)) => {
                let sse = Event::default()
                    .json_data(&event)
                    .unwrap_or_else(|_| Event::default().data("{\"type\":\"error\",\"error\":\"serialization failed\"}"));
                Poll::Ready(Some(Ok(sse)))
            }
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::rag::AnswerEvent;
    use crate::store::SourceRef;
    use uuid::Uuid;

    #[test]
    fn wire_shapes_match_the_protocol() {
        let text = serde_json::to_string(&AnswerEvent::Text {
            delta: "ミドスト".to_string(),
        })
        .unwrap();
        assert_eq!(text, r#"{"type":"text","delta":"ミドスト"}"#);

        let id = Uuid::nil();
        let sources = serde_json::to_string(&AnswerEvent::Sources {
            sources: vec![SourceRef {
                id,
                title: "入門".to_string(),
                url: None,
            }],
        })
        .unwrap();
        assert_eq!(
            sources,
            r#"{"type":"sources","sources":[{"id":"00000000-0000-0000-0000-000000000000","title":"入門","url":null}]}"#
        );

        let suggestions = serde_json::to_string(&AnswerEvent::Suggestions {
            suggestions: vec!["次の質問".to_string()],
        })
        .unwrap();
        assert_eq!(suggestions, r#"{"type":"suggestions","suggestions":["次の質問"]}"#);

        let error = serde_json::to_string(&AnswerEvent::Error {
            error: "回答の生成に失敗しました".to_string(),
        })
        .unwrap();
        assert_eq!(error, r#"{"type":"error","error":"回答の生成に失敗しました"}"#);

        let done = serde_json::to_string(&AnswerEvent::Done).unwrap();
        assert_eq!(done, r#"{"type":"done"}"#);
    }
}
