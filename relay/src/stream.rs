//! The streaming response relay.
//!
//! One generation request is driven by one task: read backend lines, forward
//! each text fragment as an SSE event, keep the full text, and write the
//! exchange to the store exactly once when the backend says it is done.

use bytes::Bytes;
use db::ChatFields;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use sqlx::SqlitePool;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::client::BackendClient;
use crate::error::BackendError;
use crate::sse::RelayEvent;

pub type EventSender = UnboundedSender<RelayEvent>;

pub fn event_channel() -> (EventSender, UnboundedReceiver<RelayEvent>) {
    mpsc::unbounded_channel()
}

/// Which record a generation writes to, decided before streaming starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conversation {
    New { model: String, prompt: String },
    Continue { id: i64, model: String, prompt: String },
}

impl Conversation {
    pub fn model(&self) -> &str {
        match self {
            Conversation::New { model, .. } | Conversation::Continue { model, .. } => model,
        }
    }

    pub fn prompt(&self) -> &str {
        match self {
            Conversation::New { prompt, .. } | Conversation::Continue { prompt, .. } => prompt,
        }
    }

    fn kind(&self) -> String {
        match self {
            Conversation::New { .. } => "new chat".to_string(),
            Conversation::Continue { id, .. } => format!("chat {}", id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Idle,
    Streaming,
    Completed,
    Failed,
}

#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

/// What a single backend line asks the relay to do.
#[derive(Debug, PartialEq, Eq)]
pub enum LineAction {
    /// Unparsable line, or a line arriving outside `Streaming`.
    Skip,
    Emit {
        fragment: Option<String>,
        done: bool,
    },
    Fail(String),
}

/// Per-request relay state and text accumulator.
#[derive(Debug)]
pub struct StreamRelay {
    state: RelayState,
    text: String,
}

impl StreamRelay {
    pub fn new() -> Self {
        StreamRelay {
            state: RelayState::Idle,
            text: String::new(),
        }
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn start(&mut self) {
        if self.state == RelayState::Idle {
            self.state = RelayState::Streaming;
        }
    }

    pub fn fail(&mut self) {
        if !self.is_terminal() {
            self.state = RelayState::Failed;
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, RelayState::Completed | RelayState::Failed)
    }

    pub fn accept_line(&mut self, line: &[u8]) -> LineAction {
        if self.state != RelayState::Streaming {
            return LineAction::Skip;
        }

        let chunk: GenerateChunk = match serde_json::from_slice(line) {
            Ok(chunk) => chunk,
            Err(e) => {
                log::debug!("Skipping malformed backend line: {}", e);
                return LineAction::Skip;
            }
        };

        if let Some(error) = chunk.error {
            self.state = RelayState::Failed;
            return LineAction::Fail(error);
        }

        let fragment = chunk.response.filter(|f| !f.is_empty());
        if let Some(ref f) = fragment {
            self.text.push_str(f);
        }
        if chunk.done {
            self.state = RelayState::Completed;
        }
        LineAction::Emit {
            fragment,
            done: chunk.done,
        }
    }
}

impl Default for StreamRelay {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum RelayOutcome {
    Completed { chat_id: i64, text: String },
    /// Generation finished and was streamed, but the store write failed.
    PersistFailed { text: String },
    Failed(String),
    /// The client went away before the backend finished; nothing was stored.
    Disconnected,
}

fn fail(relay: &mut StreamRelay, tx: &EventSender, detail: String) -> RelayOutcome {
    log::warn!("Generation failed: {}", detail);
    relay.fail();
    let _ = tx.send(RelayEvent::error(detail.clone()));
    RelayOutcome::Failed(detail)
}

/// Drive one generation from already-opened backend lines to a terminal
/// state. Dropping `lines` on return releases the backend connection.
pub async fn relay_lines<S>(
    mut lines: S,
    conversation: &Conversation,
    pool: &SqlitePool,
    tx: &EventSender,
) -> RelayOutcome
where
    S: Stream<Item = Result<Bytes, BackendError>> + Unpin,
{
    let mut relay = StreamRelay::new();
    relay.start();

    while !relay.is_terminal() {
        let next = tokio::select! {
            _ = tx.closed() => {
                log::info!("Client disconnected during {}, dropping generation", conversation.kind());
                return RelayOutcome::Disconnected;
            }
            next = lines.next() => next,
        };

        let line = match next {
            Some(Ok(line)) => line,
            Some(Err(e)) => return fail(&mut relay, tx, e.to_string()),
            None => {
                return fail(
                    &mut relay,
                    tx,
                    "Backend stream ended before completion".to_string(),
                )
            }
        };

        match relay.accept_line(&line) {
            LineAction::Skip => {}
            LineAction::Emit { fragment, .. } => {
                if let Some(fragment) = fragment {
                    if tx.send(RelayEvent::response(fragment)).is_err() {
                        log::info!(
                            "Client disconnected during {}, dropping generation",
                            conversation.kind()
                        );
                        return RelayOutcome::Disconnected;
                    }
                }
            }
            LineAction::Fail(detail) => return fail(&mut relay, tx, detail),
        }
    }
    drop(lines);

    let _ = tx.send(RelayEvent::done());

    let text = relay.text;
    let fields = ChatFields {
        model: conversation.model(),
        query: conversation.prompt(),
        response: &text,
    };
    let stored = match conversation {
        Conversation::New { .. } => db::insert_chat(pool, &fields).await,
        Conversation::Continue { id, .. } => db::update_chat(pool, *id, &fields).await.map(|()| *id),
    };

    match stored {
        Ok(chat_id) => {
            log::info!(
                "Stored {} as chat {} ({} bytes)",
                conversation.kind(),
                chat_id,
                text.len()
            );
            let _ = tx.send(RelayEvent::chat_id(chat_id));
            RelayOutcome::Completed { chat_id, text }
        }
        Err(e) => {
            log::error!("Failed to store {}: {}", conversation.kind(), e);
            let _ = tx.send(RelayEvent::error(format!("Failed to save chat: {}", e)));
            RelayOutcome::PersistFailed { text }
        }
    }
}

/// Open the backend stream for `conversation` and relay it. Consumes the
/// sender, so the SSE response ends when this returns.
pub async fn run_generation(
    client: BackendClient,
    pool: SqlitePool,
    conversation: Conversation,
    options: Option<serde_json::Value>,
    tx: EventSender,
) -> RelayOutcome {
    log::info!(
        "Generating with {} for {}",
        conversation.model(),
        conversation.kind()
    );

    let opened = tokio::select! {
        _ = tx.closed() => {
            log::info!("Client disconnected before backend answered");
            return RelayOutcome::Disconnected;
        }
        opened = client.stream_generate(conversation.model(), conversation.prompt(), options.as_ref()) => opened,
    };

    match opened {
        Ok(lines) => relay_lines(lines, &conversation, &pool, &tx).await,
        Err(e) => {
            let mut relay = StreamRelay::new();
            relay.start();
            fail(&mut relay, &tx, e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn lines(raw: &[&str]) -> impl Stream<Item = Result<Bytes, BackendError>> + Unpin {
        let items: Vec<Result<Bytes, BackendError>> = raw
            .iter()
            .map(|l| Ok(Bytes::copy_from_slice(l.as_bytes())))
            .collect();
        stream::iter(items)
    }

    fn new_chat() -> Conversation {
        Conversation::New {
            model: "deepseek-r1:7b".to_string(),
            prompt: "say hello".to_string(),
        }
    }

    fn drain(mut rx: UnboundedReceiver<RelayEvent>) -> Vec<RelayEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn relay_starts_idle_and_ignores_lines() {
        let mut relay = StreamRelay::new();
        assert_eq!(relay.state(), RelayState::Idle);
        assert_eq!(
            relay.accept_line(br#"{"response":"x","done":false}"#),
            LineAction::Skip
        );
        assert_eq!(relay.text(), "");
    }

    #[test]
    fn relay_accumulates_and_completes() {
        let mut relay = StreamRelay::new();
        relay.start();
        assert_eq!(
            relay.accept_line(br#"{"response":"Hel","done":false}"#),
            LineAction::Emit {
                fragment: Some("Hel".to_string()),
                done: false
            }
        );
        assert_eq!(relay.accept_line(b"not-json"), LineAction::Skip);
        relay.accept_line(br#"{"response":"lo","done":false}"#);
        assert_eq!(
            relay.accept_line(br#"{"response":"","done":true}"#),
            LineAction::Emit {
                fragment: None,
                done: true
            }
        );
        assert_eq!(relay.state(), RelayState::Completed);
        assert_eq!(relay.text(), "Hello");

        // terminal: nothing moves it again
        assert_eq!(
            relay.accept_line(br#"{"response":"!","done":false}"#),
            LineAction::Skip
        );
        relay.fail();
        assert_eq!(relay.state(), RelayState::Completed);
        assert_eq!(relay.text(), "Hello");
    }

    #[test]
    fn relay_fails_on_backend_error_line() {
        let mut relay = StreamRelay::new();
        relay.start();
        assert_eq!(
            relay.accept_line(br#"{"error":"model not found"}"#),
            LineAction::Fail("model not found".to_string())
        );
        assert_eq!(relay.state(), RelayState::Failed);
    }

    #[tokio::test]
    async fn hello_scenario_streams_and_stores_once() {
        let pool = db::init_memory_pool().await.unwrap();
        let (tx, rx) = event_channel();

        let outcome = relay_lines(
            lines(&[
                r#"{"response":"Hel","done":false}"#,
                r#"{"response":"lo","done":false}"#,
                r#"{"response":"","done":true}"#,
            ]),
            &new_chat(),
            &pool,
            &tx,
        )
        .await;
        drop(tx);

        let chat_id = match outcome {
            RelayOutcome::Completed { chat_id, ref text } => {
                assert_eq!(text, "Hello");
                chat_id
            }
            other => panic!("unexpected outcome: {:?}", other),
        };

        assert_eq!(
            drain(rx),
            vec![
                RelayEvent::response("Hel"),
                RelayEvent::response("lo"),
                RelayEvent::done(),
                RelayEvent::chat_id(chat_id),
            ]
        );

        let chats = db::list_chats(&pool).await.unwrap();
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0].response, "Hello");
        assert_eq!(chats[0].query, "say hello");
        assert_eq!(chats[0].model, "deepseek-r1:7b");
    }

    #[tokio::test]
    async fn malformed_line_is_skipped() {
        let pool = db::init_memory_pool().await.unwrap();
        let (tx, rx) = event_channel();

        let outcome = relay_lines(
            lines(&[
                r#"{"response":"Hel","done":false}"#,
                "not-json",
                r#"{"response":"lo","done":true}"#,
            ]),
            &new_chat(),
            &pool,
            &tx,
        )
        .await;
        drop(tx);

        assert!(matches!(outcome, RelayOutcome::Completed { ref text, .. } if text == "Hello"));
        let events = drain(rx);
        assert_eq!(events[0], RelayEvent::response("Hel"));
        assert_eq!(events[1], RelayEvent::response("lo"));
        assert_eq!(events[2], RelayEvent::done());
        assert_eq!(db::list_chats(&pool).await.unwrap()[0].response, "Hello");
    }

    #[tokio::test]
    async fn lines_after_done_are_not_read() {
        let pool = db::init_memory_pool().await.unwrap();
        let (tx, rx) = event_channel();

        let outcome = relay_lines(
            lines(&[
                r#"{"response":"A","done":true}"#,
                r#"{"response":"B","done":false}"#,
            ]),
            &new_chat(),
            &pool,
            &tx,
        )
        .await;
        drop(tx);

        assert!(matches!(outcome, RelayOutcome::Completed { ref text, .. } if text == "A"));
        assert!(!drain(rx).contains(&RelayEvent::response("B")));
        assert_eq!(db::list_chats(&pool).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stream_without_done_fails_without_storing() {
        let pool = db::init_memory_pool().await.unwrap();
        let (tx, rx) = event_channel();

        let outcome = relay_lines(
            lines(&[r#"{"response":"partial","done":false}"#]),
            &new_chat(),
            &pool,
            &tx,
        )
        .await;
        drop(tx);

        assert!(matches!(outcome, RelayOutcome::Failed(_)));
        let events = drain(rx);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], RelayEvent::response("partial"));
        assert!(matches!(events[1], RelayEvent::Error { .. }));
        assert!(db::list_chats(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn io_error_mid_stream_is_terminal() {
        let pool = db::init_memory_pool().await.unwrap();
        let (tx, rx) = event_channel();

        let items: Vec<Result<Bytes, BackendError>> = vec![
            Ok(Bytes::from_static(br#"{"response":"a","done":false}"#)),
            Err(BackendError::Unavailable("connection reset".to_string())),
            Ok(Bytes::from_static(br#"{"response":"b","done":true}"#)),
        ];
        let outcome = relay_lines(stream::iter(items), &new_chat(), &pool, &tx).await;
        drop(tx);

        assert_eq!(
            outcome,
            RelayOutcome::Failed("Backend unavailable: connection reset".to_string())
        );
        assert_eq!(
            drain(rx),
            vec![
                RelayEvent::response("a"),
                RelayEvent::error("Backend unavailable: connection reset"),
            ]
        );
        assert!(db::list_chats(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn continue_updates_existing_record() {
        let pool = db::init_memory_pool().await.unwrap();
        let id = db::insert_chat(
            &pool,
            &ChatFields {
                model: "deepseek-r1:7b",
                query: "first",
                response: "old",
            },
        )
        .await
        .unwrap();
        let (tx, rx) = event_channel();

        let conversation = Conversation::Continue {
            id,
            model: "deepseek-r1:8b".to_string(),
            prompt: "second".to_string(),
        };
        let outcome = relay_lines(
            lines(&[r#"{"response":"new","done":true}"#]),
            &conversation,
            &pool,
            &tx,
        )
        .await;
        drop(tx);

        assert_eq!(
            outcome,
            RelayOutcome::Completed {
                chat_id: id,
                text: "new".to_string()
            }
        );
        assert_eq!(drain(rx).last(), Some(&RelayEvent::chat_id(id)));

        let chats = db::list_chats(&pool).await.unwrap();
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0].query, "second");
        assert_eq!(chats[0].response, "new");
        assert_eq!(chats[0].model, "deepseek-r1:8b");
    }

    #[tokio::test]
    async fn chat_is_continued_at_most_once() {
        let pool = db::init_memory_pool().await.unwrap();
        let id = db::insert_chat(
            &pool,
            &ChatFields {
                model: "deepseek-r1:7b",
                query: "q1",
                response: "r1",
            },
        )
        .await
        .unwrap();

        let continue_with = |prompt: &str| Conversation::Continue {
            id,
            model: "deepseek-r1:7b".to_string(),
            prompt: prompt.to_string(),
        };

        let (tx, _rx) = event_channel();
        let first = relay_lines(
            lines(&[r#"{"response":"r2","done":true}"#]),
            &continue_with("q2"),
            &pool,
            &tx,
        )
        .await;
        assert!(matches!(first, RelayOutcome::Completed { chat_id, .. } if chat_id == id));

        let (tx, rx) = event_channel();
        let second = relay_lines(
            lines(&[r#"{"response":"r3","done":true}"#]),
            &continue_with("q3"),
            &pool,
            &tx,
        )
        .await;
        drop(tx);

        assert_eq!(
            second,
            RelayOutcome::PersistFailed {
                text: "r3".to_string()
            }
        );
        assert!(matches!(drain(rx).last(), Some(RelayEvent::Error { .. })));

        let chat = db::get_chat(&pool, id).await.unwrap();
        assert_eq!(chat.query, "q2");
        assert_eq!(chat.response, "r2");
    }

    #[tokio::test]
    async fn disconnect_while_backend_stalls_stores_nothing() {
        let pool = db::init_memory_pool().await.unwrap();
        let (tx, mut rx) = event_channel();
        let stalled = lines(&[r#"{"response":"Hel","done":false}"#])
            .chain(stream::pending::<Result<Bytes, BackendError>>());
        let conversation = new_chat();

        let client = async move {
            let first = rx.recv().await;
            drop(rx);
            first
        };
        let (outcome, first) = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            async { tokio::join!(relay_lines(stalled, &conversation, &pool, &tx), client) },
        )
        .await
        .unwrap();

        assert_eq!(first, Some(RelayEvent::response("Hel")));
        assert_eq!(outcome, RelayOutcome::Disconnected);
        assert!(db::list_chats(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn disconnected_client_stores_nothing() {
        let pool = db::init_memory_pool().await.unwrap();
        let (tx, rx) = event_channel();
        drop(rx);

        let outcome = relay_lines(
            lines(&[
                r#"{"response":"Hel","done":false}"#,
                r#"{"response":"lo","done":true}"#,
            ]),
            &new_chat(),
            &pool,
            &tx,
        )
        .await;

        assert_eq!(outcome, RelayOutcome::Disconnected);
        assert!(db::list_chats(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn store_failure_is_reported_after_text() {
        let pool = db::init_memory_pool().await.unwrap();
        pool.close().await;
        let (tx, rx) = event_channel();

        let outcome = relay_lines(
            lines(&[r#"{"response":"kept","done":true}"#]),
            &new_chat(),
            &pool,
            &tx,
        )
        .await;
        drop(tx);

        assert_eq!(
            outcome,
            RelayOutcome::PersistFailed {
                text: "kept".to_string()
            }
        );
        let events = drain(rx);
        assert_eq!(events[0], RelayEvent::response("kept"));
        assert_eq!(events[1], RelayEvent::done());
        assert!(matches!(events[2], RelayEvent::Error { .. }));
        assert_eq!(events.len(), 3);
    }
}
