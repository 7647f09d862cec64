use actix_web::error::ErrorInternalServerError;
use actix_web::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use actix_web::HttpResponse;
use bytes::Bytes;
use futures::stream;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedReceiver;

/// One Server-Sent Event sent to the browser. Each variant serializes to the
/// bare JSON object the chat page expects, e.g. `{"response":"Hel"}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RelayEvent {
    Response { response: String },
    Error { error: String },
    Done { done: bool },
    ChatId { chat_id: i64 },
}

impl RelayEvent {
    pub fn response(fragment: impl Into<String>) -> Self {
        RelayEvent::Response {
            response: fragment.into(),
        }
    }

    pub fn error(detail: impl Into<String>) -> Self {
        RelayEvent::Error {
            error: detail.into(),
        }
    }

    pub fn done() -> Self {
        RelayEvent::Done { done: true }
    }

    pub fn chat_id(id: i64) -> Self {
        RelayEvent::ChatId { chat_id: id }
    }

    /// Encode as a `data: <json>\n\n` frame.
    pub fn to_frame(&self) -> Result<Bytes, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(Bytes::from(format!("data: {}\n\n", json)))
    }
}

/// Build the `text/event-stream` response that drains `rx` until every sender
/// is dropped.
pub fn sse_response(rx: UnboundedReceiver<RelayEvent>) -> HttpResponse {
    let body = stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        Some((event.to_frame().map_err(ErrorInternalServerError), rx))
    });

    HttpResponse::Ok()
        .insert_header((CONTENT_TYPE, "text/event-stream"))
        .insert_header((CACHE_CONTROL, "no-cache"))
        .streaming(body)
}

/// Decode the `data:` payloads of an SSE body. Payloads that are not JSON are
/// returned as JSON strings.
pub fn parse_sse_events(body: &str) -> Vec<serde_json::Value> {
    let mut events = Vec::new();
    let mut current_data = String::new();

    for line in body.lines() {
        if let Some(stripped) = line.strip_prefix("data:") {
            if !current_data.is_empty() {
                current_data.push('\n');
            }
            current_data.push_str(stripped.trim());
        } else if line.trim().is_empty() && !current_data.is_empty() {
            events.push(decode_data(&current_data));
            current_data.clear();
        }
    }

    // Trailing event without final blank line
    if !current_data.is_empty() {
        events.push(decode_data(&current_data));
    }

    events
}

fn decode_data(data: &str) -> serde_json::Value {
    serde_json::from_str(data).unwrap_or_else(|_| serde_json::Value::String(data.to_string()))
}
