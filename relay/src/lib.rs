pub mod client;
pub mod error;
pub mod ndjson;
pub mod sse;
pub mod stream;

pub use client::{BackendClient, BackendStatus};
pub use error::BackendError;
pub use sse::{sse_response, RelayEvent};
pub use stream::{
    event_channel, relay_lines, run_generation, Conversation, EventSender, RelayOutcome,
    RelayState, StreamRelay,
};
