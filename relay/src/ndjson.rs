//! Newline-delimited JSON framing for the backend's streaming body.
//!
//! Network reads do not respect line boundaries: a read can end in the middle
//! of a JSON object or in the middle of a multi-byte UTF-8 character. Lines are
//! therefore cut on raw bytes and only handed out once their `\n` has arrived.

use std::collections::VecDeque;

use bytes::Bytes;
use futures::{stream, Stream, StreamExt};

pub struct LineSplitter {
    buffer: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        LineSplitter { buffer: Vec::new() }
    }

    /// Feed a chunk of bytes and return the completed, non-blank lines.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        self.buffer.extend_from_slice(chunk);
        let mut lines = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let rest = self.buffer.split_off(pos + 1);
            let mut line = std::mem::replace(&mut self.buffer, rest);
            line.truncate(pos);
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if !line.iter().all(u8::is_ascii_whitespace) {
                lines.push(Bytes::from(line));
            }
        }

        lines
    }

    /// Return a trailing line that was never terminated by `\n`.
    pub fn flush(&mut self) -> Option<Bytes> {
        let line = std::mem::take(&mut self.buffer);
        if line.iter().all(u8::is_ascii_whitespace) {
            None
        } else {
            Some(Bytes::from(line))
        }
    }
}

impl Default for LineSplitter {
    fn default() -> Self {
        Self::new()
    }
}

struct LineState<S> {
    chunks: S,
    splitter: LineSplitter,
    pending: VecDeque<Bytes>,
    finished: bool,
}

/// Re-frame a stream of arbitrary byte chunks into a stream of lines.
///
/// An error from the underlying stream is yielded once and ends the stream.
pub fn split_lines<S, E>(chunks: S) -> impl Stream<Item = Result<Bytes, E>>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    let state = LineState {
        chunks,
        splitter: LineSplitter::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(line) = st.pending.pop_front() {
                return Some((Ok(line), st));
            }
            if st.finished {
                return None;
            }
            match st.chunks.next().await {
                Some(Ok(chunk)) => st.pending.extend(st.splitter.feed(&chunk)),
                Some(Err(e)) => {
                    st.finished = true;
                    return Some((Err(e), st));
                }
                None => {
                    st.finished = true;
                    st.pending.extend(st.splitter.flush());
                }
            }
        }
    })
}
