//! Streaming SSE decoder (Bytes -> SseEvent)
//!
//! [`SseDecoder`] is a pure, incremental parser: bytes go in as they arrive
//! from the network, complete events come out. It never looks at the
//! payload; JSON decoding is left to the handler.

use crate::types::events::{SseEvent, DEFAULT_EVENT_TYPE};
use crate::BoxStream;
use bytes::Bytes;
use futures::{stream, StreamExt};
use std::collections::VecDeque;
use tracing::debug;

/// Fields of the event currently being assembled.
#[derive(Debug, Default)]
struct PendingEvent {
    event: Option<String>,
    data: Option<String>,
    id: Option<String>,
    retry: Option<u64>,
}

impl PendingEvent {
    fn is_empty(&self) -> bool {
        self.event.is_none() && self.data.is_none() && self.id.is_none() && self.retry.is_none()
    }

    /// Close the block. Yields an event only if a data line was recorded.
    fn take(&mut self) -> Option<SseEvent> {
        let pending = std::mem::take(self);
        let data = pending.data?;
        Some(SseEvent {
            event: pending
                .event
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| DEFAULT_EVENT_TYPE.to_string()),
            data,
            id: pending.id,
            retry: pending.retry,
        })
    }
}

/// What was left over when the input ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Remainder {
    /// Bytes after the last consumed line (an unterminated line, or lines never drained).
    pub unconsumed_bytes: usize,
    /// Fields were recorded for a block that never saw its blank line.
    pub pending_event: bool,
}

/// Incremental `text/event-stream` parser.
///
/// Lines are split on `\n` (a trailing `\r` is dropped) and only decoded as
/// UTF-8 once complete, so chunk boundaries may fall anywhere, including
/// inside a multi-byte character. A block is emitted on its terminating blank
/// line and only if it carried at least one `data` line.
#[derive(Debug)]
pub struct SseDecoder {
    buf: Vec<u8>,
    /// Start of the bytes not yet consumed as lines.
    pos: usize,
    /// Everything before this offset is known to contain no `\n`.
    scanned: usize,
    pending: PendingEvent,
    at_stream_start: bool,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            pos: 0,
            scanned: 0,
            pending: PendingEvent::default(),
            at_stream_start: true,
        }
    }

    /// Append a chunk and iterate over the events it completes.
    ///
    /// The iterator is lazy: lines are parsed as it is advanced. Lines left
    /// unparsed when it is dropped are picked up by the next call.
    pub fn feed(&mut self, chunk: &[u8]) -> Events<'_> {
        if self.pos > 0 {
            self.buf.drain(..self.pos);
            self.scanned -= self.pos;
            self.pos = 0;
        }
        self.buf.extend_from_slice(chunk);
        Events { decoder: self }
    }

    /// End of input. Never emits the unterminated block; reports it and resets.
    pub fn flush(&mut self) -> Option<Remainder> {
        let remainder = Remainder {
            unconsumed_bytes: self.buf.len() - self.pos,
            pending_event: !self.pending.is_empty(),
        };
        *self = Self::new();
        if remainder.unconsumed_bytes == 0 && !remainder.pending_event {
            None
        } else {
            Some(remainder)
        }
    }

    /// Bytes buffered but not yet consumed as complete lines.
    pub fn buffered_len(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn next_line(&mut self) -> Option<String> {
        let Some(offset) = self.buf[self.scanned..].iter().position(|&b| b == b'\n') else {
            self.scanned = self.buf.len();
            return None;
        };
        let end = self.scanned + offset;

        let mut raw = &self.buf[self.pos..end];
        if let [head @ .., b'\r'] = raw {
            raw = head;
        }
        let mut line = String::from_utf8_lossy(raw).into_owned();

        self.pos = end + 1;
        self.scanned = self.pos;

        if self.at_stream_start {
            self.at_stream_start = false;
            if let Some(stripped) = line.strip_prefix('\u{feff}') {
                line = stripped.to_string();
            }
        }
        Some(line)
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.pending.take();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.find(':') {
            Some(idx) => {
                let value = &line[idx + 1..];
                (&line[..idx], value.strip_prefix(' ').unwrap_or(value))
            }
            None => (line, ""),
        };

        match field {
            "data" => match self.pending.data.as_mut() {
                Some(data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => self.pending.data = Some(value.to_string()),
            },
            "event" => self.pending.event = Some(value.to_string()),
            "id" => {
                if !value.contains('\0') {
                    self.pending.id = Some(value.to_string());
                }
            }
            "retry" => {
                if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
                    if let Ok(ms) = value.parse::<u64>() {
                        self.pending.retry = Some(ms);
                    }
                }
            }
            _ => {}
        }
        None
    }
}

/// Events completed by one [`SseDecoder::feed`] call.
pub struct Events<'a> {
    decoder: &'a mut SseDecoder,
}

impl Iterator for Events<'_> {
    type Item = SseEvent;

    fn next(&mut self) -> Option<SseEvent> {
        while let Some(line) = self.decoder.next_line() {
            if let Some(event) = self.decoder.process_line(&line) {
                return Some(event);
            }
        }
        None
    }
}

/// Adapt a byte stream into a lazy stream of events.
///
/// A read error is passed through once and ends the stream.
pub fn decode_stream(input: BoxStream<'static, Bytes>) -> BoxStream<'static, SseEvent> {
    let state = (input, SseDecoder::new(), VecDeque::new(), false);
    let stream = stream::unfold(state, |(mut input, mut decoder, mut ready, done)| async move {
        loop {
            if let Some(event) = ready.pop_front() {
                return Some((Ok(event), (input, decoder, ready, done)));
            }
            if done {
                return None;
            }
            match input.next().await {
                Some(Ok(bytes)) => ready.extend(decoder.feed(&bytes)),
                Some(Err(e)) => return Some((Err(e), (input, decoder, ready, true))),
                None => {
                    if let Some(rest) = decoder.flush() {
                        debug!(
                            unconsumed_bytes = rest.unconsumed_bytes,
                            pending_event = rest.pending_event,
                            "event stream ended inside an unterminated block"
                        );
                    }
                    return None;
                }
            }
        }
    });
    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(input: &[u8]) -> Vec<SseEvent> {
        let mut decoder = SseDecoder::new();
        decoder.feed(input).collect()
    }

    fn decode_in_chunks(input: &[u8], size: usize) -> Vec<SseEvent> {
        let mut decoder = SseDecoder::new();
        let mut out = Vec::new();
        for chunk in input.chunks(size) {
            out.extend(decoder.feed(chunk));
        }
        out
    }

    const SAMPLE: &str = concat!(
        "\u{feff}: keep-alive\n",
        "event: message\n",
        "data: {\"answer\":\"héllo 世界 🌍\"}\n",
        "\n",
        "event: ping\r\n",
        "\r\n",
        "id: 42\n",
        "retry: 1500\n",
        "data: first\n",
        "data:second\n",
        "data\n",
        "\n",
        "event: message_end\n",
        "data: {\"metadata\":{}}\n",
        "unknown: field\n",
        "\n",
        "data: never terminated"
    );

    #[test]
    fn literal_message_block() {
        let events = decode_all(b"event: message\ndata: {\"a\":1}\n\n");
        assert_eq!(events, vec![SseEvent::new("message", "{\"a\":1}")]);
    }

    #[test]
    fn multiple_data_lines_join_with_newline() {
        let events = decode_all(b"data: foo\ndata: bar\n\n");
        assert_eq!(events, vec![SseEvent::message("foo\nbar")]);
    }

    #[test]
    fn block_without_data_emits_nothing() {
        assert!(decode_all(b"event: ping\n\n").is_empty());
        // and does not leak its type into the next block
        let events = decode_all(b"event: ping\n\ndata: x\n\n");
        assert_eq!(events, vec![SseEvent::message("x")]);
    }

    #[test]
    fn explicitly_empty_data_is_emitted() {
        assert_eq!(decode_all(b"data:\n\n"), vec![SseEvent::message("")]);
        assert_eq!(decode_all(b"data\n\n"), vec![SseEvent::message("")]);
    }

    #[test]
    fn comments_and_unknown_fields_are_ignored() {
        let events = decode_all(b": hello\nfoo: bar\ndata: x\n: mid\n\n");
        assert_eq!(events, vec![SseEvent::message("x")]);
    }

    #[test]
    fn only_one_leading_space_is_stripped() {
        let events = decode_all(b"data:   indented\n\n");
        assert_eq!(events[0].data, "  indented");
    }

    #[test]
    fn id_and_retry_fields() {
        let events = decode_all(b"id: 7\nretry: 3000\ndata: x\n\nretry: soon\ndata: y\n\n");
        assert_eq!(events[0].id.as_deref(), Some("7"));
        assert_eq!(events[0].retry, Some(3000));
        assert_eq!(events[1].id, None);
        assert_eq!(events[1].retry, None);
    }

    #[test]
    fn sample_stream_decodes_fully() {
        let events = decode_all(SAMPLE.as_bytes());
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].event, "message");
        assert_eq!(events[0].data, "{\"answer\":\"héllo 世界 🌍\"}");
        assert_eq!(events[1].data, "first\nsecond\n");
        assert_eq!(events[1].id.as_deref(), Some("42"));
        assert_eq!(events[1].retry, Some(1500));
        assert_eq!(events[2].event, "message_end");
    }

    #[test]
    fn chunk_boundaries_do_not_matter() {
        let whole = decode_all(SAMPLE.as_bytes());
        for size in 1..=SAMPLE.len() {
            assert_eq!(decode_in_chunks(SAMPLE.as_bytes(), size), whole, "chunk size {size}");
        }
    }

    #[test]
    fn crlf_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert_eq!(decoder.feed(b"data: a\r").count(), 0);
        assert_eq!(decoder.feed(b"\n\r").count(), 0);
        let events: Vec<_> = decoder.feed(b"\n").collect();
        assert_eq!(events, vec![SseEvent::message("a")]);
    }

    #[test]
    fn unterminated_block_is_reported_not_emitted() {
        let mut decoder = SseDecoder::new();
        assert_eq!(decoder.feed(b"data: complete line\n").count(), 0);
        assert_eq!(
            decoder.flush(),
            Some(Remainder {
                unconsumed_bytes: 0,
                pending_event: true
            })
        );

        let mut decoder = SseDecoder::new();
        assert_eq!(decoder.feed(b"data: x\n\ndata: partial").count(), 1);
        assert_eq!(decoder.buffered_len(), "data: partial".len());
        let rest = decoder.flush().unwrap();
        assert_eq!(rest.unconsumed_bytes, "data: partial".len());
        assert!(!rest.pending_event);

        // flush resets the decoder
        assert_eq!(decoder.flush(), None);
    }

    #[test]
    fn dropped_iterator_keeps_remaining_lines() {
        let mut decoder = SseDecoder::new();
        let first = decoder.feed(b"data: 1\n\ndata: 2\n\n").next();
        assert_eq!(first, Some(SseEvent::message("1")));
        let rest: Vec<_> = decoder.feed(b"data: 3\n\n").collect();
        assert_eq!(rest, vec![SseEvent::message("2"), SseEvent::message("3")]);
    }

    #[tokio::test]
    async fn decode_stream_yields_events_then_error() {
        let chunks: Vec<crate::Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"data: a\n")),
            Ok(Bytes::from_static(b"\ndata: b\n\n")),
            Err(crate::Error::Transport(crate::transport::TransportError::Other(
                "reset".into(),
            ))),
            Ok(Bytes::from_static(b"data: never\n\n")),
        ];
        let mut events = decode_stream(Box::pin(stream::iter(chunks)));

        assert_eq!(events.next().await.unwrap().unwrap().data, "a");
        assert_eq!(events.next().await.unwrap().unwrap().data, "b");
        assert!(events.next().await.unwrap().is_err());
        assert!(events.next().await.is_none());
    }
}
