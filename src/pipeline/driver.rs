//! Stream driver: response body -> SseDecoder -> StreamHandler.

use crate::pipeline::decode::SseDecoder;
use crate::pipeline::handler::StreamHandler;
use crate::transport::TransportError;
use crate::{BoxStream, Error, Result};
use bytes::Bytes;
use futures::StreamExt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Drives one open event-stream body through a handler.
///
/// Guarantees, per [`run`](StreamDriver::run) call:
/// - the body is read in a single forward pass, and each event is awaited
///   through `on_event` before the next event or read;
/// - exactly one of `on_error` / `on_complete` fires, after the body has been
///   released;
/// - cancellation is raced against every read and checked between events.
#[derive(Debug, Default)]
pub struct StreamDriver {
    idle_timeout: Option<Duration>,
    events_delivered: u64,
}

impl StreamDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the stream when no chunk arrives for `timeout`.
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Events successfully handed to `on_event` so far.
    pub fn events_delivered(&self) -> u64 {
        self.events_delivered
    }

    pub async fn run<H>(
        &mut self,
        body: BoxStream<'static, Bytes>,
        handler: &mut H,
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        H: StreamHandler + ?Sized,
    {
        let mut body = body;
        let outcome = self.pump(&mut body, handler, cancel).await;
        drop(body);

        match outcome {
            Ok(()) => {
                handler.on_complete().await;
                Ok(())
            }
            Err(err) => {
                handler.on_error(&err).await;
                Err(err)
            }
        }
    }

    async fn pump<H>(
        &mut self,
        body: &mut BoxStream<'static, Bytes>,
        handler: &mut H,
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        H: StreamHandler + ?Sized,
    {
        let mut decoder = SseDecoder::new();
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                next = next_chunk(body, self.idle_timeout) => next?,
            };

            let Some(chunk) = next else {
                if let Some(rest) = decoder.flush() {
                    debug!(
                        unconsumed_bytes = rest.unconsumed_bytes,
                        pending_event = rest.pending_event,
                        "event stream closed inside an unterminated block"
                    );
                }
                return Ok(());
            };

            for event in decoder.feed(&chunk) {
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                handler.on_event(&event).await?;
                self.events_delivered += 1;
            }
        }
    }
}

async fn next_chunk(
    body: &mut BoxStream<'static, Bytes>,
    idle_timeout: Option<Duration>,
) -> Result<Option<Bytes>> {
    let next = match idle_timeout {
        Some(t) => tokio::time::timeout(t, body.next())
            .await
            .map_err(|_| Error::Transport(TransportError::Timeout(t)))?,
        None => body.next().await,
    };
    next.transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::handler::RecordingHandler;
    use futures::stream;
    use std::time::Instant;

    fn body(chunks: &[&'static str]) -> BoxStream<'static, Bytes> {
        let items: Vec<Result<Bytes>> = chunks
            .iter()
            .map(|c| Ok(Bytes::from_static(c.as_bytes())))
            .collect();
        Box::pin(stream::iter(items))
    }

    #[tokio::test]
    async fn delivers_in_order_then_completes() {
        let mut handler = RecordingHandler::new();
        let mut driver = StreamDriver::new();
        let result = driver
            .run(
                body(&["data: 1\n\nda", "ta: 2\n", "\nevent: ping\n\ndata: 3\n\n"]),
                &mut handler,
                &CancellationToken::new(),
            )
            .await;

        assert!(result.is_ok());
        assert_eq!(handler.data(), vec!["1", "2", "3"]);
        assert_eq!(handler.completions, 1);
        assert!(handler.errors.is_empty());
        assert_eq!(driver.events_delivered(), 3);
    }

    #[tokio::test]
    async fn empty_body_completes_without_events() {
        let mut handler = RecordingHandler::new();
        StreamDriver::new()
            .run(body(&[]), &mut handler, &CancellationToken::new())
            .await
            .unwrap();
        assert!(handler.events.is_empty());
        assert_eq!(handler.completions, 1);
    }

    #[tokio::test]
    async fn handler_error_stops_the_stream() {
        let mut handler = RecordingHandler::failing_on(2, "boom");
        let mut driver = StreamDriver::new();
        let err = driver
            .run(
                body(&["data: 1\n\ndata: 2\n\ndata: 3\n\n", "data: 4\n\n"]),
                &mut handler,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Handler(_)));
        assert_eq!(handler.data(), vec!["1", "2"]);
        assert_eq!(handler.errors, vec![err.to_string()]);
        assert_eq!(handler.completions, 0);
        assert_eq!(driver.events_delivered(), 1);
    }

    #[tokio::test]
    async fn read_error_reaches_on_error() {
        let items: Vec<Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"data: 1\n\n")),
            Err(Error::Transport(TransportError::Other(
                "connection reset".into(),
            ))),
        ];
        let mut handler = RecordingHandler::new();
        let err = StreamDriver::new()
            .run(
                Box::pin(stream::iter(items)),
                &mut handler,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(handler.data(), vec!["1"]);
        assert_eq!(handler.terminal_count(), 1);
        assert_eq!(handler.completions, 0);
    }

    #[tokio::test]
    async fn cancellation_unblocks_a_pending_read() {
        let hanging: BoxStream<'static, Bytes> = Box::pin(
            stream::iter(vec![Ok::<_, Error>(Bytes::from_static(b"data: first\n\n"))])
                .chain(stream::pending()),
        );
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let mut handler = RecordingHandler::new();
        let start = Instant::now();
        let err = tokio::time::timeout(
            Duration::from_secs(5),
            StreamDriver::new().run(hanging, &mut handler, &cancel),
        )
        .await
        .expect("driver did not return after cancellation")
        .unwrap_err();

        assert!(err.is_cancelled());
        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(handler.data(), vec!["first"]);
        assert_eq!(handler.errors.len(), 1);
        assert_eq!(handler.completions, 0);
    }

    #[tokio::test]
    async fn idle_timeout_fails_a_silent_stream() {
        let silent: BoxStream<'static, Bytes> = Box::pin(stream::pending::<Result<Bytes>>());
        let mut handler = RecordingHandler::new();
        let err = StreamDriver::new()
            .with_idle_timeout(Some(Duration::from_millis(20)))
            .run(silent, &mut handler, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Transport(TransportError::Timeout(_))
        ));
        assert_eq!(handler.terminal_count(), 1);
    }
}
