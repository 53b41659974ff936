use std::pin::Pin;

use eventsource_stream::{EventStream, Eventsource};
use futures_util::Stream;

use super::Frame;
use crate::client::{QueryError, QueryErrorKind, QueryResult};

/// SSE parser that converts a byte stream into `Frame`s.
///
/// Framing only: payloads are passed through untouched and interpreted later
/// by [`super::decoder::Decoder`].
pub struct SseParser<S> {
    inner: EventStream<S>,
}

impl<S> SseParser<S> {
    pub fn new(stream: S) -> Self
    where
        S: Eventsource,
    {
        Self {
            inner: stream.eventsource(),
        }
    }
}

impl<S, E> Stream for SseParser<S>
where
    S: Stream<Item = std::result::Result<bytes::Bytes, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    type Item = QueryResult<Frame>;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        use std::task::Poll;

        match Pin::new(&mut self.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(event))) => {
                Poll::Ready(Some(Ok(Frame::new(event.event, event.data))))
            }
            Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(QueryError::new(
                QueryErrorKind::Disconnected,
                format!("SSE stream error: {e}"),
            )))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;

    use super::*;

    /// Typical answer stream: planning status, two tokens, sources, end.
    const SSE_ANSWER: &str = r#"data: {"status":"planning"}

data: {"token":"Start "}

data: {"token":"Allen."}

event: sources
data: [{"tool":"projections","args":{"week":7}}]

event: end
data:

"#;

    /// Helper to create a mock byte stream from a string
    fn mock_byte_stream(
        data: &str,
        chunk_size: usize,
    ) -> impl Stream<Item = std::result::Result<bytes::Bytes, std::io::Error>> {
        let chunks: Vec<_> = data
            .as_bytes()
            .chunks(chunk_size)
            .map(|c| Ok(bytes::Bytes::copy_from_slice(c)))
            .collect();
        futures_util::stream::iter(chunks)
    }

    async fn collect(data: &str, chunk_size: usize) -> Vec<Frame> {
        let mut parser = SseParser::new(mock_byte_stream(data, chunk_size));
        let mut frames = Vec::new();
        while let Some(result) = parser.next().await {
            frames.push(result.expect("Expected valid frame"));
        }
        frames
    }

    #[tokio::test]
    async fn test_sse_parser_frames_in_order() {
        let frames = collect(SSE_ANSWER, 50).await;

        assert_eq!(frames.len(), 5);
        assert!(frames[0].is_default());
        assert_eq!(frames[0].data, r#"{"status":"planning"}"#);
        assert_eq!(frames[1].data, r#"{"token":"Start "}"#);
        assert_eq!(frames[2].data, r#"{"token":"Allen."}"#);
        assert_eq!(frames[3].event, "sources");
        assert_eq!(frames[4].event, "end");
        assert_eq!(frames[4].data, "");
    }

    #[tokio::test]
    async fn test_sse_parser_handles_incomplete_chunks() {
        // Chunks split across field and frame boundaries
        let frames = collect(SSE_ANSWER, 7).await;
        assert_eq!(frames, collect(SSE_ANSWER, 4096).await);
    }

    #[tokio::test]
    async fn test_sse_parser_passes_non_json_payload_through() {
        let frames = collect("data: plain words\n\n", 64).await;
        assert_eq!(frames, vec![Frame::message("plain words")]);
    }
}
