use std::pin::Pin;
use std::task::{Context, Poll};
use bytes::Bytes;
use futures_util::Stream;
use pin_project_lite::pin_project;
use crate::core::TransportSink;

pin_project! {
    /// Reports the running byte count to the sink as chunks go out.
    pub struct ProgressStream<S> {
        #[pin]
        inner: S,
        sink: TransportSink,
        bytes_sent: u64,
        bytes_total: u64,
    }
}

impl<S> ProgressStream<S> {
    pub fn new(inner: S, sink: TransportSink, bytes_total: u64) -> Self {
        Self {
            inner,
            sink,
            bytes_sent: 0,
            bytes_total,
        }
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }
}

impl<S> Stream for ProgressStream<S>
where
    S: Stream<Item = std::io::Result<Bytes>>,
{
    type Item = std::io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();

        match this.inner.poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                if !chunk.is_empty() {
                    *this.bytes_sent += chunk.len() as u64;
                    this.sink.progress(*this.bytes_sent, *this.bytes_total);
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            other => other,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;
    use tokio::sync::mpsc;
    use super::*;
    use crate::core::{JobId, TransportEvent, TransportEventKind};

    #[tokio::test]
    async fn test_reports_running_total_per_chunk() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = TransportSink::new(JobId::from("upload_file_1"), tx);
        let chunks: Vec<std::io::Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"hello")),
            Ok(Bytes::new()),
            Ok(Bytes::from_static(b"world!")),
        ];

        let mut stream = ProgressStream::new(futures_util::stream::iter(chunks), sink, 11);
        while let Some(chunk) = stream.next().await {
            chunk.unwrap();
        }
        assert_eq!(stream.bytes_sent(), 11);
        drop(stream);

        let mut seen = Vec::new();
        while let Some(TransportEvent { kind, .. }) = rx.recv().await {
            seen.push(kind);
        }
        assert_eq!(
            seen,
            vec![
                TransportEventKind::Progress { bytes_sent: 5, bytes_total: 11 },
                TransportEventKind::Progress { bytes_sent: 11, bytes_total: 11 },
            ]
        );
    }
}
