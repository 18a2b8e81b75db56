//! The single ordered output channel of a chat turn.

use std::pin::Pin;
use std::task::{Context, Poll, ready};

use agent_studio_protocol::marker;
use bytes::Bytes;
use futures_util::Stream;
use tokio::sync::mpsc;

type Item = Result<Bytes, StreamError>;

/// The error returned when writing to a sink that no longer accepts data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    /// The sink was closed or failed, or the reader went away.
    #[error("output stream is closed")]
    Closed,
}

/// The error that terminates an [`OutputStream`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct StreamError {
    message: String,
}

impl StreamError {
    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Creates a bounded output channel.
///
/// Writes wait while `capacity` chunks are buffered and not yet read.
pub fn channel(capacity: usize) -> (OutputSink, OutputStream) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        OutputSink { tx: Some(tx) },
        OutputStream {
            rx,
            deferred_error: None,
        },
    )
}

/// The writing half of the output channel.
///
/// Once the sink is closed or failed, every write is rejected.
#[derive(Debug)]
pub struct OutputSink {
    tx: Option<mpsc::Sender<Item>>,
}

impl OutputSink {
    /// Writes a piece of text.
    ///
    /// Writes are delivered in call order. An empty text is still sent as
    /// an empty chunk.
    pub async fn write(&mut self, text: &str) -> Result<(), SinkError> {
        let tx = self.tx.as_ref().ok_or(SinkError::Closed)?;
        let chunk = Bytes::copy_from_slice(text.as_bytes());
        if tx.send(Ok(chunk)).await.is_err() {
            debug!("output reader is gone");
            self.tx = None;
            return Err(SinkError::Closed);
        }
        Ok(())
    }

    /// Ends the stream successfully.
    #[inline]
    pub fn close(&mut self) {
        self.tx = None;
    }

    /// Ends the stream with an error.
    ///
    /// An `[error]` marker is written first, on a best-effort basis, then
    /// the stream is terminated with an error item. The reader yields
    /// `Pending` once before that item, so a body writer gets to flush the
    /// marker before the error aborts the connection.
    pub async fn fail(&mut self, message: &str) {
        if self.write(&marker::error(message)).await.is_err() {
            return;
        }
        if let Some(tx) = self.tx.take() {
            let err = StreamError {
                message: message.to_owned(),
            };
            tx.send(Err(err)).await.ok();
        }
    }

    /// Returns `true` if writes are rejected.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.tx.as_ref().is_none_or(|tx| tx.is_closed())
    }
}

/// The reading half of the output channel, usable as an HTTP body.
#[derive(Debug)]
pub struct OutputStream {
    rx: mpsc::Receiver<Item>,
    deferred_error: Option<StreamError>,
}

impl Stream for OutputStream {
    type Item = Item;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        if let Some(err) = self.deferred_error.take() {
            return Poll::Ready(Some(Err(err)));
        }
        match ready!(self.rx.poll_recv(cx)) {
            Some(Err(err)) => {
                self.deferred_error = Some(err);
                cx.waker().wake_by_ref();
                Poll::Pending
            }
            item => Poll::Ready(item),
        }
    }
}
