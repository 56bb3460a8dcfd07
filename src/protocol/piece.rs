//! Bounded view over an upload source.
//!
//! [`piece`] spawns a copy task that reads exactly `len` bytes from the
//! source into a small bounded channel. The returned [`Piece`] is the read
//! side: it is both an [`AsyncRead`] and a byte [`Stream`], so it can be
//! handed to reqwest as a streaming request body while the copy task is
//! still producing. At most [`PIPE_DEPTH`] chunks of [`PIPE_CHUNK_SIZE`]
//! bytes are buffered at any time.
//!
//! A short read or a source error is forwarded to the reader as an
//! [`io::Error`] and also returned from the copy task's [`JoinHandle`].
//! On success the task hands the source back, positioned right after the
//! piece, so consecutive pieces can be cut from one source. If the reader
//! is dropped first, the source comes back inside
//! [`PieceError::ReaderDropped`].

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::constants::{PIPE_CHUNK_SIZE, PIPE_DEPTH};

type Chunk = io::Result<Vec<u8>>;

/// Why a copy task stopped before copying the whole piece.
#[derive(Debug)]
pub enum PieceError<R> {
    /// The source failed or ended early. The reader saw the same error.
    Source(io::Error),
    /// The reader went away first.
    ReaderDropped {
        /// The source, `sent` bytes into the piece.
        source: R,
        /// Bytes handed to the reader before it was dropped.
        sent: u64,
    },
}

impl<R> PieceError<R> {
    /// Flattens the error into an [`io::Error`], dropping any source.
    #[must_use]
    pub fn into_io_error(self) -> io::Error {
        match self {
            Self::Source(error) => error,
            Self::ReaderDropped { sent, .. } => io::Error::new(
                io::ErrorKind::BrokenPipe,
                format!("piece reader dropped after {sent} bytes"),
            ),
        }
    }
}

/// Read side of a bounded piece produced by [`piece`].
#[derive(Debug)]
pub struct Piece {
    rx: mpsc::Receiver<Chunk>,
    pending: Vec<u8>,
    pos: usize,
}

/// Cuts the next `len` bytes out of `source`.
///
/// Returns the read side and the handle of the copy task. Must be called
/// from within a Tokio runtime.
pub fn piece<R>(source: R, len: u64) -> (Piece, JoinHandle<Result<R, PieceError<R>>>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(PIPE_DEPTH);
    let producer = tokio::spawn(copy_exact(source, len, tx));
    let piece = Piece {
        rx,
        pending: Vec::new(),
        pos: 0,
    };
    (piece, producer)
}

async fn copy_exact<R>(
    mut source: R,
    len: u64,
    tx: mpsc::Sender<Chunk>,
) -> Result<R, PieceError<R>>
where
    R: AsyncRead + Unpin,
{
    let mut remaining = len;
    let mut buf = vec![0u8; PIPE_CHUNK_SIZE];

    while remaining > 0 {
        let want = usize::try_from(remaining).map_or(buf.len(), |r| r.min(buf.len()));
        let read = match source.read(&mut buf[..want]).await {
            Ok(0) => {
                let copied = len - remaining;
                debug!(copied, expected = len, "upload source ended early");
                let error = io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("source ended after {copied} of {len} bytes"),
                );
                return Err(PieceError::Source(forward_error(&tx, error).await));
            }
            Ok(read) => read,
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(PieceError::Source(forward_error(&tx, error).await)),
        };

        if tx.send(Ok(buf[..read].to_vec())).await.is_err() {
            let sent = len - remaining;
            debug!(sent, expected = len, "piece reader dropped early");
            return Err(PieceError::ReaderDropped { source, sent });
        }
        remaining -= read as u64;
        trace!(read, remaining, "piece chunk forwarded");
    }

    Ok(source)
}

/// Sends a copy of `error` to the reader and returns the original.
async fn forward_error(tx: &mpsc::Sender<Chunk>, error: io::Error) -> io::Error {
    let _ = tx
        .send(Err(io::Error::new(error.kind(), error.to_string())))
        .await;
    error
}

impl Piece {
    /// Converts the piece into a streaming request body.
    #[must_use]
    pub fn into_body(self) -> reqwest::Body {
        reqwest::Body::wrap_stream(self)
    }

    fn take_pending(&mut self) -> Option<Vec<u8>> {
        if self.pos >= self.pending.len() {
            return None;
        }
        let rest = self.pending.split_off(self.pos);
        self.pending.clear();
        self.pos = 0;
        Some(rest)
    }
}

impl AsyncRead for Piece {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;
        if this.pos >= this.pending.len() {
            match this.rx.poll_recv(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    this.pending = chunk;
                    this.pos = 0;
                }
                Poll::Ready(Some(Err(error))) => return Poll::Ready(Err(error)),
                Poll::Ready(None) => return Poll::Ready(Ok(())),
                Poll::Pending => return Poll::Pending,
            }
        }

        let available = &this.pending[this.pos..];
        let n = available.len().min(buf.remaining());
        buf.put_slice(&available[..n]);
        this.pos += n;
        Poll::Ready(Ok(()))
    }
}

impl Stream for Piece {
    type Item = io::Result<Vec<u8>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if let Some(rest) = self.take_pending() {
            return Poll::Ready(Some(Ok(rest)));
        }
        self.rx.poll_recv(cx)
    }
}
