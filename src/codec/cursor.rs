use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Error, Result};

/// Largest single read request accepted by default (1 GiB).
pub const DEFAULT_MAX_READ: usize = 1 << 30;

/// Upper bound on how much buffer is reserved per fill, so a corrupt length field cannot
/// make us allocate its full size before the stream runs dry.
const FILL_CHUNK: usize = 64 * 1024;

/// Incremental reader over an async byte stream.
///
/// `read` waits until the stream has produced enough bytes, or fails once the stream
/// reports end-of-input. Bytes are handed out in arrival order and the cursor never
/// looks past what a request needs, except for whatever the stream delivers in one go.
pub struct ByteCursor<R> {
    stream: R,
    buf: BytesMut,
    position: u64,
    eof: bool,
    max_read: usize,
}

impl<R: AsyncRead + Unpin> ByteCursor<R> {
    pub fn new(stream: R) -> Self {
        Self::with_limit(stream, DEFAULT_MAX_READ)
    }

    pub fn with_limit(stream: R, max_read: usize) -> Self {
        Self {
            stream,
            buf: BytesMut::new(),
            position: 0,
            eof: false,
            max_read,
        }
    }

    /// Absolute offset of the next unread byte.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Bytes already pulled from the stream but not yet consumed.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn into_inner(self) -> R {
        self.stream
    }

    async fn fill(&mut self, n: usize) -> Result<()> {
        if n > self.max_read {
            return Err(Error::ReadTooLarge {
                requested: n,
                limit: self.max_read,
            });
        }

        while self.buf.len() < n {
            if self.eof {
                return Err(Error::UnexpectedEof {
                    requested: n,
                    available: self.buf.len(),
                });
            }
            self.buf.reserve((n - self.buf.len()).min(FILL_CHUNK));
            if self.stream.read_buf(&mut self.buf).await? == 0 {
                self.eof = true;
            }
        }
        Ok(())
    }

    /// Read exactly `n` bytes.
    pub async fn read(&mut self, n: usize) -> Result<Bytes> {
        self.fill(n).await?;
        let out = self.buf.split_to(n).freeze();
        self.position += n as u64;
        Ok(out)
    }

    /// Return the next `n` bytes without consuming them.
    pub async fn peek(&mut self, n: usize) -> Result<Bytes> {
        self.fill(n).await?;
        Ok(Bytes::copy_from_slice(&self.buf[..n]))
    }

    /// Consume everything left in the stream.
    pub async fn drain(&mut self) -> Result<Bytes> {
        while !self.eof {
            self.buf.reserve(FILL_CHUNK);
            if self.stream.read_buf(&mut self.buf).await? == 0 {
                self.eof = true;
            }
        }
        let out = self.buf.split().freeze();
        self.position += out.len() as u64;
        Ok(out)
    }
}
