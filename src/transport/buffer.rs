//! Read-ahead buffer over a blocking stream.
//!
//! Bytes are pulled from the stream in `chunk_size` reads and handed out as
//! lines or length-delimited payloads. `written` counts bytes appended from
//! the stream, `consumed` counts bytes handed to callers. Once a caller has
//! taken everything (`consumed == written`) the accumulator is cleared, so
//! memory stays bounded by the backlog rather than the lifetime total.

use crate::error::{Error, Result};
use crate::resp::{ParseError, ReplySource};
use bytes::{Bytes, BytesMut};
use std::io::{self, Read};

/// Default size of a single socket read.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Buffered reader with line and length-delimited primitives.
pub struct SocketBuffer<S> {
    stream: S,
    buf: BytesMut,
    consumed: usize,
    chunk_size: usize,
}

impl<S: Read> SocketBuffer<S> {
    /// Create a buffer reading `chunk_size` bytes at a time.
    ///
    /// A `chunk_size` of zero falls back to [`DEFAULT_CHUNK_SIZE`].
    pub fn new(stream: S, chunk_size: usize) -> Self {
        let chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };
        Self {
            stream,
            buf: BytesMut::with_capacity(chunk_size),
            consumed: 0,
            chunk_size,
        }
    }

    /// Bytes appended from the stream since the last reset.
    pub fn written(&self) -> usize {
        self.buf.len()
    }

    /// Bytes handed to callers since the last reset.
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Buffered but not yet consumed bytes.
    pub fn len(&self) -> usize {
        self.buf.len() - self.consumed
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    /// Drop buffered bytes and return the stream.
    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Append one chunk from the stream.
    fn fill(&mut self) -> Result<usize> {
        let start = self.buf.len();
        self.buf.resize(start + self.chunk_size, 0);

        let read = loop {
            match self.stream.read(&mut self.buf[start..]) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.buf.truncate(start);
                    return Err(Error::Io(e));
                }
            }
        };

        self.buf.truncate(start + read);
        if read == 0 {
            return Err(Error::ConnectionClosed);
        }
        Ok(read)
    }

    /// Clear the accumulator once everything has been consumed.
    fn reset_if_drained(&mut self) {
        if self.consumed == self.buf.len() {
            self.buf.clear();
            self.consumed = 0;
        }
    }

    /// Read exactly `n` bytes followed by `\r\n`; returns the `n` bytes.
    pub fn read(&mut self, n: usize) -> Result<Bytes> {
        let needed = n + 2;
        while self.len() < needed {
            self.fill()?;
        }

        let start = self.consumed;
        if &self.buf[start + n..start + needed] != b"\r\n" {
            return Err(ParseError::MissingTerminator.into());
        }

        let data = Bytes::copy_from_slice(&self.buf[start..start + n]);
        self.consumed += needed;
        self.reset_if_drained();
        Ok(data)
    }

    /// Read up to the next `\r\n`; returns the line without it.
    pub fn read_line(&mut self) -> Result<Bytes> {
        // Where to resume searching; backs up one byte so a CR at the end of
        // one read pairs with an LF at the start of the next.
        let mut searched = self.consumed;
        let end = loop {
            if let Some(pos) = memchr::memmem::find(&self.buf[searched..], b"\r\n") {
                break searched + pos;
            }
            searched = self.buf.len().saturating_sub(1).max(self.consumed);
            self.fill()?;
        };

        let data = Bytes::copy_from_slice(&self.buf[self.consumed..end]);
        self.consumed = end + 2;
        self.reset_if_drained();
        Ok(data)
    }
}

impl<S: Read> ReplySource for SocketBuffer<S> {
    fn read_line(&mut self) -> Result<Bytes> {
        SocketBuffer::read_line(self)
    }

    fn read_exact(&mut self, n: usize) -> Result<Bytes> {
        self.read(n)
    }
}
