use std::pin::Pin;

use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};

use crate::error::EngineError;

/// Incremental `\n` line splitter over arbitrarily chunked input.
///
/// A trailing `\r` is stripped from every line. `max_length` (0 = unlimited)
/// bounds the length of a line without its terminator.
pub struct LineFramer {
    buf: BytesMut,
    /// Bytes of `buf` already known to contain no `\n`.
    scanned: usize,
    max_length: usize,
}

impl LineFramer {
    pub fn new(max_length: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            scanned: 0,
            max_length,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Next complete line, or `Ok(None)` when more input is needed.
    pub fn next_line(&mut self) -> Result<Option<Bytes>, EngineError> {
        let pos = match self.buf[self.scanned..].iter().position(|&b| b == b'\n') {
            Some(p) => self.scanned + p,
            None => {
                self.scanned = self.buf.len();
                // One spare byte for a `\r` that may precede the next `\n`.
                if self.max_length > 0 && self.buf.len() > self.max_length + 1 {
                    return Err(self.too_long(self.buf.len()));
                }
                return Ok(None);
            }
        };

        let mut line = self.buf.split_to(pos + 1);
        self.scanned = 0;
        line.truncate(pos);
        self.emit(line).map(Some)
    }

    /// The unterminated last line, if any, once the input has ended.
    pub fn finish(&mut self) -> Result<Option<Bytes>, EngineError> {
        self.scanned = 0;
        if self.buf.is_empty() {
            return Ok(None);
        }
        let line = self.buf.split();
        self.emit(line).map(Some)
    }

    fn emit(&self, mut line: BytesMut) -> Result<Bytes, EngineError> {
        if line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
        }
        if self.max_length > 0 && line.len() > self.max_length {
            return Err(self.too_long(line.len()));
        }
        Ok(line.freeze())
    }

    fn too_long(&self, len: usize) -> EngineError {
        EngineError::Body(format!("line too long: {len} bytes (max {})", self.max_length))
    }
}

/// Lines pulled from a chunked body stream.
pub struct LineStream<S> {
    body: Pin<Box<S>>,
    framer: LineFramer,
    done: bool,
}

impl<S, E> LineStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Send,
    E: std::fmt::Display,
{
    pub fn new(body: S, max_length: usize) -> Self {
        Self {
            body: Box::pin(body),
            framer: LineFramer::new(max_length),
            done: false,
        }
    }

    /// Next line of the body, `Ok(None)` once the body is exhausted.
    pub async fn next_line(&mut self) -> Result<Option<Bytes>, EngineError> {
        loop {
            if let Some(line) = self.framer.next_line()? {
                return Ok(Some(line));
            }
            if self.done {
                return Ok(None);
            }
            match self.body.next().await {
                Some(Ok(chunk)) => self.framer.push(&chunk),
                Some(Err(e)) => return Err(EngineError::Body(e.to_string())),
                None => {
                    self.done = true;
                    return self.framer.finish();
                }
            }
        }
    }
}
