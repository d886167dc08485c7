//! Data accepted by `ManagedProcess::write`

use std::fmt;
use std::io::Cursor;
use std::pin::Pin;

use tokio::io::AsyncRead;

/// Boxed byte source forwarded to a child's stdin
pub type InputStream = Pin<Box<dyn AsyncRead + Send>>;

/// Bytes or a byte stream destined for a child's stdin
pub enum ProcessInput {
    /// Finite buffer, wrapped into a stream when forwarded
    Bytes(Vec<u8>),
    /// Streaming source, forwarded as data becomes available
    Stream(InputStream),
}

impl ProcessInput {
    /// Wrap any async reader
    pub fn stream<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        ProcessInput::Stream(Box::pin(reader))
    }

    pub(crate) fn into_stream(self) -> InputStream {
        match self {
            ProcessInput::Bytes(bytes) => Box::pin(Cursor::new(bytes)),
            ProcessInput::Stream(stream) => stream,
        }
    }
}

impl fmt::Debug for ProcessInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessInput::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            ProcessInput::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<Vec<u8>> for ProcessInput {
    fn from(bytes: Vec<u8>) -> Self {
        ProcessInput::Bytes(bytes)
    }
}

impl From<&[u8]> for ProcessInput {
    fn from(bytes: &[u8]) -> Self {
        ProcessInput::Bytes(bytes.to_vec())
    }
}

impl From<String> for ProcessInput {
    fn from(text: String) -> Self {
        ProcessInput::Bytes(text.into_bytes())
    }
}

impl From<&str> for ProcessInput {
    fn from(text: &str) -> Self {
        ProcessInput::Bytes(text.as_bytes().to_vec())
    }
}

impl From<InputStream> for ProcessInput {
    fn from(stream: InputStream) -> Self {
        ProcessInput::Stream(stream)
    }
}

/// Options for a single write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    /// Close the child's stdin once this write has been forwarded
    pub end: bool,
}

impl WriteOptions {
    /// Keep stdin open after the write
    pub fn keep_open() -> Self {
        Self { end: false }
    }
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self { end: true }
    }
}
