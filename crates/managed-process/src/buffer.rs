//! Chunked output accumulator for a single stream

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

/// Ordered, append-only sequence of byte chunks captured from one output stream.
///
/// Cloning an `OutputBuffer` yields another handle to the same storage, so a
/// clone held by a caller observes later appends and clears.
#[derive(Clone, Default)]
pub struct OutputBuffer {
    chunks: Arc<RwLock<Vec<Vec<u8>>>>,
}

impl OutputBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one chunk at the tail
    pub fn append(&self, chunk: impl Into<Vec<u8>>) {
        self.chunks.write().push(chunk.into());
    }

    /// Append unless `detach` has been cancelled.
    ///
    /// The check happens under the write lock, so once `detach` is cancelled
    /// a following `clear` can never be overtaken by this append.
    pub(crate) fn append_attached(&self, chunk: &[u8], detach: &CancellationToken) -> bool {
        let mut chunks = self.chunks.write();
        if detach.is_cancelled() {
            return false;
        }
        chunks.push(chunk.to_vec());
        true
    }

    /// Concatenation of all chunks in arrival order.
    ///
    /// This is a snapshot; later appends are not reflected.
    pub fn to_bytes(&self) -> Vec<u8> {
        let chunks = self.chunks.read();
        let mut bytes = Vec::with_capacity(chunks.iter().map(Vec::len).sum());
        for chunk in chunks.iter() {
            bytes.extend_from_slice(chunk);
        }
        bytes
    }

    /// Concatenated bytes decoded as UTF-8, with invalid sequences replaced
    pub fn to_text(&self) -> String {
        String::from_utf8_lossy(&self.to_bytes()).into_owned()
    }

    /// True when no chunk has been appended since creation or the last clear
    pub fn is_empty(&self) -> bool {
        self.chunks.read().is_empty()
    }

    /// Number of chunks held
    pub fn len(&self) -> usize {
        self.chunks.read().len()
    }

    /// Total number of bytes across all chunks
    pub fn byte_len(&self) -> usize {
        self.chunks.read().iter().map(Vec::len).sum()
    }

    /// Copy of the individual chunks, in arrival order
    pub fn chunks(&self) -> Vec<Vec<u8>> {
        self.chunks.read().clone()
    }

    /// Remove all chunks in place
    pub fn clear(&self) {
        self.chunks.write().clear();
    }
}

impl fmt::Display for OutputBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl fmt::Debug for OutputBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputBuffer")
            .field("chunks", &self.len())
            .field("bytes", &self.byte_len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_new_buffer_is_empty() {
        let buffer = OutputBuffer::new();
        assert!(buffer.is_empty());
        assert_eq!(buffer.len(), 0);
        assert!(buffer.to_bytes().is_empty());
        assert_eq!(buffer.to_text(), "");
    }

    #[test]
    fn test_append_preserves_order() {
        let buffer = OutputBuffer::new();
        buffer.append(b"hel".to_vec());
        buffer.append("lo");
        buffer.append(Vec::new());
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.byte_len(), 5);
        assert_eq!(buffer.to_bytes(), b"hello");
        assert_eq!(buffer.to_string(), "hello");
    }

    #[test]
    fn test_empty_chunk_makes_buffer_non_empty() {
        let buffer = OutputBuffer::new();
        buffer.append(Vec::new());
        assert!(!buffer.is_empty());
    }

    #[test]
    fn test_clear_is_visible_through_clones() {
        let buffer = OutputBuffer::new();
        let observer = buffer.clone();
        buffer.append("data");
        assert_eq!(observer.to_text(), "data");

        buffer.clear();
        assert!(observer.is_empty());

        observer.append("more");
        assert_eq!(buffer.to_text(), "more");
    }

    #[test]
    fn test_append_attached_stops_after_detach() {
        let buffer = OutputBuffer::new();
        let detach = CancellationToken::new();

        assert!(buffer.append_attached(b"live", &detach));
        detach.cancel();
        buffer.clear();
        assert!(!buffer.append_attached(b"stale", &detach));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_to_text_replaces_invalid_utf8() {
        let buffer = OutputBuffer::new();
        buffer.append(vec![0x66, 0x6f, 0xff, 0x6f]);
        assert_eq!(buffer.to_text(), "fo\u{fffd}o");
    }

    #[test]
    fn test_snapshot_does_not_track_later_appends() {
        let buffer = OutputBuffer::new();
        buffer.append("a");
        let snapshot = buffer.to_bytes();
        buffer.append("b");
        assert_eq!(snapshot, b"a");
        assert_eq!(buffer.to_bytes(), b"ab");
    }

    proptest! {
        #[test]
        fn prop_to_bytes_is_concatenation(chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 0..32)) {
            let buffer = OutputBuffer::new();
            for chunk in &chunks {
                buffer.append(chunk.clone());
            }
            prop_assert_eq!(buffer.to_bytes(), chunks.concat());
            prop_assert_eq!(buffer.chunks(), chunks.clone());
            prop_assert_eq!(buffer.len(), chunks.len());
        }

        #[test]
        fn prop_clear_always_empties(chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..16), 0..16)) {
            let buffer = OutputBuffer::new();
            for chunk in chunks {
                buffer.append(chunk);
            }
            buffer.clear();
            prop_assert!(buffer.is_empty());
            prop_assert!(buffer.to_bytes().is_empty());
        }
    }
}
