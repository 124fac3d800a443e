#![forbid(unsafe_code)]

//! Stream identity, flush policy, and the ordered chunk buffer.

use std::fmt;
use std::time::Duration;

/// One of the two process output streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StreamId {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

impl StreamId {
    /// Both streams, error stream first (the order `flush_all` uses).
    pub const ALL: [StreamId; 2] = [StreamId::Stderr, StreamId::Stdout];

    /// Short lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When buffered text for a stream reaches the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushPolicy {
    /// Flush synchronously on every write.
    Immediate,
    /// Coalesce writes for at most this long.
    Windowed(Duration),
}

impl FlushPolicy {
    /// Default policy for a stream: error output is never delayed because it
    /// often precedes process exit.
    #[must_use]
    pub const fn default_for(stream: StreamId, window: Duration) -> Self {
        match stream {
            StreamId::Stderr => Self::Immediate,
            StreamId::Stdout => Self::Windowed(window),
        }
    }
}

/// Append-ordered buffer of pending text chunks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkBuffer {
    chunks: Vec<String>,
    bytes: usize,
}

impl ChunkBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk. Empty chunks are kept so chunk counts match call
    /// counts, but they contribute no bytes.
    pub fn push(&mut self, chunk: impl Into<String>) {
        let chunk = chunk.into();
        self.bytes += chunk.len();
        self.chunks.push(chunk);
    }

    /// Number of pending chunks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// True when no chunk is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Total pending bytes.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.bytes
    }

    /// Drain every chunk and return them concatenated in call order.
    ///
    /// Read and clear happen as one step: the buffer is empty afterwards even
    /// if the caller later fails to deliver the text.
    pub fn take_joined(&mut self) -> String {
        let chunks = std::mem::take(&mut self.chunks);
        self.bytes = 0;
        match chunks.len() {
            0 => String::new(),
            1 => chunks.into_iter().next().unwrap_or_default(),
            _ => chunks.concat(),
        }
    }

    /// Peek at the concatenated text without draining.
    #[must_use]
    pub fn joined(&self) -> String {
        self.chunks.concat()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_names() {
        assert_eq!(StreamId::Stdout.to_string(), "stdout");
        assert_eq!(StreamId::Stderr.as_str(), "stderr");
        assert_eq!(StreamId::ALL[0], StreamId::Stderr);
    }

    #[test]
    fn default_policies() {
        let window = Duration::from_millis(100);
        assert_eq!(
            FlushPolicy::default_for(StreamId::Stderr, window),
            FlushPolicy::Immediate
        );
        assert_eq!(
            FlushPolicy::default_for(StreamId::Stdout, window),
            FlushPolicy::Windowed(window)
        );
    }

    #[test]
    fn take_joined_preserves_call_order_and_clears() {
        let mut buffer = ChunkBuffer::new();
        buffer.push("a");
        buffer.push(String::from("bc"));
        buffer.push("");
        buffer.push("d\n");

        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.byte_len(), 5);
        assert_eq!(buffer.joined(), "abcd\n");
        assert_eq!(buffer.take_joined(), "abcd\n");
        assert!(buffer.is_empty());
        assert_eq!(buffer.byte_len(), 0);
        assert_eq!(buffer.take_joined(), "");
    }

    #[test]
    fn single_chunk_is_moved_not_copied() {
        let mut buffer = ChunkBuffer::new();
        buffer.push("only");
        assert_eq!(buffer.take_joined(), "only");
    }
}
