use std::io;

/// Errors surfaced by the index.
///
/// A failed lookup is not an error: `search` returns `Ok(None)` for a key
/// that is not indexed.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("bad argument: {0}")]
    BadArgument(String),

    /// The key is already indexed. Not fatal; the operation is a no-op.
    #[error("key {key:?} already indexed at offset {offset}")]
    DuplicateKey { key: String, offset: u64 },

    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    #[error("i/o error at offset {offset} ({len} bytes): {source}")]
    Io {
        offset: u64,
        len: usize,
        #[source]
        source: io::Error,
    },
}

impl IndexError {
    pub(crate) fn io(offset: u64, len: usize, source: io::Error) -> Self {
        IndexError::Io {
            offset,
            len,
            source,
        }
    }
}
