use crate::blockfile::BLOCK_SIZE;
use crate::error::IndexError;

/// Fixed-width key, compared lexicographically on raw bytes.
pub type Key = Vec<u8>;

/// Node header: 1-byte internal flag + 4-byte big-endian entry count.
const HEADER_SIZE: usize = 5;

/// Maximum entries per node for the given key size. Each entry serializes
/// as the key bytes plus one 8-byte integer.
pub fn branching_factor(key_size: usize) -> usize {
    (BLOCK_SIZE - HEADER_SIZE) / (key_size + 8)
}

/// Leaf entries map a key to the byte offset of its line in the data file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Leaf {
    pub entries: Vec<(Key, u64)>,
}

/// Internal entries map the smallest key of a subtree to its root's block
/// address.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Internal {
    pub entries: Vec<(Key, u64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Leaf(Leaf),
    Internal(Internal),
}

impl Default for Node {
    fn default() -> Self {
        Node::Leaf(Leaf::default())
    }
}

impl Internal {
    /// Index of the child subtree that may contain `key`: the last entry
    /// whose key is `<= key`, or the leftmost child when `key` precedes
    /// every entry.
    pub fn child_index(&self, key: &[u8]) -> usize {
        let upper = self
            .entries
            .partition_point(|(k, _)| k.as_slice() <= key);
        upper.max(1) - 1
    }
}

impl Node {
    pub fn len(&self) -> usize {
        match self {
            Node::Leaf(leaf) => leaf.entries.len(),
            Node::Internal(internal) => internal.entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, Node::Internal(_))
    }

    /// Smallest key in the node. Nodes are never persisted empty except the
    /// freshly created root leaf, which is never asked for its first key.
    pub fn first_key(&self) -> &[u8] {
        match self {
            Node::Leaf(leaf) => &leaf.entries[0].0,
            Node::Internal(internal) => &internal.entries[0].0,
        }
    }

    /// Serialize into one block: flag byte, big-endian entry count, then
    /// `len()` entries of `key_size + 8` bytes. The tail stays zeroed.
    pub fn encode(&self, key_size: usize) -> [u8; BLOCK_SIZE] {
        let mut block = [0u8; BLOCK_SIZE];
        block[0] = self.is_internal() as u8;
        block[1..HEADER_SIZE].copy_from_slice(&(self.len() as u32).to_be_bytes());

        let entries = match self {
            Node::Leaf(leaf) => &leaf.entries,
            Node::Internal(internal) => &internal.entries,
        };
        let mut at = HEADER_SIZE;
        for (key, word) in entries {
            debug_assert_eq!(key.len(), key_size);
            block[at..at + key_size].copy_from_slice(key);
            block[at + key_size..at + key_size + 8].copy_from_slice(&word.to_be_bytes());
            at += key_size + 8;
        }
        block
    }

    /// Deserialize one block, rejecting structurally invalid nodes.
    pub fn decode(
        block: &[u8; BLOCK_SIZE],
        key_size: usize,
        max_entries: usize,
    ) -> Result<Node, IndexError> {
        let internal = match block[0] {
            0 => false,
            1 => true,
            flag => {
                return Err(IndexError::CorruptIndex(format!(
                    "node flag byte is {flag}, expected 0 or 1"
                )));
            }
        };
        let count = i32::from_be_bytes(block[1..HEADER_SIZE].try_into().unwrap());
        if count < 0 || count as usize >= max_entries {
            return Err(IndexError::CorruptIndex(format!(
                "node entry count {count} outside 0..{max_entries}"
            )));
        }

        let mut entries = Vec::with_capacity(count as usize);
        let mut at = HEADER_SIZE;
        for _ in 0..count {
            let key = block[at..at + key_size].to_vec();
            let word = u64::from_be_bytes(block[at + key_size..at + key_size + 8].try_into().unwrap());
            entries.push((key, word));
            at += key_size + 8;
        }
        Ok(if internal {
            Node::Internal(Internal { entries })
        } else {
            Node::Leaf(Leaf { entries })
        })
    }
}
