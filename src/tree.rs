use std::path::{Path, PathBuf};

use crate::blockfile::{BLOCK_SIZE, BlockFile};
use crate::error::IndexError;
use crate::meta::{self, Meta};
use crate::node::{Internal, Key, Leaf, Node, branching_factor};

/// Block offset of the meta-block.
const META_ADDR: u64 = 0;
/// The root always lives at block 1. A promotion rewrites this block and
/// moves the old root content to a freshly allocated one.
const ROOT_ADDR: u64 = 1024;

/// A freshly split-off right sibling, to be linked into the parent.
struct Sibling {
    first_key: Key,
    addr: u64,
}

/// Disk-resident B-tree mapping fixed-width keys to data-file offsets.
///
/// The root is kept materialized in memory; every other node is paged in
/// and out of the block file on demand.
pub struct Btree {
    blocks: BlockFile,
    root: Node,
    height: u32,
    key_size: usize,
    max_entries: usize,
    node_count: u64,
    data_path: PathBuf,
}

impl Btree {
    /// Create a fresh, empty index file: meta-block at block 0 and an empty
    /// leaf root persisted at block 1.
    pub fn create(
        index_path: &Path,
        data_path: &Path,
        key_size: usize,
    ) -> Result<Self, IndexError> {
        let meta = Meta::new(data_path, key_size)?;
        let blocks = BlockFile::create(index_path)?;
        blocks.write_block(META_ADDR, &meta.encode())?;

        let root = Node::default();
        blocks.write_block(ROOT_ADDR, &root.encode(key_size))?;
        tracing::debug!(
            "created index {} over {} (key size {key_size})",
            index_path.display(),
            data_path.display()
        );

        Ok(Btree {
            blocks,
            root,
            height: 0,
            key_size,
            max_entries: branching_factor(key_size),
            node_count: 1,
            data_path: meta.data_path,
        })
    }

    /// Open an existing index file, reading the meta-block and decoding the
    /// root from block 1.
    pub fn open(index_path: &Path) -> Result<Self, IndexError> {
        let blocks = BlockFile::open(index_path)?;
        let len = blocks.len()?;
        if len % BLOCK_SIZE as u64 != 0 {
            return Err(IndexError::CorruptIndex(format!(
                "file length {len} is not a multiple of {BLOCK_SIZE}"
            )));
        }
        if len < 2 * BLOCK_SIZE as u64 {
            return Err(IndexError::CorruptIndex(
                "file is too short to hold a meta-block and a root".into(),
            ));
        }

        let meta = Meta::decode(&blocks.read_block(META_ADDR)?)?;
        let max_entries = branching_factor(meta.key_size);
        let node_count = len.div_ceil(BLOCK_SIZE as u64) - 1;
        let root = Node::decode(&blocks.read_block(ROOT_ADDR)?, meta.key_size, max_entries)?;
        tracing::debug!(
            "opened index {}: height {}, {} nodes",
            index_path.display(),
            meta.height,
            node_count
        );

        Ok(Btree {
            blocks,
            root,
            height: meta.height,
            key_size: meta.key_size,
            max_entries,
            node_count,
            data_path: meta.data_path,
        })
    }

    pub fn key_size(&self) -> usize {
        self.key_size
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn node_count(&self) -> u64 {
        self.node_count
    }

    /// Path of the data file this index was built over, as stored in the
    /// meta-block.
    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    fn check_key(&self, key: &[u8]) -> Result<(), IndexError> {
        if key.is_empty() {
            return Err(IndexError::BadArgument("key is empty".into()));
        }
        if key.len() != self.key_size {
            return Err(IndexError::BadArgument(format!(
                "key is {} bytes, index uses {}-byte keys",
                key.len(),
                self.key_size
            )));
        }
        Ok(())
    }

    fn read_node(&self, addr: u64) -> Result<Node, IndexError> {
        Node::decode(
            &self.blocks.read_block(addr)?,
            self.key_size,
            self.max_entries,
        )
    }

    fn write_node(&self, addr: u64, node: &Node) -> Result<(), IndexError> {
        self.blocks.write_block(addr, &node.encode(self.key_size))
    }

    /// Reserve the next block for a new node. Blocks 0 (meta) and 1 (root)
    /// are accounted for at creation time.
    fn allocate_block(&mut self) -> u64 {
        self.node_count += 1;
        self.node_count * BLOCK_SIZE as u64
    }

    // ────────────────────────────────────────────────────────────────────
    //  Search
    // ────────────────────────────────────────────────────────────────────

    /// Look up `key`, returning the data-file offset it maps to, or `None`
    /// if the key is not indexed.
    pub fn search(&self, key: &[u8]) -> Result<Option<u64>, IndexError> {
        self.check_key(key)?;
        self.search_at(&self.root, key)
    }

    fn search_at(&self, node: &Node, key: &[u8]) -> Result<Option<u64>, IndexError> {
        match node {
            Node::Leaf(leaf) => Ok(leaf
                .entries
                .binary_search_by(|(k, _)| k.as_slice().cmp(key))
                .ok()
                .map(|at| leaf.entries[at].1)),
            Node::Internal(internal) => {
                let child = self.read_node(internal.entries[internal.child_index(key)].1)?;
                self.search_at(&child, key)
            }
        }
    }

    // ────────────────────────────────────────────────────────────────────
    //  Insert
    // ────────────────────────────────────────────────────────────────────

    /// Insert `(key, offset)`. Fails with `DuplicateKey` if the key is
    /// already present, leaving the tree untouched.
    pub fn insert(&mut self, key: &[u8], offset: u64) -> Result<(), IndexError> {
        self.check_key(key)?;
        let mut root = std::mem::take(&mut self.root);
        let split = match self.insert_at(&mut root, ROOT_ADDR, key, offset) {
            Ok(split) => split,
            Err(e) => {
                self.root = root;
                return Err(e);
            }
        };
        self.root = root;

        if let Some(sibling) = split {
            // The old root content must live somewhere other than block 1
            // now; the new two-entry root takes its place.
            let moved = self.allocate_block();
            self.write_node(moved, &self.root)?;
            let new_root = Node::Internal(Internal {
                entries: vec![
                    (self.root.first_key().to_vec(), moved),
                    (sibling.first_key, sibling.addr),
                ],
            });
            self.write_node(ROOT_ADDR, &new_root)?;
            self.root = new_root;
            self.height += 1;
            self.blocks
                .write_at(meta::HEIGHT_OFFSET, &(self.height as i32).to_be_bytes())?;
            tracing::debug!("root split, height is now {}", self.height);
        }
        Ok(())
    }

    /// Top-down recursive insert. Returns `None` when the subtree absorbed
    /// the entry, or the new right sibling to link at the parent.
    fn insert_at(
        &mut self,
        node: &mut Node,
        addr: u64,
        key: &[u8],
        offset: u64,
    ) -> Result<Option<Sibling>, IndexError> {
        match node {
            Node::Leaf(leaf) => {
                let at = match leaf
                    .entries
                    .binary_search_by(|(k, _)| k.as_slice().cmp(key))
                {
                    Ok(at) => {
                        return Err(IndexError::DuplicateKey {
                            key: String::from_utf8_lossy(key).into_owned(),
                            offset: leaf.entries[at].1,
                        });
                    }
                    Err(at) => at,
                };
                leaf.entries.insert(at, (key.to_vec(), offset));
            }
            Node::Internal(internal) => {
                let at = internal.child_index(key);
                let child_addr = internal.entries[at].1;
                let mut child = self.read_node(child_addr)?;
                let Some(sibling) = self.insert_at(&mut child, child_addr, key, offset)? else {
                    // Absorbed below; this node is unchanged.
                    return Ok(None);
                };
                internal
                    .entries
                    .insert(at + 1, (sibling.first_key, sibling.addr));
            }
        }

        if node.len() < self.max_entries {
            self.write_node(addr, node)?;
            return Ok(None);
        }
        self.split(node, addr).map(Some)
    }

    /// Halve an overfull node: the upper entries move to a new sibling
    /// block, both halves are persisted.
    fn split(&mut self, node: &mut Node, addr: u64) -> Result<Sibling, IndexError> {
        let half = self.max_entries / 2;
        let sibling = match node {
            Node::Leaf(leaf) => Node::Leaf(Leaf {
                entries: leaf.entries.split_off(half),
            }),
            Node::Internal(internal) => Node::Internal(Internal {
                entries: internal.entries.split_off(half),
            }),
        };
        let sibling_addr = self.allocate_block();
        self.write_node(addr, node)?;
        self.write_node(sibling_addr, &sibling)?;
        tracing::debug!("split node at {addr}, sibling at {sibling_addr}");
        Ok(Sibling {
            first_key: sibling.first_key().to_vec(),
            addr: sibling_addr,
        })
    }

    // ────────────────────────────────────────────────────────────────────
    //  Ordered scan
    // ────────────────────────────────────────────────────────────────────

    /// Visit the up-to-`limit` entries whose keys are `>= probe`, in
    /// ascending key order, handing each key and data-file offset to the
    /// callback.
    pub fn scan_from(
        &self,
        probe: &[u8],
        limit: usize,
        emit: &mut impl FnMut(&[u8], u64) -> Result<(), IndexError>,
    ) -> Result<(), IndexError> {
        self.check_key(probe)?;
        self.scan_at(&self.root, probe, limit, emit)?;
        Ok(())
    }

    /// Returns the remaining budget after visiting this subtree.
    fn scan_at(
        &self,
        node: &Node,
        probe: &[u8],
        mut remaining: usize,
        emit: &mut impl FnMut(&[u8], u64) -> Result<(), IndexError>,
    ) -> Result<usize, IndexError> {
        if remaining == 0 {
            return Ok(0);
        }
        match node {
            Node::Leaf(leaf) => {
                let start = leaf.entries.partition_point(|(k, _)| k.as_slice() < probe);
                for (key, offset) in &leaf.entries[start..] {
                    if remaining == 0 {
                        break;
                    }
                    emit(key, *offset)?;
                    remaining -= 1;
                }
            }
            Node::Internal(internal) => {
                let first = internal.child_index(probe);
                for (_, child_addr) in &internal.entries[first..] {
                    if remaining == 0 {
                        break;
                    }
                    let child = self.read_node(*child_addr)?;
                    remaining = self.scan_at(&child, probe, remaining, emit)?;
                }
            }
        }
        Ok(remaining)
    }
}
