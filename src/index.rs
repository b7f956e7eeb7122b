use std::path::Path;

use crate::datafile::DataFile;
use crate::error::IndexError;
use crate::tree::Btree;

/// An open index: the B-tree plus the data file it indexes. Both file
/// handles are owned for the lifetime of this value and released on drop.
pub struct Index {
    tree: Btree,
    data: DataFile,
}

impl Index {
    /// Build a new index by scanning an existing data file line by line.
    ///
    /// Lines whose key is already indexed are skipped and reported through
    /// `on_duplicate` with the offset already on record.
    pub fn build(
        data_path: &Path,
        index_path: &Path,
        key_size: usize,
        on_duplicate: &mut impl FnMut(&[u8], u64),
    ) -> Result<Self, IndexError> {
        let mut data = DataFile::open(data_path)?;
        let mut tree = Btree::create(index_path, data_path, key_size)?;

        data.scan_lines(&mut |offset, line| {
            if line.len() < key_size {
                return Err(IndexError::BadArgument(format!(
                    "line at offset {offset} is shorter than the key size {key_size}"
                )));
            }
            let key = &line[..key_size];
            match tree.search(key)? {
                Some(existing) => on_duplicate(key, existing),
                None => tree.insert(key, offset)?,
            }
            Ok(())
        })?;

        Ok(Index { tree, data })
    }

    /// Open an existing index and the data file recorded in its meta-block.
    pub fn open(index_path: &Path) -> Result<Self, IndexError> {
        let tree = Btree::open(index_path)?;
        let data = DataFile::open(tree.data_path())?;
        Ok(Index { tree, data })
    }

    pub fn key_size(&self) -> usize {
        self.tree.key_size()
    }

    pub fn height(&self) -> u32 {
        self.tree.height()
    }

    /// Point lookup: the data-file offset and the full line for `key`, or
    /// `None` if the key is not indexed.
    pub fn find(&mut self, key: &[u8]) -> Result<Option<(u64, String)>, IndexError> {
        match self.tree.search(key)? {
            Some(offset) => {
                let line = self.data.read_line_at(offset)?;
                Ok(Some((offset, line)))
            }
            None => Ok(None),
        }
    }

    /// Append `record` to the data file and index its key, returning the
    /// offset at which it was placed. The first `key_size` bytes of the
    /// record are the key; if that key is already indexed the record is not
    /// appended and `DuplicateKey` reports the existing offset.
    pub fn insert_record(&mut self, record: &str) -> Result<u64, IndexError> {
        let key_size = self.tree.key_size();
        let bytes = record.as_bytes();
        if bytes.len() < key_size {
            return Err(IndexError::BadArgument(format!(
                "record is {} bytes, shorter than the key size {key_size}",
                bytes.len()
            )));
        }
        let key = &bytes[..key_size];
        if let Some(existing) = self.tree.search(key)? {
            return Err(IndexError::DuplicateKey {
                key: String::from_utf8_lossy(key).into_owned(),
                offset: existing,
            });
        }
        let offset = self.data.append(record)?;
        self.tree.insert(key, offset)?;
        Ok(offset)
    }

    /// Print-ready range scan: hand the callback up to `limit` data-file
    /// lines whose keys are `>= probe`, in ascending key order.
    pub fn list(
        &mut self,
        probe: &[u8],
        limit: usize,
        emit: &mut impl FnMut(&str),
    ) -> Result<(), IndexError> {
        let Self { tree, data } = self;
        tree.scan_from(probe, limit, &mut |_key, offset| {
            let line = data.read_line_at(offset)?;
            emit(&line);
            Ok(())
        })
    }
}
