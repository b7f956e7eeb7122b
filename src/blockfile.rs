use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

use crate::error::IndexError;

/// Fixed block size of the index file. Block addresses are multiples of this.
pub const BLOCK_SIZE: usize = 1024;

#[cfg(unix)]
pub(crate) fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(unix)]
pub(crate) fn write_all_at(file: &File, buf: &[u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.write_all_at(buf, offset)
}

#[cfg(windows)]
pub(crate) fn read_exact_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_read(buf, offset) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "failed to fill whole buffer",
                ));
            }
            Ok(n) => {
                buf = &mut buf[n..];
                offset += n as u64;
            }
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(windows)]
pub(crate) fn write_all_at(file: &File, mut buf: &[u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_write(buf, offset) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "failed to write whole buffer",
                ));
            }
            Ok(n) => {
                buf = &buf[n..];
                offset += n as u64;
            }
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Random-access view of the index file, addressed in `BLOCK_SIZE` blocks.
///
/// The handle is owned for the lifetime of the open index and released on
/// drop.
pub struct BlockFile {
    file: File,
}

impl BlockFile {
    /// Open or truncate a fresh index file.
    pub fn create(path: &Path) -> Result<Self, IndexError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| IndexError::io(0, 0, e))?;
        Ok(BlockFile { file })
    }

    /// Open an existing index file read/write.
    pub fn open(path: &Path) -> Result<Self, IndexError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| IndexError::io(0, 0, e))?;
        Ok(BlockFile { file })
    }

    pub fn len(&self) -> Result<u64, IndexError> {
        Ok(self
            .file
            .metadata()
            .map_err(|e| IndexError::io(0, 0, e))?
            .len())
    }

    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), IndexError> {
        read_exact_at(&self.file, buf, offset).map_err(|e| IndexError::io(offset, buf.len(), e))
    }

    pub fn write_at(&self, offset: u64, buf: &[u8]) -> Result<(), IndexError> {
        write_all_at(&self.file, buf, offset).map_err(|e| IndexError::io(offset, buf.len(), e))
    }

    pub fn read_block(&self, offset: u64) -> Result<[u8; BLOCK_SIZE], IndexError> {
        debug_assert_eq!(offset % BLOCK_SIZE as u64, 0);
        let mut block = [0u8; BLOCK_SIZE];
        self.read_at(offset, &mut block)?;
        Ok(block)
    }

    pub fn write_block(&self, offset: u64, block: &[u8; BLOCK_SIZE]) -> Result<(), IndexError> {
        debug_assert_eq!(offset % BLOCK_SIZE as u64, 0);
        self.write_at(offset, block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blocks");
        let blocks = BlockFile::create(&path).unwrap();

        let mut block = [0u8; BLOCK_SIZE];
        block[0] = 1;
        block[BLOCK_SIZE - 1] = 0xff;
        blocks.write_block(2048, &block).unwrap();

        assert_eq!(blocks.read_block(2048).unwrap(), block);
        assert_eq!(blocks.len().unwrap(), 3072);
    }

    #[test]
    fn read_past_end_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blocks");
        let blocks = BlockFile::create(&path).unwrap();

        match blocks.read_block(1024) {
            Err(IndexError::Io { offset, len, .. }) => {
                assert_eq!(offset, 1024);
                assert_eq!(len, BLOCK_SIZE);
            }
            other => panic!("expected io error, got {other:?}"),
        }
    }
}
