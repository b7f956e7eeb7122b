use std::path::{Path, PathBuf};

use crate::blockfile::BLOCK_SIZE;
use crate::error::IndexError;
use crate::node::branching_factor;

/// Byte offset of the tree height field inside the meta-block. Rewritten in
/// place on every root promotion.
pub const HEIGHT_OFFSET: u64 = 260;

const PATH_LEN: usize = 256;
const KEY_SIZE_OFFSET: usize = 256;

/// Contents of block 0: the data-file path (bytes 0..256, NUL padded), the
/// key size (int32 at 256) and the tree height (int32 at 260).
#[derive(Debug, Clone, PartialEq)]
pub struct Meta {
    pub data_path: PathBuf,
    pub key_size: usize,
    pub height: u32,
}

impl Meta {
    pub fn new(data_path: &Path, key_size: usize) -> Result<Self, IndexError> {
        if key_size == 0 {
            return Err(IndexError::BadArgument("key size must be positive".into()));
        }
        if branching_factor(key_size) < 4 {
            return Err(IndexError::BadArgument(format!(
                "key size {key_size} leaves a branching factor below 4"
            )));
        }
        let path_bytes = data_path
            .to_str()
            .ok_or_else(|| IndexError::BadArgument("data file path is not valid UTF-8".into()))?;
        if path_bytes.is_empty() || path_bytes.len() > PATH_LEN {
            return Err(IndexError::BadArgument(format!(
                "data file path must be 1..={PATH_LEN} bytes"
            )));
        }
        Ok(Meta {
            data_path: data_path.to_path_buf(),
            key_size,
            height: 0,
        })
    }

    pub fn encode(&self) -> [u8; BLOCK_SIZE] {
        let mut block = [0u8; BLOCK_SIZE];
        let path = self.data_path.to_str().unwrap_or_default().as_bytes();
        block[..path.len()].copy_from_slice(path);
        block[KEY_SIZE_OFFSET..KEY_SIZE_OFFSET + 4]
            .copy_from_slice(&(self.key_size as i32).to_be_bytes());
        block[HEIGHT_OFFSET as usize..HEIGHT_OFFSET as usize + 4]
            .copy_from_slice(&(self.height as i32).to_be_bytes());
        block
    }

    pub fn decode(block: &[u8; BLOCK_SIZE]) -> Result<Self, IndexError> {
        // The path field is NUL padded; trailing bytes at or below 0x20 are
        // not part of the stored path.
        let mut path = &block[..PATH_LEN];
        while let [rest @ .., last] = path {
            if *last > b' ' {
                break;
            }
            path = rest;
        }
        if path.is_empty() {
            return Err(IndexError::CorruptIndex("empty data file path".into()));
        }
        let path = std::str::from_utf8(path)
            .map_err(|_| IndexError::CorruptIndex("data file path is not valid UTF-8".into()))?;

        let key_size =
            i32::from_be_bytes(block[KEY_SIZE_OFFSET..KEY_SIZE_OFFSET + 4].try_into().unwrap());
        if key_size <= 0 {
            return Err(IndexError::CorruptIndex(format!(
                "stored key size {key_size} is not positive"
            )));
        }
        if branching_factor(key_size as usize) < 4 {
            return Err(IndexError::CorruptIndex(format!(
                "stored key size {key_size} leaves a branching factor below 4"
            )));
        }

        let height = i32::from_be_bytes(
            block[HEIGHT_OFFSET as usize..HEIGHT_OFFSET as usize + 4]
                .try_into()
                .unwrap(),
        );
        if height < 0 {
            return Err(IndexError::CorruptIndex(format!(
                "stored height {height} is negative"
            )));
        }

        Ok(Meta {
            data_path: PathBuf::from(path),
            key_size: key_size as usize,
            height: height as u32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_round_trip() {
        let meta = Meta::new(Path::new("data/lines.txt"), 8).unwrap();
        let decoded = Meta::decode(&meta.encode()).unwrap();
        assert_eq!(decoded, meta);
    }

    #[test]
    fn height_field_sits_at_fixed_offset() {
        let mut meta = Meta::new(Path::new("lines.txt"), 4).unwrap();
        meta.height = 2;
        let block = meta.encode();
        assert_eq!(&block[260..264], &2i32.to_be_bytes());
    }

    #[test]
    fn trailing_padding_is_trimmed() {
        let meta = Meta::new(Path::new("lines.txt"), 4).unwrap();
        let mut block = meta.encode();
        // Whitespace padding after the path must not survive a decode.
        block[9] = b' ';
        block[10] = b'\t';
        let decoded = Meta::decode(&block).unwrap();
        assert_eq!(decoded.data_path, PathBuf::from("lines.txt"));
    }

    #[test]
    fn rejects_tiny_branching_factor() {
        assert!(matches!(
            Meta::new(Path::new("lines.txt"), 300),
            Err(IndexError::BadArgument(_))
        ));
        assert!(Meta::new(Path::new("lines.txt"), 246).is_ok());
    }

    #[test]
    fn rejects_oversized_path() {
        let long = "x".repeat(257);
        assert!(matches!(
            Meta::new(Path::new(&long), 4),
            Err(IndexError::BadArgument(_))
        ));
    }
}
