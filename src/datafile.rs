use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;

use crate::blockfile::write_all_at;
use crate::error::IndexError;

/// The indexed data file: line-oriented text where the first `keySize`
/// bytes of every line are the key. The index only ever appends lines and
/// reads a line back by its start offset.
pub struct DataFile {
    file: File,
}

impl DataFile {
    pub fn open(path: &Path) -> Result<Self, IndexError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| IndexError::io(0, 0, e))?;
        Ok(DataFile { file })
    }

    pub fn len(&self) -> Result<u64, IndexError> {
        Ok(self
            .file
            .metadata()
            .map_err(|e| IndexError::io(0, 0, e))?
            .len())
    }

    /// Append a record, newline-terminating it if needed, and return the
    /// byte offset at which it was placed.
    pub fn append(&mut self, record: &str) -> Result<u64, IndexError> {
        let offset = self.len()?;
        let bytes = record.as_bytes();
        write_all_at(&self.file, bytes, offset)
            .map_err(|e| IndexError::io(offset, bytes.len(), e))?;
        if !record.ends_with('\n') {
            write_all_at(&self.file, b"\n", offset + bytes.len() as u64)
                .map_err(|e| IndexError::io(offset + bytes.len() as u64, 1, e))?;
        }
        Ok(offset)
    }

    /// Read the line starting at `offset`, without its newline. Bytes that
    /// are not valid UTF-8 are replaced; keys are never extracted from the
    /// returned string.
    pub fn read_line_at(&mut self, offset: u64) -> Result<String, IndexError> {
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|e| IndexError::io(offset, 0, e))?;
        let mut reader = BufReader::new(&mut self.file);
        let mut line = Vec::new();
        reader
            .read_until(b'\n', &mut line)
            .map_err(|e| IndexError::io(offset, 0, e))?;
        if line.last() == Some(&b'\n') {
            line.pop();
        }
        Ok(String::from_utf8_lossy(&line).into_owned())
    }

    /// Walk every line from the start of the file, handing the callback the
    /// line's start offset and its raw bytes (newline stripped).
    pub fn scan_lines(
        &mut self,
        f: &mut impl FnMut(u64, &[u8]) -> Result<(), IndexError>,
    ) -> Result<(), IndexError> {
        self.file
            .seek(SeekFrom::Start(0))
            .map_err(|e| IndexError::io(0, 0, e))?;
        let mut reader = BufReader::new(&mut self.file);
        let mut offset = 0u64;
        let mut line = Vec::new();
        loop {
            line.clear();
            let read = reader
                .read_until(b'\n', &mut line)
                .map_err(|e| IndexError::io(offset, 0, e))?;
            if read == 0 {
                return Ok(());
            }
            if line.last() == Some(&b'\n') {
                line.pop();
            }
            f(offset, &line)?;
            offset += read as u64;
        }
    }
}
