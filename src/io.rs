//! Sequential chunk writer for container files.

use crate::error::Result;
use crate::format::{ChunkRef, MetaByte};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

/// Appends chunks to a file and tracks the current offset.
#[derive(Debug)]
pub struct SeqWriter {
    writer: BufWriter<File>,
    current_offset: u64,
}

impl SeqWriter {
    /// Creates the file, truncating any existing content.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            current_offset: 0,
        })
    }

    /// Opens an existing file positioned at its end.
    pub fn append(path: &Path) -> Result<Self> {
        let mut file = OpenOptions::new().write(true).open(path)?;
        let current_offset = file.seek(SeekFrom::End(0))?;
        Ok(Self {
            writer: BufWriter::new(file),
            current_offset,
        })
    }

    /// Writes a complete buffer. Returns the offset where it starts.
    pub fn write_all(&mut self, buffer: &[u8]) -> Result<u64> {
        let start_offset = self.current_offset;
        self.writer.write_all(buffer)?;
        self.current_offset += buffer.len() as u64;
        Ok(start_offset)
    }

    /// Writes `[payload][meta]` and returns where the chunk landed.
    pub fn write_chunk(&mut self, payload: &[u8], meta: MetaByte) -> Result<ChunkRef> {
        let offset = self.write_all(payload)?;
        self.write_all(&[meta.as_u8()])?;
        Ok(ChunkRef {
            offset,
            length: payload.len() as u64 + 1,
        })
    }

    /// Flushes buffered bytes to the file.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Offset the next write lands at.
    pub fn current_offset(&self) -> u64 {
        self.current_offset
    }
}
