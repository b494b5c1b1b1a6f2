use crate::error::SheetNestError;
use std::fs::File;
use std::io::BufReader;
use std::io::Cursor;
use std::io::Read;
use std::io::Seek;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UnifiedReaderError {
    #[error("No data in workbook buffer '{0}'")]
    EmptyBufferError(String),
}

/// A unified reader over a workbook stored on disk or already held in memory
pub(crate) enum UnifiedReader {
    /// Local file reader
    Local(BufReader<File>),
    /// In-memory buffer (uploaded bytes, tests)
    Memory(Cursor<Vec<u8>>),
}

impl UnifiedReader {
    /// Opens a local workbook file
    pub(crate) fn open(path: &Path) -> Result<UnifiedReader, SheetNestError> {
        let file = File::open(path)?;
        Ok(UnifiedReader::Local(BufReader::new(file)))
    }

    /// Wraps workbook bytes that were loaded elsewhere
    pub(crate) fn from_bytes(name: &str, bytes: Vec<u8>) -> Result<UnifiedReader, SheetNestError> {
        if bytes.is_empty() {
            Err(UnifiedReaderError::EmptyBufferError(name.to_owned()))?;
        }
        Ok(UnifiedReader::Memory(Cursor::new(bytes)))
    }
}

impl Read for UnifiedReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            UnifiedReader::Local(reader) => reader.read(buf),
            UnifiedReader::Memory(reader) => reader.read(buf),
        }
    }
}

impl Seek for UnifiedReader {
    fn seek(&mut self, pos: std::io::SeekFrom) -> std::io::Result<u64> {
        match self {
            UnifiedReader::Local(reader) => reader.seek(pos),
            UnifiedReader::Memory(reader) => reader.seek(pos),
        }
    }
}
