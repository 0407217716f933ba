//! The unified `.edb` file format: one self-contained file holding the
//! data, tag dictionary, entity index, and embedded WAL sections.
//!
//! `UnifiedFile` is the single owner of the open file handle and header;
//! `Writer`, `Reader`, and `entitydb-durability`'s WAL reader/writer all
//! operate through it rather than opening the path themselves.

pub mod data_record;
pub mod dictionary_section;
pub mod entity_index;
pub mod header;

pub use data_record::DataRecord;
pub use entity_index::EntityIndexEntry;
pub use header::{FileHeader, FORMAT_VERSION, HEADER_LEN, MAGIC};

use entitydb_core::Result;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// The open unified file plus its parsed header.
pub struct UnifiedFile {
    path: PathBuf,
    file: File,
    header: FileHeader,
}

impl UnifiedFile {
    /// Opens an existing unified file, validating its header.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new().read(true).write(true).open(&path)?;
        let header = FileHeader::read_from(&mut file)?;
        Ok(UnifiedFile { path, file, header })
    }

    /// Creates a fresh unified file with an empty header and no sections.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        let header = FileHeader::empty();
        header.write_to(&mut file)?;
        file.sync_all()?;
        Ok(UnifiedFile { path, file, header })
    }

    /// Opens an existing file if present, otherwise creates a fresh one.
    pub fn open_or_create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Re-reads the header from disk, picking up changes made through a
    /// different `UnifiedFile` handle on the same path (the storage
    /// writer and the WAL writer each hold their own handle on the one
    /// physical file). Must be called before mutating and writing back
    /// the header, or a stale in-memory copy will silently undo the
    /// other handle's most recent section bookkeeping.
    pub fn refresh_header(&mut self) -> Result<()> {
        self.file.seek(SeekFrom::Start(0))?;
        self.header = FileHeader::read_from(&mut self.file)?;
        Ok(())
    }

    /// Persists an updated header to offset 0 and fsyncs.
    pub fn write_header(&mut self, header: FileHeader) -> Result<()> {
        self.file.seek(SeekFrom::Start(0))?;
        header.write_to(&mut self.file)?;
        self.file.sync_all()?;
        self.header = header;
        Ok(())
    }

    /// Reads `len` bytes starting at `offset`.
    pub fn read_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        self.file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; len];
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Writes `bytes` starting at `offset`.
    pub fn write_at(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(bytes)?;
        Ok(())
    }

    /// Appends `bytes` at the current end of file, returning the offset
    /// they were written at.
    pub fn append(&mut self, bytes: &[u8]) -> Result<u64> {
        let offset = self.file.seek(SeekFrom::End(0))?;
        self.file.write_all(bytes)?;
        Ok(offset)
    }

    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Truncates the file to `len` bytes. Used by compaction when
    /// rewriting sections in place.
    pub fn set_len(&mut self, len: u64) -> Result<()> {
        self.file.set_len(len)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_then_reopen_preserves_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("entities.db");
        {
            let mut f = UnifiedFile::create(&path).unwrap();
            let mut header = *f.header();
            header.entity_count = 7;
            f.write_header(header).unwrap();
        }
        let reopened = UnifiedFile::open(&path).unwrap();
        assert_eq!(reopened.header().entity_count, 7);
    }

    #[test]
    fn append_and_read_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("entities.db");
        let mut f = UnifiedFile::create(&path).unwrap();
        let offset = f.append(b"payload").unwrap();
        let read = f.read_at(offset, 7).unwrap();
        assert_eq!(read, b"payload");
    }
}
