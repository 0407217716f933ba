//! A pool of reusable `Reader`s, invalidated on checkpoint by an
//! `AtomicU64` epoch counter rather than by individually closing file
//! handles: `Writer::checkpoint` moves the entity index section, so a
//! stale pooled reader would otherwise resolve offsets against an index
//! snapshot that no longer matches the file.

use crate::dictionary::TagDictionary;
use crate::reader::Reader;
use entitydb_core::Result;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

struct PooledReader {
    reader: Reader,
    epoch: u64,
}

/// A bounded pool of `Reader`s sharing one epoch counter with the
/// `Writer` that owns the same unified file.
pub struct ReaderPool {
    path: PathBuf,
    dictionary: Arc<TagDictionary>,
    epoch: Arc<AtomicU64>,
    idle: Mutex<Vec<PooledReader>>,
    max_size: usize,
}

impl ReaderPool {
    pub fn new(
        path: impl Into<PathBuf>,
        dictionary: Arc<TagDictionary>,
        epoch: Arc<AtomicU64>,
        max_size: usize,
    ) -> Self {
        ReaderPool {
            path: path.into(),
            dictionary,
            epoch,
            idle: Mutex::new(Vec::new()),
            max_size,
        }
    }

    /// Bumps the shared epoch; called by `Writer::checkpoint`/`compact`.
    /// Every pooled reader still idle at the old epoch is discarded the
    /// next time it would be acquired.
    pub fn invalidate(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }

    /// Borrows a reader from the pool (discarding any stale one found) or
    /// opens a fresh file handle if the pool is empty.
    pub fn acquire(&self) -> Result<PooledGuard<'_>> {
        let current_epoch = self.epoch.load(Ordering::SeqCst);
        let mut idle = self.idle.lock();
        while let Some(candidate) = idle.pop() {
            if candidate.epoch == current_epoch {
                return Ok(PooledGuard {
                    pool: self,
                    reader: Some(candidate.reader),
                    epoch: current_epoch,
                });
            }
            // stale: drop candidate.reader, keep scanning
        }
        drop(idle);
        let reader = Reader::open(&self.path, self.dictionary.clone())?;
        Ok(PooledGuard {
            pool: self,
            reader: Some(reader),
            epoch: current_epoch,
        })
    }

    fn release(&self, reader: Reader, epoch: u64) {
        if epoch != self.epoch.load(Ordering::SeqCst) {
            return; // stale by the time it was returned; drop it
        }
        let mut idle = self.idle.lock();
        if idle.len() < self.max_size {
            idle.push(PooledReader { reader, epoch });
        }
    }
}

/// A borrowed reader that returns itself to the pool on drop, unless the
/// epoch advanced while it was checked out.
pub struct PooledGuard<'a> {
    pool: &'a ReaderPool,
    reader: Option<Reader>,
    epoch: u64,
}

impl<'a> std::ops::Deref for PooledGuard<'a> {
    type Target = Reader;
    fn deref(&self) -> &Reader {
        self.reader.as_ref().expect("reader taken before drop")
    }
}

impl<'a> std::ops::DerefMut for PooledGuard<'a> {
    fn deref_mut(&mut self) -> &mut Reader {
        self.reader.as_mut().expect("reader taken before drop")
    }
}

impl<'a> Drop for PooledGuard<'a> {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            self.pool.release(reader, self.epoch);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::UnifiedFile;
    use tempfile::tempdir;

    #[test]
    fn acquiring_after_invalidate_skips_stale_readers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("entities.db");
        UnifiedFile::create(&path).unwrap();
        let dict = Arc::new(TagDictionary::new());
        let epoch = Arc::new(AtomicU64::new(0));
        let pool = ReaderPool::new(&path, dict, epoch, 4);

        {
            let _guard = pool.acquire().unwrap();
        }
        assert_eq!(pool.idle.lock().len(), 1);

        pool.invalidate();
        let _guard2 = pool.acquire().unwrap();
        assert_eq!(pool.idle.lock().len(), 0);
    }
}
