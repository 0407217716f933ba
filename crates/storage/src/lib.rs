//! On-disk unified file format, tag dictionary, entity index, and readers/
//! writers for EntityDB.

pub mod compaction;
pub mod dictionary;
pub mod format;
pub mod index;
pub mod reader;
pub mod reader_pool;
pub mod writer;

pub use dictionary::TagDictionary;
pub use format::{DataRecord, EntityIndexEntry, FileHeader, UnifiedFile, FORMAT_VERSION, MAGIC};
pub use index::{DatasetPartition, DatasetRegistry, ShardedTagIndex};
pub use reader::Reader;
pub use reader_pool::ReaderPool;
pub use writer::Writer;
