//! Store configuration

use rocksdb::Options;
use std::path::{Path, PathBuf};

/// Settings for opening a [`crate::GraphStore`]
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory holding the RocksDB files
    pub path: PathBuf,
    /// Create the database when it does not exist yet
    pub create_if_missing: bool,
    /// LZ4-compress SST files
    pub compression: bool,
    pub max_background_jobs: i32,
    /// Flush the memtable after every write
    pub flush_on_write: bool,
}

impl StoreConfig {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            create_if_missing: true,
            compression: true,
            max_background_jobs: 2,
            flush_on_write: true,
        }
    }

    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    pub fn compression(mut self, enabled: bool) -> Self {
        self.compression = enabled;
        self
    }

    pub fn max_background_jobs(mut self, jobs: i32) -> Self {
        self.max_background_jobs = jobs.max(1);
        self
    }

    pub fn flush_on_write(mut self, flush: bool) -> Self {
        self.flush_on_write = flush;
        self
    }

    /// Translate into RocksDB options
    pub(crate) fn rocksdb_options(&self) -> Options {
        let mut opts = Options::default();
        opts.create_if_missing(self.create_if_missing);
        opts.set_max_background_jobs(self.max_background_jobs);
        opts.set_bytes_per_sync(1048576); // 1MB
        if self.compression {
            opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        } else {
            opts.set_compression_type(rocksdb::DBCompressionType::None);
        }
        opts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::new("/tmp/textgraph");
        assert_eq!(config.path, PathBuf::from("/tmp/textgraph"));
        assert!(config.create_if_missing);
        assert!(config.compression);
        assert!(config.flush_on_write);
        assert_eq!(config.max_background_jobs, 2);
    }

    #[test]
    fn test_builder_overrides() {
        let config = StoreConfig::new("db")
            .create_if_missing(false)
            .compression(false)
            .flush_on_write(false)
            .max_background_jobs(0);
        assert!(!config.create_if_missing);
        assert!(!config.compression);
        assert!(!config.flush_on_write);
        assert_eq!(config.max_background_jobs, 1);
    }
}
