use std::path::{Path, PathBuf};

use crate::writer::{CommitPolicy, DEFAULT_BATCH_SIZE};

#[derive(Clone, Debug, derive_builder::Builder)]
pub struct DatabaseConfig {
    /// The database file.  If unset, the database lives in memory and goes away with the connection.
    #[builder(default, setter(into, strip_option))]
    path: Option<PathBuf>,

    /// How long sqlite waits on a locked database before giving up.
    #[builder(default = "1000")]
    busy_timeout_ms: u32,

    /// Passed straight to `PRAGMA cache_size`: negative is KiB, positive is pages.
    ///
    /// The sqlite default is only a couple megabytes, since it has to work on e.g. phones.
    #[builder(default = "-100000")]
    cache_size: i64,

    /// Enforce foreign keys.  Off by default, like sqlite itself: a foreign key may name a table which doesn't exist
    /// yet, and writes to the referencing table still go through.
    #[builder(default = "false")]
    foreign_keys: bool,

    /// Use a write-ahead log.  Ignored for in-memory databases.
    #[builder(default = "true")]
    write_ahead_log: bool,

    /// Chunk size for batched writes which don't pick their own.
    #[builder(default = "DEFAULT_BATCH_SIZE")]
    batch_size: usize,

    /// Commit policy for batched writes which don't pick their own.
    #[builder(default)]
    commit_policy: CommitPolicy,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfigBuilder::default()
            .build()
            .expect("Every field has a default")
    }
}

impl DatabaseConfig {
    /// Defaults, but stored at `path`.
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        DatabaseConfig {
            path: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn busy_timeout_ms(&self) -> u32 {
        self.busy_timeout_ms
    }

    pub fn cache_size(&self) -> i64 {
        self.cache_size
    }

    pub fn foreign_keys(&self) -> bool {
        self.foreign_keys
    }

    pub fn write_ahead_log(&self) -> bool {
        self.write_ahead_log
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn commit_policy(&self) -> CommitPolicy {
        self.commit_policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = DatabaseConfig::default();
        assert_eq!(c.path(), None);
        assert_eq!(c.busy_timeout_ms(), 1000);
        assert_eq!(c.cache_size(), -100000);
        assert!(!c.foreign_keys());
        assert!(c.write_ahead_log());
        assert_eq!(c.batch_size(), 100);
        assert_eq!(c.commit_policy(), CommitPolicy::PerChunk);
    }

    #[test]
    fn builder_overrides() {
        let c = DatabaseConfigBuilder::default()
            .path("/tmp/x.sqlite")
            .batch_size(7)
            .commit_policy(CommitPolicy::AllOrNothing)
            .foreign_keys(true)
            .build()
            .unwrap();
        assert_eq!(c.path(), Some(Path::new("/tmp/x.sqlite")));
        assert_eq!(c.batch_size(), 7);
        assert_eq!(c.commit_policy(), CommitPolicy::AllOrNothing);
        assert!(c.foreign_keys());
        assert_eq!(c.busy_timeout_ms(), 1000);
    }
}
