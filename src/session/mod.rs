//! Conversation session persistence.
//!
//! [`SessionManager`] owns every persisted record and works against any
//! [`KeyValueStore`]: [`MemoryStore`] for tests and replays, [`SqliteStore`]
//! for the CLI.

pub mod manager;
pub mod model;
pub mod store;

pub use manager::SessionManager;
pub use model::{format_duration, ConversationSession, SessionStats, SessionUpdate};
pub use store::{KeyValueStore, MemoryStore, SqliteStore};

use std::path::Path;
use std::sync::Arc;

/// Open the configured store backend.
pub fn open_store(backend: &str, path: &Path) -> anyhow::Result<Arc<dyn KeyValueStore>> {
    match backend {
        "memory" => Ok(Arc::new(MemoryStore::new())),
        "sqlite" => Ok(Arc::new(SqliteStore::open(path)?)),
        other => anyhow::bail!("Unknown storage backend: {other} (expected sqlite or memory)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_store_selects_backend() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("s.db");
        assert_eq!(open_store("memory", &path).unwrap().name(), "memory");
        assert_eq!(open_store("sqlite", &path).unwrap().name(), "sqlite");
        assert!(open_store("redis", &path).is_err());
    }
}
