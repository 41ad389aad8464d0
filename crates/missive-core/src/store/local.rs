//! Local persistent store backed by redb
//!
//! Implements both [`ContentStore`] and [`RootRegistry`] over a single
//! database file, so the whole protocol can run offline (CLI, demos,
//! integration tests that need persistence across restarts).

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use redb::{Database, ReadableTable, TableDefinition};
use tracing::debug;

use crate::error::{MissiveError, MissiveResult};
use crate::types::{Address, ContentId};

use super::{derive_content_id, ContentStore, RootRegistry};

const BLOBS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("blobs");
const ROOTS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("roots");

/// redb-backed content store and root registry.
#[derive(Clone)]
pub struct LocalStore {
    db: Arc<RwLock<Database>>,
}

impl LocalStore {
    /// Open (or create) a local store at the given path.
    pub fn open(path: impl AsRef<Path>) -> MissiveResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::create(path)?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(BLOBS_TABLE)?;
            let _ = write_txn.open_table(ROOTS_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self {
            db: Arc::new(RwLock::new(db)),
        })
    }
}

#[async_trait]
impl ContentStore for LocalStore {
    async fn put(&self, bytes: Bytes) -> MissiveResult<ContentId> {
        let id = derive_content_id(&bytes);

        let db = self.db.read();
        let write_txn = db.begin_write()?;
        {
            let mut table = write_txn.open_table(BLOBS_TABLE)?;
            table.insert(id.as_str(), bytes.as_ref())?;
        }
        write_txn.commit()?;

        debug!(cid = %id, len = bytes.len(), "Stored blob locally");
        Ok(id)
    }

    async fn get(&self, id: &ContentId, _timeout: Duration) -> Option<Bytes> {
        let db = self.db.read();
        let read_txn = db.begin_read().ok()?;
        let table = read_txn.open_table(BLOBS_TABLE).ok()?;
        let value = table.get(id.as_str()).ok()??;
        Some(Bytes::copy_from_slice(value.value()))
    }
}

#[async_trait]
impl RootRegistry for LocalStore {
    async fn get(&self, identity: &Address) -> Option<ContentId> {
        let db = self.db.read();
        let read_txn = db.begin_read().ok()?;
        let table = read_txn.open_table(ROOTS_TABLE).ok()?;
        let key = identity.to_string();
        let value = table.get(key.as_str()).ok()??;
        Some(ContentId::new(value.value()))
    }

    async fn set(&self, identity: &Address, cid: ContentId) -> MissiveResult<()> {
        let db = self.db.read();
        let write_txn = db.begin_write()?;
        {
            let mut table = write_txn.open_table(ROOTS_TABLE)?;
            let key = identity.to_string();
            table.insert(key.as_str(), cid.as_str())?;
        }
        write_txn
            .commit()
            .map_err(|e| MissiveError::Write(format!("root pointer commit failed: {}", e)))?;

        debug!(%identity, %cid, "Published root pointer locally");
        Ok(())
    }
}
