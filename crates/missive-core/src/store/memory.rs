//! In-memory store backends
//!
//! Suitable for tests and protocol simulations. Data is lost on drop. A
//! single instance can be shared (via `Arc` or `Clone`) between several
//! identities to simulate a common blob network.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use tracing::debug;

use crate::error::MissiveResult;
use crate::types::{Address, ContentId};

use super::{derive_content_id, ContentStore, RootRegistry};

/// In-memory content-addressed blob store.
#[derive(Debug, Clone, Default)]
pub struct MemoryContentStore {
    blobs: Arc<RwLock<HashMap<ContentId, Bytes>>>,
}

impl MemoryContentStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blobs currently held
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    /// Whether the store holds no blobs
    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }

    /// Drop a blob, simulating content that was never replicated.
    ///
    /// Returns whether the blob was present.
    pub fn forget(&self, id: &ContentId) -> bool {
        self.blobs.write().remove(id).is_some()
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn put(&self, bytes: Bytes) -> MissiveResult<ContentId> {
        let id = derive_content_id(&bytes);
        debug!(cid = %id, len = bytes.len(), "Stored blob");
        self.blobs.write().insert(id.clone(), bytes);
        Ok(id)
    }

    async fn get(&self, id: &ContentId, _timeout: Duration) -> Option<Bytes> {
        self.blobs.read().get(id).cloned()
    }
}

/// In-memory root pointer registry.
#[derive(Debug, Clone, Default)]
pub struct MemoryRootRegistry {
    roots: Arc<RwLock<HashMap<Address, ContentId>>>,
}

impl MemoryRootRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RootRegistry for MemoryRootRegistry {
    async fn get(&self, identity: &Address) -> Option<ContentId> {
        self.roots.read().get(identity).cloned()
    }

    async fn set(&self, identity: &Address, cid: ContentId) -> MissiveResult<()> {
        debug!(%identity, %cid, "Published root pointer");
        self.roots.write().insert(*identity, cid);
        Ok(())
    }
}
