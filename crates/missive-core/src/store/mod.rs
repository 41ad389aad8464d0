//! Storage collaborator seams
//!
//! The protocol talks to two external systems: a content-addressed blob
//! store and a per-identity mutable root pointer. Both are modeled as async
//! traits so the protocol code is backend-agnostic:
//!
//! - [`MemoryContentStore`] / [`MemoryRootRegistry`] - in-process, for tests
//!   and simulations
//! - [`LocalStore`] - redb-backed, for offline/CLI use
//! - [`GatewayStore`] - HTTP gateway client against a real blob network
//!
//! Reads are best-effort: any network error, timeout, or parse failure
//! resolves to absence, never an error. Writes fail loudly.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::MissiveResult;
use crate::types::{Address, ContentId};

mod gateway;
mod local;
mod memory;

pub use gateway::GatewayStore;
pub use local::LocalStore;
pub use memory::{MemoryContentStore, MemoryRootRegistry};

/// Default per-fetch timeout
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_millis(1000);

/// Put/get of immutable byte blobs by content id.
///
/// `put` of identical bytes always yields the identical id. A `get` miss is
/// a normal outcome (blob not replicated, gateway slow, content malformed),
/// not a fault.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store a blob, returning its content id. Fails on write error.
    async fn put(&self, bytes: Bytes) -> MissiveResult<ContentId>;

    /// Fetch a blob. Resolves to `None` on any error or after `timeout`.
    async fn get(&self, id: &ContentId, timeout: Duration) -> Option<Bytes>;
}

/// Get/set of the single mutable content-id reference per identity.
///
/// Externally this is an on-chain metadata record on the identity's account;
/// here it is a seam so the transaction logic can run against any backend.
#[async_trait]
pub trait RootRegistry: Send + Sync {
    /// Current root pointer for an identity, if one was ever published
    async fn get(&self, identity: &Address) -> Option<ContentId>;

    /// Publish a new root pointer. Fails on write error.
    async fn set(&self, identity: &Address, cid: ContentId) -> MissiveResult<()>;
}

/// Serialize a value to JSON and store it.
pub async fn put_json<T: Serialize + Sync>(
    store: &dyn ContentStore,
    value: &T,
) -> MissiveResult<ContentId> {
    let bytes = serde_json::to_vec(value)
        .map_err(|e| crate::error::MissiveError::Serialization(e.to_string()))?;
    store.put(Bytes::from(bytes)).await
}

/// Fetch a blob and parse it as JSON.
///
/// A missing blob or a document that does not parse both yield `None`;
/// malformed content degrades to absence rather than an error.
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn ContentStore,
    id: &ContentId,
    timeout: Duration,
) -> Option<T> {
    let bytes = store.get(id, timeout).await?;
    match serde_json::from_slice(&bytes) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(cid = %id, error = %e, "Fetched blob did not parse, treating as absent");
            None
        }
    }
}

/// Derive a content id from blob bytes: base58-encoded BLAKE3 hash.
///
/// Used by the in-process backends; the gateway backend carries whatever id
/// the remote network assigns.
pub fn derive_content_id(bytes: &[u8]) -> ContentId {
    let hash = blake3::hash(bytes);
    ContentId::new(bs58::encode(hash.as_bytes()).into_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_content_id_deterministic() {
        let a = derive_content_id(b"hello");
        let b = derive_content_id(b"hello");
        let c = derive_content_id(b"world");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn test_get_json_malformed_is_absent() {
        let store = MemoryContentStore::new();
        let id = store.put(Bytes::from_static(b"not json")).await.unwrap();

        let parsed: Option<crate::document::ProfileDocument> =
            get_json(&store, &id, DEFAULT_FETCH_TIMEOUT).await;
        assert!(parsed.is_none());
    }

    #[tokio::test]
    async fn test_put_json_roundtrip() {
        let store = MemoryContentStore::new();
        let profile = crate::document::ProfileDocument::empty();

        let id = put_json(&store, &profile).await.unwrap();
        let back: crate::document::ProfileDocument =
            get_json(&store, &id, DEFAULT_FETCH_TIMEOUT).await.unwrap();
        assert_eq!(back, profile);
    }
}
