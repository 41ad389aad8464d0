//! Namespace chunk-chain traversal and message numbering
//!
//! A namespace's history lives in a singly linked list of chunks, newest
//! first from `index.head`. Traversal walks the `prev` pointers, collecting
//! links until the chain ends or a blob goes missing. The walk is guarded
//! against corrupted or adversarial chains: a chunk id seen twice, or more
//! than [`MAX_CHUNK_HOPS`] hops, terminates the walk.

use std::collections::HashSet;
use std::time::Duration;

use tracing::{debug, warn};

use crate::document::{MessageLink, NamespaceChunk, NamespaceIndex};
use crate::store::{get_json, ContentStore};

/// Upper bound on chunks followed in one traversal.
///
/// At 100 links per chunk this admits a million-message history; anything
/// deeper is assumed to be a corrupted chain.
pub const MAX_CHUNK_HOPS: usize = 10_000;

/// Collect every link ever appended to a namespace.
///
/// Output order is newest-chunk-first, within-chunk insertion order. A
/// fetch miss ends the walk with whatever was collected so far (degraded
/// history, not an error).
pub async fn collect_links(
    store: &dyn ContentStore,
    index: &NamespaceIndex,
    timeout: Duration,
) -> Vec<MessageLink> {
    let mut links = Vec::new();
    let mut visited = HashSet::new();
    let mut next = index.head.clone();
    let mut hops = 0usize;

    while let Some(cid) = next {
        if hops >= MAX_CHUNK_HOPS {
            warn!(%cid, hops, "Chunk chain exceeds hop limit, truncating history");
            break;
        }
        if !visited.insert(cid.clone()) {
            warn!(%cid, "Chunk chain contains a cycle, truncating history");
            break;
        }

        let Some(chunk) = get_json::<NamespaceChunk>(store, &cid, timeout).await else {
            debug!(%cid, "Chunk fetch missed, history is partial");
            break;
        };

        links.extend(chunk.links);
        next = chunk.prev;
        hops += 1;
    }

    links
}

/// Next `msg-<n>` name for a namespace: one past the highest number among
/// the index's entry names, or `msg-1` for a fresh namespace.
///
/// Names are for debuggability and index keying only; display ordering
/// always uses `signedAt`.
pub fn next_message_name(index: &NamespaceIndex) -> String {
    let max = index
        .entries
        .keys()
        .filter_map(|name| parse_message_number(name))
        .max()
        .unwrap_or(0);
    format!("msg-{}", max + 1)
}

/// Parse `msg-<integer>` names; anything else is ignored for numbering.
fn parse_message_number(name: &str) -> Option<u64> {
    name.strip_prefix("msg-")?.parse().ok()
}
