//! Persisted document model
//!
//! All documents are JSON-shaped, content-addressed, and immutable once
//! stored: any edit produces a new blob with a new [`ContentId`]. The only
//! conceptually mutable state is the root pointer, which always names the
//! current [`ProfileDocument`].
//!
//! ## Layout
//!
//! ```text
//! root pointer ──▶ ProfileDocument
//!                    namespaces["0x<counterparty>"] ──▶ NamespaceIndex
//!                                                         head ──▶ Chunk ──prev──▶ Chunk ──prev──▶ null
//!                                                         entries["msg-3"] ──▶ chunk containing msg-3
//! MessageLink.cid ──▶ MessageBody
//! ```
//!
//! Chunks form a singly linked list, newest-first from `head`, and hold at
//! most [`CHUNK_CAPACITY`] links each.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{Address, ContentId};

/// Maximum number of links per namespace chunk (fixed protocol policy)
pub const CHUNK_CAPACITY: usize = 100;

/// Schema version stamped into every published profile document
pub const SCHEMA_VERSION: &str = "1.1";

/// One per identity: maps lowercased counterparty addresses to the
/// [`NamespaceIndex`] holding the messages sent to that counterparty.
///
/// A profile is created lazily on first append and only ever rewritten as a
/// whole; the previous blob becomes orphaned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDocument {
    /// Document schema version
    #[serde(default)]
    pub schema_version: String,
    /// Lowercased counterparty address -> namespace index ContentId
    #[serde(default)]
    pub namespaces: BTreeMap<String, ContentId>,
}

impl ProfileDocument {
    /// Create an empty profile with the current schema version
    pub fn empty() -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            namespaces: BTreeMap::new(),
        }
    }

    /// Look up the namespace index id for a counterparty
    pub fn namespace_for(&self, counterparty: &Address) -> Option<&ContentId> {
        self.namespaces.get(&counterparty.namespace_key())
    }
}

/// Per-counterparty sub-ledger: the chunk chain head plus a name index.
///
/// `head` references the most-recently-written chunk (empty until the first
/// append). `entries` maps every known message name to the chunk that
/// currently contains it - "currently" because a chunk's ContentId changes
/// whenever its contents change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceIndex {
    /// ContentId of the newest chunk, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head: Option<ContentId>,
    /// Message name -> ContentId of the chunk containing that link
    #[serde(default)]
    pub entries: BTreeMap<String, ContentId>,
}

impl NamespaceIndex {
    /// An index with no history
    pub fn empty() -> Self {
        Self::default()
    }
}

/// A capacity-bounded batch of message links, linked to its predecessor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceChunk {
    /// ContentId of the previous chunk, or `None` for the oldest chunk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev: Option<ContentId>,
    /// Links in insertion order
    #[serde(default)]
    pub links: Vec<MessageLink>,
}

impl NamespaceChunk {
    /// Whether another link still fits under [`CHUNK_CAPACITY`]
    pub fn has_capacity(&self) -> bool {
        self.links.len() < CHUNK_CAPACITY
    }

    /// Pure copy-on-write append: a clone of this chunk with `link` added
    /// and `prev` unchanged. The caller must have checked capacity.
    pub fn with_link(&self, link: MessageLink) -> Self {
        let mut links = self.links.clone();
        links.push(link);
        Self {
            prev: self.prev.clone(),
            links,
        }
    }

    /// A fresh chunk holding only `link`, chained onto `prev`
    pub fn fresh(prev: Option<ContentId>, link: MessageLink) -> Self {
        Self {
            prev,
            links: vec![link],
        }
    }
}

/// A signed, content-addressed pointer to a message body plus delivery and
/// authenticity metadata. This is the unit the append transaction writes and
/// the signature engine authenticates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageLink {
    /// Human-readable unique name within the namespace (`msg-<n>`)
    #[serde(default)]
    pub name: String,
    /// ContentId of the [`MessageBody`]
    pub cid: ContentId,
    /// Whether the body text is encrypted
    #[serde(default)]
    pub encrypted: bool,
    /// Cipher tag, e.g. `"AES-256-GCM"` (empty/absent for plaintext)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_algorithm: Option<String>,
    /// Fingerprint of the encryption key (absent for plaintext)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_key_fingerprint: Option<String>,
    /// Chain id the signature is scoped to
    pub chain_id: u64,
    /// Claimed signer (lowercased on the wire)
    pub signer_address: Address,
    /// Unix timestamp (seconds) at signing time
    pub signed_at: i64,
    /// Hex nonce; `"0x0"` for plaintext messages
    #[serde(default)]
    pub nonce: String,
    /// Hex-encoded signature bytes
    #[serde(default)]
    pub signature: String,
}

/// The message payload itself, referenced from a link by `cid`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageBody {
    /// Message text (base64 ciphertext when the link says encrypted)
    pub txt: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_link(name: &str) -> MessageLink {
        MessageLink {
            name: name.to_string(),
            cid: ContentId::new("QmBody"),
            encrypted: false,
            encryption_algorithm: None,
            encryption_key_fingerprint: None,
            chain_id: 100,
            signer_address: "0x0000000000000000000000000000000000000001".parse().unwrap(),
            signed_at: 1_700_000_000,
            nonce: "0x0".to_string(),
            signature: String::new(),
        }
    }

    #[test]
    fn test_profile_camel_case_wire_form() {
        let mut profile = ProfileDocument::empty();
        profile.namespaces.insert(
            "0x0000000000000000000000000000000000000002".to_string(),
            ContentId::new("QmIndex"),
        );
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["schemaVersion"], "1.1");
        assert_eq!(
            json["namespaces"]["0x0000000000000000000000000000000000000002"],
            "QmIndex"
        );
    }

    #[test]
    fn test_profile_tolerates_missing_fields() {
        // A document with neither field still parses (treated as empty)
        let profile: ProfileDocument = serde_json::from_str("{}").unwrap();
        assert!(profile.namespaces.is_empty());
        assert!(profile.schema_version.is_empty());
    }

    #[test]
    fn test_index_head_omitted_when_empty() {
        let index = NamespaceIndex::empty();
        let json = serde_json::to_string(&index).unwrap();
        assert!(!json.contains("head"));

        let parsed: NamespaceIndex = serde_json::from_str(&json).unwrap();
        assert!(parsed.head.is_none());
    }

    #[test]
    fn test_chunk_capacity() {
        let mut chunk = NamespaceChunk::default();
        for i in 0..CHUNK_CAPACITY {
            assert!(chunk.has_capacity());
            chunk = chunk.with_link(test_link(&format!("msg-{}", i + 1)));
        }
        assert!(!chunk.has_capacity());
        assert_eq!(chunk.links.len(), CHUNK_CAPACITY);
    }

    #[test]
    fn test_with_link_does_not_touch_prev() {
        let chunk = NamespaceChunk::fresh(Some(ContentId::new("QmOld")), test_link("msg-1"));
        let extended = chunk.with_link(test_link("msg-2"));
        assert_eq!(extended.prev, Some(ContentId::new("QmOld")));
        assert_eq!(extended.links.len(), 2);
        // Original is untouched (copy-on-write, no shared state)
        assert_eq!(chunk.links.len(), 1);
    }

    #[test]
    fn test_link_wire_form() {
        let mut link = test_link("msg-1");
        link.encrypted = true;
        link.encryption_algorithm = Some("AES-256-GCM".to_string());
        link.encryption_key_fingerprint = Some("aabbccdd".to_string());

        let json = serde_json::to_value(&link).unwrap();
        assert_eq!(json["name"], "msg-1");
        assert_eq!(json["chainId"], 100);
        assert_eq!(json["encryptionAlgorithm"], "AES-256-GCM");
        assert_eq!(
            json["signerAddress"],
            "0x0000000000000000000000000000000000000001"
        );

        let back: MessageLink = serde_json::from_value(json).unwrap();
        assert_eq!(back, link);
    }

    #[test]
    fn test_plaintext_link_omits_encryption_fields() {
        let json = serde_json::to_string(&test_link("msg-1")).unwrap();
        assert!(!json.contains("encryptionAlgorithm"));
        assert!(!json.contains("encryptionKeyFingerprint"));
    }
}
