//! Missive Core Library
//!
//! Decentralized messaging over content-addressed storage.
//!
//! ## Overview
//!
//! Missive keeps each user's outgoing messages in per-conversation,
//! append-only logs of signed links, stored as immutable JSON blobs on a
//! content-addressed network. A single mutable root pointer per identity
//! (an on-chain record) names the current profile document; everything
//! below it is reconstructed by content id. Messages are authenticated
//! with secp256k1 signatures verifiable across wallet kinds - plain
//! key-pair wallets and contract-based smart accounts.
//!
//! ## Core Principles
//!
//! - **Immutable storage**: every edit produces a new blob; only the root
//!   pointer moves
//! - **Best-effort reads**: a missing blob degrades history, never crashes
//! - **Loud writes**: a failed upload or root publish aborts the whole
//!   append, leaving the old root authoritative
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use missive_core::{KeypairSigner, MemoryContentStore, MemoryRootRegistry, Messenger};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryContentStore::new());
//!     let roots = Arc::new(MemoryRootRegistry::new());
//!     let signer = Arc::new(KeypairSigner::generate());
//!
//!     let messenger = Messenger::new(store, roots, signer);
//!     let link = messenger.send_message(&recipient, "hello", false).await?;
//!     println!("published {} as {}", link.name, link.cid);
//!
//!     for group in messenger.conversations(&[recipient]).await {
//!         println!("{}: {}", group.counterparty, group.last_message.txt);
//!     }
//!     Ok(())
//! }
//! ```

pub mod conversation;
pub mod crypto;
pub mod document;
pub mod error;
pub mod messenger;
pub mod namespace;
pub mod signature;
pub mod store;
pub mod types;

// Re-exports
pub use conversation::{
    conversation_with, group_by_counterparty, sort_messages, ConversationGroup, Message,
};
pub use crypto::{BodyCrypto, ENCRYPTION_ALGORITHM};
pub use document::{
    MessageBody, MessageLink, NamespaceChunk, NamespaceIndex, ProfileDocument, CHUNK_CAPACITY,
    SCHEMA_VERSION,
};
pub use error::{MissiveError, MissiveResult};
pub use messenger::Messenger;
pub use namespace::{collect_links, next_message_name, MAX_CHUNK_HOPS};
pub use signature::{
    ContractAccountSigner, ContractValidator, KeypairSigner, LinkSigner, OwnerKeyValidator,
    SignablePayload, SignatureEngine, SignerKind, SIGNING_CHAIN_ID,
};
pub use store::{
    ContentStore, GatewayStore, LocalStore, MemoryContentStore, MemoryRootRegistry, RootRegistry,
    DEFAULT_FETCH_TIMEOUT,
};
pub use types::{Address, ContentId};
