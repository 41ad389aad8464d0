//! Messenger - the primary entry point
//!
//! A [`Messenger`] binds one identity's signer to a content store and a
//! root-pointer registry, and exposes the protocol's operations:
//!
//! - `send_message` - the full write path: upload the body, number and sign
//!   a link, then run the append transaction and publish the new root
//! - `conversations` / `fetch_sent` / `fetch_received` - the read path:
//!   reconstruct histories across counterparties, verify signatures, group
//! - `clear_history` - publish a profile with no namespaces
//!
//! ## Append transaction
//!
//! The write path is a read-modify-publish over immutable blobs:
//!
//! ```text
//! read  root ──▶ profile ──▶ index ──▶ tail chunk
//! build new chunk (append or rollover) ──▶ new index ──▶ new profile
//! publish root (the only mutable step, done last)
//! ```
//!
//! Failure anywhere leaves the old root authoritative; there is no partial
//! commit. Concurrent appends by the same sender are NOT detected: both
//! read the same root and the later publish silently wins. Callers needing
//! stronger guarantees must serialize their appends.

use std::sync::Arc;
use std::time::Duration;

use rand::RngCore;
use tracing::{debug, info, warn};

use crate::conversation::{group_by_counterparty, ConversationGroup, Message};
use crate::crypto::{BodyCrypto, ENCRYPTION_ALGORITHM};
use crate::document::{
    MessageBody, MessageLink, NamespaceChunk, NamespaceIndex, ProfileDocument, SCHEMA_VERSION,
};
use crate::error::{MissiveError, MissiveResult};
use crate::namespace::{collect_links, next_message_name};
use crate::signature::{LinkSigner, SignablePayload, SignatureEngine, SIGNING_CHAIN_ID};
use crate::store::{get_json, put_json, ContentStore, RootRegistry, DEFAULT_FETCH_TIMEOUT};
use crate::types::{Address, ContentId};

/// Primary handle for sending and reading messages as one identity.
pub struct Messenger {
    store: Arc<dyn ContentStore>,
    roots: Arc<dyn RootRegistry>,
    signer: Arc<dyn LinkSigner>,
    engine: SignatureEngine,
    fetch_timeout: Duration,
    body_crypto: Option<BodyCrypto>,
}

impl Messenger {
    /// Create a messenger for the signer's identity.
    pub fn new(
        store: Arc<dyn ContentStore>,
        roots: Arc<dyn RootRegistry>,
        signer: Arc<dyn LinkSigner>,
    ) -> Self {
        Self {
            store,
            roots,
            signer,
            engine: SignatureEngine::new(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            body_crypto: None,
        }
    }

    /// Use a signature engine with contract validation enabled.
    pub fn with_engine(mut self, engine: SignatureEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Override the per-fetch timeout.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Enable body encryption with the given key.
    pub fn with_encryption_key(mut self, key: &[u8; 32]) -> Self {
        self.body_crypto = Some(BodyCrypto::new(key));
        self
    }

    /// The identity this messenger sends as.
    pub fn identity(&self) -> Address {
        self.signer.address()
    }

    // ═══════════════════════════════════════════════════════════════════
    // Write path
    // ═══════════════════════════════════════════════════════════════════

    /// Send a message: upload the body, sign a link, append it to the
    /// recipient's namespace, and publish the new root pointer.
    ///
    /// Returns the link as published.
    pub async fn send_message(
        &self,
        recipient: &Address,
        text: &str,
        encrypt: bool,
    ) -> MissiveResult<MessageLink> {
        let text = text.trim();
        if text.is_empty() {
            return Err(MissiveError::InvalidInput(
                "message text is empty".to_string(),
            ));
        }
        if encrypt && self.body_crypto.is_none() {
            return Err(MissiveError::InvalidInput(
                "encryption requested but no key configured".to_string(),
            ));
        }

        let sender = self.identity();

        // Read the current index up front for numbering
        let profile = self.profile_of(&sender).await.unwrap_or_default();
        let index = self
            .load_index(&profile, recipient)
            .await
            .unwrap_or_default();
        let name = next_message_name(&index);

        // Body upload happens before signing so the link commits to the cid
        let (body_text, algorithm, fingerprint) = match (&self.body_crypto, encrypt) {
            (Some(crypto), true) => (
                crypto.encrypt_text(text)?,
                Some(ENCRYPTION_ALGORITHM.to_string()),
                Some(crypto.fingerprint().to_string()),
            ),
            _ => (text.to_string(), None, None),
        };
        let body = MessageBody { txt: body_text };
        let cid = put_json(self.store.as_ref(), &body).await?;

        let signed_at = chrono::Utc::now().timestamp();
        let nonce = if encrypt {
            let mut bytes = [0u8; 16];
            rand::thread_rng().fill_bytes(&mut bytes);
            format!("0x{}", hex::encode(bytes))
        } else {
            "0x0".to_string()
        };

        let mut link = MessageLink {
            name,
            cid,
            encrypted: encrypt,
            encryption_algorithm: algorithm,
            encryption_key_fingerprint: fingerprint,
            chain_id: SIGNING_CHAIN_ID,
            signer_address: sender,
            signed_at,
            nonce,
            signature: String::new(),
        };

        let payload = SignablePayload::from_link(&link);
        let signature = self.signer.sign(&payload).await?;
        link.signature = format!("0x{}", hex::encode(signature));

        let new_root = self.append_link(recipient, link.clone()).await?;
        info!(
            %sender, recipient = %recipient, name = %link.name, root = %new_root,
            "Message sent"
        );
        Ok(link)
    }

    /// Append one signed link to the sender's namespace for `recipient`.
    ///
    /// This is the whole read-modify-publish transaction; the returned id is
    /// the newly published profile (the new root pointer value).
    async fn append_link(
        &self,
        recipient: &Address,
        link: MessageLink,
    ) -> MissiveResult<ContentId> {
        let sender = self.identity();

        // 1-2: current profile and namespace index (absent reads as empty)
        let mut profile = self.profile_of(&sender).await.unwrap_or_default();
        let mut index = self
            .load_index(&profile, recipient)
            .await
            .unwrap_or_default();

        // 3: current tail chunk, if the namespace has history
        let tail = match &index.head {
            Some(head) => get_json::<NamespaceChunk>(self.store.as_ref(), head, self.fetch_timeout)
                .await,
            None => None,
        };

        // 4: append into the tail, or roll over to a fresh chunk when the
        // tail is absent or full
        let target = match tail {
            Some(chunk) if chunk.has_capacity() => chunk.with_link(link.clone()),
            Some(_) => {
                debug!(recipient = %recipient, "Tail chunk full, starting a new chunk");
                NamespaceChunk::fresh(index.head.clone(), link.clone())
            }
            None => NamespaceChunk::fresh(index.head.clone(), link.clone()),
        };

        // 5: upload the target chunk and point head at it
        let new_head = put_json(self.store.as_ref(), &target).await?;
        index.head = Some(new_head.clone());

        // 6: repoint the entry for every link the target chunk contains -
        // the chunk's id changed, so each of those entries is stale
        for contained in &target.links {
            index
                .entries
                .insert(contained.name.clone(), new_head.clone());
        }

        // 7: upload the rewritten index and splice it into the profile
        let new_index_id = put_json(self.store.as_ref(), &index).await?;
        profile
            .namespaces
            .insert(recipient.namespace_key(), new_index_id);
        profile.schema_version = SCHEMA_VERSION.to_string();

        // 8: upload the rewritten profile and publish it as the new root
        let new_profile_id = put_json(self.store.as_ref(), &profile).await?;
        self.roots.set(&sender, new_profile_id.clone()).await?;

        Ok(new_profile_id)
    }

    /// Publish a profile with no namespaces, orphaning all history blobs.
    pub async fn clear_history(&self) -> MissiveResult<ContentId> {
        let sender = self.identity();
        let profile = ProfileDocument::empty();
        let new_profile_id = put_json(self.store.as_ref(), &profile).await?;
        self.roots.set(&sender, new_profile_id.clone()).await?;
        info!(%sender, root = %new_profile_id, "History cleared");
        Ok(new_profile_id)
    }

    /// Next `msg-<n>` name that `send_message` would assign for `recipient`.
    pub async fn next_message_name(&self, recipient: &Address) -> String {
        let profile = self.profile_of(&self.identity()).await.unwrap_or_default();
        let index = self
            .load_index(&profile, recipient)
            .await
            .unwrap_or_default();
        next_message_name(&index)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Read path
    // ═══════════════════════════════════════════════════════════════════

    /// Current profile document for an identity, if resolvable.
    pub async fn profile_of(&self, identity: &Address) -> Option<ProfileDocument> {
        let root = self.roots.get(identity).await?;
        get_json(self.store.as_ref(), &root, self.fetch_timeout).await
    }

    async fn load_index(
        &self,
        profile: &ProfileDocument,
        counterparty: &Address,
    ) -> Option<NamespaceIndex> {
        let index_id = profile.namespace_for(counterparty)?;
        get_json(self.store.as_ref(), index_id, self.fetch_timeout).await
    }

    /// Messages this identity sent to the given counterparties.
    pub async fn fetch_sent(&self, counterparties: &[Address]) -> Vec<Message> {
        let me = self.identity();
        let Some(profile) = self.profile_of(&me).await else {
            return Vec::new();
        };

        let fetches = counterparties.iter().map(|counterparty| {
            let profile = &profile;
            async move {
                let Some(index) = self.load_index(profile, counterparty).await else {
                    return Vec::new();
                };
                let links = collect_links(self.store.as_ref(), &index, self.fetch_timeout).await;
                self.assemble(links, me, *counterparty).await
            }
        });

        futures::future::join_all(fetches)
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    /// Messages the given counterparties sent to this identity.
    pub async fn fetch_received(&self, counterparties: &[Address]) -> Vec<Message> {
        let me = self.identity();

        let fetches = counterparties.iter().map(|counterparty| async move {
            let Some(profile) = self.profile_of(counterparty).await else {
                return Vec::new();
            };
            let Some(index) = self.load_index(&profile, &me).await else {
                return Vec::new();
            };
            let links = collect_links(self.store.as_ref(), &index, self.fetch_timeout).await;
            self.assemble(links, *counterparty, me).await
        });

        futures::future::join_all(fetches)
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    /// Assemble links into messages by resolving their bodies.
    ///
    /// A body that cannot be fetched silently drops that one message.
    /// Verification has not run yet; every message starts unverified.
    async fn assemble(
        &self,
        links: Vec<MessageLink>,
        sender: Address,
        conversation_with: Address,
    ) -> Vec<Message> {
        let mut messages = Vec::with_capacity(links.len());
        for link in links {
            let Some(body) =
                get_json::<MessageBody>(self.store.as_ref(), &link.cid, self.fetch_timeout).await
            else {
                debug!(cid = %link.cid, "Message body missing, dropping message");
                continue;
            };

            let txt = match (&self.body_crypto, link.encrypted) {
                (Some(crypto), true) => match crypto.decrypt_text(&body.txt) {
                    Ok(plain) => plain,
                    Err(e) => {
                        warn!(cid = %link.cid, error = %e, "Body decryption failed, keeping ciphertext");
                        body.txt
                    }
                },
                _ => body.txt,
            };

            messages.push(Message {
                txt,
                sender,
                conversation_with,
                link,
                is_verified: false,
            });
        }
        messages
    }

    /// Fetch all messages exchanged with the given counterparties, verify
    /// every signature, and group into conversations ordered by recency.
    pub async fn conversations(&self, counterparties: &[Address]) -> Vec<ConversationGroup> {
        let (received, sent) = futures::join!(
            self.fetch_received(counterparties),
            self.fetch_sent(counterparties)
        );

        let mut messages: Vec<Message> = received.into_iter().chain(sent).collect();

        // Verification pass: failure keeps the message, unverified
        for message in &mut messages {
            message.is_verified = self.engine.verify_link(&message.link).await;
        }

        group_by_counterparty(messages, &self.identity())
    }
}

impl std::fmt::Debug for Messenger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Messenger")
            .field("identity", &self.identity())
            .field("engine", &self.engine)
            .field("fetch_timeout", &self.fetch_timeout)
            .field("encrypting", &self.body_crypto.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::KeypairSigner;
    use crate::store::{MemoryContentStore, MemoryRootRegistry};

    fn messenger(
        store: &MemoryContentStore,
        roots: &MemoryRootRegistry,
    ) -> (Messenger, Address) {
        let signer = Arc::new(KeypairSigner::generate());
        let address = signer.address();
        let m = Messenger::new(
            Arc::new(store.clone()),
            Arc::new(roots.clone()),
            signer,
        );
        (m, address)
    }

    fn addr(n: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[19] = n;
        Address::from_bytes(bytes)
    }

    #[tokio::test]
    async fn test_send_rejects_empty_text() {
        let store = MemoryContentStore::new();
        let roots = MemoryRootRegistry::new();
        let (m, _) = messenger(&store, &roots);

        let result = m.send_message(&addr(9), "   ", false).await;
        assert!(matches!(result, Err(MissiveError::InvalidInput(_))));
        // Nothing was written
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_send_rejects_encrypt_without_key() {
        let store = MemoryContentStore::new();
        let roots = MemoryRootRegistry::new();
        let (m, _) = messenger(&store, &roots);

        let result = m.send_message(&addr(9), "hello", true).await;
        assert!(matches!(result, Err(MissiveError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_first_send_creates_whole_chain() {
        let store = MemoryContentStore::new();
        let roots = MemoryRootRegistry::new();
        let (m, me) = messenger(&store, &roots);
        let recipient = addr(9);

        let link = m.send_message(&recipient, "hello", false).await.unwrap();
        assert_eq!(link.name, "msg-1");
        assert_eq!(link.signer_address, me);
        assert_eq!(link.nonce, "0x0");

        // Profile -> index -> chunk -> body all resolvable
        let profile = m.profile_of(&me).await.unwrap();
        assert_eq!(profile.schema_version, SCHEMA_VERSION);
        let index_id = profile.namespace_for(&recipient).unwrap();
        let index: NamespaceIndex = get_json(&store, index_id, DEFAULT_FETCH_TIMEOUT)
            .await
            .unwrap();
        let head = index.head.clone().unwrap();
        assert_eq!(index.entries.get("msg-1"), Some(&head));

        let chunk: NamespaceChunk = get_json(&store, &head, DEFAULT_FETCH_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(chunk.links.len(), 1);
        assert!(chunk.prev.is_none());

        let body: MessageBody = get_json(&store, &chunk.links[0].cid, DEFAULT_FETCH_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(body.txt, "hello");
    }

    #[tokio::test]
    async fn test_second_send_repoints_all_entries() {
        let store = MemoryContentStore::new();
        let roots = MemoryRootRegistry::new();
        let (m, me) = messenger(&store, &roots);
        let recipient = addr(9);

        m.send_message(&recipient, "one", false).await.unwrap();
        let profile_before = m.profile_of(&me).await.unwrap();
        let index_before: NamespaceIndex = get_json(
            &store,
            profile_before.namespace_for(&recipient).unwrap(),
            DEFAULT_FETCH_TIMEOUT,
        )
        .await
        .unwrap();
        let head_before = index_before.head.unwrap();

        let link2 = m.send_message(&recipient, "two", false).await.unwrap();
        assert_eq!(link2.name, "msg-2");

        let profile = m.profile_of(&me).await.unwrap();
        let index: NamespaceIndex = get_json(
            &store,
            profile.namespace_for(&recipient).unwrap(),
            DEFAULT_FETCH_TIMEOUT,
        )
        .await
        .unwrap();
        let head = index.head.clone().unwrap();

        // Appending changed the chunk's content, hence its id
        assert_ne!(head, head_before);
        // Both entries point at the new chunk
        assert_eq!(index.entries.get("msg-1"), Some(&head));
        assert_eq!(index.entries.get("msg-2"), Some(&head));

        let chunk: NamespaceChunk = get_json(&store, &head, DEFAULT_FETCH_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(chunk.links.len(), 2);
        assert!(chunk.prev.is_none());
    }

    #[tokio::test]
    async fn test_clear_history_publishes_empty_profile() {
        let store = MemoryContentStore::new();
        let roots = MemoryRootRegistry::new();
        let (m, me) = messenger(&store, &roots);

        m.send_message(&addr(9), "hello", false).await.unwrap();
        m.clear_history().await.unwrap();

        let profile = m.profile_of(&me).await.unwrap();
        assert!(profile.namespaces.is_empty());
    }

    #[tokio::test]
    async fn test_next_message_name_fresh_namespace() {
        let store = MemoryContentStore::new();
        let roots = MemoryRootRegistry::new();
        let (m, _) = messenger(&store, &roots);
        assert_eq!(m.next_message_name(&addr(9)).await, "msg-1");
    }
}
