//! Conversation assembly: messages and their grouping
//!
//! A [`Message`] is a display-ready record assembled from a signed link and
//! its fetched body. [`group_by_counterparty`] folds a flat message list
//! into per-counterparty [`ConversationGroup`]s ordered by recency.
//!
//! Ordering always uses `signedAt`; chunk position and `msg-<n>` names are
//! never used for display order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::document::MessageLink;
use crate::types::Address;

/// A message assembled from a link and its body, ready for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Body text (decrypted when possible; ciphertext otherwise)
    pub txt: String,
    /// Who sent the message
    pub sender: Address,
    /// The other side of the conversation
    pub conversation_with: Address,
    /// The signed link this message was assembled from
    pub link: MessageLink,
    /// Whether any verification method accepted the link's signature
    pub is_verified: bool,
}

impl Message {
    /// Signing timestamp (unix seconds); the display ordering key
    pub fn signed_at(&self) -> i64 {
        self.link.signed_at
    }

    /// Whether `viewer` sent this message
    pub fn is_mine(&self, viewer: &Address) -> bool {
        self.sender == *viewer
    }

    /// The counterparty from `viewer`'s perspective
    pub fn counterparty_for(&self, viewer: &Address) -> Address {
        if self.sender == *viewer {
            self.conversation_with
        } else {
            self.sender
        }
    }
}

/// All messages exchanged with one counterparty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationGroup {
    /// The counterparty address
    pub counterparty: Address,
    /// Messages, newest first
    pub messages: Vec<Message>,
    /// The most recent message (head of `messages`)
    pub last_message: Message,
}

/// Sort messages chronologically, oldest first (conversation view order).
pub fn sort_messages(messages: &mut [Message]) {
    messages.sort_by_key(|m| m.signed_at());
}

/// Filter a flat message list down to one conversation.
pub fn conversation_with<'a>(
    messages: &'a [Message],
    counterparty: &Address,
    viewer: &Address,
) -> Vec<&'a Message> {
    messages
        .iter()
        .filter(|m| m.counterparty_for(viewer) == *counterparty)
        .collect()
}

/// Group messages by conversation counterparty.
///
/// Within each group messages are sorted by `signedAt` descending and
/// `last_message` is the newest; groups themselves are ordered by their
/// `last_message.signedAt` descending.
pub fn group_by_counterparty(messages: Vec<Message>, viewer: &Address) -> Vec<ConversationGroup> {
    let mut grouped: BTreeMap<Address, Vec<Message>> = BTreeMap::new();
    for message in messages {
        let counterparty = message.counterparty_for(viewer);
        grouped.entry(counterparty).or_default().push(message);
    }

    let mut groups: Vec<ConversationGroup> = grouped
        .into_iter()
        .map(|(counterparty, mut msgs)| {
            msgs.sort_by(|a, b| b.signed_at().cmp(&a.signed_at()));
            let last_message = msgs[0].clone();
            ConversationGroup {
                counterparty,
                messages: msgs,
                last_message,
            }
        })
        .collect();

    groups.sort_by(|a, b| b.last_message.signed_at().cmp(&a.last_message.signed_at()));
    groups
}
