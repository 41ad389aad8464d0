//! Message authentication
//!
//! Builds the canonical signable payload for a message link, dispatches
//! signing across the two supported signer kinds, and verifies signatures
//! through a fixed sequence of methods so links remain checkable regardless
//! of which wallet stack produced them.

mod payload;
mod signer;
mod verify;

pub use payload::{
    account_message_digest, address_of, domain_separator, keccak256, prefixed_message_hash,
    SignablePayload, SIGNING_CHAIN_ID,
};
pub use signer::{
    ContractAccountSigner, ContractValidator, KeypairSigner, LinkSigner, OwnerKeyValidator,
    SignerKind,
};
pub use verify::{recover_address, SignatureEngine};
