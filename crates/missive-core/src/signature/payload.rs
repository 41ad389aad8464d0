//! Canonical signable payload and its hashing
//!
//! Every message link is authenticated over a structured typed-data record
//! under a fixed signing domain. The encoding follows the EIP-712 scheme:
//! a type hash, 32-byte-padded field encodings (strings hashed first), a
//! domain separator, and the final `0x19 0x01` digest. The legacy fallback
//! path signs the same digest again as a prefixed raw message.

use k256::ecdsa::VerifyingKey;
use sha3::{Digest, Keccak256};

use crate::document::MessageLink;
use crate::types::{Address, ContentId};

/// Chain id of the fixed signing domain
pub const SIGNING_CHAIN_ID: u64 = 100;

/// Type string of the message record
const MESSAGE_TYPE: &str = "MissiveMessage(string name,string cid,bool encrypted,\
string encryptionAlgorithm,string encryptionKeyFingerprint,uint256 chainId,\
address signerAddress,uint256 signedAt,string nonce)";

/// Type string of the signing domain (chain id only)
const DOMAIN_TYPE: &str = "EIP712Domain(uint256 chainId)";

/// Domain type used for account-scoped message wrappers
const ACCOUNT_DOMAIN_TYPE: &str = "EIP712Domain(uint256 chainId,address verifyingContract)";

/// Type string of the account-scoped wrapper record
const ACCOUNT_MESSAGE_TYPE: &str = "AccountMessage(bytes message)";

/// Keccak-256 hash
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Derive the account address from a recovered/known public key:
/// keccak of the uncompressed point (without the 0x04 prefix), last 20 bytes.
pub fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash[12..]);
    Address::from_bytes(bytes)
}

fn encode_u256(value: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

fn encode_bool(value: bool) -> [u8; 32] {
    encode_u256(u64::from(value))
}

fn encode_address(address: &Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_bytes());
    word
}

/// The structured record a link signature commits to.
///
/// Reconstructable from any [`MessageLink`], so verification does not depend
/// on state beyond the link itself. Optional link fields are canonicalized
/// to empty strings; the signer address is lowercased by the [`Address`]
/// type itself.
#[derive(Debug, Clone, PartialEq)]
pub struct SignablePayload {
    pub name: String,
    pub cid: ContentId,
    pub encrypted: bool,
    pub encryption_algorithm: String,
    pub encryption_key_fingerprint: String,
    pub chain_id: u64,
    pub signer_address: Address,
    pub signed_at: i64,
    pub nonce: String,
}

impl SignablePayload {
    /// Reconstruct the payload a link's signature should have committed to.
    pub fn from_link(link: &MessageLink) -> Self {
        Self {
            name: link.name.clone(),
            cid: link.cid.clone(),
            encrypted: link.encrypted,
            encryption_algorithm: link.encryption_algorithm.clone().unwrap_or_default(),
            encryption_key_fingerprint: link
                .encryption_key_fingerprint
                .clone()
                .unwrap_or_default(),
            chain_id: link.chain_id,
            signer_address: link.signer_address,
            signed_at: link.signed_at,
            nonce: if link.nonce.is_empty() {
                "0x0".to_string()
            } else {
                link.nonce.clone()
            },
        }
    }

    /// EIP-712 struct hash of this record
    pub fn struct_hash(&self) -> [u8; 32] {
        let mut encoded = Vec::with_capacity(32 * 10);
        encoded.extend_from_slice(&keccak256(MESSAGE_TYPE.as_bytes()));
        encoded.extend_from_slice(&keccak256(self.name.as_bytes()));
        encoded.extend_from_slice(&keccak256(self.cid.as_str().as_bytes()));
        encoded.extend_from_slice(&encode_bool(self.encrypted));
        encoded.extend_from_slice(&keccak256(self.encryption_algorithm.as_bytes()));
        encoded.extend_from_slice(&keccak256(self.encryption_key_fingerprint.as_bytes()));
        encoded.extend_from_slice(&encode_u256(self.chain_id));
        encoded.extend_from_slice(&encode_address(&self.signer_address));
        encoded.extend_from_slice(&encode_u256(self.signed_at.max(0) as u64));
        encoded.extend_from_slice(&keccak256(self.nonce.as_bytes()));
        keccak256(&encoded)
    }

    /// Final typed-data digest: `keccak(0x19 0x01 || domain || structHash)`
    pub fn typed_data_digest(&self) -> [u8; 32] {
        let mut data = Vec::with_capacity(2 + 32 + 32);
        data.extend_from_slice(&[0x19, 0x01]);
        data.extend_from_slice(&domain_separator());
        data.extend_from_slice(&self.struct_hash());
        keccak256(&data)
    }

    /// Digest of the typed-data digest signed as a prefixed raw message.
    ///
    /// Used by signers without typed-data support, and as the third
    /// verification method.
    pub fn raw_message_digest(&self) -> [u8; 32] {
        prefixed_message_hash(&self.typed_data_digest())
    }
}

/// Separator of the fixed signing domain (`chainId = 100`)
pub fn domain_separator() -> [u8; 32] {
    let mut encoded = Vec::with_capacity(64);
    encoded.extend_from_slice(&keccak256(DOMAIN_TYPE.as_bytes()));
    encoded.extend_from_slice(&encode_u256(SIGNING_CHAIN_ID));
    keccak256(&encoded)
}

/// Hash of a 32-byte message under the standard signed-message prefix
pub fn prefixed_message_hash(message: &[u8; 32]) -> [u8; 32] {
    let mut data = Vec::with_capacity(28 + 32);
    data.extend_from_slice(b"\x19Ethereum Signed Message:\n32");
    data.extend_from_slice(message);
    keccak256(&data)
}

/// Digest a contract account's owners actually sign: the inner digest
/// wrapped in an account-scoped record under a domain bound to the account
/// address. Mirrors the message-wrapper scheme of multi-owner account
/// contracts, so their on-chain validation entry point accepts the result.
pub fn account_message_digest(account: &Address, inner: &[u8; 32]) -> [u8; 32] {
    let mut domain = Vec::with_capacity(96);
    domain.extend_from_slice(&keccak256(ACCOUNT_DOMAIN_TYPE.as_bytes()));
    domain.extend_from_slice(&encode_u256(SIGNING_CHAIN_ID));
    domain.extend_from_slice(&encode_address(account));
    let domain_hash = keccak256(&domain);

    let mut record = Vec::with_capacity(64);
    record.extend_from_slice(&keccak256(ACCOUNT_MESSAGE_TYPE.as_bytes()));
    record.extend_from_slice(&keccak256(inner));
    let record_hash = keccak256(&record);

    let mut data = Vec::with_capacity(2 + 32 + 32);
    data.extend_from_slice(&[0x19, 0x01]);
    data.extend_from_slice(&domain_hash);
    data.extend_from_slice(&record_hash);
    keccak256(&data)
}
