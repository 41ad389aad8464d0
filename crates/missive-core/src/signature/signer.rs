//! Signer boundary: key-pair and contract-account signing
//!
//! Two signer kinds produce link signatures:
//!
//! - [`KeypairSigner`] signs the typed-data digest directly with its
//!   secp256k1 key (falling back to prefixed raw-message signing when typed
//!   data is unavailable, as some wallet stacks are).
//! - [`ContractAccountSigner`] wraps the digest in an account-scoped record
//!   and has an owner key sign that; validity is later decided by the
//!   account's own validation entry point.
//!
//! The on-chain side of contract validation is behind [`ContractValidator`];
//! [`OwnerKeyValidator`] is an in-process stand-in for tests and offline use.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use k256::ecdsa::SigningKey;
use parking_lot::RwLock;
use zeroize::Zeroize;

use crate::error::{MissiveError, MissiveResult};
use crate::types::Address;

use super::payload::{account_message_digest, address_of, SignablePayload};
use super::verify::recover_address;

/// The two supported signer kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignerKind {
    /// Plain key-pair wallet; signature is ECDSA over the payload digest
    Keypair,
    /// Contract-based account; signature bytes are validated by the account
    ContractAccount,
}

/// Produces signature bytes for a signable payload.
#[async_trait]
pub trait LinkSigner: Send + Sync {
    /// Address claimed as `signerAddress` on links this signer produces
    fn address(&self) -> Address;

    /// Which signing path this signer takes
    fn kind(&self) -> SignerKind;

    /// Sign the payload, returning raw signature bytes
    async fn sign(&self, payload: &SignablePayload) -> MissiveResult<Vec<u8>>;
}

/// Validates contract-account signatures.
///
/// Externally realized as a call to the account contract's
/// signature-validation entry point; any error reads as invalid.
#[async_trait]
pub trait ContractValidator: Send + Sync {
    /// Whether `signature` is valid for `digest` according to `account`
    async fn is_valid_signature(
        &self,
        account: &Address,
        digest: [u8; 32],
        signature: &[u8],
    ) -> bool;
}

/// Plain secp256k1 key-pair signer.
pub struct KeypairSigner {
    signing_key: SigningKey,
    address: Address,
    /// Whether the typed-data path is available; when not, the prefixed
    /// raw-message fallback is used (recoverable by the third verification
    /// method)
    typed_data: bool,
}

impl KeypairSigner {
    /// Generate a signer with a random key.
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::random(&mut rand::thread_rng()))
    }

    /// Create a signer from raw secret key bytes.
    pub fn from_secret_bytes(bytes: [u8; 32]) -> MissiveResult<Self> {
        let key = SigningKey::from_bytes((&bytes).into())
            .map_err(|_| MissiveError::Signing("invalid secret key".to_string()))?;
        Ok(Self::from_signing_key(key))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let address = address_of(signing_key.verifying_key());
        Self {
            signing_key,
            address,
            typed_data: true,
        }
    }

    /// Disable the typed-data path, forcing the raw-message fallback.
    pub fn without_typed_data(mut self) -> Self {
        self.typed_data = false;
        self
    }

    /// Secret key bytes, for persisting the identity
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes().into()
    }

    /// Sign an arbitrary 32-byte digest, returning 65 bytes `r || s || v`.
    pub(crate) fn sign_digest(&self, digest: &[u8; 32]) -> MissiveResult<Vec<u8>> {
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(digest)
            .map_err(|e| MissiveError::Signing(e.to_string()))?;

        let mut bytes = Vec::with_capacity(65);
        bytes.extend_from_slice(&signature.to_bytes());
        bytes.push(27 + recovery_id.to_byte());
        Ok(bytes)
    }
}

impl Drop for KeypairSigner {
    fn drop(&mut self) {
        let mut bytes: [u8; 32] = self.signing_key.to_bytes().into();
        bytes.zeroize();
    }
}

impl std::fmt::Debug for KeypairSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeypairSigner")
            .field("address", &self.address)
            .field("typed_data", &self.typed_data)
            .finish()
    }
}

#[async_trait]
impl LinkSigner for KeypairSigner {
    fn address(&self) -> Address {
        self.address
    }

    fn kind(&self) -> SignerKind {
        SignerKind::Keypair
    }

    async fn sign(&self, payload: &SignablePayload) -> MissiveResult<Vec<u8>> {
        let digest = if self.typed_data {
            payload.typed_data_digest()
        } else {
            payload.raw_message_digest()
        };
        self.sign_digest(&digest)
    }
}

/// Contract-account signer: an owner key signing account-scoped wrappers.
///
/// Links carry the account address as `signerAddress`; the signature bytes
/// are the owner's signature over the account-scoped wrapper digest and are
/// only accepted by contract validation, not by direct recovery.
pub struct ContractAccountSigner {
    account: Address,
    owner: KeypairSigner,
}

impl ContractAccountSigner {
    /// Create a signer for `account` whose signatures are produced by `owner`.
    pub fn new(account: Address, owner: KeypairSigner) -> Self {
        Self { account, owner }
    }

    /// Address of the owner key
    pub fn owner_address(&self) -> Address {
        self.owner.address()
    }
}

impl std::fmt::Debug for ContractAccountSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractAccountSigner")
            .field("account", &self.account)
            .field("owner", &self.owner.address())
            .finish()
    }
}

#[async_trait]
impl LinkSigner for ContractAccountSigner {
    fn address(&self) -> Address {
        self.account
    }

    fn kind(&self) -> SignerKind {
        SignerKind::ContractAccount
    }

    async fn sign(&self, payload: &SignablePayload) -> MissiveResult<Vec<u8>> {
        let inner = payload.typed_data_digest();
        let wrapped = account_message_digest(&self.account, &inner);
        self.owner.sign_digest(&wrapped)
    }
}

/// In-process contract validation stand-in.
///
/// Knows which owner key controls which account and accepts a signature iff
/// it recovers to that owner over the account-scoped wrapper digest - the
/// same decision the account contract's validation entry point would make.
#[derive(Debug, Clone, Default)]
pub struct OwnerKeyValidator {
    owners: Arc<RwLock<HashMap<Address, Address>>>,
}

impl OwnerKeyValidator {
    /// Create an empty validator
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `owner` as the controlling key of `account`
    pub fn register(&self, account: Address, owner: Address) {
        self.owners.write().insert(account, owner);
    }
}

#[async_trait]
impl ContractValidator for OwnerKeyValidator {
    async fn is_valid_signature(
        &self,
        account: &Address,
        digest: [u8; 32],
        signature: &[u8],
    ) -> bool {
        let Some(owner) = self.owners.read().get(account).copied() else {
            return false;
        };
        let wrapped = account_message_digest(account, &digest);
        recover_address(&wrapped, signature) == Some(owner)
    }
}
