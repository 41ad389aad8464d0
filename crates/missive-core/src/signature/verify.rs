//! Multi-method signature verification
//!
//! Verification does not know what kind of wallet produced a signature, so
//! it tries every accepted method in a fixed order until one succeeds:
//!
//! 1. Contract-account validation via the claimed signer's validation entry
//!    point (when a validator is configured)
//! 2. ECDSA recovery over the typed-data digest
//! 3. ECDSA recovery over the prefixed raw-message digest (legacy signers)
//!
//! The order is load-bearing for backward compatibility; all three are tried
//! unconditionally rather than dispatching on a known signer kind. A link
//! that fails all three is unverified, never an error.

use std::sync::Arc;

use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use tracing::debug;

use crate::document::MessageLink;
use crate::types::Address;

use super::payload::{address_of, SignablePayload};
use super::signer::ContractValidator;

/// Recover the signer address from a 65-byte `r || s || v` signature over a
/// 32-byte prehash. Returns `None` for malformed signatures or failed
/// recovery.
pub fn recover_address(prehash: &[u8; 32], signature: &[u8]) -> Option<Address> {
    if signature.len() != 65 {
        return None;
    }

    let v = signature[64];
    let recovery_byte = if v >= 27 { v - 27 } else { v };
    let recovery_id = RecoveryId::from_byte(recovery_byte)?;

    let sig = Signature::from_slice(&signature[..64]).ok()?;
    let key = VerifyingKey::recover_from_prehash(prehash, &sig, recovery_id).ok()?;
    Some(address_of(&key))
}

/// Verification engine over all accepted signature methods.
#[derive(Clone, Default)]
pub struct SignatureEngine {
    validator: Option<Arc<dyn ContractValidator>>,
}

impl SignatureEngine {
    /// Engine without contract validation: methods 2 and 3 only, method 1
    /// reported as failed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine with a contract validator for method 1.
    pub fn with_validator(validator: Arc<dyn ContractValidator>) -> Self {
        Self {
            validator: Some(validator),
        }
    }

    /// Verify a link's signature against its claimed signer address.
    pub async fn verify_link(&self, link: &MessageLink) -> bool {
        let signature = match decode_signature(&link.signature) {
            Some(bytes) => bytes,
            None => {
                debug!(cid = %link.cid, "Link has no decodable signature");
                return false;
            }
        };

        let payload = SignablePayload::from_link(link);
        let claimed = link.signer_address;
        let digest = payload.typed_data_digest();

        // Method 1: contract-account validation
        if let Some(validator) = &self.validator {
            if validator
                .is_valid_signature(&claimed, digest, &signature)
                .await
            {
                debug!(cid = %link.cid, "Verified via contract validation");
                return true;
            }
        }

        // Method 2: typed-data recovery
        if recover_address(&digest, &signature) == Some(claimed) {
            debug!(cid = %link.cid, "Verified via typed-data recovery");
            return true;
        }

        // Method 3: raw-message recovery
        if recover_address(&payload.raw_message_digest(), &signature) == Some(claimed) {
            debug!(cid = %link.cid, "Verified via raw-message recovery");
            return true;
        }

        debug!(cid = %link.cid, signer = %claimed, "All verification methods failed");
        false
    }
}

impl std::fmt::Debug for SignatureEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureEngine")
            .field("has_validator", &self.validator.is_some())
            .finish()
    }
}

fn decode_signature(hex_str: &str) -> Option<Vec<u8>> {
    if hex_str.is_empty() {
        return None;
    }
    let stripped = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    hex::decode(stripped).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::signer::{
        ContractAccountSigner, KeypairSigner, LinkSigner, OwnerKeyValidator,
    };
    use crate::signature::SIGNING_CHAIN_ID;
    use crate::types::ContentId;

    async fn signed_link(signer: &dyn LinkSigner) -> MessageLink {
        let mut link = MessageLink {
            name: "msg-1".to_string(),
            cid: ContentId::new("QmBody"),
            encrypted: false,
            encryption_algorithm: None,
            encryption_key_fingerprint: None,
            chain_id: SIGNING_CHAIN_ID,
            signer_address: signer.address(),
            signed_at: 1_700_000_000,
            nonce: "0x0".to_string(),
            signature: String::new(),
        };
        let payload = SignablePayload::from_link(&link);
        let sig = signer.sign(&payload).await.unwrap();
        link.signature = format!("0x{}", hex::encode(sig));
        link
    }

    #[tokio::test]
    async fn test_keypair_link_verifies() {
        let signer = KeypairSigner::generate();
        let link = signed_link(&signer).await;

        let engine = SignatureEngine::new();
        assert!(engine.verify_link(&link).await);
    }

    #[tokio::test]
    async fn test_fallback_link_verifies_via_third_method() {
        let signer = KeypairSigner::generate().without_typed_data();
        let link = signed_link(&signer).await;

        let engine = SignatureEngine::new();
        assert!(engine.verify_link(&link).await);
    }

    #[tokio::test]
    async fn test_contract_link_needs_validator() {
        let owner = KeypairSigner::generate();
        let owner_address = owner.address();
        let account: Address = "0x00000000000000000000000000000000000000ee"
            .parse()
            .unwrap();
        let signer = ContractAccountSigner::new(account, owner);
        let link = signed_link(&signer).await;

        // Without a validator the owner signature recovers to the owner,
        // not the account, so methods 2 and 3 both miss
        assert!(!SignatureEngine::new().verify_link(&link).await);

        let validator = OwnerKeyValidator::new();
        validator.register(account, owner_address);
        let engine = SignatureEngine::with_validator(Arc::new(validator));
        assert!(engine.verify_link(&link).await);
    }

    #[tokio::test]
    async fn test_flipped_byte_fails_all_methods() {
        let signer = KeypairSigner::generate();
        let mut link = signed_link(&signer).await;

        // Flip one byte in the middle of the signature
        let mut bytes = hex::decode(link.signature.trim_start_matches("0x")).unwrap();
        bytes[10] ^= 0xFF;
        link.signature = format!("0x{}", hex::encode(bytes));

        let validator = OwnerKeyValidator::new();
        let engine = SignatureEngine::with_validator(Arc::new(validator));
        assert!(!engine.verify_link(&link).await);
    }

    #[tokio::test]
    async fn test_tampered_payload_fails() {
        let signer = KeypairSigner::generate();
        let mut link = signed_link(&signer).await;
        link.signed_at += 1;

        assert!(!SignatureEngine::new().verify_link(&link).await);
    }

    #[tokio::test]
    async fn test_empty_signature_fails() {
        let signer = KeypairSigner::generate();
        let mut link = signed_link(&signer).await;
        link.signature = String::new();

        assert!(!SignatureEngine::new().verify_link(&link).await);
    }

    #[test]
    fn test_recover_rejects_malformed() {
        let digest = [7u8; 32];
        assert!(recover_address(&digest, &[]).is_none());
        assert!(recover_address(&digest, &[0u8; 64]).is_none());
        // 65 zero bytes: invalid scalar
        assert!(recover_address(&digest, &[0u8; 65]).is_none());
    }
}
