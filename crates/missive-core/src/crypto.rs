//! Message body encryption using AES-256-GCM
//!
//! Encryption is end-to-end and optional per message: the link records the
//! cipher tag and a fingerprint of the key so readers know which key to try.
//! Key agreement/exchange is the caller's concern; the protocol only carries
//! the ciphertext.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::{MissiveError, MissiveResult};

/// Cipher tag recorded on encrypted links
pub const ENCRYPTION_ALGORITHM: &str = "AES-256-GCM";

/// Nonce size for AES-256-GCM (12 bytes)
const NONCE_SIZE: usize = 12;

/// Symmetric encryption for message bodies.
///
/// # Wire Format
///
/// `base64( [nonce (12 bytes)] + [ciphertext + auth_tag (16 bytes)] )`
///
/// A random nonce is generated per encryption, so identical plaintexts
/// produce different wire forms.
pub struct BodyCrypto {
    cipher: Aes256Gcm,
    fingerprint: String,
}

impl BodyCrypto {
    /// Create an instance from a 32-byte symmetric key.
    pub fn new(key: &[u8; 32]) -> Self {
        let fingerprint = key_fingerprint(key);
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
            fingerprint,
        }
    }

    /// Generate a new random 32-byte key.
    pub fn generate_key() -> [u8; 32] {
        let mut key = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut key);
        key
    }

    /// Fingerprint of this instance's key, recorded on links so readers can
    /// match ciphertexts to keys without revealing the key.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Encrypt message text to its base64 wire form.
    pub fn encrypt_text(&self, plaintext: &str) -> MissiveResult<String> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| MissiveError::Crypto(format!("Encryption failed: {}", e)))?;

        let mut wire = nonce_bytes.to_vec();
        wire.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(wire))
    }

    /// Decrypt a base64 wire form back to message text.
    ///
    /// Fails on wrong key, tampered data, or malformed input.
    pub fn decrypt_text(&self, wire: &str) -> MissiveResult<String> {
        let bytes = BASE64
            .decode(wire)
            .map_err(|e| MissiveError::Crypto(format!("Invalid base64: {}", e)))?;

        if bytes.len() < NONCE_SIZE {
            return Err(MissiveError::Crypto(
                "Data too short to contain nonce".to_string(),
            ));
        }

        let nonce = Nonce::from_slice(&bytes[..NONCE_SIZE]);
        let plaintext = self
            .cipher
            .decrypt(nonce, &bytes[NONCE_SIZE..])
            .map_err(|e| MissiveError::Crypto(format!("Decryption failed: {}", e)))?;

        String::from_utf8(plaintext)
            .map_err(|e| MissiveError::Crypto(format!("Decrypted text not UTF-8: {}", e)))
    }
}

impl std::fmt::Debug for BodyCrypto {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BodyCrypto")
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}

/// Key fingerprint: hex of the first 8 bytes of SHA-256 of the key.
pub fn key_fingerprint(key: &[u8; 32]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key);
    let digest = hasher.finalize();
    hex::encode(&digest[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = BodyCrypto::generate_key();
        let crypto = BodyCrypto::new(&key);

        let wire = crypto.encrypt_text("a private hello").unwrap();
        assert_ne!(wire, "a private hello");
        assert_eq!(crypto.decrypt_text(&wire).unwrap(), "a private hello");
    }

    #[test]
    fn test_same_plaintext_different_wire() {
        let key = BodyCrypto::generate_key();
        let crypto = BodyCrypto::new(&key);

        let a = crypto.encrypt_text("hello").unwrap();
        let b = crypto.encrypt_text("hello").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_fails() {
        let crypto_a = BodyCrypto::new(&BodyCrypto::generate_key());
        let crypto_b = BodyCrypto::new(&BodyCrypto::generate_key());

        let wire = crypto_a.encrypt_text("secret").unwrap();
        assert!(crypto_b.decrypt_text(&wire).is_err());
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = BodyCrypto::generate_key();
        let crypto = BodyCrypto::new(&key);

        let wire = crypto.encrypt_text("secret").unwrap();
        let mut bytes = BASE64.decode(&wire).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        let tampered = BASE64.encode(bytes);

        assert!(crypto.decrypt_text(&tampered).is_err());
    }

    #[test]
    fn test_fingerprint_stable_per_key() {
        let key = BodyCrypto::generate_key();
        let a = BodyCrypto::new(&key);
        let b = BodyCrypto::new(&key);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 16);

        let other = BodyCrypto::new(&BodyCrypto::generate_key());
        assert_ne!(a.fingerprint(), other.fingerprint());
    }

    #[test]
    fn test_malformed_wire_fails() {
        let crypto = BodyCrypto::new(&BodyCrypto::generate_key());
        assert!(crypto.decrypt_text("not base64 at all!!!").is_err());
        assert!(crypto.decrypt_text("AAAA").is_err());
    }
}
