//! AES-256-GCM cipher for stored provider keys
//!
//! Ciphertext layout is `base64(nonce || ciphertext || tag)` with a fresh
//! random 12-byte nonce per encryption.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::RngCore;

use crate::domain::byok::SecretCipher;
use crate::domain::DomainError;

const KEY_SIZE: usize = 32;
const NONCE_SIZE: usize = 12;

pub struct AesGcmSecretCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for AesGcmSecretCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesGcmSecretCipher")
            .field("master_key", &"[hidden]")
            .finish()
    }
}

impl AesGcmSecretCipher {
    /// Create a cipher from a raw 32-byte master key
    pub fn new(master_key: &[u8]) -> Result<Self, DomainError> {
        if master_key.len() != KEY_SIZE {
            return Err(DomainError::configuration(format!(
                "Master key must be {} bytes, got {}",
                KEY_SIZE,
                master_key.len()
            )));
        }

        let cipher = Aes256Gcm::new_from_slice(master_key).map_err(|e| {
            DomainError::configuration(format!("Invalid master key length: {:?}", e))
        })?;

        Ok(Self { cipher })
    }

    /// Create a cipher from a base64-encoded master key (as found in configuration)
    pub fn from_base64_key(encoded: &str) -> Result<Self, DomainError> {
        let master_key = STANDARD.decode(encoded.trim()).map_err(|e| {
            DomainError::configuration(format!("Master key is not valid base64: {}", e))
        })?;

        Self::new(&master_key)
    }

    /// Generate a random master key, base64-encoded
    pub fn generate_master_key() -> String {
        let mut key = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut key);
        STANDARD.encode(key)
    }
}

impl SecretCipher for AesGcmSecretCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String, DomainError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| DomainError::encryption(format!("Failed to encrypt key: {:?}", e)))?;

        let mut output = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        output.extend_from_slice(&nonce_bytes);
        output.extend_from_slice(&ciphertext);

        Ok(STANDARD.encode(output))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String, DomainError> {
        let payload = STANDARD
            .decode(ciphertext.trim())
            .map_err(|e| DomainError::decryption(format!("Ciphertext is not valid base64: {}", e)))?;

        if payload.len() <= NONCE_SIZE {
            return Err(DomainError::decryption("Ciphertext is too short"));
        }

        let (nonce_bytes, sealed) = payload.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), sealed)
            .map_err(|_| DomainError::decryption("Authentication failed"))?;

        String::from_utf8(plaintext)
            .map_err(|_| DomainError::decryption("Decrypted key is not valid UTF-8"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> AesGcmSecretCipher {
        AesGcmSecretCipher::new(&[0xAB; 32]).unwrap()
    }

    #[test]
    fn test_encrypt_then_decrypt() {
        let cipher = cipher();
        let sealed = cipher.encrypt("sk-live-123").unwrap();

        assert_ne!(sealed, "sk-live-123");
        assert_eq!(cipher.decrypt(&sealed).unwrap(), "sk-live-123");
    }

    #[test]
    fn test_wrong_key_size() {
        let err = AesGcmSecretCipher::new(&[0u8; 31]).unwrap_err();
        assert!(err.to_string().contains("32"));

        assert!(AesGcmSecretCipher::new(&[0u8; 33]).is_err());
    }

    #[test]
    fn test_from_base64_key() {
        let encoded = AesGcmSecretCipher::generate_master_key();
        let cipher = AesGcmSecretCipher::from_base64_key(&encoded).unwrap();
        let sealed = cipher.encrypt("secret").unwrap();
        assert_eq!(cipher.decrypt(&sealed).unwrap(), "secret");

        assert!(AesGcmSecretCipher::from_base64_key("not base64!").is_err());
        assert!(AesGcmSecretCipher::from_base64_key(&STANDARD.encode([1u8; 16])).is_err());
    }

    #[test]
    fn test_tampered_ciphertext_rejected() {
        let cipher = cipher();
        let sealed = cipher.encrypt("sensitive").unwrap();

        let mut bytes = STANDARD.decode(&sealed).unwrap();
        bytes[NONCE_SIZE + 1] ^= 0xFF;
        let tampered = STANDARD.encode(bytes);

        let err = cipher.decrypt(&tampered).unwrap_err();
        assert!(matches!(err, DomainError::Decryption { .. }));
    }

    #[test]
    fn test_malformed_input_rejected() {
        let cipher = cipher();

        assert!(matches!(
            cipher.decrypt("%%%").unwrap_err(),
            DomainError::Decryption { .. }
        ));
        assert!(matches!(
            cipher.decrypt(&STANDARD.encode([0u8; 8])).unwrap_err(),
            DomainError::Decryption { .. }
        ));
    }

    #[test]
    fn test_different_master_key_fails() {
        let sealed = cipher().encrypt("secret").unwrap();
        let other = AesGcmSecretCipher::new(&[0x11; 32]).unwrap();

        assert!(other.decrypt(&sealed).is_err());
    }

    #[test]
    fn test_nonce_uniqueness() {
        let cipher = cipher();
        let a = cipher.encrypt("same").unwrap();
        let b = cipher.encrypt("same").unwrap();

        assert_ne!(a, b);
    }

    #[test]
    fn test_debug_hides_key() {
        let debug = format!("{:?}", cipher());
        assert!(debug.contains("[hidden]"));
    }
}
