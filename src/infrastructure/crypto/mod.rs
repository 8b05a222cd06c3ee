//! Encryption of stored secrets

mod aes;

pub use aes::AesGcmSecretCipher;
