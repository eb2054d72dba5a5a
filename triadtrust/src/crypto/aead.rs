// AEAD implementation of the cipher capability: ChaCha20-Poly1305 (RFC 8439)
// and AES-256-GCM.
//
// Ciphertext layout produced by `AeadCipher`:
//   [nonce:12B][ciphertext][tag:16B]

// Both aes-gcm and chacha20poly1305 re-export the same `aead` traits.
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce as AesNonce};
use chacha20poly1305::{ChaCha20Poly1305, Nonce as ChaChaNonce};
use serde::{Deserialize, Serialize};

use crate::crypto::keys::{LongTermKey, FRESH_LEN, KEY_LEN};
use crate::crypto::Cipher;
use crate::error::{Result, TriadTrustError};

/// AEAD nonce length shared by both suites.
pub const AEAD_NONCE_LEN: usize = 12;

/// Authentication tag length shared by both suites.
pub const AEAD_TAG_LEN: usize = 16;

/// Associated data bound to every sealed block.
const BLOCK_AAD: &[u8] = b"triad sealed block v1";

/// Cipher suite identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CipherSuite {
    /// AES-256-GCM, suite ID 0x0001.
    Aes256Gcm,
    /// ChaCha20-Poly1305, suite ID 0x0002.
    #[default]
    ChaCha20Poly1305,
}

impl CipherSuite {
    /// Numeric suite ID, used when a transport needs to announce the suite.
    pub fn wire_id(self) -> u16 {
        match self {
            CipherSuite::Aes256Gcm => 0x0001,
            CipherSuite::ChaCha20Poly1305 => 0x0002,
        }
    }

    pub fn from_wire_id(id: u16) -> Option<Self> {
        match id {
            0x0001 => Some(CipherSuite::Aes256Gcm),
            0x0002 => Some(CipherSuite::ChaCha20Poly1305),
            _ => None,
        }
    }
}

/// Randomized AEAD cipher keyed per call by a party's long-term key.
///
/// A fresh 12-byte AEAD nonce is drawn for every encryption and prepended to
/// the output, so the same key may seal any number of blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct AeadCipher {
    suite: CipherSuite,
}

impl AeadCipher {
    pub fn new(suite: CipherSuite) -> Self {
        Self { suite }
    }

    pub fn suite(&self) -> CipherSuite {
        self.suite
    }

    fn seal_with(&self, key: &[u8; KEY_LEN], nonce: &[u8; AEAD_NONCE_LEN], msg: &[u8]) -> Result<Vec<u8>> {
        let payload = Payload { msg, aad: BLOCK_AAD };
        match self.suite {
            CipherSuite::ChaCha20Poly1305 => ChaCha20Poly1305::new_from_slice(key)
                .map_err(|e| TriadTrustError::Encryption(format!("cipher init: {e}")))?
                .encrypt(ChaChaNonce::from_slice(nonce), payload)
                .map_err(|e| TriadTrustError::Encryption(format!("{e}"))),
            CipherSuite::Aes256Gcm => Aes256Gcm::new_from_slice(key)
                .map_err(|e| TriadTrustError::Encryption(format!("aes-gcm init: {e}")))?
                .encrypt(AesNonce::from_slice(nonce), payload)
                .map_err(|e| TriadTrustError::Encryption(format!("{e}"))),
        }
    }

    fn open_with(&self, key: &[u8; KEY_LEN], nonce: &[u8], msg: &[u8]) -> Result<Vec<u8>> {
        let payload = Payload { msg, aad: BLOCK_AAD };
        match self.suite {
            CipherSuite::ChaCha20Poly1305 => ChaCha20Poly1305::new_from_slice(key)
                .map_err(|e| TriadTrustError::DecryptionFailure(format!("cipher init: {e}")))?
                .decrypt(ChaChaNonce::from_slice(nonce), payload)
                .map_err(|e| TriadTrustError::DecryptionFailure(format!("{e}"))),
            CipherSuite::Aes256Gcm => Aes256Gcm::new_from_slice(key)
                .map_err(|e| TriadTrustError::DecryptionFailure(format!("aes-gcm init: {e}")))?
                .decrypt(AesNonce::from_slice(nonce), payload)
                .map_err(|e| TriadTrustError::DecryptionFailure(format!("{e}"))),
        }
    }
}

impl Cipher for AeadCipher {
    fn encrypt(&self, key: &LongTermKey, plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce: [u8; AEAD_NONCE_LEN] = rand::random();
        let sealed = self.seal_with(key.as_bytes(), &nonce, plaintext)?;
        let mut out = Vec::with_capacity(AEAD_NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    fn decrypt(&self, key: &LongTermKey, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.len() < AEAD_NONCE_LEN + AEAD_TAG_LEN {
            return Err(TriadTrustError::DecryptionFailure(format!(
                "ciphertext too short: {} bytes",
                ciphertext.len()
            )));
        }
        let (nonce, body) = ciphertext.split_at(AEAD_NONCE_LEN);
        self.open_with(key.as_bytes(), nonce, body)
    }

    fn fresh_value(&self) -> [u8; FRESH_LEN] {
        rand::random()
    }

    fn fresh_key(&self) -> [u8; KEY_LEN] {
        rand::random()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(b: u8) -> LongTermKey {
        LongTermKey::from_bytes([b; KEY_LEN])
    }

    #[test]
    fn chacha_roundtrip() {
        let cipher = AeadCipher::new(CipherSuite::ChaCha20Poly1305);
        let ct = cipher.encrypt(&key(0x42), b"hello triad").unwrap();
        assert_eq!(ct.len(), AEAD_NONCE_LEN + 11 + AEAD_TAG_LEN);
        assert_eq!(cipher.decrypt(&key(0x42), &ct).unwrap(), b"hello triad");
    }

    #[test]
    fn aes_gcm_roundtrip() {
        let cipher = AeadCipher::new(CipherSuite::Aes256Gcm);
        let ct = cipher.encrypt(&key(0x99), b"aes gcm secret").unwrap();
        assert_eq!(cipher.decrypt(&key(0x99), &ct).unwrap(), b"aes gcm secret");
    }

    #[test]
    fn repeated_encryption_is_randomized() {
        let cipher = AeadCipher::default();
        let a = cipher.encrypt(&key(1), b"same").unwrap();
        let b = cipher.encrypt(&key(1), b"same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_fails() {
        let cipher = AeadCipher::default();
        let ct = cipher.encrypt(&key(0x11), b"secret").unwrap();
        let err = cipher.decrypt(&key(0x22), &ct).unwrap_err();
        assert!(matches!(err, TriadTrustError::DecryptionFailure(_)));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let cipher = AeadCipher::new(CipherSuite::Aes256Gcm);
        let mut ct = cipher.encrypt(&key(0xBB), b"data").unwrap();
        ct[AEAD_NONCE_LEN] ^= 0xFF;
        assert!(cipher.decrypt(&key(0xBB), &ct).is_err());
    }

    #[test]
    fn truncated_ciphertext_fails() {
        let cipher = AeadCipher::default();
        assert!(cipher.decrypt(&key(0xBB), &[0u8; 20]).is_err());
    }

    #[test]
    fn suites_do_not_interoperate() {
        let chacha = AeadCipher::new(CipherSuite::ChaCha20Poly1305);
        let aes = AeadCipher::new(CipherSuite::Aes256Gcm);
        let ct = chacha.encrypt(&key(7), b"msg").unwrap();
        assert!(aes.decrypt(&key(7), &ct).is_err());
    }

    #[test]
    fn cipher_suite_wire_ids() {
        assert_eq!(CipherSuite::Aes256Gcm.wire_id(), 0x0001);
        assert_eq!(CipherSuite::ChaCha20Poly1305.wire_id(), 0x0002);
        assert_eq!(CipherSuite::from_wire_id(0x0001), Some(CipherSuite::Aes256Gcm));
        assert_eq!(CipherSuite::from_wire_id(0x9999), None);
    }

    #[test]
    fn fresh_values_differ() {
        let cipher = AeadCipher::default();
        assert_ne!(cipher.fresh_value(), cipher.fresh_value());
        assert_ne!(cipher.fresh_key(), cipher.fresh_key());
    }
}
