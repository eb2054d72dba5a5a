// Crypto module declarations and the cipher capability boundary.

pub mod aead;
pub mod keys;
pub mod sealed;

use crate::crypto::keys::{LongTermKey, FRESH_LEN, KEY_LEN};
use crate::error::Result;

/// Opaque symmetric cipher plus fresh-randomness source.
///
/// The protocol engines only ever reach cryptography through this trait.
/// Implementations must fail with [`TriadTrustError::DecryptionFailure`] when
/// a ciphertext does not open under the given key; that fails the run, never
/// the process.
///
/// [`TriadTrustError::DecryptionFailure`]: crate::error::TriadTrustError::DecryptionFailure
pub trait Cipher: Send + Sync {
    fn encrypt(&self, key: &LongTermKey, plaintext: &[u8]) -> Result<Vec<u8>>;

    fn decrypt(&self, key: &LongTermKey, ciphertext: &[u8]) -> Result<Vec<u8>>;

    /// Unpredictable value used for both nonces and random challenges.
    fn fresh_value(&self) -> [u8; FRESH_LEN];

    /// Fresh session key material.
    fn fresh_key(&self) -> [u8; KEY_LEN];
}
