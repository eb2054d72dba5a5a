// Long-term keys, session keys and per-run fresh values.

use std::fmt;

use hkdf::Hkdf;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Result, TriadTrustError};
use crate::identity::Identity;

/// Length of every symmetric key handled by the protocol.
pub const KEY_LEN: usize = 32;

/// Length of nonces and random challenges.
pub const FRESH_LEN: usize = 16;

const LONG_TERM_SALT: &[u8] = b"triad long-term key v1";

/// Secret shared between one party and the Trusted Server.
///
/// Never serialized and never logged; use [`LongTermKey::fingerprint`] to
/// refer to it in diagnostics.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct LongTermKey([u8; KEY_LEN]);

impl LongTermKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Derive a key from a passphrase, bound to the owner's identity.
    ///
    /// ```text
    /// key = HKDF-SHA256(salt="triad long-term key v1", ikm=passphrase, info=identity)
    /// ```
    pub fn derive(passphrase: &[u8], owner: &Identity) -> Result<Self> {
        let hk = Hkdf::<Sha256>::new(Some(LONG_TERM_SALT), passphrase);
        let mut okm = [0u8; KEY_LEN];
        hk.expand(owner.as_bytes(), &mut okm)
            .map_err(|e| TriadTrustError::InvalidKey(format!("HKDF expand error: {e}")))?;
        Ok(Self(okm))
    }

    /// Parse a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self> {
        let mut bytes = [0u8; KEY_LEN];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| TriadTrustError::InvalidKey(format!("expected 64 hex characters: {e}")))?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Short BLAKE3 fingerprint, safe to log.
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.0)
    }
}

impl fmt::Debug for LongTermKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LongTermKey({})", self.fingerprint())
    }
}

/// Fresh symmetric key minted by the Trusted Server for one run.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; KEY_LEN]);

impl SessionKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    pub fn fingerprint(&self) -> String {
        fingerprint(&self.0)
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionKey({})", self.fingerprint())
    }
}

impl Serialize for SessionKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for SessionKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let mut bytes = [0u8; KEY_LEN];
        hex::decode_to_slice(&s, &mut bytes)
            .map_err(|e| serde::de::Error::custom(format!("session key must be 64 hex characters: {e}")))?;
        Ok(Self(bytes))
    }
}

macro_rules! fresh_value {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name([u8; FRESH_LEN]);

        impl $name {
            pub fn from_bytes(bytes: [u8; FRESH_LEN]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; FRESH_LEN] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&hex::encode(&self.0))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(&hex::encode(&self.0))
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                let mut bytes = [0u8; FRESH_LEN];
                hex::decode_to_slice(&s, &mut bytes).map_err(|e| {
                    serde::de::Error::custom(format!(concat!(stringify!($name), " must be 32 hex characters: {}"), e))
                })?;
                Ok(Self(bytes))
            }
        }
    };
}

fresh_value!(
    /// Single-use value generated by the party that will later verify its echo.
    Nonce
);

fresh_value!(
    /// Cleartext per-run value echoed in the immediate reply.
    Challenge
);

fn fingerprint(bytes: &[u8]) -> String {
    let digest = blake3::hash(bytes);
    hex::encode(&digest.as_bytes()[..8])
}
