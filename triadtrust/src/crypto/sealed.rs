// Sealed blocks: a fixed-arity field tuple serialized structurally, then
// encrypted with the cipher capability.
//
// Plaintext is the JSON array of the tuple's fields, so a field containing any
// byte sequence cannot be confused with a field boundary.

use std::fmt;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::crypto::keys::LongTermKey;
use crate::crypto::Cipher;
use crate::error::{Result, TriadTrustError};

/// An ordered field tuple with a fixed number of fields.
///
/// Implementors serialize as a sequence of exactly `ARITY` elements.
pub trait FieldTuple: Serialize + DeserializeOwned {
    const ARITY: usize;
}

/// Ciphertext over a [`FieldTuple`], opaque to everyone without the key.
#[derive(Clone, PartialEq, Eq)]
pub struct SealedBlock(Bytes);

impl SealedBlock {
    /// Serialize `fields` and encrypt them under `key`.
    pub fn seal<T: FieldTuple>(cipher: &dyn Cipher, key: &LongTermKey, fields: &T) -> Result<Self> {
        let plaintext =
            serde_json::to_vec(fields).map_err(|e| TriadTrustError::Serialization(format!("{e}")))?;
        let ciphertext = cipher.encrypt(key, &plaintext)?;
        Ok(Self(Bytes::from(ciphertext)))
    }

    /// Decrypt under `key` and split into exactly `T::ARITY` fields.
    ///
    /// Any failure, including a wrong field count, is a
    /// [`TriadTrustError::DecryptionFailure`].
    pub fn open<T: FieldTuple>(&self, cipher: &dyn Cipher, key: &LongTermKey) -> Result<T> {
        let plaintext = cipher.decrypt(key, &self.0)?;
        let fields: Vec<Value> = serde_json::from_slice(&plaintext)
            .map_err(|e| TriadTrustError::DecryptionFailure(format!("plaintext is not a field tuple: {e}")))?;
        if fields.len() != T::ARITY {
            return Err(TriadTrustError::DecryptionFailure(format!(
                "expected {} fields, got {}",
                T::ARITY,
                fields.len()
            )));
        }
        serde_json::from_value(Value::Array(fields))
            .map_err(|e| TriadTrustError::DecryptionFailure(format!("field decode: {e}")))
    }

    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SealedBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SealedBlock({} bytes)", self.0.len())
    }
}

impl Serialize for SealedBlock {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for SealedBlock {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s)
            .map(|raw| Self(Bytes::from(raw)))
            .map_err(|e| serde::de::Error::custom(format!("sealed block must be hex encoded: {e}")))
    }
}
