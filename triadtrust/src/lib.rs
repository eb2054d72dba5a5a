// TriadTrust: three-party nonce-based key establishment
//
// Crate root: module declarations and public re-exports.

pub mod crypto;
pub mod error;
pub mod handshake;
pub mod identity;

// Re-export key types at crate root for convenience.
pub use crypto::aead::{AeadCipher, CipherSuite};
pub use crypto::keys::{Challenge, LongTermKey, Nonce, SessionKey};
pub use crypto::sealed::SealedBlock;
pub use crypto::Cipher;
pub use error::{FaultKind, Result, TriadTrustError};
pub use handshake::messages::{Envelope, Leg, LegMessage};
pub use handshake::protocol::{ClientRun, ServerRun};
pub use handshake::trusted::{KeyRegistry, TrustedRun};
pub use identity::Identity;
