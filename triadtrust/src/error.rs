// TriadTrust error types

use thiserror::Error;

use crate::handshake::messages::Leg;

/// The three ways a protocol leg can fail.
///
/// Every fault is local to the leg that detects it; actors collapse all of
/// them into a single outward `ERROR` signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// A message or block carried the wrong number of fields.
    MalformedMessage,
    /// An asserted identity or echoed nonce/challenge did not match.
    IdentityMismatch,
    /// A sealed block did not open under the expected key.
    DecryptionFailure,
}

/// Top-level error type for the TriadTrust crate.
#[derive(Debug, Error)]
pub enum TriadTrustError {
    // ── Protocol faults ─────────────────────────────────────────────────
    #[error("malformed {leg} message: expected {expected} fields, got {actual}")]
    MalformedMessage {
        leg: Leg,
        expected: usize,
        actual: usize,
    },

    #[error("identity mismatch: {0}")]
    IdentityMismatch(String),

    #[error("unknown identity: {0}")]
    UnknownIdentity(String),

    #[error("nonce echo does not match the nonce issued for this run")]
    NonceMismatch,

    #[error("challenge echo does not match the challenge of this run")]
    ChallengeMismatch,

    #[error("sealed block failed to open: {0}")]
    DecryptionFailure(String),

    // ── Crypto errors ───────────────────────────────────────────────────
    #[error("AEAD encryption failed: {0}")]
    Encryption(String),

    #[error("invalid key material: {0}")]
    InvalidKey(String),

    // ── Encoding ────────────────────────────────────────────────────────
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("unknown protocol leg: {0}")]
    UnknownLeg(String),

    // ── State machine ───────────────────────────────────────────────────
    #[error("invalid protocol state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },
}

impl TriadTrustError {
    /// Classify this error into the protocol fault taxonomy.
    ///
    /// Local crypto and state-machine errors have no outward meaning of their
    /// own; they are reported as malformed input to the run that hit them.
    pub fn kind(&self) -> FaultKind {
        match self {
            TriadTrustError::IdentityMismatch(_)
            | TriadTrustError::UnknownIdentity(_)
            | TriadTrustError::NonceMismatch
            | TriadTrustError::ChallengeMismatch => FaultKind::IdentityMismatch,
            TriadTrustError::DecryptionFailure(_) | TriadTrustError::InvalidKey(_) => {
                FaultKind::DecryptionFailure
            }
            TriadTrustError::MalformedMessage { .. }
            | TriadTrustError::Encryption(_)
            | TriadTrustError::Serialization(_)
            | TriadTrustError::UnknownLeg(_)
            | TriadTrustError::InvalidStateTransition { .. } => FaultKind::MalformedMessage,
        }
    }
}

/// Crate-level result alias.
pub type Result<T> = std::result::Result<T, TriadTrustError>;
