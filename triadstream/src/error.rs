use thiserror::Error;
use triadtrust::TriadTrustError;

/// All errors produced by the TriadStream actor layer.
#[derive(Debug, Error)]
pub enum TriadStreamError {
    #[error("listener is closed")]
    ListenerClosed,

    #[error("listener dropped the session handshake before admitting it")]
    HandshakeRefused,

    #[error("session channel is closed")]
    ChannelClosed,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    FrameTooShort { expected: usize, actual: usize },

    #[error("envelope payload of {size} bytes exceeds the {max} byte frame limit")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("unknown signal tag: 0x{0:02x}")]
    UnknownSignal(u8),

    #[error("protocol error: {0}")]
    Protocol(#[from] TriadTrustError),
}

pub type Result<T> = std::result::Result<T, TriadStreamError>;
