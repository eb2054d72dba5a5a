// Per-role handshake state machines.

use crate::crypto::keys::{Challenge, Nonce, SessionKey};
use crate::identity::Identity;

/// Client side of one run.
#[derive(Debug)]
pub enum ClientState {
    /// No request sent yet.
    Idle,

    /// Request sent, waiting for the Server's reply.
    RequestSent {
        /// Nonce sealed in our ticket; the grant must echo it.
        nonce: Nonce,
        /// Challenge sent in cleartext.
        challenge: Challenge,
    },

    /// The grant echoed our nonce; the session key is established.
    Accepted { session_key: SessionKey },

    /// The run failed; no further transitions.
    Rejected,
}

impl ClientState {
    /// Human-readable label for the current state (used in error messages).
    pub fn label(&self) -> &'static str {
        match self {
            ClientState::Idle => "Idle",
            ClientState::RequestSent { .. } => "RequestSent",
            ClientState::Accepted { .. } => "Accepted",
            ClientState::Rejected => "Rejected",
        }
    }
}

/// Server side of one run, as executed by a session worker.
#[derive(Debug)]
pub enum ServerState {
    /// Waiting for the Client's request.
    AwaitClientMessage,

    /// Request forwarded to the Trusted Server, waiting for its reply.
    AwaitTrustedReply {
        /// Nonce sealed in the Server's ticket.
        nonce: Nonce,
        /// Challenge from the Client's request.
        challenge: Challenge,
        client_id: Identity,
    },

    /// Reply relayed to the Client; the session key is established.
    Responded {
        client_id: Identity,
        session_key: SessionKey,
    },

    /// The run failed; no further transitions.
    Rejected,
}

impl ServerState {
    pub fn label(&self) -> &'static str {
        match self {
            ServerState::AwaitClientMessage => "AwaitClientMessage",
            ServerState::AwaitTrustedReply { .. } => "AwaitTrustedReply",
            ServerState::Responded { .. } => "Responded",
            ServerState::Rejected => "Rejected",
        }
    }
}

/// Trusted Server side of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustedState {
    AwaitRequest,
    Granted,
    Rejected,
}

impl TrustedState {
    pub fn label(&self) -> &'static str {
        match self {
            TrustedState::AwaitRequest => "AwaitRequest",
            TrustedState::Granted => "Granted",
            TrustedState::Rejected => "Rejected",
        }
    }
}
