// Client and Server halves of the Triad handshake, as sans-IO engines.
//
//   Client                          Server                      TrustedServer
//     | create_request               |                               |
//     |--- ClientRequest ----------->| process_client_request        |
//     |                              |--- TrustedRequest ----------->|
//     |                              |<-- TrustedReply --------------|
//     |                              | process_trusted_reply         |
//     |<-- ServerReply --------------|                               |
//     | process_reply                |                               |
//
// Each engine executes exactly one run. Any failure moves it to `Rejected`
// and it accepts no further input.

use std::sync::Arc;

use crate::crypto::keys::{Challenge, LongTermKey, Nonce, SessionKey};
use crate::crypto::sealed::SealedBlock;
use crate::crypto::Cipher;
use crate::error::{Result, TriadTrustError};
use crate::handshake::messages::{
    ClientRequest, Envelope, KeyGrant, LegMessage, RequestTicket, ServerReply, TrustedReply,
    TrustedRequest,
};
use crate::handshake::state::{ClientState, ServerState};
use crate::identity::Identity;

// ── Client ───────────────────────────────────────────────────────────────

/// Client-side (initiator) of one run.
pub struct ClientRun {
    client_id: Identity,
    server_id: Identity,
    key: LongTermKey,
    cipher: Arc<dyn Cipher>,
    verify_challenge: bool,
    state: ClientState,
}

impl ClientRun {
    /// Create a run from `client_id` towards the server named `server_id`.
    pub fn new(
        client_id: Identity,
        server_id: Identity,
        key: LongTermKey,
        cipher: Arc<dyn Cipher>,
    ) -> Self {
        Self {
            client_id,
            server_id,
            key,
            cipher,
            verify_challenge: false,
            state: ClientState::Idle,
        }
    }

    /// Also require the reply to echo the challenge we sent.
    ///
    /// Off by default: acceptance rests on the nonce inside the grant alone.
    pub fn with_challenge_check(mut self, enabled: bool) -> Self {
        self.verify_challenge = enabled;
        self
    }

    /// Step 1: mint a challenge and nonce and build the request for the Server.
    pub fn create_request(&mut self) -> Result<ClientRequest> {
        if !matches!(self.state, ClientState::Idle) {
            return Err(TriadTrustError::InvalidStateTransition {
                from: self.state.label().into(),
                to: "RequestSent".into(),
            });
        }

        let challenge = Challenge::from_bytes(self.cipher.fresh_value());
        let nonce = Nonce::from_bytes(self.cipher.fresh_value());
        let ticket = RequestTicket {
            nonce,
            challenge,
            client_id: self.client_id.clone(),
            server_id: self.server_id.clone(),
        };
        let client_ticket = SealedBlock::seal(self.cipher.as_ref(), &self.key, &ticket)?;

        self.state = ClientState::RequestSent { nonce, challenge };

        Ok(ClientRequest {
            challenge,
            client_id: self.client_id.clone(),
            server_id: self.server_id.clone(),
            client_ticket,
        })
    }

    /// Step 2: open the grant in the Server's reply and check our nonce.
    pub fn process_reply(&mut self, envelope: Envelope) -> Result<&SessionKey> {
        let (nonce, challenge) = match &self.state {
            ClientState::RequestSent { nonce, challenge } => (*nonce, *challenge),
            _ => {
                return Err(TriadTrustError::InvalidStateTransition {
                    from: self.state.label().into(),
                    to: "Accepted".into(),
                });
            }
        };

        match self.open_reply(envelope, nonce, challenge) {
            Ok(session_key) => {
                self.state = ClientState::Accepted { session_key };
                self.session_key()
                    .ok_or_else(|| TriadTrustError::InvalidStateTransition {
                        from: "RequestSent".into(),
                        to: "Accepted".into(),
                    })
            }
            Err(e) => {
                self.state = ClientState::Rejected;
                Err(e)
            }
        }
    }

    fn open_reply(&self, envelope: Envelope, nonce: Nonce, challenge: Challenge) -> Result<SessionKey> {
        let reply = ServerReply::from_envelope(envelope)?;
        if self.verify_challenge && reply.challenge != challenge {
            return Err(TriadTrustError::ChallengeMismatch);
        }
        let grant: KeyGrant = reply.client_grant.open(self.cipher.as_ref(), &self.key)?;
        if grant.nonce != nonce {
            return Err(TriadTrustError::NonceMismatch);
        }
        Ok(grant.session_key)
    }

    /// Mark the run failed, e.g. after the Server answered with an error signal.
    pub fn reject(&mut self) {
        self.state = ClientState::Rejected;
    }

    /// The established session key, once accepted.
    pub fn session_key(&self) -> Option<&SessionKey> {
        match &self.state {
            ClientState::Accepted { session_key } => Some(session_key),
            _ => None,
        }
    }

    pub fn state(&self) -> &ClientState {
        &self.state
    }

    pub fn client_id(&self) -> &Identity {
        &self.client_id
    }

    pub fn server_id(&self) -> &Identity {
        &self.server_id
    }
}

// ── Server ───────────────────────────────────────────────────────────────

/// Server-side half of one run: validates the Client's request, asks the
/// Trusted Server for a key and relays the Client's grant.
pub struct ServerRun {
    server_id: Identity,
    key: LongTermKey,
    cipher: Arc<dyn Cipher>,
    state: ServerState,
}

impl ServerRun {
    pub fn new(server_id: Identity, key: LongTermKey, cipher: Arc<dyn Cipher>) -> Self {
        Self {
            server_id,
            key,
            cipher,
            state: ServerState::AwaitClientMessage,
        }
    }

    /// Validate the Client's request and build the request for the Trusted
    /// Server.
    ///
    /// A request naming another server is rejected here, before any Trusted
    /// Server contact.
    pub fn process_client_request(&mut self, envelope: Envelope) -> Result<TrustedRequest> {
        if !matches!(self.state, ServerState::AwaitClientMessage) {
            return Err(TriadTrustError::InvalidStateTransition {
                from: self.state.label().into(),
                to: "AwaitTrustedReply".into(),
            });
        }
        self.state = ServerState::Rejected;

        let request = ClientRequest::from_envelope(envelope)?;
        if request.server_id != self.server_id {
            return Err(TriadTrustError::IdentityMismatch(format!(
                "request targets server {:?}, this is {:?}",
                request.server_id.as_str(),
                self.server_id.as_str()
            )));
        }

        let nonce = Nonce::from_bytes(self.cipher.fresh_value());
        let ticket = RequestTicket {
            nonce,
            challenge: request.challenge,
            client_id: request.client_id.clone(),
            server_id: request.server_id.clone(),
        };
        let server_ticket = SealedBlock::seal(self.cipher.as_ref(), &self.key, &ticket)?;

        self.state = ServerState::AwaitTrustedReply {
            nonce,
            challenge: request.challenge,
            client_id: request.client_id.clone(),
        };
        Ok(TrustedRequest::from_client(request, server_ticket))
    }

    /// Validate the Trusted Server's reply and build the reply for the Client.
    pub fn process_trusted_reply(&mut self, envelope: Envelope) -> Result<ServerReply> {
        let (nonce, challenge, client_id) = match std::mem::replace(&mut self.state, ServerState::Rejected) {
            ServerState::AwaitTrustedReply {
                nonce,
                challenge,
                client_id,
            } => (nonce, challenge, client_id),
            other => {
                let from = other.label();
                self.state = other;
                return Err(TriadTrustError::InvalidStateTransition {
                    from: from.into(),
                    to: "Responded".into(),
                });
            }
        };

        let reply = TrustedReply::from_envelope(envelope)?;
        if reply.challenge != challenge {
            return Err(TriadTrustError::ChallengeMismatch);
        }
        let grant: KeyGrant = reply.server_grant.open(self.cipher.as_ref(), &self.key)?;
        if grant.nonce != nonce {
            return Err(TriadTrustError::NonceMismatch);
        }

        self.state = ServerState::Responded {
            client_id,
            session_key: grant.session_key,
        };
        Ok(ServerReply {
            challenge: reply.challenge,
            client_grant: reply.client_grant,
        })
    }

    pub fn session_key(&self) -> Option<&SessionKey> {
        match &self.state {
            ServerState::Responded { session_key, .. } => Some(session_key),
            _ => None,
        }
    }

    /// The Client this run was established with, once responded.
    pub fn peer(&self) -> Option<&Identity> {
        match &self.state {
            ServerState::Responded { client_id, .. } => Some(client_id),
            _ => None,
        }
    }

    pub fn state(&self) -> &ServerState {
        &self.state
    }

    pub fn server_id(&self) -> &Identity {
        &self.server_id
    }
}
