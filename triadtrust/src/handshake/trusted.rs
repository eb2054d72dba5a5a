// Trusted Server half of the Triad handshake.

use std::collections::HashMap;
use std::sync::Arc;

use crate::crypto::keys::{LongTermKey, SessionKey};
use crate::crypto::sealed::SealedBlock;
use crate::crypto::Cipher;
use crate::error::{Result, TriadTrustError};
use crate::handshake::messages::{
    Envelope, KeyGrant, LegMessage, RequestTicket, TrustedReply, TrustedRequest,
};
use crate::handshake::state::TrustedState;
use crate::identity::Identity;

/// Long-term keys of every party the Trusted Server vouches for.
#[derive(Debug, Default, Clone)]
pub struct KeyRegistry {
    keys: HashMap<Identity, LongTermKey>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the key bound to `id`.
    pub fn insert(&mut self, id: Identity, key: LongTermKey) -> Option<LongTermKey> {
        self.keys.insert(id, key)
    }

    pub fn get(&self, id: &Identity) -> Option<&LongTermKey> {
        self.keys.get(id)
    }

    pub fn contains(&self, id: &Identity) -> bool {
        self.keys.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn key_for(&self, id: &Identity) -> Result<&LongTermKey> {
        self.get(id)
            .ok_or_else(|| TriadTrustError::UnknownIdentity(id.to_string()))
    }
}

impl FromIterator<(Identity, LongTermKey)> for KeyRegistry {
    fn from_iter<I: IntoIterator<Item = (Identity, LongTermKey)>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().collect(),
        }
    }
}

/// One Trusted Server run: open both tickets, mint a session key, grant it to
/// each party under that party's own key and nonce.
pub struct TrustedRun {
    cipher: Arc<dyn Cipher>,
    state: TrustedState,
}

impl TrustedRun {
    pub fn new(cipher: Arc<dyn Cipher>) -> Self {
        Self {
            cipher,
            state: TrustedState::AwaitRequest,
        }
    }

    pub fn process_request(&mut self, registry: &KeyRegistry, envelope: Envelope) -> Result<TrustedReply> {
        if self.state != TrustedState::AwaitRequest {
            return Err(TriadTrustError::InvalidStateTransition {
                from: self.state.label().into(),
                to: "Granted".into(),
            });
        }
        self.state = TrustedState::Rejected;

        let request = TrustedRequest::from_envelope(envelope)?;
        let client_key = registry.key_for(&request.client_id)?;
        let server_key = registry.key_for(&request.server_id)?;

        let client_ticket: RequestTicket = request.client_ticket.open(self.cipher.as_ref(), client_key)?;
        check_ticket(&client_ticket, &request, "client")?;
        let server_ticket: RequestTicket = request.server_ticket.open(self.cipher.as_ref(), server_key)?;
        check_ticket(&server_ticket, &request, "server")?;

        let session_key = SessionKey::from_bytes(self.cipher.fresh_key());
        let client_grant = SealedBlock::seal(
            self.cipher.as_ref(),
            client_key,
            &KeyGrant {
                nonce: client_ticket.nonce,
                session_key: session_key.clone(),
            },
        )?;
        let server_grant = SealedBlock::seal(
            self.cipher.as_ref(),
            server_key,
            &KeyGrant {
                nonce: server_ticket.nonce,
                session_key,
            },
        )?;

        self.state = TrustedState::Granted;
        Ok(TrustedReply {
            challenge: request.challenge,
            client_grant,
            server_grant,
        })
    }

    pub fn state(&self) -> TrustedState {
        self.state
    }
}

/// A sealed ticket must restate the cleartext it travelled with.
fn check_ticket(ticket: &RequestTicket, request: &TrustedRequest, whose: &str) -> Result<()> {
    if ticket.challenge != request.challenge {
        return Err(TriadTrustError::ChallengeMismatch);
    }
    if ticket.client_id != request.client_id || ticket.server_id != request.server_id {
        return Err(TriadTrustError::IdentityMismatch(format!(
            "{whose} ticket names {} -> {}, envelope names {} -> {}",
            ticket.client_id, ticket.server_id, request.client_id, request.server_id
        )));
    }
    Ok(())
}
