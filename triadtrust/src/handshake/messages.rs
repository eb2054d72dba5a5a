// Messages exchanged on the three legs of the Triad handshake.
//
//   Client                 Server                 TrustedServer
//     |-- ClientRequest (4) ->|                          |
//     |                       |-- TrustedRequest (5) --->|
//     |                       |<-- TrustedReply (3) -----|
//     |<-- ServerReply (2) ---|                          |
//
// Field order is load-bearing: every message serializes as a sequence in the
// order its fields are declared.

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

use crate::crypto::keys::{Challenge, Nonce, SessionKey};
use crate::crypto::sealed::{FieldTuple, SealedBlock};
use crate::error::{Result, TriadTrustError};
use crate::identity::Identity;

/// Serialize a named-field struct as a tuple of its fields, in order.
macro_rules! serialize_as_tuple {
    ($ty:ident, $arity:expr, { $($field:ident),+ }) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                ($(&self.$field,)+).serialize(serializer)
            }
        }

        impl FieldTuple for $ty {
            const ARITY: usize = $arity;
        }
    };
}

/// The protocol leg a message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Leg {
    /// Client -> Server.
    ClientRequest,
    /// Server -> TrustedServer.
    TrustedRequest,
    /// TrustedServer -> Server.
    TrustedReply,
    /// Server -> Client.
    ServerReply,
}

impl Leg {
    /// Fixed number of fields a message on this leg carries.
    pub fn arity(self) -> usize {
        match self {
            Leg::ClientRequest => ClientRequest::ARITY,
            Leg::TrustedRequest => TrustedRequest::ARITY,
            Leg::TrustedReply => TrustedReply::ARITY,
            Leg::ServerReply => ServerReply::ARITY,
        }
    }

    /// Wire name of the leg.
    pub fn name(self) -> &'static str {
        match self {
            Leg::ClientRequest => "client_request",
            Leg::TrustedRequest => "trusted_request",
            Leg::TrustedReply => "trusted_reply",
            Leg::ServerReply => "server_reply",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "client_request" => Ok(Leg::ClientRequest),
            "trusted_request" => Ok(Leg::TrustedRequest),
            "trusted_reply" => Ok(Leg::TrustedReply),
            "server_reply" => Ok(Leg::ServerReply),
            other => Err(TriadTrustError::UnknownLeg(other.to_owned())),
        }
    }
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Sealed block contents ────────────────────────────────────────────────

/// Plaintext of the block a Client or Server seals for the Trusted Server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RequestTicket {
    pub nonce: Nonce,
    pub challenge: Challenge,
    pub client_id: Identity,
    pub server_id: Identity,
}

serialize_as_tuple!(RequestTicket, 4, { nonce, challenge, client_id, server_id });

/// Plaintext of the block the Trusted Server seals for one party.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KeyGrant {
    /// The nonce the receiving party put in its own ticket.
    pub nonce: Nonce,
    pub session_key: SessionKey,
}

serialize_as_tuple!(KeyGrant, 2, { nonce, session_key });

// ── Leg messages ─────────────────────────────────────────────────────────

/// Client -> Server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientRequest {
    pub challenge: Challenge,
    pub client_id: Identity,
    pub server_id: Identity,
    /// `RequestTicket` sealed under the Client's long-term key.
    pub client_ticket: SealedBlock,
}

serialize_as_tuple!(ClientRequest, 4, { challenge, client_id, server_id, client_ticket });

/// Server -> TrustedServer: the Client's request plus the Server's own ticket.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TrustedRequest {
    pub challenge: Challenge,
    pub client_id: Identity,
    pub server_id: Identity,
    pub client_ticket: SealedBlock,
    /// `RequestTicket` sealed under the Server's long-term key.
    pub server_ticket: SealedBlock,
}

serialize_as_tuple!(TrustedRequest, 5, { challenge, client_id, server_id, client_ticket, server_ticket });

impl TrustedRequest {
    pub fn from_client(request: ClientRequest, server_ticket: SealedBlock) -> Self {
        Self {
            challenge: request.challenge,
            client_id: request.client_id,
            server_id: request.server_id,
            client_ticket: request.client_ticket,
            server_ticket,
        }
    }
}

/// TrustedServer -> Server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TrustedReply {
    pub challenge: Challenge,
    /// `KeyGrant` sealed under the Client's long-term key.
    pub client_grant: SealedBlock,
    /// `KeyGrant` sealed under the Server's long-term key.
    pub server_grant: SealedBlock,
}

serialize_as_tuple!(TrustedReply, 3, { challenge, client_grant, server_grant });

/// Server -> Client: the Trusted reply with the server-only grant stripped.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerReply {
    pub challenge: Challenge,
    pub client_grant: SealedBlock,
}

serialize_as_tuple!(ServerReply, 2, { challenge, client_grant });

// ── Envelope ─────────────────────────────────────────────────────────────

/// A message on any leg, as carried by a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    ClientRequest(ClientRequest),
    TrustedRequest(TrustedRequest),
    TrustedReply(TrustedReply),
    ServerReply(ServerReply),
}

impl Envelope {
    pub fn leg(&self) -> Leg {
        match self {
            Envelope::ClientRequest(_) => Leg::ClientRequest,
            Envelope::TrustedRequest(_) => Leg::TrustedRequest,
            Envelope::TrustedReply(_) => Leg::TrustedReply,
            Envelope::ServerReply(_) => Leg::ServerReply,
        }
    }

    /// Number of fields this envelope carries.
    pub fn arity(&self) -> usize {
        self.leg().arity()
    }
}

/// A message type bound to exactly one leg.
pub trait LegMessage: FieldTuple + Sized {
    const LEG: Leg;

    fn into_envelope(self) -> Envelope;

    fn try_from_envelope(envelope: Envelope) -> std::result::Result<Self, Envelope>;

    /// Unpack an envelope expected on this leg.
    ///
    /// An envelope from any other leg has the wrong field count for this one
    /// and is rejected as malformed.
    fn from_envelope(envelope: Envelope) -> Result<Self> {
        Self::try_from_envelope(envelope).map_err(|other| TriadTrustError::MalformedMessage {
            leg: Self::LEG,
            expected: Self::ARITY,
            actual: other.arity(),
        })
    }
}

macro_rules! leg_message {
    ($ty:ident) => {
        impl LegMessage for $ty {
            const LEG: Leg = Leg::$ty;

            fn into_envelope(self) -> Envelope {
                Envelope::$ty(self)
            }

            fn try_from_envelope(envelope: Envelope) -> std::result::Result<Self, Envelope> {
                match envelope {
                    Envelope::$ty(msg) => Ok(msg),
                    other => Err(other),
                }
            }
        }

        impl From<$ty> for Envelope {
            fn from(msg: $ty) -> Self {
                msg.into_envelope()
            }
        }
    };
}

leg_message!(ClientRequest);
leg_message!(TrustedRequest);
leg_message!(TrustedReply);
leg_message!(ServerReply);

#[cfg(test)]
mod tests {
    use super::*;

    fn block(b: u8) -> SealedBlock {
        SealedBlock::from_bytes(vec![b; 4])
    }

    #[test]
    fn leg_arities_match_wire_table() {
        assert_eq!(Leg::ClientRequest.arity(), 4);
        assert_eq!(Leg::TrustedRequest.arity(), 5);
        assert_eq!(Leg::TrustedReply.arity(), 3);
        assert_eq!(Leg::ServerReply.arity(), 2);
    }

    #[test]
    fn request_ticket_serializes_in_field_order() {
        let ticket = RequestTicket {
            nonce: Nonce::from_bytes([1; 16]),
            challenge: Challenge::from_bytes([2; 16]),
            client_id: Identity::new("c1"),
            server_id: Identity::new("s1"),
        };
        let value = serde_json::to_value(&ticket).unwrap();
        let fields = value.as_array().unwrap();
        assert_eq!(fields.len(), 4);
        assert_eq!(fields[0], "01".repeat(16));
        assert_eq!(fields[1], "02".repeat(16));
        assert_eq!(fields[2], "c1");
        assert_eq!(fields[3], "s1");
    }

    #[test]
    fn wrong_leg_is_malformed() {
        let reply = ServerReply {
            challenge: Challenge::from_bytes([0; 16]),
            client_grant: block(1),
        };
        let err = ClientRequest::from_envelope(reply.into()).unwrap_err();
        match err {
            TriadTrustError::MalformedMessage { leg, expected, actual } => {
                assert_eq!(leg, Leg::ClientRequest);
                assert_eq!(expected, 4);
                assert_eq!(actual, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn trusted_request_extends_client_request() {
        let request = ClientRequest {
            challenge: Challenge::from_bytes([3; 16]),
            client_id: Identity::new("c1"),
            server_id: Identity::new("s1"),
            client_ticket: block(7),
        };
        let forwarded = TrustedRequest::from_client(request.clone(), block(9));
        assert_eq!(forwarded.challenge, request.challenge);
        assert_eq!(forwarded.client_ticket, request.client_ticket);
        assert_eq!(forwarded.server_ticket, block(9));
    }

    #[test]
    fn leg_names_roundtrip() {
        for leg in [Leg::ClientRequest, Leg::TrustedRequest, Leg::TrustedReply, Leg::ServerReply] {
            assert_eq!(Leg::from_name(leg.name()).unwrap(), leg);
        }
        assert!(Leg::from_name("hello").is_err());
    }
}
