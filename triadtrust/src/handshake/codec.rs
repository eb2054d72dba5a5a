// Wire encoding of envelopes for transports that leave the process.
//
//   {"leg": "<leg name>", "fields": [f0, f1, ...]}
//
// Fields are in the leg's declared order. The field count is checked against
// the leg's arity before any field is interpreted.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, TriadTrustError};
use crate::handshake::messages::{
    ClientRequest, Envelope, Leg, LegMessage, ServerReply, TrustedReply, TrustedRequest,
};

#[derive(Serialize, Deserialize)]
struct WireEnvelope {
    leg: String,
    fields: Vec<Value>,
}

/// Encode an envelope for the wire.
pub fn encode(envelope: &Envelope) -> Result<Vec<u8>> {
    let fields = match envelope {
        Envelope::ClientRequest(m) => to_fields(m)?,
        Envelope::TrustedRequest(m) => to_fields(m)?,
        Envelope::TrustedReply(m) => to_fields(m)?,
        Envelope::ServerReply(m) => to_fields(m)?,
    };
    let wire = WireEnvelope {
        leg: envelope.leg().name().to_owned(),
        fields,
    };
    serde_json::to_vec(&wire).map_err(|e| TriadTrustError::Serialization(format!("{e}")))
}

/// Decode an envelope of any leg.
pub fn decode(bytes: &[u8]) -> Result<Envelope> {
    let wire: WireEnvelope =
        serde_json::from_slice(bytes).map_err(|e| TriadTrustError::Serialization(format!("{e}")))?;
    let leg = Leg::from_name(&wire.leg)?;
    let envelope = match leg {
        Leg::ClientRequest => from_fields::<ClientRequest>(wire.fields)?.into_envelope(),
        Leg::TrustedRequest => from_fields::<TrustedRequest>(wire.fields)?.into_envelope(),
        Leg::TrustedReply => from_fields::<TrustedReply>(wire.fields)?.into_envelope(),
        Leg::ServerReply => from_fields::<ServerReply>(wire.fields)?.into_envelope(),
    };
    Ok(envelope)
}

/// Decode an envelope that must belong to the leg of `M`.
pub fn decode_as<M: LegMessage>(bytes: &[u8]) -> Result<M> {
    M::from_envelope(decode(bytes)?)
}

fn to_fields<M: LegMessage>(msg: &M) -> Result<Vec<Value>> {
    match serde_json::to_value(msg) {
        Ok(Value::Array(fields)) => Ok(fields),
        Ok(_) => Err(TriadTrustError::Serialization(format!(
            "{} did not serialize as a field sequence",
            M::LEG
        ))),
        Err(e) => Err(TriadTrustError::Serialization(format!("{e}"))),
    }
}

fn from_fields<M: LegMessage>(fields: Vec<Value>) -> Result<M> {
    if fields.len() != M::ARITY {
        return Err(TriadTrustError::MalformedMessage {
            leg: M::LEG,
            expected: M::ARITY,
            actual: fields.len(),
        });
    }
    serde_json::from_value(Value::Array(fields))
        .map_err(|e| TriadTrustError::Serialization(format!("{} fields: {e}", M::LEG)))
}
