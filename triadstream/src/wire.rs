//! Byte framing of [`Signal`]s for transports that leave the process.
//!
//! Binary layout:
//!
//! ```text
//! +-------+--------------------------------+
//! | tag   | payload (ENVELOPE only)        |
//! | (1B)  | u32 length + codec JSON        |
//! +-------+--------------------------------+
//! ```
//!
//! Control signals are a bare tag. The envelope payload is the `triadtrust`
//! codec encoding, which checks each leg's field count on decode.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use triadtrust::handshake::codec;
use triadtrust::TriadTrustError;

use crate::channel::Signal;
use crate::error::{Result, TriadStreamError};

/// Signal tags on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SignalTag {
    Hello = 0x01,
    Finish = 0x02,
    Error = 0x03,
    MaxConnectionsReached = 0x04,
    Ok = 0x05,
    Envelope = 0x10,
}

impl SignalTag {
    /// Convert from a raw u8.
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0x01 => Ok(SignalTag::Hello),
            0x02 => Ok(SignalTag::Finish),
            0x03 => Ok(SignalTag::Error),
            0x04 => Ok(SignalTag::MaxConnectionsReached),
            0x05 => Ok(SignalTag::Ok),
            0x10 => Ok(SignalTag::Envelope),
            other => Err(TriadStreamError::UnknownSignal(other)),
        }
    }
}

impl Signal {
    pub fn tag(&self) -> SignalTag {
        match self {
            Signal::Hello => SignalTag::Hello,
            Signal::Finish => SignalTag::Finish,
            Signal::Error => SignalTag::Error,
            Signal::MaxConnectionsReached => SignalTag::MaxConnectionsReached,
            Signal::Ok => SignalTag::Ok,
            Signal::Envelope(_) => SignalTag::Envelope,
        }
    }
}

/// Encode one signal into a frame.
pub fn encode(signal: &Signal) -> Result<Bytes> {
    let mut buf = BytesMut::new();
    encode_into(signal, &mut buf)?;
    Ok(buf.freeze())
}

/// Append one signal frame to `buf`.
pub fn encode_into(signal: &Signal, buf: &mut BytesMut) -> Result<()> {
    buf.put_u8(signal.tag() as u8);
    if let Signal::Envelope(envelope) = signal {
        let payload = codec::encode(envelope)?;
        buf.put_u32(payload_len(payload.len())?);
        buf.put_slice(&payload);
    }
    Ok(())
}

/// Length prefix for an envelope payload of `size` bytes.
fn payload_len(size: usize) -> Result<u32> {
    u32::try_from(size).map_err(|_| TriadStreamError::PayloadTooLarge {
        size,
        max: u32::MAX as usize,
    })
}

/// Decode one signal frame. Trailing bytes are an error.
pub fn decode(frame: &[u8]) -> Result<Signal> {
    let mut buf = frame;
    let signal = decode_from(&mut buf)?;
    if buf.has_remaining() {
        return Err(TriadTrustError::Serialization(format!(
            "{} trailing bytes after {}",
            buf.remaining(),
            signal.name()
        ))
        .into());
    }
    Ok(signal)
}

/// Decode the next signal frame from `buf`, advancing past it.
pub fn decode_from(buf: &mut &[u8]) -> Result<Signal> {
    if !buf.has_remaining() {
        return Err(TriadStreamError::FrameTooShort { expected: 1, actual: 0 });
    }
    let tag = SignalTag::from_u8(buf.get_u8())?;
    let signal = match tag {
        SignalTag::Hello => Signal::Hello,
        SignalTag::Finish => Signal::Finish,
        SignalTag::Error => Signal::Error,
        SignalTag::MaxConnectionsReached => Signal::MaxConnectionsReached,
        SignalTag::Ok => Signal::Ok,
        SignalTag::Envelope => {
            if buf.remaining() < 4 {
                return Err(TriadStreamError::FrameTooShort {
                    expected: 5,
                    actual: 1 + buf.remaining(),
                });
            }
            let len = buf.get_u32() as usize;
            if buf.remaining() < len {
                return Err(TriadStreamError::FrameTooShort {
                    expected: 5 + len,
                    actual: 5 + buf.remaining(),
                });
            }
            let envelope = codec::decode(&buf[..len])?;
            buf.advance(len);
            Signal::Envelope(envelope)
        }
    };
    Ok(signal)
}
