//! Frame definition and serialization for the multiplexed RPC wire protocol.
//!
//! A frame is the atomic unit of transmission: a fixed 16-byte header
//! followed by an opaque payload whose type-specific structure is decoded by
//! [`crate::message`].
//!
//! # Frame format
//!
//! ```text
//! 0                   1                   2                   3
//! 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |            size               |    type       |   reserved   |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                              id                               |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                        reserved (8 bytes)                    |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                          payload...                           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! `size` includes the header itself, so the payload limit is
//! `MAX_FRAME_SIZE - FRAME_HEADER_SIZE`. The header is fixed at 16 bytes;
//! the four named fields occupy the first 8 and the remaining 8 are
//! reserved (zeroed on write, ignored on read).

use crate::config::{FRAME_HEADER_SIZE, MAX_FRAME_PAYLOAD};
use crate::error::{Error, Result};

/// Wire type tag for each message type the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    /// Handshake request.
    InitReq = 0x01,
    /// Handshake response.
    InitRes = 0x02,
    /// RPC call request.
    CallReq = 0x03,
    /// RPC call response.
    CallRes = 0x04,
    /// Continuation of a fragmented call request.
    CallReqContinue = 0x13,
    /// Continuation of a fragmented call response.
    CallResContinue = 0x14,
    /// Best-effort cancellation of an outstanding call.
    Cancel = 0xC0,
    /// Claim of a forwarded/redirected call (collaborator hook, unused by the engine).
    Claim = 0xC1,
    /// Keep-alive ping.
    PingReq = 0xD0,
    /// Keep-alive pong.
    PingRes = 0xD1,
    /// Protocol or application error envelope.
    Error = 0xFF,
}

impl MessageType {
    /// Converts a wire byte into a `MessageType`.
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::InitReq),
            0x02 => Some(Self::InitRes),
            0x03 => Some(Self::CallReq),
            0x04 => Some(Self::CallRes),
            0x13 => Some(Self::CallReqContinue),
            0x14 => Some(Self::CallResContinue),
            0xC0 => Some(Self::Cancel),
            0xC1 => Some(Self::Claim),
            0xD0 => Some(Self::PingReq),
            0xD1 => Some(Self::PingRes),
            0xFF => Some(Self::Error),
            _ => None,
        }
    }

    /// Returns true if this type is answered by a response bearing the same id.
    pub const fn expects_response(&self) -> bool {
        matches!(self, Self::InitReq | Self::CallReq | Self::PingReq)
    }

    /// Returns true if this is a fragmentation continuation frame.
    pub const fn is_continuation(&self) -> bool {
        matches!(self, Self::CallReqContinue | Self::CallResContinue)
    }

    /// Returns the continuation type for a `call_req`/`call_res` type.
    pub const fn continuation_of(&self) -> Option<Self> {
        match self {
            Self::CallReq => Some(Self::CallReqContinue),
            Self::CallRes => Some(Self::CallResContinue),
            _ => None,
        }
    }
}

/// A single wire frame: header fields plus an opaque payload.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Message type carried by this frame.
    pub message_type: MessageType,

    /// Correlation id linking this frame to a request/response pair.
    pub id: u32,

    /// Opaque payload bytes (message-codec structured).
    pub payload: Vec<u8>,
}

impl Frame {
    /// Creates a new frame.
    pub fn new(message_type: MessageType, id: u32, payload: Vec<u8>) -> Self {
        Self {
            message_type,
            id,
            payload,
        }
    }

    /// Total size of this frame once serialized, including the header.
    pub fn wire_size(&self) -> usize {
        FRAME_HEADER_SIZE + self.payload.len()
    }

    /// Serializes the frame to bytes.
    ///
    /// Fails with [`Error::FrameTooLarge`] if the payload would push the
    /// frame past `MAX_FRAME_SIZE`; the fragmenter is responsible for never
    /// producing such a frame.
    pub fn encode(&self) -> Result<Vec<u8>> {
        if self.payload.len() > MAX_FRAME_PAYLOAD {
            return Err(Error::FrameTooLarge);
        }

        let total_size = self.wire_size();
        let mut buf = Vec::with_capacity(total_size);
        buf.extend_from_slice(&(total_size as u16).to_be_bytes());
        buf.push(self.message_type as u8);
        buf.push(0); // reserved
        buf.extend_from_slice(&self.id.to_be_bytes());
        buf.extend_from_slice(&[0u8; 8]); // reserved, pads the header to FRAME_HEADER_SIZE
        buf.extend_from_slice(&self.payload);

        Ok(buf)
    }

    /// Decodes a complete frame (header already known to be present) from `buf`.
    ///
    /// `buf` must contain exactly one frame's worth of bytes, i.e. the
    /// `size` read off the 2-byte size prefix.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < FRAME_HEADER_SIZE {
            return Err(Error::FrameTruncated);
        }

        let type_byte = buf[2];
        let message_type = MessageType::from_u8(type_byte).ok_or(Error::BadType(type_byte))?;
        let id = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let payload = buf[FRAME_HEADER_SIZE..].to_vec();

        Ok(Self {
            message_type,
            id,
            payload,
        })
    }

    /// Reads the 2-byte size prefix, returning the total frame size (including header).
    pub fn decode_size(prefix: [u8; 2]) -> usize {
        u16::from_be_bytes(prefix) as usize
    }
}
