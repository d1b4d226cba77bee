//! Typed message bodies and the per-type codec dispatch.
//!
//! [`crate::frame::Frame`] carries an opaque payload; this module turns that
//! payload into a [`Message`] value and back, keyed by
//! [`crate::frame::MessageType`].

mod call;
mod cancel;
mod cursor;
mod error_message;
mod headers;
mod init;
mod ping;
mod tracing;

pub use call::{Args, CallRequest, CallResponse, FLAG_MORE_FRAGMENTS};
pub use cancel::{Cancel, Claim};
pub use cursor::{Reader, Writer};
pub use error_message::{ErrorCode, ErrorMessage};
pub use headers::Headers;
pub use init::InitMessage;
pub use ping::Ping;
pub use tracing::Tracing;

use crate::error::{Error, Result};
use crate::frame::MessageType;

/// Every message body the engine understands, decoded from a frame payload.
///
/// `CallReqContinue`/`CallResContinue` frames are deliberately absent here:
/// under the fragmentation scheme in [`crate::fragment`], a continuation
/// frame's payload is a raw, non-self-describing slice of a larger logical
/// message and is never independently decodable. Those two wire types are
/// handled exclusively by [`crate::fragment::Reassembler`] from
/// `connection.rs`'s dispatch loop, never through this generic decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Handshake request.
    InitReq(InitMessage),
    /// Handshake response.
    InitRes(InitMessage),
    /// RPC call request, possibly a non-final fragment.
    CallReq(CallRequest),
    /// RPC call response, possibly a non-final fragment.
    CallRes(CallResponse),
    /// Best-effort cancellation.
    Cancel(Cancel),
    /// Forwarded-call claim.
    Claim(Claim),
    /// Keep-alive ping.
    PingReq(Ping),
    /// Keep-alive pong.
    PingRes(Ping),
    /// Protocol or application error envelope.
    Error(ErrorMessage),
}

impl Message {
    /// The wire type tag for this message.
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::InitReq(_) => MessageType::InitReq,
            Message::InitRes(_) => MessageType::InitRes,
            Message::CallReq(_) => MessageType::CallReq,
            Message::CallRes(_) => MessageType::CallRes,
            Message::Cancel(_) => MessageType::Cancel,
            Message::Claim(_) => MessageType::Claim,
            Message::PingReq(_) => MessageType::PingReq,
            Message::PingRes(_) => MessageType::PingRes,
            Message::Error(_) => MessageType::Error,
        }
    }

    /// Encodes this message's body to bytes (the frame header is applied separately).
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(match self {
            Message::InitReq(m) | Message::InitRes(m) => m.encode(),
            Message::CallReq(m) => m.encode()?,
            Message::CallRes(m) => m.encode()?,
            Message::Cancel(m) => m.encode(),
            Message::Claim(m) => m.encode(),
            Message::PingReq(m) | Message::PingRes(m) => m.encode(),
            Message::Error(m) => m.encode(),
        })
    }

    /// Decodes a message body for the given wire type.
    ///
    /// `CallReqContinue`/`CallResContinue` are rejected here with
    /// [`Error::UnknownMessageType`]: their payloads are raw fragment
    /// continuations, not decodable bodies, and must go through
    /// [`crate::fragment::Reassembler`] instead.
    pub fn decode(message_type: MessageType, payload: &[u8]) -> Result<Self> {
        let mut r = Reader::new(payload);
        Ok(match message_type {
            MessageType::InitReq => Message::InitReq(InitMessage::decode(&mut r)?),
            MessageType::InitRes => Message::InitRes(InitMessage::decode(&mut r)?),
            MessageType::CallReq => Message::CallReq(CallRequest::decode(&mut r)?),
            MessageType::CallRes => Message::CallRes(CallResponse::decode(&mut r)?),
            MessageType::CallReqContinue | MessageType::CallResContinue => {
                return Err(Error::UnknownMessageType(message_type as u8));
            }
            MessageType::Cancel => Message::Cancel(Cancel::decode(&mut r)?),
            MessageType::Claim => Message::Claim(Claim::decode(&mut r)?),
            MessageType::PingReq => Message::PingReq(Ping::decode(&mut r)?),
            MessageType::PingRes => Message::PingRes(Ping::decode(&mut r)?),
            MessageType::Error => Message::Error(ErrorMessage::decode(&mut r)?),
        })
    }

    /// Returns the more-fragments flag for call request/response bodies; other
    /// message types are never fragmented and report `false`.
    pub fn more_fragments(&self) -> bool {
        match self {
            Message::CallReq(m) => m.more_fragments,
            Message::CallRes(m) => m.more_fragments,
            _ => false,
        }
    }
}
