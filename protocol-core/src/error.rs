//! Error types for the protocol engine.
//!
//! This module defines every error the engine itself can raise, grouped by
//! the taxonomy in the spec: transport, decode, protocol and application
//! errors. Application errors are carried over the wire as `error` messages
//! (see [`crate::message::ErrorCode`]); this enum is for engine-local
//! failures.

use std::fmt;

/// Result type alias for protocol-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the protocol engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // --- transport ---
    /// The connection is closed; the operation cannot proceed.
    ConnectionClosed,

    /// The underlying stream returned an I/O error.
    Io(String),

    /// The stream ended in the middle of a frame.
    FrameTruncated,

    // --- decode ---
    /// An outbound payload would exceed the maximum frame size.
    FrameTooLarge,

    /// Frame type byte did not match a known message type.
    BadType(u8),

    /// A declared length ran past the remaining bytes of the payload.
    DecodeTruncated,

    /// Inbound checksum did not match the computed value.
    BadChecksum,

    /// Message type byte is not one of the enumerated types.
    UnknownMessageType(u8),

    /// Checksum type byte named an algorithm this build cannot compute.
    UnsupportedChecksum(u8),

    // --- protocol ---
    /// A handshake message was malformed or arrived out of order.
    HandshakeProtocolViolation(&'static str),

    /// A second `init_req`/`init_res` arrived after the connection was ready.
    HandshakeAfterReady,

    /// A continuation frame arrived for an id with no buffered fragments.
    OrphanContinuation(u32),

    /// A non-continuation frame arrived for an id with fragments already buffered.
    FragmentSequenceViolation(u32),

    /// A response frame's id had no matching pending request.
    OrphanResponse(u32),

    /// An `error` message carried a code outside the known enumeration.
    InvalidErrorCode(u8),

    /// The peer's handshake frame was not the expected `init_req`/`init_res`
    /// type; it has not finished its own handshake yet.
    NotReady,

    /// An operation requires the connection id for the given slot, but none was pending.
    NoSuchPending(u32),

    /// The same id was inserted into the correlation table twice.
    DuplicateId(u32),

    /// A required handshake header was missing.
    MissingHeader(&'static str),

    /// The peer answered a call with a wire `error` message rather than a response.
    Remote(u8, String),
}

impl Error {
    /// Returns a human-readable description of the error.
    pub fn as_str(&self) -> &'static str {
        match self {
            Error::ConnectionClosed => "connection closed",
            Error::Io(_) => "I/O error",
            Error::FrameTruncated => "frame truncated",
            Error::FrameTooLarge => "frame too large",
            Error::BadType(_) => "bad type",
            Error::DecodeTruncated => "decode truncated",
            Error::BadChecksum => "bad checksum",
            Error::UnknownMessageType(_) => "unknown message type",
            Error::UnsupportedChecksum(_) => "unsupported checksum",
            Error::HandshakeProtocolViolation(_) => "handshake protocol violation",
            Error::HandshakeAfterReady => "handshake after ready",
            Error::OrphanContinuation(_) => "orphan continuation",
            Error::FragmentSequenceViolation(_) => "fragment sequence violation",
            Error::OrphanResponse(_) => "orphan response",
            Error::InvalidErrorCode(_) => "invalid error code",
            Error::NotReady => "not ready",
            Error::NoSuchPending(_) => "no such pending request",
            Error::DuplicateId(_) => "duplicate id",
            Error::MissingHeader(_) => "missing header",
            Error::Remote(_, _) => "peer reported an error",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(msg) => write!(f, "{}: {}", self.as_str(), msg),
            Error::BadType(t) => write!(f, "{}: 0x{:02x}", self.as_str(), t),
            Error::UnknownMessageType(t) => write!(f, "{}: 0x{:02x}", self.as_str(), t),
            Error::UnsupportedChecksum(t) => write!(f, "{}: {}", self.as_str(), t),
            Error::HandshakeProtocolViolation(why) => write!(f, "{}: {}", self.as_str(), why),
            Error::OrphanContinuation(id) => write!(f, "{} for id {}", self.as_str(), id),
            Error::FragmentSequenceViolation(id) => write!(f, "{} for id {}", self.as_str(), id),
            Error::OrphanResponse(id) => write!(f, "{} for id {}", self.as_str(), id),
            Error::InvalidErrorCode(code) => write!(f, "{}: {}", self.as_str(), code),
            Error::NoSuchPending(id) => write!(f, "{} for id {}", self.as_str(), id),
            Error::DuplicateId(id) => write!(f, "{} {}", self.as_str(), id),
            Error::MissingHeader(name) => write!(f, "{}: {}", self.as_str(), name),
            Error::Remote(code, msg) => write!(f, "{} (code {}): {}", self.as_str(), code, msg),
            _ => f.write_str(self.as_str()),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}
