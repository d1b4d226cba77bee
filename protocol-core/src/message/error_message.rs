//! Wire `error` message: application/protocol error envelope.
//!
//! Layout: code (u8) | tracing (25 bytes) | message (u16-str).

use super::cursor::{Reader, Writer};
use super::tracing::Tracing;
use crate::error::{Error as CoreError, Result};

/// Application error codes carried in the wire `error` message.
///
/// Numeric values match the original protocol this was distilled from, so
/// two independently-built peers agree on the wire representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorCode {
    /// Catch-all for a malformed error frame whose intended code is unknown.
    Invalid = 0x00,
    /// The request timed out.
    Timeout = 0x01,
    /// The request was cancelled.
    Cancelled = 0x02,
    /// The callee is too busy to serve the request.
    Busy = 0x03,
    /// The callee declined to serve the request.
    Declined = 0x04,
    /// An unexpected failure occurred while serving the request.
    Unexpected = 0x05,
    /// The request was malformed.
    BadRequest = 0x06,
    /// A network-level failure occurred.
    NetworkError = 0x07,
    /// The callee considers itself unhealthy.
    Unhealthy = 0x08,
    /// A fatal, non-retriable failure.
    Fatal = 0xFF,
}

impl ErrorCode {
    /// Converts a wire byte into an `ErrorCode`, rejecting unrecognized values.
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Invalid),
            0x01 => Some(Self::Timeout),
            0x02 => Some(Self::Cancelled),
            0x03 => Some(Self::Busy),
            0x04 => Some(Self::Declined),
            0x05 => Some(Self::Unexpected),
            0x06 => Some(Self::BadRequest),
            0x07 => Some(Self::NetworkError),
            0x08 => Some(Self::Unhealthy),
            0xFF => Some(Self::Fatal),
            _ => None,
        }
    }
}

/// A decoded wire `error` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMessage {
    /// Application error code.
    pub code: ErrorCode,
    /// Tracing fields, normally echoed from the failed call.
    pub tracing: Tracing,
    /// Human-readable error description.
    pub message: String,
}

impl ErrorMessage {
    /// Constructs an error message with a zeroed tracing block, for cases
    /// where the engine raises an error with no originating call context.
    pub fn untraced(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            tracing: Tracing::default(),
            message: message.into(),
        }
    }

    /// Decodes a wire error message body.
    pub fn decode(r: &mut Reader<'_>) -> Result<Self> {
        let code_byte = r.u8()?;
        let code = ErrorCode::from_u8(code_byte).ok_or(CoreError::InvalidErrorCode(code_byte))?;
        let tracing = Tracing::decode(r)?;
        let message = r.str_u16()?;
        Ok(Self {
            code,
            tracing,
            message,
        })
    }

    /// Encodes this error message body.
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.u8(self.code as u8);
        self.tracing.encode(&mut w);
        w.str_u16(&self.message);
        w.into_vec()
    }
}
