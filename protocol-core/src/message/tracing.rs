//! Tracing block shared by call and error messages.
//!
//! Fixed 25-byte layout: span id (u64), parent id (u64), trace id (u64),
//! flags (u8).

use super::cursor::{Reader, Writer};
use crate::config::TRACING_SIZE;
use crate::error::Result;

/// Distributed-tracing correlation fields carried on every call/error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tracing {
    /// Span id of the current call.
    pub span_id: u64,
    /// Span id of the caller.
    pub parent_id: u64,
    /// Trace id shared across an entire request tree.
    pub trace_id: u64,
    /// Tracing flags (e.g. sampled bit).
    pub flags: u8,
}

impl Tracing {
    /// Decodes a fixed 25-byte tracing block.
    pub fn decode(r: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            span_id: r.u64()?,
            parent_id: r.u64()?,
            trace_id: r.u64()?,
            flags: r.u8()?,
        })
    }

    /// Encodes this tracing block.
    pub fn encode(&self, w: &mut Writer) {
        w.u64(self.span_id);
        w.u64(self.parent_id);
        w.u64(self.trace_id);
        w.u8(self.flags);
    }
}

const _: () = assert!(8 + 8 + 8 + 1 == TRACING_SIZE);
