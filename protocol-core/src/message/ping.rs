//! Keep-alive messages (`ping_req` / `ping_res`).
//!
//! Both carry an empty payload; their semantics live entirely in the frame
//! type and id.

/// A keep-alive ping or pong. Carries no payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ping;

impl Ping {
    /// Decodes a ping/pong body (always empty).
    pub fn decode(_r: &mut super::cursor::Reader<'_>) -> crate::error::Result<Self> {
        Ok(Self)
    }

    /// Encodes a ping/pong body (always empty).
    pub fn encode(&self) -> Vec<u8> {
        Vec::new()
    }
}
