//! Handshake message bodies (`init_req` / `init_res`).
//!
//! Layout: protocol version (u16) | headers block. Required headers
//! `host_port` and `process_name` are application-level conventions
//! enforced by the connection engine, not the codec.

use super::cursor::{Reader, Writer};
use super::headers::Headers;
use crate::error::Result;

/// A handshake request or response body (the two share a wire shape).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitMessage {
    /// Protocol version the sender speaks.
    pub version: u16,
    /// Handshake headers, at minimum `host_port` and `process_name`.
    pub headers: Headers,
}

impl InitMessage {
    /// Decodes a handshake message body.
    pub fn decode(r: &mut Reader<'_>) -> Result<Self> {
        let version = r.u16()?;
        let headers = Headers::decode(r)?;
        Ok(Self { version, headers })
    }

    /// Encodes this handshake message body.
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.u16(self.version);
        self.headers.encode(&mut w);
        w.into_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HEADER_HOST_PORT, HEADER_PROCESS_NAME, VERSION};

    #[test]
    fn init_message_roundtrip() {
        let mut headers = Headers::new();
        headers.insert(HEADER_HOST_PORT, "1.2.3.4:5");
        headers.insert(HEADER_PROCESS_NAME, "svc[42]");
        let msg = InitMessage {
            version: VERSION,
            headers,
        };

        let encoded = msg.encode();
        let mut r = Reader::new(&encoded);
        let decoded = InitMessage::decode(&mut r).unwrap();
        assert_eq!(decoded, msg);
    }
}
