//! Call request/response message bodies.
//!
//! Layout: flags (u8) | ttl (u32, request only) | tracing (25 bytes) |
//! service (u8-str, request only) | headers block | checksum type (u8) +
//! checksum bytes | arg1, arg2, arg3 (each u16-prefixed).
//!
//! `arg1` is the endpoint name on a request and empty on a response; `arg2`
//! is application headers; `arg3` is the application payload.

use super::cursor::{Reader, Writer};
use super::headers::Headers;
use super::tracing::Tracing;
use crate::checksum::{ChecksumRegistry, ChecksumType};
use crate::error::{Error, Result};

/// Bit 0 of the flags byte: more fragments of this logical message follow.
pub const FLAG_MORE_FRAGMENTS: u8 = 1 << 0;

/// The three positional arguments every call carries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Args {
    /// Endpoint/procedure name on a request; empty on a response.
    pub arg1: Vec<u8>,
    /// Application-level headers.
    pub arg2: Vec<u8>,
    /// Application payload.
    pub arg3: Vec<u8>,
}

impl Args {
    /// Total serialized size of the three u16-prefixed argument chunks.
    pub fn wire_len(&self) -> usize {
        6 + self.arg1.len() + self.arg2.len() + self.arg3.len()
    }
}

/// A call request message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    /// More-fragments flag; cleared once this is the final fragment.
    pub more_fragments: bool,
    /// Caller-specified time-to-live in milliseconds.
    pub ttl_ms: u32,
    /// Distributed tracing correlation fields.
    pub tracing: Tracing,
    /// Target service name.
    pub service: String,
    /// Transport-level headers.
    pub headers: Headers,
    /// Checksum algorithm used to protect this message.
    pub checksum_type: ChecksumType,
    /// Positional arguments (endpoint, app headers, payload).
    pub args: Args,
}

/// A call response message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallResponse {
    /// More-fragments flag; cleared once this is the final fragment.
    pub more_fragments: bool,
    /// Distributed tracing correlation fields, echoed from the request.
    pub tracing: Tracing,
    /// Transport-level headers.
    pub headers: Headers,
    /// Checksum algorithm used to protect this message.
    pub checksum_type: ChecksumType,
    /// Positional arguments (arg1 empty, app headers, payload).
    pub args: Args,
}

impl CallRequest {
    /// Decodes a call request body, rejecting a `farmhash32`/`crc32c`
    /// checksum type unless a collaborator algorithm for it is registered.
    pub fn decode_with(r: &mut Reader<'_>, registry: &ChecksumRegistry) -> Result<Self> {
        let flags = r.u8()?;
        let ttl_ms = r.u32()?;
        let tracing = Tracing::decode(r)?;
        let service = r.str_u8()?;
        let headers = Headers::decode(r)?;
        let (checksum_type, expected) = decode_checksum_header(r)?;
        let args = decode_args(r)?;
        verify_checksum(checksum_type, expected, &args, registry)?;

        Ok(Self {
            more_fragments: flags & FLAG_MORE_FRAGMENTS != 0,
            ttl_ms,
            tracing,
            service,
            headers,
            checksum_type,
            args,
        })
    }

    /// Decodes a call request body, supporting only the checksum types this
    /// build implements itself (CRC-32 and none).
    pub fn decode(r: &mut Reader<'_>) -> Result<Self> {
        Self::decode_with(r, &ChecksumRegistry::default())
    }

    /// Encodes this call request body, computing the checksum over the
    /// arguments if the checksum type requires one. Rejects a
    /// `farmhash32`/`crc32c` checksum type unless a collaborator algorithm
    /// for it is registered.
    pub fn encode_with(&self, registry: &ChecksumRegistry) -> Result<Vec<u8>> {
        let mut w = Writer::new();
        let flags = if self.more_fragments {
            FLAG_MORE_FRAGMENTS
        } else {
            0
        };
        w.u8(flags);
        w.u32(self.ttl_ms);
        self.tracing.encode(&mut w);
        w.str_u8(&self.service);
        self.headers.encode(&mut w);
        encode_checksum(&mut w, self.checksum_type, &self.args, registry)?;
        encode_args(&mut w, &self.args);
        Ok(w.into_vec())
    }

    /// Encodes this call request body, supporting only the checksum types
    /// this build implements itself (CRC-32 and none).
    pub fn encode(&self) -> Result<Vec<u8>> {
        self.encode_with(&ChecksumRegistry::default())
    }
}

impl CallResponse {
    /// Decodes a call response body, rejecting a `farmhash32`/`crc32c`
    /// checksum type unless a collaborator algorithm for it is registered.
    pub fn decode_with(r: &mut Reader<'_>, registry: &ChecksumRegistry) -> Result<Self> {
        let flags = r.u8()?;
        let tracing = Tracing::decode(r)?;
        let headers = Headers::decode(r)?;
        let (checksum_type, expected) = decode_checksum_header(r)?;
        let args = decode_args(r)?;
        verify_checksum(checksum_type, expected, &args, registry)?;

        Ok(Self {
            more_fragments: flags & FLAG_MORE_FRAGMENTS != 0,
            tracing,
            headers,
            checksum_type,
            args,
        })
    }

    /// Decodes a call response body, supporting only the checksum types this
    /// build implements itself (CRC-32 and none).
    pub fn decode(r: &mut Reader<'_>) -> Result<Self> {
        Self::decode_with(r, &ChecksumRegistry::default())
    }

    /// Encodes this call response body. Rejects a `farmhash32`/`crc32c`
    /// checksum type unless a collaborator algorithm for it is registered.
    pub fn encode_with(&self, registry: &ChecksumRegistry) -> Result<Vec<u8>> {
        let mut w = Writer::new();
        let flags = if self.more_fragments {
            FLAG_MORE_FRAGMENTS
        } else {
            0
        };
        w.u8(flags);
        self.tracing.encode(&mut w);
        self.headers.encode(&mut w);
        encode_checksum(&mut w, self.checksum_type, &self.args, registry)?;
        encode_args(&mut w, &self.args);
        Ok(w.into_vec())
    }

    /// Encodes this call response body, supporting only the checksum types
    /// this build implements itself (CRC-32 and none).
    pub fn encode(&self) -> Result<Vec<u8>> {
        self.encode_with(&ChecksumRegistry::default())
    }
}

fn decode_checksum_header(r: &mut Reader<'_>) -> Result<(ChecksumType, u32)> {
    let byte = r.u8()?;
    let checksum_type = ChecksumType::from_u8(byte).ok_or(Error::UnsupportedChecksum(byte))?;
    let len = checksum_type.value_len();
    let expected = if len > 0 {
        let bytes = r.bytes(len)?;
        u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    } else {
        0
    };
    Ok((checksum_type, expected))
}

fn verify_checksum(
    checksum_type: ChecksumType,
    expected: u32,
    args: &Args,
    registry: &ChecksumRegistry,
) -> Result<()> {
    if checksum_type.value_len() == 0 {
        return Ok(());
    }
    let mut payload = Vec::with_capacity(args.arg1.len() + args.arg2.len() + args.arg3.len());
    payload.extend_from_slice(&args.arg1);
    payload.extend_from_slice(&args.arg2);
    payload.extend_from_slice(&args.arg3);
    registry.verify(checksum_type, &payload, expected)
}

fn encode_checksum(
    w: &mut Writer,
    checksum_type: ChecksumType,
    args: &Args,
    registry: &ChecksumRegistry,
) -> Result<()> {
    w.u8(checksum_type as u8);
    if checksum_type.value_len() > 0 {
        let mut payload = Vec::with_capacity(args.arg1.len() + args.arg2.len() + args.arg3.len());
        payload.extend_from_slice(&args.arg1);
        payload.extend_from_slice(&args.arg2);
        payload.extend_from_slice(&args.arg3);
        let sum = registry.compute(checksum_type, &payload)?;
        w.u32(sum);
    }
    Ok(())
}

fn decode_args(r: &mut Reader<'_>) -> Result<Args> {
    let arg1 = r.arg_chunk()?.to_vec();
    let arg2 = r.arg_chunk()?.to_vec();
    let arg3 = r.arg_chunk()?.to_vec();
    Ok(Args { arg1, arg2, arg3 })
}

fn encode_args(w: &mut Writer, args: &Args) {
    w.arg_chunk(&args.arg1);
    w.arg_chunk(&args.arg2);
    w.arg_chunk(&args.arg3);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> CallRequest {
        CallRequest {
            more_fragments: false,
            ttl_ms: 5000,
            tracing: Tracing {
                span_id: 1,
                parent_id: 0,
                trace_id: 42,
                flags: 0,
            },
            service: "kv".into(),
            headers: Headers::new(),
            checksum_type: ChecksumType::Crc32,
            args: Args {
                arg1: b"getValue".to_vec(),
                arg2: Vec::new(),
                arg3: b"foo".to_vec(),
            },
        }
    }

    #[test]
    fn call_request_roundtrip() {
        let req = sample_request();
        let encoded = req.encode().unwrap();
        let mut r = Reader::new(&encoded);
        let decoded = CallRequest::decode(&mut r).unwrap();
        assert_eq!(decoded, req);
    }

    #[test]
    fn call_response_roundtrip() {
        let resp = CallResponse {
            more_fragments: false,
            tracing: sample_request().tracing,
            headers: Headers::new(),
            checksum_type: ChecksumType::None,
            args: Args {
                arg1: Vec::new(),
                arg2: Vec::new(),
                arg3: b"bar".to_vec(),
            },
        };
        let encoded = resp.encode().unwrap();
        let mut r = Reader::new(&encoded);
        let decoded = CallResponse::decode(&mut r).unwrap();
        assert_eq!(decoded, resp);
    }

    #[test]
    fn corrupted_checksum_rejected() {
        let req = sample_request();
        let mut encoded = req.encode().unwrap();
        // Flip a byte inside arg3, after all fixed-size header fields.
        let last = encoded.len() - 1;
        encoded[last] ^= 0xFF;
        let mut r = Reader::new(&encoded);
        assert_eq!(CallRequest::decode(&mut r), Err(Error::BadChecksum));
    }

    #[test]
    fn more_fragments_flag_roundtrips() {
        let mut req = sample_request();
        req.more_fragments = true;
        let encoded = req.encode().unwrap();
        let mut r = Reader::new(&encoded);
        let decoded = CallRequest::decode(&mut r).unwrap();
        assert!(decoded.more_fragments);
    }
}
