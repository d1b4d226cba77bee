//! Optional `cancel`/`claim` messages.
//!
//! Neither is required for interoperability (see SPEC_FULL.md open
//! questions); both are decoded/encoded so a peer that sends them does not
//! trip `unknown_message_type`, but the engine only acts on `cancel` — it
//! drops the local pending slot best-effort and does not wait for any
//! acknowledgement. `claim` is a collaborator hook (e.g. for forwarding
//! proxies) with no engine-level behavior.

use super::cursor::{Reader, Writer};
use super::tracing::Tracing;
use crate::error::Result;

/// Best-effort cancellation of an outstanding call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cancel {
    /// Tracing fields of the call being cancelled.
    pub tracing: Tracing,
    /// Human-readable cancellation reason.
    pub why: String,
}

impl Cancel {
    /// Decodes a cancel message body.
    pub fn decode(r: &mut Reader<'_>) -> Result<Self> {
        let tracing = Tracing::decode(r)?;
        let why = r.str_u16()?;
        Ok(Self { tracing, why })
    }

    /// Encodes this cancel message body.
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        self.tracing.encode(&mut w);
        w.str_u16(&self.why);
        w.into_vec()
    }
}

/// Claim of a forwarded/redirected call. Decoded for interoperability; the
/// engine itself does not interpret it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    /// Tracing fields of the call being claimed.
    pub tracing: Tracing,
}

impl Claim {
    /// Decodes a claim message body.
    pub fn decode(r: &mut Reader<'_>) -> Result<Self> {
        let tracing = Tracing::decode(r)?;
        Ok(Self { tracing })
    }

    /// Encodes this claim message body.
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        self.tracing.encode(&mut w);
        w.into_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_roundtrip() {
        let msg = Cancel {
            tracing: Tracing::default(),
            why: "caller gave up".into(),
        };
        let encoded = msg.encode();
        let mut r = Reader::new(&encoded);
        assert_eq!(Cancel::decode(&mut r).unwrap(), msg);
    }

    #[test]
    fn claim_roundtrip() {
        let msg = Claim {
            tracing: Tracing::default(),
        };
        let encoded = msg.encode();
        let mut r = Reader::new(&encoded);
        assert_eq!(Claim::decode(&mut r).unwrap(), msg);
    }
}
