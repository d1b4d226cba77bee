//! Header block codec.
//!
//! A headers block is a count-prefixed sequence of (name, value) string
//! pairs. Order is not semantically significant and duplicate names are
//! undefined on the wire; callers get whatever a simple insertion-ordered map
//! gives them, matching the teacher's treatment of header maps as plain
//! collections rather than multimaps.

use super::cursor::{Reader, Writer};
use crate::error::Result;
use std::collections::BTreeMap;

/// A decoded/encodable headers block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(BTreeMap<String, String>);

impl Headers {
    /// Creates an empty header block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites a header value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Looks up a header by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Number of header pairs.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no headers.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decodes a headers block: u16 count, then `count` (u16-str, u16-str) pairs.
    pub fn decode(r: &mut Reader<'_>) -> Result<Self> {
        let count = r.u16()?;
        let mut map = BTreeMap::new();
        for _ in 0..count {
            let name = r.str_u16()?;
            let value = r.str_u16()?;
            map.insert(name, value);
        }
        Ok(Self(map))
    }

    /// Encodes this headers block.
    pub fn encode(&self, w: &mut Writer) {
        w.u16(self.0.len() as u16);
        for (name, value) in &self.0 {
            w.str_u16(name);
            w.str_u16(value);
        }
    }
}

impl<const N: usize> From<[(&str, &str); N]> for Headers {
    fn from(pairs: [(&str, &str); N]) -> Self {
        let mut h = Headers::new();
        for (k, v) in pairs {
            h.insert(k, v);
        }
        h
    }
}
