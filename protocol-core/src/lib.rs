//! Connection-level engine for a multiplexed binary RPC protocol: frame
//! codec, message codec, fragmentation, handshake and request/response
//! correlation over a single async byte stream.
//!
//! The five pieces compose as: raw bytes → [`frame`] → `(header, payload)` →
//! [`message`] → typed [`message::Message`] → [`fragment`] (inbound
//! reassembly) → [`connection`] → a waiter completion or an [`connection::Inbound`]
//! delivery. Outbound traffic runs the same pipeline in reverse.

pub mod checksum;
pub mod config;
pub mod connection;
pub mod correlation;
pub mod error;
pub mod fragment;
pub mod frame;
pub mod message;

pub use checksum::{ChecksumAlgorithm, ChecksumRegistry};
pub use config::{Config, ConfigBuilder};
pub use connection::{Connection, Inbound, PeerIdentity, Responder, Role};
pub use error::{Error, Result};
pub use frame::{Frame, MessageType};
pub use message::{Args, CallRequest, CallResponse, ErrorCode, Message};
