//! Wire-level and runtime configuration for the protocol engine.

use crate::checksum::ChecksumRegistry;

/// Protocol version negotiated at handshake time.
pub const VERSION: u16 = 2;

/// Fixed size of the frame header, in bytes.
pub const FRAME_HEADER_SIZE: usize = 16;

/// Maximum total frame size (header + payload), per the wire contract.
pub const MAX_FRAME_SIZE: usize = 65535;

/// Maximum payload a single frame can carry.
pub const MAX_FRAME_PAYLOAD: usize = MAX_FRAME_SIZE - FRAME_HEADER_SIZE;

/// Size in bytes of the tracing block embedded in call/error messages.
pub const TRACING_SIZE: usize = 25;

/// Header name the peer's socket address is recorded under during handshake.
pub const HEADER_HOST_PORT: &str = "host_port";

/// Header name the peer's process identity is recorded under during handshake.
pub const HEADER_PROCESS_NAME: &str = "process_name";

/// Tunable parameters for a connection.
///
/// Mirrors the teacher's `TransportConfig`/`ProtocolBuilder` shape: a plain
/// struct with sane defaults plus a fluent builder for callers who need to
/// override them.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum frame size (header + payload) this side will emit.
    pub max_frame_size: usize,

    /// Local process identity advertised during handshake.
    pub process_name: String,

    /// Local host:port advertised during handshake.
    pub host_port: String,

    /// Collaborator-supplied algorithms for checksum types this build does
    /// not implement itself (`farmhash32`, `crc32c`). Empty by default.
    pub checksum_registry: ChecksumRegistry,
}

impl Config {
    /// Creates a configuration with protocol defaults.
    pub fn new(host_port: impl Into<String>, process_name: impl Into<String>) -> Self {
        Self {
            max_frame_size: MAX_FRAME_SIZE,
            process_name: process_name.into(),
            host_port: host_port.into(),
            checksum_registry: ChecksumRegistry::default(),
        }
    }

    /// Returns the maximum payload bytes a single frame may carry under this config.
    pub fn max_frame_payload(&self) -> usize {
        self.max_frame_size - FRAME_HEADER_SIZE
    }
}

/// Builder for [`Config`], following the teacher's `ProtocolBuilder` shape.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Creates a new builder seeded with the given identity and protocol defaults.
    pub fn new(host_port: impl Into<String>, process_name: impl Into<String>) -> Self {
        Self {
            config: Config::new(host_port, process_name),
        }
    }

    /// Overrides the maximum frame size (must be greater than the header size).
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.config.max_frame_size = size.clamp(FRAME_HEADER_SIZE + 1, MAX_FRAME_SIZE);
        self
    }

    /// Supplies the algorithms to use for checksum types this build does not
    /// implement itself (`farmhash32`, `crc32c`).
    pub fn checksum_registry(mut self, registry: ChecksumRegistry) -> Self {
        self.config.checksum_registry = registry;
        self
    }

    /// Builds the final [`Config`].
    pub fn build(self) -> Config {
        self.config
    }
}
