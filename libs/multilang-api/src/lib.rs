pub mod config;
pub mod error;
pub mod message;

pub use config::ConnectionConfig;
pub use error::{ErrorKind, MultilangError, Result};
pub use message::{
    Command, Emission, HandshakeConfig, ProcessIdentity, Record, SpoutCommand, TaskId, TaskIds,
    TopologyContext, Value, DEFAULT_STREAM, HEARTBEAT_STREAM,
};

// ════════════════════════════════════════════════════════════════
//  Framing
// ════════════════════════════════════════════════════════════════

/// Splits a byte stream into message payloads.
///
/// Purely structural: knows nothing about JSON or protocol semantics.
pub trait Framing: Send + Sync {
    /// Extract one frame from the buffer.
    /// Returns `(payload, bytes_consumed)` or `None` if the frame is incomplete.
    fn decode(&self, buf: &[u8]) -> Result<Option<(Vec<u8>, usize)>>;

    /// Input is exhausted: salvage a final payload from what is left, if any.
    fn decode_eof(&self, buf: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Append one framed payload to the output buffer.
    fn encode(&self, payload: &[u8], buf: &mut Vec<u8>) -> Result<()>;
}
