//! Worker side of the multilang protocol: lets a process take part in a
//! stream topology as a spout or a bolt by exchanging JSON frames with its
//! supervisor over stdin/stdout.
//!
//! Typical bolt loop:
//!
//! ```no_run
//! use multilang_api::ConnectionConfig;
//! use multilang_engine::Bolt;
//!
//! # fn main() -> multilang_api::Result<()> {
//! let mut bolt = Bolt::stdio(ConnectionConfig::default());
//! bolt.initialize()?;
//! loop {
//!     let received = bolt.read_record()?;
//!     if let Some(record) = received.message {
//!         bolt.emit(record.values.clone(), &[record.id.as_str()], "")?;
//!         bolt.send_ack(&record.id)?;
//!     }
//!     if received.end_of_stream {
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod bolt;
pub mod codec;
pub mod connection;
pub mod handshake;
pub mod spout;

pub use bolt::Bolt;
pub use codec::{FrameReader, FrameWriter, Received, SentinelFraming};
pub use connection::{Connection, Role, StdioConnection};
pub use handshake::perform_handshake;
pub use spout::{Spout, SpoutEvent, SpoutState};
