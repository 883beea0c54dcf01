use std::fmt;
use std::io::{Read, StdinLock, StdoutLock, Write};

use serde::de::DeserializeOwned;

use multilang_api::{Command, ConnectionConfig, HandshakeConfig, MultilangError, Result, Value};

use crate::codec::{FrameReader, FrameWriter, Received, SentinelFraming};
use crate::handshake::perform_handshake;

/// Which side of the topology this worker plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Spout,
    Bolt,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Spout => f.write_str("spout"),
            Role::Bolt => f.write_str("bolt"),
        }
    }
}

/// Connection bound to stdin/stdout, the normal deployment.
pub type StdioConnection = Connection<StdinLock<'static>, StdoutLock<'static>>;

/// Session state shared by both roles: the stream pair and the handshake.
///
/// Everything except [`Connection::initialize`] and
/// [`Connection::replace_input`] requires a completed handshake.
pub struct Connection<R, W> {
    role: Role,
    config: ConnectionConfig,
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
    conf: Option<HandshakeConfig>,
}

impl StdioConnection {
    pub fn stdio(role: Role, config: ConnectionConfig) -> Self {
        Self::new(role, std::io::stdin().lock(), std::io::stdout().lock(), config)
    }
}

impl<R: Read, W: Write> Connection<R, W> {
    pub fn new(role: Role, reader: R, writer: W, config: ConnectionConfig) -> Self {
        let framing = SentinelFraming::from_config(&config);
        Self {
            role,
            reader: FrameReader::new(reader, framing),
            writer: FrameWriter::new(writer, framing),
            config,
            conf: None,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Handshake result, once [`Connection::initialize`] succeeded.
    pub fn conf(&self) -> Option<&HandshakeConfig> {
        self.conf.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.conf.is_some()
    }

    /// Swap the input source, e.g. to replay a recorded session from a file.
    /// Only allowed before the handshake.
    pub fn replace_input<R2: Read>(self, reader: R2) -> Result<Connection<R2, W>> {
        if self.conf.is_some() {
            return Err(MultilangError::protocol(
                "cannot change input stream after the connection has been initialised",
            ));
        }
        let framing = SentinelFraming::from_config(&self.config);
        Ok(Connection {
            role: self.role,
            config: self.config,
            reader: FrameReader::new(reader, framing),
            writer: self.writer,
            conf: None,
        })
    }

    /// Run the handshake. Exactly once per connection.
    pub fn initialize(&mut self) -> Result<&HandshakeConfig> {
        if self.conf.is_some() {
            return Err(MultilangError::protocol(format!("{} already initialised", self.role)));
        }
        let conf = perform_handshake(&mut self.reader, &mut self.writer)?;
        Ok(self.conf.insert(conf))
    }

    /// Ask the host to log `text` on our behalf. No reply.
    pub fn log(&mut self, text: &str) -> Result<()> {
        self.require_initialized("log")?;
        self.send(&Command::Log { msg: text.to_owned() })
    }

    pub fn output(&self) -> &W {
        self.writer.get_ref()
    }

    pub(crate) fn require_initialized(&self, op: &str) -> Result<&HandshakeConfig> {
        self.conf.as_ref().ok_or_else(|| {
            MultilangError::protocol(format!("{op} on uninitialised {} connection", self.role))
        })
    }

    pub(crate) fn send(&mut self, command: &Command) -> Result<()> {
        self.writer.write(command)
    }

    pub(crate) fn receive<T: DeserializeOwned>(&mut self) -> Result<Received<T>> {
        self.reader.read()
    }

    pub(crate) fn receive_value(&mut self) -> Result<Received<Value>> {
        self.reader.read_value()
    }
}
