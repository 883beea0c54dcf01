use std::io::{Read, StdinLock, StdoutLock, Write};

use multilang_api::{
    Command, ConnectionConfig, Emission, HandshakeConfig, MultilangError, Result, SpoutCommand,
    TaskId, TaskIds, Value,
};

use crate::codec::Received;
use crate::connection::{Connection, Role};

/// Where a spout stands in the host's pull cycle.
///
/// The host sends one command, waits for `sync`, and only then sends the
/// next one. Emitting is legal only between a command and its `sync`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpoutState {
    /// No handshake yet.
    Uninitialized,
    /// `sync` sent (or nothing received yet); must read before emitting.
    AwaitingCommand,
    /// A command was received; emits are allowed until `sync`.
    ReadyToEmit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpoutEvent {
    Initialized,
    CommandReceived,
    Emitted,
    SyncSent,
}

impl SpoutState {
    /// Transition table. Illegal transitions are protocol violations.
    pub fn on(self, event: SpoutEvent) -> Result<SpoutState> {
        use SpoutEvent::*;
        use SpoutState::*;

        match (self, event) {
            (Uninitialized, Initialized) => Ok(AwaitingCommand),
            (Uninitialized, CommandReceived) => {
                Err(MultilangError::protocol("read before initialize"))
            }
            (Uninitialized, Emitted | SyncSent) => {
                Err(MultilangError::protocol("spout not initialized"))
            }
            (AwaitingCommand | ReadyToEmit, Initialized) => {
                Err(MultilangError::protocol("spout already initialised"))
            }
            (AwaitingCommand | ReadyToEmit, CommandReceived) => Ok(ReadyToEmit),
            (AwaitingCommand, Emitted) => Err(MultilangError::protocol("spout not ready to send")),
            (ReadyToEmit, Emitted) => Ok(ReadyToEmit),
            (AwaitingCommand | ReadyToEmit, SyncSent) => Ok(AwaitingCommand),
        }
    }
}

/// Source-role protocol: read a command, emit, `sync`, repeat.
pub struct Spout<R, W> {
    conn: Connection<R, W>,
    state: SpoutState,
    /// Anything emitted since the last `next`.
    emitted: bool,
}

impl Spout<StdinLock<'static>, StdoutLock<'static>> {
    pub fn stdio(config: ConnectionConfig) -> Self {
        Self::from_connection(Connection::stdio(Role::Spout, config))
    }
}

impl<R: Read, W: Write> Spout<R, W> {
    pub fn new(reader: R, writer: W, config: ConnectionConfig) -> Self {
        Self::from_connection(Connection::new(Role::Spout, reader, writer, config))
    }

    pub fn from_connection(conn: Connection<R, W>) -> Self {
        let state = if conn.is_initialized() {
            SpoutState::AwaitingCommand
        } else {
            SpoutState::Uninitialized
        };
        Self { conn, state, emitted: false }
    }

    /// See [`Connection::replace_input`].
    pub fn replace_input<R2: Read>(self, reader: R2) -> Result<Spout<R2, W>> {
        let conn = self.conn.replace_input(reader)?;
        Ok(Spout { conn, state: self.state, emitted: self.emitted })
    }

    pub fn initialize(&mut self) -> Result<&HandshakeConfig> {
        let next = self.state.on(SpoutEvent::Initialized)?;
        self.conn.initialize()?;
        self.advance(next);
        self.conn.require_initialized("initialize")
    }

    pub fn log(&mut self, text: &str) -> Result<()> {
        self.conn.log(text)
    }

    pub fn conf(&self) -> Option<&HandshakeConfig> {
        self.conn.conf()
    }

    pub fn state(&self) -> SpoutState {
        self.state
    }

    pub fn emitted(&self) -> bool {
        self.emitted
    }

    pub fn connection(&self) -> &Connection<R, W> {
        &self.conn
    }

    /// Read the next `next` / `ack` / `fail` from the host.
    ///
    /// Any command makes the spout ready to emit; `next` also starts a new
    /// cycle with nothing emitted yet. End of stream changes nothing.
    pub fn read_command(&mut self) -> Result<Received<SpoutCommand>> {
        let next = self.state.on(SpoutEvent::CommandReceived)?;
        let received = self.conn.receive::<SpoutCommand>()?;

        if let Some(command) = &received.message {
            if *command == SpoutCommand::Next {
                self.emitted = false;
            }
            self.advance(next);
        }
        Ok(received)
    }

    /// Emit a tuple and wait for the tasks it was routed to.
    ///
    /// `id = None` is an unreliable emission: the host will never ack or
    /// fail it. The host answers before sending any further command.
    pub fn emit(&mut self, values: Vec<Value>, id: Option<&str>, stream: &str) -> Result<TaskIds> {
        self.send_emission(Emission::spout(values, id, stream))?;

        let reply = self.conn.receive::<TaskIds>()?;
        reply.message.ok_or(MultilangError::UnexpectedEof("task ids reply"))
    }

    /// Emit a tuple to one task. The host does not reply.
    pub fn emit_direct(
        &mut self,
        values: Vec<Value>,
        id: Option<&str>,
        stream: &str,
        task: TaskId,
    ) -> Result<()> {
        self.send_emission(Emission::spout(values, id, stream).direct(task))
    }

    /// End the current cycle.
    ///
    /// An idle spout pauses briefly first so the host does not spin on it.
    pub fn send_sync(&mut self) -> Result<()> {
        let next = self.state.on(SpoutEvent::SyncSent)?;
        if !self.emitted {
            std::thread::sleep(self.conn.config().idle_pause());
        }
        self.conn.send(&Command::Sync)?;
        self.advance(next);
        Ok(())
    }

    fn send_emission(&mut self, emission: Emission) -> Result<()> {
        let next = self.state.on(SpoutEvent::Emitted)?;
        self.emitted = true;
        self.conn.send(&Command::Emit(emission))?;
        self.advance(next);
        Ok(())
    }

    fn advance(&mut self, next: SpoutState) {
        if self.state != next {
            tracing::debug!(from = ?self.state, to = ?next, "spout state");
            self.state = next;
        }
    }
}
