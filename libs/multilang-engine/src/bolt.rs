use std::collections::VecDeque;
use std::io::{Read, StdinLock, StdoutLock, Write};

use serde::de::Error as _;

use multilang_api::{
    Command, ConnectionConfig, Emission, HandshakeConfig, MultilangError, Record, Result, TaskId,
    TaskIds, Value,
};

use crate::codec::Received;
use crate::connection::{Connection, Role};

/// Processing-role protocol: read a record, emit derived records anchored
/// to it, then ack or fail it.
///
/// Unlike spouts there is no pull cycle, so the host may deliver the next
/// record before the task id reply of an emission. Such records are held
/// back and handed out by later [`Bolt::read_record`] calls.
pub struct Bolt<R, W> {
    conn: Connection<R, W>,
    pending: VecDeque<Record>,
}

impl Bolt<StdinLock<'static>, StdoutLock<'static>> {
    pub fn stdio(config: ConnectionConfig) -> Self {
        Self::from_connection(Connection::stdio(Role::Bolt, config))
    }
}

impl<R: Read, W: Write> Bolt<R, W> {
    pub fn new(reader: R, writer: W, config: ConnectionConfig) -> Self {
        Self::from_connection(Connection::new(Role::Bolt, reader, writer, config))
    }

    pub fn from_connection(conn: Connection<R, W>) -> Self {
        Self { conn, pending: VecDeque::new() }
    }

    /// See [`Connection::replace_input`].
    pub fn replace_input<R2: Read>(self, reader: R2) -> Result<Bolt<R2, W>> {
        let conn = self.conn.replace_input(reader)?;
        Ok(Bolt { conn, pending: self.pending })
    }

    pub fn initialize(&mut self) -> Result<&HandshakeConfig> {
        self.conn.initialize()
    }

    pub fn log(&mut self, text: &str) -> Result<()> {
        self.conn.log(text)
    }

    pub fn conf(&self) -> Option<&HandshakeConfig> {
        self.conn.conf()
    }

    pub fn connection(&self) -> &Connection<R, W> {
        &self.conn
    }

    /// Records received while waiting for an emit reply, not yet read.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn read_record(&mut self) -> Result<Received<Record>> {
        self.conn.require_initialized("read")?;
        if let Some(record) = self.pending.pop_front() {
            return Ok(Received::message(record));
        }
        self.conn.receive::<Record>()
    }

    pub fn send_ack(&mut self, id: &str) -> Result<()> {
        self.conn.require_initialized("ack")?;
        self.conn.send(&Command::Ack { id: id.to_owned() })
    }

    /// Report `id` as failed. Do not anchor further emissions to it.
    pub fn send_fail(&mut self, id: &str) -> Result<()> {
        self.conn.require_initialized("fail")?;
        self.conn.send(&Command::Fail { id: id.to_owned() })
    }

    /// Answer a heartbeat record.
    pub fn send_sync(&mut self) -> Result<()> {
        self.conn.require_initialized("sync")?;
        self.conn.send(&Command::Sync)
    }

    /// Emit a tuple anchored to `anchors` and wait for the tasks it was
    /// routed to.
    pub fn emit(&mut self, values: Vec<Value>, anchors: &[&str], stream: &str) -> Result<TaskIds> {
        self.conn.require_initialized("emit")?;
        self.conn.send(&Command::Emit(Emission::bolt(values, anchors, stream)))?;
        self.await_task_ids()
    }

    /// Emit a tuple to one task. The host does not reply.
    pub fn emit_direct(
        &mut self,
        values: Vec<Value>,
        anchors: &[&str],
        stream: &str,
        task: TaskId,
    ) -> Result<()> {
        self.conn.require_initialized("emit")?;
        self.conn
            .send(&Command::Emit(Emission::bolt(values, anchors, stream).direct(task)))
    }

    /// Read until the task id list arrives, queueing records seen on the way.
    fn await_task_ids(&mut self) -> Result<TaskIds> {
        loop {
            let Some(value) = self.conn.receive_value()?.message else {
                return Err(MultilangError::UnexpectedEof("task ids reply"));
            };

            match value {
                Value::Array(_) => return Ok(serde_json::from_value(value)?),
                Value::Object(_) => {
                    let record: Record = serde_json::from_value(value)?;
                    tracing::debug!(id = %record.id, queued = self.pending.len() + 1, "record arrived before emit reply");
                    self.pending.push_back(record);
                }
                other => {
                    return Err(serde_json::Error::custom(format!(
                        "expected task id list, got {other}"
                    ))
                    .into());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use multilang_api::ErrorKind;
    use serde_json::json;

    use super::*;

    fn bolt(dir: &tempfile::TempDir, after_handshake: &str) -> Bolt<Cursor<Vec<u8>>, Vec<u8>> {
        let input = format!(
            "{{\"pidDir\":\"{}\",\"conf\":{{}},\"context\":{{\"task->component\":{{\"3\":\"my-bolt\"}},\"taskid\":3}}}}\nend\n{after_handshake}",
            dir.path().display()
        );
        Bolt::new(Cursor::new(input.into_bytes()), Vec::new(), ConnectionConfig::default())
    }

    fn frames_after_pid(bolt: &Bolt<Cursor<Vec<u8>>, Vec<u8>>) -> Vec<String> {
        let out = String::from_utf8(bolt.connection().output().clone()).unwrap();
        out.split("\nend\n")
            .filter(|f| !f.is_empty())
            .skip(1)
            .map(str::to_owned)
            .collect()
    }

    const RECORD_7: &str = "{\"id\":\"7\",\"comp\":\"c1\",\"stream\":\"default\",\"task\":1,\"tuple\":[1,2]}\nend\n";
    const RECORD_8: &str = "{\"id\":\"8\",\"comp\":\"c1\",\"stream\":\"default\",\"task\":1,\"tuple\":[3]}\nend\n";

    #[test]
    fn every_operation_requires_initialization() {
        let dir = tempfile::tempdir().unwrap();
        let mut bolt = bolt(&dir, RECORD_7);

        assert_eq!(bolt.read_record().unwrap_err().kind(), ErrorKind::Protocol);
        assert_eq!(bolt.send_ack("7").unwrap_err().kind(), ErrorKind::Protocol);
        assert_eq!(bolt.send_fail("7").unwrap_err().kind(), ErrorKind::Protocol);
        assert_eq!(bolt.send_sync().unwrap_err().kind(), ErrorKind::Protocol);
        assert!(bolt.emit(vec![], &["7"], "").is_err());
        assert!(bolt.emit_direct(vec![], &["7"], "", 1).is_err());
        assert!(bolt.connection().output().is_empty());
    }

    #[test]
    fn read_then_ack() {
        let dir = tempfile::tempdir().unwrap();
        let mut bolt = bolt(&dir, RECORD_7);
        bolt.initialize().unwrap();

        let record = bolt.read_record().unwrap().message.unwrap();
        assert_eq!(record.id, "7");
        assert_eq!(record.source_component, "c1");
        assert_eq!(record.source_stream, "default");
        assert_eq!(record.source_task, 1);
        assert_eq!(record.values, vec![json!(1), json!(2)]);

        bolt.send_ack(&record.id).unwrap();
        assert_eq!(frames_after_pid(&bolt), vec![r#"{"command":"ack","id":"7"}"#]);
        assert_eq!(bolt.read_record().unwrap(), Received::end());
    }

    #[test]
    fn anchored_emit_reads_task_ids() {
        let dir = tempfile::tempdir().unwrap();
        let mut bolt = bolt(&dir, &format!("{RECORD_7}[2,3]\nend\n"));
        bolt.initialize().unwrap();

        let record = bolt.read_record().unwrap().message.unwrap();
        let tasks = bolt.emit(vec![json!("one")], &[record.id.as_str()], "").unwrap();
        assert_eq!(tasks, vec![2, 3]);
        bolt.emit_direct(vec![json!("two")], &[record.id.as_str()], "words", 9).unwrap();
        bolt.send_fail(&record.id).unwrap();

        assert_eq!(
            frames_after_pid(&bolt),
            vec![
                r#"{"command":"emit","anchors":["7"],"tuple":["one"]}"#,
                r#"{"command":"emit","anchors":["7"],"stream":"words","task":9,"tuple":["two"]}"#,
                r#"{"command":"fail","id":"7"}"#,
            ]
        );
    }

    #[test]
    fn records_before_reply_are_queued() {
        let dir = tempfile::tempdir().unwrap();
        let mut bolt = bolt(&dir, &format!("{RECORD_7}{RECORD_8}[5]\nend\n"));
        bolt.initialize().unwrap();

        let first = bolt.read_record().unwrap().message.unwrap();
        let tasks = bolt.emit(vec![json!(0)], &[first.id.as_str()], "").unwrap();
        assert_eq!(tasks, vec![5]);
        assert_eq!(bolt.pending(), 1);

        let second = bolt.read_record().unwrap();
        assert_eq!(second.message.map(|r| r.id), Some("8".to_owned()));
        assert!(!second.end_of_stream);
        assert_eq!(bolt.pending(), 0);
        assert_eq!(bolt.read_record().unwrap(), Received::end());
    }

    #[test]
    fn scalar_reply_is_decode_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut bolt = bolt(&dir, "\"oops\"\nend\n");
        bolt.initialize().unwrap();
        let err = bolt.emit(vec![], &[], "").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn missing_reply_is_transport_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut bolt = bolt(&dir, "");
        bolt.initialize().unwrap();
        let err = bolt.emit(vec![json!(1)], &["7"], "").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[test]
    fn heartbeat_answered_with_sync() {
        let dir = tempfile::tempdir().unwrap();
        let mut bolt = bolt(
            &dir,
            "{\"id\":\"-1\",\"comp\":\"__system\",\"stream\":\"__heartbeat\",\"task\":-1,\"tuple\":[]}\nend\n",
        );
        bolt.initialize().unwrap();

        let record = bolt.read_record().unwrap().message.unwrap();
        assert!(record.is_heartbeat());
        bolt.send_sync().unwrap();
        assert_eq!(frames_after_pid(&bolt), vec![r#"{"command":"sync"}"#]);
    }
}
