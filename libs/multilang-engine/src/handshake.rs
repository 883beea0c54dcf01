use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;

use multilang_api::{HandshakeConfig, MultilangError, ProcessIdentity, Result};

use crate::codec::{FrameReader, FrameWriter};

/// Read the host's start-up message, report our pid and drop the pid marker.
///
/// The marker is an empty file named by the pid inside `pidDir`; the host
/// uses it to find and kill the worker and removes it itself.
pub fn perform_handshake<R: Read, W: Write>(
    reader: &mut FrameReader<R>,
    writer: &mut FrameWriter<W>,
) -> Result<HandshakeConfig> {
    let received = reader.read::<HandshakeConfig>()?;
    let conf = received
        .message
        .ok_or(MultilangError::UnexpectedEof("handshake"))?;
    if received.end_of_stream {
        tracing::warn!("host closed input right after the handshake");
    }

    let pid = std::process::id();
    writer.write(&ProcessIdentity { pid })?;

    let marker = marker_path(&conf.pid_dir, pid);
    File::create(&marker).map_err(|e| {
        MultilangError::Io(std::io::Error::new(
            e.kind(),
            format!("pid marker {}: {e}", marker.display()),
        ))
    })?;

    tracing::info!(
        pid,
        task_id = conf.task_id(),
        component = conf.component().unwrap_or("?"),
        marker = %marker.display(),
        "handshake complete"
    );
    Ok(conf)
}

/// `<pid_dir>/<pid>`, or just `<pid>` when no directory is configured.
pub fn marker_path(pid_dir: &str, pid: u32) -> PathBuf {
    if pid_dir.is_empty() {
        PathBuf::from(pid.to_string())
    } else {
        PathBuf::from(pid_dir).join(pid.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use multilang_api::ErrorKind;

    use super::*;
    use crate::codec::SentinelFraming;

    fn handshake_input(pid_dir: &str) -> String {
        format!(
            "{{\"pidDir\":\"{pid_dir}\",\"conf\":{{\"topology.debug\":false}},\
             \"context\":{{\"task->component\":{{\"3\":\"my-bolt\"}},\"taskid\":3}}}}\nend\n"
        )
    }

    fn run(input: String) -> (Result<HandshakeConfig>, Vec<u8>) {
        let framing = SentinelFraming::default();
        let mut reader = FrameReader::new(Cursor::new(input.into_bytes()), framing);
        let mut writer = FrameWriter::new(Vec::new(), framing);
        let result = perform_handshake(&mut reader, &mut writer);
        (result, writer.into_inner())
    }

    #[test]
    fn reports_pid_and_creates_marker() {
        let dir = tempfile::tempdir().unwrap();
        let pid_dir = dir.path().to_str().unwrap().to_owned();

        let (conf, out) = run(handshake_input(&pid_dir));
        let conf = conf.unwrap();

        let pid = std::process::id();
        assert_eq!(String::from_utf8(out).unwrap(), format!("{{\"pid\":{pid}}}\nend\n"));
        assert_eq!(conf.pid_dir, pid_dir);
        assert_eq!(conf.task_id(), 3);
        assert_eq!(conf.component(), Some("my-bolt"));
        assert_eq!(conf.conf_value("topology.debug"), Some(&serde_json::json!(false)));

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        let marker = dir.path().join(pid.to_string());
        assert_eq!(std::fs::metadata(marker).unwrap().len(), 0);
    }

    #[test]
    fn missing_handshake_is_transport_failure() {
        let (result, out) = run(String::new());
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Transport);
        assert!(out.is_empty());
    }

    #[test]
    fn malformed_handshake_is_decode_failure() {
        let (result, out) = run("{\"pidDir\":\"/tmp\"}\nend\n".to_owned());
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Decode);
        assert!(out.is_empty());
    }

    #[test]
    fn unwritable_pid_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone");
        let (result, _) = run(handshake_input(missing.to_str().unwrap()));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Transport);
    }

    #[test]
    fn marker_path_joins_only_non_empty_dir() {
        assert_eq!(marker_path("", 42), PathBuf::from("42"));
        assert_eq!(marker_path("/tmp", 42), PathBuf::from("/tmp/42"));
        assert_eq!(marker_path("/tmp/", 42), PathBuf::from("/tmp/42"));
    }
}
