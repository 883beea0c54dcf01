use std::io::{ErrorKind as IoErrorKind, Read, Write};

use serde::Serialize;
use serde::de::DeserializeOwned;

use multilang_api::{ConnectionConfig, Framing, MultilangError, Result, Value};

/// Terminator line written after every payload line.
pub const SENTINEL: &[u8] = b"end";

// ═══════════════════════════════════════════════════════════════
//  Sentinel framing
// ═══════════════════════════════════════════════════════════════

/// One JSON document per line, each followed by a line reading `end`.
///
/// ```text
/// {"command":"sync"}
/// end
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SentinelFraming {
    /// Maximum payload line length in bytes (0 = unlimited).
    max_length: usize,
    /// Reject terminator lines other than `end`.
    strict: bool,
}

impl SentinelFraming {
    pub fn new(max_length: usize, strict: bool) -> Self {
        Self { max_length, strict }
    }

    pub fn from_config(cfg: &ConnectionConfig) -> Self {
        Self::new(cfg.max_line_length, cfg.strict_sentinel)
    }

    fn check_length(&self, len: usize) -> Result<()> {
        if self.max_length > 0 && len > self.max_length {
            return Err(MultilangError::framing(format!(
                "line too long: {len} bytes (max {})",
                self.max_length
            )));
        }
        Ok(())
    }

    fn check_sentinel(&self, line: &[u8]) -> Result<()> {
        if self.strict && line != SENTINEL {
            return Err(MultilangError::framing(format!(
                "expected terminator 'end', got '{}'",
                String::from_utf8_lossy(line)
            )));
        }
        Ok(())
    }
}

impl Framing for SentinelFraming {
    fn decode(&self, buf: &[u8]) -> Result<Option<(Vec<u8>, usize)>> {
        let Some(payload_end) = find_newline(buf, 0) else {
            // No complete payload line yet
            if self.max_length > 0 && buf.len() > self.max_length {
                return Err(MultilangError::framing(format!(
                    "line too long: {} bytes (max {}) and no newline found",
                    buf.len(),
                    self.max_length
                )));
            }
            return Ok(None);
        };

        let payload = trim_cr(&buf[..payload_end]);
        self.check_length(payload.len())?;

        let Some(sentinel_end) = find_newline(buf, payload_end + 1) else {
            return Ok(None);
        };
        self.check_sentinel(trim_cr(&buf[payload_end + 1..sentinel_end]))?;

        Ok(Some((payload.to_vec(), sentinel_end + 1)))
    }

    fn decode_eof(&self, buf: &[u8]) -> Result<Option<Vec<u8>>> {
        // An unterminated payload line is never delivered.
        let Some(payload_end) = find_newline(buf, 0) else {
            return Ok(None);
        };
        let payload = trim_cr(&buf[..payload_end]);
        self.check_length(payload.len())?;

        // The host may close the pipe before the final terminator.
        let rest = trim_cr(&buf[payload_end + 1..]);
        if !rest.is_empty() {
            self.check_sentinel(rest)?;
        }
        Ok(Some(payload.to_vec()))
    }

    fn encode(&self, payload: &[u8], buf: &mut Vec<u8>) -> Result<()> {
        if payload.contains(&b'\n') {
            return Err(MultilangError::framing("payload contains a raw newline"));
        }
        buf.extend_from_slice(payload);
        buf.push(b'\n');
        buf.extend_from_slice(SENTINEL);
        buf.push(b'\n');
        Ok(())
    }
}

fn find_newline(buf: &[u8], from: usize) -> Option<usize> {
    buf.get(from..)?
        .iter()
        .position(|&b| b == b'\n')
        .map(|p| from + p)
}

fn trim_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

// ═══════════════════════════════════════════════════════════════
//  Reader
// ═══════════════════════════════════════════════════════════════

/// Outcome of a read: the message (if one arrived) and whether input is
/// exhausted. The final message may arrive together with end of stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Received<T> {
    pub message: Option<T>,
    pub end_of_stream: bool,
}

impl<T> Received<T> {
    pub fn message(message: T) -> Self {
        Self { message: Some(message), end_of_stream: false }
    }

    pub fn last(message: T) -> Self {
        Self { message: Some(message), end_of_stream: true }
    }

    pub fn end() -> Self {
        Self { message: None, end_of_stream: true }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Received<U> {
        Received { message: self.message.map(f), end_of_stream: self.end_of_stream }
    }
}

/// Reads framed messages from the host.
pub struct FrameReader<R> {
    inner: R,
    framing: SentinelFraming,
    buf: Vec<u8>,
    eof: bool,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R, framing: SentinelFraming) -> Self {
        Self { inner, framing, buf: Vec::with_capacity(8192), eof: false }
    }

    /// Read one frame and decode its payload into `T`.
    ///
    /// End of input before a complete payload line yields `end()` with no
    /// decode attempt. A payload whose terminator is cut off by end of input
    /// is still decoded and returned with `end_of_stream` set.
    pub fn read<T: DeserializeOwned>(&mut self) -> Result<Received<T>> {
        let (payload, end_of_stream) = match self.next_payload()? {
            Some(frame) => frame,
            None => return Ok(Received::end()),
        };
        tracing::trace!(payload = %String::from_utf8_lossy(&payload), end_of_stream, "frame in");

        let message: T = serde_json::from_slice(&payload)?;
        Ok(Received { message: Some(message), end_of_stream })
    }

    /// Read one frame without committing to a message shape.
    pub fn read_value(&mut self) -> Result<Received<Value>> {
        self.read::<Value>()
    }

    fn next_payload(&mut self) -> Result<Option<(Vec<u8>, bool)>> {
        let mut tmp = [0u8; 4096];

        loop {
            if let Some((payload, consumed)) = self.framing.decode(&self.buf)? {
                self.buf.drain(..consumed);
                return Ok(Some((payload, false)));
            }

            if self.eof {
                let last = self.framing.decode_eof(&self.buf)?;
                if last.is_none() && !self.buf.is_empty() {
                    tracing::debug!(bytes = self.buf.len(), "discarding unterminated line at end of input");
                }
                self.buf.clear();
                return Ok(last.map(|payload| (payload, true)));
            }

            match self.inner.read(&mut tmp) {
                Ok(0) => self.eof = true,
                Ok(n) => self.buf.extend_from_slice(&tmp[..n]),
                Err(e) if e.kind() == IoErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Writer
// ═══════════════════════════════════════════════════════════════

/// Writes framed messages to the host. Every frame is flushed immediately.
pub struct FrameWriter<W> {
    inner: W,
    framing: SentinelFraming,
}

impl<W: Write> FrameWriter<W> {
    pub fn new(inner: W, framing: SentinelFraming) -> Self {
        Self { inner, framing }
    }

    pub fn write<T: Serialize>(&mut self, msg: &T) -> Result<()> {
        let payload = serde_json::to_vec(msg)?;
        tracing::trace!(payload = %String::from_utf8_lossy(&payload), "frame out");

        let mut frame = Vec::with_capacity(payload.len() + SENTINEL.len() + 2);
        self.framing.encode(&payload, &mut frame)?;
        self.inner.write_all(&frame)?;
        self.inner.flush()?;
        Ok(())
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}
