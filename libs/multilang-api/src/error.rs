use std::fmt;

/// Category of a protocol engine error.
///
/// None of them is recoverable inside the engine: once the worker and the
/// host disagree about the stream position there is no resynchronization
/// point. The kind only tells the caller what went wrong before it exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operation invoked outside its required state.
    Protocol,
    /// I/O failure on the host pipe, or the pipe closed mid-exchange.
    Transport,
    /// Payload does not parse into the expected shape.
    Decode,
    /// Invalid configuration.
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Protocol => f.write_str("protocol"),
            ErrorKind::Transport => f.write_str("transport"),
            ErrorKind::Decode => f.write_str("decode"),
            ErrorKind::Config => f.write_str("config"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MultilangError {
    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected end of stream: {0}")]
    UnexpectedEof(&'static str),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("framing: {0}")]
    Framing(String),

    #[error("config error: {0}")]
    Config(String),
}

impl MultilangError {
    pub fn protocol(msg: impl Into<String>) -> Self {
        MultilangError::Protocol(msg.into())
    }

    pub fn framing(msg: impl Into<String>) -> Self {
        MultilangError::Framing(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            MultilangError::Protocol(_) => ErrorKind::Protocol,
            MultilangError::Io(_) | MultilangError::UnexpectedEof(_) => ErrorKind::Transport,
            MultilangError::Json(_) | MultilangError::Framing(_) => ErrorKind::Decode,
            MultilangError::Config(_) => ErrorKind::Config,
        }
    }

    /// Add context to the error.
    ///
    /// Context is prepended to the message of string-carrying variants;
    /// wrapped source errors are returned as-is.
    pub fn with_context(self, ctx: impl fmt::Display) -> Self {
        match self {
            MultilangError::Protocol(msg) => MultilangError::Protocol(format!("{ctx}: {msg}")),
            MultilangError::Framing(msg) => MultilangError::Framing(format!("{ctx}: {msg}")),
            MultilangError::Config(msg) => MultilangError::Config(format!("{ctx}: {msg}")),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, MultilangError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(MultilangError::protocol("x").kind(), ErrorKind::Protocol);
        assert_eq!(MultilangError::UnexpectedEof("reply").kind(), ErrorKind::Transport);
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        assert_eq!(MultilangError::from(io).kind(), ErrorKind::Transport);
        let json = serde_json::from_str::<u32>("nope").unwrap_err();
        assert_eq!(MultilangError::from(json).kind(), ErrorKind::Decode);
        assert_eq!(MultilangError::framing("bad").kind(), ErrorKind::Decode);
    }

    #[test]
    fn context_is_prepended() {
        let err = MultilangError::protocol("not ready to send").with_context("spout emit");
        assert_eq!(err.to_string(), "protocol violation: spout emit: not ready to send");
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }
}
