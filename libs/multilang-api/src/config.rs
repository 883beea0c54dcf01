use std::time::Duration;

use serde::Deserialize;

use crate::error::MultilangError;

/// Connection tuning, parsed from the `[connection]` TOML table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectionConfig {
    /// Require the terminator line to be literally `end`.
    /// Off by default: any line is accepted as terminator.
    pub strict_sentinel: bool,
    /// Maximum payload line length in bytes (0 = unlimited).
    pub max_line_length: usize,
    /// Pause before `sync` when a spout emitted nothing since the last `next`.
    pub idle_pause_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            strict_sentinel: false,
            max_line_length: 0,
            idle_pause_ms: default_idle_pause_ms(),
        }
    }
}

fn default_idle_pause_ms() -> u64 {
    1
}

impl ConnectionConfig {
    pub fn idle_pause(&self) -> Duration {
        Duration::from_millis(self.idle_pause_ms)
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self, MultilangError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MultilangError::Config(format!("{path}: {e}")))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, MultilangError> {
        toml::from_str(toml_str).map_err(|e| MultilangError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let cfg = ConnectionConfig::parse("").unwrap();
        assert_eq!(cfg, ConnectionConfig::default());
        assert_eq!(cfg.idle_pause(), Duration::from_millis(1));
        assert!(!cfg.strict_sentinel);
    }

    #[test]
    fn overrides() {
        let cfg = ConnectionConfig::parse(
            "strict_sentinel = true\nmax_line_length = 65536\nidle_pause_ms = 5\n",
        )
        .unwrap();
        assert!(cfg.strict_sentinel);
        assert_eq!(cfg.max_line_length, 65536);
        assert_eq!(cfg.idle_pause(), Duration::from_millis(5));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = ConnectionConfig::parse("sentinel = \"END\"").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = ConnectionConfig::load("/nonexistent/multilang.toml").unwrap_err();
        assert!(matches!(err, MultilangError::Config(_)));
    }
}
