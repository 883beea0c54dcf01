use clap::{Parser, Subcommand};
use serde::Deserialize;

use multilang_api::ConnectionConfig;

use crate::error::WorkerError;

#[derive(Parser)]
#[command(name = "multilang-worker", about = "Topology worker speaking the multilang protocol")]
pub struct Cli {
    /// Path to TOML config file (built-in defaults when absent)
    #[arg(long, env = "MULTILANG_CONFIG", global = true)]
    pub config: Option<String>,

    /// Replay a recorded session from this file instead of stdin
    #[arg(long, global = true)]
    pub input: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run as a spout emitting sentences
    Spout,
    /// Run as a bolt splitting sentences into words
    Bolt,
}

// ---- TOML Config ----

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkerConfig {
    pub connection: ConnectionConfig,
    pub spout: SpoutConfig,
    pub bolt: BoltConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpoutConfig {
    /// Sentences emitted in rotation, one per `next`.
    pub sentences: Vec<String>,
    /// Re-emissions of a failed sentence before giving up on it.
    pub max_retries: u32,
}

impl Default for SpoutConfig {
    fn default() -> Self {
        Self {
            sentences: default_sentences(),
            max_retries: 3,
        }
    }
}

fn default_sentences() -> Vec<String> {
    [
        "the cow jumped over the moon",
        "an apple a day keeps the doctor away",
        "four score and seven years ago",
        "snow white and the seven dwarfs",
        "i am at two with nature",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BoltConfig {
    /// Lowercase words before emitting them.
    pub lowercase: bool,
}

impl WorkerConfig {
    pub fn load(path: Option<&str>) -> Result<Self, WorkerError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path).map_err(|e| WorkerError::Config {
            context: "read",
            detail: format!("'{path}': {e}"),
        })?;
        Self::parse(&content).map_err(|e| match e {
            WorkerError::Config { context, detail } => WorkerError::Config {
                context,
                detail: format!("'{path}': {detail}"),
            },
            other => other,
        })
    }

    pub fn parse(toml_str: &str) -> Result<Self, WorkerError> {
        toml::from_str(toml_str).map_err(|e| WorkerError::Config {
            context: "parse",
            detail: e.to_string(),
        })
    }
}
