use std::collections::{HashMap, VecDeque};
use std::io::{Read, Write};

use serde_json::json;

use multilang_api::SpoutCommand;
use multilang_engine::Spout;

use crate::config::{SpoutConfig, WorkerConfig};
use crate::error::WorkerError;

/// Run the sentence spout on stdin/stdout (or a replayed session).
pub fn run(config: &WorkerConfig, input: Option<&str>) -> Result<(), WorkerError> {
    let spout = Spout::stdio(config.connection.clone());
    match input {
        Some(path) => drive(spout.replace_input(super::open_replay(path)?)?, &config.spout),
        None => drive(spout, &config.spout),
    }
}

pub fn drive<R: Read, W: Write>(mut spout: Spout<R, W>, config: &SpoutConfig) -> Result<(), WorkerError> {
    let conf = spout.initialize()?;
    let component = conf.component().unwrap_or("spout").to_owned();
    spout.log(&format!("{component}: sentence spout ready"))?;

    let mut source = SentenceSource::new(config);
    loop {
        let received = spout.read_command()?;
        if let Some(command) = received.message {
            match command {
                SpoutCommand::Next => {
                    if let Some((id, sentence)) = source.next_emission() {
                        let tasks = spout.emit(vec![json!(sentence)], Some(id.as_str()), "")?;
                        tracing::debug!(%id, ?tasks, "sentence emitted");
                    }
                }
                SpoutCommand::Ack { id } => source.ack(&id),
                SpoutCommand::Fail { id } => {
                    if !source.fail(&id) {
                        tracing::warn!(%id, "sentence dropped after retries");
                        spout.log(&format!("{component}: dropped {id} after retries"))?;
                    }
                }
                SpoutCommand::Activate | SpoutCommand::Deactivate => {
                    tracing::info!(?command, "spout lifecycle");
                }
            }
            spout.send_sync()?;
        }
        if received.end_of_stream {
            tracing::info!(in_flight = source.in_flight(), "host closed input");
            return Ok(());
        }
    }
}

struct InFlight {
    sentence: String,
    attempts: u32,
}

/// Rotating sentence supply with at-least-once replay of failed ids.
pub struct SentenceSource {
    sentences: Vec<String>,
    cursor: usize,
    seq: u64,
    max_retries: u32,
    in_flight: HashMap<String, InFlight>,
    retry: VecDeque<String>,
}

impl SentenceSource {
    pub fn new(config: &SpoutConfig) -> Self {
        Self {
            sentences: config.sentences.clone(),
            cursor: 0,
            seq: 0,
            max_retries: config.max_retries,
            in_flight: HashMap::new(),
            retry: VecDeque::new(),
        }
    }

    /// Failed sentences go first, under their original id.
    pub fn next_emission(&mut self) -> Option<(String, String)> {
        if let Some(id) = self.retry.pop_front() {
            if let Some(entry) = self.in_flight.get(&id) {
                return Some((id, entry.sentence.clone()));
            }
        }
        if self.sentences.is_empty() {
            return None;
        }

        let sentence = self.sentences[self.cursor].clone();
        self.cursor = (self.cursor + 1) % self.sentences.len();
        self.seq += 1;
        let id = format!("s-{}", self.seq);
        self.in_flight.insert(id.clone(), InFlight { sentence: sentence.clone(), attempts: 0 });
        Some((id, sentence))
    }

    pub fn ack(&mut self, id: &str) {
        self.in_flight.remove(id);
    }

    /// Schedule a replay. Returns `false` once the id is out of retries.
    pub fn fail(&mut self, id: &str) -> bool {
        let Some(entry) = self.in_flight.get_mut(id) else {
            return true;
        };
        if entry.attempts >= self.max_retries {
            self.in_flight.remove(id);
            return false;
        }
        entry.attempts += 1;
        self.retry.push_back(id.to_owned());
        true
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}
