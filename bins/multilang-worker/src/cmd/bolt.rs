use std::io::{Read, Write};

use serde_json::json;

use multilang_api::Record;
use multilang_engine::Bolt;

use crate::config::{BoltConfig, WorkerConfig};
use crate::error::WorkerError;

/// Run the word-splitting bolt on stdin/stdout (or a replayed session).
pub fn run(config: &WorkerConfig, input: Option<&str>) -> Result<(), WorkerError> {
    let bolt = Bolt::stdio(config.connection.clone());
    match input {
        Some(path) => drive(bolt.replace_input(super::open_replay(path)?)?, &config.bolt),
        None => drive(bolt, &config.bolt),
    }
}

pub fn drive<R: Read, W: Write>(mut bolt: Bolt<R, W>, config: &BoltConfig) -> Result<(), WorkerError> {
    let conf = bolt.initialize()?;
    let component = conf.component().unwrap_or("bolt").to_owned();
    bolt.log(&format!("{component}: split bolt ready"))?;

    let mut processed = 0u64;
    loop {
        let received = bolt.read_record()?;
        if let Some(record) = received.message {
            if record.is_heartbeat() {
                bolt.send_sync()?;
            } else {
                process(&mut bolt, &record, config)?;
                processed += 1;
            }
        }
        if received.end_of_stream {
            tracing::info!(processed, "host closed input");
            return Ok(());
        }
    }
}

/// Emit every word of the first field anchored to the record, then ack it.
/// A record without a text first field is failed.
fn process<R: Read, W: Write>(
    bolt: &mut Bolt<R, W>,
    record: &Record,
    config: &BoltConfig,
) -> Result<(), WorkerError> {
    let Some(sentence) = record.values.first().and_then(|v| v.as_str()) else {
        tracing::warn!(id = %record.id, stream = %record.source_stream, "no sentence in tuple");
        bolt.send_fail(&record.id)?;
        return Ok(());
    };

    for word in sentence.split_whitespace() {
        let word = if config.lowercase { word.to_lowercase() } else { word.to_owned() };
        bolt.emit(vec![json!(word)], &[record.id.as_str()], "")?;
    }
    bolt.send_ack(&record.id)?;
    Ok(())
}
