pub mod bolt;
pub mod spout;

use std::fs::File;
use std::io::BufReader;

use crate::error::WorkerError;

/// Open a recorded session for replay.
pub fn open_replay(path: &str) -> Result<BufReader<File>, WorkerError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| WorkerError::Input { path: path.to_owned(), source })
}
