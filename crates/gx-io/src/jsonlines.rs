//! Newline-delimited JSON source.

use std::io::BufRead;

use crossbeam_channel::Sender;
use tracing::debug;

use gx_model::Feature;

use crate::{FeatureReader, ReadError};

/// One feature per line; blank lines are skipped.
pub struct JsonLinesReader<R: BufRead> {
    input: R,
}

impl<R: BufRead> JsonLinesReader<R> {
    pub fn new(input: R) -> Self {
        Self { input }
    }
}

impl<R: BufRead> FeatureReader for JsonLinesReader<R> {
    fn read(&mut self, out: &Sender<Feature>) -> Result<usize, ReadError> {
        let mut count = 0;
        let mut line = String::new();
        loop {
            line.clear();
            if self.input.read_line(&mut line)? == 0 {
                break;
            }
            if line.trim().is_empty() {
                continue;
            }
            let feature: Feature = serde_json::from_str(&line)?;
            out.send(feature).map_err(|_| ReadError::ChannelClosed)?;
            count += 1;
        }
        debug!(count, "json lines drained");
        Ok(count)
    }
}
