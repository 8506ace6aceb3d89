//! Feature sources and sinks.
//!
//! Readers stream [`Feature`] records into a channel; the writer turns
//! emitted JSON payloads back into JSON lines. Reading and transforming run
//! on separate threads, with the bounded channel providing backpressure.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crossbeam_channel::Sender;
use thiserror::Error;

use gx_model::Feature;

mod geojson;
mod jsonlines;
mod writer;

pub use geojson::GeoJsonReader;
pub use jsonlines::JsonLinesReader;
pub use writer::FeatureWriter;

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed record: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("downstream channel closed")]
    ChannelClosed,

    #[error("unsupported source format: {0:?}")]
    UnsupportedFormat(String),
}

/// A streaming source of feature records.
pub trait FeatureReader {
    /// Read every record, sending each into `out`. Returns the record count.
    fn read(&mut self, out: &Sender<Feature>) -> Result<usize, ReadError>;
}

/// Open a reader for `path`, dispatched on the file extension.
pub fn open(path: &Path) -> Result<Box<dyn FeatureReader + Send>, ReadError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    match extension.as_str() {
        "geojson" => {
            let file = File::open(path)?;
            Ok(Box::new(GeoJsonReader::new(BufReader::new(file))))
        }
        "jsonlines" | "ndjson" => {
            let file = File::open(path)?;
            Ok(Box::new(JsonLinesReader::new(BufReader::new(file))))
        }
        other => Err(ReadError::UnsupportedFormat(other.to_string())),
    }
}
