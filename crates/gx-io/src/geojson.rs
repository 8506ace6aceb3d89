//! GeoJSON FeatureCollection source.

use std::io::Read;

use crossbeam_channel::Sender;
use serde::Deserialize;
use tracing::debug;

use gx_model::Feature;

use crate::{FeatureReader, ReadError};

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

/// Reads a FeatureCollection document and streams its features.
///
/// The whole document is parsed up front; line-oriented inputs that should
/// stay constant-memory belong in [`crate::JsonLinesReader`].
pub struct GeoJsonReader<R: Read> {
    input: Option<R>,
}

impl<R: Read> GeoJsonReader<R> {
    pub fn new(input: R) -> Self {
        Self { input: Some(input) }
    }
}

impl<R: Read> FeatureReader for GeoJsonReader<R> {
    fn read(&mut self, out: &Sender<Feature>) -> Result<usize, ReadError> {
        let input = self.input.take().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "reader already consumed")
        })?;
        let collection: FeatureCollection = serde_json::from_reader(input)?;
        let count = collection.features.len();
        for feature in collection.features {
            out.send(feature).map_err(|_| ReadError::ChannelClosed)?;
        }
        debug!(count, "geojson collection drained");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn streams_collection_features() {
        let doc = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {"name": "a"}, "geometry": null},
                {"type": "Feature", "properties": {"name": "b"}, "geometry": null}
            ]
        }"#;
        let (tx, rx) = unbounded();
        let count = GeoJsonReader::new(doc.as_bytes()).read(&tx).unwrap();
        drop(tx);
        assert_eq!(count, 2);
        let names: Vec<String> = rx.iter().map(|f: Feature| f.properties["name"].clone()).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn empty_collection_is_fine() {
        let (tx, _rx) = unbounded();
        let count = GeoJsonReader::new(r#"{"type": "FeatureCollection"}"#.as_bytes())
            .read(&tx)
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn malformed_document_errors() {
        let (tx, _rx) = unbounded();
        let result = GeoJsonReader::new(&b"{not json"[..]).read(&tx);
        assert!(matches!(result, Err(ReadError::Malformed(_))));
    }
}
