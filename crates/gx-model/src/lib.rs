//! Shared record model for the GX toolchain.
//!
//! A [`Feature`] is the unit of work: readers produce them, a worker VM
//! transforms one at a time, and emitted payloads are serialized back out as
//! JSON lines.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// String-keyed, string-valued attribute map of a feature.
///
/// Insertion order is preserved so records survive a transform round-trip
/// with their keys intact.
pub type PropertyMap = IndexMap<String, String>;

/// A geospatial feature record.
///
/// `id` and `geometry` are opaque JSON payloads; scripts can only pass them
/// around or hand them to builtin functions. `properties` is the flat
/// attribute map dotted paths descend into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(default)]
    pub id: Json,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub properties: PropertyMap,
    #[serde(default)]
    pub geometry: Json,
}

impl Feature {
    /// An empty feature of the given type.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            id: Json::Null,
            kind: kind.into(),
            properties: PropertyMap::new(),
            geometry: Json::Null,
        }
    }
}
