//! Manifest entries and their metadata model.
//!
//! A manifest entry is one blob reference plus metadata: the atomic unit a
//! version commit covers. Metadata is a closed JSON value model so that the
//! canonical form hashed into Merkle leaves is unambiguous.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{BlobId, DatasetId, EntryId};

/// A string-keyed metadata map. `BTreeMap` keeps keys in byte order.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// A JSON value as stored in manifest metadata.
///
/// Untagged, so metadata round-trips as plain JSON. Integers that fit in an
/// `i64` stay integers; every other number becomes a `Float`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<MetadataValue>),
    Map(BTreeMap<String, MetadataValue>),
}

impl MetadataValue {
    /// Borrow as a string, if this is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow as a map, if this is one.
    pub fn as_map(&self) -> Option<&BTreeMap<String, MetadataValue>> {
        match self {
            MetadataValue::Map(m) => Some(m),
            _ => None,
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        MetadataValue::String(s.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        MetadataValue::String(s)
    }
}

impl From<i64> for MetadataValue {
    fn from(n: i64) -> Self {
        MetadataValue::Int(n)
    }
}

impl From<f64> for MetadataValue {
    fn from(n: f64) -> Self {
        MetadataValue::Float(n)
    }
}

impl From<bool> for MetadataValue {
    fn from(b: bool) -> Self {
        MetadataValue::Bool(b)
    }
}

impl From<Vec<MetadataValue>> for MetadataValue {
    fn from(items: Vec<MetadataValue>) -> Self {
        MetadataValue::Array(items)
    }
}

impl From<BTreeMap<String, MetadataValue>> for MetadataValue {
    fn from(map: BTreeMap<String, MetadataValue>) -> Self {
        MetadataValue::Map(map)
    }
}

/// One blob reference inside a dataset. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub id: EntryId,
    pub dataset_id: DatasetId,
    pub blob_id: BlobId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl ManifestEntry {
    /// Create an entry with a freshly generated id and empty metadata.
    pub fn new(dataset_id: DatasetId, blob_id: BlobId) -> Self {
        Self {
            id: EntryId::generate(),
            dataset_id,
            blob_id,
            path: None,
            metadata: Metadata::new(),
        }
    }

    /// Set the path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Insert a metadata field.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
