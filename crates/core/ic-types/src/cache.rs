//! Persisted discovery snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A versioned, timestamped discovery result as stored on disk.
///
/// On-disk shape: `{ "schemaVersion": "...", "savedAt": "<RFC 3339>", "payload": ... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSnapshot<T> {
    /// Schema version of the writer
    pub schema_version: String,

    /// When the snapshot was written
    pub saved_at: DateTime<Utc>,

    /// The cached discovery result
    pub payload: T,
}

impl<T> CacheSnapshot<T> {
    pub fn new(schema_version: impl Into<String>, saved_at: DateTime<Utc>, payload: T) -> Self {
        Self {
            schema_version: schema_version.into(),
            saved_at,
            payload,
        }
    }
}
