//! On-disk snapshot cache for discovery results.
//!
//! Each pipeline persists its result as a [`CacheSnapshot`] JSON file. Reads
//! fail soft: a missing, unreadable, corrupt or foreign-version file is a
//! cache miss, never an error. Writes go to a temporary file in the same
//! directory and are renamed into place, so a concurrent reader sees either
//! the old snapshot or the new one.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use ic_error::{IcError, Result};
use ic_types::CacheSnapshot;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

/// Schema version written into every snapshot.
///
/// Bump whenever the payload shape changes; older files are then ignored.
pub const CACHE_SCHEMA_VERSION: &str = "2";

/// Default snapshot lifetime: 24 hours.
pub const DEFAULT_TTL_SECS: u64 = 24 * 60 * 60;

/// A single snapshot file.
#[derive(Debug, Clone)]
pub struct CacheStore {
    path: PathBuf,
    schema_version: String,
}

impl CacheStore {
    /// Create a store for `path` using the current schema version.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_schema_version(path, CACHE_SCHEMA_VERSION)
    }

    pub fn with_schema_version(path: impl Into<PathBuf>, schema_version: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            schema_version: schema_version.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema_version(&self) -> &str {
        &self.schema_version
    }

    /// Read the snapshot, treating any failure as absent.
    ///
    /// Files without a `schemaVersion` field, or with a different version,
    /// are logged as invalidated and reported as absent.
    pub async fn load<T: DeserializeOwned>(&self) -> Option<CacheSnapshot<T>> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No cache file");
                return None;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Unreadable cache file, ignoring");
                return None;
            }
        };

        let document: serde_json::Value = match serde_json::from_slice(&raw) {
            Ok(document) => document,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Corrupt cache file, ignoring");
                return None;
            }
        };

        match document.get("schemaVersion").and_then(|v| v.as_str()) {
            None => {
                info!(path = %self.path.display(), "Cache file has no schemaVersion, invalidating");
                return None;
            }
            Some(version) if version != self.schema_version => {
                info!(
                    path = %self.path.display(),
                    found = version,
                    expected = %self.schema_version,
                    "Cache schema version mismatch, invalidating"
                );
                return None;
            }
            Some(_) => {}
        }

        match serde_json::from_value(document) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Cache payload does not match schema, ignoring");
                None
            }
        }
    }

    /// Load the snapshot only if it is still valid for `ttl`.
    pub async fn load_valid<T: DeserializeOwned>(&self, ttl: Duration) -> Option<CacheSnapshot<T>> {
        let snapshot = self.load::<T>().await?;

        if self.is_valid(&snapshot, ttl) {
            debug!(path = %self.path.display(), saved_at = %snapshot.saved_at, "Cache hit");
            Some(snapshot)
        } else {
            info!(
                path = %self.path.display(),
                saved_at = %snapshot.saved_at,
                ttl_secs = ttl.as_secs(),
                "Cache expired"
            );
            None
        }
    }

    /// Persist `payload` with the current schema version and time.
    pub async fn save<T: Serialize>(&self, payload: &T) -> Result<()> {
        let snapshot = CacheSnapshot::new(self.schema_version.clone(), Utc::now(), payload);
        let buf = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| IcError::Cache(format!("failed to serialize snapshot: {e}")))?;

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                IcError::Cache(format!("failed to create {}: {e}", dir.display()))
            })?;
        }

        let tmp_path = self.temp_path();
        if let Err(e) = tokio::fs::write(&tmp_path, &buf).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(IcError::Cache(format!(
                "failed to write {}: {e}",
                tmp_path.display()
            )));
        }

        if let Err(e) = tokio::fs::rename(&tmp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(IcError::Cache(format!(
                "failed to move snapshot into {}: {e}",
                self.path.display()
            )));
        }

        debug!(path = %self.path.display(), bytes = buf.len(), "Saved cache snapshot");
        Ok(())
    }

    /// True iff the snapshot has this store's schema version and is no older than `ttl`.
    ///
    /// Ages are compared in whole seconds, so a snapshot is valid for any
    /// `ttl` during the second it was saved.
    pub fn is_valid<T>(&self, snapshot: &CacheSnapshot<T>, ttl: Duration) -> bool {
        self.is_valid_at(snapshot, ttl, Utc::now())
    }

    /// [`is_valid`](Self::is_valid) evaluated at a fixed instant.
    pub fn is_valid_at<T>(&self, snapshot: &CacheSnapshot<T>, ttl: Duration, now: DateTime<Utc>) -> bool {
        if snapshot.schema_version != self.schema_version {
            return false;
        }

        // Negative ages come from clock skew and count as fresh.
        let age_secs = now.signed_duration_since(snapshot.saved_at).num_seconds();
        match u64::try_from(age_secs) {
            Ok(age) => age <= ttl.as_secs(),
            Err(_) => true,
        }
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "snapshot".to_string());
        self.path
            .with_file_name(format!("{file_name}.{}.tmp", std::process::id()))
    }
}
