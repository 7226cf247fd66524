//! Launch-date enrichment sources.
//!
//! The discoverer only sees a `region code -> LaunchInfo` map. Where the map
//! comes from (an announcement feed, a maintained JSON file, a fixture) is
//! up to the implementation. A failing source means "no enrichment".

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use ic_error::{IcError, Result};
use ic_types::LaunchInfo;
use tracing::debug;

/// Supplies launch metadata keyed by region code.
#[async_trait]
pub trait LaunchDataSource: Send + Sync {
    async fn fetch(&self) -> Result<HashMap<String, LaunchInfo>>;
}

/// Source that never enriches.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLaunchData;

#[async_trait]
impl LaunchDataSource for NoLaunchData {
    async fn fetch(&self) -> Result<HashMap<String, LaunchInfo>> {
        Ok(HashMap::new())
    }
}

/// Fixed, in-memory launch data.
#[derive(Debug, Clone, Default)]
pub struct StaticLaunchData(pub HashMap<String, LaunchInfo>);

#[async_trait]
impl LaunchDataSource for StaticLaunchData {
    async fn fetch(&self) -> Result<HashMap<String, LaunchInfo>> {
        Ok(self.0.clone())
    }
}

/// Launch data read from a JSON file shaped `{ "<code>": { "launchDate": ..., "announcementUrl": ... } }`.
#[derive(Debug, Clone)]
pub struct JsonFileLaunchData {
    path: PathBuf,
}

impl JsonFileLaunchData {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl LaunchDataSource for JsonFileLaunchData {
    async fn fetch(&self) -> Result<HashMap<String, LaunchInfo>> {
        let raw = tokio::fs::read(&self.path).await.map_err(|e| {
            IcError::Config(format!("cannot read launch data {}: {e}", self.path.display()))
        })?;

        let data: HashMap<String, LaunchInfo> = serde_json::from_slice(&raw).map_err(|e| {
            IcError::Validation(format!("invalid launch data {}: {e}", self.path.display()))
        })?;

        debug!(path = %self.path.display(), regions = data.len(), "Loaded launch data");
        Ok(data)
    }
}

#[async_trait]
impl<L: LaunchDataSource + ?Sized> LaunchDataSource for Box<L> {
    async fn fetch(&self) -> Result<HashMap<String, LaunchInfo>> {
        (**self).fetch().await
    }
}
