//! Configuration types for the discoverer.

use std::path::PathBuf;
use std::time::Duration;

use ic_error::{IcError, Result};
use ic_types::{ParameterPath, Region};
use serde::{Deserialize, Serialize};

use crate::batch::BatchConfig;
use crate::cache::DEFAULT_TTL_SECS;
use crate::retry::RetryConfig;

/// Which discovery pipelines to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSelection {
    pub regions: bool,
    pub services: bool,
    /// Region-service availability mapping (one listing per region, opt-in)
    pub region_services: bool,
}

impl Default for PipelineSelection {
    fn default() -> Self {
        Self {
            regions: true,
            services: true,
            region_services: false,
        }
    }
}

impl PipelineSelection {
    pub fn all() -> Self {
        Self {
            regions: true,
            services: true,
            region_services: true,
        }
    }

    pub fn regions_only() -> Self {
        Self {
            regions: true,
            services: false,
            region_services: false,
        }
    }

    pub fn services_only() -> Self {
        Self {
            regions: false,
            services: true,
            region_services: false,
        }
    }

    pub fn with_region_services(mut self, enabled: bool) -> Self {
        self.region_services = enabled;
        self
    }

    pub fn is_empty(&self) -> bool {
        !(self.regions || self.services || self.region_services)
    }
}

/// Configuration for the snapshot cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory holding one snapshot file per pipeline
    pub dir: PathBuf,

    /// Maximum snapshot age in whole seconds
    pub ttl_secs: u64,

    /// Skip reading the cache but still write it afterwards
    pub force_refresh: bool,

    /// Disable both reading and writing
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".cache"),
            ttl_secs: DEFAULT_TTL_SECS,
            force_refresh: false,
            enabled: true,
        }
    }
}

impl CacheConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Default::default()
        }
    }

    /// Set the snapshot lifetime.
    ///
    /// The lifetime is kept in whole seconds; a partial second rounds up.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        let partial = u64::from(ttl.subsec_nanos() > 0);
        self.ttl_secs = ttl.as_secs().saturating_add(partial);
        self
    }

    /// Always fetch fresh data (the result is still cached).
    pub fn with_force_refresh(mut self, force_refresh: bool) -> Self {
        self.force_refresh = force_refresh;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub(crate) fn regions_path(&self) -> PathBuf {
        self.dir.join("regions.json")
    }

    pub(crate) fn services_path(&self) -> PathBuf {
        self.dir.join("services.json")
    }

    pub(crate) fn region_services_path(&self) -> PathBuf {
        self.dir.join("region-services.json")
    }
}

/// Root of the public global-infrastructure parameter namespace.
pub const DEFAULT_PARAMETER_ROOT: &str = "/aws/service/global-infrastructure";

/// Configuration for a discovery run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Pipelines to run
    pub pipelines: PipelineSelection,

    /// Parameter path under which `regions`, `availability-zones` and
    /// `services` live
    pub parameter_root: String,

    /// Restrict the region-service mapping to one region
    pub target_region: Option<String>,

    /// Batching and rate limiting
    pub batch: BatchConfig,

    /// Backoff for every remote call
    pub retry: RetryConfig,

    /// Snapshot cache
    pub cache: CacheConfig,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            pipelines: PipelineSelection::default(),
            parameter_root: DEFAULT_PARAMETER_ROOT.to_string(),
            target_region: None,
            batch: BatchConfig::default(),
            retry: RetryConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl DiscoveryConfig {
    /// Create a new discovery configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pipelines(mut self, pipelines: PipelineSelection) -> Self {
        self.pipelines = pipelines;
        self
    }

    /// Read from a different namespace root (e.g. a seeded LocalStack copy).
    pub fn with_parameter_root(mut self, root: impl Into<String>) -> Self {
        self.parameter_root = root.into();
        self
    }

    pub fn with_target_region(mut self, region: impl Into<String>) -> Self {
        self.target_region = Some(region.into());
        self
    }

    pub fn with_batch(mut self, batch: BatchConfig) -> Self {
        self.batch = batch;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Check the configuration for values that cannot work.
    pub fn validate(&self) -> Result<()> {
        self.batch.validate()?;

        if self.pipelines.is_empty() {
            return Err(IcError::Config("no discovery pipeline selected".to_string()));
        }

        ParameterPath::new(self.parameter_root.as_str())
            .map_err(|e| IcError::Config(format!("invalid parameter root: {e}")))?;

        if self.retry.max_attempts == 0 {
            return Err(IcError::Config("max attempts must be at least 1".to_string()));
        }

        if let Some(region) = &self.target_region {
            if !Region::is_valid_code(region) {
                return Err(IcError::Config(format!("invalid target region '{region}'")));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovery_config_defaults() {
        let config = DiscoveryConfig::new();

        assert!(config.pipelines.regions);
        assert!(config.pipelines.services);
        assert!(!config.pipelines.region_services);
        assert!(config.target_region.is_none());
        assert_eq!(config.parameter_root, DEFAULT_PARAMETER_ROOT);
        assert_eq!(config.cache.ttl(), Duration::from_secs(86_400));
        assert!(config.cache.enabled);
        assert!(!config.cache.force_refresh);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_discovery_config_builder() {
        let config = DiscoveryConfig::new()
            .with_pipelines(PipelineSelection::regions_only().with_region_services(true))
            .with_target_region("eu-west-1")
            .with_batch(BatchConfig::new().with_batch_size(5))
            .with_cache(
                CacheConfig::new("/tmp/ic")
                    .with_ttl(Duration::from_secs(60))
                    .with_force_refresh(true),
            );

        assert!(config.pipelines.regions);
        assert!(!config.pipelines.services);
        assert!(config.pipelines.region_services);
        assert_eq!(config.target_region.as_deref(), Some("eu-west-1"));
        assert_eq!(config.batch.batch_size, 5);
        assert_eq!(config.cache.ttl_secs, 60);
        assert!(config.cache.force_refresh);
        assert_eq!(
            config.cache.services_path(),
            PathBuf::from("/tmp/ic/services.json")
        );
    }

    #[test]
    fn test_ttl_rounds_partial_seconds_up() {
        let ttl = |d: Duration| CacheConfig::default().with_ttl(d).ttl_secs;

        assert_eq!(ttl(Duration::ZERO), 0);
        assert_eq!(ttl(Duration::from_millis(1)), 1);
        assert_eq!(ttl(Duration::from_millis(1_500)), 2);
        assert_eq!(ttl(Duration::from_secs(3_600)), 3_600);
        assert_eq!(ttl(Duration::MAX), u64::MAX);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let no_pipelines = DiscoveryConfig::new().with_pipelines(PipelineSelection {
            regions: false,
            services: false,
            region_services: false,
        });
        assert!(no_pipelines.validate().is_err());

        let zero_batch = DiscoveryConfig::new().with_batch(BatchConfig::new().with_batch_size(0));
        assert!(zero_batch.validate().is_err());

        let bad_region = DiscoveryConfig::new().with_target_region("not a region");
        assert!(bad_region.validate().is_err());

        let bad_root = DiscoveryConfig::new().with_parameter_root("relative/root");
        assert!(bad_root.validate().is_err());
    }
}
