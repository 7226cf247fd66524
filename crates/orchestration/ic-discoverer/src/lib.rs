//! ic-discoverer - AWS regional catalog discovery for infra-catalog.
//!
//! This crate builds a catalog of regions, services and per-region service
//! availability from the public global-infrastructure namespace of the
//! parameter store. It provides:
//!
//! - A parameter source abstraction with SSM and in-memory implementations
//! - Bounded exponential backoff with jitter and retry classification
//! - Batched, rate-limited execution with per-item failure isolation
//! - A versioned, TTL-bound snapshot cache with atomic writes
//! - Best-effort aggregation across independent pipelines
//!
//! # Example
//!
//! ```ignore
//! use ic_discoverer::{Discoverer, DiscoveryConfig, NoLaunchData, PipelineSelection};
//! use ic_discoverer::source::{SsmConfig, SsmParameterSource, create_ssm_client};
//!
//! let client = create_ssm_client(&SsmConfig::new().with_region("us-east-1")).await?;
//!
//! let config = DiscoveryConfig::new()
//!     .with_pipelines(PipelineSelection::all());
//!
//! let discoverer = Discoverer::new(SsmParameterSource::new(client), NoLaunchData, config)?;
//! let report = discoverer.run().await;
//!
//! eprintln!(
//!     "Discovered {} regions, {} warnings",
//!     report.catalog.regions.map_or(0, |r| r.len()),
//!     report.warnings.len()
//! );
//! ```

pub mod batch;
pub mod cache;
pub mod config;
pub mod discoverer;
pub mod launch;
pub mod report;
pub mod retry;
pub mod source;
pub mod stats;

pub use batch::{BatchConfig, BatchRun, BatchScheduler};
pub use cache::{CACHE_SCHEMA_VERSION, CacheStore, DEFAULT_TTL_SECS};
pub use config::{CacheConfig, DEFAULT_PARAMETER_ROOT, DiscoveryConfig, PipelineSelection};
pub use discoverer::{Discoverer, ZoneTally, tally_availability_zones};
pub use launch::{JsonFileLaunchData, LaunchDataSource, NoLaunchData, StaticLaunchData};
pub use report::{DiscoveryReport, ItemFailure, Pipeline, PipelineError, PipelineOutcome};
pub use retry::{RetryConfig, with_retry};
pub use source::{
    Fault, MemoryParameterSource, ParameterSource, SsmConfig, SsmParameterSource,
    create_ssm_client,
};
pub use stats::{DiscoveryStats, PipelineStats};
