//! CLI argument definitions for ic-discoverer.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use ic_discoverer::{
    BatchConfig, CacheConfig, DiscoveryConfig, PipelineSelection, RetryConfig, SsmConfig,
};

/// AWS regional catalog discovery.
///
/// Reads regions, availability zones and services from the public
/// global-infrastructure namespace of the SSM parameter store and writes one
/// JSON document per entity type.
///
/// ## Examples
///
/// Regions and services:
///   ic-discoverer --output-dir ./catalog
///
/// Everything, including the per-region service map:
///   ic-discoverer --include-service-map
///
/// Services available in a single region, ignoring the cache:
///   ic-discoverer --services-only --include-service-map \
///       --target-region eu-west-1 --force-refresh
#[derive(Parser, Debug)]
#[command(name = "ic-discoverer")]
#[command(version, about, long_about = None)]
pub struct Cli {
    // === Pipeline Selection ===
    /// Only discover regions
    #[arg(long, conflicts_with = "services_only")]
    pub regions_only: bool,

    /// Only discover services
    #[arg(long)]
    pub services_only: bool,

    /// Also map which services are offered in each region (one listing per region)
    #[arg(long)]
    pub include_service_map: bool,

    /// Restrict the service map to a single region
    #[arg(long, value_parser = parse_region_code)]
    pub target_region: Option<String>,

    // === Cache Options ===
    /// Ignore cached snapshots (fresh results are still cached)
    #[arg(long)]
    pub force_refresh: bool,

    /// Neither read nor write the cache
    #[arg(long, conflicts_with = "force_refresh")]
    pub no_cache: bool,

    /// Directory for cache snapshots
    #[arg(long, env = "IC_CACHE_DIR", default_value = ".cache")]
    pub cache_dir: PathBuf,

    /// Cache lifetime in hours
    #[arg(long, default_value = "24")]
    pub cache_ttl_hours: u64,

    // === Rate Limiting ===
    /// Lookups run concurrently per batch (must be >= 1)
    #[arg(long, default_value = "10", value_parser = parse_positive::<usize>)]
    pub batch_size: usize,

    /// Pause between batches in milliseconds
    #[arg(long, default_value = "500")]
    pub batch_delay_ms: u64,

    /// Attempts per remote call before giving up (must be >= 1)
    #[arg(long, default_value = "5", value_parser = parse_positive::<u32>)]
    pub max_attempts: u32,

    // === Output Options ===
    /// Directory the catalog documents are written to
    #[arg(long, short, env = "IC_OUTPUT_DIR", default_value = "output")]
    pub output_dir: PathBuf,

    /// JSON file with launch dates keyed by region code
    #[arg(long, env = "IC_LAUNCH_DATA")]
    pub launch_data: Option<PathBuf>,

    // === AWS Configuration ===
    /// AWS region used to reach the parameter store
    #[arg(long, env = "AWS_REGION", default_value = "us-east-1")]
    pub aws_region: String,

    /// AWS profile name
    #[arg(long, env = "AWS_PROFILE")]
    pub profile: Option<String>,

    /// Custom SSM endpoint URL (for LocalStack)
    #[arg(long, env = "IC_SSM_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Parameter namespace root
    #[arg(long, env = "IC_PARAMETER_ROOT", default_value = ic_discoverer::DEFAULT_PARAMETER_ROOT)]
    pub parameter_root: String,

    // === Logging Options ===
    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,
}

impl Cli {
    pub fn pipelines(&self) -> PipelineSelection {
        let base = if self.regions_only {
            PipelineSelection::regions_only()
        } else if self.services_only {
            PipelineSelection::services_only()
        } else {
            PipelineSelection::default()
        };
        base.with_region_services(self.include_service_map)
    }

    pub fn discovery_config(&self) -> DiscoveryConfig {
        let cache = CacheConfig::new(&self.cache_dir)
            .with_ttl(Duration::from_secs(self.cache_ttl_hours.saturating_mul(3600)))
            .with_force_refresh(self.force_refresh)
            .with_enabled(!self.no_cache);

        let mut config = DiscoveryConfig::new()
            .with_pipelines(self.pipelines())
            .with_parameter_root(&self.parameter_root)
            .with_batch(
                BatchConfig::new()
                    .with_batch_size(self.batch_size)
                    .with_inter_batch_delay_ms(self.batch_delay_ms),
            )
            .with_retry(RetryConfig::new().with_max_attempts(self.max_attempts))
            .with_cache(cache);

        if let Some(region) = &self.target_region {
            config = config.with_target_region(region);
        }

        config
    }

    pub fn ssm_config(&self) -> SsmConfig {
        let mut config = SsmConfig::new().with_region(&self.aws_region);

        if let Some(endpoint) = &self.endpoint {
            config = config.with_endpoint(endpoint);
        }

        if let Some(profile) = &self.profile {
            config = config.with_profile(profile);
        }

        config
    }
}

/// Log level argument.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    /// Trace level (most verbose)
    Trace,
    /// Debug level
    Debug,
    /// Info level (default)
    Info,
    /// Warning level
    Warn,
    /// Error level (least verbose)
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

fn parse_positive<T>(s: &str) -> Result<T, String>
where
    T: std::str::FromStr + PartialOrd + From<u8>,
{
    match s.parse::<T>() {
        Ok(value) if value >= T::from(1) => Ok(value),
        Ok(_) => Err("must be at least 1".to_string()),
        Err(_) => Err(format!("'{s}' is not a whole number")),
    }
}

fn parse_region_code(s: &str) -> Result<String, String> {
    if ic_types::Region::is_valid_code(s) {
        Ok(s.to_string())
    } else {
        Err(format!("'{}' is not a region code like us-east-1", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("ic-discoverer").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&[]);
        let config = cli.discovery_config();

        assert_eq!(config.pipelines, PipelineSelection::default());
        assert_eq!(config.batch.batch_size, 10);
        assert_eq!(config.batch.inter_batch_delay_ms, 500);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.cache.ttl_secs, 24 * 3600);
        assert!(config.cache.enabled);
        assert!(config.target_region.is_none());
    }

    #[test]
    fn test_pipeline_flags() {
        let cli = parse(&["--regions-only", "--include-service-map"]);
        assert_eq!(
            cli.pipelines(),
            PipelineSelection::regions_only().with_region_services(true)
        );

        let cli = parse(&["--services-only"]);
        assert_eq!(cli.pipelines(), PipelineSelection::services_only());
    }

    #[test]
    fn test_conflicting_flags_rejected() {
        let both = ["ic-discoverer", "--regions-only", "--services-only"];
        assert!(Cli::try_parse_from(both).is_err());

        let cache = ["ic-discoverer", "--force-refresh", "--no-cache"];
        assert!(Cli::try_parse_from(cache).is_err());
    }

    #[test]
    fn test_tuning_flags() {
        let cli = parse(&[
            "--batch-size",
            "4",
            "--batch-delay-ms",
            "250",
            "--max-attempts",
            "3",
            "--cache-ttl-hours",
            "1",
            "--no-cache",
            "--target-region",
            "eu-west-1",
        ]);
        let config = cli.discovery_config();

        assert_eq!(config.batch.batch_size, 4);
        assert_eq!(config.batch.inter_batch_delay_ms, 250);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.cache.ttl_secs, 3600);
        assert!(!config.cache.enabled);
        assert_eq!(config.target_region.as_deref(), Some("eu-west-1"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(Cli::try_parse_from(["ic-discoverer", "--batch-size", "0"]).is_err());
        assert!(Cli::try_parse_from(["ic-discoverer", "--max-attempts", "0"]).is_err());
        assert!(Cli::try_parse_from(["ic-discoverer", "--target-region", "mars"]).is_err());
    }

    #[test]
    fn test_ssm_config() {
        let cli = parse(&[
            "--aws-region",
            "eu-central-1",
            "--endpoint",
            "http://localhost:4566",
        ]);
        let config = cli.ssm_config();

        assert_eq!(config.region.as_deref(), Some("eu-central-1"));
        assert_eq!(config.endpoint.as_deref(), Some("http://localhost:4566"));
    }
}
