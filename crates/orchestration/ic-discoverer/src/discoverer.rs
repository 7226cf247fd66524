//! Discovery aggregator.
//!
//! Drives the three catalog pipelines over a [`ParameterSource`]. Each one
//! follows the same shape: list codes under a fixed prefix, fetch per-code
//! metadata through the [`BatchScheduler`] and [`with_retry`], then assemble
//! entities once every batch has settled.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::Utc;
use ic_error::{IcError, Result, classify_error};
use ic_types::{
    AvailabilityZone, LaunchInfo, ParameterPath, Region, RegionServiceAvailability, Service,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::batch::BatchScheduler;
use crate::cache::CacheStore;
use crate::config::DiscoveryConfig;
use crate::launch::{LaunchDataSource, NoLaunchData};
use crate::report::{DiscoveryReport, ItemFailure, Pipeline, PipelineError, PipelineOutcome};
use crate::retry::with_retry;
use crate::source::ParameterSource;
use crate::stats::{DiscoveryStats, PipelineStats};

const REGIONS: &str = "regions";
const AVAILABILITY_ZONES: &str = "availability-zones";
const SERVICES: &str = "services";
const LONG_NAME: &str = "longName";
const PARENT_REGION: &str = "parent-region";

/// Parameter paths of the global-infrastructure namespace.
#[derive(Debug, Clone)]
struct Namespace {
    regions: ParameterPath,
    availability_zones: ParameterPath,
    services: ParameterPath,
}

impl Namespace {
    fn new(root: &str) -> Result<Self> {
        let root = ParameterPath::new(root)?;
        Ok(Self {
            regions: root.join(REGIONS)?,
            availability_zones: root.join(AVAILABILITY_ZONES)?,
            services: root.join(SERVICES)?,
        })
    }

    fn region_name(&self, code: &str) -> Result<ParameterPath> {
        self.regions.join(code)?.join(LONG_NAME)
    }

    fn zone_parent(&self, zone_id: &str) -> Result<ParameterPath> {
        self.availability_zones.join(zone_id)?.join(PARENT_REGION)
    }

    fn service_name(&self, code: &str) -> Result<ParameterPath> {
        self.services.join(code)?.join(LONG_NAME)
    }

    fn region_services(&self, code: &str) -> Result<ParameterPath> {
        self.regions.join(code)?.join(SERVICES)
    }
}

/// Availability zones folded into per-region counts.
#[derive(Debug, Default)]
pub struct ZoneTally {
    /// Every zone, with its parent region when the lookup succeeded
    pub zones: Vec<AvailabilityZone>,

    /// Mapped zones per region code
    pub counts: BTreeMap<String, u32>,

    /// Zones left out of every count
    pub failures: Vec<ItemFailure>,
}

impl ZoneTally {
    /// Total number of zones attributed to some region.
    pub fn counted(&self) -> u64 {
        self.counts.values().map(|&n| u64::from(n)).sum()
    }
}

/// Fold `(zone id, parent region lookup)` results into per-region counts.
///
/// A zone whose lookup failed, or returned an empty region code, is excluded
/// from every count and reported as a failure; it is never attributed to a
/// guessed region.
pub fn tally_availability_zones(results: Vec<(String, Result<String>)>) -> ZoneTally {
    let mut tally = ZoneTally::default();

    for (id, result) in results {
        let parent = match result {
            Ok(code) if !code.trim().is_empty() => Some(code.trim().to_string()),
            Ok(_) => {
                let error = IcError::Validation(format!("zone {id} has an empty parent region"));
                tally.failures.push(ItemFailure::new(Pipeline::Regions, &id, error));
                None
            }
            Err(error) => {
                tally.failures.push(ItemFailure::new(Pipeline::Regions, &id, error));
                None
            }
        };

        if let Some(code) = &parent {
            *tally.counts.entry(code.clone()).or_default() += 1;
        }
        tally.zones.push(AvailabilityZone {
            id,
            parent_region_code: parent,
        });
    }

    tally
}

/// Builds the regional catalog from a parameter source.
///
/// # Example
///
/// ```ignore
/// let client = create_ssm_client(&SsmConfig::new().with_region("us-east-1")).await?;
/// let discoverer = Discoverer::new(
///     SsmParameterSource::new(client),
///     NoLaunchData,
///     DiscoveryConfig::new(),
/// )?;
///
/// let report = discoverer.run().await;
/// ```
pub struct Discoverer<S, L = NoLaunchData> {
    source: S,
    launch: L,
    config: DiscoveryConfig,
    namespace: Namespace,
    scheduler: BatchScheduler,
    cancel: CancellationToken,
}

impl<S: ParameterSource, L: LaunchDataSource> Discoverer<S, L> {
    /// Create a discoverer, rejecting an unusable configuration.
    pub fn new(source: S, launch: L, config: DiscoveryConfig) -> Result<Self> {
        config.validate()?;
        let namespace = Namespace::new(&config.parameter_root)?;
        let scheduler = BatchScheduler::new(config.batch.clone())?;

        Ok(Self {
            source,
            launch,
            config,
            namespace,
            scheduler,
            cancel: CancellationToken::new(),
        })
    }

    /// Observe `cancel` between batches and during retry backoff.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Run every selected pipeline.
    ///
    /// Regions and services run concurrently; the region-service mapping
    /// runs afterwards over the discovered (or targeted) regions. A failed
    /// pipeline is recorded in [`DiscoveryReport::errors`] and never hides
    /// the output of the others.
    pub async fn run(&self) -> DiscoveryReport {
        let pipelines = self.config.pipelines;
        let mut report = DiscoveryReport {
            stats: DiscoveryStats::new(),
            ..Default::default()
        };

        info!(
            regions = pipelines.regions,
            services = pipelines.services,
            region_services = pipelines.region_services,
            batch_size = self.config.batch.batch_size,
            inter_batch_delay_ms = self.config.batch.inter_batch_delay_ms,
            "Starting discovery"
        );

        let (regions, services) = tokio::join!(
            async {
                if pipelines.regions {
                    Some(self.discover_regions().await)
                } else {
                    None
                }
            },
            async {
                if pipelines.services {
                    Some(self.discover_services().await)
                } else {
                    None
                }
            },
        );

        if let Some(outcome) = regions {
            report.catalog.regions = settle(&mut report, Pipeline::Regions, outcome);
        }
        if let Some(outcome) = services {
            report.catalog.services = settle(&mut report, Pipeline::Services, outcome);
        }

        if pipelines.region_services {
            let outcome = match self.mapping_targets(&report).await {
                Ok(codes) => self.discover_region_services(&codes).await,
                Err(e) => Err(e),
            };
            report.catalog.region_services = settle(&mut report, Pipeline::RegionServices, outcome);
        }

        report.stats.complete();

        info!(
            regions = report.catalog.regions.as_ref().map_or(0, Vec::len),
            services = report.catalog.services.as_ref().map_or(0, Vec::len),
            region_services = report.catalog.region_services.as_ref().map_or(0, Vec::len),
            warnings = report.warnings.len(),
            errors = report.errors.len(),
            duration_ms = report.stats.duration().map_or(0, |d| d.num_milliseconds()),
            "Discovery complete"
        );

        report
    }

    /// Discover every region with its display name, zone count and launch data.
    pub async fn discover_regions(&self) -> Result<PipelineOutcome<Vec<Region>>> {
        let store = CacheStore::new(self.config.cache.regions_path());
        if let Some(mut regions) = self.load_cached::<Vec<Region>>(&store, Pipeline::Regions).await {
            apply_launch_data(&mut regions, &self.launch_data().await);
            return Ok(PipelineOutcome::cached(regions));
        }

        info!(prefix = %self.namespace.regions, "Discovering regions");
        let mut stats = PipelineStats::default();
        let mut warnings = Vec::new();

        let codes = self.list_region_codes(&mut warnings).await?;
        if codes.is_empty() {
            return Err(IcError::Validation(format!(
                "no regions listed under {}",
                self.namespace.regions
            )));
        }

        let names = self
            .fetch_names(
                Pipeline::Regions,
                codes,
                |code| self.namespace.region_name(code),
                &mut stats,
                &mut warnings,
            )
            .await?;

        let zone_counts = self.map_availability_zones(&mut stats, &mut warnings).await?;
        let zones_listed = zone_counts.is_some();
        let zone_counts = zone_counts.unwrap_or_default();

        let mut regions: Vec<Region> = names
            .into_iter()
            .map(|(code, name)| {
                let availability_zone_count = zone_counts.get(&code).copied().unwrap_or(0);
                Region {
                    code,
                    name,
                    availability_zone_count,
                    launch_date: None,
                    announcement_url: None,
                }
            })
            .collect();

        // Launch data is merged on every run, so snapshots never carry it.
        if zones_listed {
            self.store_cached(&store, Pipeline::Regions, &regions).await;
        } else {
            info!("Zone counts are placeholders, region snapshot not cached");
        }

        apply_launch_data(&mut regions, &self.launch_data().await);

        info!(
            regions = regions.len(),
            availability_zones = zone_counts.values().sum::<u32>(),
            warnings = warnings.len(),
            "Region discovery complete"
        );

        Ok(PipelineOutcome {
            value: regions,
            stats,
            warnings,
        })
    }

    /// Discover every service with its display name.
    ///
    /// A service whose name cannot be resolved keeps its code as the name.
    pub async fn discover_services(&self) -> Result<PipelineOutcome<Vec<Service>>> {
        let store = CacheStore::new(self.config.cache.services_path());
        if let Some(services) = self.load_cached::<Vec<Service>>(&store, Pipeline::Services).await {
            return Ok(PipelineOutcome::cached(services));
        }

        info!(prefix = %self.namespace.services, "Discovering services");
        let mut stats = PipelineStats::default();
        let mut warnings = Vec::new();

        let codes = self.list_codes(&self.namespace.services).await?;
        if codes.is_empty() {
            return Err(IcError::Validation(format!(
                "no services listed under {}",
                self.namespace.services
            )));
        }

        let names = self
            .fetch_names(
                Pipeline::Services,
                codes.into_iter().collect(),
                |code| self.namespace.service_name(code),
                &mut stats,
                &mut warnings,
            )
            .await?;

        let services: Vec<Service> = names
            .into_iter()
            .map(|(code, name)| Service { code, name })
            .collect();

        self.store_cached(&store, Pipeline::Services, &services).await;

        info!(
            services = services.len(),
            warnings = warnings.len(),
            "Service discovery complete"
        );

        Ok(PipelineOutcome {
            value: services,
            stats,
            warnings,
        })
    }

    /// Map the services offered in each of `region_codes`.
    ///
    /// Regions are batched like any other item; each region's listing may
    /// span several pages. A region whose listing fails is left out of the
    /// map and reported as a warning.
    pub async fn discover_region_services(
        &self,
        region_codes: &[String],
    ) -> Result<PipelineOutcome<Vec<RegionServiceAvailability>>> {
        let mut warnings = Vec::new();

        let (requested, malformed): (BTreeSet<String>, BTreeSet<String>) = region_codes
            .iter()
            .cloned()
            .partition(|code| Region::is_valid_code(code));
        for code in malformed {
            warn!(region = %code, "Skipping malformed region code");
            let error = IcError::Validation(format!("malformed region code '{code}'"));
            warnings.push(ItemFailure::new(Pipeline::RegionServices, code, error));
        }

        let store = CacheStore::new(self.config.cache.region_services_path());
        if let Some(cached) = self
            .load_cached::<Vec<RegionServiceAvailability>>(&store, Pipeline::RegionServices)
            .await
        {
            let covered: BTreeSet<&str> = cached.iter().map(|e| e.region_code.as_str()).collect();
            if requested.iter().all(|code| covered.contains(code.as_str())) {
                let value = cached
                    .into_iter()
                    .filter(|e| requested.contains(&e.region_code))
                    .collect();
                return Ok(PipelineOutcome {
                    value,
                    stats: PipelineStats::cached(),
                    warnings,
                });
            }
            info!(
                cached = covered.len(),
                requested = requested.len(),
                "Cached region-service map does not cover every requested region"
            );
        }

        info!(regions = requested.len(), "Mapping services by region");
        let mut stats = PipelineStats::default();

        let run = self
            .scheduler
            .run(
                Pipeline::RegionServices.as_str(),
                requested.into_iter().collect(),
                &self.cancel,
                |code: String| {
                    let prefix = self.namespace.region_services(&code);
                    async move {
                        match prefix {
                            Ok(prefix) => self.list_codes(&prefix).await,
                            Err(e) => Err(e),
                        }
                    }
                },
            )
            .await;
        stats.record_batch(&run);

        if run.interrupted() {
            return Err(IcError::Cancelled);
        }

        let mut mapping = Vec::with_capacity(run.len());
        for (code, result) in run.results {
            match result {
                Ok(service_codes) => {
                    debug!(region = %code, services = service_codes.len(), "Mapped region services");
                    mapping.push(RegionServiceAvailability {
                        region_code: code,
                        service_codes,
                        last_fetched: Utc::now(),
                    });
                }
                Err(error) => {
                    warn!(region = %code, error = %error, "Service listing failed, omitting region");
                    warnings.push(ItemFailure::new(Pipeline::RegionServices, code, error));
                }
            }
        }

        self.store_cached(&store, Pipeline::RegionServices, &mapping).await;

        info!(
            regions = mapping.len(),
            warnings = warnings.len(),
            "Region-service mapping complete"
        );

        Ok(PipelineOutcome {
            value: mapping,
            stats,
            warnings,
        })
    }

    /// Regions to map: the target region, else the discovered ones, else a
    /// fresh listing when region discovery was not selected.
    async fn mapping_targets(&self, report: &DiscoveryReport) -> Result<Vec<String>> {
        if self.cancel.is_cancelled() {
            return Err(IcError::Cancelled);
        }

        if let Some(target) = &self.config.target_region {
            return Ok(vec![target.clone()]);
        }

        if let Some(regions) = &report.catalog.regions {
            return Ok(regions.iter().map(|r| r.code.clone()).collect());
        }

        if self.config.pipelines.regions {
            return Err(IcError::Validation(
                "region discovery failed, no regions to map".to_string(),
            ));
        }

        // The listing's malformed-code warnings belong to region discovery,
        // which was not selected.
        let mut ignored = Vec::new();
        self.list_region_codes(&mut ignored).await
    }

    /// List region codes, rejecting malformed ones as warnings.
    async fn list_region_codes(&self, warnings: &mut Vec<ItemFailure>) -> Result<Vec<String>> {
        let codes = self.list_codes(&self.namespace.regions).await?;

        let (valid, malformed): (Vec<String>, Vec<String>) =
            codes.into_iter().partition(|code| Region::is_valid_code(code));

        for code in malformed {
            warn!(region = %code, "Skipping malformed region code");
            let error = IcError::Validation(format!("malformed region code '{code}'"));
            warnings.push(ItemFailure::new(Pipeline::Regions, code, error));
        }

        Ok(valid)
    }

    /// Fold every zone into its parent region.
    ///
    /// Returns `None` when the zone listing itself failed; every region then
    /// reports zero zones.
    async fn map_availability_zones(
        &self,
        stats: &mut PipelineStats,
        warnings: &mut Vec<ItemFailure>,
    ) -> Result<Option<BTreeMap<String, u32>>> {
        let zone_ids = match self.list_codes(&self.namespace.availability_zones).await {
            Ok(ids) => ids,
            Err(e) if e.is_cancelled() => return Err(e),
            Err(error) => {
                warn!(
                    prefix = %self.namespace.availability_zones,
                    error = %error,
                    "Availability zone listing failed, zone counts default to 0"
                );
                let item = self.namespace.availability_zones.to_string();
                warnings.push(ItemFailure::new(Pipeline::Regions, item, error));
                return Ok(None);
            }
        };

        debug!(zones = zone_ids.len(), "Resolving availability zone parents");

        let run = self
            .scheduler
            .run(
                AVAILABILITY_ZONES,
                zone_ids.into_iter().collect(),
                &self.cancel,
                |id: String| {
                    let path = self.namespace.zone_parent(&id);
                    async move {
                        match path {
                            Ok(path) => self.fetch_value(path).await,
                            Err(e) => Err(e),
                        }
                    }
                },
            )
            .await;
        stats.record_batch(&run);

        if run.interrupted() {
            return Err(IcError::Cancelled);
        }

        let tally = tally_availability_zones(run.results);
        for failure in &tally.failures {
            warn!(zone = %failure.item, error = %failure.error, "Zone excluded from region counts");
        }
        debug!(
            zones = tally.zones.len(),
            counted = tally.counted(),
            "Availability zones tallied"
        );

        warnings.extend(tally.failures);
        Ok(Some(tally.counts))
    }

    /// Batch-fetch display names, falling back to the code itself.
    async fn fetch_names<F>(
        &self,
        pipeline: Pipeline,
        codes: Vec<String>,
        path_for: F,
        stats: &mut PipelineStats,
        warnings: &mut Vec<ItemFailure>,
    ) -> Result<Vec<(String, String)>>
    where
        F: Fn(&str) -> Result<ParameterPath>,
    {
        let run = self
            .scheduler
            .run(pipeline.as_str(), codes, &self.cancel, |code: String| {
                let path = path_for(&code);
                async move {
                    match path {
                        Ok(path) => self.fetch_value(path).await,
                        Err(e) => Err(e),
                    }
                }
            })
            .await;
        stats.record_batch(&run);

        if run.interrupted() {
            return Err(IcError::Cancelled);
        }

        let names = run
            .results
            .into_iter()
            .map(|(code, result)| {
                let failure = match result {
                    Ok(name) if !name.trim().is_empty() => return (code, name),
                    Ok(_) => IcError::Validation(format!("empty display name for '{code}'")),
                    Err(error) => error,
                };

                warn!(
                    pipeline = %pipeline,
                    code = %code,
                    error = %failure,
                    "Display name unavailable, falling back to code"
                );
                warnings.push(ItemFailure::new(pipeline, &code, failure));
                (code.clone(), code)
            })
            .collect();

        Ok(names)
    }

    /// List the direct children of `prefix` and de-duplicate their codes.
    async fn list_codes(&self, prefix: &ParameterPath) -> Result<BTreeSet<String>> {
        let entries = with_retry(
            &self.config.retry,
            prefix.as_str(),
            &self.cancel,
            classify_error,
            || self.source.list_parameters_by_prefix(prefix, false),
        )
        .await?;

        let codes: BTreeSet<String> = entries
            .iter()
            .map(|entry| entry.code().trim().to_string())
            .filter(|code| !code.is_empty())
            .collect();

        debug!(prefix = %prefix, entries = entries.len(), codes = codes.len(), "Listed codes");
        Ok(codes)
    }

    async fn fetch_value(&self, path: ParameterPath) -> Result<String> {
        let entry = with_retry(
            &self.config.retry,
            path.as_str(),
            &self.cancel,
            classify_error,
            || self.source.get_parameter(&path),
        )
        .await?;

        Ok(entry.value)
    }

    async fn launch_data(&self) -> HashMap<String, LaunchInfo> {
        match self.launch.fetch().await {
            Ok(data) => data,
            Err(error) => {
                warn!(error = %error, "Launch data unavailable, regions are not enriched");
                HashMap::new()
            }
        }
    }

    async fn load_cached<T: DeserializeOwned>(
        &self,
        store: &CacheStore,
        pipeline: Pipeline,
    ) -> Option<T> {
        let cache = &self.config.cache;
        if !cache.enabled {
            return None;
        }
        if cache.force_refresh {
            info!(pipeline = %pipeline, "Force refresh, skipping cache");
            return None;
        }

        let snapshot = store.load_valid::<T>(cache.ttl()).await?;
        info!(pipeline = %pipeline, saved_at = %snapshot.saved_at, "Using cached snapshot");
        Some(snapshot.payload)
    }

    async fn store_cached<T: Serialize>(&self, store: &CacheStore, pipeline: Pipeline, payload: &T) {
        if !self.config.cache.enabled {
            return;
        }

        if let Err(error) = store.save(payload).await {
            warn!(
                pipeline = %pipeline,
                path = %store.path().display(),
                error = %error,
                "Failed to write cache snapshot"
            );
        }
    }
}

/// Overwrite each region's launch fields from `launch`.
///
/// Regions absent from `launch` end up with no launch data.
fn apply_launch_data(regions: &mut [Region], launch: &HashMap<String, LaunchInfo>) {
    for region in regions {
        let info = launch.get(&region.code).cloned().unwrap_or_default();
        region.launch_date = info.launch_date;
        region.announcement_url = info.announcement_url;
    }
}

/// Record a pipeline's outcome in the report.
fn settle<T>(
    report: &mut DiscoveryReport,
    pipeline: Pipeline,
    outcome: Result<PipelineOutcome<T>>,
) -> Option<T> {
    match outcome {
        Ok(outcome) => {
            *report.stats.pipeline_mut(pipeline) = outcome.stats;
            report.warnings.extend(outcome.warnings);
            Some(outcome.value)
        }
        Err(error) => {
            if error.is_cancelled() {
                warn!(pipeline = %pipeline, "Pipeline cancelled");
            } else {
                error!(pipeline = %pipeline, error = %error, "Pipeline failed");
            }
            report.errors.push(PipelineError { pipeline, error });
            None
        }
    }
}
