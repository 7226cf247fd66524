//! Statistics for discovery runs.
//!
//! Counts are returned by each pipeline rather than accumulated in shared
//! state; the aggregator folds them into one [`DiscoveryStats`].

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::batch::BatchRun;
use crate::report::Pipeline;

/// Counters for one pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    /// Per-item remote lookups attempted
    pub items_attempted: usize,

    /// Lookups that returned a value
    pub items_succeeded: usize,

    /// Lookups that failed after retries
    pub items_failed: usize,

    /// Batches started
    pub batches_run: usize,

    /// Whether the result was served from the snapshot cache
    pub from_cache: bool,
}

impl PipelineStats {
    pub fn cached() -> Self {
        Self {
            from_cache: true,
            ..Default::default()
        }
    }

    /// Add the counts of a finished batched run.
    pub fn record_batch<I, T>(&mut self, run: &BatchRun<I, T>) {
        self.items_attempted += run.len();
        self.items_succeeded += run.succeeded();
        self.items_failed += run.failed();
        self.batches_run += run.batches_run;
    }
}

/// Run-wide timing plus per-pipeline counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveryStats {
    /// Set by [`DiscoveryStats::new`]
    pub started_at: Option<DateTime<Utc>>,

    /// Set by [`DiscoveryStats::complete`]
    pub completed_at: Option<DateTime<Utc>>,

    pub regions: PipelineStats,
    pub services: PipelineStats,
    pub region_services: PipelineStats,
}

impl DiscoveryStats {
    /// Start the clock.
    pub fn new() -> Self {
        Self {
            started_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// Stop the clock.
    pub fn complete(&mut self) {
        self.completed_at = Some(Utc::now());
    }

    /// Wall time between start and completion, once completed.
    pub fn duration(&self) -> Option<Duration> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    pub fn pipeline(&self, pipeline: Pipeline) -> &PipelineStats {
        match pipeline {
            Pipeline::Regions => &self.regions,
            Pipeline::Services => &self.services,
            Pipeline::RegionServices => &self.region_services,
        }
    }

    pub fn pipeline_mut(&mut self, pipeline: Pipeline) -> &mut PipelineStats {
        match pipeline {
            Pipeline::Regions => &mut self.regions,
            Pipeline::Services => &mut self.services,
            Pipeline::RegionServices => &mut self.region_services,
        }
    }

    fn all(&self) -> [&PipelineStats; 3] {
        [&self.regions, &self.services, &self.region_services]
    }

    pub fn items_attempted(&self) -> usize {
        self.all().iter().map(|s| s.items_attempted).sum()
    }

    pub fn items_failed(&self) -> usize {
        self.all().iter().map(|s| s.items_failed).sum()
    }

    pub fn batches_run(&self) -> usize {
        self.all().iter().map(|s| s.batches_run).sum()
    }

    /// Lookups per second over the whole run.
    pub fn items_per_second(&self) -> Option<f64> {
        self.duration().map(|d| {
            let secs = d.num_milliseconds() as f64 / 1000.0;
            if secs > 0.0 {
                self.items_attempted() as f64 / secs
            } else {
                0.0
            }
        })
    }
}
