//! Results of a discovery run.

use std::fmt;

use ic_error::IcError;
use ic_types::Catalog;
use serde::{Deserialize, Serialize};

use crate::stats::{DiscoveryStats, PipelineStats};

/// The independently scheduled discovery pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pipeline {
    Regions,
    Services,
    RegionServices,
}

impl Pipeline {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pipeline::Regions => "regions",
            Pipeline::Services => "services",
            Pipeline::RegionServices => "region-services",
        }
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single item that degraded to a fallback value or was left out.
#[derive(Debug)]
pub struct ItemFailure {
    pub pipeline: Pipeline,
    /// Code or path of the affected item
    pub item: String,
    pub error: IcError,
}

impl ItemFailure {
    pub fn new(pipeline: Pipeline, item: impl Into<String>, error: IcError) -> Self {
        Self {
            pipeline,
            item: item.into(),
            error,
        }
    }
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.pipeline, self.item, self.error)
    }
}

/// A failure that aborted a whole pipeline.
#[derive(Debug)]
pub struct PipelineError {
    pub pipeline: Pipeline,
    pub error: IcError,
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.pipeline, self.error)
    }
}

/// What one pipeline produced when it did not fail outright.
#[derive(Debug)]
pub struct PipelineOutcome<T> {
    pub value: T,
    pub stats: PipelineStats,
    pub warnings: Vec<ItemFailure>,
}

impl<T> PipelineOutcome<T> {
    pub(crate) fn cached(value: T) -> Self {
        Self {
            value,
            stats: PipelineStats::cached(),
            warnings: Vec::new(),
        }
    }
}

/// Aggregate result of [`Discoverer::run`](crate::Discoverer::run).
///
/// Pipelines are best-effort: `catalog` carries every pipeline that finished,
/// `errors` every pipeline that did not.
#[derive(Debug, Default)]
pub struct DiscoveryReport {
    pub catalog: Catalog,
    pub stats: DiscoveryStats,
    pub warnings: Vec<ItemFailure>,
    pub errors: Vec<PipelineError>,
}

impl DiscoveryReport {
    /// True when no pipeline failed (item warnings are allowed).
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Whether the run was interrupted by the cancellation signal.
    pub fn was_cancelled(&self) -> bool {
        self.errors.iter().any(|e| e.error.is_cancelled())
    }

    pub fn warnings_for(&self, pipeline: Pipeline) -> impl Iterator<Item = &ItemFailure> {
        self.warnings.iter().filter(move |w| w.pipeline == pipeline)
    }

    pub fn error_for(&self, pipeline: Pipeline) -> Option<&PipelineError> {
        self.errors.iter().find(|e| e.pipeline == pipeline)
    }
}
