//! Catalog entities and output documents.

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::LazyLock;

/// Source tag written into every catalog summary.
pub const CATALOG_SOURCE: &str = "aws-ssm-parameter-store";

static REGION_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{2}-[a-z]+-\d+$").expect("region code pattern is valid"));

/// An AWS region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    /// Region code (e.g., "us-east-1")
    pub code: String,

    /// Display name (e.g., "US East (N. Virginia)")
    pub name: String,

    /// Number of availability zones mapped to this region
    pub availability_zone_count: u32,

    /// Public launch date, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launch_date: Option<NaiveDate>,

    /// Launch announcement URL, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub announcement_url: Option<String>,
}

impl Region {
    /// Whether `code` has the shape of a commercial region code.
    pub fn is_valid_code(code: &str) -> bool {
        REGION_CODE.is_match(code)
    }
}

/// An AWS service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub code: String,
    pub name: String,
}

/// Working entity used while mapping availability zones to regions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityZone {
    /// Zone id (e.g., "use1-az1")
    pub id: String,

    /// Code of the owning region, if the lookup succeeded
    pub parent_region_code: Option<String>,
}

/// The set of services offered in a region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionServiceAvailability {
    pub region_code: String,
    pub service_codes: BTreeSet<String>,
    pub last_fetched: DateTime<Utc>,
}

/// Launch metadata supplied by the enrichment source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launch_date: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub announcement_url: Option<String>,
}

/// The assembled result of a discovery run.
///
/// Each field is `None` when its pipeline was not selected or failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regions: Option<Vec<Region>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services: Option<Vec<Service>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_services: Option<Vec<RegionServiceAvailability>>,
}

impl Catalog {
    /// Build the summary block for this catalog.
    pub fn summary(&self, generated_at: DateTime<Utc>) -> CatalogSummary {
        let regions = self.regions.as_deref().unwrap_or_default();

        CatalogSummary {
            region_count: regions.len(),
            service_count: self.services.as_ref().map_or(0, Vec::len),
            availability_zone_count: regions
                .iter()
                .map(|r| u64::from(r.availability_zone_count))
                .sum(),
            region_service_mappings: self.region_services.as_ref().map_or(0, Vec::len),
            generated_at,
            source: CATALOG_SOURCE.to_string(),
        }
    }
}

/// Summary block written alongside every output document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSummary {
    pub region_count: usize,
    pub service_count: usize,
    pub availability_zone_count: u64,
    pub region_service_mappings: usize,
    pub generated_at: DateTime<Utc>,
    pub source: String,
}

/// Output document for regions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionsDocument {
    pub summary: CatalogSummary,
    pub regions: Vec<Region>,
}

/// Output document for services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesDocument {
    pub summary: CatalogSummary,
    pub services: Vec<Service>,
}

/// Output document for the region-service map.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionServicesDocument {
    pub summary: CatalogSummary,
    pub region_services: Vec<RegionServiceAvailability>,
}
