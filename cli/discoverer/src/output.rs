//! Catalog document output.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use ic_types::{Catalog, RegionServicesDocument, RegionsDocument, ServicesDocument};
use serde::Serialize;
use tracing::info;

pub const REGIONS_FILE: &str = "regions.json";
pub const SERVICES_FILE: &str = "services.json";
pub const REGION_SERVICES_FILE: &str = "region-services.json";

/// Write one document per discovered entity type into `dir`.
///
/// Pipelines that did not produce a result are skipped. Returns the paths
/// written.
pub fn write_catalog(dir: &Path, catalog: &Catalog, generated_at: DateTime<Utc>) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory {}", dir.display()))?;

    let summary = catalog.summary(generated_at);
    let mut written = Vec::new();

    if let Some(regions) = &catalog.regions {
        let document = RegionsDocument {
            summary: summary.clone(),
            regions: regions.clone(),
        };
        written.push(write_document(dir, REGIONS_FILE, &document)?);
    }

    if let Some(services) = &catalog.services {
        let document = ServicesDocument {
            summary: summary.clone(),
            services: services.clone(),
        };
        written.push(write_document(dir, SERVICES_FILE, &document)?);
    }

    if let Some(region_services) = &catalog.region_services {
        let document = RegionServicesDocument {
            summary,
            region_services: region_services.clone(),
        };
        written.push(write_document(dir, REGION_SERVICES_FILE, &document)?);
    }

    Ok(written)
}

fn write_document<T: Serialize>(dir: &Path, file_name: &str, document: &T) -> Result<PathBuf> {
    let path = dir.join(file_name);
    let mut buf = serde_json::to_vec_pretty(document)
        .with_context(|| format!("failed to serialize {file_name}"))?;
    buf.push(b'\n');

    std::fs::write(&path, &buf).with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), bytes = buf.len(), "Wrote catalog document");

    Ok(path)
}
