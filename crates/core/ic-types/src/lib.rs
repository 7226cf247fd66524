//! Core types for infra-catalog.
//!
//! This crate provides the foundational types used throughout the system:
//! - [`ParameterPath`] / [`ParameterEntry`] - Parameter store keys and values
//! - [`Region`], [`Service`], [`RegionServiceAvailability`] - Catalog entities
//! - [`CacheSnapshot`] - Versioned, timestamped persisted discovery result
//! - [`CatalogSummary`] and the per-entity output documents

pub mod cache;
pub mod catalog;
pub mod parameter;

pub use cache::*;
pub use catalog::*;
pub use parameter::*;
