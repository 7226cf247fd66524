//! Parameter source clients.
//!
//! This module provides the transport shim in front of the parameter store:
//! - [`ParameterSource`] - the two remote operations every pipeline uses
//! - [`SsmParameterSource`] - AWS SSM Parameter Store implementation
//! - [`MemoryParameterSource`] - in-memory implementation with fault injection
//!
//! No retry logic lives here; see [`crate::retry`].

mod memory;
mod ssm;

pub use memory::{Fault, MemoryParameterSource};
pub use ssm::{SsmConfig, SsmParameterSource, create_ssm_client, stream_parameters_by_prefix};

use async_trait::async_trait;
use ic_error::Result;
use ic_types::{ParameterEntry, ParameterPath};
use std::sync::Arc;

/// Uniform interface over remote key-path lookups.
///
/// # Errors
///
/// Both operations fail with:
/// - [`IcError::NotFound`](ic_error::IcError::NotFound) when the path does not exist
/// - [`IcError::Throttled`](ic_error::IcError::Throttled) when the remote rejects the rate
/// - [`IcError::Transport`](ic_error::IcError::Transport) for connectivity and timeouts
#[async_trait]
pub trait ParameterSource: Send + Sync {
    /// Fetch a single parameter.
    async fn get_parameter(&self, path: &ParameterPath) -> Result<ParameterEntry>;

    /// List every parameter under `prefix`, following pagination to the end.
    ///
    /// With `recursive = false` only direct children are returned. A failure
    /// on any page fails the whole listing; partial pages are never returned.
    /// Calling again restarts the listing from the first page.
    async fn list_parameters_by_prefix(
        &self,
        prefix: &ParameterPath,
        recursive: bool,
    ) -> Result<Vec<ParameterEntry>>;
}

#[async_trait]
impl<S: ParameterSource + ?Sized> ParameterSource for Arc<S> {
    async fn get_parameter(&self, path: &ParameterPath) -> Result<ParameterEntry> {
        (**self).get_parameter(path).await
    }

    async fn list_parameters_by_prefix(
        &self,
        prefix: &ParameterPath,
        recursive: bool,
    ) -> Result<Vec<ParameterEntry>> {
        (**self).list_parameters_by_prefix(prefix, recursive).await
    }
}
