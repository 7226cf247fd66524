//! AWS SSM Parameter Store client.

use std::time::Duration;

use async_stream::try_stream;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_ssm::Client;
use aws_sdk_ssm::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use futures::{Stream, TryStreamExt};
use ic_error::{ErrorCategory, IcError, Result, classify_message};
use ic_types::{ParameterEntry, ParameterPath};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::ParameterSource;

/// Largest page the parameter store returns for `GetParametersByPath`.
const MAX_PAGE_SIZE: i32 = 10;

/// Configuration for parameter store access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SsmConfig {
    /// AWS region the client talks to
    pub region: Option<String>,

    /// Custom endpoint URL (for LocalStack)
    pub endpoint: Option<String>,

    /// AWS profile name (optional)
    pub profile: Option<String>,

    /// Per-operation timeout in seconds
    pub timeout_secs: u64,
}

impl Default for SsmConfig {
    fn default() -> Self {
        Self {
            region: None,
            endpoint: None,
            profile: None,
            timeout_secs: 10,
        }
    }
}

impl SsmConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the AWS region.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Set a custom endpoint (for LocalStack).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the AWS profile.
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Set the per-operation timeout in seconds.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// Create an SSM client from configuration.
///
/// The SDK's built-in retries are disabled: backoff is owned by
/// [`crate::retry::with_retry`] so that attempts are counted and logged in one
/// place.
pub async fn create_ssm_client(config: &SsmConfig) -> Result<Client> {
    use aws_config::Region;
    use aws_config::timeout::TimeoutConfig;

    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .retry_config(aws_config::retry::RetryConfig::disabled())
        .timeout_config(
            TimeoutConfig::builder()
                .operation_timeout(Duration::from_secs(config.timeout_secs))
                .build(),
        );

    if let Some(region) = &config.region {
        loader = loader.region(Region::new(region.clone()));
    }

    if let Some(endpoint) = &config.endpoint {
        loader = loader.endpoint_url(endpoint);
    }

    if let Some(profile) = &config.profile {
        loader = loader.profile_name(profile);
    }

    let sdk_config = loader.load().await;
    Ok(Client::new(&sdk_config))
}

/// [`ParameterSource`] backed by the AWS SSM Parameter Store.
#[derive(Debug, Clone)]
pub struct SsmParameterSource {
    client: Client,
}

impl SsmParameterSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl ParameterSource for SsmParameterSource {
    async fn get_parameter(&self, path: &ParameterPath) -> Result<ParameterEntry> {
        trace!(path = %path, "GetParameter");

        let resp = self
            .client
            .get_parameter()
            .name(path.as_str())
            .send()
            .await
            .map_err(|e| map_sdk_error(path, e))?;

        let parameter = resp
            .parameter
            .ok_or_else(|| IcError::Validation(format!("response for {path} has no parameter")))?;

        let value = parameter
            .value
            .ok_or_else(|| IcError::Validation(format!("parameter {path} has no value")))?;

        Ok(ParameterEntry::new(path.clone(), value))
    }

    async fn list_parameters_by_prefix(
        &self,
        prefix: &ParameterPath,
        recursive: bool,
    ) -> Result<Vec<ParameterEntry>> {
        let entries: Vec<ParameterEntry> =
            stream_parameters_by_prefix(&self.client, prefix, recursive)
                .try_collect()
                .await?;

        debug!(
            prefix = %prefix,
            recursive,
            count = entries.len(),
            "Listed parameters"
        );

        Ok(entries)
    }
}

/// Stream every parameter under `prefix`, following `NextToken` until exhausted.
///
/// The stream ends with an error as soon as any page fails.
pub fn stream_parameters_by_prefix<'a>(
    client: &'a Client,
    prefix: &'a ParameterPath,
    recursive: bool,
) -> impl Stream<Item = Result<ParameterEntry>> + 'a {
    try_stream! {
        let mut next_token: Option<String> = None;
        let mut page = 0usize;

        loop {
            let resp = client
                .get_parameters_by_path()
                .path(prefix.as_str())
                .recursive(recursive)
                .max_results(MAX_PAGE_SIZE)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| map_sdk_error(prefix, e))?;

            trace!(prefix = %prefix, page, "GetParametersByPath page");

            for parameter in resp.parameters.unwrap_or_default() {
                let (Some(name), Some(value)) = (parameter.name, parameter.value) else {
                    continue;
                };
                yield ParameterEntry::new(ParameterPath::new(name)?, value);
            }

            page += 1;
            next_token = resp.next_token;
            if next_token.is_none() {
                break;
            }
        }
    }
}

/// Map an SDK failure onto the error taxonomy.
fn map_sdk_error<E, R>(path: &ParameterPath, error: SdkError<E, R>) -> IcError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    match &error {
        SdkError::TimeoutError(_) => IcError::Transport(format!("timeout fetching {path}")),
        SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => IcError::Transport(format!(
            "request for {path} failed: {}",
            DisplayErrorContext(&error)
        )),
        SdkError::ConstructionFailure(_) => IcError::Config(format!(
            "could not build request for {path}: {}",
            DisplayErrorContext(&error)
        )),
        SdkError::ServiceError(service) => {
            let code = service.err().code().unwrap_or_default();
            let message = service.err().message().unwrap_or_default();

            match code {
                "ParameterNotFound" | "ParameterVersionNotFound" => {
                    IcError::NotFound(path.to_string())
                }
                "ThrottlingException" | "Throttling" | "TooManyUpdates" => {
                    IcError::Throttled(format!("{code} on {path}: {message}"))
                }
                "InternalServerError" | "ServiceUnavailable" => {
                    IcError::Transport(format!("{code} on {path}: {message}"))
                }
                _ => {
                    let detail = format!("{code} on {path}: {message}");
                    match classify_message(&detail) {
                        ErrorCategory::Retryable => IcError::Transport(detail),
                        ErrorCategory::Fatal => IcError::Validation(detail),
                    }
                }
            }
        }
        _ => {
            let detail = format!("{path}: {}", DisplayErrorContext(&error));
            match classify_message(&detail) {
                ErrorCategory::Retryable => IcError::Transport(detail),
                ErrorCategory::Fatal => IcError::Other(anyhow::anyhow!(detail)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ssm_config_defaults() {
        let config = SsmConfig::default();
        assert!(config.region.is_none());
        assert!(config.endpoint.is_none());
        assert_eq!(config.timeout_secs, 10);
    }

    #[test]
    fn test_ssm_config_builder() {
        let config = SsmConfig::new()
            .with_region("eu-west-1")
            .with_endpoint("http://localhost:4566")
            .with_profile("dev")
            .with_timeout(3);

        assert_eq!(config.region.as_deref(), Some("eu-west-1"));
        assert_eq!(config.endpoint.as_deref(), Some("http://localhost:4566"));
        assert_eq!(config.profile.as_deref(), Some("dev"));
        assert_eq!(config.timeout_secs, 3);
    }
}
