//! LocalStack test context and utilities.

use aws_sdk_ssm::Client as SsmClient;
use aws_sdk_ssm::config::Credentials;
use aws_sdk_ssm::types::ParameterType;

/// LocalStack test context providing an SSM client.
pub struct LocalStackTestContext {
    pub ssm: SsmClient,
    pub endpoint: String,
    pub region: String,
}

impl LocalStackTestContext {
    /// Create a new LocalStack test context.
    ///
    /// Uses the `LOCALSTACK_ENDPOINT` environment variable if set,
    /// otherwise defaults to `http://localhost:4566`.
    pub async fn new() -> Self {
        let endpoint = std::env::var("LOCALSTACK_ENDPOINT")
            .unwrap_or_else(|_| "http://localhost:4566".to_string());
        let region = "us-east-1".to_string();

        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.clone()))
            .endpoint_url(&endpoint)
            .credentials_provider(Credentials::new("test", "test", None, None, "localstack"))
            .load()
            .await;

        Self {
            ssm: SsmClient::new(&config),
            endpoint,
            region,
        }
    }

    /// Check if LocalStack is available and healthy.
    pub async fn is_available(&self) -> bool {
        self.ssm
            .describe_parameters()
            .max_results(1)
            .send()
            .await
            .is_ok()
    }

    /// Create or overwrite a string parameter.
    pub async fn put_parameter(&self, name: &str, value: &str) -> Result<(), aws_sdk_ssm::Error> {
        self.ssm
            .put_parameter()
            .name(name)
            .value(value)
            .r#type(ParameterType::String)
            .overwrite(true)
            .send()
            .await?;
        Ok(())
    }

    /// Write `catalog` below `root` using the global-infrastructure layout.
    pub async fn seed(&self, root: &str, catalog: &SeedCatalog) -> Result<(), aws_sdk_ssm::Error> {
        for (code, name) in &catalog.regions {
            self.put_parameter(&format!("{root}/regions/{code}"), code).await?;
            self.put_parameter(&format!("{root}/regions/{code}/longName"), name)
                .await?;
        }

        for (id, parent) in &catalog.zones {
            self.put_parameter(&format!("{root}/availability-zones/{id}"), id)
                .await?;
            self.put_parameter(&format!("{root}/availability-zones/{id}/parent-region"), parent)
                .await?;
        }

        for (code, name) in &catalog.services {
            self.put_parameter(&format!("{root}/services/{code}"), code).await?;
            self.put_parameter(&format!("{root}/services/{code}/longName"), name)
                .await?;
        }

        for (region, service) in &catalog.region_services {
            self.put_parameter(&format!("{root}/regions/{region}/services/{service}"), service)
                .await?;
        }

        Ok(())
    }

    /// Delete every parameter below `root`.
    pub async fn delete_tree(&self, root: &str) -> Result<(), aws_sdk_ssm::Error> {
        let mut names = Vec::new();
        let mut pages = self
            .ssm
            .get_parameters_by_path()
            .path(root)
            .recursive(true)
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page?;
            names.extend(
                page.parameters()
                    .iter()
                    .filter_map(|p| p.name().map(str::to_string)),
            );
        }

        // DeleteParameters accepts at most 10 names per call
        for chunk in names.chunks(10) {
            self.ssm
                .delete_parameters()
                .set_names(Some(chunk.to_vec()))
                .send()
                .await?;
        }

        Ok(())
    }
}

/// Catalog content to seed.
#[derive(Debug, Clone, Default)]
pub struct SeedCatalog {
    /// (code, display name)
    pub regions: Vec<(String, String)>,
    /// (zone id, parent region code)
    pub zones: Vec<(String, String)>,
    /// (code, display name)
    pub services: Vec<(String, String)>,
    /// (region code, service code)
    pub region_services: Vec<(String, String)>,
}

impl SeedCatalog {
    /// Two regions with two zones each; three services, one missing from eu-west-1.
    pub fn small() -> Self {
        let pairs = |items: &[(&str, &str)]| {
            items
                .iter()
                .map(|(a, b)| (a.to_string(), b.to_string()))
                .collect::<Vec<_>>()
        };

        Self {
            regions: pairs(&[
                ("eu-west-1", "Europe (Ireland)"),
                ("us-east-1", "US East (N. Virginia)"),
            ]),
            zones: pairs(&[
                ("euw1-az1", "eu-west-1"),
                ("euw1-az2", "eu-west-1"),
                ("use1-az1", "us-east-1"),
                ("use1-az2", "us-east-1"),
            ]),
            services: pairs(&[
                ("ec2", "Amazon Elastic Compute Cloud (EC2)"),
                ("lambda", "AWS Lambda"),
                ("s3", "Amazon Simple Storage Service (S3)"),
            ]),
            region_services: pairs(&[
                ("eu-west-1", "ec2"),
                ("eu-west-1", "s3"),
                ("us-east-1", "ec2"),
                ("us-east-1", "lambda"),
                ("us-east-1", "s3"),
            ]),
        }
    }
}
