//! End-to-end discovery integration tests using LocalStack.

use crate::common::{LocalStackTestContext, SeedCatalog};
use ic_discoverer::{
    BatchConfig, CacheConfig, Discoverer, DiscoveryConfig, NoLaunchData, PipelineSelection,
    SsmParameterSource,
};
use tempfile::TempDir;

fn config(root: &str, cache: &TempDir) -> DiscoveryConfig {
    DiscoveryConfig::new()
        .with_parameter_root(root)
        .with_batch(
            BatchConfig::new()
                .with_batch_size(5)
                .with_inter_batch_delay_ms(50),
        )
        .with_cache(CacheConfig::new(cache.path()))
}

#[tokio::test]
#[ignore = "requires LocalStack"]
async fn test_discover_catalog_from_localstack() {
    let ctx = LocalStackTestContext::new().await;

    if !ctx.is_available().await {
        eprintln!("LocalStack not available, skipping test");
        return;
    }

    let root = "/ic-test/discovery/global-infrastructure";
    ctx.delete_tree(root).await.unwrap();
    ctx.seed(root, &SeedCatalog::small()).await.unwrap();

    let cache = TempDir::new().unwrap();
    let config = config(root, &cache).with_pipelines(PipelineSelection::all());
    let discoverer =
        Discoverer::new(SsmParameterSource::new(ctx.ssm.clone()), NoLaunchData, config).unwrap();

    let report = discoverer.run().await;

    assert!(report.is_success(), "errors: {:?}", report.errors);
    assert!(report.warnings.is_empty(), "warnings: {:?}", report.warnings);

    let regions = report.catalog.regions.as_ref().unwrap();
    assert_eq!(regions.len(), 2);
    assert_eq!(regions[0].code, "eu-west-1");
    assert_eq!(regions[0].name, "Europe (Ireland)");
    assert!(regions.iter().all(|r| r.availability_zone_count == 2));

    let services = report.catalog.services.as_ref().unwrap();
    let codes: Vec<&str> = services.iter().map(|s| s.code.as_str()).collect();
    assert_eq!(codes, vec!["ec2", "lambda", "s3"]);

    let mapping = report.catalog.region_services.as_ref().unwrap();
    assert_eq!(mapping.len(), 2);
    assert_eq!(mapping[0].region_code, "eu-west-1");
    assert!(!mapping[0].service_codes.contains("lambda"));
    assert_eq!(mapping[1].service_codes.len(), 3);

    assert!(cache.path().join("regions.json").exists());
    assert!(cache.path().join("services.json").exists());
    assert!(cache.path().join("region-services.json").exists());

    ctx.delete_tree(root).await.unwrap();
}

#[tokio::test]
#[ignore = "requires LocalStack"]
async fn test_second_run_served_from_cache() {
    let ctx = LocalStackTestContext::new().await;

    if !ctx.is_available().await {
        eprintln!("LocalStack not available, skipping test");
        return;
    }

    let root = "/ic-test/cached/global-infrastructure";
    ctx.delete_tree(root).await.unwrap();
    ctx.seed(root, &SeedCatalog::small()).await.unwrap();

    let cache = TempDir::new().unwrap();
    let first = Discoverer::new(
        SsmParameterSource::new(ctx.ssm.clone()),
        NoLaunchData,
        config(root, &cache),
    )
    .unwrap()
    .run()
    .await;
    assert!(first.is_success());

    // The remote data is gone, so only the cache can answer
    ctx.delete_tree(root).await.unwrap();

    let second = Discoverer::new(
        SsmParameterSource::new(ctx.ssm.clone()),
        NoLaunchData,
        config(root, &cache),
    )
    .unwrap()
    .run()
    .await;

    assert!(second.is_success());
    assert!(second.stats.regions.from_cache);
    assert!(second.stats.services.from_cache);
    assert_eq!(second.catalog.regions, first.catalog.regions);
    assert_eq!(second.catalog.services, first.catalog.services);
}
