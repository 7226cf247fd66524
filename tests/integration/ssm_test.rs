//! SSM parameter source integration tests using LocalStack.

use crate::common::LocalStackTestContext;
use ic_discoverer::{ParameterSource, SsmParameterSource};
use ic_error::IcError;
use ic_types::ParameterPath;

#[tokio::test]
#[ignore = "requires LocalStack"]
async fn test_get_parameter() {
    let ctx = LocalStackTestContext::new().await;

    if !ctx.is_available().await {
        eprintln!("LocalStack not available, skipping test");
        return;
    }

    let root = "/ic-test/ssm-get";
    ctx.delete_tree(root).await.unwrap();
    ctx.put_parameter(&format!("{root}/services/ec2/longName"), "Amazon EC2")
        .await
        .unwrap();

    let source = SsmParameterSource::new(ctx.ssm.clone());
    let path = ParameterPath::new(format!("{root}/services/ec2/longName")).unwrap();
    let entry = source.get_parameter(&path).await.unwrap();

    assert_eq!(entry.path, path);
    assert_eq!(entry.value, "Amazon EC2");

    ctx.delete_tree(root).await.unwrap();
}

#[tokio::test]
#[ignore = "requires LocalStack"]
async fn test_missing_parameter_is_not_found() {
    let ctx = LocalStackTestContext::new().await;

    if !ctx.is_available().await {
        eprintln!("LocalStack not available, skipping test");
        return;
    }

    let source = SsmParameterSource::new(ctx.ssm.clone());
    let path = ParameterPath::new("/ic-test/does-not-exist/longName").unwrap();
    let result = source.get_parameter(&path).await;

    assert!(matches!(result, Err(IcError::NotFound(_))), "got {result:?}");
}

#[tokio::test]
#[ignore = "requires LocalStack"]
async fn test_listing_follows_pagination() {
    let ctx = LocalStackTestContext::new().await;

    if !ctx.is_available().await {
        eprintln!("LocalStack not available, skipping test");
        return;
    }

    let root = "/ic-test/ssm-list";
    ctx.delete_tree(root).await.unwrap();

    // More than one page (the service returns at most 10 per call)
    for n in 0..25 {
        let code = format!("svc{n:02}");
        ctx.put_parameter(&format!("{root}/services/{code}"), &code)
            .await
            .unwrap();
        ctx.put_parameter(&format!("{root}/services/{code}/longName"), "Some Service")
            .await
            .unwrap();
    }

    let source = SsmParameterSource::new(ctx.ssm.clone());
    let prefix = ParameterPath::new(format!("{root}/services")).unwrap();

    let direct = source.list_parameters_by_prefix(&prefix, false).await.unwrap();
    assert_eq!(direct.len(), 25);

    let mut codes: Vec<&str> = direct.iter().map(|e| e.code()).collect();
    codes.sort_unstable();
    assert_eq!(codes.first(), Some(&"svc00"));
    assert_eq!(codes.last(), Some(&"svc24"));

    let recursive = source.list_parameters_by_prefix(&prefix, true).await.unwrap();
    assert_eq!(recursive.len(), 50);

    // Listing again starts from the first page
    let again = source.list_parameters_by_prefix(&prefix, false).await.unwrap();
    assert_eq!(again.len(), 25);

    ctx.delete_tree(root).await.unwrap();
}
