//! Main execution logic for the ic-discoverer CLI.

use anyhow::{Context, Result};
use chrono::Utc;
use ic_discoverer::{
    Discoverer, DiscoveryReport, JsonFileLaunchData, LaunchDataSource, NoLaunchData,
    SsmParameterSource, create_ssm_client,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info, warn};
use tracing_subscriber::fmt;

use crate::args::{Cli, LogLevel};
use crate::output::write_catalog;

/// Initialize logging.
pub fn init_logging(level: LogLevel) -> Result<()> {
    let level: Level = level.into();

    let subscriber = fmt::Subscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr);

    subscriber.init();

    Ok(())
}

/// Execute discovery with the provided arguments and write the catalog.
pub async fn execute(args: Cli) -> Result<DiscoveryReport> {
    let config = args.discovery_config();
    let ssm_config = args.ssm_config();

    info!(
        aws_region = ?ssm_config.region,
        endpoint = ?ssm_config.endpoint,
        cache_dir = %config.cache.dir.display(),
        output_dir = %args.output_dir.display(),
        "Starting ic-discoverer"
    );

    let client = create_ssm_client(&ssm_config)
        .await
        .context("failed to create SSM client")?;

    let launch: Box<dyn LaunchDataSource> = match &args.launch_data {
        Some(path) => Box::new(JsonFileLaunchData::new(path)),
        None => Box::new(NoLaunchData),
    };

    let cancel = CancellationToken::new();
    let discoverer = Discoverer::new(SsmParameterSource::new(client), launch, config)?
        .with_cancellation(cancel.clone());

    let watcher = tokio::spawn(cancel_on_signal(cancel.clone()));
    let report = discoverer.run().await;
    watcher.abort();

    if report.was_cancelled() {
        warn!("Discovery interrupted, catalog documents not written");
        return Ok(report);
    }

    let written = write_catalog(&args.output_dir, &report.catalog, Utc::now())?;
    info!(documents = written.len(), "Catalog written");

    Ok(report)
}

/// Cancel `token` on Ctrl+C or SIGTERM.
async fn cancel_on_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, finishing in-flight batch");
        },
        _ = terminate => {
            info!("Received SIGTERM, finishing in-flight batch");
        },
    }

    token.cancel();
}
