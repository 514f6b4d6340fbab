use std::sync::Arc;

use anyhow::Context;
use aws_sdk_s3::Client as S3Client;

use signed_delivery::{
    object_storage::S3ObjectStorage,
    pipeline::Pipeline,
    probe::HttpCookieProbe,
    server,
    types::{Config, Environment},
};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let environment = Environment::from_env().unwrap_or_default();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(environment.default_log_filter()));

    // JSON for production log collectors, plain text otherwise
    if environment.json_logs() {
        fmt().json().with_env_filter(filter).init();
    } else {
        fmt().with_env_filter(filter).init();
    }

    let config = Config::from_env().context("Invalid configuration")?;
    tracing::info!(environment = %config.environment, bucket = %config.storage.bucket, "Configuration loaded");

    let s3_client = Arc::new(S3Client::from_conf(config.s3_client_config()));
    let uploader = S3ObjectStorage::new(s3_client);
    let probe = HttpCookieProbe::new();

    let report = Pipeline::new(&config, &uploader, &probe).run().await?;
    tracing::info!(location = %report.location, "Pipeline finished");

    if !config.serve_cookies {
        return Ok(());
    }

    server::start(config.port, Arc::new(report.cookies)).await
}
