mod config;
mod http;

use anyhow::Context;
use config::ServerConfig;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;
use tv_app_lifecycle::{AppStore, ProfileStore};
use tv_cron::{CronPatterns, CronScheduler, HttpProfileSource};
use tv_fetchers::{
    FsImageRepository, HttpAttestationClient, HttpCtLogClient, HttpGatewayClient, JsonRpcOnChainRegistry,
    LocalToolExec,
};
use tv_queue::{QueueConfig, RedisQueue, VerifierAdapters, Worker};
use tv_storage::{ArtifactSink, TaskStore};
use tv_verification_service::HttpGitCommitResolver;
use tv_verifiers::HttpDohCaaResolver;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let config = ServerConfig::from_env().context("load configuration from environment")?;
    info!(port = config.port, host = %config.host, node_env = %config.node_env, "starting tv-server");

    let db_pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("connect to database")?;

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let s3_builder = aws_sdk_s3::config::Builder::from(&aws_config);
    let s3_builder = match &config.s3_endpoint {
        Some(endpoint) => s3_builder.endpoint_url(endpoint),
        None => s3_builder,
    };
    let s3_client = aws_sdk_s3::Client::from_conf(s3_builder.build());

    let app_store = Arc::new(AppStore::new(db_pool.clone()));
    let profile_store = Arc::new(ProfileStore::new(db_pool.clone()));
    let task_store = Arc::new(TaskStore::new(db_pool.clone()));
    let artifact_sink = Arc::new(ArtifactSink::new(s3_client, config.s3_bucket.clone()));

    let mut queue_config = QueueConfig::default();
    queue_config.queue_name = config.queue_name.clone();
    queue_config.concurrency = config.queue_concurrency;
    queue_config.max_attempts = config.queue_max_attempts;
    queue_config.backoff_delay = config.queue_backoff_delay;

    let queue = Arc::new(
        RedisQueue::connect(&config.redis_url, app_store.clone(), queue_config.clone())
            .await
            .context("connect to queue backend")?,
    );

    let adapters = VerifierAdapters {
        attestation_client: Arc::new(HttpAttestationClient::new(config.cloud_endpoint.clone())),
        gateway_client: Arc::new(HttpGatewayClient::new()),
        onchain_registry: Arc::new(JsonRpcOnChainRegistry::new(config.onchain_rpc_endpoints.clone())),
        ct_log_client: Arc::new(HttpCtLogClient::new(config.ct_aggregator_base.clone())),
        dns_resolver: Arc::new(HttpDohCaaResolver::default()),
        tool_exec: Arc::new(LocalToolExec::new(config.tool_binary_path.clone())),
        image_repository: Arc::new(FsImageRepository::new(
            config.image_cache_dir.clone(),
            config.image_download_base_url.clone(),
        )),
        git_commit_resolver: Arc::new(HttpGitCommitResolver::default()),
    };

    let worker = Arc::new(Worker::new(
        queue.clone(),
        app_store.clone(),
        task_store.clone(),
        artifact_sink,
        adapters,
        queue_config,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker_handle = tokio::spawn(worker.run(shutdown_rx));

    let profile_source: Arc<dyn tv_cron::ProfileSource> =
        Arc::new(HttpProfileSource::new(config.metabase_url.clone(), config.metabase_api_key.clone()));
    let cron = CronScheduler::new(
        CronPatterns {
            cleanup_failed_tasks: config.cleanup_cron_pattern.clone(),
            sync_profiles: config.profile_cron_pattern.clone(),
            sync_tasks: config.tasks_cron_pattern.clone(),
        },
        app_store,
        task_store.clone(),
        profile_store,
        profile_source,
        queue,
    )
    .await
    .context("build cron scheduler")?;
    cron.start_all().await.context("start cron schedules")?;

    let state = Arc::new(http::AppState { cron, task_store, cron_api_key: config.cron_api_key.clone() });
    let routes = http::routes(state);

    let addr: std::net::SocketAddr =
        format!("0.0.0.0:{}", config.port).parse().context("parse bind address")?;
    info!(%addr, "admin HTTP surface listening");

    let server = warp::serve(routes).run(addr);

    tokio::select! {
        _ = server => {}
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received, draining worker pool");
            shutdown_tx.send(true).ok();
            worker_handle.await.ok();
        }
    }

    Ok(())
}
