use crate::config::QueueConfig;
use crate::queue::RedisQueue;
use crate::request::TaskRequest;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tracing::{info, warn};
use tv_app_lifecycle::AppStore;
use tv_fetchers::{AttestationClient, CtLogClient, GatewayClient, ImageRepository, OnChainRegistry, ToolExec};
use tv_storage::{ArtifactSink, TaskStore, TaskUpdate};
use tv_types::task::{ArtifactPointer, VerificationTask, VerificationTaskStatus};
use tv_verification_service::{AppVerificationConfig, GitCommitResolver, VerificationService};
use tv_verifiers::DnsCaaResolver;
use uuid::Uuid;

/// Endpoint identifiers the chain roles need but the `App` mirror doesn't
/// carry (spec §3 `App` has no rpc/KMS-endpoint fields); the scheduler
/// attaches these on `addTask` as `app_metadata`.
#[derive(Debug, Clone, Default, Deserialize)]
struct AppMetadata {
    #[serde(default)]
    rpc_endpoint: String,
    #[serde(default)]
    kms_app_id: String,
    #[serde(default)]
    kms_rpc_endpoint: String,
    #[serde(default)]
    approved_ca_issuers: Vec<String>,
}

/// Fixed set of adapters a fresh `VerificationService` is built from per
/// task (spec §4.5 "fresh service instance per task" isolation).
#[derive(Clone)]
pub struct VerifierAdapters {
    pub attestation_client: Arc<dyn AttestationClient>,
    pub gateway_client: Arc<dyn GatewayClient>,
    pub onchain_registry: Arc<dyn OnChainRegistry>,
    pub ct_log_client: Arc<dyn CtLogClient>,
    pub dns_resolver: Arc<dyn DnsCaaResolver>,
    pub tool_exec: Arc<dyn ToolExec>,
    pub image_repository: Arc<dyn ImageRepository>,
    pub git_commit_resolver: Arc<dyn GitCommitResolver>,
}

/// Bounded-concurrency dispatcher that drains the queue's waiting list
/// (spec §4.5 "Worker Pool").
pub struct Worker {
    queue: Arc<RedisQueue>,
    app_store: Arc<AppStore>,
    task_store: Arc<TaskStore>,
    artifact_sink: Arc<ArtifactSink>,
    adapters: VerifierAdapters,
    config: QueueConfig,
}

impl Worker {
    pub fn new(
        queue: Arc<RedisQueue>,
        app_store: Arc<AppStore>,
        task_store: Arc<TaskStore>,
        artifact_sink: Arc<ArtifactSink>,
        adapters: VerifierAdapters,
        config: QueueConfig,
    ) -> Self {
        Worker { queue, app_store, task_store, artifact_sink, adapters, config }
    }

    /// Runs until `shutdown` carries `true`, spawning one task per claimed
    /// job bounded by `config.concurrency` in-flight tasks.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut reconnect_attempt = 0u32;

        loop {
            if *shutdown.borrow() {
                info!("worker pool shutting down");
                break;
            }

            tokio::select! {
                _ = shutdown.changed() => continue,
                claimed = self.queue.claim_next() => {
                    match claimed {
                        Ok(Some((task_id, request))) => {
                            reconnect_attempt = 0;
                            let permit = semaphore.clone().acquire_owned().await.expect("semaphore never closed");
                            let worker = self.clone();
                            tokio::spawn(async move {
                                let _permit = permit;
                                worker.process(task_id, request).await;
                            });
                        }
                        Ok(None) => {}
                        Err(e) => {
                            warn!(error = %e, "failed to claim next task from queue backend");
                            let delay = tv_fetchers::retry::backoff_delay(
                                reconnect_attempt,
                                self.config.backoff_delay,
                                self.config.reconnect_backoff_cap,
                                Duration::from_millis(200),
                            );
                            reconnect_attempt = reconnect_attempt.saturating_add(1);
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }
        }
    }

    async fn process(&self, task_id: Uuid, request: TaskRequest) {
        let started_at = chrono::Utc::now();

        let app = match self.app_store.get_app(&request.app_id).await {
            Ok(Some(app)) if app.is_valid() => app,
            Ok(Some(_)) => {
                self.fail(task_id, &request.app_id, started_at, "app is no longer valid".to_string()).await;
                return;
            }
            Ok(None) => {
                self.fail(task_id, &request.app_id, started_at, format!("app {} no longer exists", request.app_id))
                    .await;
                return;
            }
            Err(e) => {
                self.fail(task_id, &request.app_id, started_at, format!("app lookup failed: {e}")).await;
                return;
            }
        };

        let task = VerificationTask {
            task_id,
            app_id: request.app_id.clone(),
            status: VerificationTaskStatus::Active,
            queue_job_id: task_id.to_string(),
            created_at: started_at,
            started_at: Some(started_at),
            finished_at: None,
            error_message: None,
            artifact: None,
        };
        if let Err(e) = self.task_store.create_task(&task).await {
            warn!(%task_id, error = %e, "failed to persist task row, continuing anyway");
        }

        let metadata: AppMetadata = request
            .app_metadata
            .clone()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();

        let app_config = AppVerificationConfig {
            app_id: app.app_id.clone(),
            base_image: app.base_image.clone(),
            rpc_endpoint: metadata.rpc_endpoint,
            domain: app.target_domain_or_model.clone().unwrap_or_default(),
            kms_app_id: metadata.kms_app_id,
            kms_rpc_endpoint: metadata.kms_rpc_endpoint,
            kms_contract_address: app.kms_contract_address.clone(),
            kms_chain_id: app.kms_chain_id,
            approved_ca_issuers: metadata.approved_ca_issuers,
        };

        let mut service = VerificationService::new(
            self.adapters.attestation_client.clone(),
            self.adapters.gateway_client.clone(),
            self.adapters.onchain_registry.clone(),
            self.adapters.ct_log_client.clone(),
            self.adapters.dns_resolver.clone(),
            self.adapters.tool_exec.clone(),
            self.adapters.image_repository.clone(),
            self.adapters.git_commit_resolver.clone(),
        );

        let flags = request.verification_flags.clone().unwrap_or_default();
        let report = match tokio::time::timeout(self.config.verification_timeout, service.verify(&app_config, flags))
            .await
        {
            Ok(report) => report,
            Err(_) => {
                self.fail(task_id, &request.app_id, started_at, "verification timed out".to_string()).await;
                return;
            }
        };

        if !report.success {
            let message = report
                .errors
                .first()
                .map(|e| e.message.clone())
                .unwrap_or_else(|| "verification completed with failures".to_string());
            self.complete_with_failures(task_id, &request.app_id, started_at, message, &report).await;
            return;
        }

        match self.artifact_sink.upload_json(&report).await {
            Ok(artifact) => {
                let finished_at = chrono::Utc::now();
                let data_object_ids = report.data_objects.iter().map(|d| d.id.clone()).collect();
                let update = TaskUpdate {
                    status: Some(VerificationTaskStatus::Completed),
                    finished_at: Some(finished_at),
                    artifact: Some(ArtifactPointer {
                        bucket: artifact.bucket,
                        key: artifact.key,
                        filename: artifact.filename,
                        data_object_ids,
                    }),
                    ..Default::default()
                };
                if let Err(e) = self.task_store.update_task(task_id, &update).await {
                    warn!(%task_id, error = %e, "failed to persist completed task");
                }
                self.queue.finish_task(task_id, &request.app_id, true).await.ok();
                info!(%task_id, app_id = %request.app_id, "verification completed");
            }
            Err(e) => {
                // The report itself succeeded; only the post-processing
                // upload step failed, so the task is still marked failed
                // rather than completed without an artifact.
                self.fail(task_id, &request.app_id, started_at, format!("post-processing failed: {e}")).await;
            }
        }
    }

    async fn complete_with_failures(
        &self,
        task_id: Uuid,
        app_id: &str,
        _started_at: chrono::DateTime<chrono::Utc>,
        message: String,
        report: &tv_verification_service::VerificationReport,
    ) {
        match self.artifact_sink.upload_json(report).await {
            Ok(artifact) => {
                let data_object_ids = report.data_objects.iter().map(|d| d.id.clone()).collect();
                let update = TaskUpdate {
                    status: Some(VerificationTaskStatus::Failed),
                    finished_at: Some(chrono::Utc::now()),
                    error_message: Some(message),
                    artifact: Some(ArtifactPointer {
                        bucket: artifact.bucket,
                        key: artifact.key,
                        filename: artifact.filename,
                        data_object_ids,
                    }),
                    ..Default::default()
                };
                self.task_store.update_task(task_id, &update).await.ok();
            }
            Err(e) => {
                let update = TaskUpdate {
                    status: Some(VerificationTaskStatus::Failed),
                    finished_at: Some(chrono::Utc::now()),
                    error_message: Some(format!("{message}; artifact upload also failed: {e}")),
                    ..Default::default()
                };
                self.task_store.update_task(task_id, &update).await.ok();
            }
        }
        self.queue.finish_task(task_id, app_id, false).await.ok();
    }

    async fn fail(&self, task_id: Uuid, app_id: &str, _started_at: chrono::DateTime<chrono::Utc>, message: String) {
        warn!(%task_id, app_id, error = %message, "task failed");
        let update = TaskUpdate {
            status: Some(VerificationTaskStatus::Failed),
            finished_at: Some(chrono::Utc::now()),
            error_message: Some(message),
            ..Default::default()
        };
        if let Err(e) = self.task_store.update_task(task_id, &update).await {
            warn!(%task_id, error = %e, "failed to persist failed task");
        }
        self.queue.finish_task(task_id, app_id, false).await.ok();
    }
}
