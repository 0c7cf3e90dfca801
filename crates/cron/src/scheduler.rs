use crate::error::{CronError, Result};
use crate::profile_source::ProfileSource;
use crate::schedule::{CronPatterns, ScheduleName};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{info, warn};
use tv_app_lifecycle::AppStore;
use tv_queue::{RedisQueue, TaskRequest};
use tv_storage::TaskStore;
use uuid::Uuid;

/// What `GET /cron/status` reports (spec §6).
#[derive(Debug, Clone, Serialize)]
pub struct CronStatus {
    pub running: Vec<String>,
    pub patterns: HashMap<String, String>,
}

/// Owns the three named schedules plus the manual `forceRefreshAllApps`
/// trigger (spec §4.7, C7). All mutation goes through `Arc<CronScheduler>`
/// because `tokio-cron-scheduler` job bodies must be `'static`.
pub struct CronScheduler {
    sched: JobScheduler,
    patterns: CronPatterns,
    jobs: Mutex<HashMap<ScheduleName, Uuid>>,
    app_store: Arc<AppStore>,
    task_store: Arc<TaskStore>,
    profile_store: Arc<tv_app_lifecycle::ProfileStore>,
    profile_source: Arc<dyn ProfileSource>,
    queue: Arc<RedisQueue>,
}

impl CronScheduler {
    pub async fn new(
        patterns: CronPatterns,
        app_store: Arc<AppStore>,
        task_store: Arc<TaskStore>,
        profile_store: Arc<tv_app_lifecycle::ProfileStore>,
        profile_source: Arc<dyn ProfileSource>,
        queue: Arc<RedisQueue>,
    ) -> Result<Arc<Self>> {
        let sched = JobScheduler::new().await?;
        Ok(Arc::new(CronScheduler {
            sched,
            patterns,
            jobs: Mutex::new(HashMap::new()),
            app_store,
            task_store,
            profile_store,
            profile_source,
            queue,
        }))
    }

    /// Starts all three named schedules and the underlying tick loop.
    pub async fn start_all(self: &Arc<Self>) -> Result<()> {
        for name in ScheduleName::ALL {
            self.start(name).await?;
        }
        self.sched.start().await?;
        info!("cron scheduler started");
        Ok(())
    }

    pub async fn stop_all(self: &Arc<Self>) -> Result<()> {
        for name in ScheduleName::ALL {
            self.stop(name).await?;
        }
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.sched.shutdown().await?;
        Ok(())
    }

    pub async fn start(self: &Arc<Self>, name: ScheduleName) -> Result<()> {
        let mut jobs = self.jobs.lock().await;
        if jobs.contains_key(&name) {
            return Ok(());
        }

        let pattern = self.patterns.get(name).to_string();
        let this = self.clone();
        let job = Job::new_async(pattern.as_str(), move |_uuid, _l| {
            let this = this.clone();
            Box::pin(async move {
                if let Err(e) = this.run(name).await {
                    warn!(schedule = name.as_str(), error = %e, "scheduled run failed");
                }
            })
        })?;

        let job_id = self.sched.add(job).await?;
        jobs.insert(name, job_id);
        info!(schedule = name.as_str(), pattern = %pattern, "schedule started");
        Ok(())
    }

    pub async fn stop(self: &Arc<Self>, name: ScheduleName) -> Result<()> {
        let mut jobs = self.jobs.lock().await;
        if let Some(job_id) = jobs.remove(&name) {
            self.sched.remove(&job_id).await?;
            info!(schedule = name.as_str(), "schedule stopped");
        }
        Ok(())
    }

    /// Runs a named schedule's body immediately, outside its cron pattern
    /// (spec §4.7 admin `trigger`).
    pub async fn trigger(self: &Arc<Self>, name: ScheduleName) -> Result<()> {
        self.run(name).await
    }

    pub async fn status(self: &Arc<Self>) -> CronStatus {
        let jobs = self.jobs.lock().await;
        let running = jobs.keys().map(|n| n.as_str().to_string()).collect();
        let patterns = ScheduleName::ALL
            .into_iter()
            .map(|n| (n.as_str().to_string(), self.patterns.get(n).to_string()))
            .collect();
        CronStatus { running, patterns }
    }

    async fn run(&self, name: ScheduleName) -> Result<()> {
        match name {
            ScheduleName::CleanupFailedTasks => self.run_cleanup_failed_tasks().await,
            ScheduleName::SyncProfiles => self.run_sync_profiles().await,
            ScheduleName::SyncTasks => self.run_sync_tasks().await,
        }
    }

    async fn run_cleanup_failed_tasks(&self) -> Result<()> {
        let cutoff = chrono::Utc::now() - chrono::Duration::hours(24);
        let deleted = self.task_store.cleanup_failed_tasks(cutoff).await?;
        info!(deleted, "cleanup-failed-tasks completed");
        Ok(())
    }

    async fn run_sync_profiles(&self) -> Result<()> {
        let records = self.profile_source.fetch_profiles().await?;
        let count = records.len();
        self.profile_store.sync(records).await?;
        info!(count, "sync-profiles completed");
        Ok(())
    }

    async fn run_sync_tasks(&self) -> Result<()> {
        let apps = self.app_store.get_apps_needing_verification().await?;
        let mut enqueued = 0usize;
        for app in apps {
            let request = TaskRequest {
                app_id: app.app_id.clone(),
                app_metadata: None,
                verification_flags: None,
                force_refresh: false,
            };
            match self.queue.add_task(request).await {
                Ok(_) => enqueued += 1,
                Err(e) => warn!(app_id = %app.app_id, error = %e, "sync-tasks: failed to enqueue app"),
            }
        }
        info!(enqueued, "sync-tasks completed");
        Ok(())
    }

    /// `forceRefreshAllApps` (spec §4.7): enqueues every valid app
    /// regardless of cooldown.
    pub async fn force_refresh_apps(self: &Arc<Self>) -> Result<usize> {
        let apps = self.app_store.get_valid_apps().await?;
        let mut enqueued = 0usize;
        for app in apps {
            let request = TaskRequest {
                app_id: app.app_id.clone(),
                app_metadata: None,
                verification_flags: None,
                force_refresh: true,
            };
            match self.queue.add_task(request).await {
                Ok(_) => enqueued += 1,
                Err(e) => warn!(app_id = %app.app_id, error = %e, "force-refresh-apps: failed to enqueue app"),
            }
        }
        Ok(enqueued)
    }
}

/// Bearer-token check for the admin plane (spec §6 "gated by a bearer-token
/// check").
pub fn check_bearer_token(header_value: Option<&str>, expected: &str) -> Result<()> {
    let token = header_value.and_then(|h| h.strip_prefix("Bearer ")).unwrap_or("");
    if token == expected && !expected.is_empty() {
        Ok(())
    } else {
        Err(CronError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_matching_bearer_token() {
        assert!(check_bearer_token(Some("Bearer secret"), "secret").is_ok());
    }

    #[test]
    fn rejects_missing_header() {
        assert!(check_bearer_token(None, "secret").is_err());
    }

    #[test]
    fn rejects_wrong_token() {
        assert!(check_bearer_token(Some("Bearer wrong"), "secret").is_err());
    }

    #[test]
    fn rejects_empty_expected_token_even_if_header_empty() {
        assert!(check_bearer_token(Some("Bearer "), "").is_err());
        assert!(check_bearer_token(None, "").is_err());
    }
}
