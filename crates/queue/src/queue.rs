use crate::config::QueueConfig;
use crate::error::{QueueError, Result};
use crate::request::{QueueStats, TaskRequest};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::sync::Arc;
use tracing::{info, warn};
use tv_app_lifecycle::AppStore;
use uuid::Uuid;

fn key(queue_name: &str, suffix: &str) -> String {
    format!("queue:{queue_name}:{suffix}")
}

/// Durable priority queue over a Redis backend (spec §4.5). The job id
/// backing each entry is the task's own uuid, so re-adding a task for an
/// app that already has one in flight is a no-op (spec §3 "At-most-one-
/// in-flight-per-app").
pub struct RedisQueue {
    conn: ConnectionManager,
    app_store: Arc<AppStore>,
    config: QueueConfig,
}

impl RedisQueue {
    pub async fn connect(redis_url: &str, app_store: Arc<AppStore>, config: QueueConfig) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_connection_manager().await?;
        Ok(RedisQueue { conn, app_store, config })
    }

    /// Enqueues a verification task, failing fast if the app is unknown
    /// (spec §4.5 `addTask`).
    pub async fn add_task(&self, request: TaskRequest) -> Result<Uuid> {
        if !self.app_store.app_exists(&request.app_id).await.map_err(|e| QueueError::Backend(redis_err(e)))? {
            return Err(QueueError::AppNotFound(request.app_id));
        }

        let mut conn = self.conn.clone();
        let inflight_key = key(&self.config.queue_name, &format!("inflight:{}", request.app_id));

        if !request.force_refresh {
            if let Some(existing) = conn.get::<_, Option<String>>(&inflight_key).await? {
                if let Ok(task_id) = Uuid::parse_str(&existing) {
                    info!(app_id = %request.app_id, %task_id, "addTask: app already has an in-flight task, no-op");
                    return Ok(task_id);
                }
            }
        }

        let task_id = Uuid::new_v4();
        let payload = serde_json::to_string(&request)?;

        let task_key = key(&self.config.queue_name, &format!("task:{task_id}"));
        let waiting_key = key(&self.config.queue_name, "waiting");
        let ids_key = key(&self.config.queue_name, "ids");

        let _: () = conn.set(&task_key, &payload).await?;
        let _: () = conn.sadd(&ids_key, task_id.to_string()).await?;
        let _: () = conn.lpush(&waiting_key, task_id.to_string()).await?;
        let _: () = conn.set(&inflight_key, task_id.to_string()).await?;

        info!(app_id = %request.app_id, %task_id, "task enqueued");
        Ok(task_id)
    }

    /// Pops the oldest waiting task and moves it to `active`, or returns
    /// `None` if the queue is empty or paused (spec §4.5 worker dispatch).
    pub async fn claim_next(&self) -> Result<Option<(Uuid, TaskRequest)>> {
        let mut conn = self.conn.clone();
        let name = &self.config.queue_name;

        if conn.exists(key(name, "paused")).await? {
            tokio::time::sleep(std::time::Duration::from_millis(250)).await;
            return Ok(None);
        }

        let popped: Option<String> = conn.rpop(key(name, "waiting"), None).await?;
        let Some(raw_id) = popped else {
            tokio::time::sleep(std::time::Duration::from_millis(250)).await;
            return Ok(None);
        };
        let Ok(task_id) = Uuid::parse_str(&raw_id) else {
            warn!(raw_id, "dropping malformed task id from waiting list");
            return Ok(None);
        };

        let _: () = conn.sadd(key(name, "active"), raw_id.clone()).await?;

        let task_key = key(name, &format!("task:{task_id}"));
        let payload: Option<String> = conn.get(&task_key).await?;
        let Some(payload) = payload else {
            warn!(%task_id, "claimed task has no stored payload, skipping");
            let _: () = conn.srem(key(name, "active"), raw_id).await?;
            return Ok(None);
        };
        let request: TaskRequest = serde_json::from_str(&payload)?;
        Ok(Some((task_id, request)))
    }

    /// Moves a task out of `active` into its terminal set, clearing the
    /// app's in-flight marker so a future `addTask` is not deduped against
    /// a task that has already finished (spec §3).
    pub async fn finish_task(&self, task_id: Uuid, app_id: &str, succeeded: bool) -> Result<()> {
        let mut conn = self.conn.clone();
        let name = &self.config.queue_name;
        let terminal = if succeeded { "completed" } else { "failed" };

        let _: () = conn.srem(key(name, "active"), task_id.to_string()).await?;
        let _: () = conn.sadd(key(name, terminal), task_id.to_string()).await?;
        let _: () = conn.del(key(name, &format!("inflight:{app_id}"))).await?;
        Ok(())
    }

    pub async fn stats(&self) -> Result<QueueStats> {
        let mut conn = self.conn.clone();
        let name = &self.config.queue_name;
        let waiting: u64 = conn.llen(key(name, "waiting")).await?;
        let active: u64 = conn.scard(key(name, "active")).await?;
        let completed: u64 = conn.scard(key(name, "completed")).await?;
        let failed: u64 = conn.scard(key(name, "failed")).await?;
        let delayed: u64 = conn.zcard(key(name, "delayed")).await?;
        let paused: bool = conn.exists(key(name, "paused")).await?;
        Ok(QueueStats { waiting, active, completed, failed, delayed, paused })
    }

    pub async fn health_check(&self) -> Result<QueueStats> {
        let mut conn = self.conn.clone();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        if pong != "PONG" {
            warn!(response = %pong, "unexpected PING response from queue backend");
        }
        self.stats().await
    }

    /// No persistent resources of our own to release beyond the shared
    /// connection manager; logs so operators can see an intentional
    /// shutdown in the trace.
    pub async fn close(&self) {
        info!(queue = %self.config.queue_name, "queue closed");
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub(crate) fn conn(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

fn redis_err(e: tv_app_lifecycle::AppLifecycleError) -> redis::RedisError {
    redis::RedisError::from((redis::ErrorKind::IoError, "app lookup failed", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_namespaces_by_queue_name() {
        assert_eq!(key("attestation-verification", "waiting"), "queue:attestation-verification:waiting");
        assert_eq!(key("attestation-verification", "inflight:app-1"), "queue:attestation-verification:inflight:app-1");
    }
}
