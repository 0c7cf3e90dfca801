use crate::error::Result;
use sqlx::{PgPool, Row};
use tracing::warn;
use tv_types::task::{ArtifactPointer, TaskId, VerificationTask, VerificationTaskStatus};

/// A partial update to a task row; `None` fields are left unchanged
/// (spec §4.8 "updateVerificationTask: partial update").
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub status: Option<VerificationTaskStatus>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
    pub error_message: Option<String>,
    pub artifact: Option<ArtifactPointer>,
}

fn status_str(status: VerificationTaskStatus) -> &'static str {
    match status {
        VerificationTaskStatus::Pending => "pending",
        VerificationTaskStatus::Active => "active",
        VerificationTaskStatus::Completed => "completed",
        VerificationTaskStatus::Failed => "failed",
        VerificationTaskStatus::Cancelled => "cancelled",
    }
}

/// Durable task records (spec C8, `verification_tasks` table).
pub struct TaskStore {
    pool: PgPool,
}

impl TaskStore {
    pub fn new(pool: PgPool) -> Self {
        TaskStore { pool }
    }

    /// Idempotent on duplicate `task_id`: a conflicting insert is logged
    /// and treated as success, not an error (spec §4.8).
    pub async fn create_task(&self, task: &VerificationTask) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO verification_tasks (task_id, app_id, status, queue_job_id, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (task_id) DO NOTHING
            "#,
        )
        .bind(task.task_id)
        .bind(&task.app_id)
        .bind(status_str(task.status))
        .bind(&task.queue_job_id)
        .bind(task.created_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            warn!(task_id = %task.task_id, "create_task: task_id already exists, treating as idempotent no-op");
        }
        Ok(())
    }

    /// Returns whether a row was actually changed; a missing row is a
    /// soft warning rather than an error (spec §4.8, §7 "Updates to a
    /// missing task are warnings").
    pub async fn update_task(&self, task_id: TaskId, patch: &TaskUpdate) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE verification_tasks SET
                status = COALESCE($2, status),
                started_at = COALESCE($3, started_at),
                finished_at = COALESCE($4, finished_at),
                error_message = COALESCE($5, error_message),
                artifact_bucket = COALESCE($6, artifact_bucket),
                artifact_key = COALESCE($7, artifact_key),
                artifact_filename = COALESCE($8, artifact_filename),
                artifact_data_object_ids = COALESCE($9, artifact_data_object_ids)
            WHERE task_id = $1
            "#,
        )
        .bind(task_id)
        .bind(patch.status.map(status_str))
        .bind(patch.started_at)
        .bind(patch.finished_at)
        .bind(&patch.error_message)
        .bind(patch.artifact.as_ref().map(|a| a.bucket.clone()))
        .bind(patch.artifact.as_ref().map(|a| a.key.clone()))
        .bind(patch.artifact.as_ref().map(|a| a.filename.clone()))
        .bind(patch.artifact.as_ref().map(|a| serde_json::to_value(&a.data_object_ids)).transpose()?)
        .execute(&self.pool)
        .await?;

        let changed = result.rows_affected() > 0;
        if !changed {
            warn!(task_id = %task_id, "update_task: no row found for task_id");
        }
        Ok(changed)
    }

    /// Last `completed` task's `finished_at`, or `None` if there is none
    /// (spec §4.8 `getLatestCompletedTask`).
    pub async fn get_latest_completed_task(&self) -> Result<Option<chrono::DateTime<chrono::Utc>>> {
        let row = sqlx::query(
            "SELECT finished_at FROM verification_tasks WHERE status = 'completed' ORDER BY finished_at DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|r| r.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>("finished_at").ok().flatten()))
    }

    /// Deletes `failed`/`cancelled` tasks older than `cutoff` (spec §4.6
    /// `cleanupFailedTasks`).
    pub async fn cleanup_failed_tasks(&self, cutoff: chrono::DateTime<chrono::Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM verification_tasks WHERE status IN ('failed', 'cancelled') AND created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
