use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type TaskId = Uuid;

/// spec §3 "VerificationTask" lifecycle: exactly one terminal transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationTaskStatus {
    Pending,
    Active,
    Completed,
    Failed,
    Cancelled,
}

impl VerificationTaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            VerificationTaskStatus::Completed
                | VerificationTaskStatus::Failed
                | VerificationTaskStatus::Cancelled
        )
    }
}

/// Artifact pointers populated only when `status == Completed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactPointer {
    pub bucket: String,
    pub key: String,
    pub filename: String,
    pub data_object_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationTask {
    pub task_id: TaskId,
    pub app_id: String,
    pub status: VerificationTaskStatus,
    pub queue_job_id: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
    pub error_message: Option<String>,
    pub artifact: Option<ArtifactPointer>,
}

impl VerificationTask {
    pub fn new_pending(app_id: impl Into<String>, queue_job_id: impl Into<String>) -> Self {
        let task_id = Uuid::new_v4();
        VerificationTask {
            task_id,
            app_id: app_id.into(),
            status: VerificationTaskStatus::Pending,
            queue_job_id: queue_job_id.into(),
            created_at: chrono::Utc::now(),
            started_at: None,
            finished_at: None,
            error_message: None,
            artifact: None,
        }
    }

    /// Invariant check (spec §3): `started <= finished`, artifacts iff
    /// completed. Used by storage-layer tests and assertions, not enforced
    /// at the type level since rows round-trip through SQL as plain fields.
    pub fn is_well_formed(&self) -> bool {
        let ordering_ok = match (self.started_at, self.finished_at) {
            (Some(s), Some(f)) => s <= f,
            _ => true,
        };
        let artifact_ok = (self.status == VerificationTaskStatus::Completed)
            == self.artifact.is_some();
        ordering_ok && artifact_ok
    }

    /// spec §4.6 cooldown laws: how long this terminal status blocks a new
    /// task for the same app.
    pub fn cooldown(&self) -> Option<chrono::Duration> {
        match self.status {
            VerificationTaskStatus::Completed => Some(chrono::Duration::hours(24)),
            VerificationTaskStatus::Failed => Some(chrono::Duration::minutes(30)),
            _ => None,
        }
    }

    /// True when this task's cooldown still blocks a new verification as of
    /// `now` (spec P4).
    pub fn blocks_new_task(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        match (self.cooldown(), self.finished_at) {
            (Some(cooldown), Some(finished_at)) => now < finished_at + cooldown,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_task_has_no_artifact_and_is_well_formed() {
        let task = VerificationTask::new_pending("app1", "job1");
        assert!(task.is_well_formed());
        assert_eq!(task.status, VerificationTaskStatus::Pending);
    }

    #[test]
    fn completed_cooldown_blocks_for_24h() {
        let mut task = VerificationTask::new_pending("app1", "job1");
        task.status = VerificationTaskStatus::Completed;
        task.finished_at = Some(chrono::Utc::now());
        task.artifact = Some(ArtifactPointer {
            bucket: "b".into(),
            key: "k".into(),
            filename: "f".into(),
            data_object_ids: vec![],
        });
        assert!(task.is_well_formed());
        assert!(task.blocks_new_task(chrono::Utc::now() + chrono::Duration::hours(1)));
        assert!(!task.blocks_new_task(chrono::Utc::now() + chrono::Duration::hours(25)));
    }

    #[test]
    fn failed_cooldown_blocks_for_30_minutes() {
        let mut task = VerificationTask::new_pending("app1", "job1");
        task.status = VerificationTaskStatus::Failed;
        task.finished_at = Some(chrono::Utc::now());
        assert!(task.blocks_new_task(chrono::Utc::now() + chrono::Duration::minutes(10)));
        assert!(!task.blocks_new_task(chrono::Utc::now() + chrono::Duration::minutes(31)));
    }

    #[test]
    fn completed_without_artifact_is_malformed() {
        let mut task = VerificationTask::new_pending("app1", "job1");
        task.status = VerificationTaskStatus::Completed;
        task.finished_at = Some(chrono::Utc::now());
        assert!(!task.is_well_formed());
    }
}
