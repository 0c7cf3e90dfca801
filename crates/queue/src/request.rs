use serde::{Deserialize, Serialize};
use tv_verifiers::VerificationFlagsPatch;

/// `addTask` input (spec §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    pub app_id: String,
    #[serde(default)]
    pub app_metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub verification_flags: Option<VerificationFlagsPatch>,
    #[serde(default)]
    pub force_refresh: bool,
}

/// `stats()` output (spec §4.5).
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct QueueStats {
    pub waiting: u64,
    pub active: u64,
    pub completed: u64,
    pub failed: u64,
    pub delayed: u64,
    pub paused: bool,
}
