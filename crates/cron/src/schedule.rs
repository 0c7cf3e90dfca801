/// The three named schedules (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScheduleName {
    CleanupFailedTasks,
    SyncProfiles,
    SyncTasks,
}

impl ScheduleName {
    pub const ALL: [ScheduleName; 3] =
        [ScheduleName::CleanupFailedTasks, ScheduleName::SyncProfiles, ScheduleName::SyncTasks];

    pub fn as_str(self) -> &'static str {
        match self {
            ScheduleName::CleanupFailedTasks => "cleanup-failed-tasks",
            ScheduleName::SyncProfiles => "sync-profiles",
            ScheduleName::SyncTasks => "sync-tasks",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "cleanup-failed-tasks" => Some(ScheduleName::CleanupFailedTasks),
            "sync-profiles" => Some(ScheduleName::SyncProfiles),
            "sync-tasks" => Some(ScheduleName::SyncTasks),
            _ => None,
        }
    }
}

/// Configurable cron patterns, one per named schedule (spec §6
/// `CLEANUP_CRON_PATTERN` / `PROFILE_CRON_PATTERN` / `TASKS_CRON_PATTERN`).
#[derive(Debug, Clone)]
pub struct CronPatterns {
    pub cleanup_failed_tasks: String,
    pub sync_profiles: String,
    pub sync_tasks: String,
}

impl CronPatterns {
    pub fn get(&self, name: ScheduleName) -> &str {
        match name {
            ScheduleName::CleanupFailedTasks => &self.cleanup_failed_tasks,
            ScheduleName::SyncProfiles => &self.sync_profiles,
            ScheduleName::SyncTasks => &self.sync_tasks,
        }
    }
}

impl Default for CronPatterns {
    fn default() -> Self {
        CronPatterns {
            cleanup_failed_tasks: "0 0 3 * * *".to_string(),
            sync_profiles: "0 */15 * * * *".to_string(),
            sync_tasks: "0 */5 * * * *".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn as_str_and_parse_round_trip() {
        for name in ScheduleName::ALL {
            assert_eq!(ScheduleName::parse(name.as_str()), Some(name));
        }
    }

    #[test]
    fn parse_rejects_unknown_names() {
        assert_eq!(ScheduleName::parse("not-a-schedule"), None);
    }

    #[test]
    fn default_patterns_cover_every_schedule() {
        let patterns = CronPatterns::default();
        for name in ScheduleName::ALL {
            assert!(!patterns.get(name).is_empty());
        }
    }
}
