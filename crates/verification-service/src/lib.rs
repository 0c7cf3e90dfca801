// ============================================================================
// TV VERIFICATION SERVICE - Per-Request Lifecycle (spec C4)
// ============================================================================
// Ties C1 (fetchers), C2 (collector), and C3 (verifier chain) together
// behind a single `verify(appConfig, flags)` entry point. One instance
// should back exactly one verification task (spec §4.5 "no shared
// collector between tasks").
// ============================================================================

pub mod config;
pub mod error_mapping;
pub mod git_commit;
pub mod response;
pub mod service;

pub use config::AppVerificationConfig;
pub use error_mapping::map_error_message;
pub use git_commit::{GitCommitError, GitCommitResolver, HttpGitCommitResolver};
pub use response::VerificationReport;
pub use service::VerificationService;
