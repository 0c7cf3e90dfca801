// ============================================================================
// TV TYPES - Canonical Type Definitions
// ============================================================================
// PURPOSE: Shared types used across every attestation-verification component
//
// CORE TYPES:
// - App, AppConfigType, GovernanceKind: the upstream app registration
// - VerificationTask: one execution attempt and its terminal state
// - DataObject, Calculation, MeasuredBy: the verification graph
// - SystemInfo, QuoteData, EventLogEntry, AttestationBundle: attestation wire
//   shapes as reported by the running app
// - version: the single VersionPolicy object the rest of the workspace
//   consults instead of comparing version strings ad hoc
//
// All types implement Serialize/Deserialize and Clone/Debug. None of them
// own network or storage behavior; that lives in tv-fetchers / tv-storage.
// ============================================================================

pub mod app;
pub mod data_object;
pub mod error;
pub mod system_info;
pub mod task;
pub mod version;

pub use app::{App, AppConfigType, GovernanceKind};
pub use data_object::{Calculation, DataObject, MeasuredBy};
pub use error::TypesError;
pub use system_info::{AppInfo, AttestationBundle, EventLogEntry, KmsInfo, QuoteData, SystemInfo, TcbInfo, VmConfig};
pub use task::{TaskId, VerificationTask, VerificationTaskStatus};
pub use version::{DstackVersion, VersionPolicy};
