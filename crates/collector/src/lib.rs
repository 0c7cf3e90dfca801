// ============================================================================
// TV COLLECTOR - Per-Verification DataObject Graph (spec C2)
// ============================================================================
// Holds the DataObjects a single verification run produces, wires the
// `measured_by` relationships between them, and exposes a masked snapshot
// for anything leaving the process. One instance per `verify()` call —
// never shared across concurrent verifications (spec §5 hard invariant).
// ============================================================================

pub mod collector;
pub mod masking;
pub mod relationship;

pub use collector::{CollectorEvent, DataObjectCollector};
pub use masking::mask;
pub use relationship::{kms_wiring, Relationship};
