use serde::Serialize;

/// `{componentId, error}` — precise attribution for a single failed check
/// within a step (spec §4.3).
#[derive(Debug, Clone, Serialize)]
pub struct StepFailure {
    pub component_id: String,
    pub error: String,
}

impl StepFailure {
    pub fn new(component_id: impl Into<String>, error: impl Into<String>) -> Self {
        StepFailure { component_id: component_id.into(), error: error.into() }
    }
}

/// The return shape every verifier step produces (spec §4.3). Exceptions are
/// reserved for unexpected failures and are caught at the dispatch boundary
/// (`execute_chain`), never mixed into `failures`.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyResult {
    pub is_valid: bool,
    pub failures: Vec<StepFailure>,
}

impl VerifyResult {
    pub fn ok() -> Self {
        VerifyResult { is_valid: true, failures: Vec::new() }
    }

    pub fn failed(failures: Vec<StepFailure>) -> Self {
        VerifyResult { is_valid: false, failures }
    }
}

/// A step's outcome: `Ok` carries the designed `{isValid, failures[]}` shape;
/// `Err` is an unexpected exception, converted to a top-level error by the
/// dispatcher (spec §7 "Exceptions").
pub type StepOutcome = Result<VerifyResult, String>;

/// A caught exception from a step, distinct from a step-level failure
/// (spec §7, channel 2).
#[derive(Debug, Clone, Serialize)]
pub struct TopLevelError {
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ChainOutcome {
    pub failures: Vec<StepFailure>,
    pub errors: Vec<TopLevelError>,
}
