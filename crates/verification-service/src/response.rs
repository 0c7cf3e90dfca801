use serde::Serialize;
use tv_types::DataObject;
use tv_verifiers::{StepFailure, TopLevelError};

/// The output artifact shape, verbatim (spec §6 "Output artifact").
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub data_objects: Vec<DataObject>,
    pub completed_at: String,
    pub errors: Vec<TopLevelError>,
    pub failures: Vec<StepFailure>,
    pub success: bool,
}
