use crate::error::TypesError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A relationship asserting that a field/calc-output on one object is
/// cryptographically bound to a field/register on another (spec §3).
/// Equality is over the full tuple — that's what makes relationship
/// dedup (property P3) well-defined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasuredBy {
    pub source_object_id: String,
    pub source_field: Option<String>,
    pub source_calc_output: Option<String>,
    pub self_field: Option<String>,
    pub self_calc_output: Option<String>,
}

/// A pure function applied over named input fields, producing named
/// outputs (e.g. `replay_rtmr`, `sha256`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Calculation {
    pub inputs: Vec<String>,
    pub function: String,
    pub outputs: Vec<String>,
}

/// A node in the verification graph: `{component}-{aspect}`, e.g.
/// `kms-cpu`, `app-event-logs-imr3` (spec §3 "DataObject").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataObject {
    pub id: String,
    pub name: String,
    pub description: String,
    pub fields: HashMap<String, serde_json::Value>,
    pub calculations: Vec<Calculation>,
    pub measured_by: Vec<MeasuredBy>,
}

impl DataObject {
    pub fn new(id: impl Into<String>, name: impl Into<String>, description: impl Into<String>) -> Result<Self, TypesError> {
        let id = id.into();
        if !id.contains('-') {
            return Err(TypesError::InvalidDataObjectId(id));
        }
        Ok(DataObject {
            id,
            name: name.into(),
            description: description.into(),
            fields: HashMap::new(),
            calculations: Vec::new(),
            measured_by: Vec::new(),
        })
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_calculation(mut self, calc: Calculation) -> Self {
        self.calculations.push(calc);
        self
    }

    /// Appends `edge` unless an equal tuple already exists (spec P3).
    pub fn add_measured_by(&mut self, edge: MeasuredBy) {
        if !self.measured_by.contains(&edge) {
            self.measured_by.push(edge);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_ids_without_component_aspect_separator() {
        assert!(DataObject::new("nosep", "n", "d").is_err());
    }

    #[test]
    fn duplicate_measured_by_is_deduped() {
        let mut obj = DataObject::new("app-main", "App", "desc").unwrap();
        let edge = MeasuredBy {
            source_object_id: "app-quote".into(),
            source_field: Some("mrtd".into()),
            source_calc_output: None,
            self_field: Some("mrtd".into()),
            self_calc_output: None,
        };
        obj.add_measured_by(edge.clone());
        obj.add_measured_by(edge.clone());
        obj.add_measured_by(edge);
        assert_eq!(obj.measured_by.len(), 1);
    }
}
