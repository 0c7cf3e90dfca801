use crate::relationship::{kms_wiring, Relationship};
use tracing::warn;
use tv_types::DataObject;

#[derive(Debug, Clone)]
pub enum CollectorEvent {
    ObjectCreated(String),
    ObjectUpdated(String),
}

/// Per-verification DataObject graph. Never shared across concurrent
/// `verify` calls — holding one of these for longer than a single
/// verification call is the one hard invariant of this crate (spec §5,
/// property P1).
pub struct DataObjectCollector {
    objects: Vec<DataObject>,
    pending_relationships: Vec<Relationship>,
    on_event: Option<Box<dyn Fn(CollectorEvent) -> Result<(), String> + Send + Sync>>,
}

impl DataObjectCollector {
    pub fn new() -> Self {
        DataObjectCollector { objects: Vec::new(), pending_relationships: Vec::new(), on_event: None }
    }

    pub fn with_event_listener(
        mut self,
        listener: Box<dyn Fn(CollectorEvent) -> Result<(), String> + Send + Sync>,
    ) -> Self {
        self.on_event = Some(listener);
        self
    }

    fn emit(&self, event: CollectorEvent) {
        if let Some(listener) = &self.on_event {
            if let Err(err) = listener(event) {
                warn!(error = %err, "collector event callback failed, continuing");
            }
        }
    }

    fn index_of(&self, id: &str) -> Option<usize> {
        self.objects.iter().position(|o| o.id == id)
    }

    /// Inserts or replaces by id, then applies any pending relationships
    /// whose target is this object (it may have arrived after the edge was
    /// requested).
    pub fn create_or_update(&mut self, object: DataObject) {
        let id = object.id.clone();
        match self.index_of(&id) {
            Some(idx) => {
                self.objects[idx] = object;
                self.emit(CollectorEvent::ObjectUpdated(id.clone()));
            }
            None => {
                self.objects.push(object);
                self.emit(CollectorEvent::ObjectCreated(id.clone()));
            }
        }
        self.apply_pending_to(&id);
    }

    fn apply_pending_to(&mut self, target_id: &str) {
        let edges: Vec<_> = self
            .pending_relationships
            .iter()
            .filter(|r| r.target_object_id == target_id)
            .map(|r| r.measured_by.clone())
            .collect();
        if let Some(idx) = self.index_of(target_id) {
            for edge in edges {
                self.objects[idx].add_measured_by(edge);
            }
        }
    }

    /// Appends to the pending-edges list; edges whose target already exists
    /// are applied immediately (spec §4.2 "addRelationships").
    pub fn add_relationships(&mut self, edges: Vec<Relationship>) {
        for edge in edges {
            self.pending_relationships.push(edge.clone());
            if let Some(idx) = self.index_of(&edge.target_object_id) {
                self.objects[idx].add_measured_by(edge.measured_by);
            }
        }
    }

    /// Bulk KMS→{Gateway,App} wiring applied once the chain has finished
    /// (spec §4.4 step 5 / §6 relationship table).
    pub fn configure_verifier_relationships(&mut self, onchain_kms: bool) {
        self.add_relationships(kms_wiring(onchain_kms));
    }

    pub fn get_all_objects(&self) -> Vec<DataObject> {
        self.objects.clone()
    }

    pub fn clear(&mut self) {
        self.objects.clear();
        self.pending_relationships.clear();
    }
}

impl Default for DataObjectCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tv_types::MeasuredBy;

    fn object(id: &str) -> DataObject {
        DataObject::new(id, id, "desc").unwrap()
    }

    #[test]
    fn create_or_update_replaces_by_id() {
        let mut collector = DataObjectCollector::new();
        collector.create_or_update(object("kms-main").with_field("a", 1));
        collector.create_or_update(object("kms-main").with_field("a", 2));
        let objects = collector.get_all_objects();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].fields["a"], serde_json::json!(2));
    }

    #[test]
    fn relationship_applied_immediately_when_target_exists() {
        let mut collector = DataObjectCollector::new();
        collector.create_or_update(object("app-main"));
        let edge = MeasuredBy {
            source_object_id: "app-quote".into(),
            source_field: None,
            source_calc_output: None,
            self_field: None,
            self_calc_output: None,
        };
        collector.add_relationships(vec![Relationship::new("app-main", edge)]);
        assert_eq!(collector.get_all_objects()[0].measured_by.len(), 1);
    }

    #[test]
    fn relationship_applied_once_target_arrives_later() {
        let mut collector = DataObjectCollector::new();
        let edge = MeasuredBy {
            source_object_id: "app-quote".into(),
            source_field: None,
            source_calc_output: None,
            self_field: None,
            self_calc_output: None,
        };
        collector.add_relationships(vec![Relationship::new("app-main", edge)]);
        collector.create_or_update(object("app-main"));
        assert_eq!(collector.get_all_objects()[0].measured_by.len(), 1);
    }

    #[test]
    fn repeated_relationship_dedups_to_one_entry() {
        let mut collector = DataObjectCollector::new();
        collector.create_or_update(object("app-main"));
        let edge = MeasuredBy {
            source_object_id: "app-quote".into(),
            source_field: Some("mrtd".into()),
            source_calc_output: None,
            self_field: Some("mrtd".into()),
            self_calc_output: None,
        };
        for _ in 0..3 {
            collector.add_relationships(vec![Relationship::new("app-main", edge.clone())]);
        }
        assert_eq!(collector.get_all_objects()[0].measured_by.len(), 1);
    }

    #[test]
    fn clear_resets_objects_and_pending_relationships() {
        let mut collector = DataObjectCollector::new();
        collector.create_or_update(object("app-main"));
        collector.clear();
        assert!(collector.get_all_objects().is_empty());
    }

    #[test]
    fn event_callback_error_does_not_abort_creation() {
        let mut collector = DataObjectCollector::new()
            .with_event_listener(Box::new(|_event| Err("listener exploded".to_string())));
        collector.create_or_update(object("app-main"));
        assert_eq!(collector.get_all_objects().len(), 1);
    }
}
