use std::sync::Arc;
use tracing::{info, warn};

use crate::bundle::ExportBundle;
use crate::error::SyncResult;

use super::database::RecordStore;

/// Outcome of an import or migration: the written records as now stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub bundle: ExportBundle,
}

impl SyncOutcome {
    pub fn project_count(&self) -> usize {
        self.bundle.projects.len()
    }

    pub fn item_count(&self) -> usize {
        self.bundle.items.len()
    }
}

/// Export, import and migration over a shared [`RecordStore`].
///
/// Import and migration upsert by identifier, so applying the same bundle
/// twice leaves the store exactly as applying it once.
#[derive(Clone)]
pub struct DataManager {
    store: Arc<RecordStore>,
}

impl DataManager {
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    /// Full contents of both collections. An empty store yields an empty bundle.
    pub fn export_data(&self) -> SyncResult<ExportBundle> {
        self.store.snapshot()
    }

    /// Merge a bundle into the store and return the stored rows for its ids.
    pub fn import_data(&self, bundle: ExportBundle) -> SyncResult<SyncOutcome> {
        let outcome = self.apply(bundle, "import")?;
        info!(
            projects = outcome.project_count(),
            items = outcome.item_count(),
            "Imported bundle"
        );
        Ok(outcome)
    }

    /// One-way copy of browser local storage into the durable store.
    ///
    /// Same contract as [`DataManager::import_data`]; repeated calls with the
    /// same bundle never duplicate records.
    pub fn migrate_from_local_storage(&self, bundle: ExportBundle) -> SyncResult<SyncOutcome> {
        let outcome = self.apply(bundle, "migration")?;
        info!(
            projects = outcome.project_count(),
            items = outcome.item_count(),
            "Migrated local storage data"
        );
        Ok(outcome)
    }

    fn apply(&self, bundle: ExportBundle, operation: &str) -> SyncResult<SyncOutcome> {
        let bundle = bundle.normalized().inspect_err(|e| {
            warn!("Rejected {} payload: {}", operation, e);
        })?;

        let stored = self.store.upsert_bundle(&bundle).inspect_err(|e| {
            warn!("{} failed, nothing written: {}", operation, e);
        })?;

        Ok(SyncOutcome { bundle: stored })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::project::Project;
    use crate::todo::TodoItem;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn manager() -> DataManager {
        DataManager::new(Arc::new(RecordStore::open_in_memory().unwrap()))
    }

    fn sample_bundle() -> ExportBundle {
        ExportBundle::from_value(&json!({
            "projects": [{"id": "p1", "name": "Work"}],
            "items": [{"id": "i1", "projectId": "p1", "title": "Buy milk", "done": false}]
        }))
        .unwrap()
    }

    #[test]
    fn test_export_empty_store() {
        let bundle = manager().export_data().unwrap();
        assert_eq!(bundle, ExportBundle::default());
    }

    #[test]
    fn test_import_into_empty_store() {
        let manager = manager();
        let outcome = manager.import_data(sample_bundle()).unwrap();

        assert_eq!(outcome.project_count(), 1);
        assert_eq!(outcome.item_count(), 1);
        assert_eq!(manager.export_data().unwrap(), sample_bundle());
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let manager = manager();
        manager.migrate_from_local_storage(sample_bundle()).unwrap();
        let once = manager.export_data().unwrap();

        manager.migrate_from_local_storage(sample_bundle()).unwrap();
        assert_eq!(manager.export_data().unwrap(), once);
        assert_eq!(manager.store().counts().unwrap(), (1, 1));
    }

    #[test]
    fn test_export_then_reimport_changes_nothing() {
        let manager = manager();
        manager.import_data(sample_bundle()).unwrap();

        let mut extra = TodoItem::new("i2", "p1", "Call Bob");
        extra.description = Some("about the offsite".to_string());
        extra.done = true;
        manager
            .import_data(ExportBundle::new(vec![Project::new("p2", "Home")], vec![extra]))
            .unwrap();

        let before = manager.export_data().unwrap();
        manager.import_data(before.clone()).unwrap();
        assert_eq!(manager.export_data().unwrap(), before);
    }

    #[test]
    fn test_import_reports_normalized_records() {
        let manager = manager();
        let bundle = ExportBundle::from_value(&json!({
            "projects": [{"id": " p1 ", "name": " Work "}],
            "items": [{"id": "i1 ", "projectId": " p1", "title": "Buy milk  "}]
        }))
        .unwrap();

        let outcome = manager.import_data(bundle).unwrap();
        assert_eq!(outcome.bundle, sample_bundle());
    }

    #[test]
    fn test_reimport_without_created_at_reports_stored_timestamp() {
        let manager = manager();
        let dated = json!({"id": "p1", "name": "Work", "createdAt": "2025-01-01T00:00:00Z"});
        let first = ExportBundle::from_value(&json!({"projects": [dated], "items": []})).unwrap();
        manager.import_data(first).unwrap();

        let undated = json!({"id": "p1", "name": "Work"});
        let second =
            ExportBundle::from_value(&json!({"projects": [undated], "items": []})).unwrap();
        let outcome = manager.import_data(second).unwrap();

        assert!(outcome.bundle.projects[0].created_at.is_some());
        assert_eq!(outcome.bundle, manager.export_data().unwrap());
    }

    #[test]
    fn test_import_with_dangling_reference_writes_nothing() {
        let manager = manager();
        let bundle = ExportBundle::from_value(&json!({
            "projects": [{"id": "p1", "name": "Work"}],
            "items": [{"id": "i1", "projectId": "p9", "title": "Lost"}]
        }))
        .unwrap();

        let err = manager.import_data(bundle).unwrap_err();
        assert!(matches!(err, SyncError::Integrity { .. }));
        assert_eq!(manager.export_data().unwrap(), ExportBundle::default());
    }

    #[test]
    fn test_import_with_blank_id_is_validation_error() {
        let manager = manager();
        manager.import_data(sample_bundle()).unwrap();

        let bundle = ExportBundle::new(vec![Project::new("  ", "Nameless")], vec![]);
        let err = manager.import_data(bundle).unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
        assert_eq!(manager.export_data().unwrap(), sample_bundle());
    }
}
