//! Storage backend detection and data integrity reporting.
//!
//! Backends are probed in a fixed priority order: the durable SQLite file,
//! then an optional external store, then an in-process database. Probing
//! never fails; an unreachable backend is reported as unhealthy.

use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{SyncError, SyncResult};

use super::database::{RecordStore, StoreLocation};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Sqlite,
    Remote,
    Memory,
}

impl BackendKind {
    /// Probe and recommendation order, most durable first
    pub const PRIORITY: [BackendKind; 3] =
        [BackendKind::Sqlite, BackendKind::Remote, BackendKind::Memory];

    pub fn display_name(self) -> &'static str {
        match self {
            BackendKind::Sqlite => "SQLite file",
            BackendKind::Remote => "Remote service",
            BackendKind::Memory => "In-memory",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendDescriptor {
    pub name: String,
    pub kind: BackendKind,
    pub configured: bool,
    pub healthy: bool,
    /// The running record store is opened on this backend
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl BackendDescriptor {
    fn new(kind: BackendKind, configured: bool, active: bool, probe: Result<(), String>) -> Self {
        let (healthy, detail) = match probe {
            Ok(()) => (true, None),
            Err(reason) => (false, Some(reason)),
        };
        Self {
            name: kind.display_name().to_string(),
            kind,
            configured,
            healthy,
            active,
            detail,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrphanedItem {
    pub item_id: String,
    pub project_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    pub project_count: usize,
    pub item_count: usize,
    pub orphaned_items: Vec<OrphanedItem>,
    pub healthy: bool,
}

/// First healthy backend in the order given.
pub fn recommend(descriptors: &[BackendDescriptor]) -> SyncResult<BackendDescriptor> {
    descriptors
        .iter()
        .find(|d| d.healthy)
        .cloned()
        .ok_or(SyncError::NoBackendAvailable)
}

pub struct DatabaseDetector {
    store: Arc<RecordStore>,
    database_path: PathBuf,
    remote_url: Option<String>,
    connect_timeout: Duration,
}

impl DatabaseDetector {
    pub fn new(
        store: Arc<RecordStore>,
        database_path: PathBuf,
        remote_url: Option<String>,
    ) -> Self {
        Self {
            store,
            database_path,
            remote_url,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Probe every known backend, in priority order
    pub fn detect_all_databases(&self) -> Vec<BackendDescriptor> {
        let descriptors: Vec<BackendDescriptor> = BackendKind::PRIORITY
            .iter()
            .map(|&kind| self.probe(kind))
            .collect();

        for descriptor in descriptors.iter().filter(|d| d.configured && !d.healthy) {
            warn!(
                "Backend {} unavailable: {}",
                descriptor.name,
                descriptor.detail.as_deref().unwrap_or("unknown reason")
            );
        }

        descriptors
    }

    pub fn get_recommended_database(&self) -> SyncResult<BackendDescriptor> {
        recommend(&self.detect_all_databases())
    }

    /// Count records and list items whose project reference does not resolve
    pub fn check_data_integrity(&self) -> SyncResult<IntegrityReport> {
        let ((project_count, item_count), orphans) = self.store.integrity()?;
        let orphaned_items: Vec<OrphanedItem> = orphans
            .into_iter()
            .map(|(item_id, project_id)| OrphanedItem { item_id, project_id })
            .collect();

        Ok(IntegrityReport {
            project_count,
            item_count,
            healthy: orphaned_items.is_empty(),
            orphaned_items,
        })
    }

    fn probe(&self, kind: BackendKind) -> BackendDescriptor {
        let descriptor = match kind {
            BackendKind::Sqlite => {
                let active = matches!(
                    self.store.location(),
                    StoreLocation::File(path) if *path == self.database_path
                );
                let probe = if active {
                    self.store.ping().map_err(|e| e.to_string())
                } else {
                    probe_sqlite_file(&self.database_path)
                };
                BackendDescriptor::new(kind, true, active, probe)
            }
            BackendKind::Remote => match &self.remote_url {
                Some(url) => BackendDescriptor::new(
                    kind,
                    true,
                    false,
                    probe_remote(url, self.connect_timeout),
                ),
                None => {
                    BackendDescriptor::new(kind, false, false, Err("not configured".to_string()))
                }
            },
            BackendKind::Memory => {
                let active = matches!(self.store.location(), StoreLocation::Memory);
                let probe = if active {
                    self.store.ping().map_err(|e| e.to_string())
                } else {
                    probe_memory()
                };
                BackendDescriptor::new(kind, true, active, probe)
            }
        };

        debug!(
            backend = %descriptor.name,
            healthy = descriptor.healthy,
            active = descriptor.active,
            "Probed storage backend"
        );
        descriptor
    }
}

fn probe_sqlite_file(path: &Path) -> Result<(), String> {
    if !path.exists() {
        return Err(format!("database file {path:?} does not exist"));
    }
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map_err(|e| e.to_string())?;
    conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
        .map_err(|e| e.to_string())?;
    Ok(())
}

fn probe_memory() -> Result<(), String> {
    let conn = Connection::open_in_memory().map_err(|e| e.to_string())?;
    conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
        .map_err(|e| e.to_string())?;
    Ok(())
}

/// Reduce `scheme://host:port/path` to `host:port`
fn socket_target(url: &str) -> &str {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    without_scheme
        .split('/')
        .next()
        .unwrap_or(without_scheme)
}

/// Resolve `target` on a helper thread, giving up after `timeout`.
///
/// A resolver that never answers leaves the helper thread parked; the caller
/// still returns on time.
fn resolve_with_timeout(target: &str, timeout: Duration) -> Result<SocketAddr, String> {
    let (tx, rx) = mpsc::channel();
    let owned = target.to_string();
    thread::spawn(move || {
        let resolved = owned.to_socket_addrs().map(|mut addrs| addrs.next());
        let _ = tx.send(resolved);
    });

    match rx.recv_timeout(timeout) {
        Ok(Ok(Some(addr))) => Ok(addr),
        Ok(Ok(None)) => Err(format!("no address for {target}")),
        Ok(Err(e)) => Err(format!("cannot resolve {target}: {e}")),
        Err(_) => Err(format!("resolving {target} timed out after {timeout:?}")),
    }
}

fn probe_remote(url: &str, timeout: Duration) -> Result<(), String> {
    let target = socket_target(url);
    let addr = resolve_with_timeout(target, timeout)?;

    TcpStream::connect_timeout(&addr, timeout)
        .map(|_| ())
        .map_err(|e| format!("cannot reach {target}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::Project;
    use crate::todo::TodoItem;
    use pretty_assertions::assert_eq;
    use std::net::TcpListener;
    use tempfile::TempDir;

    fn descriptor(name: &str, healthy: bool) -> BackendDescriptor {
        BackendDescriptor {
            name: name.to_string(),
            kind: BackendKind::Sqlite,
            configured: true,
            healthy,
            active: false,
            detail: None,
        }
    }

    fn memory_detector(remote_url: Option<String>) -> (TempDir, DatabaseDetector) {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(RecordStore::open_in_memory().unwrap());
        let detector = DatabaseDetector::new(store, temp.path().join("absent.db"), remote_url)
            .with_connect_timeout(Duration::from_millis(200));
        (temp, detector)
    }

    #[test]
    fn test_recommend_skips_unhealthy() {
        let descriptors = vec![descriptor("A", false), descriptor("B", true)];
        assert_eq!(recommend(&descriptors).unwrap().name, "B");
    }

    #[test]
    fn test_recommend_fails_when_none_healthy() {
        let descriptors = vec![descriptor("A", false), descriptor("B", false)];
        assert!(matches!(
            recommend(&descriptors),
            Err(SyncError::NoBackendAvailable)
        ));
        assert!(matches!(recommend(&[]), Err(SyncError::NoBackendAvailable)));
    }

    #[test]
    fn test_detect_reports_priority_order() {
        let (_temp, detector) = memory_detector(None);
        let kinds: Vec<BackendKind> = detector
            .detect_all_databases()
            .iter()
            .map(|d| d.kind)
            .collect();
        assert_eq!(kinds, BackendKind::PRIORITY.to_vec());
    }

    #[test]
    fn test_in_memory_store_is_active_and_recommended_without_file() {
        let (_temp, detector) = memory_detector(None);
        let descriptors = detector.detect_all_databases();

        assert!(!descriptors[0].healthy);
        assert!(descriptors[0].detail.as_deref().unwrap().contains("does not exist"));
        assert!(!descriptors[1].configured);
        assert!(descriptors[2].healthy && descriptors[2].active);

        let recommended = detector.get_recommended_database().unwrap();
        assert_eq!(recommended.kind, BackendKind::Memory);
    }

    #[test]
    fn test_file_store_is_active_and_preferred() {
        let temp = TempDir::new().unwrap();
        let db_path = temp.path().join("todo-sync.db");
        let store = Arc::new(RecordStore::open(&db_path).unwrap());
        let detector = DatabaseDetector::new(store, db_path, None);

        let sqlite = &detector.detect_all_databases()[0];
        assert!(sqlite.healthy && sqlite.active);
        assert_eq!(
            detector.get_recommended_database().unwrap().kind,
            BackendKind::Sqlite
        );
    }

    #[test]
    fn test_existing_file_probed_when_not_active() {
        let temp = TempDir::new().unwrap();
        let db_path = temp.path().join("other.db");
        RecordStore::open(&db_path).unwrap();

        let store = Arc::new(RecordStore::open_in_memory().unwrap());
        let detector = DatabaseDetector::new(store, db_path, None);
        let sqlite = &detector.detect_all_databases()[0];
        assert!(sqlite.healthy);
        assert!(!sqlite.active);
    }

    #[test]
    fn test_reachable_remote_is_healthy() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (_temp, detector) = memory_detector(Some(format!("http://{addr}/v1")));

        let remote = &detector.detect_all_databases()[1];
        assert!(remote.configured);
        assert!(remote.healthy, "{:?}", remote.detail);
    }

    #[test]
    fn test_unreachable_remote_is_marked_not_raised() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (_temp, detector) = memory_detector(Some(addr.to_string()));
        let remote = &detector.detect_all_databases()[1];
        assert!(remote.configured);
        assert!(!remote.healthy);
        assert!(remote.detail.is_some());
    }

    #[test]
    fn test_socket_target() {
        assert_eq!(socket_target("http://db.local:8080/api"), "db.local:8080");
        assert_eq!(socket_target("db.local:5432"), "db.local:5432");
    }

    #[test]
    fn test_resolve_with_timeout() {
        let timeout = Duration::from_secs(2);
        let addr = resolve_with_timeout("127.0.0.1:5432", timeout).unwrap();
        assert_eq!(addr, "127.0.0.1:5432".parse::<SocketAddr>().unwrap());

        let err = resolve_with_timeout("no-port-given", timeout).unwrap_err();
        assert!(err.starts_with("cannot resolve no-port-given"), "{err}");
    }

    #[test]
    fn test_integrity_report() {
        let store = Arc::new(RecordStore::open_in_memory().unwrap());
        store.insert_project(&Project::new("p1", "Work")).unwrap();
        store.insert_item(&TodoItem::new("i1", "p1", "fine")).unwrap();

        let detector = DatabaseDetector::new(store.clone(), PathBuf::from("unused.db"), None);
        let report = detector.check_data_integrity().unwrap();
        assert_eq!(report.project_count, 1);
        assert_eq!(report.item_count, 1);
        assert!(report.healthy);

        store.insert_project(&Project::new("p2", "Old")).unwrap();
        store.insert_item(&TodoItem::new("i2", "p2", "orphan")).unwrap();
        store.remove_project_row("p2").unwrap();
        let report = detector.check_data_integrity().unwrap();
        assert!(!report.healthy);
        assert_eq!(
            report.orphaned_items,
            vec![OrphanedItem {
                item_id: "i2".to_string(),
                project_id: "p2".to_string(),
            }]
        );
    }
}
