use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::bundle::ExportBundle;
use crate::error::{SyncError, SyncResult};
use crate::project::Project;
use crate::todo::TodoItem;

const PROJECT_COLUMNS: &str = "id, name, created_at";

const ITEM_COLUMNS: &str = "id, project_id, title, description, done, created_at, updated_at";

const ORPHANED_ITEMS_SQL: &str = "SELECT i.id, i.project_id FROM items i
     WHERE NOT EXISTS (SELECT 1 FROM projects p WHERE p.id = i.project_id)
     ORDER BY i.rowid ASC";

const UPSERT_PROJECT_SQL: &str = "INSERT INTO projects (id, name, created_at) VALUES (?1, ?2, ?3)
     ON CONFLICT(id) DO UPDATE SET
        name = excluded.name,
        created_at = COALESCE(excluded.created_at, projects.created_at)";

const UPSERT_ITEM_SQL: &str = "INSERT INTO items
        (id, project_id, title, description, done, created_at, updated_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
     ON CONFLICT(id) DO UPDATE SET
        project_id = excluded.project_id,
        title = excluded.title,
        description = excluded.description,
        done = excluded.done,
        created_at = COALESCE(excluded.created_at, items.created_at),
        updated_at = COALESCE(excluded.updated_at, items.updated_at)";

/// Parse an RFC3339 timestamp string into a DateTime<Utc>
fn parse_rfc3339(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Where the store keeps its rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    File(PathBuf),
    Memory,
}

impl fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreLocation::File(path) => write!(f, "{}", path.display()),
            StoreLocation::Memory => write!(f, ":memory:"),
        }
    }
}

/// Raw data extracted from an items row before conversion to TodoItem
struct ItemRowData {
    id: String,
    project_id: String,
    title: String,
    description: Option<String>,
    done: i64,
    created_at_str: Option<String>,
    updated_at_str: Option<String>,
}

impl ItemRowData {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            project_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            done: row.get(4)?,
            created_at_str: row.get(5)?,
            updated_at_str: row.get(6)?,
        })
    }

    fn into_todo_item(self) -> TodoItem {
        TodoItem {
            id: self.id,
            project_id: self.project_id,
            title: self.title,
            description: self.description,
            done: self.done != 0,
            created_at: self.created_at_str.as_deref().and_then(parse_rfc3339),
            updated_at: self.updated_at_str.as_deref().and_then(parse_rfc3339),
        }
    }
}

/// SQLite-backed store for the `projects` and `items` collections.
///
/// The connection sits behind a mutex; multi-record writes run in one
/// transaction while the lock is held, so concurrent imports never
/// interleave and a failed import leaves no rows behind.
pub struct RecordStore {
    conn: Mutex<Connection>,
    location: StoreLocation,
}

impl RecordStore {
    /// Open (or create) a store backed by the database file at `path`
    pub fn open(path: impl AsRef<Path>) -> SyncResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        debug!("Opened record store at {:?}", path);
        Self::with_connection(conn, StoreLocation::File(path.to_path_buf()))
    }

    pub fn open_in_memory() -> SyncResult<Self> {
        let conn = Connection::open_in_memory()?;
        debug!("Opened in-memory record store");
        Self::with_connection(conn, StoreLocation::Memory)
    }

    fn with_connection(conn: Connection, location: StoreLocation) -> SyncResult<Self> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            location,
        })
    }

    pub fn location(&self) -> &StoreLocation {
        &self.location
    }

    fn lock(&self) -> SyncResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| SyncError::LockPoisoned)
    }

    /// Cheap liveness query against the open connection
    pub fn ping(&self) -> SyncResult<()> {
        let conn = self.lock()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    /// All projects in insertion order
    pub fn load_projects(&self) -> SyncResult<Vec<Project>> {
        let conn = self.lock()?;
        load_projects(&conn)
    }

    /// All items in insertion order
    pub fn load_items(&self) -> SyncResult<Vec<TodoItem>> {
        let conn = self.lock()?;
        load_items(&conn)
    }

    /// Read both collections under a single lock so the snapshot is consistent
    pub fn snapshot(&self) -> SyncResult<ExportBundle> {
        let conn = self.lock()?;
        Ok(ExportBundle::new(load_projects(&conn)?, load_items(&conn)?))
    }

    /// Returns (project count, item count)
    pub fn counts(&self) -> SyncResult<(usize, usize)> {
        let conn = self.lock()?;
        counts(&conn)
    }

    /// Insert a single project, replacing any existing row with the same id
    pub fn insert_project(&self, project: &Project) -> SyncResult<()> {
        let conn = self.lock()?;
        upsert_project(&conn, project)?;
        Ok(())
    }

    /// Insert a single item, replacing any existing row with the same id.
    ///
    /// The referenced project must already be stored.
    pub fn insert_item(&self, item: &TodoItem) -> SyncResult<()> {
        let conn = self.lock()?;
        ensure_project(&conn, item)?;
        upsert_item(&conn, item)?;
        Ok(())
    }

    /// Upsert a whole bundle by identifier in one transaction and return the
    /// rows as stored for the bundle's ids, in bundle order.
    ///
    /// Every item must reference a project that is either part of the bundle
    /// or already stored. On any error nothing is written.
    pub fn upsert_bundle(&self, bundle: &ExportBundle) -> SyncResult<ExportBundle> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        for project in &bundle.projects {
            upsert_project(&tx, project)?;
        }

        for item in &bundle.items {
            ensure_project(&tx, item)?;
            upsert_item(&tx, item)?;
        }

        // Omitted timestamps keep their stored values, so read the rows back
        let projects = bundle
            .projects
            .iter()
            .map(|p| load_project(&tx, &p.id))
            .collect::<SyncResult<Vec<_>>>()?;
        let items = bundle
            .items
            .iter()
            .map(|i| load_item(&tx, &i.id))
            .collect::<SyncResult<Vec<_>>>()?;

        tx.commit()?;
        Ok(ExportBundle::new(projects, items))
    }

    /// Items whose project reference does not resolve, as (item id, project id)
    pub fn orphaned_items(&self) -> SyncResult<Vec<(String, String)>> {
        let conn = self.lock()?;
        orphaned_items(&conn)
    }

    /// Counts and orphaned items read under a single lock
    pub fn integrity(&self) -> SyncResult<((usize, usize), Vec<(String, String)>)> {
        let conn = self.lock()?;
        Ok((counts(&conn)?, orphaned_items(&conn)?))
    }
}

#[cfg(test)]
impl RecordStore {
    /// Drop a project row without touching its items, leaving them orphaned
    pub(crate) fn remove_project_row(&self, project_id: &str) -> SyncResult<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM projects WHERE id = ?1", [project_id])?;
        Ok(())
    }
}

fn init_schema(conn: &Connection) -> SyncResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS projects (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            created_at TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS items (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT,
            done INTEGER NOT NULL DEFAULT 0,
            created_at TEXT,
            updated_at TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_items_project_id ON items(project_id)",
        [],
    )?;

    Ok(())
}

fn project_from_row(row: &rusqlite::Row) -> rusqlite::Result<Project> {
    let created_at_str: Option<String> = row.get(2)?;
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: created_at_str.as_deref().and_then(parse_rfc3339),
    })
}

fn load_projects(conn: &Connection) -> SyncResult<Vec<Project>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PROJECT_COLUMNS} FROM projects ORDER BY rowid ASC"
    ))?;

    let projects = stmt.query_map([], project_from_row)?;

    let mut result = Vec::new();
    for project in projects {
        result.push(project?);
    }

    Ok(result)
}

fn load_items(conn: &Connection) -> SyncResult<Vec<TodoItem>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ITEM_COLUMNS} FROM items ORDER BY rowid ASC"
    ))?;

    let items = stmt.query_map([], ItemRowData::from_row)?;

    let mut result = Vec::new();
    for item in items {
        result.push(item?.into_todo_item());
    }

    Ok(result)
}

fn load_project(conn: &Connection, id: &str) -> SyncResult<Project> {
    let project = conn.query_row(
        &format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?1"),
        [id],
        project_from_row,
    )?;
    Ok(project)
}

fn load_item(conn: &Connection, id: &str) -> SyncResult<TodoItem> {
    let row = conn.query_row(
        &format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?1"),
        [id],
        ItemRowData::from_row,
    )?;
    Ok(row.into_todo_item())
}

fn counts(conn: &Connection) -> SyncResult<(usize, usize)> {
    let projects: i64 = conn.query_row("SELECT COUNT(*) FROM projects", [], |row| row.get(0))?;
    let items: i64 = conn.query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
    Ok((projects as usize, items as usize))
}

fn orphaned_items(conn: &Connection) -> SyncResult<Vec<(String, String)>> {
    let mut stmt = conn.prepare(ORPHANED_ITEMS_SQL)?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;

    let mut result = Vec::new();
    for row in rows {
        result.push(row?);
    }
    Ok(result)
}

fn project_exists(conn: &Connection, project_id: &str) -> SyncResult<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM projects WHERE id = ?1",
            [project_id],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn ensure_project(conn: &Connection, item: &TodoItem) -> SyncResult<()> {
    if project_exists(conn, &item.project_id)? {
        Ok(())
    } else {
        Err(SyncError::Integrity {
            item_id: item.id.clone(),
            project_id: item.project_id.clone(),
        })
    }
}

fn upsert_project(conn: &Connection, project: &Project) -> rusqlite::Result<usize> {
    conn.execute(
        UPSERT_PROJECT_SQL,
        params![
            project.id,
            project.name,
            project.created_at.map(|dt| dt.to_rfc3339()),
        ],
    )
}

fn upsert_item(conn: &Connection, item: &TodoItem) -> rusqlite::Result<usize> {
    let done: i64 = if item.done { 1 } else { 0 };
    conn.execute(
        UPSERT_ITEM_SQL,
        params![
            item.id,
            item.project_id,
            item.title,
            item.description,
            done,
            item.created_at.map(|dt| dt.to_rfc3339()),
            item.updated_at.map(|dt| dt.to_rfc3339()),
        ],
    )
}
