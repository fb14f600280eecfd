#![forbid(unsafe_code)]

mod schema;

use crate::{LinkStore, ParentLocks, StoreError, validate_path};
use rusqlite::{Connection, params};
use std::path::{Path, PathBuf};
use std::time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use vil_core::wire::format_timestamp;
use vil_core::{Link, LinkStatus, ParentId};

const DB_FILE_NAME: &str = "vilink.db";

/// SQLite-backed store. Every call uses its own short-lived connection; writes to one parent are
/// serialized through [`ParentLocks`].
#[derive(Debug)]
pub struct SqliteLinkStore {
    storage_dir: PathBuf,
    db_path: PathBuf,
    locks: ParentLocks<()>,
}

impl SqliteLinkStore {
    pub fn open(storage_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&storage_dir)?;
        let db_path = storage_dir.join(DB_FILE_NAME);

        let conn = Connection::open(&db_path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
        conn.execute_batch(schema::SQL)?;
        conn.execute(
            "INSERT OR IGNORE INTO meta(key, value) VALUES (?1, ?2)",
            params!["schema_version", schema::SCHEMA_VERSION],
        )?;
        tracing::debug!(db = %db_path.display(), "link store ready");

        Ok(Self {
            storage_dir,
            db_path,
            locks: ParentLocks::new(),
        })
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.db_path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(conn)
    }
}

impl LinkStore for SqliteLinkStore {
    fn get(&self, parent_id: ParentId) -> Result<Vec<Link>, StoreError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT path, comment, created_by, modified_by, modified_on, link_status \
             FROM links WHERE parent_id=?1 ORDER BY seq ASC",
        )?;
        let mut rows = stmt.query(params![parent_id])?;
        let mut links = Vec::new();
        while let Some(row) = rows.next()? {
            let modified_on: String = row.get(4)?;
            let link_status: String = row.get(5)?;
            let modified_on = OffsetDateTime::parse(&modified_on, &Rfc3339).map_err(|_| {
                StoreError::CorruptRow {
                    parent_id,
                    message: format!("modified_on={modified_on}"),
                }
            })?;
            links.push(Link {
                parent_id,
                path: row.get(0)?,
                comment: row.get(1)?,
                created_by: row.get(2)?,
                modified_by: row.get(3)?,
                modified_on,
                status: LinkStatus::parse(&link_status).unwrap_or_default(),
            });
        }
        Ok(links)
    }

    fn upsert(&self, parent_id: ParentId, link: Link) -> Result<(), StoreError> {
        validate_path(&link.path)?;
        let lock = self.locks.entry(parent_id);
        let _guard = lock.lock().map_err(|_| StoreError::Poisoned(parent_id))?;

        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM links WHERE parent_id=?1 AND path=?2",
            params![parent_id, link.path],
        )?;
        let seq: i64 = tx.query_row(
            "SELECT COALESCE(MAX(seq), 0) + 1 FROM links WHERE parent_id=?1",
            params![parent_id],
            |row| row.get(0),
        )?;
        tx.execute(
            "INSERT INTO links(parent_id, path, seq, comment, created_by, modified_by, modified_on, link_status) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                parent_id,
                link.path,
                seq,
                link.comment,
                link.created_by,
                link.modified_by,
                format_timestamp(link.modified_on),
                link.status.as_str(),
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn remove(&self, parent_id: ParentId, path: &str) -> Result<(), StoreError> {
        let lock = self.locks.entry(parent_id);
        let _guard = lock.lock().map_err(|_| StoreError::Poisoned(parent_id))?;

        let conn = self.connect()?;
        conn.execute(
            "DELETE FROM links WHERE parent_id=?1 AND path=?2",
            params![parent_id, path],
        )?;
        Ok(())
    }
}
