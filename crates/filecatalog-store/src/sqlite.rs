//! SQLite-backed persistent catalog.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::debug;

use filecatalog_core::{
    CatalogStore, ContentHash, DirectoryMarker, FileRecord, RecordFields, StoreError,
};

const SCHEMA_VERSION: i64 = 1;

const RECORD_COLUMNS: &str =
    "path, content_hash, size, mtime_secs, mtime_nsecs, duplicate_names";

/// Catalog persisted in a SQLite database.
pub struct SqliteCatalog {
    conn: Connection,
}

impl SqliteCatalog {
    /// Open or create the catalog database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path).map_err(StoreError::backend)?;
        let catalog = Self { conn };
        catalog.configure()?;
        catalog.migrate_schema()?;
        debug!("Opened catalog at {}", path.display());
        Ok(catalog)
    }

    /// Open a catalog that lives only as long as this handle.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(StoreError::backend)?;
        let catalog = Self { conn };
        catalog.migrate_schema()?;
        Ok(catalog)
    }

    fn configure(&self) -> Result<(), StoreError> {
        self.conn
            .pragma_update(None, "journal_mode", "WAL")
            .map_err(StoreError::backend)?;
        self.conn
            .busy_timeout(Duration::from_secs(30))
            .map_err(StoreError::backend)?;
        Ok(())
    }

    /// Create tables when the stored schema version is behind.
    fn migrate_schema(&self) -> Result<(), StoreError> {
        let version: i64 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .map_err(StoreError::backend)?;

        if version < SCHEMA_VERSION {
            debug!("Catalog schema version {} < {}, migrating", version, SCHEMA_VERSION);
            self.conn
                .execute_batch(
                    "CREATE TABLE IF NOT EXISTS file_records (
                        path TEXT PRIMARY KEY,
                        content_hash TEXT NOT NULL,
                        size INTEGER NOT NULL,
                        mtime_secs INTEGER NOT NULL,
                        mtime_nsecs INTEGER NOT NULL,
                        duplicate_names TEXT NOT NULL DEFAULT '[]'
                    );
                    CREATE INDEX IF NOT EXISTS idx_file_records_hash
                        ON file_records(content_hash);
                    CREATE TABLE IF NOT EXISTS directory_markers (
                        path TEXT PRIMARY KEY,
                        scanned_secs INTEGER NOT NULL,
                        scanned_nsecs INTEGER NOT NULL
                    );
                    PRAGMA user_version = 1;",
                )
                .map_err(StoreError::backend)?;
        }
        Ok(())
    }

    fn query_record(
        &self,
        sql: &str,
        param: &str,
    ) -> Result<Option<FileRecord>, StoreError> {
        let raw = self
            .conn
            .query_row(sql, [param], RawRecord::from_row)
            .optional()
            .map_err(StoreError::backend)?;
        raw.map(RawRecord::into_record).transpose()
    }

    fn path_for_hash(&self, hash: &ContentHash) -> Result<Option<String>, StoreError> {
        self.conn
            .query_row(
                "SELECT path FROM file_records WHERE content_hash = ?1 ORDER BY path LIMIT 1",
                [hash.to_hex()],
                |row| row.get(0),
            )
            .optional()
            .map_err(StoreError::backend)
    }
}

impl CatalogStore for SqliteCatalog {
    fn find_by_path(&self, path: &str) -> Result<Option<FileRecord>, StoreError> {
        self.query_record(
            &format!("SELECT {RECORD_COLUMNS} FROM file_records WHERE path = ?1"),
            path,
        )
    }

    fn upsert_by_path(&mut self, path: &str, fields: RecordFields) -> Result<(), StoreError> {
        let (secs, nsecs) = split_timestamp(fields.last_modified);
        self.conn
            .execute(
                "INSERT INTO file_records (path, content_hash, size, mtime_secs, mtime_nsecs)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(path) DO UPDATE SET
                    content_hash = ?2,
                    size = ?3,
                    mtime_secs = ?4,
                    mtime_nsecs = ?5",
                params![path, fields.content_hash.to_hex(), to_sql_size(fields.size), secs, nsecs],
            )
            .map_err(StoreError::backend)?;
        Ok(())
    }

    fn find_by_hash(&self, hash: &ContentHash) -> Result<Option<FileRecord>, StoreError> {
        self.query_record(
            &format!(
                "SELECT {RECORD_COLUMNS} FROM file_records
                 WHERE content_hash = ?1 ORDER BY path LIMIT 1"
            ),
            &hash.to_hex(),
        )
    }

    fn find_directory_marker(&self, path: &str) -> Result<Option<DirectoryMarker>, StoreError> {
        let row: Option<(i64, i64)> = self
            .conn
            .query_row(
                "SELECT scanned_secs, scanned_nsecs FROM directory_markers WHERE path = ?1",
                [path],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(StoreError::backend)?;

        row.map(|(secs, nsecs)| {
            join_timestamp(path, secs, nsecs).map(|at| DirectoryMarker::new(path, at))
        })
        .transpose()
    }

    fn upsert_directory_marker(
        &mut self,
        path: &str,
        scanned_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let (secs, nsecs) = split_timestamp(scanned_at);
        self.conn
            .execute(
                "INSERT INTO directory_markers (path, scanned_secs, scanned_nsecs)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(path) DO UPDATE SET scanned_secs = ?2, scanned_nsecs = ?3",
                params![path, secs, nsecs],
            )
            .map_err(StoreError::backend)?;
        Ok(())
    }

    fn insert(&mut self, record: FileRecord) -> Result<(), StoreError> {
        let (secs, nsecs) = split_timestamp(record.last_modified);
        let names = encode_names(&record.path, &record.duplicate_names)?;
        let inserted = self
            .conn
            .execute(
                "INSERT INTO file_records
                    (path, content_hash, size, mtime_secs, mtime_nsecs, duplicate_names)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(path) DO NOTHING",
                params![
                    record.path,
                    record.content_hash.to_hex(),
                    to_sql_size(record.size),
                    secs,
                    nsecs,
                    names
                ],
            )
            .map_err(StoreError::backend)?;
        if inserted == 0 {
            return Err(StoreError::conflict(record.path));
        }
        Ok(())
    }

    fn add_duplicate_name(&mut self, hash: &ContentHash, name: &str) -> Result<bool, StoreError> {
        let tx = self.conn.transaction().map_err(StoreError::backend)?;

        let row: Option<(String, String)> = tx
            .query_row(
                "SELECT path, duplicate_names FROM file_records
                 WHERE content_hash = ?1 ORDER BY path LIMIT 1",
                [hash.to_hex()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(StoreError::backend)?;

        let Some((path, encoded)) = row else {
            return Ok(false);
        };

        let mut names = decode_names(&path, &encoded)?;
        if names.insert(name.to_string()) {
            tx.execute(
                "UPDATE file_records SET duplicate_names = ?1 WHERE path = ?2",
                params![encode_names(&path, &names)?, path],
            )
            .map_err(StoreError::backend)?;
        }

        tx.commit().map_err(StoreError::backend)?;
        Ok(true)
    }

    fn records(&self) -> Result<Vec<FileRecord>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {RECORD_COLUMNS} FROM file_records ORDER BY path"))
            .map_err(StoreError::backend)?;

        let rows = stmt
            .query_map([], RawRecord::from_row)
            .map_err(StoreError::backend)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row.map_err(StoreError::backend)?.into_record()?);
        }
        Ok(records)
    }

    fn remove_by_hash(&mut self, hash: &ContentHash) -> Result<bool, StoreError> {
        let Some(path) = self.path_for_hash(hash)? else {
            return Ok(false);
        };
        let removed = self
            .conn
            .execute("DELETE FROM file_records WHERE path = ?1", [path])
            .map_err(StoreError::backend)?;
        Ok(removed > 0)
    }

    fn rename_by_hash(&mut self, hash: &ContentHash, new_path: &str) -> Result<bool, StoreError> {
        let Some(path) = self.path_for_hash(hash)? else {
            return Ok(false);
        };
        if path != new_path && self.find_by_path(new_path)?.is_some() {
            return Err(StoreError::conflict(new_path));
        }
        let updated = self
            .conn
            .execute(
                "UPDATE file_records SET path = ?1 WHERE path = ?2",
                params![new_path, path],
            )
            .map_err(StoreError::backend)?;
        Ok(updated > 0)
    }
}

/// Row as stored, before hash and name decoding.
struct RawRecord {
    path: String,
    content_hash: String,
    size: i64,
    mtime_secs: i64,
    mtime_nsecs: i64,
    duplicate_names: String,
}

impl RawRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            path: row.get(0)?,
            content_hash: row.get(1)?,
            size: row.get(2)?,
            mtime_secs: row.get(3)?,
            mtime_nsecs: row.get(4)?,
            duplicate_names: row.get(5)?,
        })
    }

    fn into_record(self) -> Result<FileRecord, StoreError> {
        let content_hash = ContentHash::from_hex(&self.content_hash)
            .map_err(|e| StoreError::corrupt(&self.path, e.to_string()))?;
        let last_modified = join_timestamp(&self.path, self.mtime_secs, self.mtime_nsecs)?;
        let duplicate_names = decode_names(&self.path, &self.duplicate_names)?;

        Ok(FileRecord {
            path: self.path,
            content_hash,
            size: self.size.max(0) as u64,
            last_modified,
            duplicate_names,
        })
    }
}

fn split_timestamp(at: DateTime<Utc>) -> (i64, i64) {
    (at.timestamp(), i64::from(at.timestamp_subsec_nanos()))
}

fn join_timestamp(key: &str, secs: i64, nsecs: i64) -> Result<DateTime<Utc>, StoreError> {
    u32::try_from(nsecs)
        .ok()
        .and_then(|nsecs| DateTime::from_timestamp(secs, nsecs))
        .ok_or_else(|| StoreError::corrupt(key, format!("invalid timestamp {secs}.{nsecs}")))
}

// SQLite INTEGER is signed 64-bit.
fn to_sql_size(size: u64) -> i64 {
    i64::try_from(size).unwrap_or(i64::MAX)
}

fn encode_names(key: &str, names: &IndexSet<String>) -> Result<String, StoreError> {
    serde_json::to_string(names).map_err(|e| StoreError::corrupt(key, e.to_string()))
}

fn decode_names(key: &str, encoded: &str) -> Result<IndexSet<String>, StoreError> {
    serde_json::from_str(encoded).map_err(|e| StoreError::corrupt(key, e.to_string()))
}
