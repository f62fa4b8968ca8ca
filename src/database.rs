//! Persistence of the form collection
//!
//! The whole store is persisted as a single JSON snapshot `{ forms, responses }`.
//! Where that snapshot lives is hidden behind the [`SnapshotStorage`] port: the
//! service uses an embedded redb database, tests can use [`MemoryStorage`].

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::sync::{Arc, Mutex};

use crate::error::AppError;

/// Table holding persisted snapshots
///
/// Key: Snapshot name as string
/// Value: JSON-serialized snapshot as string
///
/// Example:
/// - Key: "formgen"
/// - Value: '{"forms":[...],"responses":[...]}'
pub const TABLE_SNAPSHOTS: TableDefinition<&str, &str> = TableDefinition::new("snapshots_v1");

/// Name of the single snapshot record
pub const SNAPSHOT_KEY: &str = "formgen";

/// Storage port for the serialized store snapshot
///
/// Implementations only move an opaque blob; (de)serialization is done by
/// the store.
pub trait SnapshotStorage: Send + Sync {
    /// Returns the last written snapshot, or `None` if nothing was written yet
    fn read(&self) -> Result<Option<String>, AppError>;

    /// Replaces the stored snapshot
    fn write(&self, snapshot: &str) -> Result<(), AppError>;
}

/// Initializes the embedded database and creates the snapshot table
///
/// # Arguments
///
/// * `db_path` - File path where the database should be stored (e.g., "data.db")
///
/// # Example
///
/// ```no_run
/// # use formgen::database::init_db;
/// let db = init_db("data.db").expect("Failed to initialize database");
/// ```
pub fn init_db(db_path: &str) -> Result<Database, redb::Error> {
    let db = Database::create(db_path)?;

    // Make sure the table exists so the first read does not fail
    let write_txn = db.begin_write()?;
    {
        write_txn.open_table(TABLE_SNAPSHOTS)?;
    }
    write_txn.commit()?;

    Ok(db)
}

/// Snapshot storage backed by the embedded redb database
#[derive(Clone)]
pub struct RedbStorage {
    db: Arc<Database>,
}

impl RedbStorage {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    fn read_blob(&self) -> Result<Option<String>, redb::Error> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TABLE_SNAPSHOTS)?;
        let blob = table.get(SNAPSHOT_KEY)?.map(|guard| guard.value().to_string());
        Ok(blob)
    }

    fn write_blob(&self, snapshot: &str) -> Result<(), redb::Error> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(TABLE_SNAPSHOTS)?;
            table.insert(SNAPSHOT_KEY, snapshot)?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

impl SnapshotStorage for RedbStorage {
    fn read(&self) -> Result<Option<String>, AppError> {
        Ok(self.read_blob()?)
    }

    fn write(&self, snapshot: &str) -> Result<(), AppError> {
        self.write_blob(snapshot)?;
        tracing::debug!(bytes = snapshot.len(), "snapshot persisted");
        Ok(())
    }
}

/// Snapshot storage that keeps the blob in memory
#[derive(Default)]
pub struct MemoryStorage {
    blob: Mutex<Option<String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last written snapshot, if any
    pub fn contents(&self) -> Option<String> {
        self.blob
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl SnapshotStorage for MemoryStorage {
    fn read(&self) -> Result<Option<String>, AppError> {
        Ok(self.contents())
    }

    fn write(&self, snapshot: &str) -> Result<(), AppError> {
        *self
            .blob
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(snapshot.to_string());
        Ok(())
    }
}
