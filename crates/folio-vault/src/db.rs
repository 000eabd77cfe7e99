//! In-memory `SQLite` engine adapter and migration runner.
//!
//! A portfolio database lives decrypted in memory for the whole session.
//! It enters the engine as serialized file bytes (`sqlite3_deserialize`)
//! and leaves it the same way (`sqlite3_serialize`), so the session layer
//! only ever deals in byte buffers. No page of the database is written to
//! disk, temp files included.

use std::fmt;
use std::ptr::{self, NonNull};

use rusqlite::serialize::OwnedData;
use rusqlite::{ffi, Connection, DatabaseName};
use tracing::debug;

use crate::error::VaultError;

// ---------------------------------------------------------------------------
// Embedded migrations
// ---------------------------------------------------------------------------

/// Forward-only SQL migrations, embedded at compile time.
/// Index 0 → version 1, index 1 → version 2, etc.
const MIGRATIONS: &[&str] = &[include_str!("../migrations/001_baseline_schema.sql")];

/// First 16 bytes of every `SQLite` 3 database file.
pub const SQLITE_HEADER: &[u8; 16] = b"SQLite format 3\0";

// ---------------------------------------------------------------------------
// PortfolioDb
// ---------------------------------------------------------------------------

/// Handle to an open, migrated in-memory portfolio database.
pub struct PortfolioDb {
    conn: Connection,
}

impl fmt::Debug for PortfolioDb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PortfolioDb(***)")
    }
}

impl PortfolioDb {
    /// Create a fresh, empty database with the baseline schema applied.
    ///
    /// # Errors
    ///
    /// - [`VaultError::EngineInitFailed`] if `SQLite` cannot be initialized.
    /// - [`VaultError::MigrationFailed`] if a migration fails.
    pub fn open_empty() -> Result<Self, VaultError> {
        let conn = open_memory()?;
        let mut db = Self { conn };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open a database from serialized file bytes and bring its schema up to date.
    ///
    /// An empty buffer opens as an empty database.
    ///
    /// # Errors
    ///
    /// - [`VaultError::EngineInitFailed`] if the bytes are not a `SQLite` database.
    /// - [`VaultError::MigrationFailed`] if a migration fails.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, VaultError> {
        if !bytes.is_empty() && !bytes.starts_with(SQLITE_HEADER) {
            return Err(VaultError::EngineInitFailed(
                "file is not a SQLite database".into(),
            ));
        }

        let mut conn = open_memory()?;
        if !bytes.is_empty() {
            let data = sqlite_owned_copy(bytes)?;
            conn.deserialize(DatabaseName::Main, data, false)
                .map_err(|e| VaultError::EngineInitFailed(format!("deserialize failed: {e}")))?;
        }

        // A corrupt page surfaces on first read, not on deserialize.
        conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| {
            row.get::<_, i64>(0)
        })
        .map_err(|e| VaultError::EngineInitFailed(e.to_string()))?;

        let mut db = Self { conn };
        db.run_migrations()?;
        debug!(size_bytes = bytes.len(), "database opened from bytes");
        Ok(db)
    }

    /// Serialize the whole database back into `SQLite` file bytes.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Database`] if `SQLite` cannot serialize the
    /// database (out of memory).
    pub fn to_bytes(&self) -> Result<Vec<u8>, VaultError> {
        let bytes = self.conn.serialize(DatabaseName::Main)?.to_vec();
        debug!(size_bytes = bytes.len(), "database serialized");
        Ok(bytes)
    }

    /// Returns a reference to the underlying [`rusqlite::Connection`].
    ///
    /// For downstream query code and tests. The handle must not outlive
    /// the session that owns this database.
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Returns the current schema version (`PRAGMA user_version`).
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Database`] if the pragma query fails.
    pub fn schema_version(&self) -> Result<i32, VaultError> {
        let v: i32 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;
        Ok(v)
    }

    /// Names of all user tables, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Database`] if `sqlite_master` cannot be read.
    pub fn table_names(&self) -> Result<Vec<String>, VaultError> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// Number of migrations embedded in this build.
    #[must_use]
    pub const fn latest_schema_version() -> usize {
        MIGRATIONS.len()
    }

    // -----------------------------------------------------------------------
    // Migration runner
    // -----------------------------------------------------------------------

    /// Apply all pending migrations sequentially.
    ///
    /// Each migration is wrapped in a transaction. The `user_version` pragma
    /// is bumped atomically on commit.
    fn run_migrations(&mut self) -> Result<(), VaultError> {
        let current = self
            .schema_version()
            .map_err(|e| VaultError::MigrationFailed(e.to_string()))?;

        for (idx, sql) in MIGRATIONS.iter().enumerate() {
            // Migration versions are 1-indexed: index 0 → version 1.
            let version = idx
                .checked_add(1)
                .and_then(|v| i32::try_from(v).ok())
                .ok_or_else(|| VaultError::MigrationFailed("migration index overflow".into()))?;

            if version <= current {
                continue;
            }

            let tx = self.conn.transaction().map_err(|e| {
                VaultError::MigrationFailed(format!(
                    "failed to start transaction for migration {version}: {e}"
                ))
            })?;

            tx.execute_batch(sql).map_err(|e| {
                VaultError::MigrationFailed(format!("migration {version} failed: {e}"))
            })?;

            tx.pragma_update(None, "user_version", version)
                .map_err(|e| {
                    VaultError::MigrationFailed(format!(
                        "failed to update user_version to {version}: {e}"
                    ))
                })?;

            tx.commit().map_err(|e| {
                VaultError::MigrationFailed(format!("failed to commit migration {version}: {e}"))
            })?;

            debug!(version, "applied migration");
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn open_memory() -> Result<Connection, VaultError> {
    let conn =
        Connection::open_in_memory().map_err(|e| VaultError::EngineInitFailed(e.to_string()))?;
    conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA temp_store = MEMORY;")
        .map_err(|e| VaultError::EngineInitFailed(e.to_string()))?;
    Ok(conn)
}

/// Copy `bytes` into a buffer owned by `SQLite`'s allocator, as
/// [`Connection::deserialize`] requires. `bytes` must not be empty.
fn sqlite_owned_copy(bytes: &[u8]) -> Result<OwnedData, VaultError> {
    let len = u64::try_from(bytes.len())
        .map_err(|_| VaultError::EngineInitFailed("database too large".into()))?;

    // SAFETY: sqlite3_malloc64 has no preconditions; a null return is handled below.
    let raw = unsafe { ffi::sqlite3_malloc64(len) }.cast::<u8>();
    let buf = NonNull::new(raw).ok_or_else(|| {
        VaultError::EngineInitFailed(format!("cannot allocate {len} bytes for the database"))
    })?;

    // SAFETY: `buf` points to a fresh allocation of `bytes.len()` bytes, which
    // cannot overlap the borrowed input slice.
    unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), buf.as_ptr(), bytes.len()) };

    // SAFETY: `buf` was allocated by sqlite3_malloc64 and is fully initialized;
    // ownership moves to the returned value, which frees it through SQLite.
    Ok(unsafe { OwnedData::from_raw_nonnull(buf, bytes.len()) })
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
