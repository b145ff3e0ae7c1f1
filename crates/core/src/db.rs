//! SQLite storage handle and schema migrations.
//!
//! The process owns one [`Database`], built at startup and shared by `Arc` between services.
//! A single connection sits behind a mutex; every service operation takes the lock once and
//! performs its reads and writes inside that critical section, so a multi-statement workflow
//! step (expiry check, conditional update, patient write-back) commits or rolls back as a unit.

use crate::{ClinicError, ClinicResult};
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

const MIGRATIONS: &[(i64, &str)] = &[(1, include_str!("../migrations/001_initial.sql"))];

pub struct Database {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

impl Database {
    /// Opens (creating if needed) the database file at `path` and runs pending migrations.
    ///
    /// # Errors
    ///
    /// Returns `ClinicError` if the parent directory cannot be created, the file cannot be
    /// opened, or a migration fails.
    pub fn open(path: &Path) -> ClinicResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(ClinicError::StorageDirCreation)?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::from_connection(conn)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> ClinicResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> ClinicResult<Self> {
        configure_pragmas(&conn)?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Runs `f` with exclusive access to the connection.
    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> ClinicResult<T>) -> ClinicResult<T> {
        let conn = self.conn.lock().map_err(|_| ClinicError::LockPoisoned)?;
        f(&conn)
    }

    /// Runs `f` inside an `IMMEDIATE` transaction; commits on `Ok`, rolls back on `Err`.
    pub fn with_transaction<T>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> ClinicResult<T>,
    ) -> ClinicResult<T> {
        let mut conn = self.conn.lock().map_err(|_| ClinicError::LockPoisoned)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    pub fn schema_version(&self) -> ClinicResult<i64> {
        self.with_conn(current_version)
    }
}

fn configure_pragmas(conn: &Connection) -> ClinicResult<()> {
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    Ok(())
}

/// Run all pending migrations, each in its own transaction.
fn run_migrations(conn: &Connection) -> ClinicResult<()> {
    let current = current_version(conn)?;

    for &(version, sql) in MIGRATIONS {
        if version <= current {
            continue;
        }

        tracing::info!("running migration v{version}");
        conn.execute_batch(&format!("BEGIN;\n{sql}\nCOMMIT;"))
            .map_err(|e| {
                let _ = conn.execute_batch("ROLLBACK;");
                ClinicError::MigrationFailed {
                    version,
                    reason: e.to_string(),
                }
            })?;
    }

    Ok(())
}

/// Current schema version, 0 for a fresh database.
fn current_version(conn: &Connection) -> ClinicResult<i64> {
    let has_table: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()?;

    if has_table.is_none() {
        return Ok(0);
    }

    let version: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get(0)
        })?;
    Ok(version.unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn open_in_memory_applies_all_migrations() {
        let db = Database::open_in_memory().expect("open should succeed");
        assert_eq!(db.schema_version().unwrap(), 1);

        let tables: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                     AND name IN ('patients', 'appointments', 'questionnaires')",
                    [],
                    |row| row.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(tables, 3);
    }

    #[test]
    fn reopening_a_file_database_is_idempotent() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("nested").join("clinic.db");

        drop(Database::open(&path).expect("first open should succeed"));
        let db = Database::open(&path).expect("second open should succeed");

        assert!(path.is_file());
        assert_eq!(db.schema_version().unwrap(), 1);
    }

    #[test]
    fn foreign_keys_are_enforced() {
        let db = Database::open_in_memory().unwrap();
        let fk: i64 = db
            .with_conn(|conn| Ok(conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?))
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn failed_transaction_rolls_back() {
        let db = Database::open_in_memory().unwrap();

        let result: ClinicResult<()> = db.with_transaction(|tx| {
            tx.execute(
                "INSERT INTO patients (name, registered_at) VALUES ('Ana', '2026-01-01T00:00:00.000000Z')",
                [],
            )?;
            Err(ClinicError::InvalidInput("abort".into()))
        });
        assert!(result.is_err());

        let count: i64 = db
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM patients", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(count, 0);
    }
}
