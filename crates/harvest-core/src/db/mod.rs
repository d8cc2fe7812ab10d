//! SQLite storage for finished workflow runs.
//!
//! One `workflow_runs` table holds each [`WorkflowResult`](crate::workflow::WorkflowResult)
//! as a JSON document next to the columns run listings sort and summarise
//! on. The CLI and the server may share one database file, so connections
//! wait on a busy lock instead of failing immediately. Blocking calls run
//! on `spawn_blocking` via [`Database::with_conn_async`].

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::Connection;

use crate::error::ServerError;

/// Bumped whenever `workflow_runs` changes shape.
pub const SCHEMA_VERSION: i64 = 1;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared handle to the run database.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the run database at `db_path`, creating missing
    /// parent directories.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, ServerError> {
        let path = db_path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                ServerError::Database(format!(
                    "Failed to create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let conn = Connection::open(path)
            .map_err(|e| ServerError::Database(format!("Failed to open database: {}", e)))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| ServerError::Database(format!("Failed to set pragmas: {}", e)))?;

        let db = Self::from_connection(conn)?;
        tracing::info!("Run database opened at: {}", path.display());
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, ServerError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| ServerError::Database(format!("Failed to open in-memory db: {}", e)))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, ServerError> {
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| ServerError::Database(format!("Failed to set busy timeout: {}", e)))?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Run `f` against the locked connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, ServerError>
    where
        F: FnOnce(&Connection) -> Result<T, rusqlite::Error>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| ServerError::Database(format!("Lock poisoned: {}", e)))?;
        f(&conn).map_err(|e| ServerError::Database(e.to_string()))
    }

    /// [`with_conn`](Self::with_conn) on the blocking pool.
    pub async fn with_conn_async<F, T>(&self, f: F) -> Result<T, ServerError>
    where
        F: FnOnce(&Connection) -> Result<T, rusqlite::Error> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || db.with_conn(f))
            .await
            .map_err(|e| ServerError::Database(format!("Task join error: {}", e)))?
    }

    /// Schema version recorded in the database file.
    pub fn schema_version(&self) -> Result<i64, ServerError> {
        self.with_conn(|conn| conn.query_row("PRAGMA user_version", [], |row| row.get(0)))
    }

    fn migrate(&self) -> Result<(), ServerError> {
        let found = self.schema_version()?;
        if found > SCHEMA_VERSION {
            return Err(ServerError::Database(format!(
                "Run database has schema version {}, newer than supported version {}",
                found, SCHEMA_VERSION
            )));
        }

        self.with_conn(|conn| {
            conn.execute_batch(
                "
                CREATE TABLE IF NOT EXISTS workflow_runs (
                    id              TEXT PRIMARY KEY,
                    name            TEXT,
                    total           INTEGER NOT NULL,
                    succeeded       INTEGER NOT NULL,
                    failed          INTEGER NOT NULL,
                    skipped         INTEGER NOT NULL,
                    result          TEXT NOT NULL,
                    started_at      INTEGER NOT NULL,
                    completed_at    INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_workflow_runs_completed ON workflow_runs(completed_at);
                ",
            )?;
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)
        })
    }
}
