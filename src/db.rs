//! Database connection management, migrations, and error types.
//!
//! This module handles SQLite connection setup (WAL mode, foreign keys, busy
//! timeout), schema versioning via embedded migrations, and the error type
//! shared by the storage engine, the service façade, and the CLI.

use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable that overrides the default database location.
pub const PATH_ENV: &str = "WIKI_PATH";

/// Central error type for the wiki.
///
/// The first five variants are the domain error kinds; `Db` and `Io` wrap
/// failures from the underlying store and filesystem.
#[derive(Debug, Error)]
pub enum WikiError {
    /// Empty or malformed input (blank title or content).
    #[error("Invalid input: {0}")]
    Validation(String),

    /// A page with the same normalized title already exists.
    #[error("Duplicate title: a page named '{0}' already exists")]
    DuplicateTitle(String),

    /// The targeted page or revision does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Another writer got there first.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The store contains orphaned or inconsistent rows.
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    /// I/O operation failed (directory creation, reading stdin, etc).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WikiError {
    /// Stable machine-readable label for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::DuplicateTitle(_) => "duplicate_title",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Integrity(_) => "integrity",
            Self::Db(_) => "database",
            Self::Io(_) => "io",
        }
    }
}

/// Returns the path to the SQLite database file.
///
/// Resolution order:
/// 1. `explicit` (the `--db` flag), if given
/// 2. `WIKI_PATH` environment variable, if set
/// 3. `~/.wiki/wiki.db`
///
/// Creates the parent directory if it doesn't exist.
///
/// # Errors
///
/// Returns `WikiError::Io` if the home directory cannot be determined or the
/// parent directory cannot be created.
pub fn db_path(explicit: Option<&Path>) -> Result<PathBuf, WikiError> {
    let path = if let Some(p) = explicit {
        p.to_path_buf()
    } else if let Ok(env_path) = std::env::var(PATH_ENV) {
        PathBuf::from(env_path)
    } else {
        let home = dirs::home_dir().ok_or_else(|| {
            WikiError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not determine home directory",
            ))
        })?;
        home.join(".wiki").join("wiki.db")
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    Ok(path)
}

/// Opens a SQLite connection at `path` with the settings the store relies on:
///
/// - **WAL mode**: concurrent readers with serialized writers
/// - **Foreign keys**: a revision can never outlive its page
/// - **Busy timeout**: 5 seconds, so a second writer waits instead of failing
///
/// # Errors
///
/// Returns `WikiError::Db` if the connection cannot be opened or configured.
pub fn open_connection_at(path: &Path) -> Result<Connection, WikiError> {
    let conn = Connection::open(path)?;
    configure(&conn)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    log::debug!("opened database at {}", path.display());
    Ok(conn)
}

/// Opens a private in-memory database configured like a file-backed one.
pub fn open_in_memory() -> Result<Connection, WikiError> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    Ok(conn)
}

fn configure(conn: &Connection) -> Result<(), WikiError> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    Ok(())
}

/// Reads the schema version. A database without `schema_meta`, or with an
/// empty one, is at version 0; any other failure is returned.
fn schema_version(conn: &Connection) -> Result<i64, WikiError> {
    let has_meta: bool = conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_meta')",
        [],
        |row| row.get(0),
    )?;
    if !has_meta {
        return Ok(0);
    }

    match conn.query_row("SELECT version FROM schema_meta LIMIT 1", [], |row| row.get(0)) {
        Ok(version) => Ok(version),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(e) => Err(WikiError::Db(e)),
    }
}

/// Runs all pending database migrations.
///
/// Called once at startup. Reads the current version from `schema_meta`
/// (0 on a fresh database) and applies every embedded migration with a
/// higher version, each in its own transaction. Running it again is a no-op.
///
/// # Errors
///
/// Returns `WikiError::Db` if a migration fails; that migration is rolled back.
pub fn run_migrations(conn: &mut Connection) -> Result<(), WikiError> {
    let current_version = schema_version(conn)?;

    let migrations: Vec<(i64, &str)> = vec![(1, include_str!("../migrations/001_initial.sql"))];

    for (target_version, sql) in migrations {
        if target_version > current_version {
            let tx = conn.transaction()?;
            tx.execute_batch(sql)?;
            tx.commit()?;
            log::info!("applied schema migration {}", target_version);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_path_prefers_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = dir.path().join("nested").join("explicit.db");

        let result = db_path(Some(&explicit)).expect("db_path should succeed");

        assert_eq!(result, explicit);
        assert!(dir.path().join("nested").is_dir());
    }

    #[test]
    fn test_migration_creates_tables_from_scratch() {
        let mut conn = open_in_memory().expect("Failed to open in-memory DB");

        run_migrations(&mut conn).expect("Migrations should succeed");

        let version: i64 = conn
            .query_row("SELECT version FROM schema_meta", [], |row| row.get(0))
            .expect("schema_meta should exist");
        assert_eq!(version, 1);

        let table_names: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .expect("Failed to prepare query")
            .query_map([], |row| row.get(0))
            .expect("Failed to query tables")
            .collect::<Result<Vec<_>, _>>()
            .expect("Failed to collect table names");

        assert!(table_names.contains(&"schema_meta".to_string()));
        assert!(table_names.contains(&"pages".to_string()));
        assert!(table_names.contains(&"revisions".to_string()));
    }

    #[test]
    fn test_migration_is_idempotent() {
        let mut conn = open_in_memory().expect("Failed to open in-memory DB");

        run_migrations(&mut conn).expect("First migration should succeed");
        conn.execute("INSERT INTO pages (title) VALUES ('kept')", [])
            .expect("insert should succeed");
        run_migrations(&mut conn).expect("Second migration should succeed");

        let version: i64 = conn
            .query_row("SELECT version FROM schema_meta", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, 1);

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_meta", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);

        let pages: i64 = conn
            .query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))
            .unwrap();
        assert_eq!(pages, 1, "re-running migrations must not touch data");
    }

    #[test]
    fn test_schema_version_of_fresh_and_migrated_db() {
        let mut conn = open_in_memory().unwrap();
        assert_eq!(schema_version(&conn).unwrap(), 0);

        run_migrations(&mut conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), 1);
    }

    #[test]
    fn test_unreadable_schema_meta_is_an_error() {
        let mut conn = open_in_memory().unwrap();
        // A schema_meta table without a version column cannot be read.
        conn.execute_batch("CREATE TABLE schema_meta (other TEXT); INSERT INTO schema_meta VALUES ('x');")
            .unwrap();

        assert!(matches!(schema_version(&conn), Err(WikiError::Db(_))));
        assert!(matches!(run_migrations(&mut conn), Err(WikiError::Db(_))));
    }

    #[test]
    fn test_open_connection_at_configures_correctly() {
        let dir = tempfile::tempdir().unwrap();
        let conn = open_connection_at(&dir.path().join("config.db")).expect("Should open connection");

        let journal_mode: String = conn
            .pragma_query_value(None, "journal_mode", |row| row.get(0))
            .expect("Should query journal_mode");
        assert_eq!(journal_mode.to_lowercase(), "wal");

        let foreign_keys: i64 = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .expect("Should query foreign_keys");
        assert_eq!(foreign_keys, 1);
    }

    #[test]
    fn test_error_kinds_are_stable() {
        assert_eq!(WikiError::Validation("x".into()).kind(), "validation");
        assert_eq!(WikiError::DuplicateTitle("x".into()).kind(), "duplicate_title");
        assert_eq!(WikiError::NotFound("x".into()).kind(), "not_found");
        assert_eq!(WikiError::Conflict("x".into()).kind(), "conflict");
        assert_eq!(WikiError::Integrity("x".into()).kind(), "integrity");
    }

    #[test]
    fn test_duplicate_title_message_names_title() {
        let err = WikiError::DuplicateTitle("my_page".into());
        assert!(err.to_string().contains("my_page"));
    }
}
