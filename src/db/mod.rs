pub mod migrations;
pub mod queries;

use std::sync::Mutex;

use anyhow::Context;
use rusqlite::Connection;

use crate::errors::StoreError;

pub fn init_db(path: &str) -> anyhow::Result<Connection> {
    let conn = Connection::open(path).context("failed to open mailing store")?;

    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
        .context("failed to set database pragmas")?;

    migrations::run_migrations(&conn)?;

    Ok(conn)
}

/// Runs `f` against the shared connection. The lock is released before
/// returning, so callers never hold it across an await point.
pub fn with_conn<T>(
    db: &Mutex<Connection>,
    f: impl FnOnce(&Connection) -> Result<T, StoreError>,
) -> Result<T, StoreError> {
    let conn = db.lock().map_err(|_| StoreError::LockPoisoned)?;
    f(&*conn)
}
