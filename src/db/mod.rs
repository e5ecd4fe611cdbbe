pub mod migrations;
pub mod queries;

use std::path::Path;

use anyhow::Context;
use rusqlite::Connection;

/// Opens the appointment database at `path`, creating missing parent
/// directories, and brings the schema up to date. `:memory:` is accepted.
pub fn init_db(path: &str) -> anyhow::Result<Connection> {
    if path != ":memory:" {
        if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create database directory {}", parent.display()))?;
        }
    }

    let conn = Connection::open(path).with_context(|| format!("failed to open database {path}"))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
        .context("failed to set database pragmas")?;

    migrations::run_migrations(&conn)?;
    tracing::debug!(database = path, "appointment store ready");

    Ok(conn)
}
