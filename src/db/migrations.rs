//! Schema migrations keyed on `PRAGMA user_version`.
//!
//! `MIGRATIONS[i]` upgrades a database from version `i` to `i + 1`. Pending
//! steps run in a single transaction, so a failed step leaves the file at its
//! previous version.

use anyhow::{bail, Context, Result};
use log::info;
use rusqlite::Connection;

const MIGRATIONS: &[(&str, &str)] = &[
    ("schema_v1.sql", include_str!("schemas/schema_v1.sql")),
    ("schema_v2.sql", include_str!("schemas/schema_v2.sql")),
];

const CURRENT_SCHEMA_VERSION: usize = MIGRATIONS.len();

fn schema_version(conn: &Connection) -> Result<usize> {
    let version: i64 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read user_version pragma")?;
    usize::try_from(version).with_context(|| format!("invalid user_version {version}"))
}

pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let from = schema_version(conn)?;
    if from > CURRENT_SCHEMA_VERSION {
        bail!("database schema v{from} is newer than this build (v{CURRENT_SCHEMA_VERSION})");
    }

    let pending = &MIGRATIONS[from..];
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn
        .transaction()
        .context("failed to open migration transaction")?;
    for (name, sql) in pending {
        tx.execute_batch(sql)
            .with_context(|| format!("failed to apply {name}"))?;
        info!("Applied migration {name}");
    }
    tx.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION as i64)
        .context("failed to update user_version pragma")?;
    tx.commit().context("failed to commit migrations")
}
