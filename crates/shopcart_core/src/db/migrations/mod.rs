//! Embedded schema history of the catalog/order store.
//!
//! # Responsibility
//! - Keep the ordered list of SQL scripts that build the store schema.
//! - Bring a connection from its recorded schema version up to the newest.
//!
//! # Invariants
//! - Version 1 creates `categories`, `products`, `order_headers` and
//!   `order_details` with their foreign keys and CHECK constraints.
//! - Versions are contiguous from 1; the applied version is stored in
//!   `PRAGMA user_version` inside the same transaction as the script.
//! - A store recorded at a version this binary does not know is refused.

use crate::db::{DbError, DbResult};
use log::{debug, info};
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const SCHEMA_HISTORY: &[SchemaStep] = &[SchemaStep {
    version: 1,
    name: "catalog_and_orders",
    sql: include_str!("0001_init.sql"),
}];

/// Schema version a fully migrated store reports.
pub fn latest_version() -> u32 {
    SCHEMA_HISTORY.last().map_or(0, |step| step.version)
}

/// Runs every schema step newer than the store's recorded version.
///
/// # Errors
/// - `DbError::UnsupportedSchemaVersion` when the store is ahead of this binary.
/// - `DbError::Sqlite` when a script fails; nothing is applied in that case.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let recorded = schema_version(conn)?;
    let latest = latest_version();
    if recorded > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: recorded,
            latest_supported: latest,
        });
    }

    let pending: Vec<&SchemaStep> = SCHEMA_HISTORY
        .iter()
        .filter(|step| step.version > recorded)
        .collect();
    if pending.is_empty() {
        debug!("event=db_migrate module=db status=skipped version={recorded}");
        return Ok(());
    }

    let tx = conn.transaction()?;
    for step in &pending {
        tx.execute_batch(step.sql)?;
        tx.pragma_update(None, "user_version", step.version)?;
        debug!(
            "event=db_migrate_step module=db status=ok version={} name={}",
            step.version, step.name
        );
    }
    tx.commit()?;

    info!(
        "event=db_migrate module=db status=ok from_version={recorded} to_version={latest} steps={}",
        pending.len()
    );
    Ok(())
}

fn schema_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

#[cfg(test)]
mod tests {
    use super::{latest_version, SCHEMA_HISTORY};

    #[test]
    fn schema_history_is_contiguous_from_one() {
        for (index, step) in SCHEMA_HISTORY.iter().enumerate() {
            assert_eq!(step.version as usize, index + 1, "step {}", step.name);
        }
        assert_eq!(latest_version() as usize, SCHEMA_HISTORY.len());
    }
}
