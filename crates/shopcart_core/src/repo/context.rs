//! Shared store context of one unit of work.
//!
//! # Responsibility
//! - Own the SQLite connection for the lifetime of one unit of work.
//! - Track entities returned by reads and stage writes until `save`.
//! - Commit all staged writes in a single transaction.
//!
//! # Invariants
//! - Staged writes touch the store only inside `save`.
//! - A failed `save` rolls back everything and leaves the staged set intact.
//! - After `dispose` every operation fails with `RepoError::Disposed`.
//! - Same-batch cancel-out: deleting an unsaved entity drops its staged insert.

use crate::repo::entity::{column_names, column_values, Entity, EntityId};
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::filter::Filter;
use crate::repo::include::Includes;
use crate::repo::repository::load_rows;
use log::{debug, error, info, warn};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Transaction, TransactionBehavior};
use std::cell::RefCell;
use std::collections::HashSet;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct EntityKey {
    pub table: &'static str,
    pub id: EntityId,
}

impl EntityKey {
    pub fn of<E: Entity>(entity: &E) -> Self {
        Self {
            table: E::TABLE,
            id: entity.id(),
        }
    }
}

#[derive(Debug, Clone)]
enum StagedWrite {
    Insert {
        table: &'static str,
        columns: Vec<&'static str>,
        values: Vec<Value>,
    },
    Update {
        key: EntityKey,
        columns: Vec<&'static str>,
        values: Vec<Value>,
    },
    Delete {
        key: EntityKey,
    },
}

impl StagedWrite {
    fn key(&self) -> Option<EntityKey> {
        match self {
            Self::Insert { .. } => None,
            Self::Update { key, .. } | Self::Delete { key } => Some(*key),
        }
    }
}

#[derive(Debug, Default)]
struct Applied {
    inserted: Vec<EntityKey>,
    updated: usize,
    deleted: Vec<EntityKey>,
}

/// Pending change set plus the identities known to this unit of work.
#[derive(Debug, Clone, Default)]
pub(crate) struct ChangeTracker {
    staged: Vec<StagedWrite>,
    tracked: HashSet<EntityKey>,
}

impl ChangeTracker {
    pub fn track(&mut self, key: EntityKey) {
        self.tracked.insert(key);
    }

    pub fn pending(&self) -> usize {
        self.staged.len()
    }

    pub fn stage_insert<E: Entity>(&mut self, entity: &E) -> RepoResult<()> {
        if !entity.is_new() {
            return Err(RepoError::Precondition(format!(
                "{}#{} cannot be added: identity is assigned by the store",
                E::TABLE,
                entity.id()
            )));
        }
        self.staged.push(StagedWrite::Insert {
            table: E::TABLE,
            columns: column_names::<E>(),
            values: column_values(entity),
        });
        Ok(())
    }

    pub fn stage_update<E: Entity>(&mut self, entity: &E) -> RepoResult<()> {
        if entity.is_new() {
            return Err(RepoError::Precondition(format!(
                "{} without identity cannot be updated; add it instead",
                E::TABLE
            )));
        }
        let key = EntityKey::of(entity);
        if !self.tracked.contains(&key) {
            return Err(RepoError::Detached {
                table: key.table,
                id: key.id,
            });
        }

        let write = StagedWrite::Update {
            key,
            columns: column_names::<E>(),
            values: column_values(entity),
        };
        match self.position_of(key) {
            Some(index) if matches!(self.staged[index], StagedWrite::Delete { .. }) => {
                Err(RepoError::Precondition(format!(
                    "{}#{} is staged for deletion",
                    key.table, key.id
                )))
            }
            Some(index) => {
                self.staged[index] = write;
                Ok(())
            }
            None => {
                self.staged.push(write);
                Ok(())
            }
        }
    }

    pub fn stage_delete<E: Entity>(&mut self, entity: &E) -> RepoResult<()> {
        if entity.is_new() {
            let values = column_values(entity);
            let staged_insert = self.staged.iter().position(|write| {
                matches!(write, StagedWrite::Insert { table, values: staged, .. }
                    if *table == E::TABLE && *staged == values)
            });
            return match staged_insert {
                Some(index) => {
                    self.staged.remove(index);
                    Ok(())
                }
                None => Err(RepoError::Detached {
                    table: E::TABLE,
                    id: 0,
                }),
            };
        }

        let key = EntityKey::of(entity);
        if !self.tracked.contains(&key) {
            return Err(RepoError::Detached {
                table: key.table,
                id: key.id,
            });
        }

        match self.position_of(key) {
            Some(index) => self.staged[index] = StagedWrite::Delete { key },
            None => self.staged.push(StagedWrite::Delete { key }),
        }
        Ok(())
    }

    /// Drops every staged write and forgets every tracked identity.
    pub fn reset(&mut self) -> usize {
        self.tracked.clear();
        std::mem::take(&mut self.staged).len()
    }

    fn position_of(&self, key: EntityKey) -> Option<usize> {
        self.staged.iter().position(|write| write.key() == Some(key))
    }

    fn apply(&self, tx: &Transaction<'_>) -> RepoResult<Applied> {
        let mut applied = Applied::default();
        for write in &self.staged {
            match write {
                StagedWrite::Insert {
                    table,
                    columns,
                    values,
                } => {
                    let placeholders = vec!["?"; columns.len()].join(", ");
                    let sql = format!(
                        "INSERT INTO {table} ({}) VALUES ({placeholders});",
                        columns.join(", ")
                    );
                    tx.execute(&sql, params_from_iter(values.iter()))?;
                    applied.inserted.push(EntityKey {
                        table: *table,
                        id: tx.last_insert_rowid(),
                    });
                }
                StagedWrite::Update {
                    key,
                    columns,
                    values,
                } => {
                    let assignments = columns
                        .iter()
                        .map(|column| format!("{column} = ?"))
                        .collect::<Vec<_>>()
                        .join(", ");
                    let sql = format!("UPDATE {} SET {assignments} WHERE id = ?;", key.table);
                    let id = Value::Integer(key.id);
                    let changed = tx.execute(
                        &sql,
                        params_from_iter(values.iter().chain(std::iter::once(&id))),
                    )?;
                    if changed == 0 {
                        return Err(RepoError::Conflict {
                            table: key.table,
                            id: key.id,
                        });
                    }
                    applied.updated += 1;
                }
                StagedWrite::Delete { key } => {
                    let changed = tx
                        .execute(&format!("DELETE FROM {} WHERE id = ?1;", key.table), [key.id])?;
                    if changed == 0 {
                        return Err(RepoError::Conflict {
                            table: key.table,
                            id: key.id,
                        });
                    }
                    applied.deleted.push(*key);
                }
            }
        }
        Ok(applied)
    }

    fn settle(&mut self, applied: &Applied) {
        self.staged.clear();
        self.tracked.extend(applied.inserted.iter().copied());
        for key in &applied.deleted {
            self.tracked.remove(key);
        }
    }
}

/// Read access handed to `Entity::load_relation`.
///
/// Rows loaded through it are tracked like any other read result.
pub struct RelationLoader<'a> {
    conn: &'a Connection,
    tracker: &'a RefCell<ChangeTracker>,
}

impl<'a> RelationLoader<'a> {
    pub(crate) fn new(conn: &'a Connection, tracker: &'a RefCell<ChangeTracker>) -> Self {
        Self { conn, tracker }
    }

    pub fn find<T: Entity>(&self, id: EntityId) -> RepoResult<Option<T>> {
        let rows = load_rows(
            self.conn,
            self.tracker,
            Some(&Filter::by_id(id)),
            &Includes::none(),
            Some(1),
        )?;
        Ok(rows.into_iter().next())
    }

    pub fn list<T: Entity>(&self, filter: Filter<T>) -> RepoResult<Vec<T>> {
        load_rows(
            self.conn,
            self.tracker,
            Some(&filter),
            &Includes::none(),
            None,
        )
    }
}

/// Connection plus change tracker shared by the repositories of one unit of
/// work.
pub struct DbContext {
    conn: RefCell<Option<Connection>>,
    tracker: RefCell<ChangeTracker>,
}

impl DbContext {
    pub(crate) fn new(conn: Connection) -> Self {
        Self {
            conn: RefCell::new(Some(conn)),
            tracker: RefCell::new(ChangeTracker::default()),
        }
    }

    pub(crate) fn read<T>(
        &self,
        f: impl FnOnce(&Connection, &RefCell<ChangeTracker>) -> RepoResult<T>,
    ) -> RepoResult<T> {
        let slot = self.conn.try_borrow().map_err(|_| busy())?;
        let conn = slot.as_ref().ok_or(RepoError::Disposed)?;
        f(conn, &self.tracker)
    }

    pub(crate) fn stage<T>(
        &self,
        f: impl FnOnce(&mut ChangeTracker) -> RepoResult<T>,
    ) -> RepoResult<T> {
        if self.is_disposed() {
            return Err(RepoError::Disposed);
        }
        let mut tracker = self.tracker.try_borrow_mut().map_err(|_| busy())?;
        f(&mut tracker)
    }

    pub fn is_disposed(&self) -> bool {
        self.conn.try_borrow().map_or(false, |slot| slot.is_none())
    }

    pub fn pending_changes(&self) -> usize {
        self.tracker.borrow().pending()
    }

    pub fn discard_changes(&self) -> RepoResult<usize> {
        let discarded = self.stage(|tracker| Ok(tracker.reset()))?;
        if discarded > 0 {
            info!("event=uow_discard module=repo status=ok discarded={discarded}");
        }
        Ok(discarded)
    }

    /// Commits every staged write atomically.
    ///
    /// # Errors
    /// - `RepoError::Disposed` after `dispose`.
    /// - `RepoError::Conflict` when a staged update/delete matches no row.
    /// - `RepoError::Db` for constraint violations and I/O failures.
    pub fn save(&self) -> RepoResult<()> {
        let started_at = Instant::now();
        let mut slot = self.conn.try_borrow_mut().map_err(|_| busy())?;
        let conn = slot.as_mut().ok_or(RepoError::Disposed)?;
        let mut tracker = self.tracker.try_borrow_mut().map_err(|_| busy())?;

        if tracker.pending() == 0 {
            debug!("event=uow_save module=repo status=skipped reason=no_changes");
            return Ok(());
        }

        let pending = tracker.pending();
        match commit(conn, &tracker) {
            Ok(applied) => {
                tracker.settle(&applied);
                info!(
                    "event=uow_save module=repo status=ok inserted={} updated={} deleted={} duration_ms={}",
                    applied.inserted.len(),
                    applied.updated,
                    applied.deleted.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=uow_save module=repo status=error pending={} duration_ms={} error={}",
                    pending,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    /// Closes the connection. Unsaved changes are discarded.
    pub fn dispose(&self) -> RepoResult<()> {
        let conn = self
            .conn
            .try_borrow_mut()
            .map_err(|_| busy())?
            .take()
            .ok_or(RepoError::Disposed)?;

        let discarded = self.tracker.borrow_mut().reset();
        if discarded > 0 {
            warn!("event=uow_dispose module=repo status=discarded pending={discarded}");
        }

        conn.close().map_err(|(_, err)| RepoError::from(err))?;
        info!("event=uow_dispose module=repo status=ok");
        Ok(())
    }
}

impl Drop for DbContext {
    fn drop(&mut self) {
        if self.is_disposed() {
            return;
        }
        if let Err(err) = self.dispose() {
            error!("event=uow_dispose module=repo status=error error={err}");
        }
    }
}

fn commit(conn: &mut Connection, tracker: &ChangeTracker) -> RepoResult<Applied> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    // Foreign keys are checked at COMMIT, so staging order is irrelevant.
    tx.execute_batch("PRAGMA defer_foreign_keys = ON;")?;
    let applied = tracker.apply(&tx)?;
    tx.commit()?;
    Ok(applied)
}

pub(crate) fn busy() -> RepoError {
    RepoError::Precondition("unit of work is already in use by an enclosing operation".to_string())
}

#[cfg(test)]
mod tests {
    use super::{ChangeTracker, EntityKey};
    use crate::model::category::Category;
    use crate::repo::error::RepoError;

    fn tracked(id: i64, name: &str) -> (ChangeTracker, Category) {
        let category = Category {
            id,
            name: name.to_string(),
            display_order: 0,
        };
        let mut tracker = ChangeTracker::default();
        tracker.track(EntityKey::of(&category));
        (tracker, category)
    }

    #[test]
    fn delete_of_unsaved_entity_cancels_its_insert() {
        let mut tracker = ChangeTracker::default();
        let fresh = Category::new("Fresh", 1);
        tracker.stage_insert(&fresh).unwrap();
        assert_eq!(tracker.pending(), 1);

        tracker.stage_delete(&fresh).unwrap();
        assert_eq!(tracker.pending(), 0);

        let err = tracker.stage_delete(&fresh).unwrap_err();
        assert!(matches!(err, RepoError::Detached { id: 0, .. }));
    }

    #[test]
    fn later_update_replaces_earlier_and_delete_replaces_update() {
        let (mut tracker, mut category) = tracked(7, "Old");
        tracker.stage_update(&category).unwrap();
        category.name = "New".to_string();
        tracker.stage_update(&category).unwrap();
        assert_eq!(tracker.pending(), 1);

        tracker.stage_delete(&category).unwrap();
        tracker.stage_delete(&category).unwrap();
        assert_eq!(tracker.pending(), 1);

        let err = tracker.stage_update(&category).unwrap_err();
        assert!(matches!(err, RepoError::Precondition(_)));
    }

    #[test]
    fn untracked_entities_are_detached() {
        let mut tracker = ChangeTracker::default();
        let stranger = Category {
            id: 42,
            name: "Stranger".to_string(),
            display_order: 0,
        };
        assert!(matches!(
            tracker.stage_delete(&stranger),
            Err(RepoError::Detached { table: "categories", id: 42 })
        ));
        assert!(matches!(
            tracker.stage_update(&stranger),
            Err(RepoError::Detached { .. })
        ));
    }

    #[test]
    fn reset_forgets_staged_writes_and_tracked_identities() {
        let (mut tracker, category) = tracked(5, "Kept");
        tracker.stage_update(&category).unwrap();
        assert_eq!(tracker.reset(), 1);
        assert_eq!(tracker.pending(), 0);
        assert!(matches!(
            tracker.stage_update(&category),
            Err(RepoError::Detached { id: 5, .. })
        ));
    }

    #[test]
    fn add_rejects_caller_assigned_identity() {
        let (mut tracker, category) = tracked(3, "Existing");
        assert!(matches!(
            tracker.stage_insert(&category),
            Err(RepoError::Precondition(_))
        ));
    }
}
