//! Generic repository contract and its SQLite implementation.
//!
//! # Responsibility
//! - Serve typed CRUD and queries for any `Entity` without per-entity code.
//! - Stage writes on the shared context; never write to the store directly.
//!
//! # Invariants
//! - Reads execute immediately and return a materialized snapshot.
//! - Rows come back in ascending `id` order.
//! - Every returned row, including eager-loaded relations, becomes tracked.

use crate::repo::context::{busy, ChangeTracker, DbContext, EntityKey, RelationLoader};
use crate::repo::entity::{select_sql, Entity};
use crate::repo::error::RepoResult;
use crate::repo::filter::Filter;
use crate::repo::include::Includes;
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::Rc;
use std::time::Instant;

/// Typed CRUD and query surface over one entity table.
pub trait Repository<E: Entity> {
    /// Stages `entity` for insertion. The store assigns its identity on save.
    fn add(&self, entity: &E) -> RepoResult<()>;

    /// Stages the current field values of a tracked entity.
    fn update(&self, entity: &E) -> RepoResult<()>;

    /// Stages removal of a tracked entity, or cancels its staged insert.
    fn delete(&self, entity: &E) -> RepoResult<()>;

    /// Stages removal of every element; nothing is staged if any is invalid.
    fn delete_range(&self, entities: &[E]) -> RepoResult<()>;

    /// Returns all rows satisfying `filter` (all rows when `None`).
    fn get_all(
        &self,
        filter: Option<Filter<E>>,
        includes: Includes<E::Relation>,
    ) -> RepoResult<Vec<E>>;

    /// Returns the first row satisfying `filter`, or `None`.
    fn get_first_or_default(
        &self,
        filter: Filter<E>,
        includes: Includes<E::Relation>,
    ) -> RepoResult<Option<E>>;
}

/// Repository bound to the context of one `SqliteUnitOfWork`.
pub struct SqliteRepository<E: Entity> {
    context: Rc<DbContext>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> SqliteRepository<E> {
    pub(crate) fn new(context: Rc<DbContext>) -> Self {
        Self {
            context,
            _entity: PhantomData,
        }
    }

    fn query(
        &self,
        filter: Option<&Filter<E>>,
        includes: &Includes<E::Relation>,
        limit: Option<usize>,
    ) -> RepoResult<Vec<E>> {
        self.context
            .read(|conn, tracker| load_rows(conn, tracker, filter, includes, limit))
    }
}

impl<E: Entity> Repository<E> for SqliteRepository<E> {
    fn add(&self, entity: &E) -> RepoResult<()> {
        self.context.stage(|tracker| tracker.stage_insert(entity))
    }

    fn update(&self, entity: &E) -> RepoResult<()> {
        self.context.stage(|tracker| tracker.stage_update(entity))
    }

    fn delete(&self, entity: &E) -> RepoResult<()> {
        self.context.stage(|tracker| tracker.stage_delete(entity))
    }

    fn delete_range(&self, entities: &[E]) -> RepoResult<()> {
        self.context.stage(|tracker| {
            let mut scratch = tracker.clone();
            for entity in entities {
                scratch.stage_delete(entity)?;
            }
            *tracker = scratch;
            Ok(())
        })
    }

    fn get_all(
        &self,
        filter: Option<Filter<E>>,
        includes: Includes<E::Relation>,
    ) -> RepoResult<Vec<E>> {
        self.query(filter.as_ref(), &includes, None)
    }

    fn get_first_or_default(
        &self,
        filter: Filter<E>,
        includes: Includes<E::Relation>,
    ) -> RepoResult<Option<E>> {
        let rows = self.query(Some(&filter), &includes, Some(1))?;
        Ok(rows.into_iter().next())
    }
}

/// Loads, filters, eager-loads and tracks rows of `E`.
///
/// `limit` stops materialization after that many matching rows.
pub(crate) fn load_rows<E: Entity>(
    conn: &Connection,
    tracker: &RefCell<ChangeTracker>,
    filter: Option<&Filter<E>>,
    includes: &Includes<E::Relation>,
    limit: Option<usize>,
) -> RepoResult<Vec<E>> {
    let started_at = Instant::now();
    let plan = filter.map(|filter| filter.plan());

    let mut sql = select_sql::<E>();
    let mut binds: Vec<Value> = Vec::new();
    if let Some(plan) = plan.as_ref() {
        if let Some(where_sql) = plan.where_sql.as_deref() {
            sql.push_str(" WHERE ");
            sql.push_str(where_sql);
        }
        binds.extend(plan.binds.iter().cloned());
    }
    sql.push_str(" ORDER BY id ASC");

    let fully_pushed_down = plan.as_ref().map_or(true, |plan| plan.residual.is_empty());
    if let (Some(limit), true) = (limit, fully_pushed_down) {
        sql.push_str(" LIMIT ?");
        binds.push(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
    }

    let mut entities = Vec::new();
    {
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        while let Some(row) = rows.next()? {
            let entity = E::from_row(row)?;
            if plan.as_ref().map_or(true, |plan| plan.accepts(&entity)) {
                entities.push(entity);
                if limit.is_some_and(|limit| entities.len() >= limit) {
                    break;
                }
            }
        }
    }

    if !includes.is_empty() {
        let loader = RelationLoader::new(conn, tracker);
        for entity in &mut entities {
            for relation in includes.iter() {
                entity.load_relation(relation, &loader)?;
            }
        }
    }

    {
        let mut tracker = tracker.try_borrow_mut().map_err(|_| busy())?;
        for entity in &entities {
            tracker.track(EntityKey::of(entity));
        }
    }

    debug!(
        "event=repo_query module=repo status=ok table={} rows={} includes={} duration_ms={}",
        E::TABLE,
        entities.len(),
        includes.iter().count(),
        started_at.elapsed().as_millis()
    );
    Ok(entities)
}
