//! Unit of work over the catalog/order store.
//!
//! # Responsibility
//! - Construct exactly one repository per entity type, all sharing one
//!   `DbContext`.
//! - Be the only place staged writes are committed.
//!
//! # Invariants
//! - Accessors return the same repository instance for the whole lifetime.
//! - The context is released on `dispose` or drop, whichever comes first.
//! - Not `Send`/`Sync`: one unit of work serves one logical operation.
//! - Every row read is remembered until `discard_changes` or `dispose`, so
//!   long-lived units of work grow with the rows they have read.

use crate::config::StoreConfig;
use crate::db::migrations::latest_version;
use crate::db::{open_configured, open_db_in_memory};
use crate::model::category::Category;
use crate::model::order::{OrderDetail, OrderHeader};
use crate::model::product::Product;
use crate::repo::context::DbContext;
use crate::repo::entity::Entity;
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::repository::{Repository, SqliteRepository};
use log::info;
use rusqlite::Connection;
use std::rc::Rc;

/// Repository accessors plus atomic commit.
pub trait UnitOfWork {
    type Repo<E: Entity>: Repository<E>;

    fn category(&self) -> &Self::Repo<Category>;
    fn product(&self) -> &Self::Repo<Product>;
    fn order_header(&self) -> &Self::Repo<OrderHeader>;
    fn order_detail(&self) -> &Self::Repo<OrderDetail>;

    /// Persists every staged change of every repository, or none of them.
    fn save(&self) -> RepoResult<()>;
}

/// SQLite-backed unit of work.
///
/// Open one per request or command and dispose it afterwards. Callers that
/// keep one around across many reads should call `discard_changes` between
/// batches to release the remembered identities.
pub struct SqliteUnitOfWork {
    context: Rc<DbContext>,
    category: SqliteRepository<Category>,
    product: SqliteRepository<Product>,
    order_header: SqliteRepository<OrderHeader>,
    order_detail: SqliteRepository<OrderDetail>,
}

impl SqliteUnitOfWork {
    /// Wraps a migrated connection.
    ///
    /// # Errors
    /// - `RepoError::UninitializedConnection` when the schema version does
    ///   not match this binary.
    pub fn try_new(conn: Connection) -> RepoResult<Self> {
        let actual_version = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
        let expected_version = latest_version();
        if actual_version != expected_version {
            return Err(RepoError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        let context = Rc::new(DbContext::new(conn));
        info!("event=uow_open module=repo status=ok");
        Ok(Self {
            category: SqliteRepository::new(Rc::clone(&context)),
            product: SqliteRepository::new(Rc::clone(&context)),
            order_header: SqliteRepository::new(Rc::clone(&context)),
            order_detail: SqliteRepository::new(Rc::clone(&context)),
            context,
        })
    }

    pub fn open(config: &StoreConfig) -> RepoResult<Self> {
        Self::try_new(open_configured(config)?)
    }

    pub fn open_in_memory() -> RepoResult<Self> {
        Self::try_new(open_db_in_memory()?)
    }

    /// Closes the connection and discards unsaved changes.
    ///
    /// # Errors
    /// - `RepoError::Disposed` when called a second time.
    pub fn dispose(&self) -> RepoResult<()> {
        self.context.dispose()
    }

    pub fn is_disposed(&self) -> bool {
        self.context.is_disposed()
    }

    pub fn has_changes(&self) -> bool {
        self.pending_changes() > 0
    }

    /// Number of staged writes awaiting `save`.
    pub fn pending_changes(&self) -> usize {
        self.context.pending_changes()
    }

    /// Drops all staged writes, e.g. after a failed `save` the caller gives up on.
    ///
    /// Previously read entities become detached; fetch them again before
    /// updating or deleting them.
    pub fn discard_changes(&self) -> RepoResult<usize> {
        self.context.discard_changes()
    }
}

impl UnitOfWork for SqliteUnitOfWork {
    type Repo<E: Entity> = SqliteRepository<E>;

    fn category(&self) -> &SqliteRepository<Category> {
        &self.category
    }

    fn product(&self) -> &SqliteRepository<Product> {
        &self.product
    }

    fn order_header(&self) -> &SqliteRepository<OrderHeader> {
        &self.order_header
    }

    fn order_detail(&self) -> &SqliteRepository<OrderDetail> {
        &self.order_detail
    }

    fn save(&self) -> RepoResult<()> {
        self.context.save()
    }
}
