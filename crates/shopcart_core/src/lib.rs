//! Data-access core for the shopcart catalog/order backend.
//! A generic repository per entity type, composed under a unit of work
//! that commits staged writes atomically.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, StoreConfig};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status};
pub use model::category::{Category, CategoryColumn};
pub use model::order::{
    OrderDetail, OrderDetailColumn, OrderDetailRelation, OrderHeader, OrderHeaderColumn,
    OrderHeaderRelation, OrderStatus,
};
pub use model::product::{Product, ProductColumn, ProductRelation};
pub use repo::entity::{Affinity, Column, Entity, EntityId, NoRelation, Relation};
pub use repo::error::{ErrorKind, RepoError, RepoResult};
pub use repo::filter::{CmpOp, Filter};
pub use repo::include::Includes;
pub use repo::repository::{Repository, SqliteRepository};
pub use repo::unit_of_work::{SqliteUnitOfWork, UnitOfWork};
pub use service::category_service::CategoryService;
pub use service::error::{ServiceError, ServiceResult};
pub use service::order_service::{OrderService, OrderView};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
