//! Catalog and order entity records.
//!
//! # Responsibility
//! - Define the plain records persisted by the generic repository.
//! - Map each record to its table through the `Entity` contract.
//!
//! # Invariants
//! - `id == 0` marks a record the store has not persisted yet.
//! - Relation fields are `None` unless eager-loaded.

pub mod category;
pub mod order;
pub mod product;
