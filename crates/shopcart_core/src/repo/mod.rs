//! Generic data-access layer.
//!
//! # Responsibility
//! - One generic repository serving every entity type.
//! - A unit of work that batches writes from all repositories into one
//!   atomic commit.
//!
//! # Invariants
//! - Absence is `Vec::new()` / `None`, never an error.
//! - Writes reach the store only through `UnitOfWork::save`.

pub mod context;
pub mod entity;
pub mod error;
pub mod filter;
pub mod include;
pub mod repository;
pub mod unit_of_work;
