//! Use-case services consuming the unit of work.
//!
//! # Responsibility
//! - Apply the create-or-update and fetch-then-delete protocols.
//! - Turn "no match" from the repository layer into domain not-found errors.

pub mod category_service;
pub mod error;
pub mod order_service;
