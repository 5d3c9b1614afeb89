//! Storage layer - SQL-backed persistence.
//!
//! System of record is one of postgres/mysql/sqlite with tables:
//! - entities(id, created_at, updated_at, name, type)
//! - observations(id, created_at, updated_at, contents, entity_id)
//! - relations(id, created_at, updated_at, type, from_id, to_id)
//!
//! All operations return normalized errors (see [`error`]); callers
//! never see sqlx error types.

pub mod connect;
pub mod error;
pub mod schema;

mod entity;
mod graph;
mod observation;
mod relation;

pub use connect::Store;
