//! # Graphmem - Knowledge Graph Memory Server
//!
//! SQL-backed persistent memory for AI agents.
//!
//! Graphmem provides:
//! - Typed entities with free-text observations and typed directed relations
//! - One shared operation set exposed over MCP (stdio) and HTTP/JSON
//! - Postgres, MySQL and SQLite backends behind a single pool handle
//! - Transactional cascade delete so observations and relations never
//!   outlive their entities
//! - A portable error taxonomy normalized from backend-native errors

pub mod config;
pub mod model;
pub mod storage;
pub mod service;
pub mod server;

// Re-exports for convenient access
pub use config::{BackendKind, DatabaseConfig, TlsMode};
pub use model::{Entity, Observation, Relation, ResolvedRelation};
pub use service::Service;
pub use storage::Store;

/// Result type alias for Graphmem operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for Graphmem operations.
///
/// Store operations never leak backend-native error types; everything
/// terminal is normalized into one of these variants before it crosses
/// the storage boundary.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A single-row lookup matched zero rows.
    #[error("not found")]
    NotFound,

    /// A uniqueness check or unique-constraint violation fired.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Bad connection parameters (empty database name, unknown backend,
    /// unreadable CA certificate).
    #[error("configuration error: {0}")]
    Config(String),

    /// The backend was unreachable at connect or liveness-probe time.
    #[error("connection error: {0}")]
    Connectivity(String),

    /// Unclassified backend failure. Treated as retryable by callers.
    #[error("database error: {0}")]
    Unknown(String),
}

impl Error {
    /// True when the error is the zero-rows case rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound)
    }
}
