//! Row models for the knowledge graph tables.
//!
//! Timestamps are stored as unix epoch milliseconds so every backend
//! round-trips them as plain integers. Rows are never updated in place;
//! the only mutations anywhere are create and delete.

use serde::Serialize;

/// A named, typed node in the knowledge graph.
///
/// The identifier is server-assigned and immutable. Name uniqueness is
/// enforced by the service layer, not the schema; reads that assume a
/// single match always pick the lowest identifier.
#[derive(Debug, Clone, Serialize)]
pub struct Entity {
    pub id: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub name: String,
    pub entity_type: String,
    pub observations: Vec<Observation>,
}

/// A free-text fact owned by exactly one entity.
#[derive(Debug, Clone, Serialize)]
pub struct Observation {
    pub id: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub entity_id: i64,
    pub contents: String,
}

/// A directed, typed edge between two entities, by identifier.
#[derive(Debug, Clone, Serialize)]
pub struct Relation {
    pub id: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub relation_type: String,
    pub from_id: i64,
    pub to_id: i64,
}

/// Lightweight endpoint handle carried by resolved relations.
#[derive(Debug, Clone, Serialize)]
pub struct EntityRef {
    pub id: i64,
    pub name: String,
}

/// A relation with both endpoints eagerly resolved. Whole-graph reads
/// never lazy-load endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedRelation {
    pub id: i64,
    pub relation_type: String,
    pub from: EntityRef,
    pub to: EntityRef,
}

/// One consistent-enough snapshot of the whole graph.
///
/// Built from two independent reads, not one transaction; a relation may
/// reference an entity deleted between the two reads. Callers must not
/// assume cross-read consistency.
#[derive(Debug, Clone, Serialize)]
pub struct GraphSnapshot {
    pub entities: Vec<Entity>,
    pub relations: Vec<ResolvedRelation>,
}

/// Current time as epoch milliseconds, used to stamp new rows.
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
