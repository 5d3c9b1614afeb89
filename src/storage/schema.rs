//! Database schema definitions, per backend dialect.
//!
//! One linear initial migration. The `ON DELETE CASCADE` clauses are a
//! safety net only; the application-level cascade in the entity store
//! is the source of truth and both paths produce identical end states.

use crate::config::BackendKind;

const SQLITE_ENTITIES: &str = r#"
CREATE TABLE IF NOT EXISTS entities (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at BIGINT NOT NULL,
    updated_at BIGINT NOT NULL,
    name TEXT NOT NULL,
    type TEXT NOT NULL
)
"#;

const SQLITE_OBSERVATIONS: &str = r#"
CREATE TABLE IF NOT EXISTS observations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at BIGINT NOT NULL,
    updated_at BIGINT NOT NULL,
    contents TEXT NOT NULL,
    entity_id BIGINT NOT NULL REFERENCES entities (id) ON DELETE CASCADE
)
"#;

const SQLITE_RELATIONS: &str = r#"
CREATE TABLE IF NOT EXISTS relations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at BIGINT NOT NULL,
    updated_at BIGINT NOT NULL,
    type TEXT NOT NULL,
    from_id BIGINT NOT NULL REFERENCES entities (id) ON DELETE CASCADE,
    to_id BIGINT NOT NULL REFERENCES entities (id) ON DELETE CASCADE
)
"#;

const POSTGRES_ENTITIES: &str = r#"
CREATE TABLE IF NOT EXISTS entities (
    id BIGSERIAL PRIMARY KEY,
    created_at BIGINT NOT NULL,
    updated_at BIGINT NOT NULL,
    name TEXT NOT NULL,
    type TEXT NOT NULL
)
"#;

const POSTGRES_OBSERVATIONS: &str = r#"
CREATE TABLE IF NOT EXISTS observations (
    id BIGSERIAL PRIMARY KEY,
    created_at BIGINT NOT NULL,
    updated_at BIGINT NOT NULL,
    contents TEXT NOT NULL,
    entity_id BIGINT NOT NULL REFERENCES entities (id) ON DELETE CASCADE
)
"#;

const POSTGRES_RELATIONS: &str = r#"
CREATE TABLE IF NOT EXISTS relations (
    id BIGSERIAL PRIMARY KEY,
    created_at BIGINT NOT NULL,
    updated_at BIGINT NOT NULL,
    type TEXT NOT NULL,
    from_id BIGINT NOT NULL REFERENCES entities (id) ON DELETE CASCADE,
    to_id BIGINT NOT NULL REFERENCES entities (id) ON DELETE CASCADE
)
"#;

// MySQL needs sized VARCHARs for indexed text columns.
const MYSQL_ENTITIES: &str = r#"
CREATE TABLE IF NOT EXISTS entities (
    id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
    created_at BIGINT NOT NULL,
    updated_at BIGINT NOT NULL,
    name VARCHAR(255) NOT NULL,
    type VARCHAR(255) NOT NULL
)
"#;

const MYSQL_OBSERVATIONS: &str = r#"
CREATE TABLE IF NOT EXISTS observations (
    id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
    created_at BIGINT NOT NULL,
    updated_at BIGINT NOT NULL,
    contents TEXT NOT NULL,
    entity_id BIGINT NOT NULL,
    FOREIGN KEY (entity_id) REFERENCES entities (id) ON DELETE CASCADE
)
"#;

const MYSQL_RELATIONS: &str = r#"
CREATE TABLE IF NOT EXISTS relations (
    id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
    created_at BIGINT NOT NULL,
    updated_at BIGINT NOT NULL,
    type VARCHAR(255) NOT NULL,
    from_id BIGINT NOT NULL,
    to_id BIGINT NOT NULL,
    FOREIGN KEY (from_id) REFERENCES entities (id) ON DELETE CASCADE,
    FOREIGN KEY (to_id) REFERENCES entities (id) ON DELETE CASCADE
)
"#;

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_entities_name ON entities (name)",
    "CREATE INDEX IF NOT EXISTS idx_observations_entity ON observations (entity_id)",
    "CREATE INDEX IF NOT EXISTS idx_relations_from ON relations (from_id)",
    "CREATE INDEX IF NOT EXISTS idx_relations_to ON relations (to_id)",
];

// MySQL has no CREATE INDEX IF NOT EXISTS; rely on table-creation order
// and tolerate duplicate-index errors at the migrate call site instead.
const MYSQL_INDEXES: &[&str] = &[
    "CREATE INDEX idx_entities_name ON entities (name)",
    "CREATE INDEX idx_observations_entity ON observations (entity_id)",
    "CREATE INDEX idx_relations_from ON relations (from_id)",
    "CREATE INDEX idx_relations_to ON relations (to_id)",
];

/// All schema statements for the given backend, in dependency order.
pub fn statements(backend: BackendKind) -> Vec<&'static str> {
    let (tables, indexes): (Vec<&'static str>, &[&str]) = match backend {
        BackendKind::Sqlite => (
            vec![SQLITE_ENTITIES, SQLITE_OBSERVATIONS, SQLITE_RELATIONS],
            INDEXES,
        ),
        BackendKind::Postgres => (
            vec![POSTGRES_ENTITIES, POSTGRES_OBSERVATIONS, POSTGRES_RELATIONS],
            INDEXES,
        ),
        BackendKind::Mysql => (
            vec![MYSQL_ENTITIES, MYSQL_OBSERVATIONS, MYSQL_RELATIONS],
            MYSQL_INDEXES,
        ),
    };

    let mut stmts = tables;
    stmts.extend(indexes.iter().copied());
    stmts
}
