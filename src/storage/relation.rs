//! Relation operations: directed typed edges between two entities,
//! including the exact-tuple lookup deletion relies on.

use sqlx::Row;

use crate::config::BackendKind;
use crate::model::{now_millis, EntityRef, Relation, ResolvedRelation};
use crate::{Error, Result};

use super::Store;

const INSERT: &str =
    "INSERT INTO relations (created_at, updated_at, type, from_id, to_id) VALUES (?, ?, ?, ?, ?)";

/// Shared with the entity cascade so the standalone op and the cascade
/// always delete the same rows.
pub(crate) const DELETE_FOR_ENTITY: &str =
    "DELETE FROM relations WHERE from_id = ? OR to_id = ?";

impl Store {
    /// Insert an edge between two already-resolved entity ids. No
    /// duplicate check is made here.
    pub async fn create_relation(
        &self,
        from_id: i64,
        to_id: i64,
        relation_type: &str,
    ) -> Result<Relation> {
        let now = now_millis();
        let id = if self.backend() == BackendKind::Mysql {
            let res = sqlx::query(&self.sql(INSERT))
                .bind(now)
                .bind(now)
                .bind(relation_type)
                .bind(from_id)
                .bind(to_id)
                .execute(self.pool())
                .await
                .map_err(|e| self.normalize(e))?;
            res.last_insert_id()
                .ok_or_else(|| Error::Unknown("no insert id returned".to_string()))?
        } else {
            let sql = format!("{} RETURNING id", self.sql(INSERT));
            let row = sqlx::query(&sql)
                .bind(now)
                .bind(now)
                .bind(relation_type)
                .bind(from_id)
                .bind(to_id)
                .fetch_one(self.pool())
                .await
                .map_err(|e| self.normalize(e))?;
            row.try_get(0).map_err(|e| self.normalize(e))?
        };

        tracing::debug!(id, from_id, to_id, relation_type, "created relation");
        Ok(Relation {
            id,
            created_at: now,
            updated_at: now,
            relation_type: relation_type.to_string(),
            from_id,
            to_id,
        })
    }

    /// Check-then-insert inside one transaction on the (from, to, type)
    /// triple: fails with [`Error::AlreadyExists`] when the edge is
    /// already present.
    pub async fn create_relation_unique(
        &self,
        from_id: i64,
        to_id: i64,
        relation_type: &str,
    ) -> Result<Relation> {
        let mut tx = self.pool().begin().await.map_err(|e| self.normalize(e))?;

        let taken = sqlx::query(&self.sql(
            "SELECT id FROM relations WHERE from_id = ? AND to_id = ? AND type = ? LIMIT 1",
        ))
        .bind(from_id)
        .bind(to_id)
        .bind(relation_type)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| self.normalize(e))?;
        if taken.is_some() {
            return Err(Error::AlreadyExists(format!(
                "relation {from_id} -[{relation_type}]-> {to_id} already exists"
            )));
        }

        let now = now_millis();
        let id = if self.backend() == BackendKind::Mysql {
            let res = sqlx::query(&self.sql(INSERT))
                .bind(now)
                .bind(now)
                .bind(relation_type)
                .bind(from_id)
                .bind(to_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| self.normalize(e))?;
            res.last_insert_id()
                .ok_or_else(|| Error::Unknown("no insert id returned".to_string()))?
        } else {
            let sql = format!("{} RETURNING id", self.sql(INSERT));
            let row = sqlx::query(&sql)
                .bind(now)
                .bind(now)
                .bind(relation_type)
                .bind(from_id)
                .bind(to_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| self.normalize(e))?;
            row.try_get(0).map_err(|e| self.normalize(e))?
        };

        tx.commit().await.map_err(|e| self.normalize(e))?;
        Ok(Relation {
            id,
            created_at: now,
            updated_at: now,
            relation_type: relation_type.to_string(),
            from_id,
            to_id,
        })
    }

    /// Every relation with both endpoint entities resolved eagerly,
    /// ordered by identifier ascending.
    pub async fn read_all_relations(&self) -> Result<Vec<ResolvedRelation>> {
        let rows = sqlx::query(&self.sql(
            "SELECT r.id AS id, r.type AS type, \
                    r.from_id AS from_id, f.name AS from_name, \
                    r.to_id AS to_id, t.name AS to_name \
             FROM relations r \
             JOIN entities f ON f.id = r.from_id \
             JOIN entities t ON t.id = r.to_id \
             ORDER BY r.id ASC",
        ))
        .fetch_all(self.pool())
        .await
        .map_err(|e| self.normalize(e))?;

        let mut relations = Vec::with_capacity(rows.len());
        for row in &rows {
            relations.push(ResolvedRelation {
                id: row.try_get("id").map_err(|e| self.normalize(e))?,
                relation_type: row.try_get("type").map_err(|e| self.normalize(e))?,
                from: EntityRef {
                    id: row.try_get("from_id").map_err(|e| self.normalize(e))?,
                    name: row.try_get("from_name").map_err(|e| self.normalize(e))?,
                },
                to: EntityRef {
                    id: row.try_get("to_id").map_err(|e| self.normalize(e))?,
                    name: row.try_get("to_name").map_err(|e| self.normalize(e))?,
                },
            });
        }
        Ok(relations)
    }

    /// Exact triple match used by deletion. Nothing constrains the
    /// triple unique, so the lowest identifier wins deterministically
    /// when duplicates exist.
    pub async fn read_exact_relation(
        &self,
        from_id: i64,
        to_id: i64,
        relation_type: &str,
    ) -> Result<Relation> {
        let row = sqlx::query(&self.sql(
            "SELECT id, created_at, updated_at, type, from_id, to_id FROM relations \
             WHERE from_id = ? AND to_id = ? AND type = ? ORDER BY id ASC LIMIT 1",
        ))
        .bind(from_id)
        .bind(to_id)
        .bind(relation_type)
        .fetch_one(self.pool())
        .await
        .map_err(|e| self.normalize(e))?;
        self.relation_from_row(&row)
    }

    /// Delete by identifier. Zero affected rows is success.
    pub async fn delete_relation(&self, id: i64) -> Result<()> {
        sqlx::query(&self.sql("DELETE FROM relations WHERE id = ?"))
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(|e| self.normalize(e))?;
        tracing::debug!(id, "deleted relation");
        Ok(())
    }

    /// Remove every relation where the entity is source or target.
    /// Used by the cascade and reusable standalone.
    pub async fn delete_relations_for_entity(&self, entity_id: i64) -> Result<()> {
        sqlx::query(&self.sql(DELETE_FOR_ENTITY))
            .bind(entity_id)
            .bind(entity_id)
            .execute(self.pool())
            .await
            .map_err(|e| self.normalize(e))?;
        Ok(())
    }

    fn relation_from_row(&self, row: &sqlx::any::AnyRow) -> Result<Relation> {
        Ok(Relation {
            id: row.try_get("id").map_err(|e| self.normalize(e))?,
            created_at: row.try_get("created_at").map_err(|e| self.normalize(e))?,
            updated_at: row.try_get("updated_at").map_err(|e| self.normalize(e))?,
            relation_type: row.try_get("type").map_err(|e| self.normalize(e))?,
            from_id: row.try_get("from_id").map_err(|e| self.normalize(e))?,
            to_id: row.try_get("to_id").map_err(|e| self.normalize(e))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn two_entities(store: &Store) -> (i64, i64) {
        let a = store.create_entity("A", "node").await.unwrap();
        let b = store.create_entity("B", "node").await.unwrap();
        (a.id, b.id)
    }

    #[tokio::test]
    async fn test_exact_relation_roundtrip() {
        let store = Store::connect_in_memory().await.unwrap();
        let (a, b) = two_entities(&store).await;

        let created = store.create_relation(a, b, "works_with").await.unwrap();
        let read = store.read_exact_relation(a, b, "works_with").await.unwrap();
        assert_eq!(read.id, created.id);

        store.delete_relation(read.id).await.unwrap();
        let err = store.read_exact_relation(a, b, "works_with").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_exact_match_respects_direction_and_type() {
        let store = Store::connect_in_memory().await.unwrap();
        let (a, b) = two_entities(&store).await;
        store.create_relation(a, b, "knows").await.unwrap();

        assert!(store.read_exact_relation(b, a, "knows").await.unwrap_err().is_not_found());
        assert!(store.read_exact_relation(a, b, "likes").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_duplicate_triples_pick_lowest_id() {
        let store = Store::connect_in_memory().await.unwrap();
        let (a, b) = two_entities(&store).await;

        let first = store.create_relation(a, b, "knows").await.unwrap();
        let second = store.create_relation(a, b, "knows").await.unwrap();
        assert!(second.id > first.id);

        let read = store.read_exact_relation(a, b, "knows").await.unwrap();
        assert_eq!(read.id, first.id);
    }

    #[tokio::test]
    async fn test_create_relation_unique_rejects_duplicate() {
        let store = Store::connect_in_memory().await.unwrap();
        let (a, b) = two_entities(&store).await;

        store.create_relation_unique(a, b, "knows").await.unwrap();
        let err = store.create_relation_unique(a, b, "knows").await.unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));

        // Reverse direction is a different edge.
        store.create_relation_unique(b, a, "knows").await.unwrap();
    }

    #[tokio::test]
    async fn test_read_all_relations_resolves_endpoints() {
        let store = Store::connect_in_memory().await.unwrap();
        let (a, b) = two_entities(&store).await;
        store.create_relation(a, b, "knows").await.unwrap();

        let all = store.read_all_relations().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].from.name, "A");
        assert_eq!(all[0].to.name, "B");
        assert_eq!(all[0].relation_type, "knows");
    }

    #[tokio::test]
    async fn test_delete_relations_for_entity_covers_both_endpoints() {
        let store = Store::connect_in_memory().await.unwrap();
        let (a, b) = two_entities(&store).await;
        let c = store.create_entity("C", "node").await.unwrap().id;

        store.create_relation(a, b, "knows").await.unwrap();
        store.create_relation(b, a, "knows").await.unwrap();
        store.create_relation(b, c, "knows").await.unwrap();

        store.delete_relations_for_entity(a).await.unwrap();
        let all = store.read_all_relations().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].from.id, b);
        assert_eq!(all[0].to.id, c);
    }
}
