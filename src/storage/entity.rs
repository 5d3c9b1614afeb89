//! Entity operations: create, name lookup, whole-table read and the
//! transactional cascade delete.

use sqlx::Row;

use crate::config::BackendKind;
use crate::model::{now_millis, Entity, Observation};
use crate::{Error, Result};

use super::Store;

const INSERT: &str = "INSERT INTO entities (created_at, updated_at, name, type) VALUES (?, ?, ?, ?)";
const SELECT: &str = "SELECT id, created_at, updated_at, name, type FROM entities";

impl Store {
    /// Insert a new entity row. The identifier and timestamps are
    /// server-assigned; no uniqueness check is made here.
    pub async fn create_entity(&self, name: &str, entity_type: &str) -> Result<Entity> {
        let now = now_millis();
        let id = if self.backend() == BackendKind::Mysql {
            let res = sqlx::query(&self.sql(INSERT))
                .bind(now)
                .bind(now)
                .bind(name)
                .bind(entity_type)
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
                .bind(name)
                .bind(entity_type)
                .fetch_one(self.pool())
                .await
                .map_err(|e| self.normalize(e))?;
            row.try_get(0).map_err(|e| self.normalize(e))?
        };

        tracing::debug!(id, name, entity_type, "created entity");
        Ok(Entity {
            id,
            created_at: now,
            updated_at: now,
            name: name.to_string(),
            entity_type: entity_type.to_string(),
            observations: Vec::new(),
        })
    }

    /// Check-then-insert inside one transaction: fails with
    /// [`Error::AlreadyExists`] when an entity with this name is
    /// already present.
    pub async fn create_entity_unique(&self, name: &str, entity_type: &str) -> Result<Entity> {
        let mut tx = self.pool().begin().await.map_err(|e| self.normalize(e))?;

        let taken = sqlx::query(&self.sql("SELECT id FROM entities WHERE name = ? LIMIT 1"))
            .bind(name)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| self.normalize(e))?;
        if taken.is_some() {
            return Err(Error::AlreadyExists(format!("entity {name} already exists")));
        }

        let now = now_millis();
        let id = if self.backend() == BackendKind::Mysql {
            let res = sqlx::query(&self.sql(INSERT))
                .bind(now)
                .bind(now)
                .bind(name)
                .bind(entity_type)
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
                .bind(name)
                .bind(entity_type)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| self.normalize(e))?;
            row.try_get(0).map_err(|e| self.normalize(e))?
        };

        tx.commit().await.map_err(|e| self.normalize(e))?;

        tracing::debug!(id, name, entity_type, "created entity");
        Ok(Entity {
            id,
            created_at: now,
            updated_at: now,
            name: name.to_string(),
            entity_type: entity_type.to_string(),
            observations: Vec::new(),
        })
    }

    /// Single-row lookup by name, observations attached.
    ///
    /// Nothing constrains names unique, so when duplicates exist the
    /// lowest identifier wins; the ordering makes that deterministic
    /// rather than backend row order.
    pub async fn read_entity_by_name(&self, name: &str) -> Result<Entity> {
        let sql = self.sql(&format!("{SELECT} WHERE name = ? ORDER BY id ASC LIMIT 1"));
        let row = sqlx::query(&sql)
            .bind(name)
            .fetch_one(self.pool())
            .await
            .map_err(|e| self.normalize(e))?;
        let mut entity = self.entity_from_row(&row)?;
        entity.observations = self.read_observations_for_entity(entity.id).await?;
        Ok(entity)
    }

    /// Every entity with its observations, ordered by identifier
    /// ascending. This is the only read order the store guarantees.
    pub async fn read_all_entities(&self) -> Result<Vec<Entity>> {
        let rows = sqlx::query(&self.sql(&format!("{SELECT} ORDER BY id ASC")))
            .fetch_all(self.pool())
            .await
            .map_err(|e| self.normalize(e))?;

        let mut entities = Vec::with_capacity(rows.len());
        for row in &rows {
            entities.push(self.entity_from_row(row)?);
        }

        let mut by_entity = self.read_all_observations_grouped().await?;
        for entity in &mut entities {
            if let Some(observations) = by_entity.remove(&entity.id) {
                entity.observations = observations;
            }
        }
        Ok(entities)
    }

    /// Remove an entity and everything that references it as one
    /// atomic unit: relations at either endpoint, owned observations,
    /// then the entity row. Any failure rolls back all three steps, so
    /// partial cascade state is never observable.
    pub async fn delete_entity(&self, id: i64) -> Result<()> {
        let mut tx = self.pool().begin().await.map_err(|e| self.normalize(e))?;

        sqlx::query(&self.sql(super::relation::DELETE_FOR_ENTITY))
            .bind(id)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| self.normalize(e))?;

        sqlx::query(&self.sql(super::observation::DELETE_FOR_ENTITY))
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| self.normalize(e))?;

        sqlx::query(&self.sql("DELETE FROM entities WHERE id = ?"))
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| self.normalize(e))?;

        tx.commit().await.map_err(|e| self.normalize(e))?;
        tracing::debug!(id, "deleted entity with cascade");
        Ok(())
    }

    fn entity_from_row(&self, row: &sqlx::any::AnyRow) -> Result<Entity> {
        Ok(Entity {
            id: row.try_get("id").map_err(|e| self.normalize(e))?,
            created_at: row.try_get("created_at").map_err(|e| self.normalize(e))?,
            updated_at: row.try_get("updated_at").map_err(|e| self.normalize(e))?,
            name: row.try_get("name").map_err(|e| self.normalize(e))?,
            entity_type: row.try_get("type").map_err(|e| self.normalize(e))?,
            observations: Vec::new(),
        })
    }

    /// All observations keyed by owning entity, each group ordered by
    /// identifier ascending.
    async fn read_all_observations_grouped(
        &self,
    ) -> Result<std::collections::HashMap<i64, Vec<Observation>>> {
        let rows = sqlx::query(&self.sql(
            "SELECT id, created_at, updated_at, contents, entity_id FROM observations ORDER BY entity_id ASC, id ASC",
        ))
        .fetch_all(self.pool())
        .await
        .map_err(|e| self.normalize(e))?;

        let mut grouped: std::collections::HashMap<i64, Vec<Observation>> =
            std::collections::HashMap::new();
        for row in &rows {
            let observation = self.observation_from_row(row)?;
            grouped.entry(observation.entity_id).or_default().push(observation);
        }
        Ok(grouped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_entity_create_and_read_by_name() {
        let store = Store::connect_in_memory().await.unwrap();

        let alice = store.create_entity("Alice", "person").await.unwrap();
        store.create_observation(alice.id, "likes tea").await.unwrap();

        let read = store.read_entity_by_name("Alice").await.unwrap();
        assert_eq!(read.id, alice.id);
        assert_eq!(read.entity_type, "person");
        let texts: Vec<&str> = read.observations.iter().map(|o| o.contents.as_str()).collect();
        assert_eq!(texts, vec!["likes tea"]);
    }

    #[tokio::test]
    async fn test_read_by_name_not_found() {
        let store = Store::connect_in_memory().await.unwrap();
        let err = store.read_entity_by_name("nobody").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_duplicate_names_resolve_to_lowest_id() {
        let store = Store::connect_in_memory().await.unwrap();

        let first = store.create_entity("Alice", "person").await.unwrap();
        let second = store.create_entity("Alice", "robot").await.unwrap();
        assert!(second.id > first.id);

        let read = store.read_entity_by_name("Alice").await.unwrap();
        assert_eq!(read.id, first.id);
        assert_eq!(read.entity_type, "person");
    }

    #[tokio::test]
    async fn test_create_entity_unique_rejects_duplicate() {
        let store = Store::connect_in_memory().await.unwrap();

        store.create_entity_unique("Alice", "person").await.unwrap();
        let err = store.create_entity_unique("Alice", "person").await.unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_read_all_entities_ordered_with_observations() {
        let store = Store::connect_in_memory().await.unwrap();

        let a = store.create_entity("a", "t").await.unwrap();
        let b = store.create_entity("b", "t").await.unwrap();
        store.create_observation(b.id, "second").await.unwrap();
        store.create_observation(a.id, "first").await.unwrap();

        let all = store.read_all_entities().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, a.id);
        assert_eq!(all[1].id, b.id);
        assert_eq!(all[0].observations[0].contents, "first");
        assert_eq!(all[1].observations[0].contents, "second");
    }

    #[tokio::test]
    async fn test_cascade_delete_removes_owned_rows() {
        let store = Store::connect_in_memory().await.unwrap();

        let alice = store.create_entity("Alice", "person").await.unwrap();
        let bob = store.create_entity("Bob", "person").await.unwrap();
        store.create_observation(alice.id, "likes tea").await.unwrap();
        store.create_relation(alice.id, bob.id, "knows").await.unwrap();
        store.create_relation(bob.id, alice.id, "works_with").await.unwrap();

        store.delete_entity(alice.id).await.unwrap();

        let entities = store.read_all_entities().await.unwrap();
        assert!(entities.iter().all(|e| e.id != alice.id));

        let relations = store.read_all_relations().await.unwrap();
        assert!(relations
            .iter()
            .all(|r| r.from.id != alice.id && r.to.id != alice.id));

        let err = store
            .read_observation_by_text(alice.id, "likes tea")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_cascade_scopes_like_standalone_deletes() {
        let store = Store::connect_in_memory().await.unwrap();

        let alice = store.create_entity("Alice", "person").await.unwrap();
        let bob = store.create_entity("Bob", "person").await.unwrap();
        let carol = store.create_entity("Carol", "person").await.unwrap();
        store.create_observation(alice.id, "gone").await.unwrap();
        store.create_observation(bob.id, "kept").await.unwrap();
        store.create_relation(alice.id, bob.id, "knows").await.unwrap();
        store.create_relation(bob.id, carol.id, "knows").await.unwrap();

        store.delete_entity(alice.id).await.unwrap();

        // Rows not touching the deleted entity survive the cascade,
        // the same scoping the standalone per-entity deletes have.
        let kept = store.read_observation_by_text(bob.id, "kept").await.unwrap();
        assert_eq!(kept.entity_id, bob.id);
        let relations = store.read_all_relations().await.unwrap();
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].from.id, bob.id);
        assert_eq!(relations[0].to.id, carol.id);
    }

    #[tokio::test]
    async fn test_delete_entity_is_idempotent_at_store_layer() {
        let store = Store::connect_in_memory().await.unwrap();
        let alice = store.create_entity("Alice", "person").await.unwrap();

        store.delete_entity(alice.id).await.unwrap();
        // Zero affected rows is not an error at this layer.
        store.delete_entity(alice.id).await.unwrap();
    }
}
