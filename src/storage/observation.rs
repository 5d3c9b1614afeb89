//! Observation operations, scoped to an owning entity.

use sqlx::Row;

use crate::config::BackendKind;
use crate::model::{now_millis, Observation};
use crate::{Error, Result};

use super::Store;

const INSERT: &str =
    "INSERT INTO observations (created_at, updated_at, contents, entity_id) VALUES (?, ?, ?, ?)";

/// Shared with the entity cascade so the standalone op and the cascade
/// always delete the same rows.
pub(crate) const DELETE_FOR_ENTITY: &str = "DELETE FROM observations WHERE entity_id = ?";

impl Store {
    /// Insert an observation for an already-resolved entity id. Whether
    /// the entity actually exists is the caller's problem; the service
    /// layer resolves the entity first.
    pub async fn create_observation(&self, entity_id: i64, contents: &str) -> Result<Observation> {
        let now = now_millis();
        let id = if self.backend() == BackendKind::Mysql {
            let res = sqlx::query(&self.sql(INSERT))
                .bind(now)
                .bind(now)
                .bind(contents)
                .bind(entity_id)
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
                .bind(contents)
                .bind(entity_id)
                .fetch_one(self.pool())
                .await
                .map_err(|e| self.normalize(e))?;
            row.try_get(0).map_err(|e| self.normalize(e))?
        };

        tracing::debug!(id, entity_id, "created observation");
        Ok(Observation {
            id,
            created_at: now,
            updated_at: now,
            entity_id,
            contents: contents.to_string(),
        })
    }

    /// Exact text match scoped to one entity. Duplicate texts are legal;
    /// the lowest identifier wins deterministically.
    pub async fn read_observation_by_text(&self, entity_id: i64, text: &str) -> Result<Observation> {
        let row = sqlx::query(&self.sql(
            "SELECT id, created_at, updated_at, contents, entity_id FROM observations \
             WHERE contents = ? AND entity_id = ? ORDER BY id ASC LIMIT 1",
        ))
        .bind(text)
        .bind(entity_id)
        .fetch_one(self.pool())
        .await
        .map_err(|e| self.normalize(e))?;
        self.observation_from_row(&row)
    }

    /// Delete by identifier. Zero affected rows is success, not an
    /// error; NotFound only ever comes from the lookup that produced
    /// the row.
    pub async fn delete_observation(&self, id: i64) -> Result<()> {
        sqlx::query(&self.sql("DELETE FROM observations WHERE id = ?"))
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(|e| self.normalize(e))?;
        tracing::debug!(id, "deleted observation");
        Ok(())
    }

    /// Bulk delete of everything an entity owns. Used by the cascade
    /// and reusable standalone.
    pub async fn delete_observations_for_entity(&self, entity_id: i64) -> Result<()> {
        sqlx::query(&self.sql(DELETE_FOR_ENTITY))
            .bind(entity_id)
            .execute(self.pool())
            .await
            .map_err(|e| self.normalize(e))?;
        Ok(())
    }

    /// Observations owned by one entity, ordered by identifier.
    pub(crate) async fn read_observations_for_entity(
        &self,
        entity_id: i64,
    ) -> Result<Vec<Observation>> {
        let rows = sqlx::query(&self.sql(
            "SELECT id, created_at, updated_at, contents, entity_id FROM observations \
             WHERE entity_id = ? ORDER BY id ASC",
        ))
        .bind(entity_id)
        .fetch_all(self.pool())
        .await
        .map_err(|e| self.normalize(e))?;

        rows.iter().map(|row| self.observation_from_row(row)).collect()
    }

    pub(crate) fn observation_from_row(&self, row: &sqlx::any::AnyRow) -> Result<Observation> {
        Ok(Observation {
            id: row.try_get("id").map_err(|e| self.normalize(e))?,
            created_at: row.try_get("created_at").map_err(|e| self.normalize(e))?,
            updated_at: row.try_get("updated_at").map_err(|e| self.normalize(e))?,
            contents: row.try_get("contents").map_err(|e| self.normalize(e))?,
            entity_id: row.try_get("entity_id").map_err(|e| self.normalize(e))?,
        })
    }
}
