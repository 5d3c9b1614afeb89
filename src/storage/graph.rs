//! Whole-graph assembly.

use crate::model::GraphSnapshot;
use crate::Result;

use super::Store;

impl Store {
    /// Compose every entity (with observations) and every relation
    /// (with resolved endpoints) into one snapshot value.
    ///
    /// The snapshot is a join of two independently-read result sets,
    /// not a single isolated transaction: under concurrent writers a
    /// relation may reference an entity deleted between the two reads.
    /// That staleness is tolerated by contract in favor of read
    /// throughput.
    pub async fn read_full_graph(&self) -> Result<GraphSnapshot> {
        let entities = self.read_all_entities().await?;
        let relations = self.read_all_relations().await?;
        tracing::debug!(
            entities = entities.len(),
            relations = relations.len(),
            "assembled graph snapshot"
        );
        Ok(GraphSnapshot { entities, relations })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_full_graph_snapshot() {
        let store = Store::connect_in_memory().await.unwrap();

        let a = store.create_entity("A", "node").await.unwrap();
        let b = store.create_entity("B", "node").await.unwrap();
        store.create_observation(a.id, "first node").await.unwrap();
        store.create_relation(a.id, b.id, "knows").await.unwrap();

        let graph = store.read_full_graph().await.unwrap();
        assert_eq!(graph.entities.len(), 2);
        assert_eq!(graph.relations.len(), 1);
        assert_eq!(graph.entities[0].observations[0].contents, "first node");
        assert_eq!(graph.relations[0].from.name, "A");
    }

    #[tokio::test]
    async fn test_empty_graph_snapshot() {
        let store = Store::connect_in_memory().await.unwrap();
        let graph = store.read_full_graph().await.unwrap();
        assert!(graph.entities.is_empty());
        assert!(graph.relations.is_empty());
    }
}
