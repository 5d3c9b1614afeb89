//! The shared operation set behind both transports.
//!
//! MCP and HTTP are thin presentation adapters over this one service;
//! neither re-implements any orchestration. A lookup failure on a
//! caller-named entity is not a hard error here: it becomes an
//! [`Outcome::EntityNotFound`] that the adapters render as a friendly
//! response, which is the ergonomics an agent caller expects.

use serde::{Deserialize, Serialize};

use crate::storage::Store;
use crate::{Error, Result};

/// Confirmation strings shared verbatim by both transports.
pub const ENTITIES_DELETED: &str = "Entities deleted successfully";
pub const OBSERVATIONS_DELETED: &str = "Observations deleted successfully";
pub const RELATIONS_DELETED: &str = "Relations deleted successfully";
pub const SEARCH_NODES_STUB: &str = "Search Nodes not implemented yet";
pub const OPEN_NODES_STUB: &str = "Open Nodes not implemented yet";

/// The canonical user-facing message for a missing entity name.
pub fn entity_not_found_message(name: &str) -> String {
    format!("The entity {name} was not found")
}

/// An entity as it appears on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySpec {
    pub name: String,
    #[serde(rename = "entityType")]
    pub entity_type: String,
    #[serde(default)]
    pub observations: Vec<String>,
}

/// A relation as it appears on the wire, endpoints by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationSpec {
    pub from: String,
    pub to: String,
    #[serde(rename = "relationType")]
    pub relation_type: String,
}

/// Observations to add to one named entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationAdd {
    #[serde(rename = "entityName")]
    pub entity_name: String,
    pub contents: Vec<String>,
}

/// Observations actually added to one named entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddedObservations {
    #[serde(rename = "entityName")]
    pub entity_name: String,
    #[serde(rename = "addedObservations")]
    pub added_observations: Vec<String>,
}

/// Observations to delete from one named entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationDelete {
    #[serde(rename = "entityName")]
    pub entity_name: String,
    pub observations: Vec<String>,
}

/// The whole knowledge graph on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    pub entities: Vec<EntitySpec>,
    pub relations: Vec<RelationSpec>,
}

/// Result of an operation that may bail on an unresolvable entity name.
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    Done(T),
    EntityNotFound(String),
}

/// One service instance shared by every transport adapter.
#[derive(Clone)]
pub struct Service {
    store: Store,
}

impl Service {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Create entities and their initial observations. Duplicate names
    /// fail with [`Error::AlreadyExists`].
    pub async fn create_entities(&self, entities: Vec<EntitySpec>) -> Result<Vec<EntitySpec>> {
        let mut response = Vec::with_capacity(entities.len());
        for spec in entities {
            let entity = self
                .store
                .create_entity_unique(&spec.name, &spec.entity_type)
                .await?;

            let mut created = EntitySpec {
                name: entity.name,
                entity_type: entity.entity_type,
                observations: Vec::new(),
            };
            for contents in &spec.observations {
                let observation = self.store.create_observation(entity.id, contents).await?;
                created.observations.push(observation.contents);
            }
            response.push(created);
        }
        Ok(response)
    }

    /// Delete entities by name with full cascade. Unknown names are
    /// skipped; running this twice on the same name is safe.
    pub async fn delete_entities(&self, entity_names: Vec<String>) -> Result<()> {
        for name in entity_names {
            let entity = match self.store.read_entity_by_name(&name).await {
                Ok(entity) => entity,
                Err(Error::NotFound) => {
                    tracing::debug!(name, "entity not found, skipping delete");
                    continue;
                }
                Err(e) => return Err(e),
            };
            self.store.delete_entity(entity.id).await?;
        }
        Ok(())
    }

    /// Add observations to existing entities. An unresolvable name
    /// stops the operation before any row for it is written.
    pub async fn add_observations(
        &self,
        observations: Vec<ObservationAdd>,
    ) -> Result<Outcome<Vec<AddedObservations>>> {
        let mut response = Vec::with_capacity(observations.len());
        for add in observations {
            let entity = match self.store.read_entity_by_name(&add.entity_name).await {
                Ok(entity) => entity,
                Err(Error::NotFound) => return Ok(Outcome::EntityNotFound(add.entity_name)),
                Err(e) => return Err(e),
            };

            let mut added = AddedObservations {
                entity_name: add.entity_name,
                added_observations: Vec::with_capacity(add.contents.len()),
            };
            for contents in &add.contents {
                let observation = self.store.create_observation(entity.id, contents).await?;
                added.added_observations.push(observation.contents);
            }
            response.push(added);
        }
        Ok(Outcome::Done(response))
    }

    /// Delete observations by exact text. Missing observations are
    /// skipped silently; a missing entity name bails with the
    /// not-found outcome.
    pub async fn delete_observations(
        &self,
        deletions: Vec<ObservationDelete>,
    ) -> Result<Outcome<()>> {
        for deletion in deletions {
            let entity = match self.store.read_entity_by_name(&deletion.entity_name).await {
                Ok(entity) => entity,
                Err(Error::NotFound) => return Ok(Outcome::EntityNotFound(deletion.entity_name)),
                Err(e) => return Err(e),
            };

            for text in &deletion.observations {
                let observation = match self.store.read_observation_by_text(entity.id, text).await {
                    Ok(observation) => observation,
                    Err(Error::NotFound) => {
                        tracing::debug!(
                            entity = entity.name,
                            text,
                            "observation not found, skipping deletion"
                        );
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                self.store.delete_observation(observation.id).await?;
            }
        }
        Ok(Outcome::Done(()))
    }

    /// Create relations between pre-existing entities, endpoints
    /// resolved by name. Duplicate triples fail with
    /// [`Error::AlreadyExists`].
    pub async fn create_relations(
        &self,
        relations: Vec<RelationSpec>,
    ) -> Result<Outcome<Vec<RelationSpec>>> {
        let mut response = Vec::with_capacity(relations.len());
        for spec in relations {
            let (from, to) = match self.resolve_endpoints(&spec).await? {
                Outcome::Done(pair) => pair,
                Outcome::EntityNotFound(name) => return Ok(Outcome::EntityNotFound(name)),
            };

            let relation = self
                .store
                .create_relation_unique(from, to, &spec.relation_type)
                .await?;
            response.push(RelationSpec {
                from: spec.from,
                to: spec.to,
                relation_type: relation.relation_type,
            });
        }
        Ok(Outcome::Done(response))
    }

    /// Delete relations matched by the exact (from, to, type) triple.
    /// A missing endpoint name bails with the not-found outcome; a
    /// missing relation row is a hard [`Error::NotFound`].
    pub async fn delete_relations(&self, relations: Vec<RelationSpec>) -> Result<Outcome<()>> {
        for spec in relations {
            let (from, to) = match self.resolve_endpoints(&spec).await? {
                Outcome::Done(pair) => pair,
                Outcome::EntityNotFound(name) => return Ok(Outcome::EntityNotFound(name)),
            };

            let relation = self
                .store
                .read_exact_relation(from, to, &spec.relation_type)
                .await?;
            self.store.delete_relation(relation.id).await?;
        }
        Ok(Outcome::Done(()))
    }

    /// Read the whole graph as one wire-shaped snapshot.
    pub async fn read_graph(&self) -> Result<KnowledgeGraph> {
        let snapshot = self.store.read_full_graph().await?;

        let entities = snapshot
            .entities
            .into_iter()
            .map(|entity| EntitySpec {
                name: entity.name,
                entity_type: entity.entity_type,
                observations: entity
                    .observations
                    .into_iter()
                    .map(|o| o.contents)
                    .collect(),
            })
            .collect();

        let relations = snapshot
            .relations
            .into_iter()
            .map(|relation| RelationSpec {
                from: relation.from.name,
                to: relation.to.name,
                relation_type: relation.relation_type,
            })
            .collect();

        Ok(KnowledgeGraph { entities, relations })
    }

    /// Open extension point, intentionally unimplemented.
    pub fn search_nodes(&self, _query: &str) -> &'static str {
        SEARCH_NODES_STUB
    }

    /// Open extension point, intentionally unimplemented.
    pub fn open_nodes(&self, _names: &[String]) -> &'static str {
        OPEN_NODES_STUB
    }

    async fn resolve_endpoints(&self, spec: &RelationSpec) -> Result<Outcome<(i64, i64)>> {
        let from = match self.store.read_entity_by_name(&spec.from).await {
            Ok(entity) => entity.id,
            Err(Error::NotFound) => return Ok(Outcome::EntityNotFound(spec.from.clone())),
            Err(e) => return Err(e),
        };
        let to = match self.store.read_entity_by_name(&spec.to).await {
            Ok(entity) => entity.id,
            Err(Error::NotFound) => return Ok(Outcome::EntityNotFound(spec.to.clone())),
            Err(e) => return Err(e),
        };
        Ok(Outcome::Done((from, to)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn service() -> Service {
        Service::new(Store::connect_in_memory().await.unwrap())
    }

    fn entity(name: &str, entity_type: &str, observations: &[&str]) -> EntitySpec {
        EntitySpec {
            name: name.to_string(),
            entity_type: entity_type.to_string(),
            observations: observations.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn relation(from: &str, to: &str, relation_type: &str) -> RelationSpec {
        RelationSpec {
            from: from.to_string(),
            to: to.to_string(),
            relation_type: relation_type.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_entities_with_observations() {
        let svc = service().await;

        let created = svc
            .create_entities(vec![entity("Alice", "person", &["likes tea"])])
            .await
            .unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].observations, vec!["likes tea"]);

        let read = svc.store().read_entity_by_name("Alice").await.unwrap();
        let texts: Vec<&str> = read.observations.iter().map(|o| o.contents.as_str()).collect();
        assert_eq!(texts, vec!["likes tea"]);
    }

    #[tokio::test]
    async fn test_create_entities_rejects_duplicate_name() {
        let svc = service().await;
        svc.create_entities(vec![entity("Alice", "person", &[])]).await.unwrap();

        let err = svc
            .create_entities(vec![entity("Alice", "person", &[])])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_delete_entities_cascades_and_is_idempotent() {
        let svc = service().await;
        svc.create_entities(vec![
            entity("Alice", "person", &["likes tea"]),
            entity("Bob", "person", &[]),
        ])
        .await
        .unwrap();
        svc.create_relations(vec![relation("Alice", "Bob", "knows")]).await.unwrap();

        svc.delete_entities(vec!["Alice".to_string()]).await.unwrap();

        let graph = svc.read_graph().await.unwrap();
        assert!(graph.entities.iter().all(|e| e.name != "Alice"));
        assert!(graph.relations.is_empty());

        // Second pass skips at the lookup layer without corrupting state.
        svc.delete_entities(vec!["Alice".to_string()]).await.unwrap();
        assert_eq!(svc.read_graph().await.unwrap().entities.len(), 1);
    }

    #[tokio::test]
    async fn test_add_observations_unknown_entity_creates_nothing() {
        let svc = service().await;

        let outcome = svc
            .add_observations(vec![ObservationAdd {
                entity_name: "Ghost".to_string(),
                contents: vec!["boo".to_string()],
            }])
            .await
            .unwrap();
        match outcome {
            Outcome::EntityNotFound(name) => assert_eq!(name, "Ghost"),
            Outcome::Done(_) => panic!("expected not-found outcome"),
        }

        let graph = svc.read_graph().await.unwrap();
        assert!(graph.entities.is_empty());
    }

    #[tokio::test]
    async fn test_add_observations_appends() {
        let svc = service().await;
        svc.create_entities(vec![entity("Alice", "person", &["likes tea"])]).await.unwrap();

        let outcome = svc
            .add_observations(vec![ObservationAdd {
                entity_name: "Alice".to_string(),
                contents: vec!["drinks coffee too".to_string()],
            }])
            .await
            .unwrap();
        let added = match outcome {
            Outcome::Done(added) => added,
            Outcome::EntityNotFound(name) => panic!("unexpected not-found for {name}"),
        };
        assert_eq!(added[0].added_observations, vec!["drinks coffee too"]);

        let read = svc.store().read_entity_by_name("Alice").await.unwrap();
        assert_eq!(read.observations.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_missing_observation_is_confirmed_noop() {
        let svc = service().await;
        svc.create_entities(vec![entity("Alice", "person", &[])]).await.unwrap();

        let outcome = svc
            .delete_observations(vec![ObservationDelete {
                entity_name: "Alice".to_string(),
                observations: vec!["never existed".to_string()],
            }])
            .await
            .unwrap();
        assert!(matches!(outcome, Outcome::Done(())));
    }

    #[tokio::test]
    async fn test_relation_roundtrip_through_read_graph() {
        let svc = service().await;
        svc.create_entities(vec![entity("A", "node", &[]), entity("B", "node", &[])])
            .await
            .unwrap();

        svc.create_relations(vec![relation("A", "B", "knows")]).await.unwrap();

        let graph = svc.read_graph().await.unwrap();
        assert_eq!(graph.relations.len(), 1);
        assert_eq!(graph.relations[0].from, "A");
        assert_eq!(graph.relations[0].to, "B");
        assert_eq!(graph.relations[0].relation_type, "knows");
    }

    #[tokio::test]
    async fn test_delete_relations_names_missing_endpoint() {
        let svc = service().await;
        svc.create_entities(vec![entity("A", "node", &[])]).await.unwrap();

        let outcome = svc
            .delete_relations(vec![relation("A", "Missing", "knows")])
            .await
            .unwrap();
        match outcome {
            Outcome::EntityNotFound(name) => assert_eq!(name, "Missing"),
            Outcome::Done(_) => panic!("expected not-found outcome"),
        }
    }

    #[tokio::test]
    async fn test_delete_missing_relation_is_hard_not_found() {
        let svc = service().await;
        svc.create_entities(vec![entity("A", "node", &[]), entity("B", "node", &[])])
            .await
            .unwrap();

        let err = svc
            .delete_relations(vec![relation("A", "B", "knows")])
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_stubs() {
        let svc = service().await;
        assert_eq!(svc.search_nodes("anything"), SEARCH_NODES_STUB);
        assert_eq!(svc.open_nodes(&[]), OPEN_NODES_STUB);
    }
}
