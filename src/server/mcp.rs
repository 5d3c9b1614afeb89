use async_trait::async_trait;
use mcp_sdk_rs::error::Error;
use mcp_sdk_rs::error::ErrorCode;
use mcp_sdk_rs::server::{Server, ServerHandler};
use mcp_sdk_rs::transport::stdio::StdioTransport;
use mcp_sdk_rs::types::{
    ClientCapabilities, Implementation, ListToolsResult, ServerCapabilities, Tool, ToolResult,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use crate::service::{
    self, EntitySpec, ObservationAdd, ObservationDelete, Outcome, RelationSpec, Service,
};

#[derive(Deserialize)]
struct CallToolRequest {
    name: String,
    arguments: Option<Value>,
}

#[derive(Deserialize)]
struct EntitiesArgs {
    entities: Vec<EntitySpec>,
}

#[derive(Deserialize)]
struct EntityNamesArgs {
    #[serde(rename = "entityNames")]
    entity_names: Vec<String>,
}

#[derive(Deserialize)]
struct AddObservationsArgs {
    observations: Vec<ObservationAdd>,
}

#[derive(Deserialize)]
struct DeleteObservationsArgs {
    deletions: Vec<ObservationDelete>,
}

#[derive(Deserialize)]
struct RelationsArgs {
    relations: Vec<RelationSpec>,
}

#[derive(Deserialize)]
struct SearchArgs {
    query: String,
}

#[derive(Deserialize)]
struct OpenNodesArgs {
    names: Vec<String>,
}

pub struct McpService {
    service: Service,
}

impl McpService {
    pub fn new(service: Service) -> Self {
        Self { service }
    }

    pub async fn run_stdio(&self) -> anyhow::Result<()> {
        let (read_tx, read_rx) = mpsc::channel::<String>(32);
        let (write_tx, mut write_rx) = mpsc::channel::<String>(32);

        // Stdin reader
        tokio::spawn(async move {
            let stdin = tokio::io::stdin();
            let mut reader = BufReader::new(stdin).lines();
            while let Ok(Some(line)) = reader.next_line().await {
                if read_tx.send(line).await.is_err() {
                    break;
                }
            }
        });

        // Stdout writer
        tokio::spawn(async move {
            let mut stdout = tokio::io::stdout();
            while let Some(msg) = write_rx.recv().await {
                let _ = stdout.write_all(msg.as_bytes()).await;
                let _ = stdout.write_all(b"\n").await;
                let _ = stdout.flush().await;
            }
        });

        let transport = StdioTransport::new(read_rx, write_tx);
        let server = Server::new(Arc::new(transport), Arc::new(self.clone()));
        server.start().await?;
        Ok(())
    }
}

impl Clone for McpService {
    fn clone(&self) -> Self {
        Self { service: self.service.clone() }
    }
}

fn tool(name: &str, description: &str, schema: Value) -> Result<Tool, Error> {
    Ok(Tool {
        name: name.to_string(),
        description: description.to_string(),
        input_schema: serde_json::from_value(schema)
            .map_err(|e| Error::protocol(ErrorCode::ParseError, e.to_string()))?,
        annotations: None,
    })
}

fn parse_args<T: serde::de::DeserializeOwned>(arguments: Option<Value>) -> Result<T, Error> {
    serde_json::from_value(arguments.unwrap_or(serde_json::json!({})))
        .map_err(|e| Error::protocol(ErrorCode::InvalidParams, e.to_string()))
}

fn internal(e: crate::Error) -> Error {
    Error::protocol(ErrorCode::InternalError, e.to_string())
}

fn to_json(value: &impl serde::Serialize) -> Result<String, Error> {
    serde_json::to_string(value).map_err(|e| Error::protocol(ErrorCode::InternalError, e.to_string()))
}

#[async_trait]
impl ServerHandler for McpService {
    async fn initialize(
        &self,
        _implementation: Implementation,
        _capabilities: ClientCapabilities,
    ) -> Result<ServerCapabilities, Error> {
        Ok(ServerCapabilities::default())
    }

    async fn shutdown(&self) -> Result<(), Error> {
        Ok(())
    }

    async fn handle_method(&self, method: &str, params: Option<Value>) -> Result<Value, Error> {
        match method {
            "tools/list" => {
                let tools = vec![
                    tool(
                        "create_entities",
                        "Create multiple new entities in the knowledge graph",
                        serde_json::json!({
                            "type": "object",
                            "properties": {
                                "entities": {
                                    "type": "array",
                                    "items": {
                                        "type": "object",
                                        "properties": {
                                            "name": { "type": "string" },
                                            "entityType": { "type": "string" },
                                            "observations": {
                                                "type": "array",
                                                "items": { "type": "string" }
                                            }
                                        },
                                        "required": ["name", "entityType"]
                                    }
                                }
                            },
                            "required": ["entities"]
                        }),
                    )?,
                    tool(
                        "create_relations",
                        "Create multiple new relations between entities, in active voice",
                        serde_json::json!({
                            "type": "object",
                            "properties": {
                                "relations": {
                                    "type": "array",
                                    "items": {
                                        "type": "object",
                                        "properties": {
                                            "from": { "type": "string" },
                                            "to": { "type": "string" },
                                            "relationType": { "type": "string" }
                                        },
                                        "required": ["from", "to", "relationType"]
                                    }
                                }
                            },
                            "required": ["relations"]
                        }),
                    )?,
                    tool(
                        "add_observations",
                        "Add new observations to existing entities",
                        serde_json::json!({
                            "type": "object",
                            "properties": {
                                "observations": {
                                    "type": "array",
                                    "items": {
                                        "type": "object",
                                        "properties": {
                                            "entityName": { "type": "string" },
                                            "contents": {
                                                "type": "array",
                                                "items": { "type": "string" }
                                            }
                                        },
                                        "required": ["entityName", "contents"]
                                    }
                                }
                            },
                            "required": ["observations"]
                        }),
                    )?,
                    tool(
                        "delete_entities",
                        "Delete entities and their associated observations and relations",
                        serde_json::json!({
                            "type": "object",
                            "properties": {
                                "entityNames": {
                                    "type": "array",
                                    "items": { "type": "string" }
                                }
                            },
                            "required": ["entityNames"]
                        }),
                    )?,
                    tool(
                        "delete_observations",
                        "Delete specific observations from entities",
                        serde_json::json!({
                            "type": "object",
                            "properties": {
                                "deletions": {
                                    "type": "array",
                                    "items": {
                                        "type": "object",
                                        "properties": {
                                            "entityName": { "type": "string" },
                                            "observations": {
                                                "type": "array",
                                                "items": { "type": "string" }
                                            }
                                        },
                                        "required": ["entityName", "observations"]
                                    }
                                }
                            },
                            "required": ["deletions"]
                        }),
                    )?,
                    tool(
                        "delete_relations",
                        "Delete relations matched by exact from, to and type",
                        serde_json::json!({
                            "type": "object",
                            "properties": {
                                "relations": {
                                    "type": "array",
                                    "items": {
                                        "type": "object",
                                        "properties": {
                                            "from": { "type": "string" },
                                            "to": { "type": "string" },
                                            "relationType": { "type": "string" }
                                        },
                                        "required": ["from", "to", "relationType"]
                                    }
                                }
                            },
                            "required": ["relations"]
                        }),
                    )?,
                    tool(
                        "read_graph",
                        "Read the entire knowledge graph",
                        serde_json::json!({
                            "type": "object",
                            "properties": {}
                        }),
                    )?,
                    tool(
                        "search_nodes",
                        "Search for nodes matching a query",
                        serde_json::json!({
                            "type": "object",
                            "properties": {
                                "query": { "type": "string" }
                            },
                            "required": ["query"]
                        }),
                    )?,
                    tool(
                        "open_nodes",
                        "Open specific nodes by name",
                        serde_json::json!({
                            "type": "object",
                            "properties": {
                                "names": {
                                    "type": "array",
                                    "items": { "type": "string" }
                                }
                            },
                            "required": ["names"]
                        }),
                    )?,
                ];
                let result = ListToolsResult { tools, next_cursor: None };
                serde_json::to_value(result)
                    .map_err(|e| Error::protocol(ErrorCode::InternalError, e.to_string()))
            }
            "tools/call" => {
                let req: CallToolRequest = params
                    .and_then(|v| serde_json::from_value(v).ok())
                    .ok_or(Error::protocol(ErrorCode::InvalidParams, "Missing params"))?;

                let result_content = if req.name == "create_entities" {
                    let args: EntitiesArgs = parse_args(req.arguments)?;
                    let created = self
                        .service
                        .create_entities(args.entities)
                        .await
                        .map_err(internal)?;
                    to_json(&created)?
                } else if req.name == "create_relations" {
                    let args: RelationsArgs = parse_args(req.arguments)?;
                    match self
                        .service
                        .create_relations(args.relations)
                        .await
                        .map_err(internal)?
                    {
                        Outcome::Done(created) => to_json(&created)?,
                        Outcome::EntityNotFound(name) => service::entity_not_found_message(&name),
                    }
                } else if req.name == "add_observations" {
                    let args: AddObservationsArgs = parse_args(req.arguments)?;
                    match self
                        .service
                        .add_observations(args.observations)
                        .await
                        .map_err(internal)?
                    {
                        Outcome::Done(added) => to_json(&added)?,
                        Outcome::EntityNotFound(name) => service::entity_not_found_message(&name),
                    }
                } else if req.name == "delete_entities" {
                    let args: EntityNamesArgs = parse_args(req.arguments)?;
                    self.service
                        .delete_entities(args.entity_names)
                        .await
                        .map_err(internal)?;
                    service::ENTITIES_DELETED.to_string()
                } else if req.name == "delete_observations" {
                    let args: DeleteObservationsArgs = parse_args(req.arguments)?;
                    match self
                        .service
                        .delete_observations(args.deletions)
                        .await
                        .map_err(internal)?
                    {
                        Outcome::Done(()) => service::OBSERVATIONS_DELETED.to_string(),
                        Outcome::EntityNotFound(name) => service::entity_not_found_message(&name),
                    }
                } else if req.name == "delete_relations" {
                    let args: RelationsArgs = parse_args(req.arguments)?;
                    match self
                        .service
                        .delete_relations(args.relations)
                        .await
                        .map_err(internal)?
                    {
                        Outcome::Done(()) => service::RELATIONS_DELETED.to_string(),
                        Outcome::EntityNotFound(name) => service::entity_not_found_message(&name),
                    }
                } else if req.name == "read_graph" {
                    let graph = self.service.read_graph().await.map_err(internal)?;
                    to_json(&graph)?
                } else if req.name == "search_nodes" {
                    let args: SearchArgs = parse_args(req.arguments)?;
                    self.service.search_nodes(&args.query).to_string()
                } else if req.name == "open_nodes" {
                    let args: OpenNodesArgs = parse_args(req.arguments)?;
                    self.service.open_nodes(&args.names).to_string()
                } else {
                    return Err(Error::protocol(ErrorCode::MethodNotFound, req.name));
                };

                // Create common response format
                let result = ToolResult {
                    content: Vec::new(),
                    structured_content: Some(
                        serde_json::to_value(vec![serde_json::json!({
                            "type": "text",
                            "text": result_content
                        })])
                        .unwrap(),
                    ),
                };

                serde_json::to_value(result)
                    .map_err(|e| Error::protocol(ErrorCode::InternalError, e.to_string()))
            }
            _ => Err(Error::protocol(ErrorCode::MethodNotFound, method.to_string())),
        }
    }
}
