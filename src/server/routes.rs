use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::server::AppState;
use crate::service::{
    self, EntitySpec, ObservationAdd, ObservationDelete, Outcome, RelationSpec,
};
use crate::Error;

#[derive(Deserialize)]
pub struct CreateEntitiesRequest {
    pub entities: Vec<EntitySpec>,
}

#[derive(Deserialize)]
pub struct DeleteEntitiesRequest {
    #[serde(rename = "entityNames")]
    pub entity_names: Vec<String>,
}

#[derive(Deserialize)]
pub struct AddObservationsRequest {
    pub observations: Vec<ObservationAdd>,
}

#[derive(Deserialize)]
pub struct DeleteObservationsRequest {
    pub deletions: Vec<ObservationDelete>,
}

#[derive(Deserialize)]
pub struct RelationsRequest {
    pub relations: Vec<RelationSpec>,
}

#[derive(Deserialize)]
pub struct SearchParams {
    pub query: String,
}

#[derive(Deserialize)]
pub struct OpenNodesParams {
    pub names: Option<String>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type Reply = Result<Json<serde_json::Value>, (StatusCode, Json<ErrorResponse>)>;

fn failure(e: Error) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &e {
        Error::NotFound => StatusCode::NOT_FOUND,
        Error::AlreadyExists(_) => StatusCode::CONFLICT,
        Error::Config(_) => StatusCode::BAD_REQUEST,
        Error::Connectivity(_) | Error::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorResponse { error: e.to_string() }))
}

fn entity_not_found(name: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: service::entity_not_found_message(name),
        }),
    )
}

pub async fn create_entities(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateEntitiesRequest>,
) -> Reply {
    let created = state
        .service
        .create_entities(request.entities)
        .await
        .map_err(failure)?;
    Ok(Json(serde_json::json!({ "entities": created })))
}

pub async fn delete_entities(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DeleteEntitiesRequest>,
) -> Reply {
    state
        .service
        .delete_entities(request.entity_names)
        .await
        .map_err(failure)?;
    Ok(Json(serde_json::json!({ "message": service::ENTITIES_DELETED })))
}

pub async fn read_graph(State(state): State<Arc<AppState>>) -> Reply {
    let graph = state.service.read_graph().await.map_err(failure)?;
    Ok(Json(serde_json::to_value(&graph).map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse { error: e.to_string() }),
        )
    })?))
}

pub async fn add_observations(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AddObservationsRequest>,
) -> Reply {
    match state
        .service
        .add_observations(request.observations)
        .await
        .map_err(failure)?
    {
        Outcome::Done(added) => Ok(Json(serde_json::json!({ "observations": added }))),
        Outcome::EntityNotFound(name) => Err(entity_not_found(&name)),
    }
}

pub async fn delete_observations(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DeleteObservationsRequest>,
) -> Reply {
    match state
        .service
        .delete_observations(request.deletions)
        .await
        .map_err(failure)?
    {
        Outcome::Done(()) => Ok(Json(
            serde_json::json!({ "message": service::OBSERVATIONS_DELETED }),
        )),
        Outcome::EntityNotFound(name) => Err(entity_not_found(&name)),
    }
}

pub async fn create_relations(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RelationsRequest>,
) -> Reply {
    match state
        .service
        .create_relations(request.relations)
        .await
        .map_err(failure)?
    {
        Outcome::Done(created) => Ok(Json(serde_json::json!({ "relations": created }))),
        Outcome::EntityNotFound(name) => Err(entity_not_found(&name)),
    }
}

pub async fn delete_relations(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RelationsRequest>,
) -> Reply {
    match state
        .service
        .delete_relations(request.relations)
        .await
        .map_err(failure)?
    {
        Outcome::Done(()) => Ok(Json(
            serde_json::json!({ "message": service::RELATIONS_DELETED }),
        )),
        Outcome::EntityNotFound(name) => Err(entity_not_found(&name)),
    }
}

pub async fn search_nodes(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Reply {
    let message = state.service.search_nodes(&params.query);
    Err((
        StatusCode::NOT_IMPLEMENTED,
        Json(ErrorResponse { error: message.to_string() }),
    ))
}

pub async fn open_nodes(
    State(state): State<Arc<AppState>>,
    Query(params): Query<OpenNodesParams>,
) -> Reply {
    let names: Vec<String> = params
        .names
        .unwrap_or_default()
        .split(',')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    let message = state.service.open_nodes(&names);
    Err((
        StatusCode::NOT_IMPLEMENTED,
        Json(ErrorResponse { error: message.to_string() }),
    ))
}
