use axum::{
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::service::Service;

pub mod mcp;
pub mod routes;

/// Server state
pub struct AppState {
    pub service: Service,
}

pub async fn start_server(bind: SocketAddr, service: Service) -> anyhow::Result<()> {
    let state = Arc::new(AppState { service });

    let api = Router::new()
        .route(
            "/entities",
            axum::routing::post(routes::create_entities).delete(routes::delete_entities),
        )
        .route("/graph", get(routes::read_graph))
        .route(
            "/observations",
            axum::routing::post(routes::add_observations).delete(routes::delete_observations),
        )
        .route(
            "/relations",
            axum::routing::post(routes::create_relations).delete(routes::delete_relations),
        )
        .route("/nodes", get(routes::open_nodes))
        .route("/nodes/search", get(routes::search_nodes));

    let app = Router::new()
        .nest("/api/v1", api)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    tracing::info!("Starting server on {}", bind);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
