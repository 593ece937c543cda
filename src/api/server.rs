//! HTTP server for the world's read surface

use super::page::render_index;
use crate::error::Result;
use crate::simulation::RunFlag;
use crate::storage::MemoryStore;
use crate::types::{Event, Turn};
use axum::{
    extract::State,
    http::StatusCode,
    response::Html,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, sync::Arc};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Events returned by `/api/events`
const API_EVENT_LIMIT: usize = 50;

/// Events shown on the index page
const PAGE_EVENT_LIMIT: usize = 100;

/// Public shape of one event in the JSON feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventView {
    pub turn: Turn,
    pub character: String,
    pub narration: String,
    pub time: String,
}

impl From<Event> for EventView {
    fn from(event: Event) -> Self {
        Self {
            turn: event.turn,
            character: event.character,
            narration: event.narration,
            time: event.timestamp.to_rfc3339(),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub turn: Turn,
}

#[derive(Clone)]
struct AppState {
    store: Arc<dyn MemoryStore>,
}

/// API server
pub struct ApiServer {
    addr: SocketAddr,
    store: Arc<dyn MemoryStore>,
}

impl ApiServer {
    pub fn new(addr: SocketAddr, store: Arc<dyn MemoryStore>) -> Self {
        Self { addr, store }
    }

    /// Build router
    pub fn router(&self) -> Router {
        let state = AppState {
            store: self.store.clone(),
        };

        Router::new()
            .route("/", get(index_handler))
            .route("/api/events", get(events_handler))
            .route("/health", get(health_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Serve until `flag` is stopped
    pub async fn serve(self, flag: RunFlag) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        info!("World viewer listening on http://{}", self.addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { flag.stopped().await })
            .await?;

        info!("World viewer stopped");
        Ok(())
    }
}

fn internal_error(context: &str, e: impl std::fmt::Display) -> StatusCode {
    error!("{}: {}", context, e);
    StatusCode::INTERNAL_SERVER_ERROR
}

/// Latest events, newest first
async fn events_handler(
    State(state): State<AppState>,
) -> std::result::Result<Json<Vec<EventView>>, StatusCode> {
    let events = state
        .store
        .recent_events(API_EVENT_LIMIT)
        .await
        .map_err(|e| internal_error("Failed to load events", e))?;

    Ok(Json(events.into_iter().rev().map(EventView::from).collect()))
}

/// Index page: recent events oldest first, every reflection, current turn
async fn index_handler(
    State(state): State<AppState>,
) -> std::result::Result<Html<String>, StatusCode> {
    let events = state
        .store
        .recent_events(PAGE_EVENT_LIMIT)
        .await
        .map_err(|e| internal_error("Failed to load events", e))?;
    let characters = state
        .store
        .characters()
        .await
        .map_err(|e| internal_error("Failed to load characters", e))?;
    let turn = state
        .store
        .current_turn()
        .await
        .map_err(|e| internal_error("Failed to load current turn", e))?;

    Ok(Html(render_index(&events, &characters, turn)))
}

async fn health_handler(
    State(state): State<AppState>,
) -> std::result::Result<Json<HealthResponse>, StatusCode> {
    let turn = state
        .store
        .current_turn()
        .await
        .map_err(|e| internal_error("Health check failed", e))?;

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        turn,
    }))
}
