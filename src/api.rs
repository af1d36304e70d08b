//! HTTP surface (axum).
//!
//! JSON endpoints for figures and lookups, the Server-Sent Events trace, and
//! two HTML pages: the heroes gallery and the chat page driving the trace.

use crate::db::{self, Event as AuditEvent, HistoricalFigure};
use crate::enrich::{failure_message, Enricher, HeroAnswer};
use crate::error::{ServiceError, StoreError};
use crate::html::render_heroes_page;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Html, IntoResponse, Json, Response,
    },
    routing::{get, post},
    Router,
};
use futures_util::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub enricher: Arc<Enricher>,
}

impl AppState {
    pub fn new(enricher: Enricher) -> Self {
        Self {
            enricher: Arc::new(enricher),
        }
    }
}

/// Error body: `{"error": "..."}` with a matching status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn from_store(err: StoreError) -> Self {
        tracing::error!("Store error: {err}");
        match err {
            StoreError::NotFound(name) => {
                Self::new(StatusCode::NOT_FOUND, format!("Figure not found: {name}"))
            }
            other => Self::new(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        }
    }

    /// Map a lookup failure for `name` to a response.
    fn from_service(name: &str, err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidName(_) => {
                Self::new(StatusCode::BAD_REQUEST, "Query parameter 'name' must not be blank")
            }
            ServiceError::Store(store) => Self::from_store(store),
            other => {
                tracing::warn!(figure = name, "Lookup failed: {other}");
                Self::new(StatusCode::BAD_GATEWAY, failure_message(name, &other))
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct NameQuery {
    pub name: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Serialize)]
struct GenerateResponse {
    updated: Vec<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

/// GET /figures - every stored figure
async fn list_figures(
    State(state): State<AppState>,
) -> Result<Json<Vec<HistoricalFigure>>, ApiError> {
    let figures = state
        .enricher
        .store()
        .with_conn(db::get_all_figures)
        .map_err(ApiError::from_store)?;

    Ok(Json(figures))
}

/// GET /figures/:name
async fn get_figure(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<HistoricalFigure>, ApiError> {
    let figure = state
        .enricher
        .store()
        .with_conn(|conn| db::find_figure_by_name(conn, &name))
        .map_err(ApiError::from_store)?;

    figure
        .map(Json)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, format!("Figure not found: {name}")))
}

/// GET /figures/:name/events - audit trail, newest first
async fn get_figure_events(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Vec<AuditEvent>>, ApiError> {
    let events = state
        .enricher
        .store()
        .with_conn(|conn| db::get_events_for_entity(conn, "historical_figure", &name))
        .map_err(ApiError::from_store)?;

    Ok(Json(events))
}

/// GET /heroes - HTML gallery
async fn show_heroes(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    let figures = state
        .enricher
        .store()
        .with_conn(db::get_all_figures)
        .map_err(ApiError::from_store)?;

    Ok(Html(render_heroes_page(&figures)))
}

/// POST /generate_descriptions - upgrade every short description
async fn generate_descriptions(
    State(state): State<AppState>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let updated = state
        .enricher
        .generate_descriptions()
        .await
        .map_err(|e| ApiError::from_service("stored figures", e))?;

    Ok(Json(GenerateResponse { updated }))
}

/// GET /hero_details?name=...
async fn hero_details(
    State(state): State<AppState>,
    Query(query): Query<NameQuery>,
) -> Result<Json<HeroAnswer>, ApiError> {
    let answer = state
        .enricher
        .hero_details(&query.name)
        .await
        .map_err(|e| ApiError::from_service(&query.name, e))?;

    Ok(Json(answer))
}

/// GET /hero_trace?name=... - one SSE message per workflow step
async fn hero_trace(
    State(state): State<AppState>,
    Query(query): Query<NameQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.enricher.clone().spawn_trace(query.name);

    let events = stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        // SSE fields cannot carry carriage returns; newlines become extra data lines
        let data = event.message().replace('\r', "");
        Some((Ok::<_, Infallible>(Event::default().data(data)), rx))
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// GET /chat - chat page driving /hero_trace
async fn serve_chat() -> impl IntoResponse {
    Html(include_str!("../web/chat.html"))
}

// ============================================================================
// Router
// ============================================================================

pub fn router(state: AppState, static_dir: &str) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/figures", get(list_figures))
        .route("/figures/:name", get(get_figure))
        .route("/figures/:name/events", get(get_figure_events))
        .route("/heroes", get(show_heroes))
        .route("/generate_descriptions", post(generate_descriptions))
        .route("/hero_details", get(hero_details))
        .route("/hero_trace", get(hero_trace))
        .route("/chat", get(serve_chat))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
