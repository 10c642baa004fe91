//! Routes for interactive stories.
//!
//! Each story is one engine. Command routes reply with the snapshot taken
//! right after the command was applied; generated content arrives later and
//! is observed by polling `GET /{story_id}`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use storyteller_narrative::application::query_handlers::SessionView;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for the selection routes.
#[derive(Debug, Deserialize)]
pub struct SelectRequest {
    /// Position of the chosen option.
    pub index: usize,
}

/// Response body carrying a story snapshot.
#[derive(Debug, Serialize)]
pub struct StoryResponse {
    /// The story identifier. Stable across resets.
    pub story_id: Uuid,
    /// The current session snapshot.
    pub session: SessionView,
}

/// POST /
#[instrument(skip(state))]
async fn create_story(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<StoryResponse>), ApiError> {
    let (story_id, engine) = state.create_story()?;
    Ok((
        StatusCode::CREATED,
        Json(StoryResponse {
            story_id,
            session: engine.snapshot(),
        }),
    ))
}

/// GET /{story_id}
#[instrument(skip(state), fields(%story_id))]
async fn get_story(
    State(state): State<AppState>,
    Path(story_id): Path<Uuid>,
) -> Result<Json<StoryResponse>, ApiError> {
    let session = state.story(story_id)?.snapshot();
    Ok(Json(StoryResponse { story_id, session }))
}

/// POST /{story_id}/start
#[instrument(skip(state), fields(%story_id))]
async fn start_story(
    State(state): State<AppState>,
    Path(story_id): Path<Uuid>,
) -> Result<Json<StoryResponse>, ApiError> {
    let session = state.story(story_id)?.start().await?;
    info!(session_id = %session.session_id, "story started");
    Ok(Json(StoryResponse { story_id, session }))
}

/// POST /{story_id}/select-genre
#[instrument(skip(state, request), fields(%story_id, index = request.index))]
async fn select_genre(
    State(state): State<AppState>,
    Path(story_id): Path<Uuid>,
    Json(request): Json<SelectRequest>,
) -> Result<Json<StoryResponse>, ApiError> {
    let session = state.story(story_id)?.select_genre(request.index).await?;
    info!(session_id = %session.session_id, genre = ?session.genre, "genre selected");
    Ok(Json(StoryResponse { story_id, session }))
}

/// POST /{story_id}/select-option
#[instrument(skip(state, request), fields(%story_id, index = request.index))]
async fn select_option(
    State(state): State<AppState>,
    Path(story_id): Path<Uuid>,
    Json(request): Json<SelectRequest>,
) -> Result<Json<StoryResponse>, ApiError> {
    let session = state.story(story_id)?.select_option(request.index).await?;
    Ok(Json(StoryResponse { story_id, session }))
}

/// POST /{story_id}/retry
#[instrument(skip(state), fields(%story_id))]
async fn retry(
    State(state): State<AppState>,
    Path(story_id): Path<Uuid>,
) -> Result<Json<StoryResponse>, ApiError> {
    let session = state.story(story_id)?.retry().await?;
    Ok(Json(StoryResponse { story_id, session }))
}

/// POST /{story_id}/reset
#[instrument(skip(state), fields(%story_id))]
async fn reset(
    State(state): State<AppState>,
    Path(story_id): Path<Uuid>,
) -> Result<Json<StoryResponse>, ApiError> {
    let session = state.story(story_id)?.reset().await?;
    info!(session_id = %session.session_id, "story reset");
    Ok(Json(StoryResponse { story_id, session }))
}

/// GET /{story_id}/transcript
#[instrument(skip(state), fields(%story_id))]
async fn transcript(
    State(state): State<AppState>,
    Path(story_id): Path<Uuid>,
) -> Result<String, ApiError> {
    Ok(state.story(story_id)?.transcript().await?)
}

/// DELETE /{story_id}
#[instrument(skip(state), fields(%story_id))]
async fn delete_story(
    State(state): State<AppState>,
    Path(story_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.remove_story(story_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Returns the router for stories.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_story))
        .route("/{story_id}", get(get_story).delete(delete_story))
        .route("/{story_id}/start", post(start_story))
        .route("/{story_id}/select-genre", post(select_genre))
        .route("/{story_id}/select-option", post(select_option))
        .route("/{story_id}/retry", post(retry))
        .route("/{story_id}/reset", post(reset))
        .route("/{story_id}/transcript", get(transcript))
}
