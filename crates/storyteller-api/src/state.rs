//! Shared application state.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use storyteller_core::clock::Clock;
use storyteller_core::generation::GenerationClient;
use storyteller_narrative::application::config::EngineConfig;
use storyteller_narrative::application::engine::{EngineHandle, StoryEngine};
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Client every story engine issues requests through.
    pub generation_client: Arc<dyn GenerationClient>,
    /// Clock that timestamps session events.
    pub clock: Arc<dyn Clock>,
    /// Settings for newly created engines.
    pub engine_config: EngineConfig,
    /// Running engines by story id. Entries are only removed by
    /// [`AppState::remove_story`]; an abandoned story keeps its engine alive.
    stories: Arc<RwLock<HashMap<Uuid, EngineHandle>>>,
}

impl AppState {
    /// Create new application state with no stories.
    #[must_use]
    pub fn new(
        generation_client: Arc<dyn GenerationClient>,
        clock: Arc<dyn Clock>,
        engine_config: EngineConfig,
    ) -> Self {
        Self {
            generation_client,
            clock,
            engine_config,
            stories: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Spawns an engine and registers it under a new story id.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Internal` if the registry lock is poisoned.
    pub fn create_story(&self) -> Result<(Uuid, EngineHandle), ApiError> {
        let story_id = Uuid::new_v4();
        let engine = StoryEngine::spawn(
            Arc::clone(&self.generation_client),
            self.engine_config.clone(),
            Arc::clone(&self.clock),
        );
        self.stories
            .write()
            .map_err(|e| ApiError::Internal(format!("story registry poisoned: {e}")))?
            .insert(story_id, engine.clone());
        info!(%story_id, "story created");
        Ok((story_id, engine))
    }

    /// Looks up a registered story.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::SessionNotFound` for an unknown id.
    pub fn story(&self, story_id: Uuid) -> Result<EngineHandle, ApiError> {
        self.stories
            .read()
            .map_err(|e| ApiError::Internal(format!("story registry poisoned: {e}")))?
            .get(&story_id)
            .cloned()
            .ok_or(ApiError::SessionNotFound(story_id))
    }

    /// Unregisters a story and stops its engine.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::SessionNotFound` for an unknown id.
    pub fn remove_story(&self, story_id: Uuid) -> Result<(), ApiError> {
        let engine = self
            .stories
            .write()
            .map_err(|e| ApiError::Internal(format!("story registry poisoned: {e}")))?
            .remove(&story_id)
            .ok_or(ApiError::SessionNotFound(story_id))?;
        engine.shutdown();
        info!(%story_id, "story removed");
        Ok(())
    }
}
