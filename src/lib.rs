pub mod auth;
pub mod config;
pub mod db;
pub mod logging;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;

use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Config;
use crate::db::{Database, DbInitError};
use crate::services::tts::{TtsConfig, TtsService};
use crate::state::AppState;

pub fn build_router(state: AppState) -> axum::Router {
    routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Opens the database named by `config` and wires the full application.
pub async fn create_app(config: Config) -> Result<(axum::Router, AppState), DbInitError> {
    let db = Database::open(&config.database_path).await?;
    let tts = TtsService::new(TtsConfig::from_env(config.audio_dir.clone()));
    let state = AppState::new(db, config, tts);
    Ok((build_router(state.clone()), state))
}
