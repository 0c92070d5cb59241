use axum::extract::{Path, State};
use axum::response::IntoResponse;
use bytes::Bytes;

use crate::response::{created, ok, AppError};
use crate::routes::{parse_id, parse_json};
use crate::services::word_store::{self, WordInput, WordPatch};
use crate::state::AppState;

#[derive(serde::Serialize)]
struct Deleted {
    id: i64,
}

pub async fn list(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let words = word_store::list_words(state.db()).await?;
    Ok(ok(words))
}

pub async fn create(State(state): State<AppState>, body: Bytes) -> Result<impl IntoResponse, AppError> {
    let input: WordInput = parse_json(&body)?;
    let word = word_store::create_word(state.db(), input).await?;
    tracing::info!(word_id = word.id, "word created");
    Ok(created(word))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let word_id = parse_id(&id, "单词")?;
    Ok(ok(word_store::get_word(state.db(), word_id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let word_id = parse_id(&id, "单词")?;
    let patch: WordPatch = parse_json(&body)?;
    Ok(ok(word_store::update_word(state.db(), word_id, patch).await?))
}

pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let word_id = parse_id(&id, "单词")?;
    word_store::delete_word(state.db(), word_id).await?;
    Ok(ok(Deleted { id: word_id }))
}
