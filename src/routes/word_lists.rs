use axum::extract::{Path, State};
use axum::response::IntoResponse;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::response::{created, ok, AppError};
use crate::routes::{parse_id, parse_json};
use crate::services::import;
use crate::services::word_store::{self, WordListPatch};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct CreateListRequest {
    name: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddWordRequest {
    word_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchRemoveRequest {
    #[serde(default)]
    word_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
struct ImportRequest {
    text: String,
}

#[derive(Serialize)]
struct Deleted {
    id: i64,
}

pub async fn list(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    Ok(ok(word_store::list_lists(state.db()).await?))
}

pub async fn create(State(state): State<AppState>, body: Bytes) -> Result<impl IntoResponse, AppError> {
    let req: CreateListRequest = parse_json(&body)?;
    let list = word_store::create_list(state.db(), &req.name, &req.description).await?;
    Ok(created(list))
}

pub async fn detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let list_id = parse_id(&id, "词书")?;
    Ok(ok(word_store::get_list_detail(state.db(), list_id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let list_id = parse_id(&id, "词书")?;
    let patch: WordListPatch = parse_json(&body)?;
    Ok(ok(word_store::update_list(state.db(), list_id, patch).await?))
}

pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let list_id = parse_id(&id, "词书")?;
    word_store::delete_list(state.db(), list_id).await?;
    Ok(ok(Deleted { id: list_id }))
}

pub async fn add_word(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let list_id = parse_id(&id, "词书")?;
    let req: AddWordRequest = parse_json(&body)?;
    let added = word_store::add_word_to_list(state.db(), list_id, req.word_id).await?;
    Ok(created(added))
}

pub async fn remove_word(
    State(state): State<AppState>,
    Path((id, word_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let list_id = parse_id(&id, "词书")?;
    let word_id = parse_id(&word_id, "单词")?;
    Ok(ok(word_store::remove_word_from_list(state.db(), list_id, word_id).await?))
}

pub async fn batch_remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let list_id = parse_id(&id, "词书")?;
    let req: BatchRemoveRequest = parse_json(&body)?;
    Ok(ok(word_store::batch_remove(state.db(), list_id, &req.word_ids).await?))
}

pub async fn import(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let list_id = parse_id(&id, "词书")?;
    let req: ImportRequest = parse_json(&body)?;
    let report = import::import_words(state.db(), list_id, &req.text).await?;
    Ok(ok(report))
}
