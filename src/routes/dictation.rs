use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Extension;
use bytes::Bytes;
use chrono::Utc;
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::response::{created, ok, AppError};
use crate::routes::{parse_id, parse_json, requester_id};
use crate::services::dictation;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartRequest {
    word_list_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnswerRequest {
    word_id: i64,
    answer: String,
    #[serde(default)]
    time_taken: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SkipRequest {
    word_id: i64,
}

pub async fn start(
    State(state): State<AppState>,
    user: Option<Extension<AuthUser>>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let req: StartRequest = parse_json(&body)?;
    let session = dictation::start(state.db(), req.word_list_id, requester_id(&user), Utc::now()).await?;
    Ok(created(session))
}

pub async fn recent(
    State(state): State<AppState>,
    user: Option<Extension<AuthUser>>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(dictation::recent_sessions(state.db(), requester_id(&user)).await?))
}

/// May advance the session: queue pops and completion are persisted.
pub async fn next_word(
    State(state): State<AppState>,
    user: Option<Extension<AuthUser>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let session_id = parse_id(&id, "会话")?;
    let next = dictation::next_word(state.db(), session_id, requester_id(&user), Utc::now()).await?;
    Ok(ok(next))
}

pub async fn submit_answer(
    State(state): State<AppState>,
    user: Option<Extension<AuthUser>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let session_id = parse_id(&id, "会话")?;
    let req: AnswerRequest = parse_json(&body)?;
    let outcome = dictation::submit_answer(
        state.db(),
        session_id,
        req.word_id,
        &req.answer,
        req.time_taken,
        requester_id(&user),
        Utc::now(),
    )
    .await?;
    Ok(ok(outcome))
}

pub async fn skip_word(
    State(state): State<AppState>,
    user: Option<Extension<AuthUser>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let session_id = parse_id(&id, "会话")?;
    let req: SkipRequest = parse_json(&body)?;
    let outcome =
        dictation::skip_word(state.db(), session_id, req.word_id, requester_id(&user), Utc::now()).await?;
    Ok(ok(outcome))
}

pub async fn result(
    State(state): State<AppState>,
    user: Option<Extension<AuthUser>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let session_id = parse_id(&id, "会话")?;
    let result = dictation::get_result(state.db(), session_id, requester_id(&user), Utc::now()).await?;
    Ok(ok(result))
}
