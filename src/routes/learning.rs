use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Extension;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::db::operations::learning::PlanType;
use crate::response::{created, ok, AppError};
use crate::routes::{parse_id, parse_json};
use crate::services::learning;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertRequest {
    word_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReviewRequest {
    is_correct: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePlanRequest {
    word_list_id: i64,
    #[serde(default)]
    plan_type: Option<String>,
    #[serde(default)]
    start_date: Option<DateTime<Utc>>,
}

pub async fn list_records(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(learning::list_records(state.db(), &user.id).await?))
}

pub async fn upsert_record(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let req: UpsertRequest = parse_json(&body)?;
    let record = learning::upsert(state.db(), req.word_id, &user.id, Utc::now()).await?;
    Ok(ok(record))
}

pub async fn due_records(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(learning::today_due(state.db(), &user.id, Utc::now()).await?))
}

pub async fn review(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let record_id = parse_id(&id, "学习记录")?;
    let req: ReviewRequest = parse_json(&body)?;
    let record = learning::review(state.db(), record_id, &user.id, req.is_correct, Utc::now()).await?;
    Ok(ok(record))
}

pub async fn list_plans(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(learning::list_plans(state.db(), &user.id).await?))
}

pub async fn create_plan(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let req: CreatePlanRequest = parse_json(&body)?;
    let plan_type = match req.plan_type.as_deref() {
        None => PlanType::New,
        Some(raw) => PlanType::parse(raw).ok_or_else(|| AppError::validation("计划类型必须为 NEW 或 REVIEW"))?,
    };

    let plan = learning::create_plan(
        state.db(),
        &user.id,
        req.word_list_id,
        plan_type,
        req.start_date,
        Utc::now(),
    )
    .await?;
    Ok(created(plan))
}

pub async fn plan_today(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let plan_id = parse_id(&id, "计划")?;
    Ok(ok(learning::plan_today(state.db(), plan_id, &user.id, Utc::now()).await?))
}

pub async fn deactivate_plan(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let plan_id = parse_id(&id, "计划")?;
    Ok(ok(learning::deactivate_plan(state.db(), plan_id, &user.id).await?))
}
