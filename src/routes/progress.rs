use axum::extract::State;
use axum::response::IntoResponse;
use axum::Extension;
use chrono::Utc;

use crate::auth::AuthUser;
use crate::response::{ok, AppError};
use crate::services::progress;
use crate::state::AppState;

pub async fn report(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let report = progress::progress_report(state.db(), &user.id, Utc::now()).await?;
    Ok(ok(report))
}
