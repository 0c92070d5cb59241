mod auth;
mod dictation;
mod health;
mod learning;
mod progress;
mod tts;
mod word_lists;
mod words;

use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Extension, Router};
use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::auth::AuthUser;
use crate::middleware::auth::{optional_auth, require_auth};
use crate::response::{json_error, AppError};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout));

    let open = Router::new()
        .route("/api/words", get(words::list).post(words::create))
        .route(
            "/api/words/:id",
            get(words::get).put(words::update).delete(words::remove),
        )
        .route("/api/word-lists", get(word_lists::list).post(word_lists::create))
        .route(
            "/api/word-lists/:id",
            get(word_lists::detail)
                .put(word_lists::update)
                .delete(word_lists::remove),
        )
        .route("/api/word-lists/:id/words", post(word_lists::add_word))
        .route(
            "/api/word-lists/:id/words/batch-remove",
            post(word_lists::batch_remove),
        )
        .route(
            "/api/word-lists/:id/words/:word_id",
            delete(word_lists::remove_word),
        )
        .route("/api/word-lists/:id/import", post(word_lists::import))
        .route("/api/dictation/sessions", post(dictation::start))
        .route("/api/dictation/sessions/recent", get(dictation::recent))
        .route("/api/dictation/sessions/:id/next", get(dictation::next_word))
        .route("/api/dictation/sessions/:id/answers", post(dictation::submit_answer))
        .route("/api/dictation/sessions/:id/skip", post(dictation::skip_word))
        .route("/api/dictation/sessions/:id/result", get(dictation::result))
        .route("/api/tts/voices", get(tts::voices))
        .route("/api/tts/synthesize", post(tts::synthesize))
        .route("/api/tts/word-lists/:id/generate", post(tts::generate_list))
        .route_layer(middleware::from_fn_with_state(state.clone(), optional_auth));

    let protected = Router::new()
        .route("/api/users/me", get(auth::me))
        .route(
            "/api/learning-records",
            get(learning::list_records).post(learning::upsert_record),
        )
        .route("/api/learning-records/due", get(learning::due_records))
        .route("/api/learning-records/:id/review", post(learning::review))
        .route("/api/review-plans", get(learning::list_plans).post(learning::create_plan))
        .route("/api/review-plans/:id/today", get(learning::plan_today))
        .route("/api/review-plans/:id/deactivate", post(learning::deactivate_plan))
        .route("/api/progress", get(progress::report))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .nest("/health", health::router())
        .merge(public)
        .merge(open)
        .merge(protected)
        .fallback(fallback_handler)
        .with_state(state)
}

/// Requester id for routes where identity is optional.
pub(crate) fn requester_id(user: &Option<Extension<AuthUser>>) -> Option<&str> {
    user.as_ref().map(|Extension(user)| user.id.as_str())
}

pub(crate) fn parse_id(raw: &str, what: &str) -> Result<i64, AppError> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::validation(format!("无效的{what}ID")))
}

/// Decodes a JSON request body into the shared error envelope on failure.
pub(crate) fn parse_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, AppError> {
    serde_json::from_slice(body).map_err(|err| {
        tracing::debug!(error = %err, "rejected request body");
        AppError::bad_request("无效的请求数据")
    })
}

async fn fallback_handler() -> Response {
    json_error(StatusCode::NOT_FOUND, "NOT_FOUND", "接口不存在").into_response()
}
