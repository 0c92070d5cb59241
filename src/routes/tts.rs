use axum::extract::{Path, State};
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::response::{ok, AppError};
use crate::routes::{parse_id, parse_json};
use crate::services::tts::{self, SynthesisOptions, VoiceOption};
use crate::services::ServiceError;
use crate::state::AppState;

const MAX_TEXT_CHARS: usize = 500;

#[derive(Debug, Deserialize)]
struct SynthesizeRequest {
    text: String,
    #[serde(flatten)]
    options: SynthesisOptions,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoicesPayload {
    provider: &'static str,
    available: bool,
    voices: Vec<VoiceOption>,
}

pub async fn voices(State(state): State<AppState>) -> impl IntoResponse {
    let service = state.tts();
    ok(VoicesPayload {
        provider: service.config().provider.as_str(),
        available: service.is_available(),
        voices: service.voices(),
    })
}

pub async fn synthesize(State(state): State<AppState>, body: Bytes) -> Result<Response, AppError> {
    let req: SynthesizeRequest = parse_json(&body)?;
    let text = req.text.trim();
    if text.is_empty() {
        return Err(AppError::validation("文本不能为空"));
    }
    if text.chars().count() > MAX_TEXT_CHARS {
        return Err(AppError::validation(format!("文本长度不能超过{MAX_TEXT_CHARS}个字符")));
    }
    req.options.validate()?;

    let audio = state
        .tts()
        .synthesize(text, &req.options)
        .await
        .map_err(|err| {
            tracing::warn!(error = %err, "speech synthesis failed");
            ServiceError::from(err)
        })?;

    let mut response = Bytes::from(audio).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(req.options.content_type()),
    );
    Ok(response)
}

pub async fn generate_list(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let list_id = parse_id(&id, "词书")?;
    let options: SynthesisOptions = if body.is_empty() {
        SynthesisOptions::default()
    } else {
        parse_json(&body)?
    };
    let report = tts::generate_list_audio(state.db(), state.tts(), list_id, &options).await?;
    Ok(ok(report))
}
