use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::auth::{extract_token, verify_request_token, AuthError};
use crate::response::json_error;
use crate::state::AppState;

pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = extract_token(req.headers()) else {
        return json_error(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "未提供认证令牌").into_response();
    };

    match verify_request_token(state.db(), &state.config().jwt_secret, &token).await {
        Ok(user) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Err(AuthError::Database(err)) => {
            tracing::error!(error = %err, "token verification failed");
            json_error(StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", "数据库服务不可用")
                .into_response()
        }
        Err(_) => json_error(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "认证失败，请重新登录")
            .into_response(),
    }
}

/// Attaches the user when a valid token is present; anonymous otherwise.
pub async fn optional_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(token) = extract_token(req.headers()) {
        match verify_request_token(state.db(), &state.config().jwt_secret, &token).await {
            Ok(user) => {
                req.extensions_mut().insert(user);
            }
            Err(err) => tracing::debug!(error = %err, "ignoring invalid token on optional route"),
        }
    }

    next.run(req).await
}
