use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::auth::{self, AuthError, AuthUser};
use crate::db::operations::user;
use crate::response::{ok, AppError, SuccessResponse};
use crate::routes::parse_json;
use crate::state::AppState;

const PASSWORD_SPECIAL_CHARS: &str = "!@#$%^&*()_-+=[]{};:'\",.<>/?\\|`~";

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    email: String,
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct AuthPayload {
    user: AuthUser,
    token: String,
}

#[derive(Debug, Serialize)]
struct MessagePayload {
    message: &'static str,
}

pub async fn register(State(state): State<AppState>, body: Bytes) -> Result<Response, AppError> {
    let req: RegisterRequest = parse_json(&body)?;
    let email = req.email.trim().to_lowercase();
    let username = req.username.trim();

    if !is_valid_email(&email) {
        return Err(AppError::validation("邮箱格式不正确"));
    }
    if username.is_empty() {
        return Err(AppError::validation("用户名不能为空"));
    }
    if let Some(message) = validate_register_password(&req.password) {
        return Err(AppError::validation(message));
    }

    let pool = state.db().pool();
    if user::email_exists(pool, &email).await.map_err(db_error)? {
        return Err(AppError::conflict("该邮箱已被注册"));
    }

    let password_hash = auth::hash_password(&req.password).map_err(auth_error)?;
    let user_id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now();
    user::insert_user(pool, &user_id, &email, username, &password_hash, now)
        .await
        .map_err(db_error)?;

    let user = user::get_user(pool, &user_id)
        .await
        .map_err(db_error)?
        .ok_or_else(|| AppError::internal("注册失败"))?;
    tracing::info!(user_id = %user.id, "user registered");

    let token = issue_session(&state, &user.id).await?;
    Ok(with_auth_cookie(
        &state,
        StatusCode::CREATED,
        AuthPayload { user: user.into(), token },
    ))
}

pub async fn login(State(state): State<AppState>, body: Bytes) -> Result<Response, AppError> {
    let req: LoginRequest = parse_json(&body)?;
    let email = req.email.trim().to_lowercase();
    if email.is_empty() || req.password.is_empty() {
        return Err(AppError::validation("邮箱和密码不能为空"));
    }

    let credentials = user::get_credentials_by_email(state.db().pool(), &email)
        .await
        .map_err(db_error)?
        .filter(|credentials| auth::verify_password(&req.password, &credentials.password_hash))
        .ok_or_else(|| AppError::unauthorized("邮箱或密码错误"))?;

    let token = issue_session(&state, &credentials.user.id).await?;
    tracing::info!(user_id = %credentials.user.id, "user logged in");

    Ok(with_auth_cookie(
        &state,
        StatusCode::OK,
        AuthPayload {
            user: credentials.user.into(),
            token,
        },
    ))
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, AppError> {
    if let Some(token) = auth::extract_token(&headers) {
        let removed = user::delete_auth_session(state.db().pool(), &auth::hash_token(&token))
            .await
            .map_err(db_error)?;
        tracing::debug!(removed, "auth session closed");
    }

    let mut response = ok(MessagePayload {
        message: "退出登录成功",
    })
    .into_response();
    if let Some(cookie) = clear_auth_cookie_header(state.config().production) {
        response.headers_mut().insert(header::SET_COOKIE, cookie);
    }
    Ok(response)
}

pub async fn me(Extension(user): Extension<AuthUser>) -> Json<SuccessResponse<AuthUser>> {
    ok(user)
}

async fn issue_session(state: &AppState, user_id: &str) -> Result<String, AppError> {
    let config = state.config();
    let (token, expires_at) =
        auth::sign_jwt_for_user(user_id, &config.jwt_secret, &config.jwt_expires_in).map_err(auth_error)?;

    let pool = state.db().pool();
    let pruned = user::delete_expired_sessions(pool, Utc::now()).await.map_err(db_error)?;
    if pruned > 0 {
        tracing::debug!(pruned, "expired auth sessions removed");
    }

    let session_id = uuid::Uuid::new_v4().to_string();
    user::insert_auth_session(pool, &session_id, user_id, &auth::hash_token(&token), expires_at)
        .await
        .map_err(db_error)?;
    Ok(token)
}

fn with_auth_cookie(state: &AppState, status: StatusCode, payload: AuthPayload) -> Response {
    let cookie = auth_cookie_header(
        &payload.token,
        &state.config().jwt_expires_in,
        state.config().production,
    );
    let mut response = (status, ok(payload)).into_response();
    if let Some(cookie) = cookie {
        response.headers_mut().insert(header::SET_COOKIE, cookie);
    }
    response
}

fn auth_cookie_header(token: &str, expires_in: &str, secure: bool) -> Option<HeaderValue> {
    let max_age = auth::parse_expires_in_ms(expires_in)
        .map(|ms| ms / 1000)
        .unwrap_or(86400);

    let mut cookie = format!(
        "{}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}",
        auth::AUTH_COOKIE_NAME
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).ok()
}

fn clear_auth_cookie_header(secure: bool) -> Option<HeaderValue> {
    let mut cookie = format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Max-Age=0",
        auth::AUTH_COOKIE_NAME
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).ok()
}

fn is_valid_email(value: &str) -> bool {
    if value.is_empty() || value.contains(' ') {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

fn validate_register_password(password: &str) -> Option<&'static str> {
    if password.chars().count() < 10 {
        return Some("密码长度至少为10个字符");
    }

    let has_letter = password.chars().any(|ch| ch.is_ascii_alphabetic());
    let has_digit = password.chars().any(|ch| ch.is_ascii_digit());
    let has_special = password.chars().any(|ch| PASSWORD_SPECIAL_CHARS.contains(ch));

    if has_letter && has_digit && has_special {
        None
    } else {
        Some("密码需包含字母、数字和特殊符号")
    }
}

fn db_error(err: sqlx::Error) -> AppError {
    tracing::error!(error = %err, "auth query failed");
    AppError::internal("数据库操作失败")
}

fn auth_error(err: AuthError) -> AppError {
    match err {
        AuthError::Database(err) => db_error(err),
        other => {
            tracing::error!(error = %other, "token issuance failed");
            AppError::internal("认证服务异常")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape() {
        assert!(is_valid_email("learner@example.com"));
        assert!(!is_valid_email("learner@localhost"));
        assert!(!is_valid_email("no-at-sign.com"));
        assert!(!is_valid_email("a b@example.com"));
    }

    #[test]
    fn password_rules() {
        assert_eq!(validate_register_password("short1!"), Some("密码长度至少为10个字符"));
        assert_eq!(
            validate_register_password("longenough123"),
            Some("密码需包含字母、数字和特殊符号")
        );
        assert_eq!(validate_register_password("Dictation#2024"), None);
    }

    #[test]
    fn cookie_carries_max_age_from_expiry() {
        let cookie = auth_cookie_header("tok", "2h", false).unwrap();
        let cookie = cookie.to_str().unwrap();
        assert!(cookie.starts_with("auth_token=tok;"));
        assert!(cookie.contains("Max-Age=7200"));
        assert!(!cookie.contains("Secure"));

        let cleared = clear_auth_cookie_header(true).unwrap();
        assert!(cleared.to_str().unwrap().ends_with("; Secure"));
    }
}
