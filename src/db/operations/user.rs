use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// A user row including the bcrypt hash. Never serialized.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

fn map_user(row: &SqliteRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        username: row.try_get("username")?,
        created_at: row.try_get("createdAt")?,
    })
}

pub async fn insert_user(
    executor: impl SqliteExecutor<'_>,
    id: &str,
    email: &str,
    username: &str,
    password_hash: &str,
    created_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO "users" ("id","email","username","passwordHash","createdAt")
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(id)
    .bind(email)
    .bind(username)
    .bind(password_hash)
    .bind(created_at)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn email_exists(
    executor: impl SqliteExecutor<'_>,
    email: &str,
) -> Result<bool, sqlx::Error> {
    let found: Option<i64> = sqlx::query_scalar(r#"SELECT 1 FROM "users" WHERE "email" = ? LIMIT 1"#)
        .bind(email)
        .fetch_optional(executor)
        .await?;
    Ok(found.is_some())
}

pub async fn get_user(
    executor: impl SqliteExecutor<'_>,
    user_id: &str,
) -> Result<Option<User>, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT "id","email","username","createdAt" FROM "users" WHERE "id" = ?"#,
    )
    .bind(user_id)
    .fetch_optional(executor)
    .await?;
    row.as_ref().map(map_user).transpose()
}

pub async fn get_credentials_by_email(
    executor: impl SqliteExecutor<'_>,
    email: &str,
) -> Result<Option<UserCredentials>, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT "id","email","username","passwordHash","createdAt" FROM "users" WHERE "email" = ?"#,
    )
    .bind(email)
    .fetch_optional(executor)
    .await?;
    row.map(|row| {
        Ok(UserCredentials {
            user: map_user(&row)?,
            password_hash: row.try_get("passwordHash")?,
        })
    })
    .transpose()
}

pub async fn insert_auth_session(
    executor: impl SqliteExecutor<'_>,
    id: &str,
    user_id: &str,
    token_hash: &str,
    expires_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO "auth_sessions" ("id","userId","token","expiresAt") VALUES (?, ?, ?, ?)"#,
    )
    .bind(id)
    .bind(user_id)
    .bind(token_hash)
    .bind(expires_at)
    .execute(executor)
    .await?;
    Ok(())
}

/// Resolves a token hash to its user when the session is still valid.
pub async fn find_session_user(
    executor: impl SqliteExecutor<'_>,
    token_hash: &str,
    now: DateTime<Utc>,
) -> Result<Option<User>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT u."id", u."email", u."username", u."createdAt"
        FROM "auth_sessions" s
        JOIN "users" u ON u."id" = s."userId"
        WHERE s."token" = ? AND s."expiresAt" > ?
        "#,
    )
    .bind(token_hash)
    .bind(now)
    .fetch_optional(executor)
    .await?;
    row.as_ref().map(map_user).transpose()
}

pub async fn delete_auth_session(
    executor: impl SqliteExecutor<'_>,
    token_hash: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(r#"DELETE FROM "auth_sessions" WHERE "token" = ?"#)
        .bind(token_hash)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_expired_sessions(
    executor: impl SqliteExecutor<'_>,
    now: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(r#"DELETE FROM "auth_sessions" WHERE "expiresAt" <= ?"#)
        .bind(now)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}
