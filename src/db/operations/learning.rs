use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqliteExecutor};

use crate::db::operations::content::{map_word_brief, WordBrief};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LearningRecord {
    pub id: i64,
    pub word_id: i64,
    pub user_id: String,
    pub mastery_level: i64,
    pub review_count: i64,
    pub next_review_date: DateTime<Utc>,
    pub last_review_date: DateTime<Utc>,
    pub first_learn_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningRecordView {
    #[serde(flatten)]
    pub record: LearningRecord,
    pub word: WordBrief,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PlanType {
    New,
    Review,
}

impl PlanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::New => "NEW",
            PlanType::Review => "REVIEW",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "NEW" => Some(PlanType::New),
            "REVIEW" => Some(PlanType::Review),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewPlan {
    pub id: i64,
    pub user_id: String,
    pub word_list_id: i64,
    pub plan_type: PlanType,
    pub start_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
}

const RECORD_COLUMNS: &str = r#"lr."id", lr."wordId", lr."userId", lr."masteryLevel", lr."reviewCount", lr."nextReviewDate", lr."lastReviewDate", lr."firstLearnDate""#;
const WORD_BRIEF_COLUMNS: &str = r#"w."id" AS "w_id", w."word" AS "w_word", w."phonetic" AS "w_phonetic", w."translation" AS "w_translation", w."difficulty" AS "w_difficulty""#;

fn map_learning_record(row: &SqliteRow) -> Result<LearningRecord, sqlx::Error> {
    Ok(LearningRecord {
        id: row.try_get("id")?,
        word_id: row.try_get("wordId")?,
        user_id: row.try_get("userId")?,
        mastery_level: row.try_get("masteryLevel")?,
        review_count: row.try_get("reviewCount")?,
        next_review_date: row.try_get("nextReviewDate")?,
        last_review_date: row.try_get("lastReviewDate")?,
        first_learn_date: row.try_get("firstLearnDate")?,
    })
}

fn map_record_view(row: &SqliteRow) -> Result<LearningRecordView, sqlx::Error> {
    Ok(LearningRecordView {
        record: map_learning_record(row)?,
        word: map_word_brief(row)?,
    })
}

fn map_review_plan(row: &SqliteRow) -> Result<ReviewPlan, sqlx::Error> {
    let plan_type: String = row.try_get("planType")?;
    Ok(ReviewPlan {
        id: row.try_get("id")?,
        user_id: row.try_get("userId")?,
        word_list_id: row.try_get("wordListId")?,
        plan_type: PlanType::parse(&plan_type).unwrap_or(PlanType::Review),
        start_date: row.try_get("startDate")?,
        created_at: row.try_get("createdAt")?,
        is_active: row.try_get("isActive")?,
    })
}

/// Get-or-create for the `(word, user)` pair. A new record starts at
/// mastery 0, review count 0 and is due immediately. The flag reports
/// whether the row was created by this call.
pub async fn upsert_learning_record(
    conn: &mut SqliteConnection,
    word_id: i64,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<(LearningRecord, bool), sqlx::Error> {
    let inserted = sqlx::query(
        r#"
        INSERT INTO "learning_records"
          ("wordId","userId","masteryLevel","reviewCount","nextReviewDate","lastReviewDate","firstLearnDate")
        VALUES (?, ?, 0, 0, ?, ?, ?)
        ON CONFLICT ("wordId","userId") DO NOTHING
        "#,
    )
    .bind(word_id)
    .bind(user_id)
    .bind(now)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?
    .rows_affected()
        > 0;

    let sql = format!(
        r#"SELECT {RECORD_COLUMNS} FROM "learning_records" lr WHERE lr."wordId" = ? AND lr."userId" = ?"#
    );
    let row = sqlx::query(&sql)
        .bind(word_id)
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok((map_learning_record(&row)?, inserted))
}

pub async fn get_learning_record(
    executor: impl SqliteExecutor<'_>,
    record_id: i64,
) -> Result<Option<LearningRecord>, sqlx::Error> {
    let sql = format!(r#"SELECT {RECORD_COLUMNS} FROM "learning_records" lr WHERE lr."id" = ?"#);
    let row = sqlx::query(&sql)
        .bind(record_id)
        .fetch_optional(executor)
        .await?;
    row.as_ref().map(map_learning_record).transpose()
}

pub async fn save_learning_record(
    executor: impl SqliteExecutor<'_>,
    record: &LearningRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE "learning_records"
        SET "masteryLevel" = ?, "reviewCount" = ?, "nextReviewDate" = ?, "lastReviewDate" = ?
        WHERE "id" = ?
        "#,
    )
    .bind(record.mastery_level)
    .bind(record.review_count)
    .bind(record.next_review_date)
    .bind(record.last_review_date)
    .bind(record.id)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn list_user_records(
    executor: impl SqliteExecutor<'_>,
    user_id: &str,
) -> Result<Vec<LearningRecordView>, sqlx::Error> {
    let sql = format!(
        r#"
        SELECT {RECORD_COLUMNS}, {WORD_BRIEF_COLUMNS}
        FROM "learning_records" lr
        JOIN "words" w ON w."id" = lr."wordId"
        WHERE lr."userId" = ?
        ORDER BY lr."masteryLevel" DESC, lr."id" ASC
        "#
    );
    let rows = sqlx::query(&sql).bind(user_id).fetch_all(executor).await?;
    rows.iter().map(map_record_view).collect()
}

pub async fn list_due_records(
    executor: impl SqliteExecutor<'_>,
    user_id: &str,
    due_before: DateTime<Utc>,
) -> Result<Vec<LearningRecordView>, sqlx::Error> {
    let sql = format!(
        r#"
        SELECT {RECORD_COLUMNS}, {WORD_BRIEF_COLUMNS}
        FROM "learning_records" lr
        JOIN "words" w ON w."id" = lr."wordId"
        WHERE lr."userId" = ? AND lr."nextReviewDate" < ?
        ORDER BY lr."nextReviewDate" ASC, lr."id" ASC
        "#
    );
    let rows = sqlx::query(&sql)
        .bind(user_id)
        .bind(due_before)
        .fetch_all(executor)
        .await?;
    rows.iter().map(map_record_view).collect()
}

pub async fn list_due_records_for_list(
    executor: impl SqliteExecutor<'_>,
    user_id: &str,
    list_id: i64,
    due_before: DateTime<Utc>,
) -> Result<Vec<LearningRecordView>, sqlx::Error> {
    let sql = format!(
        r#"
        SELECT {RECORD_COLUMNS}, {WORD_BRIEF_COLUMNS}
        FROM "learning_records" lr
        JOIN "words" w ON w."id" = lr."wordId"
        JOIN "word_list_words" m ON m."wordId" = lr."wordId" AND m."wordListId" = ?
        WHERE lr."userId" = ? AND lr."nextReviewDate" < ?
        ORDER BY lr."nextReviewDate" ASC, lr."id" ASC
        "#
    );
    let rows = sqlx::query(&sql)
        .bind(list_id)
        .bind(user_id)
        .bind(due_before)
        .fetch_all(executor)
        .await?;
    rows.iter().map(map_record_view).collect()
}

pub async fn insert_review_plan(
    executor: impl SqliteExecutor<'_>,
    user_id: &str,
    list_id: i64,
    plan_type: PlanType,
    start_date: DateTime<Utc>,
) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO "review_plans" ("userId","wordListId","planType","startDate","createdAt","isActive")
        VALUES (?, ?, ?, ?, ?, 1)
        "#,
    )
    .bind(user_id)
    .bind(list_id)
    .bind(plan_type.as_str())
    .bind(start_date)
    .bind(Utc::now())
    .execute(executor)
    .await?;
    Ok(result.last_insert_rowid())
}

pub async fn get_review_plan(
    executor: impl SqliteExecutor<'_>,
    plan_id: i64,
) -> Result<Option<ReviewPlan>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT "id","userId","wordListId","planType","startDate","createdAt","isActive"
        FROM "review_plans" WHERE "id" = ?
        "#,
    )
    .bind(plan_id)
    .fetch_optional(executor)
    .await?;
    row.as_ref().map(map_review_plan).transpose()
}

pub async fn list_active_plans(
    executor: impl SqliteExecutor<'_>,
    user_id: &str,
) -> Result<Vec<ReviewPlan>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT "id","userId","wordListId","planType","startDate","createdAt","isActive"
        FROM "review_plans"
        WHERE "userId" = ? AND "isActive" = 1
        ORDER BY "createdAt" DESC, "id" DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(executor)
    .await?;
    rows.iter().map(map_review_plan).collect()
}

pub async fn deactivate_plan(
    executor: impl SqliteExecutor<'_>,
    plan_id: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(r#"UPDATE "review_plans" SET "isActive" = 0 WHERE "id" = ?"#)
        .bind(plan_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}
