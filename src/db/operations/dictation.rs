use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor};

use crate::db::operations::content::{map_word_brief, WordBrief};
use crate::services::skip_queue::SkipQueue;

/// Answer stored for skipped words.
pub const SKIPPED_ANSWER: &str = "[skipped]";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DictationSession {
    pub id: i64,
    pub word_list_id: i64,
    pub user_id: Option<String>,
    pub name: String,
    pub total_words: i64,
    pub completed_words: i64,
    pub correct_count: i64,
    pub wrong_count: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub is_completed: bool,
    pub skip_queue: SkipQueue,
}

impl DictationSession {
    pub fn duration_seconds(&self, now: DateTime<Utc>) -> i64 {
        let end = self.end_time.unwrap_or(now);
        (end - self.start_time).num_seconds().max(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DictationRecord {
    pub id: i64,
    pub session_id: i64,
    pub word_id: i64,
    pub user_answer: String,
    pub is_correct: bool,
    pub is_skip: bool,
    pub time_taken: i64,
    pub created_at: DateTime<Utc>,
    pub learning_record_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DictationRecordView {
    #[serde(flatten)]
    pub record: DictationRecord,
    pub word: WordBrief,
}

#[derive(Debug, Clone)]
pub struct NewDictationRecord<'a> {
    pub session_id: i64,
    pub word_id: i64,
    pub user_answer: &'a str,
    pub is_correct: bool,
    pub is_skip: bool,
    pub time_taken: i64,
}

const SESSION_COLUMNS: &str = r#""id","wordListId","userId","name","totalWords","completedWords","correctCount","wrongCount","startTime","endTime","isCompleted","skipQueue""#;
const RECORD_COLUMNS: &str = r#"r."id", r."sessionId", r."wordId", r."userAnswer", r."isCorrect", r."isSkip", r."timeTaken", r."createdAt", r."learningRecordId""#;

fn map_session(row: &SqliteRow) -> Result<DictationSession, sqlx::Error> {
    let skip_queue: String = row.try_get("skipQueue")?;
    Ok(DictationSession {
        id: row.try_get("id")?,
        word_list_id: row.try_get("wordListId")?,
        user_id: row.try_get("userId")?,
        name: row.try_get("name")?,
        total_words: row.try_get("totalWords")?,
        completed_words: row.try_get("completedWords")?,
        correct_count: row.try_get("correctCount")?,
        wrong_count: row.try_get("wrongCount")?,
        start_time: row.try_get("startTime")?,
        end_time: row.try_get("endTime")?,
        is_completed: row.try_get("isCompleted")?,
        skip_queue: SkipQueue::from_json(&skip_queue),
    })
}

fn map_record(row: &SqliteRow) -> Result<DictationRecord, sqlx::Error> {
    Ok(DictationRecord {
        id: row.try_get("id")?,
        session_id: row.try_get("sessionId")?,
        word_id: row.try_get("wordId")?,
        user_answer: row.try_get("userAnswer")?,
        is_correct: row.try_get("isCorrect")?,
        is_skip: row.try_get("isSkip")?,
        time_taken: row.try_get("timeTaken")?,
        created_at: row.try_get("createdAt")?,
        learning_record_id: row.try_get("learningRecordId")?,
    })
}

pub async fn insert_session(
    executor: impl SqliteExecutor<'_>,
    list_id: i64,
    user_id: Option<&str>,
    name: &str,
    total_words: i64,
    start_time: DateTime<Utc>,
) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO "dictation_sessions"
          ("wordListId","userId","name","totalWords","completedWords","correctCount","wrongCount","startTime","isCompleted","skipQueue")
        VALUES (?, ?, ?, ?, 0, 0, 0, ?, 0, '[]')
        "#,
    )
    .bind(list_id)
    .bind(user_id)
    .bind(name)
    .bind(total_words)
    .bind(start_time)
    .execute(executor)
    .await?;
    Ok(result.last_insert_rowid())
}

pub async fn get_session(
    executor: impl SqliteExecutor<'_>,
    session_id: i64,
) -> Result<Option<DictationSession>, sqlx::Error> {
    let sql = format!(r#"SELECT {SESSION_COLUMNS} FROM "dictation_sessions" WHERE "id" = ?"#);
    let row = sqlx::query(&sql)
        .bind(session_id)
        .fetch_optional(executor)
        .await?;
    row.as_ref().map(map_session).transpose()
}

/// Most recent completed sessions, optionally restricted to one owner.
pub async fn list_recent_completed(
    executor: impl SqliteExecutor<'_>,
    user_id: Option<&str>,
    limit: i64,
) -> Result<Vec<DictationSession>, sqlx::Error> {
    let sql = format!(
        r#"
        SELECT {SESSION_COLUMNS}
        FROM "dictation_sessions"
        WHERE "isCompleted" = 1 AND (? IS NULL OR "userId" = ?)
        ORDER BY "endTime" DESC, "id" DESC
        LIMIT ?
        "#
    );
    let rows = sqlx::query(&sql)
        .bind(user_id)
        .bind(user_id)
        .bind(limit)
        .fetch_all(executor)
        .await?;
    rows.iter().map(map_session).collect()
}

pub async fn insert_record(
    executor: impl SqliteExecutor<'_>,
    record: &NewDictationRecord<'_>,
    created_at: DateTime<Utc>,
) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO "dictation_records"
          ("sessionId","wordId","userAnswer","isCorrect","isSkip","timeTaken","createdAt")
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.session_id)
    .bind(record.word_id)
    .bind(record.user_answer)
    .bind(record.is_correct)
    .bind(record.is_skip)
    .bind(record.time_taken)
    .bind(created_at)
    .execute(executor)
    .await?;
    Ok(result.last_insert_rowid())
}

pub async fn link_learning_record(
    executor: impl SqliteExecutor<'_>,
    record_id: i64,
    learning_record_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(r#"UPDATE "dictation_records" SET "learningRecordId" = ? WHERE "id" = ?"#)
        .bind(learning_record_id)
        .bind(record_id)
        .execute(executor)
        .await?;
    Ok(())
}

/// Counts correct records for `word_id` in the session.
pub async fn count_correct_for_word(
    executor: impl SqliteExecutor<'_>,
    session_id: i64,
    word_id: i64,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM "dictation_records"
        WHERE "sessionId" = ? AND "wordId" = ? AND "isCorrect" = 1
        "#,
    )
    .bind(session_id)
    .bind(word_id)
    .fetch_one(executor)
    .await
}

pub async fn increment_correct(
    executor: impl SqliteExecutor<'_>,
    session_id: i64,
    first_correct_for_word: bool,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE "dictation_sessions"
        SET "correctCount" = "correctCount" + 1,
            "completedWords" = "completedWords" + ?
        WHERE "id" = ?
        "#,
    )
    .bind(if first_correct_for_word { 1_i64 } else { 0_i64 })
    .bind(session_id)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn increment_wrong(
    executor: impl SqliteExecutor<'_>,
    session_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(r#"UPDATE "dictation_sessions" SET "wrongCount" = "wrongCount" + 1 WHERE "id" = ?"#)
        .bind(session_id)
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn save_skip_queue(
    executor: impl SqliteExecutor<'_>,
    session_id: i64,
    queue: &SkipQueue,
) -> Result<(), sqlx::Error> {
    sqlx::query(r#"UPDATE "dictation_sessions" SET "skipQueue" = ? WHERE "id" = ?"#)
        .bind(queue.to_json())
        .bind(session_id)
        .execute(executor)
        .await?;
    Ok(())
}

/// Marks the session completed. Returns false when it already was.
pub async fn mark_completed(
    executor: impl SqliteExecutor<'_>,
    session_id: i64,
    end_time: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE "dictation_sessions"
        SET "isCompleted" = 1, "endTime" = ?
        WHERE "id" = ? AND "isCompleted" = 0
        "#,
    )
    .bind(end_time)
    .bind(session_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn list_session_records(
    executor: impl SqliteExecutor<'_>,
    session_id: i64,
) -> Result<Vec<DictationRecord>, sqlx::Error> {
    let sql = format!(
        r#"SELECT {RECORD_COLUMNS} FROM "dictation_records" r WHERE r."sessionId" = ? ORDER BY r."id" ASC"#
    );
    let rows = sqlx::query(&sql)
        .bind(session_id)
        .fetch_all(executor)
        .await?;
    rows.iter().map(map_record).collect()
}

pub async fn list_session_record_views(
    executor: impl SqliteExecutor<'_>,
    session_id: i64,
) -> Result<Vec<DictationRecordView>, sqlx::Error> {
    let sql = format!(
        r#"
        SELECT {RECORD_COLUMNS},
               w."id" AS "w_id", w."word" AS "w_word", w."phonetic" AS "w_phonetic",
               w."translation" AS "w_translation", w."difficulty" AS "w_difficulty"
        FROM "dictation_records" r
        JOIN "words" w ON w."id" = r."wordId"
        WHERE r."sessionId" = ?
        ORDER BY r."id" ASC
        "#
    );
    let rows = sqlx::query(&sql)
        .bind(session_id)
        .fetch_all(executor)
        .await?;
    rows.iter()
        .map(|row| {
            Ok(DictationRecordView {
                record: map_record(row)?,
                word: map_word_brief(row)?,
            })
        })
        .collect()
}

/// Every dictation attempt made in sessions owned by `user_id`.
pub async fn list_user_records(
    executor: impl SqliteExecutor<'_>,
    user_id: &str,
) -> Result<Vec<DictationRecord>, sqlx::Error> {
    let sql = format!(
        r#"
        SELECT {RECORD_COLUMNS}
        FROM "dictation_records" r
        JOIN "dictation_sessions" s ON s."id" = r."sessionId"
        WHERE s."userId" = ?
        ORDER BY r."createdAt" ASC, r."id" ASC
        "#
    );
    let rows = sqlx::query(&sql).bind(user_id).fetch_all(executor).await?;
    rows.iter().map(map_record).collect()
}
