//! Dictation session lifecycle.
//!
//! Every operation takes the requester explicitly (`None` for anonymous
//! callers). A session owned by a user is only usable by that user;
//! sessions started anonymously are open to everyone.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqliteConnection;

use crate::db::operations::content::{self, Word};
use crate::db::operations::dictation::{
    self as ops, DictationRecordView, DictationSession, NewDictationRecord, SKIPPED_ANSWER,
};
use crate::db::operations::learning::{self as learning_ops, LearningRecord};
use crate::db::Database;
use crate::services::mastery::update_mastery;
use crate::services::progress::{self, DifficultyStat};
use crate::services::selection::{self, Pick, PickSource};
use crate::services::{word_store, ServiceError, ServiceResult};

pub const RECENT_SESSION_LIMIT: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionProgress {
    pub completed: i64,
    pub total: i64,
    pub percentage: f64,
}

impl SessionProgress {
    fn of(session: &DictationSession) -> Self {
        Self {
            completed: session.completed_words,
            total: session.total_words,
            percentage: progress::percent(
                session.completed_words.max(0) as usize,
                session.total_words.max(0) as usize,
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextWord {
    pub session_id: i64,
    pub completed: bool,
    pub word: Option<Word>,
    pub source: Option<PickSource>,
    pub progress: SessionProgress,
    pub skipped_remaining: usize,
    pub learning_record: Option<LearningRecord>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOutcome {
    pub record_id: i64,
    pub is_correct: bool,
    pub correct_word: String,
    pub learning_record: Option<LearningRecord>,
    pub progress: SessionProgress,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkipOutcome {
    pub record_id: i64,
    pub word_id: i64,
    pub skipped_remaining: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResult {
    pub session: DictationSession,
    pub records: Vec<DictationRecordView>,
    pub accuracy: f64,
    pub correct_unique_words: usize,
    pub total_unique_words: usize,
    pub total_attempts: usize,
    pub difficulty_stats: Vec<DifficultyStat>,
    pub duration_seconds: i64,
}

/// Rejects requesters that do not own an owned session.
///
/// Anonymous requesters are rejected as well as other users, so an owned
/// session is only reachable with its owner's token. Ownerless sessions stay
/// open to everyone.
pub fn authorize(session: &DictationSession, requester: Option<&str>) -> ServiceResult<()> {
    match (session.user_id.as_deref(), requester) {
        (None, _) => Ok(()),
        (Some(owner), Some(user)) if owner == user => Ok(()),
        _ => Err(ServiceError::forbidden("无权访问此听写会话")),
    }
}

/// The user whose learning records an answer updates.
pub fn learning_user<'a>(session: &'a DictationSession, requester: Option<&'a str>) -> Option<&'a str> {
    session.user_id.as_deref().or(requester)
}

pub fn answer_matches(answer: &str, expected: &str) -> bool {
    answer.trim().to_lowercase() == expected.trim().to_lowercase()
}

pub fn session_name(list_name: &str, at: DateTime<Utc>) -> String {
    format!("{} - {}", list_name, at.format("%Y-%m-%d %H:%M"))
}

async fn load_session(conn: &mut SqliteConnection, session_id: i64) -> ServiceResult<DictationSession> {
    ops::get_session(&mut *conn, session_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("听写会话不存在"))
}

async fn load_session_word(
    conn: &mut SqliteConnection,
    session: &DictationSession,
    word_id: i64,
) -> ServiceResult<Word> {
    if !content::membership_exists(&mut *conn, session.word_list_id, word_id).await? {
        return Err(ServiceError::not_found("单词不在此听写会话中"));
    }
    content::get_word(&mut *conn, word_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("单词不存在"))
}

pub async fn start(
    db: &Database,
    list_id: i64,
    requester: Option<&str>,
    now: DateTime<Utc>,
) -> ServiceResult<DictationSession> {
    let list = word_store::get_list(db, list_id).await?;
    let active = content::list_entries(db.pool(), list_id, true).await?;
    if active.is_empty() {
        return Err(ServiceError::validation(format!(
            "词书\"{}\"为空，请先添加单词后再开始听写",
            list.name
        )));
    }

    let name = session_name(&list.name, now);
    let session_id =
        ops::insert_session(db.pool(), list_id, requester, &name, active.len() as i64, now).await?;
    tracing::info!(session_id, list_id, total_words = active.len(), "dictation session started");

    let mut conn = db.pool().acquire().await?;
    load_session(&mut conn, session_id).await
}

pub async fn next_word(
    db: &Database,
    session_id: i64,
    requester: Option<&str>,
    now: DateTime<Utc>,
) -> ServiceResult<NextWord> {
    let mut tx = db.begin_write().await?;
    let session = load_session(&mut tx, session_id).await?;
    authorize(&session, requester)?;

    if session.is_completed {
        return Ok(completed_view(&session));
    }

    let list_order: Vec<i64> = content::list_entries(&mut *tx, session.word_list_id, true)
        .await?
        .into_iter()
        .map(|entry| entry.word.id)
        .collect();
    let records = ops::list_session_records(&mut *tx, session_id).await?;
    let picked = selection::select_next(&list_order, &records, &session.skip_queue);

    if picked.queue_changed {
        ops::save_skip_queue(&mut *tx, session_id, &picked.queue).await?;
    }

    let view = match picked.pick {
        Pick::Completed => {
            if ops::mark_completed(&mut *tx, session_id, now).await? {
                tracing::info!(session_id, "dictation session completed");
            }
            let session = load_session(&mut tx, session_id).await?;
            completed_view(&session)
        }
        Pick::Word { word_id, source } => {
            let word = content::get_word(&mut *tx, word_id)
                .await?
                .ok_or_else(|| ServiceError::not_found("单词不存在"))?;
            let learning_record = match learning_user(&session, requester) {
                Some(user) => {
                    Some(learning_ops::upsert_learning_record(&mut tx, word_id, user, now).await?.0)
                }
                None => None,
            };
            NextWord {
                session_id,
                completed: false,
                word: Some(word),
                source: Some(source),
                progress: SessionProgress::of(&session),
                skipped_remaining: picked.queue.len(),
                learning_record,
            }
        }
    };

    tx.commit().await?;
    Ok(view)
}

fn completed_view(session: &DictationSession) -> NextWord {
    NextWord {
        session_id: session.id,
        completed: true,
        word: None,
        source: None,
        progress: SessionProgress::of(session),
        skipped_remaining: 0,
        learning_record: None,
    }
}

pub async fn submit_answer(
    db: &Database,
    session_id: i64,
    word_id: i64,
    answer: &str,
    time_taken: i64,
    requester: Option<&str>,
    now: DateTime<Utc>,
) -> ServiceResult<AnswerOutcome> {
    let mut tx = db.begin_write().await?;
    let session = load_session(&mut tx, session_id).await?;
    authorize(&session, requester)?;
    let word = load_session_word(&mut tx, &session, word_id).await?;

    if session.is_completed {
        return Err(ServiceError::validation("听写会话已完成"));
    }
    let answer = answer.trim();
    if answer.is_empty() {
        return Err(ServiceError::validation("答案不能为空"));
    }
    if time_taken < 0 {
        return Err(ServiceError::validation("用时不能为负数"));
    }

    let is_correct = answer_matches(answer, &word.word);
    let first_correct =
        is_correct && ops::count_correct_for_word(&mut *tx, session_id, word_id).await? == 0;

    let record_id = ops::insert_record(
        &mut *tx,
        &NewDictationRecord {
            session_id,
            word_id,
            user_answer: answer,
            is_correct,
            is_skip: false,
            time_taken,
        },
        now,
    )
    .await?;

    if is_correct {
        ops::increment_correct(&mut *tx, session_id, first_correct).await?;
    } else {
        ops::increment_wrong(&mut *tx, session_id).await?;
    }

    let learning_record = match learning_user(&session, requester) {
        Some(user) => {
            let (mut record, _) =
                learning_ops::upsert_learning_record(&mut tx, word_id, user, now).await?;
            update_mastery(&mut record, is_correct, now);
            learning_ops::save_learning_record(&mut *tx, &record).await?;
            ops::link_learning_record(&mut *tx, record_id, record.id).await?;
            Some(record)
        }
        None => None,
    };

    let updated = load_session(&mut tx, session_id).await?;
    tx.commit().await?;

    tracing::debug!(session_id, word_id, is_correct, first_correct, "answer recorded");
    Ok(AnswerOutcome {
        record_id,
        is_correct,
        correct_word: word.word,
        learning_record,
        progress: SessionProgress::of(&updated),
    })
}

/// Defers a word to the end of the session. Counts as a wrong attempt but
/// never changes mastery.
pub async fn skip_word(
    db: &Database,
    session_id: i64,
    word_id: i64,
    requester: Option<&str>,
    now: DateTime<Utc>,
) -> ServiceResult<SkipOutcome> {
    let mut tx = db.begin_write().await?;
    let mut session = load_session(&mut tx, session_id).await?;
    authorize(&session, requester)?;
    load_session_word(&mut tx, &session, word_id).await?;

    if session.is_completed {
        return Err(ServiceError::validation("听写会话已完成"));
    }

    let record_id = ops::insert_record(
        &mut *tx,
        &NewDictationRecord {
            session_id,
            word_id,
            user_answer: SKIPPED_ANSWER,
            is_correct: false,
            is_skip: true,
            time_taken: 0,
        },
        now,
    )
    .await?;

    if !session.skip_queue.contains(word_id) {
        session.skip_queue.push_back(word_id);
        ops::save_skip_queue(&mut *tx, session_id, &session.skip_queue).await?;
    }
    ops::increment_wrong(&mut *tx, session_id).await?;

    if let Some(user) = learning_user(&session, requester) {
        let (record, _) = learning_ops::upsert_learning_record(&mut tx, word_id, user, now).await?;
        ops::link_learning_record(&mut *tx, record_id, record.id).await?;
    }

    tx.commit().await?;

    tracing::debug!(session_id, word_id, queued = session.skip_queue.len(), "word skipped");
    Ok(SkipOutcome {
        record_id,
        word_id,
        skipped_remaining: session.skip_queue.len(),
    })
}

pub async fn get_result(
    db: &Database,
    session_id: i64,
    requester: Option<&str>,
    now: DateTime<Utc>,
) -> ServiceResult<SessionResult> {
    let mut conn = db.pool().acquire().await?;
    let session = load_session(&mut conn, session_id).await?;
    authorize(&session, requester)?;

    let records = ops::list_session_record_views(&mut *conn, session_id).await?;
    let total_unique_words = content::count_list_words(&mut *conn, session.word_list_id).await?.max(0) as usize;

    let plain: Vec<_> = records.iter().map(|view| view.record.clone()).collect();
    let correct_ids = selection::correct_word_ids(&plain);
    let difficulty_of: HashMap<i64, i64> = records
        .iter()
        .map(|view| (view.word.id, view.word.difficulty))
        .collect();

    Ok(SessionResult {
        accuracy: progress::session_accuracy(&correct_ids, total_unique_words),
        correct_unique_words: correct_ids.len(),
        total_unique_words,
        total_attempts: records.len(),
        difficulty_stats: progress::difficulty_stats(&plain, &difficulty_of),
        duration_seconds: session.duration_seconds(now),
        records,
        session,
    })
}

pub async fn recent_sessions(db: &Database, requester: Option<&str>) -> ServiceResult<Vec<DictationSession>> {
    Ok(ops::list_recent_completed(db.pool(), requester, RECENT_SESSION_LIMIT).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::skip_queue::SkipQueue;
    use chrono::TimeZone;

    fn session(owner: Option<&str>) -> DictationSession {
        DictationSession {
            id: 1,
            word_list_id: 1,
            user_id: owner.map(str::to_string),
            name: "list".into(),
            total_words: 3,
            completed_words: 0,
            correct_count: 0,
            wrong_count: 0,
            start_time: Utc::now(),
            end_time: None,
            is_completed: false,
            skip_queue: SkipQueue::new(),
        }
    }

    #[test]
    fn owned_sessions_reject_other_and_anonymous_requesters() {
        let owned = session(Some("alice"));
        assert!(authorize(&owned, Some("alice")).is_ok());
        assert!(matches!(authorize(&owned, Some("bob")), Err(ServiceError::Forbidden(_))));
        assert!(matches!(authorize(&owned, None), Err(ServiceError::Forbidden(_))));
    }

    #[test]
    fn anonymous_sessions_are_open() {
        let open = session(None);
        assert!(authorize(&open, None).is_ok());
        assert!(authorize(&open, Some("bob")).is_ok());
        assert_eq!(learning_user(&open, Some("bob")), Some("bob"));
        assert_eq!(learning_user(&open, None), None);
    }

    #[test]
    fn answers_compare_case_insensitively_after_trim() {
        assert!(answer_matches("  Apple ", "apple"));
        assert!(answer_matches("ÉCOLE", "école"));
        assert!(!answer_matches("appl", "apple"));
    }

    #[test]
    fn name_uses_minute_precision() {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 14, 5, 59).unwrap();
        assert_eq!(session_name("Unit 1", at), "Unit 1 - 2024-06-01 14:05");
    }
}
