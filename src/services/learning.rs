use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::db::operations::content;
use crate::db::operations::learning::{
    self, LearningRecord, LearningRecordView, PlanType, ReviewPlan,
};
use crate::db::Database;
use crate::services::mastery::update_mastery;
use crate::services::{word_store, ServiceError, ServiceResult};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanCreated {
    #[serde(flatten)]
    pub plan: ReviewPlan,
    pub records_created: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanToday {
    pub plan: ReviewPlan,
    pub words: Vec<LearningRecordView>,
}

/// First instant of the next UTC day. Records due before it are due today.
pub fn end_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    let midnight = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .unwrap_or(now);
    midnight + Duration::days(1)
}

pub async fn list_records(db: &Database, user_id: &str) -> ServiceResult<Vec<LearningRecordView>> {
    Ok(learning::list_user_records(db.pool(), user_id).await?)
}

pub async fn today_due(
    db: &Database,
    user_id: &str,
    now: DateTime<Utc>,
) -> ServiceResult<Vec<LearningRecordView>> {
    Ok(learning::list_due_records(db.pool(), user_id, end_of_day(now)).await?)
}

pub async fn upsert(
    db: &Database,
    word_id: i64,
    user_id: &str,
    now: DateTime<Utc>,
) -> ServiceResult<LearningRecord> {
    word_store::get_word(db, word_id).await?;
    let mut conn = db.pool().acquire().await?;
    let (record, _) = learning::upsert_learning_record(&mut *conn, word_id, user_id, now).await?;
    Ok(record)
}

/// Applies one review outcome to a record owned by `user_id`.
pub async fn review(
    db: &Database,
    record_id: i64,
    user_id: &str,
    correct: bool,
    now: DateTime<Utc>,
) -> ServiceResult<LearningRecord> {
    let mut record = learning::get_learning_record(db.pool(), record_id)
        .await?
        .filter(|record| record.user_id == user_id)
        .ok_or_else(|| ServiceError::not_found("学习记录不存在"))?;

    update_mastery(&mut record, correct, now);
    learning::save_learning_record(db.pool(), &record).await?;

    tracing::debug!(
        record_id,
        correct,
        mastery = record.mastery_level,
        reviews = record.review_count,
        "learning record reviewed"
    );
    Ok(record)
}

pub async fn create_plan(
    db: &Database,
    user_id: &str,
    list_id: i64,
    plan_type: PlanType,
    start_date: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> ServiceResult<PlanCreated> {
    word_store::get_list(db, list_id).await?;

    let mut tx = db.begin_write().await?;
    let plan_id = learning::insert_review_plan(
        &mut *tx,
        user_id,
        list_id,
        plan_type,
        start_date.unwrap_or(now),
    )
    .await?;

    let mut records_created = 0;
    if plan_type == PlanType::New {
        let entries = content::list_entries(&mut *tx, list_id, false).await?;
        for entry in &entries {
            let (_, created) =
                learning::upsert_learning_record(&mut *tx, entry.word.id, user_id, now).await?;
            if created {
                records_created += 1;
            }
        }
    }
    tx.commit().await?;

    let plan = get_owned_plan(db, plan_id, user_id).await?;
    tracing::info!(plan_id, list_id, plan_type = plan_type.as_str(), records_created, "review plan created");
    Ok(PlanCreated {
        plan,
        records_created,
    })
}

pub async fn list_plans(db: &Database, user_id: &str) -> ServiceResult<Vec<ReviewPlan>> {
    Ok(learning::list_active_plans(db.pool(), user_id).await?)
}

async fn get_owned_plan(db: &Database, plan_id: i64, user_id: &str) -> ServiceResult<ReviewPlan> {
    learning::get_review_plan(db.pool(), plan_id)
        .await?
        .filter(|plan| plan.user_id == user_id)
        .ok_or_else(|| ServiceError::not_found("复习计划不存在"))
}

pub async fn plan_today(
    db: &Database,
    plan_id: i64,
    user_id: &str,
    now: DateTime<Utc>,
) -> ServiceResult<PlanToday> {
    let plan = get_owned_plan(db, plan_id, user_id).await?;
    let words =
        learning::list_due_records_for_list(db.pool(), user_id, plan.word_list_id, end_of_day(now))
            .await?;
    Ok(PlanToday { plan, words })
}

pub async fn deactivate_plan(db: &Database, plan_id: i64, user_id: &str) -> ServiceResult<ReviewPlan> {
    get_owned_plan(db, plan_id, user_id).await?;
    learning::deactivate_plan(db.pool(), plan_id).await?;
    get_owned_plan(db, plan_id, user_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn end_of_day_is_next_utc_midnight() {
        let now = Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 59).unwrap();
        assert_eq!(end_of_day(now), Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());

        let midnight = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(end_of_day(midnight), Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap());
    }
}
