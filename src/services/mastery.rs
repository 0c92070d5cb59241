//! Spaced-repetition scheduling for learning records.
//!
//! Mastery moves in fixed steps (+10 on a correct review, -20 on a miss) and
//! the next review is pushed out along a fixed interval ladder indexed by how
//! many reviews the record has seen.

use chrono::{DateTime, Duration, Utc};

use crate::db::operations::learning::LearningRecord;

/// Review intervals in days, indexed by review count. Saturates at the end.
pub const INTERVALS: [i64; 8] = [1, 2, 4, 7, 15, 30, 60, 90];

pub const MASTERY_MIN: i64 = 0;
pub const MASTERY_MAX: i64 = 100;
pub const CORRECT_STEP: i64 = 10;
pub const WRONG_STEP: i64 = 20;

pub const MASTERED_THRESHOLD: i64 = 80;
pub const IN_PROGRESS_THRESHOLD: i64 = 40;

pub fn interval_days(review_count: i64) -> i64 {
    let index = review_count.clamp(0, INTERVALS.len() as i64 - 1) as usize;
    INTERVALS[index]
}

pub fn calculate_next_review(review_count: i64, now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::days(interval_days(review_count))
}

/// Applies one review outcome. Not idempotent: call once per answer.
pub fn update_mastery(record: &mut LearningRecord, correct: bool, now: DateTime<Utc>) {
    record.mastery_level = if correct {
        (record.mastery_level + CORRECT_STEP).min(MASTERY_MAX)
    } else {
        (record.mastery_level - WRONG_STEP).max(MASTERY_MIN)
    };
    record.review_count += 1;
    record.last_review_date = now;
    record.next_review_date = calculate_next_review(record.review_count, now);
}
