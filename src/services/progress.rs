use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::db::operations::dictation::{self as dictation_ops, DictationRecord};
use crate::db::operations::learning::{self as learning_ops, LearningRecord};
use crate::db::Database;
use crate::services::learning::end_of_day;
use crate::services::mastery::{IN_PROGRESS_THRESHOLD, MASTERED_THRESHOLD};
use crate::services::ServiceResult;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MasteryBuckets {
    pub mastered: usize,
    pub in_progress: usize,
    pub needs_work: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyAccuracy {
    pub date: NaiveDate,
    pub count: usize,
    pub correct: usize,
    pub accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyStat {
    pub difficulty: i64,
    pub attempted: usize,
    pub correct: usize,
    pub accuracy: f64,
}

/// Answer history of one word across every session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WordPracticeStat {
    pub word_id: i64,
    pub total_attempts: usize,
    pub correct_attempts: usize,
    pub accuracy: f64,
    pub last_practiced: DateTime<Utc>,
    /// 0 to 4, see [`practice_tier`].
    pub tier: u8,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressReport {
    pub total_records: usize,
    pub mastery: MasteryBuckets,
    pub due_today: usize,
    pub active_plans: usize,
    pub daily: Vec<DailyAccuracy>,
    pub word_stats: Vec<WordPracticeStat>,
}

/// Percentage rounded to one decimal. Zero when `total` is zero.
pub fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 / total as f64 * 1000.0).round() / 10.0
}

pub fn mastery_buckets(levels: impl IntoIterator<Item = i64>) -> MasteryBuckets {
    let mut buckets = MasteryBuckets::default();
    for level in levels {
        if level >= MASTERED_THRESHOLD {
            buckets.mastered += 1;
        } else if level >= IN_PROGRESS_THRESHOLD {
            buckets.in_progress += 1;
        } else {
            buckets.needs_work += 1;
        }
    }
    buckets
}

pub fn daily_accuracy(records: &[DictationRecord]) -> Vec<DailyAccuracy> {
    let mut by_date: BTreeMap<NaiveDate, (usize, usize)> = BTreeMap::new();
    for record in records {
        let entry = by_date.entry(record.created_at.date_naive()).or_default();
        entry.0 += 1;
        if record.is_correct {
            entry.1 += 1;
        }
    }
    by_date
        .into_iter()
        .map(|(date, (count, correct))| DailyAccuracy {
            date,
            count,
            correct,
            accuracy: percent(correct, count),
        })
        .collect()
}

pub fn session_accuracy(correct_word_ids: &[i64], total_words: usize) -> f64 {
    let distinct: HashSet<i64> = correct_word_ids.iter().copied().collect();
    percent(distinct.len(), total_words)
}

/// Per difficulty level: distinct words attempted in the session and how
/// many of those ended up with a correct answer.
pub fn difficulty_stats(records: &[DictationRecord], difficulty_of: &HashMap<i64, i64>) -> Vec<DifficultyStat> {
    let mut attempted: BTreeMap<i64, HashSet<i64>> = BTreeMap::new();
    let mut correct: BTreeMap<i64, HashSet<i64>> = BTreeMap::new();

    for record in records {
        let Some(&level) = difficulty_of.get(&record.word_id) else {
            continue;
        };
        attempted.entry(level).or_default().insert(record.word_id);
        if record.is_correct {
            correct.entry(level).or_default().insert(record.word_id);
        }
    }

    attempted
        .into_iter()
        .map(|(difficulty, words)| {
            let correct = correct.get(&difficulty).map_or(0, HashSet::len);
            DifficultyStat {
                difficulty,
                attempted: words.len(),
                correct,
                accuracy: percent(correct, words.len()),
            }
        })
        .collect()
}

/// Tier for an answer accuracy given as a percentage.
pub fn practice_tier(accuracy: f64) -> u8 {
    match accuracy {
        a if a >= 90.0 => 4,
        a if a >= 80.0 => 3,
        a if a >= 60.0 => 2,
        a if a >= 30.0 => 1,
        _ => 0,
    }
}

/// Per-word attempts, ordered by word id. Skips are not attempts.
pub fn word_practice_stats(records: &[DictationRecord]) -> Vec<WordPracticeStat> {
    let mut by_word: BTreeMap<i64, (usize, usize, DateTime<Utc>)> = BTreeMap::new();
    for record in records.iter().filter(|r| !r.is_skip) {
        let entry = by_word
            .entry(record.word_id)
            .or_insert((0, 0, record.created_at));
        entry.0 += 1;
        if record.is_correct {
            entry.1 += 1;
        }
        entry.2 = entry.2.max(record.created_at);
    }

    by_word
        .into_iter()
        .map(|(word_id, (total, correct, last_practiced))| WordPracticeStat {
            word_id,
            total_attempts: total,
            correct_attempts: correct,
            accuracy: percent(correct, total),
            last_practiced,
            tier: practice_tier(correct as f64 * 100.0 / total as f64),
        })
        .collect()
}

pub fn count_due(records: &[LearningRecord], now: DateTime<Utc>) -> usize {
    let cutoff = end_of_day(now);
    records.iter().filter(|r| r.next_review_date < cutoff).count()
}

pub async fn progress_report(db: &Database, user_id: &str, now: DateTime<Utc>) -> ServiceResult<ProgressReport> {
    let records: Vec<LearningRecord> = learning_ops::list_user_records(db.pool(), user_id)
        .await?
        .into_iter()
        .map(|view| view.record)
        .collect();
    let plans = learning_ops::list_active_plans(db.pool(), user_id).await?;
    let attempts = dictation_ops::list_user_records(db.pool(), user_id).await?;

    Ok(ProgressReport {
        total_records: records.len(),
        mastery: mastery_buckets(records.iter().map(|r| r.mastery_level)),
        due_today: count_due(&records, now),
        active_plans: plans.len(),
        daily: daily_accuracy(&attempts),
        word_stats: word_practice_stats(&attempts),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn attempt(word_id: i64, is_correct: bool, at: DateTime<Utc>) -> DictationRecord {
        DictationRecord {
            id: 0,
            session_id: 1,
            word_id,
            user_answer: String::new(),
            is_correct,
            is_skip: false,
            time_taken: 3,
            created_at: at,
            learning_record_id: None,
        }
    }

    #[test]
    fn bucket_boundaries() {
        let buckets = mastery_buckets([0, 39, 40, 79, 80, 100]);
        assert_eq!(
            buckets,
            MasteryBuckets {
                mastered: 2,
                in_progress: 2,
                needs_work: 2
            }
        );
    }

    #[test]
    fn daily_series_is_sorted_and_rounded() {
        let d1 = Utc.with_ymd_and_hms(2024, 4, 2, 9, 0, 0).unwrap();
        let d0 = Utc.with_ymd_and_hms(2024, 4, 1, 23, 0, 0).unwrap();
        let records = vec![
            attempt(1, true, d1),
            attempt(2, false, d1),
            attempt(3, false, d1),
            attempt(1, true, d0),
        ];

        let series = daily_accuracy(&records);
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].date, d0.date_naive());
        assert_eq!(series[0].accuracy, 100.0);
        assert_eq!(series[1].count, 3);
        assert_eq!(series[1].accuracy, 33.3);
    }

    #[test]
    fn practice_tier_thresholds() {
        assert_eq!(practice_tier(100.0), 4);
        assert_eq!(practice_tier(90.0), 4);
        assert_eq!(practice_tier(89.9), 3);
        assert_eq!(practice_tier(80.0), 3);
        assert_eq!(practice_tier(79.9), 2);
        assert_eq!(practice_tier(60.0), 2);
        assert_eq!(practice_tier(59.9), 1);
        assert_eq!(practice_tier(30.0), 1);
        assert_eq!(practice_tier(29.9), 0);
        assert_eq!(practice_tier(0.0), 0);
    }

    #[test]
    fn word_stats_ignore_skips_and_track_latest_attempt() {
        let early = Utc.with_ymd_and_hms(2024, 4, 1, 8, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 4, 3, 8, 0, 0).unwrap();
        let mut skipped = attempt(2, false, late);
        skipped.is_skip = true;
        let records = vec![
            attempt(2, true, early),
            attempt(1, false, late),
            attempt(2, false, early),
            attempt(2, true, late),
            attempt(1, true, early),
            skipped,
        ];

        let stats = word_practice_stats(&records);
        assert_eq!(stats.len(), 2);

        assert_eq!(stats[0].word_id, 1);
        assert_eq!(stats[0].total_attempts, 2);
        assert_eq!(stats[0].correct_attempts, 1);
        assert_eq!(stats[0].accuracy, 50.0);
        assert_eq!(stats[0].tier, 1);
        assert_eq!(stats[0].last_practiced, late);

        assert_eq!(stats[1].word_id, 2);
        assert_eq!(stats[1].total_attempts, 3);
        assert_eq!(stats[1].correct_attempts, 2);
        assert_eq!(stats[1].accuracy, 66.7);
        assert_eq!(stats[1].tier, 2);
    }

    #[test]
    fn word_stats_only_skips_is_empty() {
        let mut skipped = attempt(5, false, Utc::now());
        skipped.is_skip = true;
        assert!(word_practice_stats(&[skipped]).is_empty());
    }

    #[test]
    fn accuracy_counts_distinct_words() {
        assert_eq!(session_accuracy(&[1, 1, 2], 3), 66.7);
        assert_eq!(session_accuracy(&[], 0), 0.0);
    }

    #[test]
    fn difficulty_stats_group_distinct_words() {
        let at = Utc::now();
        let records = vec![
            attempt(1, false, at),
            attempt(1, true, at),
            attempt(2, false, at),
            attempt(3, true, at),
        ];
        let levels = HashMap::from([(1, 1), (2, 1), (3, 3)]);

        let stats = difficulty_stats(&records, &levels);
        assert_eq!(
            stats,
            vec![
                DifficultyStat { difficulty: 1, attempted: 2, correct: 1, accuracy: 50.0 },
                DifficultyStat { difficulty: 3, attempted: 1, correct: 1, accuracy: 100.0 },
            ]
        );
    }
}
