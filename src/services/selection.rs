use std::collections::HashSet;

use serde::Serialize;

use crate::db::operations::dictation::DictationRecord;
use crate::services::skip_queue::SkipQueue;

/// How the presented word was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PickSource {
    Retry,
    Fresh,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pick {
    Word { word_id: i64, source: PickSource },
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub pick: Pick,
    /// Queue after any pops. Only differs from the input when `queue_changed`.
    pub queue: SkipQueue,
    pub queue_changed: bool,
}

/// Ids of words with at least one correct record, in first-correct order.
pub fn correct_word_ids(records: &[DictationRecord]) -> Vec<i64> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter(|r| r.is_correct && seen.insert(r.word_id))
        .map(|r| r.word_id)
        .collect()
}

/// Chooses the next word of a session.
///
/// `list_order` holds the active member ids in presentation order and
/// `records` the session log in insertion order.
pub fn select_next(list_order: &[i64], records: &[DictationRecord], queue: &SkipQueue) -> Selection {
    let correct: HashSet<i64> = correct_word_ids(records).into_iter().collect();
    let in_list: HashSet<i64> = list_order.iter().copied().collect();

    let unchanged = |pick| Selection {
        pick,
        queue: queue.clone(),
        queue_changed: false,
    };

    let last_miss = records.iter().rev().find(|r| !r.is_correct);
    if let Some(miss) = last_miss {
        if !miss.is_skip && !correct.contains(&miss.word_id) && in_list.contains(&miss.word_id) {
            return unchanged(Pick::Word {
                word_id: miss.word_id,
                source: PickSource::Retry,
            });
        }
    }

    if let Some(&word_id) = list_order
        .iter()
        .find(|id| !correct.contains(id) && !queue.contains(**id))
    {
        return unchanged(Pick::Word {
            word_id,
            source: PickSource::Fresh,
        });
    }

    let mut remaining = queue.clone();
    while let Some(word_id) = remaining.pop_front() {
        if in_list.contains(&word_id) && !correct.contains(&word_id) {
            return Selection {
                pick: Pick::Word {
                    word_id,
                    source: PickSource::Skipped,
                },
                queue: remaining,
                queue_changed: true,
            };
        }
    }

    Selection {
        pick: Pick::Completed,
        queue_changed: !queue.is_empty(),
        queue: remaining,
    }
}
