use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Words a learner deferred to the end of a dictation session.
///
/// First in, first out: skipped words come back in the order they were
/// skipped. Persisted as a JSON array of word ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SkipQueue(VecDeque<i64>);

impl SkipQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_back(&mut self, word_id: i64) {
        self.0.push_back(word_id);
    }

    pub fn pop_front(&mut self) -> Option<i64> {
        self.0.pop_front()
    }

    pub fn front(&self) -> Option<i64> {
        self.0.front().copied()
    }

    pub fn contains(&self, word_id: i64) -> bool {
        self.0.contains(&word_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        self.0.iter().copied()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "[]".to_string())
    }

    /// Decodes the stored column. Anything unreadable is treated as empty.
    pub fn from_json(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::new();
        }
        match serde_json::from_str(trimmed) {
            Ok(queue) => queue,
            Err(err) => {
                tracing::warn!(error = %err, raw = trimmed, "unreadable skip queue, resetting");
                Self::new()
            }
        }
    }
}

impl FromIterator<i64> for SkipQueue {
    fn from_iter<T: IntoIterator<Item = i64>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_in_skip_order() {
        let mut queue = SkipQueue::new();
        queue.push_back(3);
        queue.push_back(1);
        queue.push_back(2);

        assert_eq!(queue.pop_front(), Some(3));
        queue.push_back(3);
        assert_eq!(queue.iter().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn json_column_format() {
        let queue: SkipQueue = [7, 4].into_iter().collect();
        assert_eq!(queue.to_json(), "[7,4]");
        assert_eq!(SkipQueue::from_json("[7,4]"), queue);
        assert!(SkipQueue::from_json("").is_empty());
        assert!(SkipQueue::from_json("7,4,").is_empty());
    }
}
