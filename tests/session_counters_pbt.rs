//! Property tests for dictation session counters.
//!
//! For any interleaving of correct answers, wrong answers and skips, the
//! counters stored on the session must agree with its record log:
//! - completedWords equals the number of distinct correctly answered words
//! - correctCount / wrongCount equal the correct / incorrect record counts

use std::collections::HashSet;

use chrono::Utc;
use proptest::prelude::*;

use dictation_backend::db::operations::dictation as dictation_ops;
use dictation_backend::db::Database;
use dictation_backend::services::{dictation, import, word_store};

const WORDS: [&str; 3] = ["amber", "basil", "cedar"];

#[derive(Debug, Clone, Copy)]
enum Action {
    Correct(usize),
    Wrong(usize),
    Skip(usize),
}

fn arb_action() -> impl Strategy<Value = Action> {
    let idx = 0..WORDS.len();
    prop_oneof![
        idx.clone().prop_map(Action::Correct),
        idx.clone().prop_map(Action::Wrong),
        idx.prop_map(Action::Skip),
    ]
}

async fn run_actions(actions: &[Action]) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(&dir.path().join("pbt.db")).await.unwrap();

    let list = word_store::create_list(&db, "Trees", "").await.unwrap();
    let text = WORDS.join("\n");
    import::import_words(&db, list.id, &text).await.unwrap();
    let detail = word_store::get_list_detail(&db, list.id).await.unwrap();
    let ids: Vec<i64> = detail.words.iter().map(|entry| entry.word.id).collect();

    let session = dictation::start(&db, list.id, None, Utc::now()).await.unwrap();
    for action in actions {
        match *action {
            Action::Correct(idx) => {
                dictation::submit_answer(&db, session.id, ids[idx], WORDS[idx], 1, None, Utc::now())
                    .await
                    .unwrap();
            }
            Action::Wrong(idx) => {
                dictation::submit_answer(&db, session.id, ids[idx], "zzz", 1, None, Utc::now())
                    .await
                    .unwrap();
            }
            Action::Skip(idx) => {
                dictation::skip_word(&db, session.id, ids[idx], None, Utc::now())
                    .await
                    .unwrap();
            }
        }
    }

    let stored = dictation_ops::get_session(db.pool(), session.id)
        .await
        .unwrap()
        .unwrap();
    let records = dictation_ops::list_session_records(db.pool(), session.id)
        .await
        .unwrap();

    let distinct_correct: HashSet<i64> = records
        .iter()
        .filter(|record| record.is_correct)
        .map(|record| record.word_id)
        .collect();
    let correct = records.iter().filter(|record| record.is_correct).count() as i64;
    let wrong = records.len() as i64 - correct;

    assert_eq!(records.len(), actions.len());
    assert_eq!(stored.completed_words, distinct_correct.len() as i64);
    assert_eq!(stored.correct_count, correct);
    assert_eq!(stored.wrong_count, wrong);
    assert!(!stored.is_completed);

    db.close().await;
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn counters_match_record_log(actions in prop::collection::vec(arb_action(), 0..12)) {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(run_actions(&actions));
    }
}
