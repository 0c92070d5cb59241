//! Line-oriented word import: `word,phonetic,translation,example,difficulty`.

use std::collections::HashSet;

use serde::Serialize;

use crate::db::operations::content::{self, NewWord};
use crate::db::Database;
use crate::services::word_store;
use crate::services::ServiceResult;

pub const DEFAULT_DIFFICULTY: i64 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    pub word: String,
    pub phonetic: String,
    pub translation: String,
    pub example: String,
    pub difficulty: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    Blank,
    EmptyWord,
    Parsed(ParsedLine),
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportFailure {
    pub line: usize,
    pub content: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub imported_count: usize,
    pub failed_words: Vec<ImportFailure>,
}

pub fn parse_difficulty(token: Option<&str>) -> i64 {
    match token.map(|t| t.trim().to_lowercase()).as_deref() {
        Some("1" | "easy" | "简单") => 1,
        Some("3" | "hard" | "困难") => 3,
        _ => DEFAULT_DIFFICULTY,
    }
}

pub fn parse_import_line(line: &str) -> LineOutcome {
    if line.trim().is_empty() {
        return LineOutcome::Blank;
    }

    let parts: Vec<&str> = line.split(',').map(str::trim).collect();
    let field = |idx: usize| parts.get(idx).copied().unwrap_or("").to_string();

    let word = field(0);
    if word.is_empty() {
        return LineOutcome::EmptyWord;
    }

    let mut phonetic = field(1);
    let mut translation = field(2);
    if translation.is_empty() && !phonetic.is_empty() {
        translation = std::mem::take(&mut phonetic);
    }
    if translation.is_empty() {
        translation = word.clone();
    }

    LineOutcome::Parsed(ParsedLine {
        example: field(3),
        difficulty: parse_difficulty(parts.get(4).copied()),
        word,
        phonetic,
        translation,
    })
}

/// Imports `text` into the list line by line. Each accepted line is
/// committed on its own; rejected lines are reported, never fatal.
pub async fn import_words(db: &Database, list_id: i64, text: &str) -> ServiceResult<ImportReport> {
    word_store::get_list(db, list_id).await?;

    let mut existing: HashSet<String> = content::list_word_texts(db.pool(), list_id)
        .await?
        .into_iter()
        .collect();
    let mut report = ImportReport {
        imported_count: 0,
        failed_words: Vec::new(),
    };

    for (idx, raw) in text.trim().lines().enumerate() {
        let line_no = idx + 1;
        let fail = |reason: String| ImportFailure {
            line: line_no,
            content: raw.trim().to_string(),
            reason,
        };

        let parsed = match parse_import_line(raw) {
            LineOutcome::Blank => continue,
            LineOutcome::EmptyWord => {
                report.failed_words.push(fail("单词不能为空".to_string()));
                continue;
            }
            LineOutcome::Parsed(parsed) => parsed,
        };

        if existing.contains(&parsed.word) {
            report
                .failed_words
                .push(fail(format!("单词\"{}\"已在当前词书中", parsed.word)));
            continue;
        }

        match insert_line(db, list_id, &parsed).await {
            Ok(()) => {
                existing.insert(parsed.word);
                report.imported_count += 1;
            }
            Err(err) => {
                tracing::warn!(list_id, line = line_no, error = %err, "import line failed");
                report.failed_words.push(fail(err.to_string()));
            }
        }
    }

    tracing::info!(
        list_id,
        imported = report.imported_count,
        failed = report.failed_words.len(),
        "word import finished"
    );
    Ok(report)
}

async fn insert_line(db: &Database, list_id: i64, parsed: &ParsedLine) -> Result<(), sqlx::Error> {
    let mut tx = db.begin_write().await?;
    let word_id = content::insert_word(
        &mut *tx,
        &NewWord {
            word: parsed.word.clone(),
            phonetic: parsed.phonetic.clone(),
            translation: parsed.translation.clone(),
            example: parsed.example.clone(),
            difficulty: parsed.difficulty,
        },
    )
    .await?;
    content::append_membership(&mut *tx, list_id, word_id).await?;
    tx.commit().await
}
