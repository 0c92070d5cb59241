use serde::{Deserialize, Serialize};

use crate::db::operations::content::{self, ListEntry, NewWord, Word, WordList, WordListSummary};
use crate::db::Database;
use crate::services::{ServiceError, ServiceResult};

pub const MIN_DIFFICULTY: i64 = 1;
pub const MAX_DIFFICULTY: i64 = 3;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordInput {
    pub word: String,
    #[serde(default)]
    pub phonetic: String,
    pub translation: String,
    #[serde(default)]
    pub example: String,
    #[serde(default)]
    pub difficulty: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordPatch {
    pub word: Option<String>,
    pub phonetic: Option<String>,
    pub translation: Option<String>,
    pub example: Option<String>,
    pub difficulty: Option<i64>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordListPatch {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WordListDetail {
    #[serde(flatten)]
    pub list: WordList,
    pub word_count: i64,
    pub words: Vec<ListEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipAdded {
    pub word_list_id: i64,
    pub word_id: i64,
    pub order: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipRemoved {
    pub removed: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRemoved {
    pub removed_count: u64,
}

fn validate_text(text: &str) -> ServiceResult<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::validation("单词不能为空"));
    }
    Ok(trimmed.to_string())
}

fn validate_difficulty(difficulty: i64) -> ServiceResult<i64> {
    if !(MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&difficulty) {
        return Err(ServiceError::validation("难度必须在 1 到 3 之间"));
    }
    Ok(difficulty)
}

pub async fn create_word(db: &Database, input: WordInput) -> ServiceResult<Word> {
    let word = validate_text(&input.word)?;
    let translation = input.translation.trim().to_string();
    if translation.is_empty() {
        return Err(ServiceError::validation("释义不能为空"));
    }
    let difficulty = validate_difficulty(input.difficulty.unwrap_or(MIN_DIFFICULTY))?;

    let new_word = NewWord {
        word,
        phonetic: input.phonetic.trim().to_string(),
        translation,
        example: input.example.trim().to_string(),
        difficulty,
    };
    let id = content::insert_word(db.pool(), &new_word).await?;
    tracing::info!(word_id = id, word = %new_word.word, "word created");
    get_word(db, id).await
}

pub async fn get_word(db: &Database, word_id: i64) -> ServiceResult<Word> {
    content::get_word(db.pool(), word_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("单词不存在"))
}

pub async fn list_words(db: &Database) -> ServiceResult<Vec<Word>> {
    Ok(content::list_active_words(db.pool()).await?)
}

pub async fn update_word(db: &Database, word_id: i64, patch: WordPatch) -> ServiceResult<Word> {
    let mut word = get_word(db, word_id).await?;

    if let Some(text) = patch.word {
        let text = validate_text(&text)?;
        if text != word.word {
            if let Some(list_name) =
                content::find_text_conflict_list(db.pool(), word_id, &text).await?
            {
                return Err(ServiceError::validation(format!(
                    "单词\"{text}\"已存在于词书\"{list_name}\"中"
                )));
            }
        }
        word.word = text;
    }
    if let Some(phonetic) = patch.phonetic {
        word.phonetic = phonetic.trim().to_string();
    }
    if let Some(translation) = patch.translation {
        word.translation = translation.trim().to_string();
    }
    if let Some(example) = patch.example {
        word.example = example.trim().to_string();
    }
    if let Some(difficulty) = patch.difficulty {
        word.difficulty = validate_difficulty(difficulty)?;
    }
    if let Some(is_active) = patch.is_active {
        word.is_active = is_active;
    }

    content::update_word(db.pool(), &word).await?;
    get_word(db, word_id).await
}

pub async fn delete_word(db: &Database, word_id: i64) -> ServiceResult<()> {
    if !content::delete_word(db.pool(), word_id).await? {
        return Err(ServiceError::not_found("单词不存在"));
    }
    tracing::info!(word_id, "word deleted");
    Ok(())
}

pub async fn create_list(db: &Database, name: &str, description: &str) -> ServiceResult<WordList> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::validation("词书名称不能为空"));
    }
    let id = content::insert_word_list(db.pool(), name, description.trim()).await?;
    tracing::info!(list_id = id, name, "word list created");
    get_list(db, id).await
}

pub async fn get_list(db: &Database, list_id: i64) -> ServiceResult<WordList> {
    content::get_word_list(db.pool(), list_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("词书不存在"))
}

pub async fn list_lists(db: &Database) -> ServiceResult<Vec<WordListSummary>> {
    Ok(content::list_word_lists(db.pool()).await?)
}

pub async fn get_list_detail(db: &Database, list_id: i64) -> ServiceResult<WordListDetail> {
    let list = get_list(db, list_id).await?;
    let words = content::list_entries(db.pool(), list_id, false).await?;
    Ok(WordListDetail {
        list,
        word_count: words.len() as i64,
        words,
    })
}

pub async fn update_list(db: &Database, list_id: i64, patch: WordListPatch) -> ServiceResult<WordList> {
    let mut list = get_list(db, list_id).await?;
    if let Some(name) = patch.name {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::validation("词书名称不能为空"));
        }
        list.name = name.to_string();
    }
    if let Some(description) = patch.description {
        list.description = description.trim().to_string();
    }
    content::update_word_list(db.pool(), &list).await?;
    get_list(db, list_id).await
}

pub async fn delete_list(db: &Database, list_id: i64) -> ServiceResult<()> {
    if !content::delete_word_list(db.pool(), list_id).await? {
        return Err(ServiceError::not_found("词书不存在"));
    }
    tracing::info!(list_id, "word list deleted");
    Ok(())
}

pub async fn add_word_to_list(db: &Database, list_id: i64, word_id: i64) -> ServiceResult<MembershipAdded> {
    get_list(db, list_id).await?;
    let word = get_word(db, word_id).await?;

    let mut tx = db.begin_write().await?;
    if content::membership_exists(&mut *tx, list_id, word_id).await? {
        return Err(ServiceError::conflict("单词已在此列表中"));
    }
    if content::list_contains_text(&mut *tx, list_id, &word.word).await? {
        return Err(ServiceError::conflict(format!("单词\"{}\"已在此列表中", word.word)));
    }
    let order = content::append_membership(&mut *tx, list_id, word_id).await?;
    tx.commit().await?;

    Ok(MembershipAdded {
        word_list_id: list_id,
        word_id,
        order,
    })
}

pub async fn remove_word_from_list(
    db: &Database,
    list_id: i64,
    word_id: i64,
) -> ServiceResult<MembershipRemoved> {
    get_list(db, list_id).await?;
    let removed = content::remove_membership(db.pool(), list_id, word_id).await?;
    Ok(MembershipRemoved { removed: removed > 0 })
}

pub async fn batch_remove(db: &Database, list_id: i64, word_ids: &[i64]) -> ServiceResult<BatchRemoved> {
    get_list(db, list_id).await?;
    if word_ids.is_empty() {
        return Err(ServiceError::validation("请选择要删除的单词"));
    }
    let mut tx = db.begin_write().await?;
    let removed_count = content::remove_memberships(&mut *tx, list_id, word_ids).await?;
    tx.commit().await?;
    tracing::info!(list_id, removed_count, "batch removed words from list");
    Ok(BatchRemoved { removed_count })
}
