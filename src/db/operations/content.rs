use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqliteExecutor};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Word {
    pub id: i64,
    pub word: String,
    pub phonetic: String,
    pub translation: String,
    pub example: String,
    pub difficulty: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Compact word projection attached to learning and dictation records.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordBrief {
    pub id: i64,
    pub word: String,
    pub phonetic: String,
    pub translation: String,
    pub difficulty: i64,
}

#[derive(Debug, Clone)]
pub struct NewWord {
    pub word: String,
    pub phonetic: String,
    pub translation: String,
    pub example: String,
    pub difficulty: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordList {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordListSummary {
    #[serde(flatten)]
    pub list: WordList,
    pub word_count: i64,
}

/// A list member in presentation order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEntry {
    #[serde(flatten)]
    pub word: Word,
    pub order: i64,
    pub added_at: DateTime<Utc>,
}

const WORD_COLUMNS: &str = r#""id","word","phonetic","translation","example","difficulty","isActive","createdAt","updatedAt""#;

pub(crate) fn map_word(row: &SqliteRow) -> Result<Word, sqlx::Error> {
    Ok(Word {
        id: row.try_get("id")?,
        word: row.try_get("word")?,
        phonetic: row.try_get("phonetic")?,
        translation: row.try_get("translation")?,
        example: row.try_get("example")?,
        difficulty: row.try_get("difficulty")?,
        is_active: row.try_get("isActive")?,
        created_at: row.try_get("createdAt")?,
        updated_at: row.try_get("updatedAt")?,
    })
}

/// Maps the `w_*` aliased word columns used by joined queries.
pub(crate) fn map_word_brief(row: &SqliteRow) -> Result<WordBrief, sqlx::Error> {
    Ok(WordBrief {
        id: row.try_get("w_id")?,
        word: row.try_get("w_word")?,
        phonetic: row.try_get("w_phonetic")?,
        translation: row.try_get("w_translation")?,
        difficulty: row.try_get("w_difficulty")?,
    })
}

fn map_word_list(row: &SqliteRow) -> Result<WordList, sqlx::Error> {
    Ok(WordList {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        created_at: row.try_get("createdAt")?,
        updated_at: row.try_get("updatedAt")?,
    })
}

pub async fn insert_word(
    executor: impl SqliteExecutor<'_>,
    word: &NewWord,
) -> Result<i64, sqlx::Error> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO "words" ("word","phonetic","translation","example","difficulty","isActive","createdAt","updatedAt")
        VALUES (?, ?, ?, ?, ?, 1, ?, ?)
        "#,
    )
    .bind(&word.word)
    .bind(&word.phonetic)
    .bind(&word.translation)
    .bind(&word.example)
    .bind(word.difficulty)
    .bind(now)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(result.last_insert_rowid())
}

pub async fn get_word(
    executor: impl SqliteExecutor<'_>,
    word_id: i64,
) -> Result<Option<Word>, sqlx::Error> {
    let sql = format!(r#"SELECT {WORD_COLUMNS} FROM "words" WHERE "id" = ?"#);
    let row = sqlx::query(&sql)
        .bind(word_id)
        .fetch_optional(executor)
        .await?;
    row.as_ref().map(map_word).transpose()
}

pub async fn list_active_words(executor: impl SqliteExecutor<'_>) -> Result<Vec<Word>, sqlx::Error> {
    let sql = format!(
        r#"SELECT {WORD_COLUMNS} FROM "words" WHERE "isActive" = 1 ORDER BY "word" ASC, "id" ASC"#
    );
    let rows = sqlx::query(&sql).fetch_all(executor).await?;
    rows.iter().map(map_word).collect()
}

pub async fn update_word(
    executor: impl SqliteExecutor<'_>,
    word: &Word,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE "words"
        SET "word" = ?, "phonetic" = ?, "translation" = ?, "example" = ?,
            "difficulty" = ?, "isActive" = ?, "updatedAt" = ?
        WHERE "id" = ?
        "#,
    )
    .bind(&word.word)
    .bind(&word.phonetic)
    .bind(&word.translation)
    .bind(&word.example)
    .bind(word.difficulty)
    .bind(word.is_active)
    .bind(Utc::now())
    .bind(word.id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_word(
    executor: impl SqliteExecutor<'_>,
    word_id: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(r#"DELETE FROM "words" WHERE "id" = ?"#)
        .bind(word_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Name of a list that already holds a *different* word spelled `text`
/// while also containing `word_id`.
pub async fn find_text_conflict_list(
    executor: impl SqliteExecutor<'_>,
    word_id: i64,
    text: &str,
) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT wl."name"
        FROM "word_lists" wl
        JOIN "word_list_words" own ON own."wordListId" = wl."id" AND own."wordId" = ?
        JOIN "word_list_words" other ON other."wordListId" = wl."id" AND other."wordId" <> ?
        JOIN "words" w ON w."id" = other."wordId"
        WHERE w."word" = ?
        LIMIT 1
        "#,
    )
    .bind(word_id)
    .bind(word_id)
    .bind(text)
    .fetch_optional(executor)
    .await
}

pub async fn insert_word_list(
    executor: impl SqliteExecutor<'_>,
    name: &str,
    description: &str,
) -> Result<i64, sqlx::Error> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO "word_lists" ("name","description","createdAt","updatedAt")
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(name)
    .bind(description)
    .bind(now)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(result.last_insert_rowid())
}

pub async fn get_word_list(
    executor: impl SqliteExecutor<'_>,
    list_id: i64,
) -> Result<Option<WordList>, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT "id","name","description","createdAt","updatedAt" FROM "word_lists" WHERE "id" = ?"#,
    )
    .bind(list_id)
    .fetch_optional(executor)
    .await?;
    row.as_ref().map(map_word_list).transpose()
}

pub async fn list_word_lists(
    executor: impl SqliteExecutor<'_>,
) -> Result<Vec<WordListSummary>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT wl."id", wl."name", wl."description", wl."createdAt", wl."updatedAt",
               COUNT(m."id") AS "wordCount"
        FROM "word_lists" wl
        LEFT JOIN "word_list_words" m ON m."wordListId" = wl."id"
        GROUP BY wl."id"
        ORDER BY wl."createdAt" DESC, wl."id" DESC
        "#,
    )
    .fetch_all(executor)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(WordListSummary {
                list: map_word_list(row)?,
                word_count: row.try_get("wordCount")?,
            })
        })
        .collect()
}

pub async fn update_word_list(
    executor: impl SqliteExecutor<'_>,
    list: &WordList,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"UPDATE "word_lists" SET "name" = ?, "description" = ?, "updatedAt" = ? WHERE "id" = ?"#,
    )
    .bind(&list.name)
    .bind(&list.description)
    .bind(Utc::now())
    .bind(list.id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_word_list(
    executor: impl SqliteExecutor<'_>,
    list_id: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(r#"DELETE FROM "word_lists" WHERE "id" = ?"#)
        .bind(list_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn list_entries(
    executor: impl SqliteExecutor<'_>,
    list_id: i64,
    active_only: bool,
) -> Result<Vec<ListEntry>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT w."id", w."word", w."phonetic", w."translation", w."example", w."difficulty",
               w."isActive", w."createdAt", w."updatedAt", m."order", m."addedAt"
        FROM "word_list_words" m
        JOIN "words" w ON w."id" = m."wordId"
        WHERE m."wordListId" = ? AND (? = 0 OR w."isActive" = 1)
        ORDER BY m."order" ASC, m."id" ASC
        "#,
    )
    .bind(list_id)
    .bind(active_only)
    .fetch_all(executor)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(ListEntry {
                word: map_word(row)?,
                order: row.try_get("order")?,
                added_at: row.try_get("addedAt")?,
            })
        })
        .collect()
}

pub async fn count_list_words(
    executor: impl SqliteExecutor<'_>,
    list_id: i64,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(r#"SELECT COUNT(*) FROM "word_list_words" WHERE "wordListId" = ?"#)
        .bind(list_id)
        .fetch_one(executor)
        .await
}

pub async fn list_word_texts(
    executor: impl SqliteExecutor<'_>,
    list_id: i64,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT w."word"
        FROM "word_list_words" m
        JOIN "words" w ON w."id" = m."wordId"
        WHERE m."wordListId" = ?
        "#,
    )
    .bind(list_id)
    .fetch_all(executor)
    .await
}

pub async fn membership_exists(
    executor: impl SqliteExecutor<'_>,
    list_id: i64,
    word_id: i64,
) -> Result<bool, sqlx::Error> {
    let found: Option<i64> = sqlx::query_scalar(
        r#"SELECT "id" FROM "word_list_words" WHERE "wordListId" = ? AND "wordId" = ?"#,
    )
    .bind(list_id)
    .bind(word_id)
    .fetch_optional(executor)
    .await?;
    Ok(found.is_some())
}

pub async fn list_contains_text(
    executor: impl SqliteExecutor<'_>,
    list_id: i64,
    text: &str,
) -> Result<bool, sqlx::Error> {
    let found: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT m."id"
        FROM "word_list_words" m
        JOIN "words" w ON w."id" = m."wordId"
        WHERE m."wordListId" = ? AND w."word" = ?
        LIMIT 1
        "#,
    )
    .bind(list_id)
    .bind(text)
    .fetch_optional(executor)
    .await?;
    Ok(found.is_some())
}

/// Appends `word_id` at `max(order) + 1` and returns the order used.
/// Callers hold a transaction so the read and the insert see the same list.
pub async fn append_membership(
    conn: &mut SqliteConnection,
    list_id: i64,
    word_id: i64,
) -> Result<i64, sqlx::Error> {
    let order: i64 = sqlx::query_scalar(
        r#"SELECT COALESCE(MAX("order"), 0) + 1 FROM "word_list_words" WHERE "wordListId" = ?"#,
    )
    .bind(list_id)
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO "word_list_words" ("wordListId","wordId","order","addedAt")
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(list_id)
    .bind(word_id)
    .bind(order)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;
    Ok(order)
}

pub async fn remove_membership(
    executor: impl SqliteExecutor<'_>,
    list_id: i64,
    word_id: i64,
) -> Result<u64, sqlx::Error> {
    let result =
        sqlx::query(r#"DELETE FROM "word_list_words" WHERE "wordListId" = ? AND "wordId" = ?"#)
            .bind(list_id)
            .bind(word_id)
            .execute(executor)
            .await?;
    Ok(result.rows_affected())
}

/// Bound parameters per batch delete statement, below SQLite's variable limit.
pub const REMOVE_CHUNK_SIZE: usize = 500;

/// Deletes the given memberships in chunks of [`REMOVE_CHUNK_SIZE`] ids.
pub async fn remove_memberships(
    conn: &mut SqliteConnection,
    list_id: i64,
    word_ids: &[i64],
) -> Result<u64, sqlx::Error> {
    let mut removed = 0;
    for chunk in word_ids.chunks(REMOVE_CHUNK_SIZE) {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(r#"DELETE FROM "word_list_words" WHERE "wordListId" = "#);
        builder.push_bind(list_id);
        builder.push(r#" AND "wordId" IN ("#);
        let mut separated = builder.separated(", ");
        for id in chunk {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        removed += builder.build().execute(&mut *conn).await?.rows_affected();
    }
    Ok(removed)
}
