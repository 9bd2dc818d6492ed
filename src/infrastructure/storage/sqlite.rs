//! SQLite document store
//!
//! All collections share the `documents` table; filters compile to
//! `json_extract` / `json_type` predicates. Scans page through rows by id
//! so a pass never holds the whole collection in memory.

use std::collections::VecDeque;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use serde_json::Value;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use super::{Document, DocumentStore, DocumentStream, Filter, UpsertOutcome};
use crate::domain::errors::{StoreError, StoreResult};

/// Rows fetched per scan page.
pub const SCAN_PAGE_SIZE: usize = 100;

/// Takes the write lock up front. A deferred transaction that reads first
/// fails with `SQLITE_BUSY` when another writer holds the lock.
const BEGIN_WRITE: &str = "BEGIN IMMEDIATE";

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    /// Wrap a pool whose schema was created by `DatabaseConnection::migrate`.
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn push_conditions(builder: &mut QueryBuilder<'_, Sqlite>, collection: &str, filter: &Filter) -> StoreResult<()> {
    builder.push(" WHERE collection = ").push_bind(collection.to_string());

    for (path, value) in filter.conditions() {
        let json_path = format!("$.{path}");
        match value {
            Value::Null => {
                builder
                    .push(" AND COALESCE(json_type(document, ")
                    .push_bind(json_path)
                    .push("), 'null') = 'null'");
            }
            Value::Bool(flag) => {
                builder
                    .push(" AND json_type(document, ")
                    .push_bind(json_path)
                    .push(") = ")
                    .push_bind(if *flag { "true" } else { "false" });
            }
            Value::Number(number) => {
                builder.push(" AND json_extract(document, ").push_bind(json_path).push(") = ");
                if let Some(int) = number.as_i64() {
                    builder.push_bind(int);
                } else if let Some(float) = number.as_f64() {
                    builder.push_bind(float);
                } else {
                    return Err(StoreError::InvalidFilter(format!("{path}: unsupported number {number}")));
                }
            }
            Value::String(text) => {
                builder
                    .push(" AND json_type(document, ")
                    .push_bind(json_path.clone())
                    .push(") = 'text' AND json_extract(document, ")
                    .push_bind(json_path)
                    .push(") = ")
                    .push_bind(text.clone());
            }
            Value::Array(_) | Value::Object(_) => {
                return Err(StoreError::InvalidFilter(format!(
                    "{path}: only scalar values can be matched"
                )));
            }
        }
    }

    Ok(())
}

/// Row id plus the decoded document. A malformed document only fails its own row.
fn decode_row(row: &sqlx::sqlite::SqliteRow) -> StoreResult<(i64, StoreResult<Document>)> {
    let id: i64 = row.try_get("id")?;
    let raw: String = row.try_get("document")?;
    Ok((id, serde_json::from_str(&raw).map_err(StoreError::from)))
}

async fn select_page(
    pool: &SqlitePool,
    collection: &str,
    filter: &Filter,
    after_id: i64,
    limit: usize,
) -> StoreResult<Vec<(i64, StoreResult<Document>)>> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT id, document FROM documents");
    push_conditions(&mut builder, collection, filter)?;
    builder
        .push(" AND id > ")
        .push_bind(after_id)
        .push(" ORDER BY id LIMIT ")
        .push_bind(to_i64(limit));

    let rows = builder.build().fetch_all(pool).await?;
    rows.iter().map(decode_row).collect()
}

async fn first_match_id(
    connection: &mut SqliteConnection,
    collection: &str,
    filter: &Filter,
) -> StoreResult<Option<i64>> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT id FROM documents");
    push_conditions(&mut builder, collection, filter)?;
    builder.push(" ORDER BY id LIMIT 1");

    let row = builder.build().fetch_optional(&mut *connection).await?;
    Ok(row.map(|row| row.try_get::<i64, _>("id")).transpose()?)
}

async fn replace_by_id(connection: &mut SqliteConnection, id: i64, document: &Document) -> StoreResult<()> {
    sqlx::query("UPDATE documents SET document = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?")
        .bind(serde_json::to_string(document)?)
        .bind(id)
        .execute(&mut *connection)
        .await?;
    Ok(())
}

async fn insert_document(connection: &mut SqliteConnection, collection: &str, document: &Document) -> StoreResult<()> {
    sqlx::query("INSERT INTO documents (collection, document) VALUES (?, ?)")
        .bind(collection)
        .bind(serde_json::to_string(document)?)
        .execute(&mut *connection)
        .await?;
    Ok(())
}

struct ScanState {
    pool: SqlitePool,
    collection: String,
    filter: Filter,
    buffer: VecDeque<(i64, StoreResult<Document>)>,
    last_id: i64,
    exhausted: bool,
}

impl ScanState {
    async fn next(mut self) -> Option<(StoreResult<Document>, Self)> {
        loop {
            match self.buffer.pop_front() {
                Some((id, document)) => {
                    self.last_id = id;
                    return Some((document, self));
                }
                None if self.exhausted => return None,
                None => {
                    match select_page(&self.pool, &self.collection, &self.filter, self.last_id, SCAN_PAGE_SIZE).await {
                        Ok(page) => {
                            self.exhausted = page.len() < SCAN_PAGE_SIZE;
                            self.buffer.extend(page);
                        }
                        Err(e) => {
                            self.exhausted = true;
                            return Some((Err(e), self));
                        }
                    }
                }
            }
        }
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn scan(&self, collection: &str, filter: &Filter) -> StoreResult<DocumentStream> {
        // The first page is read eagerly: failing here means the scan could not be opened.
        let first_page = select_page(&self.pool, collection, filter, 0, SCAN_PAGE_SIZE).await?;
        debug!(collection, rows = first_page.len(), "Opened document scan");

        let state = ScanState {
            pool: self.pool.clone(),
            collection: collection.to_string(),
            filter: filter.clone(),
            exhausted: first_page.len() < SCAN_PAGE_SIZE,
            buffer: first_page.into(),
            last_id: 0,
        };

        Ok(stream::unfold(state, ScanState::next).boxed())
    }

    async fn get(&self, collection: &str, filter: &Filter) -> StoreResult<Document> {
        self.find(collection, filter, 1)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
            })
    }

    async fn find(&self, collection: &str, filter: &Filter, limit: usize) -> StoreResult<Vec<Document>> {
        select_page(&self.pool, collection, filter, 0, limit)
            .await?
            .into_iter()
            .map(|(_, document)| document)
            .collect()
    }

    async fn upsert(&self, collection: &str, filter: &Filter, document: Document) -> StoreResult<UpsertOutcome> {
        let mut tx = self.pool.begin_with(BEGIN_WRITE).await?;

        let outcome = match first_match_id(&mut tx, collection, filter).await? {
            Some(id) => {
                replace_by_id(&mut tx, id, &document).await?;
                UpsertOutcome::Updated
            }
            None => {
                insert_document(&mut tx, collection, &document).await?;
                UpsertOutcome::Inserted
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn insert(&self, collection: &str, document: Document) -> StoreResult<()> {
        let mut connection = self.pool.acquire().await?;
        insert_document(&mut connection, collection, &document).await
    }

    async fn insert_if_absent(&self, collection: &str, filter: &Filter, document: Document) -> StoreResult<bool> {
        let mut tx = self.pool.begin_with(BEGIN_WRITE).await?;

        if first_match_id(&mut tx, collection, filter).await?.is_some() {
            return Ok(false);
        }
        insert_document(&mut tx, collection, &document).await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn update(&self, collection: &str, filter: &Filter, document: Document) -> StoreResult<bool> {
        let mut tx = self.pool.begin_with(BEGIN_WRITE).await?;

        let Some(id) = first_match_id(&mut tx, collection, filter).await? else {
            return Ok(false);
        };
        replace_by_id(&mut tx, id, &document).await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn delete(&self, collection: &str, filter: &Filter) -> StoreResult<u64> {
        let mut builder = QueryBuilder::<Sqlite>::new("DELETE FROM documents");
        push_conditions(&mut builder, collection, filter)?;

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
