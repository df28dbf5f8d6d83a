// ABOUTME: SQLite-backed document store
// ABOUTME: One documents table with JSON fields, json_extract filters and revision checks

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{migrate::MigrateDatabase, Row};
use tracing::{debug, info};

use crate::document::{Document, DocumentStore, Fields, SYSTEM_FIELDS};
use crate::error::{StorageError, StorageResult};
use crate::query::{Filter, Query, SortOrder};

/// Columns that back system fields directly
fn system_column(field: &str) -> Option<&'static str> {
    match field {
        "id" => Some("id"),
        "revision" => Some("revision"),
        "created_at" => Some("created_at"),
        "updated_at" => Some("updated_at"),
        _ => None,
    }
}

enum Bind {
    Text(String),
    Int(i64),
    Real(f64),
}

impl Bind {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Bind::Text(s.clone())),
            Value::Bool(b) => Some(Bind::Int(i64::from(*b))),
            Value::Number(n) => n
                .as_i64()
                .map(Bind::Int)
                .or_else(|| n.as_f64().map(Bind::Real)),
            _ => None,
        }
    }
}

pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    /// Wrap an existing pool; migrations must already have run
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database at `database_url` and apply migrations
    pub async fn connect(database_url: &str, max_connections: u32) -> StorageResult<Self> {
        let in_memory = database_url.contains(":memory:");

        if !in_memory && !sqlx::Sqlite::database_exists(database_url).await? {
            debug!("Creating database at: {}", database_url);
            sqlx::Sqlite::create_database(database_url).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { max_connections })
            .connect(database_url)
            .await?;

        if !in_memory {
            sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
        }
        sqlx::query("PRAGMA synchronous = NORMAL")
            .execute(&pool)
            .await?;

        Self::migrate(&pool).await?;
        info!("Document store ready at {}", database_url);
        Ok(Self::new(pool))
    }

    pub async fn migrate(pool: &SqlitePool) -> StorageResult<()> {
        sqlx::migrate!("./migrations").run(pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn row_to_document(row: &SqliteRow) -> StorageResult<Document> {
        let fields_json: String = row.try_get("fields")?;
        let fields: Fields = serde_json::from_str(&fields_json)?;
        let created_at: DateTime<Utc> = row.try_get("created_at")?;
        let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

        Ok(Document {
            id: row.try_get("id")?,
            collection: row.try_get("collection")?,
            fields,
            revision: row.try_get("revision")?,
            created_at,
            updated_at,
        })
    }

    async fn fetch(&self, collection: &str, id: &str) -> StorageResult<Option<Document>> {
        let row = sqlx::query(
            r#"
            SELECT collection, id, fields, revision, created_at, updated_at
            FROM documents
            WHERE collection = ? AND id = ?
            "#,
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_document).transpose()
    }

    /// Build the WHERE/ORDER/LIMIT tail of a listing plus its bind values
    fn build_list_sql(query: &Query) -> (String, Vec<Bind>) {
        let mut sql = String::new();
        let mut binds = Vec::new();

        for filter in &query.filters {
            let (column, path) = match system_column(filter.field()) {
                Some(column) => (column.to_string(), None),
                None => (
                    "json_extract(fields, ?)".to_string(),
                    Some(format!("$.{}", filter.field())),
                ),
            };
            let push_path = |binds: &mut Vec<Bind>| {
                if let Some(path) = &path {
                    binds.push(Bind::Text(path.clone()));
                }
            };

            match filter {
                Filter::Equal(_, value) => match Bind::from_value(value) {
                    Some(bind) => {
                        sql.push_str(&format!(" AND {} = ?", column));
                        push_path(&mut binds);
                        binds.push(bind);
                    }
                    None => {
                        sql.push_str(&format!(" AND {} IS NULL", column));
                        push_path(&mut binds);
                    }
                },
                Filter::Contains(_, needle) => {
                    sql.push_str(&format!(" AND instr(lower({}), lower(?)) > 0", column));
                    push_path(&mut binds);
                    binds.push(Bind::Text(needle.clone()));
                }
                Filter::IsNull(_) => {
                    sql.push_str(&format!(" AND {} IS NULL", column));
                    push_path(&mut binds);
                }
            }
        }

        match &query.order {
            Some((field, order)) => {
                let direction = match order {
                    SortOrder::Asc => "ASC",
                    SortOrder::Desc => "DESC",
                };
                match system_column(field) {
                    Some(column) => sql.push_str(&format!(" ORDER BY {} {}, seq", column, direction)),
                    None => {
                        sql.push_str(&format!(" ORDER BY json_extract(fields, ?) {}, seq", direction));
                        binds.push(Bind::Text(format!("$.{}", field)));
                    }
                }
            }
            None => sql.push_str(" ORDER BY seq"),
        }

        if query.limit.is_some() || query.offset.is_some() {
            sql.push_str(" LIMIT ? OFFSET ?");
            let limit = query
                .limit
                .map(|l| i64::try_from(l).unwrap_or(i64::MAX))
                .unwrap_or(-1);
            let offset = query
                .offset
                .map(|o| i64::try_from(o).unwrap_or(i64::MAX))
                .unwrap_or(0);
            binds.push(Bind::Int(limit));
            binds.push(Bind::Int(offset));
        }

        (sql, binds)
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn create(&self, collection: &str, id: &str, fields: Fields) -> StorageResult<Document> {
        debug!("Creating document {}/{}", collection, id);
        let mut fields = fields;
        for key in SYSTEM_FIELDS {
            fields.remove(key);
        }
        let fields_json = serde_json::to_string(&fields)?;
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO documents (collection, id, fields, revision, created_at, updated_at)
            VALUES (?, ?, ?, 0, ?, ?)
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(&fields_json)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {}
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(StorageError::Duplicate {
                    collection: collection.to_string(),
                    id: id.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        }

        Ok(Document {
            id: id.to_string(),
            collection: collection.to_string(),
            fields,
            revision: 0,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get(&self, collection: &str, id: &str) -> StorageResult<Document> {
        debug!("Fetching document {}/{}", collection, id);
        self.fetch(collection, id)
            .await?
            .ok_or_else(|| StorageError::not_found(collection, id))
    }

    async fn list(&self, collection: &str, query: &Query) -> StorageResult<Vec<Document>> {
        query.validate()?;
        let (tail, binds) = Self::build_list_sql(query);
        let sql = format!(
            "SELECT collection, id, fields, revision, created_at, updated_at \
             FROM documents WHERE collection = ?{}",
            tail
        );
        debug!("Listing {} with {} filter(s)", collection, query.filters.len());

        let mut q = sqlx::query(&sql).bind(collection);
        for bind in binds {
            q = match bind {
                Bind::Text(s) => q.bind(s),
                Bind::Int(i) => q.bind(i),
                Bind::Real(f) => q.bind(f),
            };
        }

        let rows = q.fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_document).collect()
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Fields,
        expected_revision: Option<i64>,
    ) -> StorageResult<Document> {
        debug!("Updating document {}/{}", collection, id);
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            SELECT collection, id, fields, revision, created_at, updated_at
            FROM documents
            WHERE collection = ? AND id = ?
            "#,
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let mut doc = match row {
            Some(row) => Self::row_to_document(&row)?,
            None => return Err(StorageError::not_found(collection, id)),
        };

        if let Some(expected) = expected_revision {
            if doc.revision != expected {
                return Err(StorageError::Conflict {
                    collection: collection.to_string(),
                    id: id.to_string(),
                    expected,
                    actual: doc.revision,
                });
            }
        }

        for (key, value) in patch {
            if !SYSTEM_FIELDS.contains(&key.as_str()) {
                doc.fields.insert(key, value);
            }
        }
        let fields_json = serde_json::to_string(&doc.fields)?;
        let now = Utc::now();

        // The revision guard catches writers that committed between our read and write
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET fields = ?, revision = revision + 1, updated_at = ?
            WHERE collection = ? AND id = ? AND revision = ?
            "#,
        )
        .bind(&fields_json)
        .bind(now)
        .bind(collection)
        .bind(id)
        .bind(doc.revision)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::Conflict {
                collection: collection.to_string(),
                id: id.to_string(),
                expected: doc.revision,
                actual: doc.revision + 1,
            });
        }
        tx.commit().await?;

        doc.revision += 1;
        doc.updated_at = now;
        Ok(doc)
    }

    async fn delete(&self, collection: &str, id: &str) -> StorageResult<()> {
        debug!("Deleting document {}/{}", collection, id);
        let result = sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found(collection, id));
        }
        Ok(())
    }
}
