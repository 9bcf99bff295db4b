use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use super::{merge_fields, Document, DocumentStore, Filter, UpdateCounts};
use crate::report::ReportId;
use crate::{now_s, open_db_connection, shared_memory_uri};

/// SQLite-backed document store. One table holds every collection; each
/// store instance is bound to a single collection.
pub struct SqliteDocumentStore {
    conn: Connection,
    collection: String,
}

impl SqliteDocumentStore {
    /// Open (or create) the database. `":memory:"` opens a fresh private
    /// shared-cache database.
    pub fn open(db_path: &str, collection: &str) -> Result<Self> {
        let db_path = if db_path == ":memory:" {
            shared_memory_uri()
        } else {
            db_path.to_string()
        };
        let conn = open_db_connection(&db_path)
            .with_context(|| format!("open document database {}", db_path))?;
        let mut store = Self {
            conn,
            collection: collection.to_string(),
        };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&mut self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS documents (
              id TEXT PRIMARY KEY,
              collection TEXT NOT NULL,
              created_at INTEGER NOT NULL,
              body_json TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);
            "#,
        )?;
        Ok(())
    }

    fn load(&self, id: &str) -> Result<Option<Document>> {
        let body: Option<String> = self
            .conn
            .query_row(
                "SELECT body_json FROM documents WHERE id = ?1 AND collection = ?2",
                params![id, self.collection],
                |row| row.get(0),
            )
            .optional()?;
        body.map(|json| parse_body(&json)).transpose()
    }
}

fn parse_body(json: &str) -> Result<Document> {
    serde_json::from_str(json).map_err(|e| anyhow!("corrupt document body: {}", e))
}

impl DocumentStore for SqliteDocumentStore {
    fn insert(&mut self, doc: &Document) -> Result<ReportId> {
        let id = ReportId::random();
        let created_at = now_s()? as i64;
        let body_json = serde_json::to_string(doc)?;
        self.conn.execute(
            r#"
            INSERT INTO documents(id, collection, created_at, body_json)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![id.to_string(), self.collection, created_at, body_json],
        )?;
        Ok(id)
    }

    fn find_one(&mut self, id: &ReportId) -> Result<Option<Document>> {
        self.load(&id.to_string())
    }

    fn find_many(&mut self, filter: &Filter) -> Result<Vec<(ReportId, Document)>> {
        let rows = {
            let mut stmt = self
                .conn
                .prepare("SELECT id, body_json FROM documents WHERE collection = ?1")?;
            let mut rows = stmt.query(params![self.collection])?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                let id: String = row.get(0)?;
                let body: String = row.get(1)?;
                out.push((id, body));
            }
            out
        };

        let mut out = Vec::with_capacity(rows.len());
        for (raw_id, body) in rows {
            let Ok(id) = raw_id.parse::<ReportId>() else {
                log::warn!("skipping document with corrupt id '{}'", raw_id);
                continue;
            };
            let doc = match parse_body(&body) {
                Ok(doc) => doc,
                Err(err) => {
                    log::warn!("skipping document {}: {:#}", id, err);
                    continue;
                }
            };
            if filter.matches(&doc) {
                out.push((id, doc));
            }
        }
        Ok(out)
    }

    fn update_one(&mut self, id: &ReportId, fields: &Document) -> Result<UpdateCounts> {
        let key = id.to_string();
        let tx = self.conn.transaction()?;
        let body: Option<String> = tx
            .query_row(
                "SELECT body_json FROM documents WHERE id = ?1 AND collection = ?2",
                params![key, self.collection],
                |row| row.get(0),
            )
            .optional()?;
        let Some(body) = body else {
            return Ok(UpdateCounts::default());
        };

        let mut doc = parse_body(&body)?;
        if !merge_fields(&mut doc, fields) {
            return Ok(UpdateCounts {
                matched: 1,
                modified: 0,
            });
        }
        tx.execute(
            "UPDATE documents SET body_json = ?1 WHERE id = ?2 AND collection = ?3",
            params![serde_json::to_string(&doc)?, key, self.collection],
        )?;
        tx.commit()?;
        Ok(UpdateCounts {
            matched: 1,
            modified: 1,
        })
    }
}
