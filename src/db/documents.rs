use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::helpers::{merge_shallow, parse_datetime, parse_document};
use super::query::{Collection, Query};
use super::Database;
use crate::error::{MonitorError, MonitorResult};

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn decode<T: DeserializeOwned>(&self) -> MonitorResult<T> {
        serde_json::from_value(self.data.clone()).map_err(|err| {
            MonitorError::Storage(format!("document {} has unexpected shape: {err}", self.id))
        })
    }
}

fn row_to_document(row: &Row, collection: &str) -> anyhow::Result<Document> {
    let id: String = row.get("id")?;
    let data: String = row.get("data")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(Document {
        data: parse_document(&data, collection, &id)?,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
        id,
    })
}

fn to_object(value: Value) -> MonitorResult<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(MonitorError::InvalidInput(format!(
            "documents must be JSON objects, got {other}"
        ))),
    }
}

fn encode<T: Serialize>(value: &T) -> MonitorResult<Map<String, Value>> {
    let value = serde_json::to_value(value)
        .map_err(|err| MonitorError::InvalidInput(format!("failed to encode document: {err}")))?;
    to_object(value)
}

fn load(
    conn: &rusqlite::Connection,
    collection: &str,
    id: &str,
) -> anyhow::Result<Option<Document>> {
    let mut stmt = conn.prepare(
        "SELECT id, data, created_at, updated_at
         FROM documents
         WHERE collection = ?1 AND id = ?2",
    )?;
    let mut rows = stmt.query(params![collection, id])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_document(row, collection)?)),
        None => Ok(None),
    }
}

fn store(
    conn: &rusqlite::Connection,
    collection: &str,
    id: &str,
    data: &Map<String, Value>,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let body = serde_json::to_string(data).context("failed to serialize document")?;
    conn.execute(
        "INSERT INTO documents (collection, id, data, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)
         ON CONFLICT (collection, id) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
        params![collection, id, body, now.to_rfc3339()],
    )
    .with_context(|| format!("failed to write document {collection}/{id}"))?;
    Ok(())
}

impl Database {
    /// Inserts a document under a fresh id and returns the id.
    pub async fn create<T: Serialize>(&self, collection: Collection, value: &T) -> MonitorResult<String> {
        let id = Uuid::new_v4().to_string();
        self.set(collection, &id, value, false).await?;
        Ok(id)
    }

    /// Writes a document. With `merge` the given keys are merged into an
    /// existing document instead of replacing it.
    pub async fn set<T: Serialize>(
        &self,
        collection: Collection,
        id: &str,
        value: &T,
        merge: bool,
    ) -> MonitorResult<()> {
        let data = encode(value)?;
        let id = id.to_string();
        self.execute(move |conn| {
            let now = Utc::now();
            let key = collection.as_str();
            let data = match (merge, load(conn, key, &id)?) {
                (true, Some(existing)) => {
                    let mut current = match existing.data {
                        Value::Object(map) => map,
                        _ => Map::new(),
                    };
                    merge_shallow(&mut current, data);
                    current
                }
                _ => data,
            };
            store(conn, key, &id, &data, now)
        })
        .await?;
        self.notify_changed(collection);
        Ok(())
    }

    pub async fn get(&self, collection: Collection, id: &str) -> MonitorResult<Option<Document>> {
        let id = id.to_string();
        let document = self
            .execute(move |conn| load(conn, collection.as_str(), &id))
            .await?;
        Ok(document)
    }

    pub async fn get_as<T: DeserializeOwned>(
        &self,
        collection: Collection,
        id: &str,
    ) -> MonitorResult<Option<T>> {
        self.get(collection, id)
            .await?
            .map(|document| document.decode())
            .transpose()
    }

    /// Merges `patch` into an existing document; `NotFound` when it is missing.
    pub async fn update(&self, collection: Collection, id: &str, patch: Value) -> MonitorResult<()> {
        let patch = to_object(patch)?;
        let key_id = id.to_string();
        let updated = self
            .execute(move |conn| {
                let key = collection.as_str();
                let Some(existing) = load(conn, key, &key_id)? else {
                    return Ok(false);
                };
                let mut current = match existing.data {
                    Value::Object(map) => map,
                    _ => return Err(anyhow!("document {key}/{key_id} is not an object")),
                };
                merge_shallow(&mut current, patch);
                store(conn, key, &key_id, &current, Utc::now())?;
                Ok(true)
            })
            .await?;

        if !updated {
            return Err(MonitorError::NotFound(format!("{collection}/{id}")));
        }
        self.notify_changed(collection);
        Ok(())
    }

    /// Removes a document. Returns whether it existed.
    pub async fn delete(&self, collection: Collection, id: &str) -> MonitorResult<bool> {
        let id = id.to_string();
        let removed = self
            .execute(move |conn| {
                let count = conn
                    .execute(
                        "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                        params![collection.as_str(), id],
                    )
                    .context("failed to delete document")?;
                Ok(count > 0)
            })
            .await?;
        if removed {
            self.notify_changed(collection);
        }
        Ok(removed)
    }

    pub async fn query(&self, query: &Query) -> MonitorResult<Vec<Document>> {
        let collection = query.collection;
        let documents = self
            .execute(move |conn| {
                let key = collection.as_str();
                let mut stmt = conn.prepare(
                    "SELECT id, data, created_at, updated_at
                     FROM documents
                     WHERE collection = ?1
                     ORDER BY created_at ASC, id ASC",
                )?;
                let mut rows = stmt.query(params![key])?;
                let mut documents = Vec::new();
                while let Some(row) = rows.next()? {
                    documents.push(row_to_document(row, key)?);
                }
                Ok(documents)
            })
            .await?;
        Ok(query.apply(documents))
    }

    pub async fn query_as<T: DeserializeOwned>(&self, query: &Query) -> MonitorResult<Vec<(String, T)>> {
        self.query(query)
            .await?
            .into_iter()
            .map(|document| -> MonitorResult<(String, T)> {
                let value = document.decode()?;
                Ok((document.id, value))
            })
            .collect()
    }

    pub async fn exists(&self, collection: Collection, id: &str) -> MonitorResult<bool> {
        let id = id.to_string();
        let found = self
            .execute(move |conn| {
                conn.query_row(
                    "SELECT 1 FROM documents WHERE collection = ?1 AND id = ?2",
                    params![collection.as_str(), id],
                    |_| Ok(()),
                )
                .optional()
                .context("failed to look up document")
            })
            .await?;
        Ok(found.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use tempfile::tempdir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct Note {
        title: String,
        class_id: String,
    }

    #[tokio::test]
    async fn create_get_and_decode() {
        let dir = tempdir().unwrap();
        let db = Database::new(dir.path().join("store.sqlite3")).unwrap();

        let note = Note {
            title: "Fractions".into(),
            class_id: "c1".into(),
        };
        let id = db.create(Collection::Summaries, &note).await.unwrap();
        let loaded: Note = db.get_as(Collection::Summaries, &id).await.unwrap().unwrap();
        assert_eq!(loaded, note);
        assert!(db.exists(Collection::Summaries, &id).await.unwrap());
        assert!(db.get(Collection::Classes, &id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_with_merge_keeps_other_fields() {
        let dir = tempdir().unwrap();
        let db = Database::new(dir.path().join("store.sqlite3")).unwrap();

        db.set(Collection::Users, "u1", &json!({"fullName": "Ada", "role": "student"}), false)
            .await
            .unwrap();
        db.set(Collection::Users, "u1", &json!({"role": "teacher"}), true)
            .await
            .unwrap();
        let doc = db.get(Collection::Users, "u1").await.unwrap().unwrap();
        assert_eq!(doc.data, json!({"fullName": "Ada", "role": "teacher"}));

        db.set(Collection::Users, "u1", &json!({"role": "student"}), false)
            .await
            .unwrap();
        let doc = db.get(Collection::Users, "u1").await.unwrap().unwrap();
        assert_eq!(doc.data, json!({"role": "student"}));
    }

    #[tokio::test]
    async fn update_missing_document_is_not_found() {
        let dir = tempdir().unwrap();
        let db = Database::new(dir.path().join("store.sqlite3")).unwrap();

        let err = db
            .update(Collection::Classes, "nope", json!({"name": "x"}))
            .await
            .unwrap_err();
        assert!(matches!(err, MonitorError::NotFound(_)));

        let err = db
            .set(Collection::Classes, "c1", &json!(["not", "an", "object"]), false)
            .await
            .unwrap_err();
        assert!(matches!(err, MonitorError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn delete_and_query() {
        let dir = tempdir().unwrap();
        let db = Database::new(dir.path().join("store.sqlite3")).unwrap();

        for (id, teacher) in [("c1", "t1"), ("c2", "t2"), ("c3", "t1")] {
            db.set(Collection::Classes, id, &json!({"teacherId": teacher}), false)
                .await
                .unwrap();
        }
        assert!(db.delete(Collection::Classes, "c3").await.unwrap());
        assert!(!db.delete(Collection::Classes, "c3").await.unwrap());

        let docs = db
            .query(&Query::new(Collection::Classes).where_eq("teacherId", "t1"))
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "c1");
    }

    #[tokio::test]
    async fn documents_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.sqlite3");
        {
            let db = Database::new(path.clone()).unwrap();
            db.set(Collection::Sessions, "s1", &json!({"sessionName": "Intro"}), false)
                .await
                .unwrap();
        }
        let db = Database::new(path).unwrap();
        let doc = db.get(Collection::Sessions, "s1").await.unwrap().unwrap();
        assert_eq!(doc.data["sessionName"], "Intro");
    }
}
