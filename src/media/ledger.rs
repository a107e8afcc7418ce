//! Upload ledger: one row per object the uploader stored, with whether it
//! ended up referenced by a property field.

use rusqlite::params;
use serde::Serialize;

use super::classify::Classification;
use crate::db::Db;
use crate::error::{PropmediaError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub file_name: String,
    pub classification: Classification,
    pub remote_url: String,
    pub content_sha256: String,
    pub size_bytes: u64,
    pub linked: bool,
}

/// A stored object no property field points at
#[derive(Debug, Clone, Serialize)]
pub struct UnlinkedUpload {
    pub property_id: i64,
    pub folder: String,
    pub file_name: String,
    pub classification: String,
    pub remote_url: String,
    pub uploaded_at: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LedgerSummary {
    pub total: i64,
    pub linked: i64,
    pub unlinked: i64,
    pub total_bytes: i64,
    pub properties: i64,
}

pub async fn record_uploads(
    db: &Db,
    property_id: i64,
    folder: &str,
    entries: Vec<LedgerEntry>,
) -> Result<usize> {
    if entries.is_empty() {
        return Ok(0);
    }

    let folder = folder.to_string();
    db.with_connection(move |conn| {
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO media_uploads (
                    property_id, folder, file_name, classification,
                    remote_url, content_sha256, size_bytes, linked
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )?;
            for entry in &entries {
                stmt.execute(params![
                    property_id,
                    folder,
                    entry.file_name,
                    entry.classification.as_str(),
                    entry.remote_url,
                    entry.content_sha256,
                    entry.size_bytes as i64,
                    entry.linked,
                ])?;
            }
        }
        tx.commit()?;
        Ok::<usize, PropmediaError>(entries.len())
    })
    .await
}

pub async fn unlinked_uploads(db: &Db) -> Result<Vec<UnlinkedUpload>> {
    db.with_connection(|conn| {
        let mut stmt = conn.prepare(
            r#"
            SELECT property_id, folder, file_name, classification, remote_url, uploaded_at
            FROM media_uploads
            WHERE linked = 0
            ORDER BY uploaded_at, id
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(UnlinkedUpload {
                property_id: row.get(0)?,
                folder: row.get(1)?,
                file_name: row.get(2)?,
                classification: row.get(3)?,
                remote_url: row.get(4)?,
                uploaded_at: row.get(5)?,
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, rusqlite::Error>>()
            .map_err(PropmediaError::Database)
    })
    .await
}

pub async fn summary(db: &Db) -> Result<LedgerSummary> {
    db.with_connection(|conn| {
        let summary = conn.query_row(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(linked), 0),
                COALESCE(SUM(size_bytes), 0),
                COUNT(DISTINCT property_id)
            FROM media_uploads
            "#,
            [],
            |row| {
                let total: i64 = row.get(0)?;
                let linked: i64 = row.get(1)?;
                Ok(LedgerSummary {
                    total,
                    linked,
                    unlinked: total - linked,
                    total_bytes: row.get(2)?,
                    properties: row.get(3)?,
                })
            },
        )?;
        Ok(summary)
    })
    .await
}

/// Every URL the ledger knows about, linked or not
pub async fn recorded_urls(db: &Db) -> Result<Vec<String>> {
    db.with_connection(|conn| {
        let mut stmt = conn.prepare("SELECT remote_url FROM media_uploads")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        rows.collect::<std::result::Result<Vec<_>, rusqlite::Error>>()
            .map_err(PropmediaError::Database)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::properties::insert_property;
    use crate::properties::tests::setup_test_db;

    fn entry(name: &str, class: Classification, linked: bool) -> LedgerEntry {
        LedgerEntry {
            file_name: name.to_string(),
            classification: class,
            remote_url: format!("https://cdn/{}", name),
            content_sha256: "abc".to_string(),
            size_bytes: 100,
            linked,
        }
    }

    #[tokio::test]
    async fn test_record_and_summarize() {
        let (db, _temp_dir) = setup_test_db().await;
        let id = insert_property(&db, "Oak House").await.unwrap();

        let written = record_uploads(&db, id, "Oak House", vec![
            entry("hero.jpg", Classification::Hero, true),
            entry("front.jpg", Classification::Hero, false),
            entry("a.jpg", Classification::Gallery, true),
        ]).await.unwrap();
        assert_eq!(written, 3);

        let totals = summary(&db).await.unwrap();
        assert_eq!(totals.total, 3);
        assert_eq!(totals.linked, 2);
        assert_eq!(totals.unlinked, 1);
        assert_eq!(totals.total_bytes, 300);
        assert_eq!(totals.properties, 1);

        let unlinked = unlinked_uploads(&db).await.unwrap();
        assert_eq!(unlinked.len(), 1);
        assert_eq!(unlinked[0].file_name, "front.jpg");
        assert_eq!(unlinked[0].classification, "hero");

        assert_eq!(recorded_urls(&db).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_rows_survive_missing_and_deleted_properties() {
        let (db, _temp_dir) = setup_test_db().await;
        let id = insert_property(&db, "Oak House").await.unwrap();

        record_uploads(&db, 404, "Ghost House", vec![entry("a.jpg", Classification::Gallery, false)])
            .await
            .unwrap();
        record_uploads(&db, id, "Oak House", vec![entry("b.jpg", Classification::Gallery, true)])
            .await
            .unwrap();

        db.with_connection(move |conn| {
            conn.execute("DELETE FROM properties WHERE id = ?1", params![id])?;
            Ok(())
        })
        .await
        .unwrap();

        assert_eq!(recorded_urls(&db).await.unwrap().len(), 2);
        let unlinked = unlinked_uploads(&db).await.unwrap();
        assert_eq!(unlinked.len(), 1);
        assert_eq!(unlinked[0].property_id, 404);
    }

    #[tokio::test]
    async fn test_empty_ledger() {
        let (db, _temp_dir) = setup_test_db().await;
        assert_eq!(record_uploads(&db, 1, "x", Vec::new()).await.unwrap(), 0);
        let totals = summary(&db).await.unwrap();
        assert_eq!(totals.total, 0);
        assert_eq!(totals.unlinked, 0);
    }
}
