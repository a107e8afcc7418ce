//! Property records: the directory the matcher reads and the store the
//! reconciliation step writes into.

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::db::Db;
use crate::error::{PropmediaError, Result};

/// Minimal property reference used for folder matching
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyRef {
    pub id: i64,
    pub title: String,
}

/// Full property media state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Property {
    pub id: i64,
    pub title: String,
    pub hero_image: Option<String>,
    pub floor_plan_image: Option<String>,
    pub gallery_images: Vec<String>,
}

/// Partial media update. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaFields {
    pub gallery_images: Option<Vec<String>>,
    pub hero_image: Option<String>,
    pub floor_plan_image: Option<String>,
}

/// All properties as `{id, title}`, ordered by title
pub async fn list_properties(db: &Db) -> Result<Vec<PropertyRef>> {
    db.with_connection(|conn| {
        let mut stmt = conn.prepare("SELECT id, title FROM properties ORDER BY title")?;
        let rows = stmt.query_map([], |row| {
            Ok(PropertyRef {
                id: row.get(0)?,
                title: row.get(1)?,
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, rusqlite::Error>>()
            .map_err(PropmediaError::Database)
    })
    .await
}

pub async fn get_property(db: &Db, id: i64) -> Result<Property> {
    db.with_connection(move |conn| {
        let row = conn
            .query_row(
                "SELECT id, title, hero_image, floor_plan_image, gallery_images \
                 FROM properties WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        let (id, title, hero_image, floor_plan_image, gallery_json) =
            row.ok_or(PropmediaError::PropertyNotFound(id))?;

        Ok(Property {
            id,
            title,
            hero_image,
            floor_plan_image,
            gallery_images: parse_gallery(&gallery_json)?,
        })
    })
    .await
}

/// Create a property with an empty gallery. Returns the new id.
pub async fn insert_property(db: &Db, title: &str) -> Result<i64> {
    let title = title.trim().to_string();
    if title.is_empty() {
        return Err(PropmediaError::InvalidInput("property title is empty".to_string()));
    }
    db.with_connection(move |conn| {
        conn.execute("INSERT INTO properties (title) VALUES (?1)", params![title])?;
        Ok(conn.last_insert_rowid())
    })
    .await
}

/// Current gallery list of a property
pub async fn load_gallery(db: &Db, id: i64) -> Result<Vec<String>> {
    db.with_connection(move |conn| read_gallery(conn, id)).await
}

/// Apply a partial media update as a single statement
pub async fn update_media(db: &Db, id: i64, fields: MediaFields) -> Result<()> {
    db.with_connection(move |conn| write_media(conn, id, &fields)).await
}

pub(crate) fn read_gallery(conn: &Connection, id: i64) -> Result<Vec<String>> {
    let gallery_json: Option<String> = conn
        .query_row(
            "SELECT gallery_images FROM properties WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    let gallery_json = gallery_json.ok_or(PropmediaError::PropertyNotFound(id))?;
    parse_gallery(&gallery_json)
}

pub(crate) fn write_media(conn: &Connection, id: i64, fields: &MediaFields) -> Result<()> {
    let gallery_json = fields
        .gallery_images
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    let changed = conn.execute(
        r#"
        UPDATE properties SET
            gallery_images = COALESCE(?2, gallery_images),
            hero_image = COALESCE(?3, hero_image),
            floor_plan_image = COALESCE(?4, floor_plan_image),
            updated_at = CURRENT_TIMESTAMP
        WHERE id = ?1
        "#,
        params![id, gallery_json, fields.hero_image, fields.floor_plan_image],
    )?;
    if changed == 0 {
        return Err(PropmediaError::PropertyNotFound(id));
    }
    Ok(())
}

pub(crate) fn parse_gallery(json: &str) -> Result<Vec<String>> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(json)?)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::migrate;
    use tempfile::TempDir;

    pub(crate) async fn setup_test_db() -> (Db, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Db::new(temp_dir.path().join("test.db"));
        db.with_connection(migrate::run_migrations).await.unwrap();
        (db, temp_dir)
    }

    #[tokio::test]
    async fn test_list_properties_ordered_by_title() {
        let (db, _temp_dir) = setup_test_db().await;
        insert_property(&db, "Willow Cottage").await.unwrap();
        insert_property(&db, "Oak House").await.unwrap();
        insert_property(&db, "Maple Court").await.unwrap();

        let titles: Vec<String> = list_properties(&db)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(titles, vec!["Maple Court", "Oak House", "Willow Cottage"]);
    }

    #[tokio::test]
    async fn test_insert_rejects_blank_title() {
        let (db, _temp_dir) = setup_test_db().await;
        let err = insert_property(&db, "   ").await.unwrap_err();
        assert!(matches!(err, PropmediaError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_update_media_is_partial() {
        let (db, _temp_dir) = setup_test_db().await;
        let id = insert_property(&db, "Oak House").await.unwrap();

        update_media(&db, id, MediaFields {
            gallery_images: Some(vec!["https://cdn/a.jpg".to_string()]),
            hero_image: Some("https://cdn/hero.jpg".to_string()),
            floor_plan_image: None,
        }).await.unwrap();

        // Only the floor plan changes; hero and gallery stay
        update_media(&db, id, MediaFields {
            floor_plan_image: Some("https://cdn/plan.png".to_string()),
            ..Default::default()
        }).await.unwrap();

        let property = get_property(&db, id).await.unwrap();
        assert_eq!(property.hero_image.as_deref(), Some("https://cdn/hero.jpg"));
        assert_eq!(property.floor_plan_image.as_deref(), Some("https://cdn/plan.png"));
        assert_eq!(property.gallery_images, vec!["https://cdn/a.jpg"]);
    }

    #[tokio::test]
    async fn test_missing_property() {
        let (db, _temp_dir) = setup_test_db().await;
        assert!(matches!(
            get_property(&db, 42).await.unwrap_err(),
            PropmediaError::PropertyNotFound(42)
        ));
        assert!(matches!(
            load_gallery(&db, 42).await.unwrap_err(),
            PropmediaError::PropertyNotFound(42)
        ));
        assert!(matches!(
            update_media(&db, 42, MediaFields::default()).await.unwrap_err(),
            PropmediaError::PropertyNotFound(42)
        ));
    }
}
