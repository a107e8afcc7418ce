use chrono::{DateTime, Utc};

use crate::db::Db;
use crate::error::Result;
use crate::properties::{list_properties, PropertyRef};

/// Find the property a dropped folder belongs to.
///
/// Comparison is case-insensitive on trimmed names: exact match, or either
/// name containing the other. Longer titles are tried first so the most
/// specific property wins ("Oak House Annex" over "Oak House").
pub fn match_property(folder_name: &str, properties: &[PropertyRef]) -> Option<PropertyRef> {
    let folder = normalize(folder_name);
    if folder.is_empty() {
        return None;
    }

    let mut candidates: Vec<&PropertyRef> = properties.iter().collect();
    // Stable: equal lengths keep directory order
    candidates.sort_by(|a, b| b.title.chars().count().cmp(&a.title.chars().count()));

    candidates
        .into_iter()
        .find(|p| {
            let title = normalize(&p.title);
            !title.is_empty()
                && (title == folder || title.contains(&folder) || folder.contains(&title))
        })
        .cloned()
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Session-scoped copy of the property list.
///
/// Fetched on first use and kept until `refresh` is called, so a matching
/// run works against one consistent snapshot.
pub struct PropertyDirectory {
    db: Db,
    cache: Option<Vec<PropertyRef>>,
    fetched_at: Option<DateTime<Utc>>,
}

impl PropertyDirectory {
    pub fn new(db: Db) -> Self {
        Self {
            db,
            cache: None,
            fetched_at: None,
        }
    }

    /// Cached list, loading it on first call
    pub async fn properties(&mut self) -> Result<&[PropertyRef]> {
        if self.cache.is_none() {
            self.refresh().await?;
        }
        Ok(self.cache.as_deref().unwrap_or_default())
    }

    /// Re-read the property list from the database
    pub async fn refresh(&mut self) -> Result<usize> {
        let properties = list_properties(&self.db).await?;
        let count = properties.len();
        self.cache = Some(properties);
        self.fetched_at = Some(Utc::now());
        log::debug!("Property directory loaded ({} properties)", count);
        Ok(count)
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.fetched_at
    }

    pub async fn find(&mut self, id: i64) -> Result<Option<PropertyRef>> {
        Ok(self.properties().await?.iter().find(|p| p.id == id).cloned())
    }

    pub async fn match_folder(&mut self, folder_name: &str) -> Result<Option<PropertyRef>> {
        Ok(match_property(folder_name, self.properties().await?))
    }
}
