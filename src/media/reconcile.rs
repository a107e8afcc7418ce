use std::collections::HashSet;

use crate::db::Db;
use crate::error::{PropmediaError, Result};
use crate::properties::{read_gallery, write_media, MediaFields};

/// What a finished group contributes to its property
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaUpdate {
    pub hero: Option<String>,
    pub floorplan: Option<String>,
    pub gallery_urls: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub gallery_added: usize,
    pub duplicates_skipped: usize,
    pub gallery_len: usize,
    pub hero_set: bool,
    pub floorplan_set: bool,
}

/// Merge uploaded media into a property with a single update.
///
/// New gallery URLs are appended after the existing ones, skipping any URL
/// already present. Hero and floor plan are only written when a non-empty
/// value is supplied; existing values are never cleared.
pub async fn reconcile(db: &Db, property_id: i64, update: MediaUpdate) -> Result<ReconcileSummary> {
    db.with_connection(move |conn| {
        let tx = conn.transaction()?;

        let mut gallery = read_gallery(&tx, property_id)?;
        let mut seen: HashSet<String> = gallery.iter().cloned().collect();

        let mut summary = ReconcileSummary::default();
        for url in update.gallery_urls {
            if seen.insert(url.clone()) {
                gallery.push(url);
                summary.gallery_added += 1;
            } else {
                summary.duplicates_skipped += 1;
            }
        }
        summary.gallery_len = gallery.len();

        let hero_image = update.hero.filter(|u| !u.is_empty());
        let floor_plan_image = update.floorplan.filter(|u| !u.is_empty());
        summary.hero_set = hero_image.is_some();
        summary.floorplan_set = floor_plan_image.is_some();

        write_media(&tx, property_id, &MediaFields {
            gallery_images: Some(gallery),
            hero_image,
            floor_plan_image,
        })?;

        tx.commit()?;
        Ok(summary)
    })
    .await
    .map_err(|e| PropmediaError::Reconciliation(format!("property {}: {}", property_id, e)))
}
