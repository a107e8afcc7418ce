//! Finds stored objects that no property refers to.
//!
//! Uploads that were stored but never linked (extra heroes, groups whose
//! property update failed) stay in the bucket. This walks a local storage
//! root and reports them.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use walkdir::WalkDir;

use crate::db::Db;
use crate::error::{PropmediaError, Result};
use crate::media::ledger::recorded_urls;
use crate::properties::parse_gallery;

#[derive(Debug, Clone, Serialize)]
pub struct OrphanedObject {
    pub relative_path: String,
    pub absolute_path: PathBuf,
    pub url: String,
    pub size_bytes: u64,
    /// Whether the upload ledger has a row for this object
    pub in_ledger: bool,
}

/// Every URL a property field currently points at
pub async fn referenced_urls(db: &Db) -> Result<HashSet<String>> {
    db.with_connection(|conn| {
        let mut stmt = conn.prepare(
            "SELECT hero_image, floor_plan_image, gallery_images FROM properties",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, Option<String>>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut urls = HashSet::new();
        for row in rows {
            let (hero, floor_plan, gallery_json) = row?;
            urls.extend(hero);
            urls.extend(floor_plan);
            urls.extend(parse_gallery(&gallery_json)?);
        }
        Ok(urls)
    })
    .await
}

/// Walk `root` and return every file whose public URL no property references.
pub async fn find_orphaned_objects(db: &Db, root: &Path, public_base_url: &str) -> Result<Vec<OrphanedObject>> {
    let referenced = referenced_urls(db).await?;
    let recorded: HashSet<String> = recorded_urls(db).await?.into_iter().collect();
    let base = public_base_url.trim_end_matches('/').to_string();
    let root = root.to_path_buf();

    tokio::task::spawn_blocking(move || -> Result<Vec<OrphanedObject>> {
        let mut orphans = Vec::new();
        if !root.exists() {
            log::warn!("Storage root {} does not exist", root.display());
            return Ok(orphans);
        }

        for entry in WalkDir::new(&root)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let relative_path = path
                .strip_prefix(&root)
                .map_err(|_| PropmediaError::Scan(format!(
                    "Failed to compute relative path for: {}",
                    path.display()
                )))?
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");

            let url = format!("{}/{}", base, relative_path);
            if referenced.contains(&url) {
                continue;
            }

            let size_bytes = entry.metadata().map(|m| m.len()).unwrap_or(0);
            orphans.push(OrphanedObject {
                in_ledger: recorded.contains(&url),
                relative_path,
                absolute_path: path.to_path_buf(),
                url,
                size_bytes,
            });
        }

        orphans.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        log::info!("{} orphaned object(s) under {}", orphans.len(), root.display());
        Ok(orphans)
    })
    .await
    .map_err(|e| PropmediaError::Scan(format!("audit task failed: {}", e)))?
}
