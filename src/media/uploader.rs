use futures_util::future::join_all;
use sha2::{Digest, Sha256};

use super::classify::Classification;
use super::group::{FileEntry, PropertyGroup, UploadStatus};
use super::ledger::{record_uploads, LedgerEntry};
use super::reconcile::{reconcile, MediaUpdate, ReconcileSummary};
use crate::db::Db;
use crate::error::{PropmediaError, Result};
use crate::storage::{generate_object_path, MediaStore};

/// Files uploaded concurrently per batch
pub const DEFAULT_BATCH_SIZE: usize = 3;

/// Result of uploading one group
#[derive(Debug, Clone, Default)]
pub struct UploadOutcome {
    pub property_id: i64,
    pub uploaded: usize,
    pub failed: usize,
    pub hero: Option<String>,
    pub floorplan: Option<String>,
    pub gallery: Vec<String>,
    /// Stored objects that no property field will reference
    pub unlinked: Vec<String>,
    pub reconciled: ReconcileSummary,
}

/// A stored object, before it is linked to anything
struct StoredObject {
    url: String,
    sha256: String,
    size: u64,
}

/// Upload every file of a matched group and merge the results into its property.
///
/// Files go up in batches of `batch_size`: requests inside a batch run
/// concurrently, batches run one after another. A failing file only marks
/// itself as errored. The group ends `Complete` when the property update
/// succeeds, however many files failed, and `Error` when it does not.
pub async fn upload_group(
    group: &mut PropertyGroup,
    store: &dyn MediaStore,
    db: &Db,
    batch_size: usize,
) -> Result<UploadOutcome> {
    if group.status != UploadStatus::Pending {
        return Err(PropmediaError::InvalidInput(format!(
            "group '{}' is {}, only pending groups can be uploaded",
            group.display_name, group.status
        )));
    }

    let Some(property) = group.matched_property.clone() else {
        group.status = UploadStatus::Error;
        return Err(PropmediaError::NoMatch(group.display_name.clone()));
    };

    for (class, names) in group.singleton_conflicts() {
        log::warn!(
            "'{}' has {} files marked {} ({}); only the first is linked, the rest are stored unreferenced",
            group.display_name,
            names.len(),
            class,
            names.join(", ")
        );
    }

    group.status = UploadStatus::Uploading;
    log::info!(
        "Uploading {} file(s) from '{}' to property {} ({})",
        group.files.len(),
        group.display_name,
        property.id,
        property.title
    );

    let batch_size = batch_size.max(1);
    let mut stored: Vec<Option<StoredObject>> = Vec::with_capacity(group.files.len());

    for (batch_no, batch) in group.files.chunks_mut(batch_size).enumerate() {
        for entry in batch.iter_mut() {
            entry.status = UploadStatus::Uploading;
        }

        let results = join_all(batch.iter().map(|entry| upload_file(entry, store))).await;

        // join_all yields in input order, so results line up with the batch
        for (entry, result) in batch.iter_mut().zip(results) {
            match result {
                Ok(object) => {
                    entry.status = UploadStatus::Complete;
                    entry.remote_url = Some(object.url.clone());
                    stored.push(Some(object));
                }
                Err(e) => {
                    log::error!("✗ {}/{}: {}", group.display_name, entry.file.name, e);
                    entry.status = UploadStatus::Error;
                    stored.push(None);
                }
            }
        }
        log::debug!("'{}' batch {} settled", group.display_name, batch_no + 1);
    }

    let mut outcome = UploadOutcome {
        property_id: property.id,
        ..Default::default()
    };
    let mut ledger = Vec::new();

    for (entry, object) in group.files.iter().zip(&stored) {
        let Some(object) = object else {
            outcome.failed += 1;
            continue;
        };
        outcome.uploaded += 1;

        let linked = match entry.classification {
            Classification::Hero if outcome.hero.is_none() => {
                outcome.hero = Some(object.url.clone());
                true
            }
            Classification::Floorplan if outcome.floorplan.is_none() => {
                outcome.floorplan = Some(object.url.clone());
                true
            }
            Classification::Gallery => {
                outcome.gallery.push(object.url.clone());
                true
            }
            _ => {
                outcome.unlinked.push(object.url.clone());
                false
            }
        };

        ledger.push(LedgerEntry {
            file_name: entry.file.name.clone(),
            classification: entry.classification,
            remote_url: object.url.clone(),
            content_sha256: object.sha256.clone(),
            size_bytes: object.size,
            linked,
        });
    }

    let update = MediaUpdate {
        hero: outcome.hero.clone(),
        floorplan: outcome.floorplan.clone(),
        gallery_urls: outcome.gallery.clone(),
    };

    let result = reconcile(db, property.id, update).await;

    if result.is_err() {
        // Nothing was written to the property, so nothing is linked
        for entry in &mut ledger {
            entry.linked = false;
        }
    }
    if let Err(e) = record_uploads(db, property.id, &group.display_name, ledger).await {
        log::warn!("Could not record uploads for '{}': {}", group.display_name, e);
    }

    match result {
        Ok(summary) => {
            group.status = UploadStatus::Complete;
            outcome.reconciled = summary;
            log::info!(
                "✓ '{}': {} uploaded, {} failed, {} added to gallery",
                group.display_name,
                outcome.uploaded,
                outcome.failed,
                summary.gallery_added
            );
            Ok(outcome)
        }
        Err(e) => {
            group.status = UploadStatus::Error;
            log::error!(
                "✗ '{}': {} file(s) stored but property update failed: {}",
                group.display_name,
                outcome.uploaded,
                e
            );
            Err(e)
        }
    }
}

async fn upload_file(entry: &FileEntry, store: &dyn MediaStore) -> Result<StoredObject> {
    let body = tokio::fs::read(&entry.file.path).await?;

    let mut hasher = Sha256::new();
    hasher.update(&body);
    let sha256 = format!("{:x}", hasher.finalize());
    let size = body.len() as u64;

    let object_path = generate_object_path(&entry.file.name);
    let url = store.upload(&object_path, &entry.file.content_type, body).await?;

    Ok(StoredObject { url, sha256, size })
}
