use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::classify::Classification;
use super::group::{PropertyGroup, UploadStatus};
use super::matcher::PropertyDirectory;
use super::scanner::{scan_dropped, DEFAULT_LISTING_BATCH};
use super::uploader::{upload_group, UploadOutcome, DEFAULT_BATCH_SIZE};
use crate::db::Db;
use crate::error::{PropmediaError, Result};
use crate::properties::PropertyRef;
use crate::storage::MediaStore;

/// Read-only view of the session's upload-all flag
#[derive(Debug, Clone)]
pub struct BusyFlag(Arc<AtomicBool>);

impl BusyFlag {
    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Clears the busy flag when an upload-all run ends, however it ends
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// The working set of dropped folders and everything done to them.
pub struct IngestSession {
    db: Db,
    store: Arc<dyn MediaStore>,
    directory: PropertyDirectory,
    groups: Vec<PropertyGroup>,
    batch_size: usize,
    busy: Arc<AtomicBool>,
}

impl IngestSession {
    pub fn new(db: Db, store: Arc<dyn MediaStore>) -> Self {
        Self {
            directory: PropertyDirectory::new(db.clone()),
            db,
            store,
            groups: Vec::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn groups(&self) -> &[PropertyGroup] {
        &self.groups
    }

    pub fn busy_flag(&self) -> BusyFlag {
        BusyFlag(Arc::clone(&self.busy))
    }

    /// Index of the first group with this folder name (case-insensitive)
    pub fn find_group(&self, display_name: &str) -> Option<usize> {
        let wanted = display_name.trim().to_lowercase();
        self.groups
            .iter()
            .position(|g| g.display_name.to_lowercase() == wanted)
    }

    /// Scan dropped paths, match each new group and append it to the working
    /// set. Returns how many groups were added.
    pub async fn add_dropped(&mut self, paths: Vec<PathBuf>) -> Result<usize> {
        let mut scanned = tokio::task::spawn_blocking(move || {
            scan_dropped(&paths, DEFAULT_LISTING_BATCH)
        })
        .await
        .map_err(|e| PropmediaError::Scan(format!("scan task failed: {}", e)))?;

        for group in &mut scanned {
            let matched = self.directory.match_folder(&group.display_name).await?;
            match &matched {
                Some(p) => log::info!("'{}' → property {} ({})", group.display_name, p.id, p.title),
                None => log::warn!("'{}' matched no property", group.display_name),
            }
            group.set_match(matched);
        }

        let added = scanned.len();
        self.groups.extend(scanned);
        Ok(added)
    }

    /// Reload the property list; optionally retry matching for pending
    /// groups that have no property yet. Returns how many were newly matched.
    pub async fn refresh_properties(&mut self, rematch_unmatched: bool) -> Result<usize> {
        self.directory.refresh().await?;
        if !rematch_unmatched {
            return Ok(0);
        }

        let mut newly_matched = 0;
        for group in &mut self.groups {
            if group.status != UploadStatus::Pending || group.is_matched() {
                continue;
            }
            if let Some(p) = self.directory.match_folder(&group.display_name).await? {
                log::info!("'{}' → property {} ({})", group.display_name, p.id, p.title);
                group.set_match(Some(p));
                newly_matched += 1;
            }
        }
        Ok(newly_matched)
    }

    /// Bind a pending group to a property by hand
    pub async fn assign_property(&mut self, group_index: usize, property_id: i64) -> Result<PropertyRef> {
        let property = self
            .directory
            .find(property_id)
            .await?
            .ok_or(PropmediaError::PropertyNotFound(property_id))?;

        let group = self.pending_group_mut(group_index)?;
        log::info!(
            "'{}' manually assigned to property {} ({})",
            group.display_name,
            property.id,
            property.title
        );
        group.set_match(Some(property.clone()));
        Ok(property)
    }

    pub fn reclassify(&mut self, group_index: usize, file_index: usize, classification: Classification) -> Result<()> {
        self.group_mut(group_index)?.reclassify(file_index, classification)
    }

    /// Drop a group from the working set
    pub fn discard_group(&mut self, group_index: usize) -> Result<PropertyGroup> {
        let status = self.group_mut(group_index)?.status;
        if status == UploadStatus::Uploading {
            return Err(PropmediaError::InvalidInput(
                "cannot discard a group while it is uploading".to_string(),
            ));
        }
        Ok(self.groups.remove(group_index))
    }

    pub async fn upload_group(&mut self, group_index: usize) -> Result<UploadOutcome> {
        let store = Arc::clone(&self.store);
        let batch_size = self.batch_size;
        let db = self.db.clone();
        let group = self.group_mut(group_index)?;
        upload_group(group, store.as_ref(), &db, batch_size).await
    }

    /// Upload every pending, matched group one after another.
    ///
    /// Returns `(folder, result)` per group attempted. Fails with `Busy` if
    /// another run holds the flag.
    pub async fn upload_all(&mut self) -> Result<Vec<(String, Result<UploadOutcome>)>> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(PropmediaError::Busy);
        }
        let _guard = BusyGuard(Arc::clone(&self.busy));

        let targets: Vec<usize> = self
            .groups
            .iter()
            .enumerate()
            .filter(|(_, g)| g.status == UploadStatus::Pending && g.is_matched())
            .map(|(i, _)| i)
            .collect();

        log::info!("Uploading {} pending group(s)", targets.len());

        let mut results = Vec::with_capacity(targets.len());
        for index in targets {
            let name = self.groups[index].display_name.clone();
            let result = self.upload_group(index).await;
            results.push((name, result));
        }
        Ok(results)
    }

    fn group_mut(&mut self, group_index: usize) -> Result<&mut PropertyGroup> {
        self.groups.get_mut(group_index).ok_or_else(|| {
            PropmediaError::InvalidInput(format!("no group at index {}", group_index))
        })
    }

    fn pending_group_mut(&mut self, group_index: usize) -> Result<&mut PropertyGroup> {
        let group = self.group_mut(group_index)?;
        if group.status != UploadStatus::Pending {
            return Err(PropmediaError::InvalidInput(format!(
                "group '{}' is {}",
                group.display_name, group.status
            )));
        }
        Ok(group)
    }
}
