use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use super::classify::{classify, Classification};
use crate::error::{PropmediaError, Result};
use crate::properties::PropertyRef;

/// Lifecycle of a group or a single file.
///
/// Transitions only go `Pending -> Uploading -> Complete | Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Uploading,
    Complete,
    Error,
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UploadStatus::Pending => "pending",
            UploadStatus::Uploading => "uploading",
            UploadStatus::Complete => "complete",
            UploadStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// An image found under a dropped folder. Bytes are read at upload time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageFile {
    pub path: PathBuf,
    pub name: String,
    pub content_type: String,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileEntry {
    pub file: ImageFile,
    pub classification: Classification,
    pub status: UploadStatus,
    pub remote_url: Option<String>,
}

impl FileEntry {
    pub fn new(file: ImageFile) -> Self {
        let classification = classify(&file.name);
        Self {
            file,
            classification,
            status: UploadStatus::Pending,
            remote_url: None,
        }
    }
}

/// All images from one top-level dropped folder
#[derive(Debug, Clone, Serialize)]
pub struct PropertyGroup {
    pub property_id: Option<i64>,
    pub display_name: String,
    pub matched_property: Option<PropertyRef>,
    pub(crate) files: Vec<FileEntry>,
    pub status: UploadStatus,
}

impl PropertyGroup {
    pub fn new(display_name: impl Into<String>, files: Vec<ImageFile>) -> Self {
        Self {
            property_id: None,
            display_name: display_name.into(),
            matched_property: None,
            files: files.into_iter().map(FileEntry::new).collect(),
            status: UploadStatus::Pending,
        }
    }

    /// Files in discovery order. Membership never changes after scanning.
    pub fn files(&self) -> &[FileEntry] {
        &self.files
    }

    pub fn is_matched(&self) -> bool {
        self.matched_property.is_some()
    }

    pub fn set_match(&mut self, property: Option<PropertyRef>) {
        self.property_id = property.as_ref().map(|p| p.id);
        self.matched_property = property;
    }

    pub fn file_index(&self, name: &str) -> Option<usize> {
        self.files.iter().position(|f| f.file.name == name)
    }

    /// Override a file's classification. Only allowed before upload.
    pub fn reclassify(&mut self, index: usize, classification: Classification) -> Result<()> {
        if self.status != UploadStatus::Pending {
            return Err(PropmediaError::InvalidInput(format!(
                "group '{}' is {}, files can only be reclassified while pending",
                self.display_name, self.status
            )));
        }
        let entry = self.files.get_mut(index).ok_or_else(|| {
            PropmediaError::InvalidInput(format!(
                "group '{}' has no file at index {}",
                self.display_name, index
            ))
        })?;
        entry.classification = classification;
        Ok(())
    }

    /// Singleton classifications (hero, floorplan) claimed by more than one
    /// file. Only the first of each is linked to the property; the rest are
    /// stored but not referenced anywhere.
    pub fn singleton_conflicts(&self) -> Vec<(Classification, Vec<String>)> {
        [Classification::Hero, Classification::Floorplan]
            .into_iter()
            .filter_map(|class| {
                let names: Vec<String> = self
                    .files
                    .iter()
                    .filter(|f| f.classification == class)
                    .map(|f| f.file.name.clone())
                    .collect();
                (names.len() > 1).then_some((class, names))
            })
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn image(name: &str) -> ImageFile {
        ImageFile {
            path: PathBuf::from(format!("/tmp/{}", name)),
            name: name.to_string(),
            content_type: "image/jpeg".to_string(),
            size: 0,
        }
    }

    #[test]
    fn test_new_group_classifies_files() {
        let group = PropertyGroup::new("Oak House", vec![image("hero.jpg"), image("plan.jpg"), image("a.jpg")]);
        let classes: Vec<Classification> = group.files().iter().map(|f| f.classification).collect();
        assert_eq!(classes, vec![Classification::Hero, Classification::Floorplan, Classification::Gallery]);
        assert_eq!(group.status, UploadStatus::Pending);
        assert!(!group.is_matched());
    }

    #[test]
    fn test_reclassify_only_while_pending() {
        let mut group = PropertyGroup::new("Oak House", vec![image("a.jpg")]);
        group.reclassify(0, Classification::Hero).unwrap();
        assert_eq!(group.files()[0].classification, Classification::Hero);

        assert!(group.reclassify(3, Classification::Gallery).is_err());

        group.status = UploadStatus::Uploading;
        assert!(group.reclassify(0, Classification::Gallery).is_err());
    }

    #[test]
    fn test_singleton_conflicts() {
        let group = PropertyGroup::new(
            "Oak House",
            vec![image("hero.jpg"), image("front.jpg"), image("plan.jpg"), image("a.jpg")],
        );
        let conflicts = group.singleton_conflicts();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].0, Classification::Hero);
        assert_eq!(conflicts[0].1, vec!["hero.jpg", "front.jpg"]);
    }

    #[test]
    fn test_set_match_keeps_id_in_sync() {
        let mut group = PropertyGroup::new("Oak House", vec![image("a.jpg")]);
        group.set_match(Some(PropertyRef { id: 7, title: "Oak House".to_string() }));
        assert_eq!(group.property_id, Some(7));
        group.set_match(None);
        assert_eq!(group.property_id, None);
    }
}
