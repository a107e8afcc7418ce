use std::fs;
use std::path::{Path, PathBuf};

use super::group::{ImageFile, PropertyGroup};
use crate::error::{PropmediaError, Result};

/// Entries pulled from a directory listing per call
pub const DEFAULT_LISTING_BATCH: usize = 64;

/// A dropped path, resolved once into file or directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DroppedEntry {
    File(PathBuf),
    Directory(PathBuf),
}

impl DroppedEntry {
    /// Resolve a path, following symlinks
    pub fn resolve(path: &Path) -> Result<Self> {
        let metadata = fs::metadata(path)
            .map_err(|e| PropmediaError::Scan(format!("{}: {}", path.display(), e)))?;
        if metadata.is_dir() {
            Ok(DroppedEntry::Directory(path.to_path_buf()))
        } else {
            Ok(DroppedEntry::File(path.to_path_buf()))
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            DroppedEntry::File(p) | DroppedEntry::Directory(p) => p,
        }
    }
}

/// Batch-paginated directory listing.
///
/// `read_batch` returns at most `batch_size` entries per call and an empty
/// vector once the listing is exhausted; callers must keep reading until then.
pub struct DirectoryReader {
    dir: PathBuf,
    inner: fs::ReadDir,
    batch_size: usize,
}

impl DirectoryReader {
    pub fn open(dir: &Path, batch_size: usize) -> Result<Self> {
        let inner = fs::read_dir(dir)
            .map_err(|e| PropmediaError::Scan(format!("{}: {}", dir.display(), e)))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            inner,
            batch_size: batch_size.max(1),
        })
    }

    /// Next batch of resolved entries. Unreadable entries are logged and skipped.
    pub fn read_batch(&mut self) -> Vec<DroppedEntry> {
        let mut batch = Vec::with_capacity(self.batch_size);

        while batch.len() < self.batch_size {
            let Some(next) = self.inner.next() else { break };
            let entry = match next {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("Skipping unreadable entry in {}: {}", self.dir.display(), e);
                    continue;
                }
            };

            let path = entry.path();
            let file_type = match entry.file_type() {
                Ok(ft) => ft,
                Err(e) => {
                    log::warn!("Skipping {}: {}", path.display(), e);
                    continue;
                }
            };

            if file_type.is_symlink() {
                // Linked files are fine; linked directories could loop
                match fs::metadata(&path) {
                    Ok(m) if m.is_file() => batch.push(DroppedEntry::File(path)),
                    Ok(_) => log::debug!("Not following symlinked directory {}", path.display()),
                    Err(e) => log::warn!("Skipping broken link {}: {}", path.display(), e),
                }
            } else if file_type.is_dir() {
                batch.push(DroppedEntry::Directory(path));
            } else if file_type.is_file() {
                batch.push(DroppedEntry::File(path));
            }
        }

        batch
    }
}

/// Detected media type if the file looks like an image
pub fn image_content_type(path: &Path) -> Option<String> {
    mime_guess::from_path(path)
        .first()
        .filter(|mime| mime.type_() == mime_guess::mime::IMAGE)
        .map(|mime| mime.essence_str().to_string())
}

/// Turn dropped paths into property groups.
///
/// Only top-level directories become groups; loose files are ignored, as are
/// directories without any images. Groups keep the order of `dropped`.
pub fn scan_dropped(dropped: &[PathBuf], listing_batch: usize) -> Vec<PropertyGroup> {
    let mut groups = Vec::new();

    for path in dropped {
        let entry = match DroppedEntry::resolve(path) {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("{}", e);
                continue;
            }
        };

        let dir = match entry {
            DroppedEntry::Directory(dir) => dir,
            DroppedEntry::File(file) => {
                log::info!("Ignoring loose file {} (drop its folder instead)", file.display());
                continue;
            }
        };

        let display_name = folder_display_name(&dir);
        let mut files = Vec::new();
        collect_images(&dir, listing_batch, &mut files);

        if files.is_empty() {
            log::info!("No images under '{}', skipping", display_name);
            continue;
        }

        log::info!("Found {} image(s) in '{}'", files.len(), display_name);
        groups.push(PropertyGroup::new(display_name, files));
    }

    groups
}

/// Recursively gather images under `dir` in discovery order.
/// A branch that cannot be read contributes nothing.
fn collect_images(dir: &Path, listing_batch: usize, out: &mut Vec<ImageFile>) {
    let mut reader = match DirectoryReader::open(dir, listing_batch) {
        Ok(reader) => reader,
        Err(e) => {
            log::warn!("{}", e);
            return;
        }
    };

    loop {
        let batch = reader.read_batch();
        if batch.is_empty() {
            break;
        }

        for entry in batch {
            match entry {
                DroppedEntry::Directory(sub) => collect_images(&sub, listing_batch, out),
                DroppedEntry::File(path) => {
                    if let Some(image) = to_image_file(&path) {
                        out.push(image);
                    }
                }
            }
        }
    }
}

fn to_image_file(path: &Path) -> Option<ImageFile> {
    let Some(content_type) = image_content_type(path) else {
        log::debug!("Skipping non-image {}", path.display());
        return None;
    };

    let size = match fs::metadata(path) {
        Ok(m) => m.len(),
        Err(e) => {
            log::warn!("Skipping {}: {}", path.display(), e);
            return None;
        }
    };

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    Some(ImageFile {
        path: path.to_path_buf(),
        name,
        content_type,
        size,
    })
}

fn folder_display_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| dir.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_scan_groups_top_level_directories() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir_all(root.join("Oak House/upstairs/bedrooms")).unwrap();
        fs::write(root.join("Oak House/hero.jpg"), b"jpg").unwrap();
        fs::write(root.join("Oak House/upstairs/landing.png"), b"png").unwrap();
        fs::write(root.join("Oak House/upstairs/bedrooms/master.webp"), b"webp").unwrap();
        fs::write(root.join("Oak House/notes.txt"), b"not an image").unwrap();

        fs::create_dir_all(root.join("Maple Court")).unwrap();
        fs::write(root.join("Maple Court/front.jpeg"), b"jpeg").unwrap();

        let groups = scan_dropped(&[root.join("Oak House"), root.join("Maple Court")], 2);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].display_name, "Oak House");
        assert_eq!(groups[1].display_name, "Maple Court");

        let mut names: Vec<&str> = groups[0].files().iter().map(|f| f.file.name.as_str()).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["hero.jpg", "landing.png", "master.webp"]);
        assert_eq!(groups[1].files().len(), 1);
        assert_eq!(groups[1].files()[0].file.content_type, "image/jpeg");
    }

    #[test]
    fn test_loose_files_and_empty_folders_make_no_group() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::write(root.join("loose.jpg"), b"jpg").unwrap();
        fs::create_dir_all(root.join("Docs Only")).unwrap();
        fs::write(root.join("Docs Only/brochure.pdf"), b"pdf").unwrap();
        fs::create_dir_all(root.join("Empty")).unwrap();

        let groups = scan_dropped(
            &[root.join("loose.jpg"), root.join("Docs Only"), root.join("Empty")],
            DEFAULT_LISTING_BATCH,
        );
        assert!(groups.is_empty());
    }

    #[test]
    fn test_missing_path_does_not_abort_siblings() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("Willow Cottage")).unwrap();
        fs::write(root.join("Willow Cottage/a.jpg"), b"jpg").unwrap();

        let groups = scan_dropped(&[root.join("does-not-exist"), root.join("Willow Cottage")], 1);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].display_name, "Willow Cottage");
    }

    #[test]
    fn test_reader_pages_until_empty() {
        let temp_dir = TempDir::new().unwrap();
        for i in 0..5 {
            fs::write(temp_dir.path().join(format!("{}.jpg", i)), b"jpg").unwrap();
        }

        let mut reader = DirectoryReader::open(temp_dir.path(), 2).unwrap();
        let sizes: Vec<usize> = std::iter::from_fn(|| {
            let batch = reader.read_batch();
            (!batch.is_empty()).then_some(batch.len())
        })
        .collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[test]
    fn test_resolve_tags_entries() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("a.jpg");
        fs::write(&file, b"jpg").unwrap();

        assert_eq!(DroppedEntry::resolve(temp_dir.path()).unwrap(), DroppedEntry::Directory(temp_dir.path().to_path_buf()));
        assert_eq!(DroppedEntry::resolve(&file).unwrap(), DroppedEntry::File(file.clone()));
        assert_eq!(DroppedEntry::resolve(&file).unwrap().path(), file.as_path());
        assert!(matches!(
            DroppedEntry::resolve(&temp_dir.path().join("nope")),
            Err(PropmediaError::Scan(_))
        ));
    }

    #[test]
    fn test_image_content_type() {
        assert_eq!(image_content_type(Path::new("x.PNG")).as_deref(), Some("image/png"));
        assert_eq!(image_content_type(Path::new("x.txt")), None);
        assert_eq!(image_content_type(Path::new("no_extension")), None);
    }
}
