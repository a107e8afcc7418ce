pub mod classify;
pub mod group;
pub mod scanner;
pub mod matcher;
pub mod uploader;
pub mod reconcile;
pub mod ledger;
pub mod session;

pub use classify::{classify, Classification};
pub use group::{FileEntry, ImageFile, PropertyGroup, UploadStatus};
pub use scanner::{scan_dropped, DirectoryReader, DroppedEntry};
pub use matcher::{match_property, PropertyDirectory};
pub use uploader::{upload_group, UploadOutcome, DEFAULT_BATCH_SIZE};
pub use reconcile::{reconcile, MediaUpdate, ReconcileSummary};
pub use session::{BusyFlag, IngestSession};
