//! Artifact storage for clip jobs.
//!
//! Source videos come in and clips, thumbnails and result manifests go out
//! through the [`ArtifactStore`] trait. Production runs against an
//! S3-compatible bucket; tests and single-host setups can use local disk.

pub mod error;
pub mod local;
pub mod s3;
pub mod store;

pub use error::{StorageError, StorageResult};
pub use local::LocalDiskStore;
pub use s3::{S3Config, S3Store};
pub use store::{content_type_for, ArtifactStore, StoredArtifact};
