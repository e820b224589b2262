//! Object storage for CDN backed assets
//!
//! Uploads optimized images to an S3 compatible bucket and answers whether an
//! object already exists there.

pub mod client;
pub mod mock;

pub use client::S3ObjectStore;
pub use mock::MockObjectStore;

use crate::Result;
use async_trait::async_trait;
use std::path::Path;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn exists(&self, bucket: &str, key: &str) -> Result<bool>;
    /// Upload the file at `source` to `bucket`/`key`, replacing any object there.
    async fn put_file(&self, bucket: &str, key: &str, source: &Path) -> Result<()>;
}
