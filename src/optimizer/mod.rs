//! Remote image optimization
//!
//! Compression itself happens in an external service; this module only
//! ships bytes there and writes the result back to disk.

pub mod client;
pub mod mock;

pub use client::TinifyClient;
pub use mock::MockOptimizer;

use crate::scratch::write_atomic;
use crate::Result;
use async_trait::async_trait;
use std::path::Path;

#[async_trait]
pub trait OptimizerService: Send + Sync {
    /// Send `source` to the optimizer and return the optimized bytes.
    async fn optimize(&self, source: &[u8]) -> Result<Vec<u8>>;

    /// Optimize `source` and replace the whole content of `destination`.
    ///
    /// The destination is only touched once the optimizer succeeded.
    async fn optimize_to_file(&self, source: &[u8], destination: &Path) -> Result<u64> {
        let optimized = self.optimize(source).await?;
        write_atomic(destination, &optimized).await?;
        Ok(optimized.len() as u64)
    }

    /// Optimize the file at `path` in place.
    async fn optimize_file(&self, path: &Path) -> Result<u64> {
        let source = tokio::fs::read(path).await?;
        self.optimize_to_file(&source, path).await
    }
}
