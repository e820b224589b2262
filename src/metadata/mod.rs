//! Asset metadata bookkeeping
//!
//! Persists the compressed flag and re-derives size, checksum and dimensions
//! after an asset's bytes changed.

pub mod index;
pub mod mock;

pub use index::{AssetRecord, JsonMetadataIndex};
pub use mock::MockMetadataStore;

use crate::models::Asset;
use crate::Result;
use async_trait::async_trait;

#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Persist `compressed = true` for the asset. The flag is never cleared.
    async fn mark_compressed(&self, asset: &Asset) -> Result<()>;
    /// Re-derive stored metadata from the asset's current bytes.
    async fn refresh(&self, asset: &Asset) -> Result<()>;
}
