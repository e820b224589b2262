use super::MetadataStore;
use crate::mime::detect_image_mime;
use crate::models::Asset;
use crate::scratch::write_atomic;
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub identifier: String,
    #[serde(default)]
    pub compressed: bool,
    pub size: Option<u64>,
    pub sha256: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub mime_type: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl AssetRecord {
    fn empty(identifier: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            compressed: false,
            size: None,
            sha256: None,
            width: None,
            height: None,
            mime_type: None,
            updated_at: Utc::now(),
        }
    }

    fn apply_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let (width, height) = match image_dimensions(bytes)? {
            Some((w, h)) => (Some(w), Some(h)),
            None => (None, None),
        };

        self.size = Some(bytes.len() as u64);
        self.sha256 = Some(hex::encode(Sha256::digest(bytes)));
        self.width = width;
        self.height = height;
        self.mime_type = Some(detect_image_mime(bytes).to_string());
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Dimensions of an image, or `None` when the format is not recognized.
fn image_dimensions(bytes: &[u8]) -> Result<Option<(u32, u32)>> {
    let reader = image::ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    if reader.format().is_none() {
        return Ok(None);
    }
    Ok(Some(reader.into_dimensions()?))
}

/// Metadata index persisted as a single JSON document.
pub struct JsonMetadataIndex {
    index_path: PathBuf,
    site_root: PathBuf,
    http: reqwest::Client,
    records: Mutex<BTreeMap<String, AssetRecord>>,
}

impl JsonMetadataIndex {
    /// Open the index at `index_path`, starting empty when it does not exist yet.
    pub async fn open(index_path: &Path, site_root: &Path) -> Result<Self> {
        let records = match tokio::fs::read_to_string(index_path).await {
            Ok(json) => serde_json::from_str(&json)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            index_path: index_path.to_path_buf(),
            site_root: site_root.to_path_buf(),
            http,
            records: Mutex::new(records),
        })
    }

    pub async fn get(&self, identifier: &str) -> Option<AssetRecord> {
        self.records.lock().await.get(identifier).cloned()
    }

    async fn read_asset(&self, asset: &Asset) -> Result<Vec<u8>> {
        if asset.has_absolute_url() {
            let response = self
                .http
                .get(&asset.public_url)
                .send()
                .await?
                .error_for_status()?;
            return Ok(response.bytes().await?.to_vec());
        }

        let path = asset.local_path(&self.site_root);
        tokio::fs::read(&path).await.map_err(|e| {
            Error::Metadata(format!("Cannot read {}: {}", path.display(), e))
        })
    }

    async fn persist(&self, records: &BTreeMap<String, AssetRecord>) -> Result<()> {
        if let Some(parent) = self.index_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let json = serde_json::to_string_pretty(records)?;
        write_atomic(&self.index_path, json.as_bytes()).await
    }
}

#[async_trait]
impl MetadataStore for JsonMetadataIndex {
    async fn mark_compressed(&self, asset: &Asset) -> Result<()> {
        let mut records = self.records.lock().await;
        let record = records
            .entry(asset.identifier.clone())
            .or_insert_with(|| AssetRecord::empty(&asset.identifier));
        record.compressed = true;
        record.updated_at = Utc::now();

        self.persist(&records).await?;
        tracing::debug!("Marked {} as compressed", asset.identifier);
        Ok(())
    }

    async fn refresh(&self, asset: &Asset) -> Result<()> {
        let bytes = self.read_asset(asset).await?;

        let mut records = self.records.lock().await;
        let record = records
            .entry(asset.identifier.clone())
            .or_insert_with(|| AssetRecord::empty(&asset.identifier));
        record.apply_bytes(&bytes)?;
        record.compressed |= asset.compressed;
        tracing::debug!(
            "Refreshed metadata for {} ({} bytes)",
            asset.identifier,
            bytes.len()
        );

        self.persist(&records).await
    }
}
