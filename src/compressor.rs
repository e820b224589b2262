//! Compression of freshly uploaded image assets.
//!
//! Decides whether an asset is eligible, whether its bytes live on the CDN
//! bucket or below the local site root, runs the remote optimizer and keeps
//! the asset metadata in sync.

use crate::config::{ConfigProvider, EnvConfigProvider};
use crate::error::CompressionFailure;
use crate::metadata::{JsonMetadataIndex, MetadataStore};
use crate::models::{Asset, Config, FolderRef, ProcessingOutcome, SkipReason};
use crate::optimizer::OptimizerService;
use crate::scratch::ScratchFile;
use crate::services::{LiveServiceFactory, ServiceFactory};
use crate::storage::ObjectStore;
use crate::{Error, Result};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Runs one asset at a time through the optimizer.
pub struct Compressor {
    config: Box<dyn ConfigProvider>,
    services: Box<dyn ServiceFactory>,
    metadata: Box<dyn MetadataStore>,
    http: reqwest::Client,
}

/// Injectable collaborators used to construct [`Compressor`].
pub struct CompressorServices {
    pub config: Box<dyn ConfigProvider>,
    pub services: Box<dyn ServiceFactory>,
    pub metadata: Box<dyn MetadataStore>,
}

enum Destination {
    Cdn {
        store: Box<dyn ObjectStore>,
        bucket: String,
    },
    Local,
}

impl Compressor {
    pub fn with_services(services: CompressorServices) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            config: services.config,
            services: services.services,
            metadata: services.metadata,
            http,
        })
    }

    /// Wire live clients and the JSON metadata index from the environment.
    pub async fn from_env() -> Result<Self> {
        let provider = EnvConfigProvider::new();
        let config = provider.load()?;
        let metadata =
            JsonMetadataIndex::open(&config.extension.index_path, &config.extension.site_root)
                .await?;

        Self::with_services(CompressorServices {
            config: Box::new(provider),
            services: Box::new(LiveServiceFactory),
            metadata: Box::new(metadata),
        })
    }

    /// Compress `asset` if eligible and refresh its metadata.
    pub async fn process(&self, asset: &mut Asset) -> Result<ProcessingOutcome> {
        let config = self.config.load()?;

        let outcome = match skip_reason(&config, asset) {
            Some(reason) => {
                info!("Skipping {}: {:?}", asset.identifier, reason);
                ProcessingOutcome::Skipped(reason)
            }
            None => self.compress(&config, asset).await?,
        };

        self.metadata.refresh(asset).await?;
        Ok(outcome)
    }

    async fn compress(&self, config: &Config, asset: &mut Asset) -> Result<ProcessingOutcome> {
        config.validate()?;
        let optimizer = self.services.optimizer(&config.optimizer_config())?;

        let destination = self.destination(config, asset).await?;
        match destination {
            Destination::Cdn { store, bucket } => {
                info!("Compressing {} into CDN bucket {}", asset.identifier, bucket);
                self.compress_to_cdn(config, optimizer.as_ref(), store.as_ref(), &bucket, asset)
                    .await
            }
            Destination::Local => {
                info!("Compressing {} in place", asset.identifier);
                self.compress_local(config, optimizer.as_ref(), asset).await
            }
        }
    }

    async fn destination(&self, config: &Config, asset: &Asset) -> Result<Destination> {
        if !config.cdn_enabled() {
            return Ok(Destination::Local);
        }

        let storage = config.storage_config()?;
        let store = self.services.object_store(&storage).await?;

        let on_cdn = match &asset.parent_folder {
            FolderRef::Live { driver_type } => *driver_type == config.extension.cdn_driver,
            FolderRef::ExistingPath { path } => {
                debug!(
                    "Parent folder {} already occupied, asking the bucket about {}",
                    path, asset.identifier
                );
                store.exists(&storage.bucket, &asset.identifier).await?
            }
        };

        if on_cdn {
            Ok(Destination::Cdn {
                store,
                bucket: storage.bucket,
            })
        } else {
            Ok(Destination::Local)
        }
    }

    async fn compress_to_cdn(
        &self,
        config: &Config,
        optimizer: &dyn OptimizerService,
        store: &dyn ObjectStore,
        bucket: &str,
        asset: &mut Asset,
    ) -> Result<ProcessingOutcome> {
        let source = self.fetch_source(asset).await?;

        let scratch =
            ScratchFile::acquire(&config.extension.scratch_dir, asset.url_basename()).await?;
        let written = optimizer.optimize_to_file(&source, scratch.path()).await?;
        info!(
            "Optimized {} from {} to {} bytes",
            asset.identifier,
            source.len(),
            written
        );

        let uploaded = store.put_file(bucket, &asset.identifier, scratch.path()).await;
        scratch.release();
        uploaded?;

        // Only the local branch marks assets as compressed unless enabled here.
        if config.extension.mark_cdn_compressed {
            self.metadata.mark_compressed(asset).await?;
            asset.compressed = true;
        }

        Ok(ProcessingOutcome::CompressedAndUploaded)
    }

    /// Download the original bytes. The public URL already points at the
    /// bucket or CDN.
    async fn fetch_source(&self, asset: &Asset) -> Result<Vec<u8>> {
        let fetch_error = |e: reqwest::Error| {
            Error::compression(
                CompressionFailure::Network,
                format!("Cannot fetch {}: {}", asset.public_url, e),
            )
        };

        let response = self
            .http
            .get(&asset.public_url)
            .send()
            .await
            .map_err(fetch_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::compression(
                CompressionFailure::Service,
                format!("Fetching {} returned HTTP {}", asset.public_url, status),
            ));
        }

        Ok(response.bytes().await.map_err(fetch_error)?.to_vec())
    }

    async fn compress_local(
        &self,
        config: &Config,
        optimizer: &dyn OptimizerService,
        asset: &mut Asset,
    ) -> Result<ProcessingOutcome> {
        let path = asset.local_path(&config.extension.site_root);
        let written = optimizer.optimize_file(&path).await?;
        info!("Optimized {} to {} bytes", path.display(), written);

        self.metadata.mark_compressed(asset).await?;
        asset.compressed = true;

        Ok(ProcessingOutcome::CompressedLocal)
    }
}

fn skip_reason(config: &Config, asset: &Asset) -> Option<SkipReason> {
    if config.settings.debug {
        return Some(SkipReason::DebugMode);
    }
    if !asset.is_compressible() {
        if asset.extension.is_empty() {
            warn!("Asset {} has no extension", asset.identifier);
        }
        return Some(SkipReason::IneligibleExtension);
    }
    None
}
