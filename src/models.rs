//! Data models and structures
//!
//! Defines the asset reference handed to the compressor, the outcome of a
//! processing call, and the configuration blocks read on every call.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Storage driver identifier of the S3 backed CDN storage.
pub const DEFAULT_CDN_DRIVER: &str = "AusDriverAmazonS3";

/// Extensions eligible for compression, compared case-insensitively.
pub const COMPRESSIBLE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Where an asset's parent folder points to.
///
/// The host storage layer hands out a live folder object for a free target
/// path, but only a plain path once a file already occupies it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FolderRef {
    Live { driver_type: String },
    ExistingPath { path: String },
}

/// One stored file as seen by the compressor for the duration of a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub identifier: String,
    pub public_url: String,
    pub extension: String,
    pub parent_folder: FolderRef,
    #[serde(default)]
    pub compressed: bool,
}

impl Asset {
    pub fn new(
        identifier: String,
        public_url: String,
        extension: String,
        parent_folder: FolderRef,
    ) -> Self {
        Self {
            identifier,
            public_url,
            extension,
            parent_folder,
            compressed: false,
        }
    }

    /// Build an asset whose extension is taken from the identifier.
    pub fn from_identifier(identifier: &str, public_url: &str, parent_folder: FolderRef) -> Self {
        let extension = identifier
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_string())
            .unwrap_or_default();
        Self::new(
            identifier.to_string(),
            public_url.to_string(),
            extension,
            parent_folder,
        )
    }

    pub fn is_compressible(&self) -> bool {
        let ext = self.extension.to_ascii_lowercase();
        COMPRESSIBLE_EXTENSIONS.contains(&ext.as_str())
    }

    /// Last path segment of the public URL, used to name scratch files.
    pub fn url_basename(&self) -> &str {
        let trimmed = self
            .public_url
            .split(['?', '#'])
            .next()
            .unwrap_or(&self.public_url);
        trimmed.rsplit('/').next().unwrap_or(trimmed)
    }

    /// Location of the asset's bytes below the site root.
    pub fn local_path(&self, site_root: &Path) -> PathBuf {
        site_root.join(self.public_url.trim_start_matches('/'))
    }

    pub fn has_absolute_url(&self) -> bool {
        self.public_url.starts_with("http://") || self.public_url.starts_with("https://")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    DebugMode,
    IneligibleExtension,
}

/// Result of one successful processing call. Failures surface as [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum ProcessingOutcome {
    Skipped(SkipReason),
    CompressedLocal,
    CompressedAndUploaded,
}

impl ProcessingOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }
}

#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl OptimizerConfig {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.tinify.com";

    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub bucket: String,
    pub region: String,
    pub version: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub endpoint: Option<String>,
}

/// Static extension configuration block.
#[derive(Debug, Clone)]
pub struct ExtensionConfig {
    pub api_key: String,
    pub use_cdn: bool,
    pub cdn_available: bool,
    pub cdn_driver: String,
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub version: String,
    pub key: Option<String>,
    pub secret: Option<String>,
    pub endpoint: Option<String>,
    pub mark_cdn_compressed: bool,
    pub site_root: PathBuf,
    pub scratch_dir: PathBuf,
    pub index_path: PathBuf,
}

impl Default for ExtensionConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            use_cdn: false,
            cdn_available: true,
            cdn_driver: DEFAULT_CDN_DRIVER.to_string(),
            bucket: None,
            region: None,
            version: "latest".to_string(),
            key: None,
            secret: None,
            endpoint: None,
            mark_cdn_compressed: false,
            site_root: PathBuf::from("."),
            scratch_dir: PathBuf::from("typo3temp"),
            index_path: PathBuf::from("tinyimg-index.json"),
        }
    }
}

/// Per-invocation settings layer.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub debug: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub extension: ExtensionConfig,
    pub settings: Settings,
}

impl Config {
    /// Build a configuration from a key lookup (environment, dotenv, test map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let flag = |name: &str, default: bool| match var(name) {
            Some(value) => parse_flag(name, &value),
            None => Ok(default),
        };

        let site_root = var("TINYIMG_SITE_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let scratch_dir = var("TINYIMG_SCRATCH_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| site_root.join("typo3temp"));
        let index_path = var("TINYIMG_INDEX_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| site_root.join("tinyimg-index.json"));

        let extension = ExtensionConfig {
            api_key: var("TINYIMG_API_KEY").unwrap_or_default(),
            use_cdn: flag("TINYIMG_USE_CDN", false)?,
            cdn_available: flag("TINYIMG_CDN_AVAILABLE", true)?,
            cdn_driver: var("TINYIMG_CDN_DRIVER").unwrap_or_else(|| DEFAULT_CDN_DRIVER.to_string()),
            bucket: var("TINYIMG_BUCKET"),
            region: var("TINYIMG_REGION"),
            version: var("TINYIMG_VERSION").unwrap_or_else(|| "latest".to_string()),
            key: var("TINYIMG_KEY"),
            secret: var("TINYIMG_SECRET"),
            endpoint: var("TINYIMG_ENDPOINT"),
            mark_cdn_compressed: flag("TINYIMG_MARK_CDN_COMPRESSED", false)?,
            site_root,
            scratch_dir,
            index_path,
        };

        let settings = Settings {
            debug: flag("TINYIMG_DEBUG", false)?,
        };

        Ok(Self {
            extension,
            settings,
        })
    }

    /// Whether the CDN branch may be taken at all.
    pub fn cdn_enabled(&self) -> bool {
        self.extension.cdn_available && self.extension.use_cdn
    }

    /// Fail fast on settings that would otherwise only break mid-call.
    pub fn validate(&self) -> Result<()> {
        if self.extension.api_key.trim().is_empty() {
            return Err(Error::Configuration(
                "TINYIMG_API_KEY not set".to_string(),
            ));
        }
        if self.cdn_enabled() {
            self.storage_config()?;
        }
        Ok(())
    }

    pub fn optimizer_config(&self) -> OptimizerConfig {
        OptimizerConfig::new(self.extension.api_key.clone())
    }

    pub fn storage_config(&self) -> Result<StorageConfig> {
        let required = |value: &Option<String>, name: &str| {
            value
                .clone()
                .ok_or_else(|| Error::Configuration(format!("{} not set", name)))
        };
        let ext = &self.extension;

        Ok(StorageConfig {
            bucket: required(&ext.bucket, "TINYIMG_BUCKET")?,
            region: required(&ext.region, "TINYIMG_REGION")?,
            version: ext.version.clone(),
            access_key_id: required(&ext.key, "TINYIMG_KEY")?,
            secret_access_key: required(&ext.secret, "TINYIMG_SECRET")?,
            endpoint: ext.endpoint.clone(),
        })
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    if let Ok(number) = value.trim().parse::<i64>() {
        return Ok(number != 0);
    }
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::Configuration(format!(
            "{} must be a boolean, got '{}'",
            name, other
        ))),
    }
}
