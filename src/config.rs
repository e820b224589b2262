//! Configuration sources
//!
//! The compressor asks its provider for a fresh [`Config`] on every call so
//! that operators can flip settings (debug mode, CDN usage) without a restart.

use crate::models::Config;
use crate::Result;
use std::sync::{Arc, RwLock};

pub trait ConfigProvider: Send + Sync {
    fn load(&self) -> Result<Config>;
}

/// Reads `TINYIMG_*` variables from the process environment and `.env`.
#[derive(Debug, Default, Clone)]
pub struct EnvConfigProvider;

impl EnvConfigProvider {
    pub fn new() -> Self {
        Self
    }
}

impl ConfigProvider for EnvConfigProvider {
    fn load(&self) -> Result<Config> {
        dotenvy::dotenv().ok();
        Config::from_lookup(|name| std::env::var(name).ok())
    }
}

/// Holds a configuration in memory; clones share the same value.
#[derive(Debug, Clone)]
pub struct StaticConfigProvider {
    config: Arc<RwLock<Config>>,
}

impl StaticConfigProvider {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
        }
    }

    /// Swap the configuration seen by subsequent `load` calls.
    pub fn replace(&self, config: Config) {
        *self.config.write().unwrap_or_else(|e| e.into_inner()) = config;
    }
}

impl ConfigProvider for StaticConfigProvider {
    fn load(&self) -> Result<Config> {
        Ok(self
            .config
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_provider_reload() {
        let mut config = Config::default();
        config.extension.api_key = "first".to_string();
        let provider = StaticConfigProvider::new(config.clone());
        let handle = provider.clone();

        assert_eq!(provider.load().unwrap().extension.api_key, "first");

        config.extension.api_key = "second".to_string();
        config.settings.debug = true;
        handle.replace(config);

        let reloaded = provider.load().unwrap();
        assert_eq!(reloaded.extension.api_key, "second");
        assert!(reloaded.settings.debug);
    }
}
