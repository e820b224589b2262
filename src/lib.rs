//! Conditional image compression for uploaded assets
//!
//! Sends eligible PNG and JPEG assets through a remote optimizer and stores
//! the result either in place below the site root or in the CDN bucket the
//! asset is served from.

pub mod compressor;
pub mod config;
pub mod error;
pub mod metadata;
pub mod mime;
pub mod models;
pub mod optimizer;
pub mod scratch;
pub mod services;
pub mod storage;

pub use error::{Error, Result};
