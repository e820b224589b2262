use super::OptimizerService;
use crate::error::CompressionFailure;
use crate::models::OptimizerConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;

/// Client for the Tinify (TinyPNG) shrink API.
pub struct TinifyClient {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ShrinkResponse {
    input: InputInfo,
    output: OutputInfo,
}

#[derive(Debug, Deserialize)]
struct InputInfo {
    size: u64,
}

#[derive(Debug, Deserialize)]
struct OutputInfo {
    size: u64,
    ratio: Option<f64>,
    url: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: String,
    message: String,
}

impl TinifyClient {
    pub fn new(config: OptimizerConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            api_key: config.api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn shrink(&self, source: &[u8]) -> Result<ShrinkResponse> {
        let url = format!("{}/shrink", self.base_url);
        tracing::debug!("Sending {} bytes to optimizer", source.len());

        let response = self
            .client
            .post(&url)
            .basic_auth("api", Some(&self.api_key))
            .body(source.to_vec())
            .send()
            .await
            .map_err(network_error)?;

        if let Some(count) = response
            .headers()
            .get("Compression-Count")
            .and_then(|v| v.to_str().ok())
        {
            tracing::debug!("Optimizer compression count this month: {}", count);
        }

        let response = check_status(response).await?;
        let body = response.text().await.map_err(network_error)?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!("Failed to parse optimizer response: {}\nBody: {}", e, body);
            Error::compression(
                CompressionFailure::Service,
                format!("Failed to parse optimizer response: {}", e),
            )
        })
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .basic_auth("api", Some(&self.api_key))
            .send()
            .await
            .map_err(network_error)?;

        let response = check_status(response).await?;
        let bytes = response.bytes().await.map_err(network_error)?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl OptimizerService for TinifyClient {
    async fn optimize(&self, source: &[u8]) -> Result<Vec<u8>> {
        let shrink = self.shrink(source).await?;
        tracing::info!(
            "Optimizer shrank image from {} to {} bytes (ratio {:.3})",
            shrink.input.size,
            shrink.output.size,
            shrink.output.ratio.unwrap_or(1.0)
        );

        self.download(&shrink.output.url).await
    }
}

fn network_error(e: reqwest::Error) -> Error {
    tracing::error!("Failed to reach optimizer: {}", e);
    Error::compression(CompressionFailure::Network, e.to_string())
}

fn failure_for_status(status: StatusCode) -> CompressionFailure {
    match status {
        StatusCode::UNAUTHORIZED => CompressionFailure::Auth,
        StatusCode::TOO_MANY_REQUESTS => CompressionFailure::QuotaExceeded,
        StatusCode::UNSUPPORTED_MEDIA_TYPE => CompressionFailure::UnsupportedFormat,
        _ => CompressionFailure::Service,
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ApiError>(&body) {
        Ok(api) => format!("{}: {}", api.error, api.message),
        Err(_) => body,
    };
    tracing::error!("Optimizer API error (status {}): {}", status, message);

    Err(Error::compression(
        failure_for_status(status),
        format!("status {}: {}", status, message),
    ))
}
