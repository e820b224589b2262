use super::ObjectStore;
use crate::mime::detect_image_mime;
use crate::models::StorageConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, ConfigLoader, SdkConfig};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::{config::Region, Client as S3Client};
use std::path::Path;
use tokio::io::AsyncReadExt;

pub struct S3ObjectStore {
    client: S3Client,
}

impl S3ObjectStore {
    pub async fn new(config: StorageConfig) -> Result<Self> {
        let path_style = config.endpoint.is_some();
        let sdk_config = sdk_loader(config).load().await;
        Ok(Self::from_sdk_config(&sdk_config, path_style))
    }

    /// Custom endpoints (MinIO, Ceph, local gateways) address buckets by path.
    fn from_sdk_config(sdk_config: &SdkConfig, path_style: bool) -> Self {
        let s3_config = aws_sdk_s3::config::Builder::from(sdk_config)
            .force_path_style(path_style)
            .build();
        Self {
            client: S3Client::from_conf(s3_config),
        }
    }
}

fn sdk_loader(config: StorageConfig) -> ConfigLoader {
    if config.version != "latest" {
        tracing::warn!(
            "Storage API version '{}' requested; the client always speaks the latest version",
            config.version
        );
    }

    let credentials = aws_sdk_s3::config::Credentials::new(
        config.access_key_id,
        config.secret_access_key,
        None,
        None,
        "tinyimg",
    );

    let loader = aws_config::defaults(BehaviorVersion::latest())
        .credentials_provider(credentials)
        .region(Region::new(config.region));
    match config.endpoint {
        Some(endpoint) => loader.endpoint_url(endpoint),
        None => loader,
    }
}

async fn sniff_content_type(path: &Path) -> Result<&'static str> {
    let mut head = [0u8; 12];
    let mut file = tokio::fs::File::open(path).await?;
    let mut filled = 0;
    while filled < head.len() {
        let read = file.read(&mut head[filled..]).await?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    Ok(detect_image_mime(&head[..filled]))
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn exists(&self, bucket: &str, key: &str) -> Result<bool> {
        let result = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Ok(false)
                } else {
                    Err(Error::Storage(
                        DisplayErrorContext(&service_error).to_string(),
                    ))
                }
            }
        }
    }

    async fn put_file(&self, bucket: &str, key: &str, source: &Path) -> Result<()> {
        let content_type = sniff_content_type(source).await?;
        let body = ByteStream::from_path(source)
            .await
            .map_err(|e| Error::Storage(format!("Failed to read {}: {}", source.display(), e)))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| Error::Storage(DisplayErrorContext(&e).to_string()))?;

        tracing::info!("Uploaded {} to {}/{}", source.display(), bucket, key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_config::retry::RetryConfig;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_sniff_content_type_from_file_head() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("a.png");
        std::fs::write(&png, [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]).unwrap();
        let empty = dir.path().join("empty");
        std::fs::write(&empty, b"").unwrap();

        assert_eq!(sniff_content_type(&png).await.unwrap(), "image/png");
        assert_eq!(
            sniff_content_type(&empty).await.unwrap(),
            "application/octet-stream"
        );
    }

    #[tokio::test]
    async fn test_client_builds_with_custom_endpoint() {
        let store = S3ObjectStore::new(storage_config("http://127.0.0.1:9000".to_string())).await;

        assert!(store.is_ok());
    }

    fn storage_config(endpoint: String) -> StorageConfig {
        StorageConfig {
            bucket: "assets".to_string(),
            region: "eu-central-1".to_string(),
            version: "latest".to_string(),
            access_key_id: "AKIA".to_string(),
            secret_access_key: "secret".to_string(),
            endpoint: Some(endpoint),
        }
    }

    async fn store_for(server: &MockServer) -> S3ObjectStore {
        let sdk_config = sdk_loader(storage_config(server.uri()))
            .retry_config(RetryConfig::disabled())
            .load()
            .await;
        S3ObjectStore::from_sdk_config(&sdk_config, true)
    }

    #[tokio::test]
    async fn test_exists_true_on_head_success() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/assets/user_upload/a.jpg"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_for(&server).await;

        assert!(store.exists("assets", "user_upload/a.jpg").await.unwrap());
    }

    #[tokio::test]
    async fn test_exists_false_on_head_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/assets/user_upload/a.jpg"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = store_for(&server).await;

        assert!(!store.exists("assets", "user_upload/a.jpg").await.unwrap());
    }

    #[tokio::test]
    async fn test_exists_forbidden_is_storage_error() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/assets/user_upload/a.jpg"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let store = store_for(&server).await;
        let err = store.exists("assets", "user_upload/a.jpg").await.unwrap_err();

        assert!(matches!(err, Error::Storage(_)));
    }

    #[tokio::test]
    async fn test_put_file_sends_sniffed_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/assets/user_upload/a.png"))
            .and(header("content-type", "image/png"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("scratch.png");
        std::fs::write(&file, [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]).unwrap();

        let store = store_for(&server).await;

        store
            .put_file("assets", "user_upload/a.png", &file)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_put_file_provider_error_is_storage_error() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/assets/user_upload/a.png"))
            .respond_with(
                ResponseTemplate::new(500)
                    .insert_header("content-type", "application/xml")
                    .set_body_string(
                        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
                         <Error><Code>InternalError</Code>\
                         <Message>We encountered an internal error.</Message>\
                         <RequestId>4442587FB7D0A2F9</RequestId></Error>",
                    ),
            )
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("scratch.png");
        std::fs::write(&file, b"not really a png").unwrap();

        let store = store_for(&server).await;
        let err = store
            .put_file("assets", "user_upload/a.png", &file)
            .await
            .unwrap_err();

        match err {
            Error::Storage(message) => assert!(message.contains("InternalError"), "{}", message),
            other => panic!("expected storage error, got {:?}", other),
        }
    }
}
