use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use url::Url;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{PropmediaError, Result};

/// Somewhere uploaded images end up. Returns the public URL of the object.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn upload(&self, object_path: &str, content_type: &str, body: Vec<u8>) -> Result<String>;
}

/// Response body of the storage function
#[derive(Deserialize)]
struct UploadResponse {
    url: String,
}

/// Client for the remote storage function.
///
/// Each upload is `POST <function_url>?path=<object_path>` with the raw file
/// bytes as the body.
pub struct StorageClient {
    client: Client,
    function_url: Url,
    api_key: Option<String>,
}

impl StorageClient {
    pub fn new(function_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let function_url = Url::parse(function_url).map_err(|e| {
            PropmediaError::Config(format!("invalid storage function URL {}: {}", function_url, e))
        })?;

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            function_url,
            api_key,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.storage.function_url,
            config.storage_api_key(),
            Duration::from_secs(config.storage.timeout_secs),
        )
    }

    fn upload_url(&self, object_path: &str) -> Url {
        let mut url = self.function_url.clone();
        url.query_pairs_mut().append_pair("path", object_path);
        url
    }
}

#[async_trait]
impl MediaStore for StorageClient {
    async fn upload(&self, object_path: &str, content_type: &str, body: Vec<u8>) -> Result<String> {
        let mut request = self
            .client
            .post(self.upload_url(object_path))
            .header(CONTENT_TYPE, content_type)
            .body(body);
        if let Some(key) = &self.api_key {
            request = request.header(AUTHORIZATION, format!("Bearer {}", key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| PropmediaError::Upload(format!("Network error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(PropmediaError::Upload(format!(
                "storage function returned {}: {}",
                status, body
            )));
        }

        let result: UploadResponse = response
            .json()
            .await
            .map_err(|e| PropmediaError::Upload(format!("Failed to parse response: {}", e)))?;

        Ok(result.url)
    }
}

/// Fresh random object path keeping the file's extension (`<uuid>.jpg`)
pub fn generate_object_path(file_name: &str) -> String {
    let id = Uuid::new_v4();
    match Path::new(file_name).extension().and_then(|e| e.to_str()) {
        Some(ext) if !ext.is_empty() => format!("{}.{}", id, ext.to_lowercase()),
        _ => id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_object_path_keeps_extension() {
        let path = generate_object_path("Hero.JPG");
        assert!(path.ends_with(".jpg"));
        assert_eq!(path.len(), 36 + 4);
        assert_ne!(generate_object_path("a.jpg"), generate_object_path("a.jpg"));
    }

    #[test]
    fn test_generate_object_path_without_extension() {
        let path = generate_object_path("README");
        assert!(Uuid::parse_str(&path).is_ok());
    }

    #[test]
    fn test_upload_url_appends_path_query() {
        let client = StorageClient::new(
            "https://example.supabase.co/functions/v1/upload?bucket=media",
            None,
            Duration::from_secs(5),
        )
        .unwrap();
        let url = client.upload_url("abc.png");
        assert_eq!(
            url.as_str(),
            "https://example.supabase.co/functions/v1/upload?bucket=media&path=abc.png"
        );
    }

    #[test]
    fn test_invalid_function_url() {
        assert!(matches!(
            StorageClient::new("not a url", None, Duration::from_secs(5)),
            Err(PropmediaError::Config(_))
        ));
    }
}
