//! # sphere-content-client: Pinning Service Client
//!
//! Uploads credential files to Pinata and returns the public gateway URL
//! that becomes the document's content URL (and, on chain, the
//! `ipfsHash` argument of `uploadCertificate`).
//!
//! Transport failures are retried with backoff (see `retry`). A 401 is
//! reported as [`ContentApiError::Unauthorized`] so operators can tell a
//! bad key from an outage.

pub mod config;
pub mod error;
pub(crate) mod retry;

pub use config::{ConfigError, ContentStoreConfig};
pub use error::ContentApiError;

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};

/// Response body of `POST /pinning/pinFileToIPFS`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PinFileResponse {
    pub ipfs_hash: String,
    #[serde(default)]
    pub pin_size: u64,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// A stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PinnedContent {
    /// Content identifier returned by the service.
    pub ipfs_hash: String,
    /// `{gateway}/ipfs/{ipfs_hash}`.
    pub url: String,
    /// Size reported by the service, in bytes.
    pub size: u64,
}

/// Client for the pinning API.
#[derive(Debug, Clone)]
pub struct ContentClient {
    http: reqwest::Client,
    api_url: url::Url,
    gateway_url: url::Url,
}

impl ContentClient {
    /// Create a client. API keys are installed as default headers.
    pub fn new(config: ContentStoreConfig) -> Result<Self, ContentApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "pinata_api_key",
            HeaderValue::from_str(config.api_key.as_str())
                .map_err(|_| ConfigError::InvalidCredential)?,
        );
        let mut secret = HeaderValue::from_str(config.secret_api_key.as_str())
            .map_err(|_| ConfigError::InvalidCredential)?;
        secret.set_sensitive(true);
        headers.insert("pinata_secret_api_key", secret);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| ContentApiError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;

        Ok(Self {
            http,
            api_url: config.api_url,
            gateway_url: config.gateway_url,
        })
    }

    /// Public URL for a content hash.
    pub fn gateway_url_for(&self, ipfs_hash: &str) -> Result<String, ContentApiError> {
        if ipfs_hash.is_empty() || !ipfs_hash.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ContentApiError::InvalidHash(ipfs_hash.to_string()));
        }
        Ok(format!(
            "{}/ipfs/{ipfs_hash}",
            self.gateway_url.as_str().trim_end_matches('/')
        ))
    }

    /// Pin a file.
    ///
    /// Calls `POST {api_url}/pinning/pinFileToIPFS` with a multipart body
    /// holding `file` and `pinataMetadata`.
    pub async fn upload(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        content_type: Option<&str>,
    ) -> Result<PinnedContent, ContentApiError> {
        let endpoint = "POST /pinning/pinFileToIPFS";
        let url = format!("{}pinning/pinFileToIPFS", self.api_url);
        let metadata = serde_json::json!({ "name": filename }).to_string();
        tracing::debug!(filename, size = bytes.len(), "pinning file");

        let resp = retry::retry_send(|| {
            let mut part = Part::bytes(bytes.clone()).file_name(filename.to_string());
            if let Some(mime) = content_type {
                // An unparseable MIME type is dropped rather than failing the upload.
                part = match part.mime_str(mime) {
                    Ok(p) => p,
                    Err(_) => Part::bytes(bytes.clone()).file_name(filename.to_string()),
                };
            }
            let form = Form::new()
                .part("file", part)
                .text("pinataMetadata", metadata.clone());
            self.http.post(&url).multipart(form).send()
        })
        .await
        .map_err(|e| ContentApiError::Http {
            endpoint: endpoint.into(),
            source: e,
        })?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ContentApiError::Unauthorized {
                endpoint: endpoint.into(),
            });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ContentApiError::ApiError {
                endpoint: endpoint.into(),
                status: status.as_u16(),
                body,
            });
        }

        let pinned: PinFileResponse =
            resp.json().await.map_err(|e| ContentApiError::Deserialization {
                endpoint: endpoint.into(),
                source: e,
            })?;
        let url = self.gateway_url_for(&pinned.ipfs_hash)?;
        tracing::info!(ipfs_hash = %pinned.ipfs_hash, "file pinned");

        Ok(PinnedContent {
            ipfs_hash: pinned.ipfs_hash,
            url,
            size: pinned.pin_size,
        })
    }
}
