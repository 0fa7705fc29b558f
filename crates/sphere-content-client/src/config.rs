//! Pinata client configuration.
//!
//! Credentials are required; endpoints default to the public Pinata API and
//! gateway and can be pointed elsewhere for a dedicated gateway or tests.

use url::Url;
use zeroize::Zeroizing;

/// Connection settings for the pinning service.
///
/// Custom `Debug` redacts both keys.
#[derive(Clone)]
pub struct ContentStoreConfig {
    /// Pinning API base URL. Default: <https://api.pinata.cloud>
    pub api_url: Url,
    /// Gateway used to build public content URLs.
    /// Default: <https://gateway.pinata.cloud>
    pub gateway_url: Url,
    pub api_key: Zeroizing<String>,
    pub secret_api_key: Zeroizing<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl std::fmt::Debug for ContentStoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentStoreConfig")
            .field("api_url", &self.api_url.as_str())
            .field("gateway_url", &self.gateway_url.as_str())
            .field("api_key", &"[REDACTED]")
            .field("secret_api_key", &"[REDACTED]")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ContentStoreConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `PINATA_API_KEY` (required)
    /// - `PINATA_SECRET_API_KEY` (required)
    /// - `PINATA_API_URL` (default: `https://api.pinata.cloud`)
    /// - `PINATA_GATEWAY_URL` (default: `https://gateway.pinata.cloud`)
    /// - `PINATA_TIMEOUT_SECS` (default: 30)
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("PINATA_API_KEY")
            .map_err(|_| ConfigError::Missing("PINATA_API_KEY"))?;
        let secret_api_key = std::env::var("PINATA_SECRET_API_KEY")
            .map_err(|_| ConfigError::Missing("PINATA_SECRET_API_KEY"))?;

        Ok(Self {
            api_url: env_url("PINATA_API_URL", "https://api.pinata.cloud")?,
            gateway_url: env_url("PINATA_GATEWAY_URL", "https://gateway.pinata.cloud")?,
            api_key: Zeroizing::new(api_key),
            secret_api_key: Zeroizing::new(secret_api_key),
            timeout_secs: std::env::var("PINATA_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
        })
    }

    /// Point both the API and the gateway at one local server.
    pub fn local_mock(base: &str, key: &str, secret: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(base)
            .map_err(|e| ConfigError::InvalidUrl(base.to_string(), e.to_string()))?;
        Ok(Self {
            api_url: url.clone(),
            gateway_url: url,
            api_key: Zeroizing::new(key.to_string()),
            secret_api_key: Zeroizing::new(secret.to_string()),
            timeout_secs: 5,
        })
    }
}

fn env_url(var: &str, default: &str) -> Result<Url, ConfigError> {
    let raw = std::env::var(var).unwrap_or_else(|_| default.to_string());
    Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string()))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("credential is not a valid header value")]
    InvalidCredential,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_mock_uses_one_base_for_api_and_gateway() {
        let cfg = ContentStoreConfig::local_mock("http://127.0.0.1:9100", "k", "s").unwrap();
        assert_eq!(cfg.api_url, cfg.gateway_url);
        assert_eq!(cfg.timeout_secs, 5);
    }

    #[test]
    fn debug_redacts_keys() {
        let cfg = ContentStoreConfig::local_mock("http://127.0.0.1:9100", "pk-123", "sk-456").unwrap();
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("pk-123"));
        assert!(!rendered.contains("sk-456"));
    }

    #[test]
    fn env_url_uses_default_when_var_absent() {
        let url = env_url("SPHERE_UNSET_PINATA_URL_VAR", "https://api.pinata.cloud").unwrap();
        assert_eq!(url.as_str(), "https://api.pinata.cloud/");
    }
}
