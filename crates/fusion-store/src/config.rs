//! Remote store configuration loaded from environment variables.
//!
//! All settings have defaults so the store client can be constructed with
//! zero configuration against a local development stack.

use fusion_shared::constants::ATTACHMENT_BUCKET;

/// Connection settings for the hosted row/object store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Base URL of the hosted store.
    /// Env: `FUSION_STORE_URL`
    /// Default: `http://localhost:54321`
    pub base_url: String,

    /// API key sent with every request (also the bearer token when the
    /// session carries no access token of its own).
    /// Env: `FUSION_STORE_KEY`
    /// Default: empty (anonymous local development).
    pub api_key: String,

    /// Object-storage bucket for message attachments.
    /// Env: `FUSION_STORE_BUCKET`
    /// Default: `message-attachments`
    pub bucket: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:54321".to_string(),
            api_key: String::new(),
            bucket: ATTACHMENT_BUCKET.to_string(),
        }
    }
}

impl StoreConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("FUSION_STORE_URL") {
            // Trailing slashes would double up in composed endpoint paths.
            config.base_url = url.trim_end_matches('/').to_string();
        }

        if let Ok(key) = std::env::var("FUSION_STORE_KEY") {
            config.api_key = key;
        }

        if let Ok(bucket) = std::env::var("FUSION_STORE_BUCKET") {
            if !bucket.is_empty() {
                config.bucket = bucket;
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.base_url, "http://localhost:54321");
        assert_eq!(config.bucket, ATTACHMENT_BUCKET);
        assert!(config.api_key.is_empty());
    }
}
