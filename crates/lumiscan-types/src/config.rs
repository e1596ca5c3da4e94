//! Configuration schema for the provider client, storage, and pipeline.
//!
//! All sections are TOML-decodable with every field defaulted, so a config
//! file only needs to state what it overrides. Credentials are never
//! stored inline: the provider section names the *environment variables*
//! that hold them (`client_id_env` / `api_key_env`).
//!
//! Discovery: [`LumiscanConfig::load`] reads the file named by the
//! `LUMISCAN_CONFIG` environment variable, falling back to defaults when
//! it is unset.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{LumiscanError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LumiscanConfig {
    pub provider: VisionProviderConfig,
    pub storage: StorageConfig,
    pub pipeline: PipelineConfig,
}

impl LumiscanConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        toml::from_str(input).map_err(|e| LumiscanError::ConfigInvalid {
            reason: format!("failed to parse config: {e}"),
        })
    }

    /// Load from the path in `LUMISCAN_CONFIG`, or defaults when unset.
    pub fn load() -> Result<Self> {
        match std::env::var("LUMISCAN_CONFIG") {
            Ok(path) => {
                tracing::debug!(path = %path, "loading config file");
                let contents = std::fs::read_to_string(&path).map_err(|e| {
                    LumiscanError::ConfigInvalid {
                        reason: format!("failed to read config file {path}: {e}"),
                    }
                })?;
                Self::from_toml_str(&contents)
            }
            Err(_) => {
                tracing::debug!("LUMISCAN_CONFIG not set, using defaults");
                Ok(Self::default())
            }
        }
    }
}

/// Connection settings for the remote vision provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionProviderConfig {
    /// Base URL of the provider API (e.g. `https://api.vendor.example/v1`).
    pub base_url: String,

    /// Environment variable holding the provider client id.
    pub client_id_env: String,

    /// Environment variable holding the provider API key.
    pub api_key_env: String,

    /// TCP connect timeout, seconds.
    pub connect_timeout_secs: u64,

    /// Per-request total timeout, seconds.
    pub request_timeout_secs: u64,

    /// Maximum result-poll attempts before giving up.
    pub poll_max_attempts: u32,

    /// Fixed delay between poll attempts, milliseconds.
    pub poll_interval_ms: u64,

    /// Content type sent with the image upload.
    pub upload_content_type: String,
}

impl Default for VisionProviderConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            client_id_env: "LUMISCAN_VISION_CLIENT_ID".into(),
            api_key_env: "LUMISCAN_VISION_API_KEY".into(),
            connect_timeout_secs: 10,
            request_timeout_secs: 60,
            poll_max_attempts: 10,
            poll_interval_ms: 3000,
            upload_content_type: "image/jpeg".into(),
        }
    }
}

impl VisionProviderConfig {
    /// Reject configs that cannot possibly reach a provider.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(LumiscanError::ConfigInvalid {
                reason: "provider.base_url must be set".into(),
            });
        }
        if self.poll_max_attempts == 0 {
            return Err(LumiscanError::ConfigInvalid {
                reason: "provider.poll_max_attempts must be at least 1".into(),
            });
        }
        Ok(())
    }
}

/// Internal object-storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Key prefix for internal image copies
    /// (`{key_prefix}/{user_id}/{record_id}/original.jpg`).
    pub key_prefix: String,

    /// Root directory for the filesystem-backed object store.
    pub root_dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            key_prefix: "skin-analysis".into(),
            root_dir: None,
        }
    }
}

/// Entry-validation settings for the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Minimum accepted image width, pixels.
    pub min_image_width: u32,

    /// Minimum accepted image height, pixels.
    pub min_image_height: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_image_width: 500,
            min_image_height: 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = LumiscanConfig::default();
        assert_eq!(config.provider.connect_timeout_secs, 10);
        assert_eq!(config.provider.request_timeout_secs, 60);
        assert_eq!(config.provider.poll_max_attempts, 10);
        assert_eq!(config.provider.poll_interval_ms, 3000);
        assert_eq!(config.provider.upload_content_type, "image/jpeg");
        assert_eq!(config.storage.key_prefix, "skin-analysis");
        assert_eq!(config.pipeline.min_image_width, 500);
        assert_eq!(config.pipeline.min_image_height, 500);
    }

    #[test]
    fn partial_toml_overrides_defaults() {
        let config = LumiscanConfig::from_toml_str(
            r#"
            [provider]
            base_url = "https://api.vendor.example/v1"
            poll_interval_ms = 500

            [pipeline]
            min_image_width = 640
            "#,
        )
        .unwrap();
        assert_eq!(config.provider.base_url, "https://api.vendor.example/v1");
        assert_eq!(config.provider.poll_interval_ms, 500);
        // Untouched fields keep their defaults.
        assert_eq!(config.provider.poll_max_attempts, 10);
        assert_eq!(config.pipeline.min_image_width, 640);
        assert_eq!(config.pipeline.min_image_height, 500);
    }

    #[test]
    fn invalid_toml_is_config_error() {
        let err = LumiscanConfig::from_toml_str("provider = 3").unwrap_err();
        assert!(matches!(err, LumiscanError::ConfigInvalid { .. }));
    }

    #[test]
    fn validate_requires_base_url() {
        let config = VisionProviderConfig::default();
        assert!(config.validate().is_err());

        let config = VisionProviderConfig {
            base_url: "https://api.vendor.example/v1".into(),
            ..VisionProviderConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_poll_attempts() {
        let config = VisionProviderConfig {
            base_url: "https://api.vendor.example/v1".into(),
            poll_max_attempts: 0,
            ..VisionProviderConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn credential_env_indirection_never_holds_secrets() {
        let config = VisionProviderConfig::default();
        assert!(config.client_id_env.ends_with("CLIENT_ID"));
        assert!(config.api_key_env.ends_with("API_KEY"));
        let debug = format!("{config:?}");
        assert!(debug.contains("LUMISCAN_VISION_API_KEY"));
    }
}
