use serde::Deserialize;
use std::fs;
use tracing::warn;

use crate::common::error::{AddressError, Result};

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Per-provider call budget; a timed-out call triggers fallback
    pub provider_timeout_ms: u64,
    /// Exact-postcode matches beyond this count stop the cascade early
    pub sufficient_matches: usize,
    pub default_limit: usize,
    /// Postcode lookups default higher so a whole street fits in one response
    pub postcode_limit: usize,
    /// Result cache TTL; 0 disables caching
    pub cache_ttl_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            provider_timeout_ms: 3500,
            sufficient_matches: 5,
            default_limit: 10,
            postcode_limit: 50,
            cache_ttl_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProvidersConfig {
    #[serde(default = "ProviderEndpoint::licensed_default")]
    pub licensed: ProviderEndpoint,
    #[serde(default = "ProviderEndpoint::places_default")]
    pub places: ProviderEndpoint,
    #[serde(default)]
    pub geocoder: GeocoderConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderEndpoint {
    pub base_url: String,
    pub api_key: String,
}

impl Default for ProviderEndpoint {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
        }
    }
}

impl ProviderEndpoint {
    fn licensed_default() -> Self {
        Self {
            base_url: "https://api.getaddress.io".to_string(),
            api_key: String::new(),
        }
    }

    fn places_default() -> Self {
        Self {
            base_url: "https://maps.googleapis.com".to_string(),
            api_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
    pub base_url: String,
    pub api_key: String,
    /// Postcode centroid lookup used for proximity bias, no key required
    pub centroid_url: String,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.mapbox.com".to_string(),
            api_key: String::new(),
            centroid_url: "https://api.postcodes.io".to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = "config.toml";
        let config_content = fs::read_to_string(config_path).map_err(|e| {
            AddressError::Config(format!("Failed to read config file '{config_path}': {e}"))
        })?;

        let mut config: Config = toml::from_str(&config_content)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Missing config file is not fatal; defaults plus env vars carry the
    /// service in development and in tests.
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(config) => config,
            Err(e) => {
                warn!("Using default configuration: {e}");
                let mut config = Config {
                    providers: ProvidersConfig {
                        licensed: ProviderEndpoint::licensed_default(),
                        places: ProviderEndpoint::places_default(),
                        geocoder: GeocoderConfig::default(),
                    },
                    ..Config::default()
                };
                config.apply_env_overrides();
                config
            }
        }
    }

    /// API keys come from the environment when set, so secrets stay out of
    /// config.toml in deployed environments.
    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("ADDRESS_LICENSED_API_KEY") {
            self.providers.licensed.api_key = key;
        }
        if let Ok(key) = std::env::var("ADDRESS_PLACES_API_KEY") {
            self.providers.places.api_key = key;
        }
        if let Ok(key) = std::env::var("ADDRESS_GEOCODER_TOKEN") {
            self.providers.geocoder.api_key = key;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.pipeline.provider_timeout_ms, 3500);
        assert_eq!(config.pipeline.sufficient_matches, 5);
        assert_eq!(config.pipeline.postcode_limit, 50);
    }

    #[test]
    fn test_parse_partial_toml() {
        let toml_str = r#"
            [server]
            port = 9090

            [pipeline]
            provider_timeout_ms = 2000

            [providers.licensed]
            base_url = "http://localhost:9999"
            api_key = "k"
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.pipeline.provider_timeout_ms, 2000);
        // Unspecified sections keep their defaults
        assert_eq!(config.pipeline.sufficient_matches, 5);
        assert_eq!(config.providers.licensed.base_url, "http://localhost:9999");
    }
}
