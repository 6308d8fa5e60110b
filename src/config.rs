//! Runtime configuration from environment variables (and an optional `.env`)

use crate::narrative::DEFAULT_MODEL;
use crate::TripError;
use std::env;
use std::path::PathBuf;

pub const DEFAULT_AMADEUS_BASE_URL: &str = "https://test.api.amadeus.com";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_SEARCH_PROXY_URL: &str = "http://localhost:5000";

#[cfg(feature = "sled-store")]
pub const DEFAULT_CATALOG_PATH: &str = "catalog.sled";
#[cfg(not(feature = "sled-store"))]
pub const DEFAULT_CATALOG_PATH: &str = "catalog.json";

#[derive(Debug, Clone)]
pub struct Config {
    pub amadeus_base_url: String,
    pub amadeus_client_id: Option<String>,
    pub amadeus_client_secret: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
    pub search_proxy_url: String,
    pub catalog_path: PathBuf,
    pub user_id: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            amadeus_base_url: DEFAULT_AMADEUS_BASE_URL.to_string(),
            amadeus_client_id: None,
            amadeus_client_secret: None,
            openai_api_key: None,
            openai_model: DEFAULT_MODEL.to_string(),
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            search_proxy_url: DEFAULT_SEARCH_PROXY_URL.to_string(),
            catalog_path: PathBuf::from(DEFAULT_CATALOG_PATH),
            user_id: None,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Load `.env` if present, then read the environment. Secrets are not
    /// required here; each client asks for what it needs when built.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self::from_lookup(non_empty_var)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            amadeus_base_url: lookup("AMADEUS_BASE_URL").unwrap_or(defaults.amadeus_base_url),
            amadeus_client_id: lookup("AMADEUS_CLIENT_ID"),
            amadeus_client_secret: lookup("AMADEUS_CLIENT_SECRET"),
            openai_api_key: lookup("OPENAI_API_KEY"),
            openai_model: lookup("OPENAI_MODEL").unwrap_or(defaults.openai_model),
            openai_base_url: lookup("OPENAI_BASE_URL").unwrap_or(defaults.openai_base_url),
            search_proxy_url: lookup("SEARCH_PROXY_URL").unwrap_or(defaults.search_proxy_url),
            catalog_path: lookup("TRIP_CATALOG_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.catalog_path),
            user_id: lookup("TRIP_USER_ID"),
        }
    }

    pub fn amadeus_credentials(&self) -> Result<(&str, &str), TripError> {
        match (&self.amadeus_client_id, &self.amadeus_client_secret) {
            (Some(id), Some(secret)) => Ok((id.as_str(), secret.as_str())),
            _ => Err(TripError::ConfigError(
                "AMADEUS_CLIENT_ID and AMADEUS_CLIENT_SECRET must be set".to_string(),
            )),
        }
    }

    pub fn openai_api_key(&self) -> Result<&str, TripError> {
        self.openai_api_key
            .as_deref()
            .ok_or_else(|| TripError::ConfigError("OPENAI_API_KEY must be set".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = Config::from_lookup(lookup_from(&[]));
        assert_eq!(config.amadeus_base_url, DEFAULT_AMADEUS_BASE_URL);
        assert_eq!(config.openai_model, "gpt-4");
        assert_eq!(config.search_proxy_url, DEFAULT_SEARCH_PROXY_URL);
        assert!(config.user_id.is_none());
        assert!(config.amadeus_credentials().is_err());
        assert!(matches!(config.openai_api_key(), Err(TripError::ConfigError(_))));
    }

    #[test]
    fn test_values_from_environment() {
        let config = Config::from_lookup(lookup_from(&[
            ("AMADEUS_CLIENT_ID", "id"),
            ("AMADEUS_CLIENT_SECRET", "secret"),
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_MODEL", "gpt-4o"),
            ("TRIP_CATALOG_PATH", "/tmp/catalog"),
            ("TRIP_USER_ID", "uid-7"),
        ]));

        assert_eq!(config.amadeus_credentials().unwrap(), ("id", "secret"));
        assert_eq!(config.openai_api_key().unwrap(), "sk-test");
        assert_eq!(config.openai_model, "gpt-4o");
        assert_eq!(config.catalog_path, PathBuf::from("/tmp/catalog"));
        assert_eq!(config.user_id.as_deref(), Some("uid-7"));
    }
}
