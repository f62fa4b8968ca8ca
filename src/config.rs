//! Runtime configuration read from the environment
//!
//! Values may also come from a `.env` file, which `main` loads with dotenvy
//! before calling [`AppConfig::from_env`].

use std::env;

pub const DEFAULT_WORKFLOW_API_URL: &str = "https://api.dify.ai/v1/workflows/run";

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `PORT` - Server port number (default: 8080)
    pub port: u16,

    /// `DATABASE_URL` - Path to database file (default: "data.db")
    pub database_url: String,

    /// `PUBLIC_BASE_URL` - Prefix of publish URLs (default: "http://localhost:<PORT>")
    pub public_base_url: String,

    /// `WORKFLOW_API_URL` - Form generation workflow endpoint
    pub workflow_api_url: String,

    /// `WORKFLOW_API_KEY` - Bearer key for the workflow; generation is unavailable without it
    pub workflow_api_key: Option<String>,

    /// `AUTHORIZATION` - Shared secret required on `/api` routes when set
    pub auth_secret: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let port = get("PORT")
            .and_then(|port| port.parse().ok())
            .unwrap_or(8080);

        Self {
            port,
            database_url: get("DATABASE_URL").unwrap_or_else(|| "data.db".to_string()),
            public_base_url: get("PUBLIC_BASE_URL")
                .unwrap_or_else(|| format!("http://localhost:{}", port)),
            workflow_api_url: get("WORKFLOW_API_URL")
                .unwrap_or_else(|| DEFAULT_WORKFLOW_API_URL.to_string()),
            workflow_api_key: get("WORKFLOW_API_KEY"),
            auth_secret: get("AUTHORIZATION"),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_apply_when_unset() {
        let config = AppConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.database_url, "data.db");
        assert_eq!(config.public_base_url, "http://localhost:8080");
        assert_eq!(config.workflow_api_url, DEFAULT_WORKFLOW_API_URL);
        assert!(config.workflow_api_key.is_none());
        assert!(config.auth_secret.is_none());
    }

    #[test]
    fn values_are_read_from_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("PORT", "9000"),
            ("AUTHORIZATION", ""),
            ("WORKFLOW_API_KEY", "app-123"),
        ]);
        let config = AppConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.port, 9000);
        assert_eq!(config.public_base_url, "http://localhost:9000");
        assert_eq!(config.workflow_api_key.as_deref(), Some("app-123"));
        assert!(config.auth_secret.is_none());
    }
}
