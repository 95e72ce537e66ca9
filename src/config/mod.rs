use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

/// Complete gateway configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub oauth: OAuthStateConfig,
    #[serde(default)]
    pub linkedin: LinkedInConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Token store configuration
///
/// The encryption key is deliberately absent: it is only read from
/// `LINKGATE_ENCRYPTION_KEY`.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    /// How often to delete expired tokens (seconds, 0 disables)
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

fn default_database_path() -> String {
    "linkedin_tokens.db".to_string()
}

fn default_sweep_interval() -> u64 {
    3600
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            sweep_interval_seconds: default_sweep_interval(),
        }
    }
}

/// CSRF state handling for the browser OAuth flow
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthStateConfig {
    #[serde(default = "default_state_expiry")]
    pub state_expiry_seconds: i64,
    #[serde(default = "default_state_cleanup_interval")]
    pub state_cleanup_interval_seconds: u64,
}

fn default_state_expiry() -> i64 {
    600
}

fn default_state_cleanup_interval() -> u64 {
    300
}

impl Default for OAuthStateConfig {
    fn default() -> Self {
        Self {
            state_expiry_seconds: default_state_expiry(),
            state_cleanup_interval_seconds: default_state_cleanup_interval(),
        }
    }
}

/// LinkedIn application identity, endpoints and posting limits
#[derive(Debug, Clone, Deserialize)]
pub struct LinkedInConfig {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    /// Space-separated scopes requested when the caller names none
    #[serde(default = "default_scopes")]
    pub scopes: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_enforce_post_limits")]
    pub enforce_post_limits: bool,
    #[serde(default = "default_max_post_length")]
    pub max_post_length: usize,
    #[serde(default = "default_max_mentions")]
    pub max_mentions: usize,
}

fn default_redirect_uri() -> String {
    "http://localhost:8000/linkedin/callback".to_string()
}

fn default_scopes() -> String {
    "openid profile email w_member_social".to_string()
}

fn default_api_base_url() -> String {
    "https://api.linkedin.com".to_string()
}

fn default_auth_url() -> String {
    "https://www.linkedin.com/oauth/v2/authorization".to_string()
}

fn default_token_url() -> String {
    "https://www.linkedin.com/oauth/v2/accessToken".to_string()
}

fn default_enforce_post_limits() -> bool {
    true
}

fn default_max_post_length() -> usize {
    3000
}

fn default_max_mentions() -> usize {
    10
}

impl Default for LinkedInConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_uri: default_redirect_uri(),
            scopes: default_scopes(),
            api_base_url: default_api_base_url(),
            auth_url: default_auth_url(),
            token_url: default_token_url(),
            enforce_post_limits: default_enforce_post_limits(),
            max_post_length: default_max_post_length(),
            max_mentions: default_max_mentions(),
        }
    }
}

impl GatewayConfig {
    /// Loads `.env`, then the TOML file named by `LINKGATE_CONFIG` (if any),
    /// then applies environment overrides.
    pub fn from_env_or_file() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "Loaded .env file");
        }

        let mut config = match std::env::var("LINKGATE_CONFIG") {
            Ok(path) => load_config(&path)?,
            Err(_) => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Applies overrides from a key lookup (the process environment in
    /// production, a map in tests).
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("HOST") {
            self.server.host = v;
        }
        if let Some(v) = lookup("PORT") {
            self.server.port = v
                .parse()
                .with_context(|| format!("PORT must be a valid port number, got '{}'", v))?;
        }
        if let Some(v) = lookup("LINKGATE_DATABASE") {
            self.storage.database_path = v;
        }
        if let Some(v) = lookup("LINKEDIN_CLIENT_ID") {
            self.linkedin.client_id = Some(v);
        }
        if let Some(v) = lookup("LINKEDIN_CLIENT_SECRET") {
            self.linkedin.client_secret = Some(v);
        }
        if let Some(v) = lookup("LINKEDIN_REDIRECT_URI") {
            self.linkedin.redirect_uri = v;
        }
        Ok(())
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<GatewayConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path))?;
    let config: GatewayConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file '{}'", path))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.storage.database_path, "linkedin_tokens.db");
        assert_eq!(config.oauth.state_expiry_seconds, 600);
        assert_eq!(config.linkedin.scopes, "openid profile email w_member_social");
        assert_eq!(config.linkedin.max_post_length, 3000);
        assert!(config.linkedin.enforce_post_limits);
        assert!(config.linkedin.client_id.is_none());
    }

    #[test]
    fn test_config_deserialization() {
        let toml = r#"
            [server]
            host = "127.0.0.1"
            port = 9000

            [storage]
            database_path = "/var/lib/linkgate/tokens.db"
            sweep_interval_seconds = 0

            [oauth]
            state_expiry_seconds = 120

            [linkedin]
            client_id = "abc"
            client_secret = "shh"
            scopes = "openid profile"
            enforce_post_limits = false
        "#;

        let config: GatewayConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.storage.sweep_interval_seconds, 0);
        assert_eq!(config.oauth.state_expiry_seconds, 120);
        assert_eq!(config.linkedin.client_id.as_deref(), Some("abc"));
        assert_eq!(config.linkedin.scopes, "openid profile");
        assert!(!config.linkedin.enforce_post_limits);
    }

    #[test]
    fn test_partial_config() {
        let toml = r#"
            [linkedin]
            max_mentions = 3
        "#;

        let config: GatewayConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.linkedin.max_mentions, 3);
        assert_eq!(config.linkedin.max_post_length, 3000); // Default
        assert_eq!(config.server.port, 8000); // Default
        assert_eq!(
            config.linkedin.token_url,
            "https://www.linkedin.com/oauth/v2/accessToken"
        );
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("PORT", "8123"),
            ("LINKEDIN_CLIENT_ID", "from-env"),
            ("LINKGATE_DATABASE", ":memory:"),
        ]
        .into_iter()
        .collect();

        let mut config = GatewayConfig::default();
        config
            .apply_env_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.server.port, 8123);
        assert_eq!(config.linkedin.client_id.as_deref(), Some("from-env"));
        assert_eq!(config.storage.database_path, ":memory:");
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn test_invalid_port_override() {
        let mut config = GatewayConfig::default();
        let result = config.apply_env_overrides(|key| (key == "PORT").then(|| "nope".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_missing_file() {
        assert!(load_config("/definitely/not/here.toml").is_err());
    }
}
