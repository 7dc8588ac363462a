//! Configuration for the API server and for the offline client core.
//!
//! Both are loaded once at startup from environment variables (a `.env`
//! file is honoured for local development).

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Name of the background sync tag that wakes the worker to drain the queue.
pub const SYNC_CHECKINS_TAG: &str = "sync-checkins";

/// Name of the httpOnly cookie carrying the refresh credential.
pub const REFRESH_COOKIE_NAME: &str = "refreshToken";

/// Server configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,
    /// HS256 key for access tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// Declared access token lifetime, reported to clients as `expiresIn`
    pub access_token_ttl_secs: i64,
    /// Refresh cookie lifetime
    pub refresh_token_ttl_secs: i64,
    /// Origins echoed back in CORS responses
    pub allowed_origins: Vec<String>,
    /// Mark the refresh cookie `Secure`
    pub cookie_secure: bool,
    /// Account accepted by the demo login authority
    pub login_username: String,
    pub login_password: String,
    pub login_user_reference: i64,
    /// Optional JSON file seeding the location list
    pub locations_file: Option<PathBuf>,
}

impl Config {
    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            port: 8080,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            access_token_ttl_secs: 10,
            refresh_token_ttl_secs: 60 * 60 * 24 * 3,
            allowed_origins: default_allowed_origins(),
            cookie_secure: false,
            login_username: "user".to_string(),
            login_password: "pass".to_string(),
            login_user_reference: 1,
            locations_file: None,
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let allowed_origins = env::var("ALLOWED_ORIGINS")
            .map(|v| parse_list(&v))
            .unwrap_or_else(|_| default_allowed_origins());

        let all_local = allowed_origins.iter().all(|o| is_localhost(o));

        Ok(Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            access_token_ttl_secs: parse_env("ACCESS_TOKEN_TTL_SECS", 3 * 60 * 60)?,
            refresh_token_ttl_secs: parse_env("REFRESH_TOKEN_TTL_SECS", 60 * 60 * 24 * 3)?,
            cookie_secure: env::var("COOKIE_SECURE")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(!all_local),
            allowed_origins,
            login_username: env::var("LOGIN_USERNAME")
                .map_err(|_| ConfigError::Missing("LOGIN_USERNAME"))?,
            login_password: env::var("LOGIN_PASSWORD")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("LOGIN_PASSWORD"))?,
            login_user_reference: parse_env("LOGIN_USER_REFERENCE", 1)?,
            locations_file: env::var("LOCATIONS_FILE").ok().map(PathBuf::from),
        })
    }

    pub fn is_allowed_origin(&self, origin: &str) -> bool {
        self.allowed_origins.iter().any(|o| o == origin)
    }
}

/// Configuration of the offline client core (worker, token manager, queue).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the REST API, e.g. `http://localhost:8080/api`
    pub api_base: String,
    /// Origin of the app the worker controls
    pub app_origin: String,
    /// Same-origin paths under this prefix always go to the network
    pub api_prefix: String,
    /// Version stamp of the current cache generations
    pub cache_version: String,
    /// App-shell URLs (paths relative to `app_origin`) cached at install
    pub precache_manifest: Vec<String>,
    /// Document served for navigations when offline and uncached
    pub offline_document: String,
    /// Deadline for every network attempt made by the worker
    pub fetch_timeout: Duration,
    /// Refresh the access token when it expires within this margin
    pub refresh_margin: Duration,
    pub sync_tag: String,
    pub notification_title: String,
    pub push_placeholder: String,
    /// Local store location
    pub db_path: PathBuf,
    pub sync_registration_attempts: u32,
    pub sync_registration_backoff: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:8080/api".to_string(),
            app_origin: "http://localhost:5173".to_string(),
            api_prefix: "/api/".to_string(),
            cache_version: "v1".to_string(),
            precache_manifest: vec![
                "/".to_string(),
                "/index.html".to_string(),
                "/src/main.js".to_string(),
            ],
            offline_document: "/index.html".to_string(),
            fetch_timeout: Duration::from_secs(5),
            refresh_margin: Duration::from_secs(30),
            sync_tag: SYNC_CHECKINS_TAG.to_string(),
            notification_title: "NFC Checkin".to_string(),
            push_placeholder: "Push message".to_string(),
            db_path: PathBuf::from("checkin.db"),
            sync_registration_attempts: 3,
            sync_registration_backoff: Duration::from_millis(500),
        }
    }
}

impl ClientConfig {
    /// Load client configuration, falling back to defaults per field.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        Ok(Self {
            api_base: env::var("CHECKIN_API_BASE").unwrap_or(defaults.api_base),
            app_origin: env::var("CHECKIN_APP_ORIGIN").unwrap_or(defaults.app_origin),
            cache_version: env::var("CHECKIN_CACHE_VERSION").unwrap_or(defaults.cache_version),
            db_path: env::var("CHECKIN_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            fetch_timeout: Duration::from_millis(parse_env(
                "CHECKIN_FETCH_TIMEOUT_MS",
                defaults.fetch_timeout.as_millis() as u64,
            )?),
            ..defaults
        })
    }

    /// Name of the install-time cache generation.
    pub fn precache_name(&self) -> String {
        format!("{}-precache", self.cache_version)
    }

    /// Name of the cache generation filled during normal operation.
    pub fn runtime_name(&self) -> String {
        format!("{}-runtime", self.cache_version)
    }
}

fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:5173".to_string(),
        "https://localhost:5173".to_string(),
    ]
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn is_localhost(origin: &str) -> bool {
    origin.starts_with("http://localhost")
        || origin.starts_with("https://localhost")
        || origin.starts_with("http://127.0.0.1")
}

fn parse_env<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(v) => v.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        // Set required env vars for test
        env::set_var("JWT_SIGNING_KEY", "test_jwt_key_32_bytes_minimum!!");
        env::set_var("LOGIN_USERNAME", "user");
        env::set_var("LOGIN_PASSWORD", "pass ");
        env::set_var("ALLOWED_ORIGINS", "http://localhost:5173, https://checkin.example");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.login_password, "pass");
        assert_eq!(config.port, 8080);
        assert!(config.is_allowed_origin("https://checkin.example"));
        assert!(!config.is_allowed_origin("http://evil.example"));
        assert!(config.cookie_secure);
    }

    #[test]
    fn test_client_config_from_env() {
        env::set_var("CHECKIN_API_BASE", "https://checkin.example/api");
        env::set_var("CHECKIN_DB_PATH", "/var/lib/checkin/store.db");
        env::set_var("CHECKIN_FETCH_TIMEOUT_MS", "1500");

        let config = ClientConfig::from_env().expect("Client config should load");

        assert_eq!(config.api_base, "https://checkin.example/api");
        assert_eq!(config.db_path, PathBuf::from("/var/lib/checkin/store.db"));
        assert_eq!(config.fetch_timeout, Duration::from_millis(1500));
        assert_eq!(config.sync_tag, SYNC_CHECKINS_TAG);

        env::set_var("CHECKIN_FETCH_TIMEOUT_MS", "soon");
        assert!(matches!(
            ClientConfig::from_env(),
            Err(ConfigError::Invalid("CHECKIN_FETCH_TIMEOUT_MS"))
        ));
        env::remove_var("CHECKIN_FETCH_TIMEOUT_MS");
    }

    #[test]
    fn test_generation_names_follow_version() {
        let config = ClientConfig {
            cache_version: "v7".to_string(),
            ..ClientConfig::default()
        };
        assert_eq!(config.precache_name(), "v7-precache");
        assert_eq!(config.runtime_name(), "v7-runtime");
    }

    #[test]
    fn test_parse_list_skips_blanks() {
        assert_eq!(
            parse_list("a, ,b,"),
            vec!["a".to_string(), "b".to_string()]
        );
    }
}
