//! # Service Configuration
//!
//! Read once at startup from the environment. Missing secrets are fatal.
//! Custom `Debug` redacts every secret so the config can be logged.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 8080;
/// Default per-request deadline.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
/// Default blob gateway base URL.
pub const DEFAULT_BLOB_BASE_URL: &str = "https://storage.local";
/// Default evidence bucket.
pub const DEFAULT_BLOB_BUCKET: &str = "evidentia-evidence";

/// Startup configuration failure.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    #[error("{0} must be set")]
    Missing(&'static str),

    /// A variable is set but unusable.
    #[error("{var} is invalid: {reason}")]
    Invalid {
        /// Variable name.
        var: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// Application configuration.
#[derive(Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// HS256 secret shared with the identity provider.
    pub jwt_secret: String,
    /// Expected `iss` claim, if the provider sets one.
    pub jwt_issuer: Option<String>,
    /// Base URL of the blob gateway.
    pub blob_base_url: String,
    /// Bucket evidence and reports are stored in.
    pub blob_bucket: String,
    /// HMAC key shared with the blob gateway.
    pub blob_signing_key: String,
    /// Token report workers present in `X-Worker-Token`. Worker routes
    /// reject every request when unset.
    pub worker_token: Option<String>,
    /// Per-request deadline.
    pub request_timeout: Duration,
    /// Replacement template catalog.
    pub template_catalog: Option<PathBuf>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("jwt_secret", &"[REDACTED]")
            .field("jwt_issuer", &self.jwt_issuer)
            .field("blob_base_url", &self.blob_base_url)
            .field("blob_bucket", &self.blob_bucket)
            .field("blob_signing_key", &"[REDACTED]")
            .field("worker_token", &self.worker_token.as_ref().map(|_| "[REDACTED]"))
            .field("request_timeout", &self.request_timeout)
            .field("template_catalog", &self.template_catalog)
            .finish()
    }
}

impl AppConfig {
    /// Configuration with the given secrets and defaults for everything else.
    pub fn new(jwt_secret: impl Into<String>, blob_signing_key: impl Into<String>) -> Self {
        Self {
            port: DEFAULT_PORT,
            jwt_secret: jwt_secret.into(),
            jwt_issuer: None,
            blob_base_url: DEFAULT_BLOB_BASE_URL.to_string(),
            blob_bucket: DEFAULT_BLOB_BUCKET.to_string(),
            blob_signing_key: blob_signing_key.into(),
            worker_token: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            template_catalog: None,
        }
    }

    /// Read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through a lookup function.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = get("EVIDENTIA_JWT_SECRET").ok_or(ConfigError::Missing("EVIDENTIA_JWT_SECRET"))?;
        let blob_signing_key = get("EVIDENTIA_BLOB_SIGNING_KEY")
            .ok_or(ConfigError::Missing("EVIDENTIA_BLOB_SIGNING_KEY"))?;

        let mut config = Self::new(jwt_secret, blob_signing_key);

        if let Some(port) = get("PORT") {
            config.port = port.parse().map_err(|e| ConfigError::Invalid {
                var: "PORT",
                reason: format!("{e}"),
            })?;
        }
        if let Some(secs) = get("EVIDENTIA_REQUEST_TIMEOUT_SECS") {
            let secs: u64 = secs.parse().map_err(|e| ConfigError::Invalid {
                var: "EVIDENTIA_REQUEST_TIMEOUT_SECS",
                reason: format!("{e}"),
            })?;
            if secs == 0 {
                return Err(ConfigError::Invalid {
                    var: "EVIDENTIA_REQUEST_TIMEOUT_SECS",
                    reason: "must be greater than zero".into(),
                });
            }
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(base) = get("EVIDENTIA_BLOB_BASE_URL") {
            url::Url::parse(&base).map_err(|e| ConfigError::Invalid {
                var: "EVIDENTIA_BLOB_BASE_URL",
                reason: e.to_string(),
            })?;
            config.blob_base_url = base.trim_end_matches('/').to_string();
        }
        if let Some(bucket) = get("EVIDENTIA_BLOB_BUCKET") {
            config.blob_bucket = bucket;
        }
        config.jwt_issuer = get("EVIDENTIA_JWT_ISSUER");
        config.worker_token = get("EVIDENTIA_WORKER_TOKEN");
        config.template_catalog = get("EVIDENTIA_TEMPLATE_CATALOG").map(PathBuf::from);

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    const SECRETS: [(&str, &str); 2] = [
        ("EVIDENTIA_JWT_SECRET", "jwt"),
        ("EVIDENTIA_BLOB_SIGNING_KEY", "blob"),
    ];

    #[test]
    fn defaults_apply_when_only_secrets_set() {
        let config = AppConfig::from_lookup(lookup(&SECRETS)).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert_eq!(config.blob_base_url, "https://storage.local");
        assert_eq!(config.blob_bucket, "evidentia-evidence");
        assert!(config.worker_token.is_none());
    }

    #[test]
    fn missing_jwt_secret_is_fatal() {
        let err = AppConfig::from_lookup(lookup(&[("EVIDENTIA_BLOB_SIGNING_KEY", "k")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("EVIDENTIA_JWT_SECRET")));
    }

    #[test]
    fn missing_blob_key_is_fatal() {
        let err = AppConfig::from_lookup(lookup(&[("EVIDENTIA_JWT_SECRET", "s")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("EVIDENTIA_BLOB_SIGNING_KEY")));
    }

    #[test]
    fn overrides_are_read() {
        let mut pairs = SECRETS.to_vec();
        pairs.extend([
            ("PORT", "9090"),
            ("EVIDENTIA_REQUEST_TIMEOUT_SECS", "5"),
            ("EVIDENTIA_BLOB_BASE_URL", "https://blobs.example.com/"),
            ("EVIDENTIA_WORKER_TOKEN", "w"),
            ("EVIDENTIA_JWT_ISSUER", "https://id.example.com"),
        ]);
        let config = AppConfig::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.blob_base_url, "https://blobs.example.com");
        assert_eq!(config.worker_token.as_deref(), Some("w"));
        assert_eq!(config.jwt_issuer.as_deref(), Some("https://id.example.com"));
    }

    #[test]
    fn bad_port_is_rejected() {
        let mut pairs = SECRETS.to_vec();
        pairs.push(("PORT", "eighty"));
        assert!(matches!(
            AppConfig::from_lookup(lookup(&pairs)),
            Err(ConfigError::Invalid { var: "PORT", .. })
        ));
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut config = AppConfig::new("super-secret-jwt", "super-secret-blob");
        config.worker_token = Some("super-secret-worker".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
