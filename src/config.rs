//! Configuration for external services and caching
//!
//! All configuration is environment-backed. Both upstream services are
//! optional deployments: an absent ephemeris service puts the pipeline in
//! synthetic-only mode, and an absent generation service leaves only the
//! deterministic template tier. A *partially* configured service (URL
//! without credentials) is a fatal configuration error, never a silent
//! downgrade.

use std::fmt;
use std::time::Duration;

use crate::error::{AlmanacError, Result};

/// Configuration for the external astrological computation service
#[derive(Clone)]
pub struct EphemerisConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub request_timeout: Duration,
    /// House system requested from the service
    pub house_system: String,
    /// Zodiac type requested from the service
    pub zodiac: String,
}

impl EphemerisConfig {
    pub fn new(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            request_timeout: Duration::from_secs(30),
            house_system: "placidus".to_string(),
            zodiac: "tropical".to_string(),
        }
    }

    /// Read the service configuration from the environment.
    ///
    /// Returns `Ok(None)` when `EPHEMERIS_BASE_URL` is unset (synthetic-only
    /// deployment). A URL without both credentials is a configuration error.
    pub fn from_env() -> Result<Option<Self>> {
        let base_url = match std::env::var("EPHEMERIS_BASE_URL") {
            Ok(url) if !url.trim().is_empty() => url,
            _ => return Ok(None),
        };

        let client_id = require_env("EPHEMERIS_CLIENT_ID")?;
        let client_secret = require_env("EPHEMERIS_CLIENT_SECRET")?;

        let mut config = Self::new(base_url, client_id, client_secret);
        config.request_timeout = env_secs("EPHEMERIS_TIMEOUT_SECONDS", 30);
        if let Ok(system) = std::env::var("EPHEMERIS_HOUSE_SYSTEM") {
            config.house_system = system;
        }
        if let Ok(zodiac) = std::env::var("EPHEMERIS_ZODIAC") {
            config.zodiac = zodiac;
        }
        Ok(Some(config))
    }
}

impl fmt::Debug for EphemerisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EphemerisConfig")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &mask_secret(&self.client_secret))
            .field("request_timeout", &self.request_timeout)
            .field("house_system", &self.house_system)
            .field("zodiac", &self.zodiac)
            .finish()
    }
}

/// Configuration for the natural-language generation service
#[derive(Clone)]
pub struct GenerationConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub request_timeout: Duration,
    /// Interval between session status polls
    pub poll_interval: Duration,
    /// Total time budget for one session-protocol generation
    pub poll_budget: Duration,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl GenerationConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: "almanac-interpret-1".to_string(),
            request_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(1500),
            poll_budget: Duration::from_secs(45),
            max_tokens: 1024,
            temperature: 0.7,
        }
    }

    /// Read the service configuration from the environment.
    ///
    /// Returns `Ok(None)` when `GENERATION_BASE_URL` is unset (template-only
    /// deployment). A URL without an API key is a configuration error.
    pub fn from_env() -> Result<Option<Self>> {
        let base_url = match std::env::var("GENERATION_BASE_URL") {
            Ok(url) if !url.trim().is_empty() => url,
            _ => return Ok(None),
        };

        let api_key = require_env("GENERATION_API_KEY")?;

        let mut config = Self::new(base_url, api_key);
        if let Ok(model) = std::env::var("GENERATION_MODEL") {
            config.model = model;
        }
        config.request_timeout = env_secs("GENERATION_TIMEOUT_SECONDS", 30);
        config.poll_budget = env_secs("GENERATION_POLL_BUDGET_SECONDS", 45);
        Ok(Some(config))
    }
}

impl fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &mask_secret(&self.api_key))
            .field("model", &self.model)
            .field("request_timeout", &self.request_timeout)
            .field("poll_interval", &self.poll_interval)
            .field("poll_budget", &self.poll_budget)
            .finish()
    }
}

/// Cache lifetime configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Lifetime of contextual (non-event) interpretations
    pub contextual_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let hours = std::env::var("ALMANAC_CONTEXTUAL_TTL_HOURS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(24u64);
        Self {
            contextual_ttl: Duration::from_secs(hours.saturating_mul(3600)),
        }
    }
}

/// Top-level configuration bundle read in one pass
#[derive(Debug, Clone)]
pub struct AlmanacConfig {
    pub ephemeris: Option<EphemerisConfig>,
    pub generation: Option<GenerationConfig>,
    pub cache: CacheConfig,
}

impl AlmanacConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            ephemeris: EphemerisConfig::from_env()?,
            generation: GenerationConfig::from_env()?,
            cache: CacheConfig::default(),
        })
    }
}

fn require_env(name: &'static str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(AlmanacError::configuration(format!("{name} is not set"))),
    }
}

fn env_secs(name: &str, default: u64) -> Duration {
    let secs = std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default);
    Duration::from_secs(secs)
}

/// Mask a secret for logs, keeping only a short recognizable prefix.
pub(crate) fn mask_secret(secret: &str) -> String {
    if secret.len() <= 4 {
        "***".to_string()
    } else {
        format!("{}***", &secret[..4])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_are_masked_in_debug_output() {
        let config = GenerationConfig::new("https://gen.example.com", "sk-live-abcdef123456");
        let debug = format!("{config:?}");
        assert!(debug.contains("sk-l***"));
        assert!(!debug.contains("abcdef123456"));
    }

    #[test]
    fn short_secrets_are_fully_masked() {
        assert_eq!(mask_secret("abc"), "***");
        assert_eq!(mask_secret(""), "***");
    }

    #[test]
    fn defaults_match_the_service_contract() {
        let config = GenerationConfig::new("https://gen.example.com", "key");
        assert_eq!(config.poll_interval, Duration::from_millis(1500));
        assert_eq!(config.poll_budget, Duration::from_secs(45));

        let cache = CacheConfig {
            contextual_ttl: Duration::from_secs(24 * 3600),
        };
        assert_eq!(cache.contextual_ttl.as_secs(), 86_400);
    }
}
