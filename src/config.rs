use crate::error::{AlchemistError, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.0-flash-exp";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_SESSION_TTL_SECS: u64 = 30 * 60;
pub const DEFAULT_MAX_SESSIONS: usize = 1000;

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub image_model: String,
    pub text_model: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_image_bytes: usize,
}

/// How long an untouched form session is kept, and how many may exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    pub idle_ttl: Duration,
    pub max_sessions: usize,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_json: bool,
    pub gemini: GeminiConfig,
    pub limits: UploadLimits,
    pub sessions: SessionLimits,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        GeminiConfig {
            api_key: None,
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
        }
    }
}

impl GeminiConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        Self::from_lookup(&|key: &str| env::var(key).ok())
    }

    fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_blank = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let api_key = non_blank("GEMINI_API_KEY").or_else(|| non_blank("GOOGLE_API_KEY"));

        GeminiConfig {
            api_key,
            base_url: lookup("GEMINI_BASE_URL").unwrap_or(defaults.base_url),
            image_model: lookup("ALCHEMIST_IMAGE_MODEL").unwrap_or(defaults.image_model),
            text_model: lookup("ALCHEMIST_TEXT_MODEL").unwrap_or(defaults.text_model),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_models(
        mut self,
        image_model: impl Into<String>,
        text_model: impl Into<String>,
    ) -> Self {
        self.image_model = image_model.into();
        self.text_model = text_model.into();
        self
    }
}

impl Default for UploadLimits {
    fn default() -> Self {
        UploadLimits {
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }
}

impl UploadLimits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_image_bytes(mut self, max_image_bytes: usize) -> Self {
        self.max_image_bytes = max_image_bytes;
        self
    }
}

impl Default for SessionLimits {
    fn default() -> Self {
        SessionLimits {
            idle_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }
}

impl SessionLimits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idle_ttl(mut self, idle_ttl: Duration) -> Self {
        self.idle_ttl = idle_ttl;
        self
    }

    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions.max(1);
        self
    }

    /// Period of the background sweep, between one second and one minute.
    pub fn sweep_interval(&self) -> Duration {
        self.idle_ttl
            .min(Duration::from_secs(60))
            .max(Duration::from_secs(1))
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            log_json: false,
            gemini: GeminiConfig::default(),
            limits: UploadLimits::default(),
            sessions: SessionLimits::default(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&|key: &str| env::var(key).ok())
    }

    fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let port = parse_var(lookup, "PORT")?.unwrap_or(defaults.port);
        let max_image_bytes = parse_var(lookup, "ALCHEMIST_MAX_IMAGE_BYTES")?
            .unwrap_or(defaults.limits.max_image_bytes);
        let idle_ttl = parse_var(lookup, "ALCHEMIST_SESSION_TTL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.sessions.idle_ttl);
        let max_sessions: usize = parse_var(lookup, "ALCHEMIST_MAX_SESSIONS")?
            .unwrap_or(defaults.sessions.max_sessions);
        let log_json = lookup("LOG_FORMAT").map_or(false, |val| val.eq_ignore_ascii_case("json"));

        Ok(Config {
            host: lookup("HOST").unwrap_or(defaults.host),
            port,
            log_json,
            gemini: GeminiConfig::from_lookup(lookup),
            limits: UploadLimits { max_image_bytes },
            sessions: SessionLimits::new()
                .with_idle_ttl(idle_ttl)
                .with_max_sessions(max_sessions),
        })
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_gemini(mut self, config: GeminiConfig) -> Self {
        self.gemini = config;
        self
    }

    pub fn with_limits(mut self, limits: UploadLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_sessions(mut self, sessions: SessionLimits) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T: FromStr>(lookup: &dyn Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| AlchemistError::Config(format!("{} has an invalid value: {}", key, raw))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_environment_is_empty() {
        let config = Config::from_lookup(&lookup_from(&[])).unwrap();
        assert_eq!(config.bind_address(), "127.0.0.1:8080");
        assert!(!config.log_json);
        assert!(config.gemini.api_key.is_none());
        assert_eq!(config.gemini.image_model, DEFAULT_IMAGE_MODEL);
        assert_eq!(config.limits.max_image_bytes, DEFAULT_MAX_IMAGE_BYTES);
        assert_eq!(config.sessions, SessionLimits::default());
    }

    #[test]
    fn test_environment_overrides() {
        let config = Config::from_lookup(&lookup_from(&[
            ("HOST", "0.0.0.0"),
            ("PORT", "3000"),
            ("LOG_FORMAT", "JSON"),
            ("GOOGLE_API_KEY", "google-key"),
            ("ALCHEMIST_MAX_IMAGE_BYTES", "2048"),
            ("ALCHEMIST_TEXT_MODEL", "gemini-test"),
            ("ALCHEMIST_SESSION_TTL_SECS", "90"),
            ("ALCHEMIST_MAX_SESSIONS", "0"),
        ]))
        .unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:3000");
        assert!(config.log_json);
        assert_eq!(config.gemini.api_key.as_deref(), Some("google-key"));
        assert_eq!(config.gemini.text_model, "gemini-test");
        assert_eq!(config.limits.max_image_bytes, 2048);
        assert_eq!(config.sessions.idle_ttl, Duration::from_secs(90));
        assert_eq!(config.sessions.max_sessions, 1);
        assert_eq!(config.sessions.sweep_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_gemini_key_takes_precedence() {
        let config = GeminiConfig::from_lookup(&lookup_from(&[
            ("GEMINI_API_KEY", "gemini-key"),
            ("GOOGLE_API_KEY", "google-key"),
        ]));
        assert_eq!(config.api_key.as_deref(), Some("gemini-key"));
    }

    #[test]
    fn test_blank_gemini_key_falls_back_to_google_key() {
        let config = GeminiConfig::from_lookup(&lookup_from(&[
            ("GEMINI_API_KEY", "  "),
            ("GOOGLE_API_KEY", "google-key"),
        ]));
        assert_eq!(config.api_key.as_deref(), Some("google-key"));

        let config = GeminiConfig::from_lookup(&lookup_from(&[("GEMINI_API_KEY", "")]));
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_malformed_port_is_a_config_error() {
        let err = Config::from_lookup(&lookup_from(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, AlchemistError::Config(msg) if msg.contains("PORT")));
    }
}
