use consult_core::{AiProvider, ConsultSettings};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

const DEFAULT_PORT: u16 = 8001;
const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash-latest";
const DEFAULT_GROK_MODEL: &str = "grok-4-fast-reasoning";

/// Settings read from the environment
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub port: u16,
    /// Postgres URL. Without one consultations are kept in memory.
    pub database_url: Option<String>,
    /// Overrides the database named in `database_url`.
    pub database_name: Option<String>,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub grok_api_key: Option<String>,
    pub grok_model: String,
    pub default_provider: AiProvider,
    pub provider_timeout: Duration,
    pub rate_limit_requests: usize,
    pub rate_limit_window: Duration,
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Self {
            port: parse_or(&lookup, "PORT", DEFAULT_PORT),
            database_url: non_empty("DATABASE_URL"),
            database_name: non_empty("DB_NAME"),
            gemini_api_key: non_empty("GEMINI_API_KEY"),
            gemini_model: non_empty("GEMINI_MODEL")
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            grok_api_key: non_empty("GROK_API_KEY"),
            grok_model: non_empty("GROK_MODEL")
                .unwrap_or_else(|| DEFAULT_GROK_MODEL.to_string()),
            default_provider: parse_or(&lookup, "DEFAULT_AI_PROVIDER", AiProvider::Gemini),
            provider_timeout: Duration::from_secs(parse_or(
                &lookup,
                "PROVIDER_TIMEOUT_SECS",
                30,
            )),
            rate_limit_requests: parse_or(&lookup, "RATE_LIMIT_REQUESTS", 10),
            rate_limit_window: Duration::from_secs(parse_or(
                &lookup,
                "RATE_LIMIT_WINDOW_SECS",
                60,
            )),
        }
    }

    pub fn consult_settings(&self) -> ConsultSettings {
        ConsultSettings {
            provider_timeout: self.provider_timeout,
            ..ConsultSettings::default()
        }
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid value for {}: {:?}", key, raw);
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> ServiceConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[]);
        assert_eq!(cfg.port, 8001);
        assert!(cfg.database_url.is_none());
        assert!(cfg.gemini_api_key.is_none());
        assert_eq!(cfg.gemini_model, "gemini-1.5-flash-latest");
        assert_eq!(cfg.default_provider, AiProvider::Gemini);
        assert_eq!(cfg.provider_timeout, Duration::from_secs(30));
        assert_eq!(cfg.rate_limit_requests, 10);
        assert_eq!(cfg.rate_limit_window, Duration::from_secs(60));
    }

    #[test]
    fn test_values_are_read() {
        let cfg = config(&[
            ("PORT", "9000"),
            ("DATABASE_URL", "postgres://localhost/doctor"),
            ("DB_NAME", "consultations"),
            ("GEMINI_API_KEY", "key"),
            ("DEFAULT_AI_PROVIDER", "grok"),
            ("PROVIDER_TIMEOUT_SECS", "5"),
        ]);
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://localhost/doctor"));
        assert_eq!(cfg.database_name.as_deref(), Some("consultations"));
        assert_eq!(cfg.gemini_api_key.as_deref(), Some("key"));
        assert_eq!(cfg.default_provider, AiProvider::Grok);
        assert_eq!(cfg.consult_settings().provider_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_blank_and_invalid_values_fall_back() {
        let cfg = config(&[("GEMINI_API_KEY", "  "), ("PORT", "not-a-port")]);
        assert!(cfg.gemini_api_key.is_none());
        assert_eq!(cfg.port, 8001);
    }
}
