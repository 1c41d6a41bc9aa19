// =============================================================================
// config.rs - THE SETTINGS DRAWER
// =============================================================================
//
// Three hosted services, three sets of credentials, and a handful of knobs
// for how long we are willing to wait on each of them.
//
// Credentials for the scraper and the store are mandatory: without them the
// service has nothing to analyze and nowhere to write, so we refuse to boot.
// The Gemini key is optional. Without it the engine still runs, it just
// answers every analysis with the "AI unavailable" placeholders, which is
// more than some consultants deliver.
//
// All values can be overridden via environment variables. Tunables are
// prefixed with RIVAL_; credentials keep the names the hosted services use
// in their own docs.
// =============================================================================

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

/// Startup configuration problems. Every one of these is fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set in the environment")]
    MissingVar(&'static str),

    #[error("{key} has an invalid value {value:?}: {reason}")]
    InvalidVar {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Everything the engine needs to know before it opens the front door.
#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // HTTP SERVER
    // =========================================================================
    /// Address the actix server binds to. Default: 0.0.0.0:8000
    pub bind_addr: SocketAddr,

    /// Number of actix workers. Default: 4
    pub http_workers: usize,

    // =========================================================================
    // FIRECRAWL
    // =========================================================================
    pub firecrawl_api_key: String,

    /// Base URL of the Firecrawl API, without the version segment.
    pub firecrawl_base_url: String,

    /// Rendering a page takes a while. Default: 60 seconds.
    pub scrape_timeout: Duration,

    // =========================================================================
    // GEMINI
    // =========================================================================
    /// Optional. `None` means every analysis takes the "no model" path.
    pub google_ai_api_key: Option<String>,

    pub gemini_base_url: String,

    /// Model used when the caller does not ask for one (or asks for one we
    /// fail to build).
    pub default_model: String,

    /// How many characters of scraped content go into the prompt.
    pub max_prompt_chars: usize,

    /// Default: 120 seconds, long enough for a model to enumerate twelve
    /// things wrong with somebody's pricing page.
    pub llm_timeout: Duration,

    // =========================================================================
    // SUPABASE
    // =========================================================================
    pub supabase_url: String,
    pub supabase_service_role_key: String,
    pub store_timeout: Duration,
}

impl Config {
    /// Load `.env` (if any) and read configuration from the process
    /// environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Missing .env is fine, the variables may come from the shell.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup. `from_env` is a thin
    /// wrapper over this so tests don't have to mutate the process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| -> String {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let require = |key: &'static str| -> Result<String, ConfigError> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::MissingVar(key))
        };

        let bind_raw = get("RIVAL_BIND_ADDR", "0.0.0.0:8000");
        let bind_addr = bind_raw.parse().map_err(|e: std::net::AddrParseError| {
            ConfigError::InvalidVar {
                key: "RIVAL_BIND_ADDR",
                value: bind_raw.clone(),
                reason: e.to_string(),
            }
        })?;

        let workers_raw = get("RIVAL_HTTP_WORKERS", "4");
        let http_workers: usize = parse_or("RIVAL_HTTP_WORKERS", &workers_raw)?;
        if http_workers == 0 {
            return Err(ConfigError::InvalidVar {
                key: "RIVAL_HTTP_WORKERS",
                value: workers_raw,
                reason: "must be at least 1".to_string(),
            });
        }

        let supabase_url = require("SUPABASE_URL")?;
        url::Url::parse(&supabase_url).map_err(|e| ConfigError::InvalidVar {
            key: "SUPABASE_URL",
            value: supabase_url.clone(),
            reason: e.to_string(),
        })?;

        Ok(Config {
            bind_addr,
            http_workers,

            firecrawl_api_key: require("FIRECRAWL_API_KEY")?,
            firecrawl_base_url: get("RIVAL_FIRECRAWL_BASE_URL", "https://api.firecrawl.dev"),
            scrape_timeout: Duration::from_secs(parse_or(
                "RIVAL_SCRAPE_TIMEOUT_SECS",
                &get("RIVAL_SCRAPE_TIMEOUT_SECS", "60"),
            )?),

            google_ai_api_key: lookup("GOOGLE_AI_API_KEY")
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            gemini_base_url: get(
                "RIVAL_GEMINI_BASE_URL",
                "https://generativelanguage.googleapis.com/v1beta",
            ),
            default_model: get("RIVAL_DEFAULT_MODEL", "gemini-flash-latest"),
            max_prompt_chars: parse_or(
                "RIVAL_MAX_PROMPT_CHARS",
                &get("RIVAL_MAX_PROMPT_CHARS", "10000"),
            )?,
            llm_timeout: Duration::from_secs(parse_or(
                "RIVAL_LLM_TIMEOUT_SECS",
                &get("RIVAL_LLM_TIMEOUT_SECS", "120"),
            )?),

            supabase_url,
            supabase_service_role_key: require("SUPABASE_SERVICE_ROLE_KEY")?,
            store_timeout: Duration::from_secs(parse_or(
                "RIVAL_STORE_TIMEOUT_SECS",
                &get("RIVAL_STORE_TIMEOUT_SECS", "20"),
            )?),
        })
    }
}

/// First few characters of a secret, for log lines that need to prove a key
/// was loaded without printing it.
pub fn key_prefix(key: &str) -> String {
    let prefix: String = key.chars().take(6).collect();
    format!("{prefix}...")
}

fn parse_or<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidVar {
        key,
        value: raw.to_string(),
        reason: e.to_string(),
    })
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
        move |key| map.get(key).cloned()
    }

    fn required() -> Vec<(&'static str, &'static str)> {
        vec![
            ("FIRECRAWL_API_KEY", "fc-test"),
            ("SUPABASE_URL", "https://abc.supabase.co"),
            ("SUPABASE_SERVICE_ROLE_KEY", "service-role"),
        ]
    }

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_lookup(lookup_from(&required())).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8000".parse().unwrap());
        assert_eq!(config.http_workers, 4);
        assert_eq!(config.max_prompt_chars, 10_000);
        assert_eq!(config.default_model, "gemini-flash-latest");
        assert_eq!(config.scrape_timeout, Duration::from_secs(60));
        assert!(config.google_ai_api_key.is_none());
    }

    #[test]
    fn test_missing_store_credentials_is_fatal() {
        let pairs = vec![
            ("FIRECRAWL_API_KEY", "fc-test"),
            ("SUPABASE_URL", "https://abc.supabase.co"),
        ];
        let err = Config::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar("SUPABASE_SERVICE_ROLE_KEY")));
    }

    #[test]
    fn test_blank_scraper_key_counts_as_missing() {
        let mut pairs = required();
        pairs[0] = ("FIRECRAWL_API_KEY", "   ");
        let err = Config::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar("FIRECRAWL_API_KEY")));
    }

    #[test]
    fn test_invalid_number_is_reported() {
        let mut pairs = required();
        pairs.push(("RIVAL_MAX_PROMPT_CHARS", "lots"));
        let err = Config::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert!(err.to_string().contains("RIVAL_MAX_PROMPT_CHARS"));
    }

    #[test]
    fn test_zero_workers_is_rejected() {
        let mut pairs = required();
        pairs.push(("RIVAL_HTTP_WORKERS", "0"));
        let err = Config::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidVar { key: "RIVAL_HTTP_WORKERS", .. }
        ));
    }

    #[test]
    fn test_google_key_is_optional_but_picked_up() {
        let mut pairs = required();
        pairs.push(("GOOGLE_AI_API_KEY", "AIza-key"));
        let config = Config::from_lookup(lookup_from(&pairs)).unwrap();
        assert_eq!(config.google_ai_api_key.as_deref(), Some("AIza-key"));
    }

    #[test]
    fn test_key_prefix_never_prints_whole_key() {
        assert_eq!(key_prefix("fc-1234567890"), "fc-123...");
        assert_eq!(key_prefix("abc"), "abc...");
    }
}
