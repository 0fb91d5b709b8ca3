use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_CHAT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_TOKEN_TIMEOUT_SECS: u64 = 10;

/// Upstream base URLs, overridable so tests and proxies can point elsewhere.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoints {
    pub openrouter: String,
    pub gemini: String,
    pub gigachat_auth: String,
    pub gigachat: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            openrouter: "https://openrouter.ai/api/v1".to_string(),
            gemini: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            gigachat_auth: "https://ngw.devices.sberbank.ru:9443/api/v2/oauth".to_string(),
            gigachat: "https://gigachat.devices.sberbank.ru/api/v1".to_string(),
        }
    }
}

/// Process-wide configuration. Read once at startup and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub bind_addr: String,
    /// SQLite file backing the knowledge base. `None` disables the store.
    pub database_path: Option<PathBuf>,
    pub endpoints: Endpoints,
    /// Bound on each completion call.
    pub completion_timeout: Duration,
    /// Bound on the GigaChat OAuth exchange.
    pub token_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            database_path: None,
            endpoints: Endpoints::default(),
            completion_timeout: Duration::from_secs(DEFAULT_CHAT_TIMEOUT_SECS),
            token_timeout: Duration::from_secs(DEFAULT_TOKEN_TIMEOUT_SECS),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup, falling back to defaults for
    /// missing or empty values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();
        let url = |key: &str, fallback: String| {
            get(key)
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .unwrap_or(fallback)
        };

        Self {
            bind_addr: get("BIND_ADDR").unwrap_or(defaults.bind_addr),
            database_path: get("DATABASE_URL").map(|v| database_path(&v)),
            endpoints: Endpoints {
                openrouter: url("OPENROUTER_BASE_URL", defaults.endpoints.openrouter),
                gemini: url("GEMINI_BASE_URL", defaults.endpoints.gemini),
                gigachat_auth: url("GIGACHAT_AUTH_URL", defaults.endpoints.gigachat_auth),
                gigachat: url("GIGACHAT_BASE_URL", defaults.endpoints.gigachat),
            },
            completion_timeout: secs(get("CHAT_TIMEOUT_SECS"), "CHAT_TIMEOUT_SECS", DEFAULT_CHAT_TIMEOUT_SECS),
            token_timeout: secs(get("TOKEN_TIMEOUT_SECS"), "TOKEN_TIMEOUT_SECS", DEFAULT_TOKEN_TIMEOUT_SECS),
        }
    }
}

/// Accepts `sqlite://path`, `sqlite:path` or a bare path.
fn database_path(url: &str) -> PathBuf {
    let url = url.trim();
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);
    PathBuf::from(path)
}

fn secs(value: Option<String>, key: &str, default: u64) -> Duration {
    let Some(raw) = value else {
        return Duration::from_secs(default);
    };
    match raw.trim().parse::<u64>() {
        Ok(n) if n > 0 => Duration::from_secs(n),
        _ => {
            warn!("Ignoring invalid {}={:?}, using {}s", key, raw, default);
            Duration::from_secs(default)
        }
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
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = Config::from_lookup(lookup(&[]));
        assert_eq!(config, Config::default());
        assert!(config.database_path.is_none());
    }

    #[test]
    fn overrides_are_applied() {
        let config = Config::from_lookup(lookup(&[
            ("BIND_ADDR", "0.0.0.0:9000"),
            ("DATABASE_URL", "sqlite:///tmp/kb.db"),
            ("OPENROUTER_BASE_URL", "http://localhost:1234/v1/"),
            ("CHAT_TIMEOUT_SECS", "20"),
        ]));
        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.database_path, Some(PathBuf::from("/tmp/kb.db")));
        assert_eq!(config.endpoints.openrouter, "http://localhost:1234/v1");
        assert_eq!(config.completion_timeout, Duration::from_secs(20));
        assert_eq!(config.token_timeout, Duration::from_secs(10));
    }

    #[test]
    fn bad_timeouts_fall_back() {
        let config = Config::from_lookup(lookup(&[
            ("CHAT_TIMEOUT_SECS", "soon"),
            ("TOKEN_TIMEOUT_SECS", "0"),
        ]));
        assert_eq!(config.completion_timeout, Duration::from_secs(30));
        assert_eq!(config.token_timeout, Duration::from_secs(10));
    }

    #[test]
    fn bare_database_path_is_kept() {
        assert_eq!(database_path("data/kb.sqlite"), PathBuf::from("data/kb.sqlite"));
        assert_eq!(database_path("sqlite:kb.db"), PathBuf::from("kb.db"));
    }
}
