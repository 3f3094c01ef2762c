use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::StartupError;

pub const AZURE_OPENAI_API_KEY: &str = "AZURE_OPENAI_API_KEY";
pub const AZURE_OPENAI_ENDPOINT: &str = "AZURE_OPENAI_ENDPOINT";
pub const AZURE_SEARCH_KEY: &str = "AZURE_SEARCH_KEY";
pub const AZURE_SEARCH_ENDPOINT: &str = "AZURE_SEARCH_ENDPOINT";

pub const REQUIRED_VARS: [&str; 4] = [
    AZURE_OPENAI_API_KEY,
    AZURE_OPENAI_ENDPOINT,
    AZURE_SEARCH_KEY,
    AZURE_SEARCH_ENDPOINT,
];

/// The four connection secrets. All non-empty once constructed.
#[derive(Clone)]
pub struct ConnectionConfig {
    pub openai_api_key: String,
    pub openai_endpoint: String,
    pub search_key: String,
    pub search_endpoint: String,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("openai_api_key", &"<redacted>")
            .field("openai_endpoint", &self.openai_endpoint)
            .field("search_key", &"<redacted>")
            .field("search_endpoint", &self.search_endpoint)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub search_index: String,
    pub chat_deployment: String,
    pub embedding_deployment: String,
    pub openai_api_version: String,
    pub search_api_version: String,
    pub top_k: usize,
    pub request_timeout: Duration,
    pub transcript_max_turns: usize,
    pub max_sessions: usize,
    pub query_rate_per_minute: u32,
    pub session_rate_per_minute: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: 8501,
            search_index: "finance-index".to_string(),
            chat_deployment: "gpt-4o-mini".to_string(),
            embedding_deployment: "text-embedding-3-small".to_string(),
            openai_api_version: "2024-06-01".to_string(),
            search_api_version: "2023-11-01".to_string(),
            top_k: 4,
            request_timeout: Duration::from_secs(30),
            transcript_max_turns: 200,
            max_sessions: 1000,
            query_rate_per_minute: 60,
            session_rate_per_minute: 30,
        }
    }
}

impl Settings {
    /// Optional tuning values; absent ones take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, StartupError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Settings::default();

        Ok(Settings {
            port: parse_or(&read, "PORT", defaults.port)?,
            search_index: read("AZURE_SEARCH_INDEX").unwrap_or(defaults.search_index),
            chat_deployment: read("AZURE_OPENAI_CHAT_DEPLOYMENT")
                .unwrap_or(defaults.chat_deployment),
            embedding_deployment: read("AZURE_OPENAI_EMBEDDING_DEPLOYMENT")
                .unwrap_or(defaults.embedding_deployment),
            openai_api_version: read("AZURE_OPENAI_API_VERSION")
                .unwrap_or(defaults.openai_api_version),
            search_api_version: read("AZURE_SEARCH_API_VERSION")
                .unwrap_or(defaults.search_api_version),
            top_k: positive(&read, "RETRIEVAL_TOP_K", defaults.top_k)?,
            request_timeout: Duration::from_secs(positive(
                &read,
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )?),
            transcript_max_turns: positive(
                &read,
                "TRANSCRIPT_MAX_TURNS",
                defaults.transcript_max_turns,
            )?,
            max_sessions: positive(&read, "MAX_SESSIONS", defaults.max_sessions)?,
            query_rate_per_minute: positive(
                &read,
                "QUERY_RATE_PER_MINUTE",
                defaults.query_rate_per_minute,
            )?,
            session_rate_per_minute: positive(
                &read,
                "SESSION_RATE_PER_MINUTE",
                defaults.session_rate_per_minute,
            )?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub secrets: ConnectionConfig,
    pub settings: Settings,
}

impl Config {
    /// Loads `.env` (if present) into the process environment, then reads
    /// the configuration from it.
    pub fn from_env() -> Result<Self, StartupError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any name -> value source. Every missing
    /// secret is reported at once.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, StartupError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let missing: Vec<&'static str> = REQUIRED_VARS
            .iter()
            .copied()
            .filter(|&name| read(name).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(StartupError::MissingConfiguration { missing });
        }

        let secret = |name: &'static str| read(name).unwrap_or_default();
        let secrets = ConnectionConfig {
            openai_api_key: secret(AZURE_OPENAI_API_KEY),
            openai_endpoint: secret(AZURE_OPENAI_ENDPOINT)
                .trim_end_matches('/')
                .to_string(),
            search_key: secret(AZURE_SEARCH_KEY),
            search_endpoint: secret(AZURE_SEARCH_ENDPOINT)
                .trim_end_matches('/')
                .to_string(),
        };

        let settings = Settings::from_lookup(&lookup)?;

        Ok(Config { secrets, settings })
    }
}

fn parse_or<T, R>(read: &R, name: &'static str, default: T) -> Result<T, StartupError>
where
    T: FromStr,
    R: Fn(&str) -> Option<String>,
{
    match read(name) {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| StartupError::InvalidSetting { name, value }),
    }
}

fn positive<T, R>(read: &R, name: &'static str, default: T) -> Result<T, StartupError>
where
    T: FromStr + PartialEq + Default,
    R: Fn(&str) -> Option<String>,
{
    let value = parse_or(read, name, default)?;
    if value == T::default() {
        return Err(StartupError::InvalidSetting {
            name,
            value: "0".to_string(),
        });
    }
    Ok(value)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    pub(crate) fn full_env() -> HashMap<&'static str, String> {
        HashMap::from([
            (AZURE_OPENAI_API_KEY, "oai-key".to_string()),
            (AZURE_OPENAI_ENDPOINT, "https://oai.example.com/".to_string()),
            (AZURE_SEARCH_KEY, "search-key".to_string()),
            (AZURE_SEARCH_ENDPOINT, "https://search.example.com".to_string()),
        ])
    }

    fn load(env: &HashMap<&'static str, String>) -> Result<Config, StartupError> {
        Config::from_lookup(|name| env.get(name).cloned())
    }

    #[test]
    fn loads_secrets_and_defaults() {
        let config = load(&full_env()).unwrap();
        assert_eq!(config.secrets.openai_endpoint, "https://oai.example.com");
        assert_eq!(config.settings.search_index, "finance-index");
        assert_eq!(config.settings.top_k, 4);
        assert_eq!(config.settings.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn each_missing_secret_is_reported() {
        for name in REQUIRED_VARS {
            let mut env = full_env();
            env.remove(name);
            match load(&env) {
                Err(StartupError::MissingConfiguration { missing }) => {
                    assert_eq!(missing, vec![name])
                }
                other => panic!("expected missing {name}, got {other:?}"),
            }
        }
    }

    #[test]
    fn blank_secret_counts_as_missing() {
        let mut env = full_env();
        env.insert(AZURE_SEARCH_KEY, "   ".to_string());
        assert!(matches!(
            load(&env),
            Err(StartupError::MissingConfiguration { .. })
        ));
    }

    #[test]
    fn settings_override_and_validate() {
        let mut env = full_env();
        env.insert("RETRIEVAL_TOP_K", "8".to_string());
        env.insert("AZURE_SEARCH_INDEX", "tenk-2024".to_string());
        let config = load(&env).unwrap();
        assert_eq!(config.settings.top_k, 8);
        assert_eq!(config.settings.search_index, "tenk-2024");

        env.insert("RETRIEVAL_TOP_K", "many".to_string());
        assert!(matches!(
            load(&env),
            Err(StartupError::InvalidSetting { name: "RETRIEVAL_TOP_K", .. })
        ));

        env.insert("RETRIEVAL_TOP_K", "0".to_string());
        assert!(matches!(
            load(&env),
            Err(StartupError::InvalidSetting { name: "RETRIEVAL_TOP_K", .. })
        ));
    }

    #[test]
    fn from_env_reads_process_environment() {
        for (name, value) in full_env() {
            std::env::set_var(name, value);
        }
        std::env::set_var("SESSION_RATE_PER_MINUTE", "5");

        let config = Config::from_env().unwrap();
        assert_eq!(config.secrets.openai_endpoint, "https://oai.example.com");
        assert_eq!(config.secrets.search_key, "search-key");
        assert_eq!(config.settings.session_rate_per_minute, 5);

        std::env::remove_var(AZURE_SEARCH_ENDPOINT);
        match Config::from_env() {
            Err(StartupError::MissingConfiguration { missing }) => {
                assert_eq!(missing, vec![AZURE_SEARCH_ENDPOINT])
            }
            other => panic!("expected missing endpoint, got {other:?}"),
        }
    }

    #[test]
    fn debug_redacts_keys() {
        let config = load(&full_env()).unwrap();
        let printed = format!("{:?}", config.secrets);
        assert!(!printed.contains("oai-key"));
        assert!(!printed.contains("search-key"));
    }
}
