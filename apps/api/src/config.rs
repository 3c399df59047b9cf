use anyhow::{bail, Context, Result};

const DEFAULT_LLM_API_URL: &str = "https://api.groq.com/openai/v1";
const DEFAULT_LLM_MODEL: &str = "llama-3.3-70b-versatile";

/// Deployment environment. Anything other than `production` is treated as
/// development and may echo diagnostics to API callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Development,
}

impl Environment {
    fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("production") {
            Environment::Production
        } else {
            Environment::Development
        }
    }

    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm_api_keys: Vec<String>,
    pub llm_api_url: String,
    pub llm_model: String,
    pub llm_key_error_threshold: u32,
    pub environment: Environment,
    /// Resume and job texts are cut to this many characters before prompting.
    pub max_input_chars: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let raw_keys = lookup("LLM_API_KEYS")
            .context("Required environment variable 'LLM_API_KEYS' is not set")?;
        let llm_api_keys: Vec<String> = raw_keys
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(String::from)
            .collect();
        if llm_api_keys.is_empty() {
            bail!("LLM_API_KEYS must contain at least one key");
        }

        Ok(Config {
            llm_api_keys,
            llm_api_url: lookup("LLM_API_URL").unwrap_or_else(|| DEFAULT_LLM_API_URL.to_string()),
            llm_model: lookup("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            llm_key_error_threshold: lookup("LLM_KEY_ERROR_THRESHOLD")
                .unwrap_or_else(|| "3".to_string())
                .parse::<u32>()
                .context("LLM_KEY_ERROR_THRESHOLD must be a non-negative integer")?,
            environment: lookup("APP_ENV")
                .map(|v| Environment::parse(&v))
                .unwrap_or(Environment::Development),
            max_input_chars: lookup("MAX_INPUT_CHARS")
                .unwrap_or_else(|| "12000".to_string())
                .parse::<usize>()
                .context("MAX_INPUT_CHARS must be a positive integer")?,
            port: lookup("PORT")
                .unwrap_or_else(|| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_with_only_keys_set() {
        let config = config_from(&[("LLM_API_KEYS", "k1")]).unwrap();
        assert_eq!(config.llm_api_keys, vec!["k1"]);
        assert_eq!(config.llm_api_url, DEFAULT_LLM_API_URL);
        assert_eq!(config.llm_model, DEFAULT_LLM_MODEL);
        assert_eq!(config.llm_key_error_threshold, 3);
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.max_input_chars, 12000);
        assert_eq!(config.port, 8080);
        assert_eq!(config.rust_log, "info");
    }

    #[test]
    fn test_keys_are_split_and_trimmed() {
        let config = config_from(&[("LLM_API_KEYS", " k1, ,k2 ,")]).unwrap();
        assert_eq!(config.llm_api_keys, vec!["k1", "k2"]);
    }

    #[test]
    fn test_missing_or_blank_keys_fail() {
        assert!(config_from(&[]).is_err());
        assert!(config_from(&[("LLM_API_KEYS", " , ")]).is_err());
    }

    #[test]
    fn test_invalid_port_fails() {
        assert!(config_from(&[("LLM_API_KEYS", "k"), ("PORT", "http")]).is_err());
    }

    #[test]
    fn test_environment_parsing() {
        let prod = config_from(&[("LLM_API_KEYS", "k"), ("APP_ENV", "Production")]).unwrap();
        assert!(prod.environment.is_production());

        let staging = config_from(&[("LLM_API_KEYS", "k"), ("APP_ENV", "staging")]).unwrap();
        assert!(!staging.environment.is_production());
    }
}
