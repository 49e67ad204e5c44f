//! Client configuration from the environment

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8001";
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Settings for the council client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the council backend, without a trailing slash
    pub api_url: String,
    /// Upper bound for one backend request, a whole council run included
    pub request_timeout: Duration,
    pub log_file: PathBuf,
}

impl ClientConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let api_url = lookup("COUNCIL_API_URL")
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let timeout_secs = lookup("COUNCIL_TIMEOUT_SECS")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let log_file = lookup("COUNCIL_LOG_FILE").map_or_else(
            || {
                let home = lookup("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(format!("{home}/.llm-council/client.log"))
            },
            PathBuf::from,
        );

        Self {
            api_url,
            request_timeout: Duration::from_secs(timeout_secs),
            log_file,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> ClientConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ClientConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[("HOME", "/home/council")]);
        assert_eq!(cfg.api_url, "http://localhost:8001");
        assert_eq!(cfg.request_timeout, Duration::from_secs(600));
        assert_eq!(
            cfg.log_file,
            PathBuf::from("/home/council/.llm-council/client.log")
        );
    }

    #[test]
    fn test_overrides() {
        let cfg = config(&[
            ("COUNCIL_API_URL", "https://council.example/"),
            ("COUNCIL_TIMEOUT_SECS", "30"),
            ("COUNCIL_LOG_FILE", "/var/log/council.log"),
        ]);
        assert_eq!(cfg.api_url, "https://council.example");
        assert_eq!(cfg.request_timeout, Duration::from_secs(30));
        assert_eq!(cfg.log_file, PathBuf::from("/var/log/council.log"));
    }

    #[test]
    fn test_invalid_timeout_falls_back() {
        for value in ["soon", "0", ""] {
            let cfg = config(&[("COUNCIL_TIMEOUT_SECS", value)]);
            assert_eq!(cfg.request_timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        }
    }
}
