use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::ConfigError;

const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_TESTS_PATH: &str = "/api/tests";
const DEFAULT_CONFIG_FILE: &str = "exam_desk.toml";

/// Where the backend lives and how the client talks to it.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    pub base_url: String,
    pub tests_path: String,
    pub token: Option<String>,
    pub request_timeout: Duration,
}

/// Credentials for the optional object-storage fallback. Only carried, never required.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StorageConfig {
    pub bucket: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub poll_interval: Duration,
    /// Serve uploads and the tests list from the in-process mock backend.
    pub use_mock: bool,
    pub mock_latency: Duration,
    pub storage: Option<StorageConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                base_url: DEFAULT_API_URL.to_string(),
                tests_path: DEFAULT_TESTS_PATH.to_string(),
                token: None,
                request_timeout: Duration::from_secs(30),
            },
            poll_interval: Duration::from_secs(30),
            use_mock: false,
            mock_latency: Duration::from_millis(1200),
            storage: None,
        }
    }
}

/// Optional TOML overlay. Every key may be omitted.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    api_url: Option<String>,
    tests_path: Option<String>,
    token: Option<String>,
    request_timeout_ms: Option<u64>,
    poll_interval_secs: Option<u64>,
    mock: Option<bool>,
    mock_latency_ms: Option<u64>,
    storage: Option<StorageConfig>,
}

impl FileConfig {
    fn overlay(self, mut base: AppConfig) -> AppConfig {
        if let Some(url) = self.api_url {
            base.api.base_url = url;
        }
        if let Some(path) = self.tests_path {
            base.api.tests_path = path;
        }
        if self.token.is_some() {
            base.api.token = self.token;
        }
        if let Some(ms) = self.request_timeout_ms {
            base.api.request_timeout = Duration::from_millis(ms);
        }
        if let Some(secs) = self.poll_interval_secs {
            base.poll_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(mock) = self.mock {
            base.use_mock = mock;
        }
        if let Some(ms) = self.mock_latency_ms {
            base.mock_latency = Duration::from_millis(ms);
        }
        if self.storage.is_some() {
            base.storage = self.storage;
        }
        base
    }
}

impl AppConfig {
    /// Defaults, then environment, then `EXAM_DESK_CONFIG` (or `./exam_desk.toml`).
    pub fn load() -> Result<Self, ConfigError> {
        let lookup = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        let config = Self::from_lookup(lookup)?;

        match std::env::var("EXAM_DESK_CONFIG") {
            Ok(path) => config.with_file(Path::new(&path)),
            Err(_) => {
                let path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    config.with_file(&path)
                } else {
                    info!(path = %path.display(), "no config file found; using defaults and environment");
                    Ok(config)
                }
            }
        }
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(url) = lookup("EXAM_DESK_API_URL").or_else(|| lookup("VITE_API_URL")) {
            config.api.base_url = url;
        }
        if let Some(path) = lookup("EXAM_DESK_TESTS_PATH") {
            config.api.tests_path = path;
        }
        config.api.token = lookup("EXAM_DESK_TOKEN");
        if let Some(ms) = parse_var(&lookup, "EXAM_DESK_TIMEOUT_MS")? {
            config.api.request_timeout = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_var(&lookup, "EXAM_DESK_POLL_SECS")? {
            config.poll_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(value) = lookup("EXAM_DESK_MOCK") {
            config.use_mock = parse_flag(&value).ok_or(ConfigError::InvalidValue {
                key: "EXAM_DESK_MOCK",
                value,
            })?;
        }
        if let Some(ms) = parse_var(&lookup, "EXAM_DESK_MOCK_LATENCY_MS")? {
            config.mock_latency = Duration::from_millis(ms);
        }

        config.storage = match (
            lookup("AWS_BUCKET_NAME"),
            lookup("AWS_REGION"),
            lookup("AWS_ACCESS_KEY_ID"),
            lookup("AWS_SECRET_ACCESS_KEY"),
        ) {
            (Some(bucket), Some(region), Some(access_key), Some(secret_key)) => Some(StorageConfig {
                bucket,
                region,
                access_key,
                secret_key,
            }),
            (None, None, None, None) => None,
            _ => {
                warn!("object storage variables are only partially set; ignoring them");
                None
            }
        };

        Ok(config)
    }

    pub fn with_file(self, path: &Path) -> Result<Self, ConfigError> {
        let shown = path.display().to_string();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: shown.clone(),
            source,
        })?;
        let file: FileConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: shown.clone(),
            source,
        })?;
        info!(path = %shown, "loaded config file");
        Ok(file.overlay(self))
    }
}

fn parse_var(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<u64>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value }),
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = AppConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert_eq!(config.mock_latency, Duration::from_millis(1200));
    }

    #[test]
    fn vite_url_is_accepted_as_fallback() {
        let config = AppConfig::from_lookup(lookup_from(&[("VITE_API_URL", "http://api.test")])).unwrap();
        assert_eq!(config.api.base_url, "http://api.test");

        let config = AppConfig::from_lookup(lookup_from(&[
            ("VITE_API_URL", "http://api.test"),
            ("EXAM_DESK_API_URL", "http://desk.test"),
        ]))
        .unwrap();
        assert_eq!(config.api.base_url, "http://desk.test");
    }

    #[test]
    fn invalid_numbers_are_reported() {
        let err = AppConfig::from_lookup(lookup_from(&[("EXAM_DESK_POLL_SECS", "soon")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { key: "EXAM_DESK_POLL_SECS", .. }
        ));
    }

    #[test]
    fn mock_flag_parses_common_spellings() {
        let config = AppConfig::from_lookup(lookup_from(&[("EXAM_DESK_MOCK", "Yes")])).unwrap();
        assert!(config.use_mock);
        assert!(AppConfig::from_lookup(lookup_from(&[("EXAM_DESK_MOCK", "maybe")])).is_err());
    }

    #[test]
    fn storage_needs_every_variable() {
        let partial = AppConfig::from_lookup(lookup_from(&[("AWS_BUCKET_NAME", "tests")])).unwrap();
        assert!(partial.storage.is_none());

        let full = AppConfig::from_lookup(lookup_from(&[
            ("AWS_BUCKET_NAME", "tests"),
            ("AWS_REGION", "ap-south-1"),
            ("AWS_ACCESS_KEY_ID", "AKIA"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
        ]))
        .unwrap();
        assert_eq!(full.storage.map(|s| s.region), Some("ap-south-1".to_string()));
    }

    #[test]
    fn toml_file_overlays_environment() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "api_url = \"http://file.test\"\npoll_interval_secs = 5\nmock = true\n"
        )
        .unwrap();

        let base = AppConfig::from_lookup(lookup_from(&[("EXAM_DESK_TOKEN", "abc")])).unwrap();
        let config = base.with_file(file.path()).unwrap();

        assert_eq!(config.api.base_url, "http://file.test");
        assert_eq!(config.api.token.as_deref(), Some("abc"));
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert!(config.use_mock);
    }

    #[test]
    fn unknown_toml_keys_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "poll = 3").unwrap();
        let err = AppConfig::default().with_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = AppConfig::default()
            .with_file(Path::new("/definitely/not/here/exam_desk.toml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
