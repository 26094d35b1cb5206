//! Configuration for fetch mocks.
//!
//! Settings come from, in order of precedence:
//! - `FETCH_MOCK_BASE_URL` / `FETCH_MOCK_USER_AGENT` environment variables
//! - a `fetch-mock.toml` file in the current directory
//! - built-in defaults

use std::path::Path;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Base URL used to resolve relative targets when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://test/";
/// Config file looked up by [`MockConfig::load_or_default`].
pub const CONFIG_FILE: &str = "fetch-mock.toml";
/// Environment variable overriding the base URL.
pub const BASE_URL_ENV: &str = "FETCH_MOCK_BASE_URL";
/// Environment variable overriding the user agent of the real fetch.
pub const USER_AGENT_ENV: &str = "FETCH_MOCK_USER_AGENT";

/// Mock configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MockConfig {
    /// Base URL for resolving relative request targets.
    pub base_url: String,
    /// User agent sent by the real HTTP fetch.
    pub user_agent: Option<String>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: None,
        }
    }
}

impl MockConfig {
    /// Parse configuration from TOML.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Apply environment overrides on top of this configuration.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(base_url) = std::env::var(BASE_URL_ENV) {
            self.base_url = base_url;
        }
        if let Ok(agent) = std::env::var(USER_AGENT_ENV) {
            self.user_agent = Some(agent);
        }
        self
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self> {
        let config = Self::default().with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration or use defaults.
    pub fn load_or_default() -> Self {
        let path = Path::new(CONFIG_FILE);
        let base = if path.exists() {
            match Self::from_file(path) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to load config: {}, using defaults", e);
                    Self::default()
                }
            }
        } else {
            tracing::debug!("No {} found, using defaults", CONFIG_FILE);
            Self::default()
        };

        let config = base.with_env_overrides();
        match config.validate() {
            Ok(()) => config,
            Err(e) => {
                tracing::warn!("Invalid configuration: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Check that the base URL can resolve relative targets.
    pub fn validate(&self) -> Result<()> {
        self.base_url().map(|_| ())
    }

    /// The parsed base URL.
    pub fn base_url(&self) -> Result<Url> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| Error::Config(format!("Invalid base_url '{}': {}", self.base_url, e)))?;
        if url.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "base_url '{}' cannot be used as a base",
                self.base_url
            )));
        }
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = MockConfig::default();
        assert_eq!(config.base_url, "http://test/");
        assert!(config.user_agent.is_none());
        assert_eq!(config.base_url().unwrap().as_str(), "http://test/");
    }

    #[test]
    fn test_parse_toml() {
        let config = MockConfig::from_toml_str(
            r#"
            base_url = "https://api.example.com/v1/"
            user_agent = "tests"
            "#,
        )
        .unwrap();
        assert_eq!(config.base_url, "https://api.example.com/v1/");
        assert_eq!(config.user_agent.as_deref(), Some("tests"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = MockConfig::from_toml_str(r#"user_agent = "x""#).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            MockConfig::from_toml_str(r#"base_url = "not a url""#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            MockConfig::from_toml_str(r#"base_url = "data:text/plain,hi""#),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"base_url = "http://files.test/""#).unwrap();

        let config = MockConfig::from_file(file.path()).unwrap();
        assert_eq!(config.base_url, "http://files.test/");
    }

    #[test]
    fn test_missing_file() {
        let result = MockConfig::from_file(Path::new("/nonexistent/fetch-mock.toml"));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        // SAFETY: serialized with the other environment tests.
        unsafe {
            std::env::set_var(BASE_URL_ENV, "http://env.test/");
            std::env::set_var(USER_AGENT_ENV, "env-agent");
        }

        let config = MockConfig::from_env().unwrap();
        assert_eq!(config.base_url, "http://env.test/");
        assert_eq!(config.user_agent.as_deref(), Some("env-agent"));

        unsafe {
            std::env::remove_var(BASE_URL_ENV);
            std::env::remove_var(USER_AGENT_ENV);
        }
    }

    /// Restores the working directory when dropped.
    struct CwdGuard(std::path::PathBuf);

    impl Drop for CwdGuard {
        fn drop(&mut self) {
            let _ = std::env::set_current_dir(&self.0);
        }
    }

    #[test]
    #[serial]
    fn test_load_or_default_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let _cwd = CwdGuard(std::env::current_dir().unwrap());
        std::env::set_current_dir(dir.path()).unwrap();

        // Nothing on disk, nothing in the environment.
        assert_eq!(MockConfig::load_or_default(), MockConfig::default());

        std::fs::write(
            CONFIG_FILE,
            "base_url = \"http://file.test/\"\nuser_agent = \"file-agent\"\n",
        )
        .unwrap();
        let config = MockConfig::load_or_default();
        assert_eq!(config.base_url, "http://file.test/");
        assert_eq!(config.user_agent.as_deref(), Some("file-agent"));

        // SAFETY: serialized with the other environment tests.
        unsafe { std::env::set_var(BASE_URL_ENV, "http://env.test/") };
        let config = MockConfig::load_or_default();
        assert_eq!(config.base_url, "http://env.test/");
        assert_eq!(config.user_agent.as_deref(), Some("file-agent"));

        unsafe { std::env::set_var(BASE_URL_ENV, "not a url") };
        assert_eq!(MockConfig::load_or_default(), MockConfig::default());
        unsafe { std::env::remove_var(BASE_URL_ENV) };

        std::fs::write(CONFIG_FILE, "base_url = [").unwrap();
        assert_eq!(MockConfig::load_or_default(), MockConfig::default());
    }
}
