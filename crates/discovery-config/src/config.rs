use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable that overrides any stored TMDB access token
pub const TOKEN_ENV_VAR: &str = "REELSWIPE_TMDB_TOKEN";

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub tmdb: TmdbConfig,
    #[serde(default)]
    pub discovery: DiscoveryOptions,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TmdbConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_watch_region")]
    pub watch_region: String,
    /// API read access token; prefer credentials.toml or the environment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

/// Where a fresh discovery session starts when no anchor position exists
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResumeMode {
    /// Always restart at page 1
    #[default]
    FirstPage,
    /// Restart at the highest page already fetched for the same filters
    Watermark,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DiscoveryOptions {
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_prefetch_distance")]
    pub prefetch_distance: u32,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default)]
    pub resume_mode: ResumeMode,
    /// Drop already-swiped items from freshly loaded pages
    #[serde(default = "default_true")]
    pub hide_visited: bool,
    /// When false, errors such as an invalid page are surfaced on the first attempt
    #[serde(default = "default_true")]
    pub retry_permanent_errors: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_json_logging")]
    pub json: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_base_url() -> String {
    "https://api.themoviedb.org/3".to_string()
}

fn default_language() -> String {
    "en-US".to_string()
}

fn default_watch_region() -> String {
    "US".to_string()
}

fn default_timeout_seconds() -> u64 {
    15
}

fn default_page_size() -> u32 {
    20
}

fn default_prefetch_distance() -> u32 {
    5
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_log_level() -> String {
    "info".to_string()
}

/// JSON unless logs go to an interactive terminal
fn default_json_logging() -> bool {
    use std::io::IsTerminal;
    !std::io::stderr().is_terminal()
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            language: default_language(),
            watch_region: default_watch_region(),
            access_token: None,
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            prefetch_distance: default_prefetch_distance(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            resume_mode: ResumeMode::default(),
            hide_visited: true,
            retry_permanent_errors: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: default_json_logging(),
            file: None,
        }
    }
}

impl Config {
    pub fn load_from_file(path: &PathBuf) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load the file if it exists, otherwise fall back to defaults
    pub fn load_or_default(path: &PathBuf) -> anyhow::Result<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to_file(&self, path: &PathBuf) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.discovery.page_size == 0 {
            return Err(anyhow::anyhow!("discovery.page_size must be at least 1"));
        }
        if self.discovery.max_attempts == 0 {
            return Err(anyhow::anyhow!("discovery.max_attempts must be at least 1"));
        }
        if self.tmdb.base_url.trim().is_empty() {
            return Err(anyhow::anyhow!("tmdb.base_url cannot be empty"));
        }
        if !self.tmdb.base_url.starts_with("http://") && !self.tmdb.base_url.starts_with("https://") {
            return Err(anyhow::anyhow!("tmdb.base_url must be an http(s) URL: {}", self.tmdb.base_url));
        }
        if self.tmdb.language.trim().is_empty() {
            return Err(anyhow::anyhow!("tmdb.language cannot be empty"));
        }
        if self.tmdb.watch_region.trim().is_empty() {
            return Err(anyhow::anyhow!("tmdb.watch_region cannot be empty"));
        }
        Ok(())
    }
}

impl TmdbConfig {
    /// Resolve the access token: environment first, then credentials, then this config
    pub fn resolve_access_token(&self, credentials: &crate::CredentialStore) -> Option<String> {
        std::env::var(TOKEN_ENV_VAR)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| credentials.get_tmdb_access_token().cloned())
            .or_else(|| self.access_token.clone())
            .filter(|t| !t.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_load_and_save() {
        let file = NamedTempFile::new().unwrap();
        let mut config = Config::default();
        config.tmdb.language = "de-DE".to_string();
        config.discovery.resume_mode = ResumeMode::Watermark;
        config.discovery.page_size = 40;

        let path = file.path().to_path_buf();
        config.save_to_file(&path).unwrap();

        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(loaded.tmdb.language, "de-DE");
        assert_eq!(loaded.discovery.resume_mode, ResumeMode::Watermark);
        assert_eq!(loaded.discovery.page_size, 40);
        assert_eq!(loaded.discovery.prefetch_distance, 5);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [discovery]
            resume_mode = "watermark"
            "#,
        )
        .unwrap();
        assert_eq!(config.discovery.resume_mode, ResumeMode::Watermark);
        assert_eq!(config.discovery.page_size, 20);
        assert_eq!(config.discovery.max_attempts, 3);
        assert!(config.discovery.hide_visited);
        assert_eq!(config.tmdb.base_url, "https://api.themoviedb.org/3");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validate() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.discovery.max_attempts = 0;
        assert!(config.validate().is_err());

        config.discovery.max_attempts = 3;
        config.tmdb.base_url = "ftp://example.org".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config.discovery.resume_mode, ResumeMode::FirstPage);
    }
}
