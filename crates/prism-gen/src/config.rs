//! Layered configuration system
//!
//! Config is loaded with three layers of precedence (highest wins):
//! 1. Environment variables: `PRISM_{PROVIDER}_API_KEY`, `PRISM_USER`
//! 2. Project-local: `.prism/config.toml`
//! 3. Global: `~/.prism/config.toml`

use prism_core::{PrismError, Result, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::catalog::{ModelCatalog, ModelConfig};
use crate::poll::PollOptions;
use crate::provider::MAX_PROMPT_CHARS;

/// Provider names that accept an API key from the environment
pub const KEYED_PROVIDERS: [&str; 2] = ["fal", "gemini"];

/// Provider-specific configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Comparison and polling defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareSettings {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for CompareSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            poll_timeout_secs: default_poll_timeout(),
            max_prompt_chars: default_max_prompt_chars(),
            log_level: default_log_level(),
        }
    }
}

fn default_poll_interval() -> u64 {
    5
}
fn default_poll_timeout() -> u64 {
    180
}
fn default_max_prompt_chars() -> usize {
    MAX_PROMPT_CHARS
}
fn default_log_level() -> String {
    "info".to_string()
}

/// Top-level config file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrismConfigFile {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default)]
    pub compare: CompareSettings,
    /// Local credit balances per user, for offline use
    #[serde(default)]
    pub credits: HashMap<String, u32>,
    /// Extra or overriding catalog entries
    #[serde(default)]
    pub models: Vec<ModelConfig>,
}

/// Resolved configuration with environment variable overrides applied
#[derive(Debug, Clone, Default)]
pub struct PrismConfig {
    pub user: Option<String>,
    pub providers: HashMap<String, ProviderConfig>,
    pub compare: CompareSettings,
    pub credits: HashMap<String, u32>,
    pub models: Vec<ModelConfig>,
}

impl PrismConfig {
    /// Load config with layered precedence: global < project < env vars
    pub fn load() -> Result<Self> {
        let mut config = PrismConfigFile::default();

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                let global = Self::load_file(&global_path)?;
                Self::merge_into(&mut config, global);
            }
        }

        let local_path = PathBuf::from(".prism/config.toml");
        if local_path.exists() {
            let local = Self::load_file(&local_path)?;
            Self::merge_into(&mut config, local);
        }

        Self::apply_env_overrides(&mut config);

        Ok(config.into())
    }

    /// Load config from a specific file path only (for testing)
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let mut config = Self::load_file(path)?;
        Self::apply_env_overrides(&mut config);
        Ok(config.into())
    }

    /// Get API key for a provider
    pub fn api_key(&self, provider_name: &str) -> Option<&str> {
        self.providers
            .get(provider_name)
            .and_then(|p| p.api_key.as_deref())
            .filter(|k| !k.is_empty())
    }

    /// Get API URL override for a provider
    pub fn api_url(&self, provider_name: &str) -> Option<&str> {
        self.providers
            .get(provider_name)
            .and_then(|p| p.api_url.as_deref())
    }

    /// Check if a provider is enabled
    pub fn is_enabled(&self, provider_name: &str) -> bool {
        self.providers
            .get(provider_name)
            .map(|p| p.enabled)
            .unwrap_or(true)
    }

    /// The configured local user, if any
    pub fn current_user(&self) -> Option<UserId> {
        self.user
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(UserId::from)
    }

    /// Model catalog: built-in defaults overlaid with `[[models]]`
    pub fn catalog(&self) -> ModelCatalog {
        ModelCatalog::with_overrides(self.models.iter().cloned())
    }

    /// Poll loop bounds for callers
    pub fn poll_options(&self) -> PollOptions {
        PollOptions {
            interval: Duration::from_secs(self.compare.poll_interval_secs),
            timeout: Duration::from_secs(self.compare.poll_timeout_secs),
            max_attempts: None,
        }
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".prism").join("config.toml"))
    }

    fn load_file(path: &Path) -> Result<PrismConfigFile> {
        let content = std::fs::read_to_string(path)?;
        let config: PrismConfigFile = toml::from_str(&content).map_err(|e| {
            PrismError::ConfigError(format!("Failed to parse config {}: {}", path.display(), e))
        })?;
        Ok(config)
    }

    fn merge_into(base: &mut PrismConfigFile, overlay: PrismConfigFile) {
        if overlay.user.is_some() {
            base.user = overlay.user;
        }

        for (name, provider) in overlay.providers {
            let entry = base.providers.entry(name).or_default();
            if provider.api_key.is_some() {
                entry.api_key = provider.api_key;
            }
            if provider.api_url.is_some() {
                entry.api_url = provider.api_url;
            }
            entry.enabled = provider.enabled;
        }

        let defaults = CompareSettings::default();
        if overlay.compare.poll_interval_secs != defaults.poll_interval_secs {
            base.compare.poll_interval_secs = overlay.compare.poll_interval_secs;
        }
        if overlay.compare.poll_timeout_secs != defaults.poll_timeout_secs {
            base.compare.poll_timeout_secs = overlay.compare.poll_timeout_secs;
        }
        if overlay.compare.max_prompt_chars != defaults.max_prompt_chars {
            base.compare.max_prompt_chars = overlay.compare.max_prompt_chars;
        }
        if overlay.compare.log_level != defaults.log_level {
            base.compare.log_level = overlay.compare.log_level;
        }

        base.credits.extend(overlay.credits);
        base.models.extend(overlay.models);
    }

    fn apply_env_overrides(config: &mut PrismConfigFile) {
        for name in &KEYED_PROVIDERS {
            let env_key = format!("PRISM_{}_API_KEY", name.to_uppercase());
            if let Ok(key) = std::env::var(&env_key) {
                let entry = config.providers.entry(name.to_string()).or_default();
                entry.api_key = Some(key);
            }
        }
        if let Ok(user) = std::env::var("PRISM_USER") {
            config.user = Some(user);
        }
    }
}

impl From<PrismConfigFile> for PrismConfig {
    fn from(file: PrismConfigFile) -> Self {
        Self {
            user: file.user,
            providers: file.providers,
            compare: file.compare,
            credits: file.credits,
            models: file.models,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_config(content: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("prism_config_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    fn cleanup(path: &Path) {
        std::fs::remove_file(path).ok();
        std::fs::remove_dir(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_load_config_from_file() {
        std::env::remove_var("PRISM_FAL_API_KEY");

        let config_str = r#"
[providers.fal]
api_key = "fal-test-123"
api_url = "https://queue.example.com"

[providers.gemini]
api_key = "gm-test"
enabled = false

[compare]
poll_interval_secs = 2
max_prompt_chars = 500

[credits]
alice = 20

[[models]]
model = "fal-ai/flux/schnell"
label = "Flux Schnell"
style = "Fast"
cost = 1
provider = "fal"
"#;
        let path = temp_config(config_str);
        let config = PrismConfig::load_from_file(&path).unwrap();

        assert!(config.is_enabled("fal"));
        assert!(!config.is_enabled("gemini"));
        assert_eq!(config.api_url("fal"), Some("https://queue.example.com"));
        assert_eq!(config.compare.poll_interval_secs, 2);
        assert_eq!(config.compare.poll_timeout_secs, 180);
        assert_eq!(config.compare.max_prompt_chars, 500);
        assert_eq!(config.credits.get("alice"), Some(&20));
        assert!(config.catalog().get("fal-ai/flux/schnell").is_some());

        cleanup(&path);
    }

    #[test]
    fn test_env_var_override() {
        let path = temp_config(
            r#"
[providers.gemini]
api_key = "file-key"
"#,
        );

        std::env::set_var("PRISM_GEMINI_API_KEY", "env-key-override");
        let config = PrismConfig::load_from_file(&path).unwrap();
        assert_eq!(config.api_key("gemini"), Some("env-key-override"));

        std::env::remove_var("PRISM_GEMINI_API_KEY");
        cleanup(&path);
    }

    #[test]
    fn test_merge_overlay_wins() {
        let mut base: PrismConfigFile = toml::from_str(
            r#"
user = "global-user"
[providers.fal]
api_key = "global-key"
[credits]
alice = 5
"#,
        )
        .unwrap();
        let overlay: PrismConfigFile = toml::from_str(
            r#"
user = "project-user"
[providers.fal]
api_url = "https://local.example.com"
[compare]
poll_timeout_secs = 30
[credits]
alice = 9
"#,
        )
        .unwrap();

        PrismConfig::merge_into(&mut base, overlay);
        let config: PrismConfig = base.into();

        assert_eq!(config.user.as_deref(), Some("project-user"));
        assert_eq!(config.api_key("fal"), Some("global-key"));
        assert_eq!(config.api_url("fal"), Some("https://local.example.com"));
        assert_eq!(config.compare.poll_timeout_secs, 30);
        assert_eq!(config.credits.get("alice"), Some(&9));
    }

    #[test]
    fn test_missing_provider_defaults() {
        let config = PrismConfig::default();
        assert_eq!(config.api_key("nonexistent"), None);
        assert!(config.is_enabled("nonexistent"));
    }

    #[test]
    fn test_blank_user_is_no_user() {
        let config = PrismConfig {
            user: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(config.current_user().is_none());
    }

    #[test]
    fn test_poll_options_from_settings() {
        let config = PrismConfig::default();
        let options = config.poll_options();
        assert_eq!(options.interval, Duration::from_secs(5));
        assert_eq!(options.timeout, Duration::from_secs(180));
    }
}
