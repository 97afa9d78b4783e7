//! Configuration file loader.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::error::{ConfigError, ConfigResult};
use super::schema::SwitchboardConfig;

/// Configuration loader with support for multiple search paths.
pub struct ConfigLoader {
    search_paths: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Creates a new configuration loader.
    pub fn new() -> Self {
        Self {
            search_paths: Vec::new(),
        }
    }

    /// Adds a search path for configuration files.
    pub fn add_search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Adds the current directory to search paths.
    pub fn with_current_dir(self) -> Self {
        if let Ok(cwd) = std::env::current_dir() {
            self.add_search_path(cwd)
        } else {
            self
        }
    }

    /// Adds the user config directory to search paths.
    pub fn with_user_config_dir(self) -> Self {
        if let Some(config_dir) = dirs::config_dir() {
            self.add_search_path(config_dir.join("switchboard"))
        } else {
            self
        }
    }

    /// Loads configuration from the first available source.
    pub fn load(&self) -> ConfigResult<SwitchboardConfig> {
        if let Some(path) = self.find_config_file() {
            return self.load_from_file(&path);
        }

        info!("no configuration file found, using defaults");
        Ok(SwitchboardConfig::default())
    }

    /// Loads configuration from a specific file.
    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<SwitchboardConfig> {
        let path = path.as_ref();
        info!("loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path)?;
        self.load_from_str(&content)
    }

    /// Loads configuration from a YAML string.
    pub fn load_from_str(&self, yaml: &str) -> ConfigResult<SwitchboardConfig> {
        let config = self.parse_yaml(yaml)?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Finds the first available configuration file.
    fn find_config_file(&self) -> Option<PathBuf> {
        const CONFIG_NAMES: &[&str] = &[
            "switchboard.yaml",
            "switchboard.yml",
            ".switchboard.yaml",
            ".switchboard.yml",
        ];

        for search_path in &self.search_paths {
            for name in CONFIG_NAMES {
                let path = search_path.join(name);
                debug!("checking for config file: {}", path.display());
                if path.exists() {
                    info!("found configuration file: {}", path.display());
                    return Some(path);
                }
            }
        }

        None
    }

    /// Parses YAML content with environment variable expansion.
    fn parse_yaml(&self, content: &str) -> ConfigResult<SwitchboardConfig> {
        let expanded = expand_env_vars(content);
        serde_yaml::from_str(&expanded).map_err(ConfigError::from)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new().with_current_dir().with_user_config_dir()
    }
}

/// Expands environment variables in the format `${VAR}` or
/// `${VAR:-default}`.
fn expand_env_vars(content: &str) -> String {
    let re = regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(:-([^}]*))?\}")
        .expect("env expansion pattern is valid");
    let mut result = content.to_string();

    for cap in re.captures_iter(content) {
        let full_match = cap.get(0).map(|m| m.as_str()).unwrap_or_default();
        let var_name = cap.get(1).map(|m| m.as_str()).unwrap_or_default();
        let default_value = cap.get(3).map(|m| m.as_str());

        let value = std::env::var(var_name)
            .ok()
            .or_else(|| default_value.map(String::from))
            .unwrap_or_default();

        result = result.replace(full_match, &value);
    }

    result
}

/// Cross-field validation over a parsed configuration.
fn validate_config(config: &SwitchboardConfig) -> ConfigResult<()> {
    if let Some(0) = config.chat.dedupe_limit {
        return Err(ConfigError::validation("chat.dedupe_limit must be positive"));
    }
    if config.logging.output == super::schema::LogOutput::File && config.logging.file_path.is_none()
    {
        return Err(ConfigError::validation(
            "logging.output is 'file' but logging.file_path is unset",
        ));
    }
    Ok(())
}

/// Convenience function to load configuration with default settings.
pub fn load_config() -> ConfigResult<SwitchboardConfig> {
    ConfigLoader::default().load()
}

#[cfg(test)]
mod tests {
    use super::super::schema::{LogFormat, LogLevel};
    use super::*;

    #[test]
    fn parse_empty_yaml() {
        let loader = ConfigLoader::new();
        let config = loader.load_from_str("").unwrap();
        assert!(config.adapters.is_empty());
    }

    #[test]
    fn parse_minimal_config() {
        let yaml = r#"
logging:
  level: debug
  format: pretty

chat:
  user_name: jido
  dedupe_limit: 500
"#;
        let loader = ConfigLoader::new();
        let config = loader.load_from_str(yaml).unwrap();
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.chat.user_name.as_deref(), Some("jido"));
        assert_eq!(config.chat.dedupe_limit, Some(500));
    }

    #[test]
    fn adapter_sections_stay_dynamic() {
        let yaml = r#"
adapters:
  telegram:
    token: abc
  discord:
    public_key: xyz
"#;
        let config = ConfigLoader::new().load_from_str(yaml).unwrap();
        assert_eq!(config.adapters.len(), 2);
        assert!(config.adapters.contains_key("telegram"));
    }

    #[test]
    fn env_var_default_value() {
        let yaml = r#"
adapters:
  telegram:
    token: ${SWITCHBOARD_TEST_NONEXISTENT:-fallback-token}
"#;
        let config = ConfigLoader::new().load_from_str(yaml).unwrap();
        let token = config.adapters["telegram"]
            .get("token")
            .and_then(|v| v.as_str())
            .unwrap();
        assert_eq!(token, "fallback-token");
    }

    #[test]
    fn zero_dedupe_limit_is_rejected() {
        let yaml = r#"
chat:
  dedupe_limit: 0
"#;
        assert!(ConfigLoader::new().load_from_str(yaml).is_err());
    }

    #[test]
    fn file_output_requires_a_path() {
        let yaml = r#"
logging:
  output: file
"#;
        assert!(ConfigLoader::new().load_from_str(yaml).is_err());
    }
}
