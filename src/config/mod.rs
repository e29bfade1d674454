pub mod types;

use std::path::{Path, PathBuf};
use types::StigConfig;

const CONFIG_FILE_NAMES: [&str; 2] = [".stigcheck.yaml", ".stigcheck.yml"];

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error reading {path}: {message}")]
    IoError { path: PathBuf, message: String },

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Get the global config file path (~/.stigcheck.yaml)
pub fn global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(CONFIG_FILE_NAMES[0]))
}

impl StigConfig {
    /// Load configuration from a YAML file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        Self::load_from_str(&content)
    }

    /// Load configuration from a YAML string.
    pub fn load_from_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Try to load config from the working directory, then the home directory.
    /// Unreadable files are skipped with a warning.
    pub fn load_from_default() -> Option<Self> {
        let local = CONFIG_FILE_NAMES.iter().map(PathBuf::from);
        for path in local.chain(global_config_path()) {
            if !path.exists() {
                continue;
            }
            match Self::load_from_file(&path) {
                Ok(config) => {
                    log::debug!("loaded configuration from {}", path.display());
                    return Some(config);
                }
                Err(e) => log::warn!("ignoring {}: {}", path.display(), e),
            }
        }
        None
    }

    /// Load the explicit config file if given, otherwise the default locations,
    /// otherwise the built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Ok(Self::load_from_default().unwrap_or_default()),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.page_size == 0 {
            return Err(ConfigError::Invalid("provider.pageSize must be positive".to_string()));
        }
        if self.provider.control_plane_namespace.is_empty() {
            return Err(ConfigError::Invalid(
                "provider.controlPlaneNamespace must not be empty".to_string(),
            ));
        }
        if let Some(timeout) = &self.provider.timeout {
            let parsed = crate::analyzer::stig::duration::ApiDuration::parse(timeout)
                .map_err(|e| ConfigError::Invalid(format!("provider.timeout: {}", e)))?;
            if !parsed.is_positive() {
                return Err(ConfigError::Invalid(format!(
                    "provider.timeout must be positive, got {}",
                    timeout
                )));
            }
        }
        Ok(())
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.provider.context = Some(context.into());
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.provider.control_plane_namespace = namespace.into();
        self
    }

    pub fn with_timeout(mut self, timeout: impl Into<String>) -> Self {
        self.provider.timeout = Some(timeout.into());
        self
    }

    pub fn with_ignored_rules(mut self, rules: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.ignore_rules.extend(rules.into_iter().map(Into::into));
        self
    }
}
