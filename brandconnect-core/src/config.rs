//! Configuration management

use crate::error::{BrandConnectError, BrandConnectResult, ErrorContext};
use crate::types::{AppInfo, BrandConnectConfig};

use std::path::{Path, PathBuf};
use tracing::{debug, info};

impl Default for AppInfo {
    fn default() -> Self {
        Self {
            name: "Brand Connect".to_string(),
            version: "1.0.0".to_string(),
            site_url: "http://localhost:3000".to_string(),
        }
    }
}

fn invalid(message: &str, suggestion: &str) -> BrandConnectError {
    BrandConnectError::Config {
        message: message.to_string(),
        source: None,
        context: ErrorContext::new("config")
            .with_operation("validate")
            .with_suggestion(suggestion),
    }
}

impl BrandConnectConfig {
    /// Default location: `<config dir>/brand-connect/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("brand-connect").join("config.toml"))
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> BrandConnectResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| BrandConnectError::Config {
            message: format!("Failed to read config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("read_file")
                .with_suggestion("Check if the config file exists and is readable"),
        })?;

        let config: BrandConnectConfig =
            toml::from_str(&content).map_err(|e| BrandConnectError::Config {
                message: format!("Failed to parse config: {}", e),
                source: Some(Box::new(e)),
                context: ErrorContext::new("config")
                    .with_operation("parse_toml")
                    .with_suggestion("Check TOML syntax in config file"),
            })?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> BrandConnectResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| BrandConnectError::Config {
            message: format!("Failed to serialize config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config").with_operation("serialize_toml"),
        })?;

        std::fs::write(path, content).map_err(|e| BrandConnectError::Config {
            message: format!("Failed to write config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("write_file")
                .with_suggestion("Check if the directory exists and is writable"),
        })?;

        Ok(())
    }

    /// Read the file at `path` (or the default path) if it exists, fall back
    /// to defaults otherwise, then apply environment overrides and validate
    pub fn load(path: Option<&Path>) -> BrandConnectResult<Self> {
        let path = path.map(Path::to_path_buf).or_else(Self::default_path);

        let mut config = match path {
            Some(path) if path.exists() => {
                info!("Loading configuration from {}", path.display());
                Self::from_file(&path)?
            }
            _ => {
                debug!("No configuration file found, using defaults");
                Self::default()
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Overlay values from `BRAND_CONNECT_*` environment variables
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup("BRAND_CONNECT_APP_NAME") {
            self.app.name = name;
        }
        if let Some(url) = lookup("BRAND_CONNECT_SITE_URL") {
            self.app.site_url = url;
        }
        if let Some(url) = lookup("BRAND_CONNECT_BACKEND_URL") {
            self.backend.url = url;
        }
        if let Some(key) = lookup("BRAND_CONNECT_BACKEND_ANON_KEY") {
            self.backend.anon_key = key;
        }

        // Flags are only switched on by the literal "true"
        let flag = |key: &str| lookup(key).map(|v| v == "true");
        if let Some(enabled) = flag("BRAND_CONNECT_ENABLE_CHAT") {
            self.features.chat = enabled;
        }
        if let Some(enabled) = flag("BRAND_CONNECT_ENABLE_PAYMENTS") {
            self.features.payments = enabled;
        }
        if let Some(enabled) = flag("BRAND_CONNECT_ENABLE_NOTIFICATIONS") {
            self.features.notifications = enabled;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> BrandConnectResult<()> {
        let session = &self.session;

        if session.timeout_minutes == 0 {
            return Err(invalid(
                "session.timeout_minutes must be greater than 0",
                "Set session.timeout_minutes to a positive value",
            ));
        }

        if session.warning_minutes >= session.timeout_minutes {
            return Err(invalid(
                "session.warning_minutes must be less than session.timeout_minutes",
                "Lower session.warning_minutes or raise session.timeout_minutes",
            ));
        }

        if !(session.extension_threshold > 0.0 && session.extension_threshold <= 1.0) {
            return Err(invalid(
                "session.extension_threshold must be in (0, 1]",
                "Use a fraction such as 0.5",
            ));
        }

        if session.extend_on_activity && session.activity_events.is_empty() {
            return Err(invalid(
                "session.activity_events is empty while extend_on_activity is enabled",
                "List at least one activity event or disable extend_on_activity",
            ));
        }

        if self.realtime.schema.is_empty() {
            return Err(invalid(
                "realtime.schema must not be empty",
                "Set realtime.schema, usually \"public\"",
            ));
        }

        Ok(())
    }
}
