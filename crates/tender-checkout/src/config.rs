//! # Checkout Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TENDER_MAX_TENDERS=10                                              │
//! │     TENDER_ALLOW_CARD_CHANGE=true                                      │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/checkout/checkout.toml (Linux)                           │
//! │     ~/Library/Application Support/com.tender.checkout/checkout.toml    │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     20 tenders, WIC reservation on, no card change                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # checkout.toml
//! [engine]
//! max_tenders = 20
//! reserve_wic_eligible = true
//! allow_card_change = false
//!
//! [terminal]
//! id = "550e8400-e29b-41d4-a716-446655440000"
//! name = "Lane 3"
//!
//! [logging]
//! filter = "info,tender_core=debug"
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use tender_core::EngineConfig;

use crate::error::{CheckoutError, CheckoutResult};

// =============================================================================
// Terminal Settings
// =============================================================================

/// Identity of the register this checkout runs on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalSettings {
    /// Auto-generated on first run if not provided.
    pub id: String,

    #[serde(default = "default_terminal_name")]
    pub name: String,
}

fn default_terminal_name() -> String {
    "Checkout Lane".to_string()
}

impl Default for TerminalSettings {
    fn default() -> Self {
        TerminalSettings {
            id: Uuid::new_v4().to_string(),
            name: default_terminal_name(),
        }
    }
}

// =============================================================================
// Logging Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// `tracing_subscriber::EnvFilter` directive. `RUST_LOG` wins when set.
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            filter: default_filter(),
        }
    }
}

// =============================================================================
// Checkout Configuration
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutConfig {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub terminal: TerminalSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl CheckoutConfig {
    /// Loads configuration: defaults, then file, then environment.
    pub fn load(config_path: Option<PathBuf>) -> CheckoutResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading checkout config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        let (config, error) = Self::load_with_fallback(config_path);
        if let Some(e) = error {
            warn!("Failed to load checkout config: {}. Using defaults.", e);
        }
        config
    }

    /// Like `load_or_default`, but hands the load error back instead of
    /// logging it. For callers that set up logging from the config.
    pub fn load_with_fallback(config_path: Option<PathBuf>) -> (Self, Option<CheckoutError>) {
        match Self::load(config_path) {
            Ok(config) => (config, None),
            Err(e) => (Self::default(), Some(e)),
        }
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> CheckoutResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| CheckoutError::ConfigLoadFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Checkout config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> CheckoutResult<()> {
        if self.terminal.id.trim().is_empty() {
            return Err(CheckoutError::InvalidConfig(
                "terminal id must not be empty".into(),
            ));
        }
        self.engine.validate()?;
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from any key/value source.
    fn apply_overrides<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = var("TENDER_MAX_TENDERS") {
            match value.parse::<usize>() {
                Ok(max) => {
                    debug!(max_tenders = max, "Overriding max tenders from environment");
                    self.engine.max_tenders = max;
                }
                Err(_) => warn!(value = %value, "Ignoring invalid TENDER_MAX_TENDERS"),
            }
        }

        if let Some(value) = var("TENDER_RESERVE_WIC") {
            match parse_flag(&value) {
                Some(flag) => self.engine.reserve_wic_eligible = flag,
                None => warn!(value = %value, "Ignoring invalid TENDER_RESERVE_WIC"),
            }
        }

        if let Some(value) = var("TENDER_ALLOW_CARD_CHANGE") {
            match parse_flag(&value) {
                Some(flag) => self.engine.allow_card_change = flag,
                None => warn!(value = %value, "Ignoring invalid TENDER_ALLOW_CARD_CHANGE"),
            }
        }

        if let Some(id) = var("TENDER_TERMINAL_ID") {
            debug!(terminal_id = %id, "Overriding terminal ID from environment");
            self.terminal.id = id;
        }

        if let Some(name) = var("TENDER_TERMINAL_NAME") {
            self.terminal.name = name;
        }

        if let Some(filter) = var("TENDER_LOG") {
            self.logging.filter = filter;
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "tender", "checkout")
            .map(|dirs| dirs.config_dir().join("checkout.toml"))
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

    #[test]
    fn test_default_config() {
        let config = CheckoutConfig::default();
        assert!(!config.terminal.id.is_empty());
        assert_eq!(config.engine.max_tenders, 20);
        assert!(config.engine.reserve_wic_eligible);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_config_validation() {
        let mut config = CheckoutConfig::default();
        assert!(config.validate().is_ok());

        config.terminal.id = "  ".to_string();
        assert!(matches!(config.validate(), Err(CheckoutError::InvalidConfig(_))));

        config.terminal.id = "lane-3".to_string();
        config.engine.max_tenders = 0;
        assert!(matches!(config.validate(), Err(CheckoutError::InvalidConfig(_))));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: CheckoutConfig = toml::from_str(
            r#"
            [engine]
            allow_card_change = true

            [terminal]
            id = "lane-3"
            "#,
        )
        .unwrap();
        assert!(config.engine.allow_card_change);
        assert_eq!(config.engine.max_tenders, 20);
        assert_eq!(config.terminal.name, "Checkout Lane");
    }

    #[test]
    fn test_toml_serialization() {
        let config = CheckoutConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[engine]"));
        assert!(toml_str.contains("[terminal]"));

        let parsed: CheckoutConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("TENDER_MAX_TENDERS", "5"),
            ("TENDER_RESERVE_WIC", "off"),
            ("TENDER_ALLOW_CARD_CHANGE", "maybe"),
            ("TENDER_TERMINAL_ID", "lane-7"),
        ]
        .into_iter()
        .collect();

        let mut config = CheckoutConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.engine.max_tenders, 5);
        assert!(!config.engine.reserve_wic_eligible);
        assert!(!config.engine.allow_card_change);
        assert_eq!(config.terminal.id, "lane-7");
    }

    #[test]
    fn test_save_then_load() {
        let path = std::env::temp_dir().join(format!("checkout-{}.toml", Uuid::new_v4()));
        let mut config = CheckoutConfig::default();
        config.terminal.id = "lane-9".to_string();
        config.engine.max_tenders = 8;
        config.save(Some(path.clone())).unwrap();

        let loaded: CheckoutConfig =
            toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let path = std::env::temp_dir().join(format!("missing-{}.toml", Uuid::new_v4()));
        let config = CheckoutConfig::load_or_default(Some(path));
        assert_eq!(config.engine, EngineConfig::default());
    }

    #[test]
    fn test_broken_file_falls_back_with_error() {
        let path = std::env::temp_dir().join(format!("broken-{}.toml", Uuid::new_v4()));
        std::fs::write(&path, "[engine\nmax_tenders = ").unwrap();
        let (config, error) = CheckoutConfig::load_with_fallback(Some(path.clone()));
        std::fs::remove_file(&path).ok();

        assert_eq!(config.engine, EngineConfig::default());
        assert!(error.is_some());
    }
}
