//! # Engine Configuration
//!
//! Knobs the payment orchestrator reads. Loading from files and the
//! environment belongs to the checkout layer; this crate only defines the
//! shape and the defaults.
//!
//! ```toml
//! [engine]
//! max_tenders = 20
//! reserve_wic_eligible = true
//! allow_card_change = false
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Upper bound accepted for `max_tenders`.
pub const MAX_TENDERS_LIMIT: usize = 100;

/// Orchestrator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Most active payments one transaction may carry.
    #[serde(default = "default_max_tenders")]
    pub max_tenders: usize,

    /// SNAP leaves the WIC-eligible part of a line for WIC.
    ///
    /// Turning this off lets SNAP cover WIC items when no WIC card is
    /// presented, at the cost of WIC/SNAP order independence.
    #[serde(default = "default_true")]
    pub reserve_wic_eligible: bool,

    /// Credit, Debit and Check may over-tender and produce change.
    #[serde(default)]
    pub allow_card_change: bool,
}

fn default_max_tenders() -> usize {
    20
}

fn default_true() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_tenders: default_max_tenders(),
            reserve_wic_eligible: true,
            allow_card_change: false,
        }
    }
}

impl EngineConfig {
    /// Checks the settings are usable.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_tenders == 0 || self.max_tenders > MAX_TENDERS_LIMIT {
            return Err(ValidationError::OutOfRange {
                field: "max_tenders".to_string(),
                min: 1,
                max: MAX_TENDERS_LIMIT as i64,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_tenders, 20);
        assert!(config.reserve_wic_eligible);
        assert!(!config.allow_card_change);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"allow_card_change": true}"#).unwrap();
        assert_eq!(config.max_tenders, 20);
        assert!(config.reserve_wic_eligible);
        assert!(config.allow_card_change);
    }

    #[test]
    fn test_zero_tenders_is_invalid() {
        let config = EngineConfig {
            max_tenders: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::OutOfRange { .. })
        ));
    }
}
