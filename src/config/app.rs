//! Main application configuration
//!
//! This module defines the top-level configuration for the teamforge binaries,
//! including environment variable loading, TOML files and validation.

use crate::config::{BalanceConfig, RatingConfig};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub balance: BalanceConfig,
    pub rating: RatingConfig,
}

/// Service-level settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Group used when a command does not name one
    pub default_group: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "teamforge".to_string(),
            log_level: "info".to_string(),
            default_group: 0,
        }
    }
}

/// Read and parse an environment variable, `None` when unset
fn env_value<T: FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("Invalid {} value: {}", name, raw)),
        Err(_) => Ok(None),
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file; environment variables still win
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: AppConfig = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        // Service settings
        if let Some(name) = env_value("SERVICE_NAME")? {
            self.service.name = name;
        }
        if let Some(level) = env_value("LOG_LEVEL")? {
            self.service.log_level = level;
        }
        if let Some(group) = env_value("DEFAULT_GROUP")? {
            self.service.default_group = group;
        }

        // Balancing settings
        if let Some(width) = env_value("BALANCE_BAND_WIDTH")? {
            self.balance.band_width = width;
        }
        if let Some(threshold) = env_value("BALANCE_SIMILARITY_THRESHOLD")? {
            self.balance.similarity_threshold = threshold;
        }
        if let Some(weight) = env_value("BALANCE_UNCERTAINTY_WEIGHT")? {
            self.balance.uncertainty_weight = weight;
        }
        if let Some(max_players) = env_value("MAX_PLAYERS")? {
            self.balance.max_players = max_players;
        }
        if let Some(max_teams) = env_value("MAX_TEAMS")? {
            self.balance.max_teams = max_teams;
        }

        // Rating settings
        if let Some(k) = env_value("RATING_K_FACTOR")? {
            self.rating.k_factor = k;
        }
        if let Some(k) = env_value("RATING_RANKED_K_FACTOR")? {
            self.rating.ranked_k_factor = k;
        }
        if let Some(floor) = env_value("RATING_UNCERTAINTY_FLOOR")? {
            self.rating.uncertainty_floor = floor;
        }
        if let Some(max_change) = env_value("PLACEMENT_MAX_CHANGE")? {
            self.rating.max_change = max_change;
        }
        if let Some(beta) = env_value("MULTI_TEAM_BETA")? {
            self.rating.beta = beta;
        }

        Ok(())
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    // Validate balancing settings
    let balance = &config.balance;
    if balance.band_width <= 0.0 {
        return Err(anyhow!("Band width must be positive"));
    }
    if balance.similarity_threshold < 0.0 {
        return Err(anyhow!("Similarity threshold cannot be negative"));
    }
    if balance.uncertainty_weight < 0.0 {
        return Err(anyhow!("Uncertainty weight cannot be negative"));
    }
    if balance.min_players == 0 || balance.min_players > balance.max_players {
        return Err(anyhow!(
            "Player bounds are inverted: {}..={}",
            balance.min_players,
            balance.max_players
        ));
    }
    if balance.max_teams == 0 {
        return Err(anyhow!("Max teams must be greater than 0"));
    }
    if balance.split_threshold <= balance.single_team_threshold {
        return Err(anyhow!(
            "Split threshold must be above the single team threshold"
        ));
    }

    // Validate rating settings
    let rating = &config.rating;
    if rating.k_factor <= 0.0 || rating.ranked_k_factor <= 0.0 {
        return Err(anyhow!("K factors must be positive"));
    }
    if rating.reference_uncertainty <= 0.0 {
        return Err(anyhow!("Reference uncertainty must be positive"));
    }
    if !(0.0..=1.0).contains(&rating.uncertainty_decay) || rating.uncertainty_decay == 0.0 {
        return Err(anyhow!("Uncertainty decay must be in (0, 1]"));
    }
    if rating.uncertainty_floor <= 0.0 {
        return Err(anyhow!("Uncertainty floor must be positive"));
    }
    if rating.max_change <= 0.0 || rating.max_change_fraction <= 0.0 {
        return Err(anyhow!("Placement change limits must be positive"));
    }
    if rating.beta <= 0.0 {
        return Err(anyhow!("Beta must be positive"));
    }
    if rating.uncertainty_tolerance < 0.0 {
        return Err(anyhow!("Uncertainty tolerance must be non-negative"));
    }
    if rating.assumed_external_team_size == 0 {
        return Err(anyhow!("Assumed external team size must be greater than 0"));
    }
    if rating.display_scale <= 0.0 {
        return Err(anyhow!("Display scale must be positive"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.balance.max_players, 24);
        assert_eq!(config.balance.max_teams, 6);
        assert_eq!(config.rating.k_factor, 32.0);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.service.log_level = "loud".to_string();
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.balance.band_width = 0.0;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.balance.min_players = 30;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.rating.uncertainty_decay = 1.5;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.rating.assumed_external_team_size = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [balance]
            band_width = 150.0

            [rating]
            max_change = 120.0
            "#,
        )
        .unwrap();

        assert_eq!(config.balance.band_width, 150.0);
        assert_eq!(config.balance.similarity_threshold, 50.0);
        assert_eq!(config.rating.max_change, 120.0);
        assert_eq!(config.rating.k_factor, 32.0);
        assert_eq!(config.service.name, "teamforge");
    }
}
