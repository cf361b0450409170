//! Configuration management for teamforge
//!
//! This module handles configuration loading from environment variables and
//! TOML files, validation, and default values for balancing and rating.

pub mod app;
pub mod balance;
pub mod rating;

// Re-export commonly used types
pub use app::{validate_config, AppConfig, ServiceSettings};
pub use balance::BalanceConfig;
pub use rating::RatingConfig;
