//! Wrapp Config provides the layered configuration read by the wiring planner.
//!
//! Wrapp Config is split into two major parts:
//! 1. Config types: [`PlannerOptions`](config::PlannerOptions) and the
//!    [`EnvironmentConfig`](config::EnvironmentConfig) facts that gate components
//! 2. ConfigProvider: Layers defaults, TOML files and `WRAPP_*` environment variables with figment
//!
//! # Examples
//!
//! ```rust
//! use wrapp_config::provider::ConfigProvider;
//!
//! let mut provider = ConfigProvider::initialize();
//! provider
//!     .load_str("[environment]\nprofiles = [\"dev\"]\n", "inline")
//!     .unwrap();
//!
//! let config = provider.extract().unwrap();
//! assert_eq!(config.environment.profiles, vec!["dev".to_string()]);
//! assert!(!config.planner.strict);
//! ```
//!
//! Wrapp Config consists of the following components:
//!
//! 1. Config - the deserializable option and environment types
//! 2. Provider - for layering config sources
//! 3. Errors - for config errors

pub mod config;
pub mod errors;
pub mod provider;

pub use config::{EnvironmentConfig, PlannerOptions, WiringConfig};
pub use errors::ConfigError;
pub use provider::ConfigProvider;
