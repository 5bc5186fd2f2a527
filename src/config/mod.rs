//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, BROKER_PASSWORD override)
//!     → validation.rs (semantic checks)
//!     → FailoverConfig (validated, immutable)
//!     → FailoverManagerBuilder::from_config
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; endpoints are fixed for a manager's life
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{AlertConfig, BrokerConfig, FailoverConfig, ObservabilityConfig};
pub use validation::ValidationError;
