//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config dir (application.toml + application-<profile>.toml)
//!     → profile.rs (active profiles, `dev` when none selected)
//!     → loader.rs (parse, overlay profiles, deserialize)
//!     → validation.rs (semantic checks)
//!     → GatekeeperConfig (validated, immutable)
//!
//! On change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → server rebuilds the SecurityChain and swaps it atomically
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod profile;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, load_profiled, ConfigError};
pub use profile::ActiveProfiles;
pub use schema::GatekeeperConfig;
pub use schema::ListenerConfig;
pub use schema::RuleConfig;
