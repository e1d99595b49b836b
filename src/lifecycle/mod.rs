//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     broadcast → server stops accepting → in-flight requests drain → exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup lives in main: config, logging, metrics, chain, listener
//! - Every long-running task subscribes to the same shutdown broadcast

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
