//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → firewall.rs (reject encoded separators, dot segments)
//!     → spa.rs (client routes become /index.html)
//!     → rules.rs (first matching rule, built from pattern.rs matchers)
//!     → token.rs (bearer JWT → Principal, protected rules only)
//!     → decision: continue | 401 | 403 (chain.rs)
//!     → headers.rs (policy headers on every response)
//! ```
//!
//! # Design Decisions
//! - Fail closed: a request no rule matches is denied
//! - Stateless: no sessions, no cookies
//! - Rules are evaluated in declared order; shadowed rules are reported, never reordered

pub mod chain;
pub mod cors;
pub mod defaults;
pub mod firewall;
pub mod headers;
pub mod pattern;
pub mod principal;
pub mod rules;
pub mod spa;
pub mod token;

pub use chain::{SecurityChain, SharedChain};
pub use principal::Principal;
pub use rules::{Access, Decision, RuleTable};
