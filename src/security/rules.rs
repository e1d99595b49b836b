//! Ordered authorization rule table.
//!
//! # Responsibilities
//! - Hold rules (patterns, optional method, access requirement) in declared order
//! - Resolve a request to the first matching rule
//! - Turn (rule, principal) into a [`Decision`]
//!
//! # Design Decisions
//! - First match wins; the table never reorders rules
//! - Unmatched requests are denied
//! - Immutable after construction, shared through `Arc` without locks

use std::fmt;
use std::str::FromStr;

use axum::http::{Method, StatusCode};
use serde::Serialize;
use thiserror::Error;

use crate::config::schema::{AccessKind, RuleConfig};
use crate::security::pattern::{PathPattern, PatternError};
use crate::security::principal::Principal;

/// What a matched rule requires of the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    PermitAll,
    Authenticated,
    HasAuthority(String),
    HasAnyAuthority(Vec<String>),
    DenyAll,
}

impl Access {
    pub fn is_public(&self) -> bool {
        matches!(self, Access::PermitAll)
    }

    /// Decide for a caller that is (or is not) authenticated.
    pub fn decide(&self, principal: Option<&Principal>) -> Decision {
        match (self, principal) {
            (Access::PermitAll, _) => Decision::PublicAllow,
            (_, None) => Decision::Unauthenticated,
            (Access::Authenticated, Some(_)) => Decision::AuthenticatedAllow,
            (Access::HasAuthority(authority), Some(p)) if p.has_authority(authority) => {
                Decision::AuthenticatedAllow
            }
            (Access::HasAnyAuthority(list), Some(p)) if p.has_any_authority(list) => {
                Decision::AuthenticatedAllow
            }
            (_, Some(_)) => Decision::Forbidden,
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::PermitAll => f.write_str("permitAll"),
            Access::Authenticated => f.write_str("authenticated"),
            Access::HasAuthority(a) => write!(f, "hasAuthority('{}')", a),
            Access::HasAnyAuthority(list) => {
                f.write_str("hasAnyAuthority(")?;
                for (i, a) in list.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "'{}'", a)?;
                }
                f.write_str(")")
            }
            Access::DenyAll => f.write_str("denyAll"),
        }
    }
}

/// Outcome of evaluating a request against the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    PublicAllow,
    AuthenticatedAllow,
    Forbidden,
    Unauthenticated,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Decision::PublicAllow | Decision::AuthenticatedAllow)
    }

    /// HTTP status the decision maps to; allowed requests continue with 200-class handling.
    pub fn status(self) -> StatusCode {
        match self {
            Decision::PublicAllow | Decision::AuthenticatedAllow => StatusCode::OK,
            Decision::Forbidden => StatusCode::FORBIDDEN,
            Decision::Unauthenticated => StatusCode::UNAUTHORIZED,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Decision::PublicAllow => "public_allow",
            Decision::AuthenticatedAllow => "authenticated_allow",
            Decision::Forbidden => "forbidden",
            Decision::Unauthenticated => "unauthenticated",
        }
    }
}

/// Errors raised while building a rule table.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("rule {index}: {source}")]
    Pattern {
        index: usize,
        #[source]
        source: PatternError,
    },

    #[error("rule {index}: invalid HTTP method `{method}`")]
    Method { index: usize, method: String },

    #[error("rule {index}: no patterns given")]
    NoPatterns { index: usize },

    #[error("rule {index}: `{access}` requires at least one authority")]
    MissingAuthority { index: usize, access: &'static str },
}

/// A single authorization rule.
#[derive(Debug, Clone)]
pub struct Rule {
    patterns: Vec<PathPattern>,
    method: Option<Method>,
    access: Access,
}

impl Rule {
    pub fn new(patterns: Vec<PathPattern>, method: Option<Method>, access: Access) -> Self {
        Self {
            patterns,
            method,
            access,
        }
    }

    pub fn patterns(&self) -> &[PathPattern] {
        &self.patterns
    }

    pub fn method(&self) -> Option<&Method> {
        self.method.as_ref()
    }

    pub fn access(&self) -> &Access {
        &self.access
    }

    pub fn matches(&self, path: &str, method: &Method) -> bool {
        self.method.as_ref().map_or(true, |m| m == method)
            && self.patterns.iter().any(|p| p.matches(path))
    }

    /// True when `self` (declared earlier) leaves no room for `later` on `pattern`.
    fn covers_pattern(&self, later: &Rule, pattern: &PathPattern) -> bool {
        let method_covered = match (&self.method, &later.method) {
            (None, _) => true,
            (Some(a), Some(b)) => a == b,
            (Some(_), None) => false,
        };
        method_covered && self.patterns.iter().any(|p| p.covers(pattern))
    }
}

/// The ordered rule table.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<Rule>,
}

impl RuleTable {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn builder() -> RuleTableBuilder {
        RuleTableBuilder::default()
    }

    /// Build a table from operator-supplied rule definitions.
    pub fn from_config(configs: &[RuleConfig]) -> Result<Self, RuleError> {
        let mut rules = Vec::with_capacity(configs.len());

        for (index, config) in configs.iter().enumerate() {
            if config.patterns.is_empty() {
                return Err(RuleError::NoPatterns { index });
            }
            let patterns = config
                .patterns
                .iter()
                .map(|raw| PathPattern::parse(raw))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|source| RuleError::Pattern { index, source })?;

            let method = match &config.method {
                Some(raw) => Some(parse_method(raw).ok_or_else(|| RuleError::Method {
                    index,
                    method: raw.clone(),
                })?),
                None => None,
            };

            let access = match config.access {
                AccessKind::PermitAll => Access::PermitAll,
                AccessKind::Authenticated => Access::Authenticated,
                AccessKind::DenyAll => Access::DenyAll,
                AccessKind::HasAuthority => match config.authorities.as_slice() {
                    [single] => Access::HasAuthority(single.clone()),
                    [] => {
                        return Err(RuleError::MissingAuthority {
                            index,
                            access: "has_authority",
                        })
                    }
                    many => Access::HasAnyAuthority(many.to_vec()),
                },
                AccessKind::HasAnyAuthority => {
                    if config.authorities.is_empty() {
                        return Err(RuleError::MissingAuthority {
                            index,
                            access: "has_any_authority",
                        });
                    }
                    Access::HasAnyAuthority(config.authorities.clone())
                }
            };

            rules.push(Rule::new(patterns, method, access));
        }

        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First rule whose pattern and method match, with its declaration index.
    pub fn matching_rule(&self, path: &str, method: &Method) -> Option<(usize, &Rule)> {
        self.rules
            .iter()
            .enumerate()
            .find(|(_, rule)| rule.matches(path, method))
    }

    /// Decision for an already-resolved rule; `None` means no rule matched.
    pub fn decide_for(rule: Option<&Rule>, principal: Option<&Principal>) -> Decision {
        match rule {
            Some(rule) => rule.access.decide(principal),
            None => Access::DenyAll.decide(principal),
        }
    }

    /// Evaluate a request. Pure; no side effects.
    pub fn evaluate(&self, path: &str, method: &Method, principal: Option<&Principal>) -> Decision {
        let rule = self.matching_rule(path, method).map(|(_, rule)| rule);
        Self::decide_for(rule, principal)
    }

    /// Indexes of rules that can never match because earlier rules cover them.
    pub fn shadowed_rules(&self) -> Vec<usize> {
        self.rules
            .iter()
            .enumerate()
            .filter(|(index, rule)| {
                rule.patterns.iter().all(|pattern| {
                    self.rules[..*index]
                        .iter()
                        .any(|earlier| earlier.covers_pattern(rule, pattern))
                })
            })
            .map(|(index, _)| index)
            .collect()
    }
}

fn parse_method(raw: &str) -> Option<Method> {
    Method::from_str(&raw.to_ascii_uppercase()).ok()
}

/// Fluent builder mirroring declarative matcher registration.
///
/// ```
/// use gatekeeper::security::rules::RuleTable;
/// use axum::http::Method;
///
/// let table = RuleTable::builder()
///     .matchers(&["/public/**"]).permit_all()
///     .matchers_for(Method::POST, &["/api/login"]).permit_all()
///     .matchers(&["/api/**"]).authenticated()
///     .build()
///     .unwrap();
/// assert_eq!(table.len(), 3);
/// ```
#[derive(Debug, Default)]
pub struct RuleTableBuilder {
    pending: Vec<(Option<Method>, Vec<String>, Access)>,
}

impl RuleTableBuilder {
    pub fn matchers(self, patterns: &[&str]) -> PendingRule {
        PendingRule {
            builder: self,
            method: None,
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn matchers_for(self, method: Method, patterns: &[&str]) -> PendingRule {
        PendingRule {
            builder: self,
            method: Some(method),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn build(self) -> Result<RuleTable, RuleError> {
        let mut rules = Vec::with_capacity(self.pending.len());
        for (index, (method, raw_patterns, access)) in self.pending.into_iter().enumerate() {
            if raw_patterns.is_empty() {
                return Err(RuleError::NoPatterns { index });
            }
            let patterns = raw_patterns
                .iter()
                .map(|raw| PathPattern::parse(raw))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|source| RuleError::Pattern { index, source })?;
            rules.push(Rule::new(patterns, method, access));
        }
        Ok(RuleTable::new(rules))
    }
}

/// Patterns waiting for their access requirement.
#[derive(Debug)]
pub struct PendingRule {
    builder: RuleTableBuilder,
    method: Option<Method>,
    patterns: Vec<String>,
}

impl PendingRule {
    fn finish(mut self, access: Access) -> RuleTableBuilder {
        self.builder.pending.push((self.method, self.patterns, access));
        self.builder
    }

    pub fn permit_all(self) -> RuleTableBuilder {
        self.finish(Access::PermitAll)
    }

    pub fn authenticated(self) -> RuleTableBuilder {
        self.finish(Access::Authenticated)
    }

    pub fn has_authority(self, authority: &str) -> RuleTableBuilder {
        self.finish(Access::HasAuthority(authority.to_string()))
    }

    pub fn has_any_authority(self, authorities: &[&str]) -> RuleTableBuilder {
        self.finish(Access::HasAnyAuthority(
            authorities.iter().map(|a| a.to_string()).collect(),
        ))
    }

    pub fn deny_all(self) -> RuleTableBuilder {
        self.finish(Access::DenyAll)
    }
}
