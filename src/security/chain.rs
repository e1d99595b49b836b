//! The security filter chain.
//!
//! # Data Flow
//! ```text
//! request
//!     → firewall (400 on traversal tricks)
//!     → same-origin guard (403 on cross-origin requests when no origin is allowed)
//!     → SPA forward (client routes become /index.html)
//!     → rule lookup (first match wins)
//!     → public rule?  yes → continue, token ignored
//!                     no  → bearer authentication (401 invalid_token on a bad token)
//!     → decision → continue | 401 | 403
//! ```
//!
//! Security headers are written by [`security_headers`], a separate layer
//! that the server installs outside the timeout, body limit and CORS layers.
//!
//! # Design Decisions
//! - Stateless: every request authenticates from its own bearer token
//! - The chain is an immutable snapshot; reload swaps a whole new chain
//! - The authenticated [`Principal`] is attached to request extensions

use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::{
    extract::{Request, State},
    http::{
        header::{AUTHORIZATION, ORIGIN},
        HeaderMap,
    },
    middleware::{self, Next},
    response::Response,
    Router,
};
use thiserror::Error;

use crate::config::GatekeeperConfig;
use crate::http::response;
use crate::observability::metrics;
use crate::security::cors::SameOriginGuard;
use crate::security::defaults::default_rule_table;
use crate::security::firewall;
use crate::security::headers::{HeaderError, SecurityHeaders};
use crate::security::principal::Principal;
use crate::security::rules::{Decision, RuleError, RuleTable};
use crate::security::spa;
use crate::security::token::{TokenError, TokenVerifier};

/// Chain handle shared by the middleware and the reload task.
pub type SharedChain = Arc<ArcSwap<SecurityChain>>;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("authorization rules: {0}")]
    Rules(#[from] RuleError),

    #[error("bearer tokens: {0}")]
    Token(#[from] TokenError),

    #[error("security headers: {0}")]
    Headers(#[from] HeaderError),
}

/// Outcome of reading the `Authorization` header.
#[derive(Debug)]
pub enum Authentication {
    Anonymous,
    Authenticated(Principal),
    Rejected(String),
}

#[derive(Debug)]
pub struct SecurityChain {
    rules: RuleTable,
    verifier: TokenVerifier,
    headers: SecurityHeaders,
    same_origin: Option<SameOriginGuard>,
}

impl SecurityChain {
    pub fn new(rules: RuleTable, verifier: TokenVerifier, headers: SecurityHeaders) -> Self {
        Self {
            rules,
            verifier,
            headers,
            same_origin: None,
        }
    }

    /// Refuse cross-origin requests with `guard`, or stop refusing with `None`.
    pub fn with_same_origin_guard(mut self, guard: Option<SameOriginGuard>) -> Self {
        self.same_origin = guard;
        self
    }

    pub fn from_config(config: &GatekeeperConfig) -> Result<Self, ChainError> {
        let rules = match &config.authorization.rules {
            Some(rules) => RuleTable::from_config(rules)?,
            None => default_rule_table()?,
        };
        let verifier = TokenVerifier::from_config(&config.security.jwt)?;
        let headers = SecurityHeaders::from_config(&config.security, config.listener.tls.is_some())?;

        for index in rules.shadowed_rules() {
            let patterns: Vec<&str> = rules.rules()[index].patterns().iter().map(|p| p.as_str()).collect();
            tracing::warn!(
                rule = index,
                patterns = ?patterns,
                "Rule is covered by an earlier rule and will never match"
            );
        }

        Ok(Self::new(rules, verifier, headers).with_same_origin_guard(SameOriginGuard::from_config(config)))
    }

    pub fn into_shared(self) -> SharedChain {
        Arc::new(ArcSwap::from_pointee(self))
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    pub fn headers(&self) -> &SecurityHeaders {
        &self.headers
    }

    pub fn same_origin_guard(&self) -> Option<SameOriginGuard> {
        self.same_origin
    }

    /// Read and verify the bearer token, if any.
    pub fn authenticate(&self, headers: &HeaderMap) -> Authentication {
        match bearer_token(headers) {
            BearerToken::Absent => Authentication::Anonymous,
            BearerToken::Malformed => Authentication::Rejected("Bearer token is malformed".to_string()),
            BearerToken::Present(token) => match self.verifier.verify(token) {
                Ok(principal) => Authentication::Authenticated(principal),
                Err(err) => Authentication::Rejected(err.challenge_description()),
            },
        }
    }

    async fn enforce(&self, mut request: Request, next: Next) -> Response {
        let raw_path = request.uri().path().to_string();
        if let Err(rejection) = firewall::inspect(&raw_path) {
            tracing::warn!(path = %raw_path, reason = %rejection, "Request rejected by firewall");
            metrics::record_firewall_rejection(rejection.as_str());
            return response::bad_request(&raw_path, &rejection.to_string());
        }

        if self
            .same_origin
            .is_some_and(|guard| guard.rejects(request.headers(), request.uri()))
        {
            tracing::info!(
                method = %request.method(),
                path = %raw_path,
                origin = ?request.headers().get(ORIGIN),
                "Cross-origin request refused"
            );
            metrics::record_cors_rejection();
            return response::invalid_cors_request(&raw_path);
        }

        if let Some(uri) = spa::rewrite(request.uri()) {
            tracing::debug!(from = %raw_path, to = %uri.path(), "Forwarding client route");
            *request.uri_mut() = uri;
        }

        let path = request.uri().path().to_string();
        let method = request.method().clone();
        let matched = self.rules.matching_rule(&path, &method);
        let rule_index = matched.map(|(index, _)| index);
        let rule = matched.map(|(_, rule)| rule);

        let decision = if rule.is_some_and(|r| r.access().is_public()) {
            Decision::PublicAllow
        } else {
            match self.authenticate(request.headers()) {
                Authentication::Rejected(description) => {
                    tracing::info!(
                        method = %method,
                        path = %path,
                        reason = %description,
                        "Bearer token rejected"
                    );
                    metrics::record_decision(Decision::Unauthenticated);
                    return response::invalid_token(&path, &description);
                }
                Authentication::Anonymous => RuleTable::decide_for(rule, None),
                Authentication::Authenticated(principal) => {
                    let decision = RuleTable::decide_for(rule, Some(&principal));
                    if decision.is_allowed() {
                        request.extensions_mut().insert(principal);
                    }
                    decision
                }
            }
        };

        metrics::record_decision(decision);
        tracing::debug!(
            method = %method,
            path = %path,
            rule = ?rule_index,
            decision = decision.as_str(),
            "Authorization decision"
        );

        match decision {
            Decision::PublicAllow | Decision::AuthenticatedAllow => next.run(request).await,
            Decision::Unauthenticated => response::unauthorized(&path),
            Decision::Forbidden => response::forbidden(&path),
        }
    }
}

enum BearerToken<'a> {
    Absent,
    Present(&'a str),
    Malformed,
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~' | '+' | '/')
}

fn bearer_token(headers: &HeaderMap) -> BearerToken<'_> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return BearerToken::Absent;
    };
    let Ok(value) = value.to_str() else {
        return BearerToken::Malformed;
    };

    let Some((scheme, rest)) = value.split_once(' ') else {
        return if value.eq_ignore_ascii_case("bearer") {
            BearerToken::Malformed
        } else {
            BearerToken::Absent
        };
    };
    if !scheme.eq_ignore_ascii_case("bearer") {
        return BearerToken::Absent;
    }

    let token = rest.trim();
    let body = token.trim_end_matches('=');
    if body.is_empty() || !body.chars().all(is_token_char) {
        return BearerToken::Malformed;
    }
    BearerToken::Present(token)
}

/// Middleware entry point.
pub async fn security_filter(State(shared): State<SharedChain>, request: Request, next: Next) -> Response {
    let chain = shared.load_full();
    chain.enforce(request, next).await
}

/// Write the current chain's security headers onto every response from `next`.
pub async fn security_headers(State(shared): State<SharedChain>, request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    shared.load().headers.apply(response.headers_mut());
    response
}

/// Wrap every route and the fallback of `router` in the security chain and
/// its response headers.
pub fn apply<S>(router: Router<S>, chain: SharedChain) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(middleware::from_fn_with_state(chain.clone(), security_filter))
        .layer(middleware::from_fn_with_state(chain, security_headers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        map
    }

    #[test]
    fn test_bearer_extraction() {
        assert!(matches!(bearer_token(&HeaderMap::new()), BearerToken::Absent));
        assert!(matches!(bearer_token(&headers("Basic dXNlcjpwdw==")), BearerToken::Absent));
        assert!(matches!(bearer_token(&headers("bearer abc.def.ghi")), BearerToken::Present("abc.def.ghi")));
        assert!(matches!(bearer_token(&headers("Bearer abc==")), BearerToken::Present("abc==")));
        assert!(matches!(bearer_token(&headers("Bearer")), BearerToken::Malformed));
        assert!(matches!(bearer_token(&headers("Bearer ")), BearerToken::Malformed));
        assert!(matches!(bearer_token(&headers("Bearer a b")), BearerToken::Malformed));
    }
}
