//! Authenticated identity attached to requests.

use std::collections::BTreeSet;

use serde::Serialize;

/// Well-known authority names.
pub mod authorities {
    pub const ADMIN: &str = "ROLE_ADMIN";
    pub const USER: &str = "ROLE_USER";
    pub const ANONYMOUS: &str = "ROLE_ANONYMOUS";
}

/// An authenticated identity carrying zero or more authorities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    subject: String,
    authorities: BTreeSet<String>,
}

impl Principal {
    pub fn new<I, A>(subject: impl Into<String>, authorities: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        Self {
            subject: subject.into(),
            authorities: authorities.into_iter().map(Into::into).collect(),
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn authorities(&self) -> impl Iterator<Item = &str> {
        self.authorities.iter().map(String::as_str)
    }

    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.contains(authority)
    }

    pub fn has_any_authority<S: AsRef<str>>(&self, authorities: &[S]) -> bool {
        authorities.iter().any(|a| self.has_authority(a.as_ref()))
    }
}
