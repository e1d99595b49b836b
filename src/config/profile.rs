//! Active profile selection.
//!
//! Profiles name configuration overlays (`application-<profile>.toml`).
//! When nothing selects a profile the gateway runs as `dev`.

use std::fmt;

pub const DEFAULT_PROFILE: &str = "dev";
pub const PROFILES_ENV: &str = "GATEKEEPER_PROFILES_ACTIVE";

pub const DEVELOPMENT: &str = "dev";
pub const PRODUCTION: &str = "prod";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveProfiles {
    names: Vec<String>,
    defaulted: bool,
}

impl ActiveProfiles {
    /// Resolve from an explicit comma-separated selection.
    ///
    /// Blank entries are dropped and duplicates keep their first position.
    /// An absent or blank selection yields the default profile.
    pub fn resolve(selection: Option<&str>) -> Self {
        let mut names: Vec<String> = Vec::new();
        for name in selection.unwrap_or_default().split(',').map(str::trim) {
            if !name.is_empty() && !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }

        if names.is_empty() {
            Self {
                names: vec![DEFAULT_PROFILE.to_string()],
                defaulted: true,
            }
        } else {
            Self { names, defaulted: false }
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn is_active(&self, profile: &str) -> bool {
        self.names.iter().any(|n| n == profile)
    }

    /// True when no profile was selected and the default applies.
    pub fn is_defaulted(&self) -> bool {
        self.defaulted
    }

    /// `dev` and `prod` together is a misconfiguration.
    pub fn conflicting(&self) -> bool {
        self.is_active(DEVELOPMENT) && self.is_active(PRODUCTION)
    }
}

impl Default for ActiveProfiles {
    fn default() -> Self {
        Self::resolve(None)
    }
}

impl fmt::Display for ActiveProfiles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.names.join(","))
    }
}
