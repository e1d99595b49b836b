//! Request path firewall.
//!
//! # Responsibilities
//! - Reject paths that could be read differently by the rule table and the upstream
//!   (encoded separators, dot segments, path parameters, control characters)
//!
//! # Design Decisions
//! - Runs before SPA forwarding and authorization
//! - Rejects instead of normalizing: a normalized path is never silently re-evaluated

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FirewallRejection {
    #[error("path contains a semicolon")]
    Semicolon,

    #[error("path contains an encoded '/', '\\', '.' or '%'")]
    EncodedCharacter,

    #[error("path contains a backslash")]
    Backslash,

    #[error("path contains an empty segment")]
    EmptySegment,

    #[error("path contains a '.' or '..' segment")]
    DotSegment,

    #[error("path contains a non-printable character")]
    NonPrintable,
}

impl FirewallRejection {
    pub fn as_str(self) -> &'static str {
        match self {
            FirewallRejection::Semicolon => "semicolon",
            FirewallRejection::EncodedCharacter => "encoded_character",
            FirewallRejection::Backslash => "backslash",
            FirewallRejection::EmptySegment => "empty_segment",
            FirewallRejection::DotSegment => "dot_segment",
            FirewallRejection::NonPrintable => "non_printable",
        }
    }
}

const BLOCKED_ENCODINGS: [&str; 5] = ["%2f", "%5c", "%2e", "%25", "%00"];

/// Inspect a raw request path.
pub fn inspect(path: &str) -> Result<(), FirewallRejection> {
    if path.chars().any(|c| c.is_control()) {
        return Err(FirewallRejection::NonPrintable);
    }
    if path.contains(';') {
        return Err(FirewallRejection::Semicolon);
    }
    if path.contains('\\') {
        return Err(FirewallRejection::Backslash);
    }

    let lower = path.to_ascii_lowercase();
    if BLOCKED_ENCODINGS.iter().any(|enc| lower.contains(enc)) {
        return Err(FirewallRejection::EncodedCharacter);
    }

    if path.contains("//") {
        return Err(FirewallRejection::EmptySegment);
    }
    if path.split('/').any(|segment| segment == "." || segment == "..") {
        return Err(FirewallRejection::DotSegment);
    }

    Ok(())
}
