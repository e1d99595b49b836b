//! Ant-style path patterns.
//!
//! # Responsibilities
//! - Parse patterns such as `/api/**`, `/*.js`, `/users/{id}`
//! - Match request paths segment by segment
//! - Answer "does this pattern already cover that one" for shadow detection
//!
//! # Design Decisions
//! - Case-sensitive, no regex
//! - `**` is only legal as a whole segment and spans zero or more segments
//! - A trailing slash is significant: `/a/` has an extra empty segment

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Errors raised while parsing a pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("pattern `{0}` must start with '/'")]
    NotAbsolute(String),

    #[error("pattern `{pattern}`: `**` must be a whole segment")]
    MisplacedDoubleWildcard { pattern: String },

    #[error("pattern `{pattern}`: unsupported variable segment `{segment}`")]
    BadVariable { pattern: String, segment: String },
}

/// One character-level element of a wildcard segment.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Glob {
    Char(char),
    One,
    Many,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// `**`
    AnyDepth,
    /// `{name}`: exactly one non-empty segment.
    Variable,
    Literal(String),
    Wildcard(Vec<Glob>),
}

impl Segment {
    fn parse(pattern: &str, raw: &str) -> Result<Self, PatternError> {
        if raw == "**" {
            return Ok(Segment::AnyDepth);
        }
        if raw.contains("**") {
            return Err(PatternError::MisplacedDoubleWildcard {
                pattern: pattern.to_string(),
            });
        }
        if raw.contains('{') || raw.contains('}') {
            let is_plain_variable = raw.starts_with('{')
                && raw.ends_with('}')
                && raw.len() > 2
                && raw[1..raw.len() - 1]
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
            if !is_plain_variable {
                return Err(PatternError::BadVariable {
                    pattern: pattern.to_string(),
                    segment: raw.to_string(),
                });
            }
            return Ok(Segment::Variable);
        }
        if raw.contains('*') || raw.contains('?') {
            let globs = raw
                .chars()
                .map(|c| match c {
                    '*' => Glob::Many,
                    '?' => Glob::One,
                    other => Glob::Char(other),
                })
                .collect();
            return Ok(Segment::Wildcard(globs));
        }
        Ok(Segment::Literal(raw.to_string()))
    }

    fn is_literal(&self) -> bool {
        matches!(self, Segment::Literal(_))
    }

    fn matches(&self, part: &str) -> bool {
        match self {
            Segment::AnyDepth => true,
            Segment::Variable => !part.is_empty(),
            Segment::Literal(text) => text == part,
            Segment::Wildcard(globs) => {
                let chars: Vec<char> = part.chars().collect();
                wildcard_match(globs, &chars)
            }
        }
    }
}

/// Greedy wildcard match with single-star backtracking.
fn wildcard_match(pattern: &[Glob], text: &[char]) -> bool {
    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some(Glob::Many) => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(Glob::One) => {
                p += 1;
                t += 1;
            }
            Some(Glob::Char(c)) if *c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((star, consumed)) => {
                    p = star + 1;
                    t = consumed + 1;
                    backtrack = Some((star, consumed + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|g| *g == Glob::Many)
}

fn match_segments(pattern: &[Segment], path: &[&str]) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((Segment::AnyDepth, rest)) => {
            (0..=path.len()).any(|skip| match_segments(rest, &path[skip..]))
        }
        Some((segment, rest)) => match path.split_first() {
            Some((head, tail)) => segment.matches(head) && match_segments(rest, tail),
            None => false,
        },
    }
}

fn split_path(path: &str) -> Option<Vec<&str>> {
    path.strip_prefix('/').map(|rest| rest.split('/').collect())
}

/// A compiled path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Parse a pattern. It must start with `/`.
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        let parts = split_path(raw).ok_or_else(|| PatternError::NotAbsolute(raw.to_string()))?;
        let segments = parts
            .into_iter()
            .map(|part| Segment::parse(raw, part))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// The pattern as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// True when the pattern contains no wildcard or variable.
    pub fn is_literal(&self) -> bool {
        self.segments.iter().all(Segment::is_literal)
    }

    /// Returns true if `path` matches this pattern.
    pub fn matches(&self, path: &str) -> bool {
        match split_path(path) {
            Some(parts) => match_segments(&self.segments, &parts),
            None => false,
        }
    }

    /// Returns true if every path matched by `other` is also matched by `self`.
    ///
    /// Conservative: only literal patterns and `<literal prefix>/**` coverage
    /// are recognised, so `false` means "not provably covered".
    pub fn covers(&self, other: &PathPattern) -> bool {
        if other.is_literal() {
            return self.matches(&other.raw);
        }
        match self.segments.split_last() {
            Some((Segment::AnyDepth, prefix)) if prefix.iter().all(Segment::is_literal) => {
                prefix.len() <= other.segments.len()
                    && prefix.iter().zip(&other.segments).all(|(a, b)| a == b)
            }
            _ => self == other,
        }
    }
}

impl FromStr for PathPattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(raw: &str) -> PathPattern {
        PathPattern::parse(raw).unwrap()
    }

    #[test]
    fn test_double_wildcard_matches_any_depth() {
        let pattern = p("/app/**");
        assert!(pattern.matches("/app"));
        assert!(pattern.matches("/app/"));
        assert!(pattern.matches("/app/main.js"));
        assert!(pattern.matches("/app/a/b/c"));
        assert!(!pattern.matches("/application"));
        assert!(!pattern.matches("/i18n/en.json"));
    }

    #[test]
    fn test_single_wildcard_stays_in_segment() {
        let pattern = p("/*.js");
        assert!(pattern.matches("/main.js"));
        assert!(pattern.matches("/.js"));
        assert!(!pattern.matches("/app/main.js"));
        assert!(!pattern.matches("/main.jsx"));
    }

    #[test]
    fn test_question_mark_and_variable() {
        assert!(p("/v?/items").matches("/v1/items"));
        assert!(!p("/v?/items").matches("/v10/items"));

        let var = p("/users/{id}/profile");
        assert!(var.matches("/users/42/profile"));
        assert!(!var.matches("/users//profile"));
        assert!(!var.matches("/users/42/x/profile"));
    }

    #[test]
    fn test_literal_is_exact_and_case_sensitive() {
        let pattern = p("/management/health");
        assert!(pattern.matches("/management/health"));
        assert!(!pattern.matches("/management/health/"));
        assert!(!pattern.matches("/Management/health"));
        assert!(!pattern.matches("management/health"));
    }

    #[test]
    fn test_wildcard_backtracking() {
        let pattern = p("/*-min.*");
        assert!(pattern.matches("/vendor-a-min.js"));
        assert!(!pattern.matches("/vendor.js"));
    }

    #[test]
    fn test_rejects_bad_patterns() {
        assert_eq!(
            PathPattern::parse("api/**"),
            Err(PatternError::NotAbsolute("api/**".into()))
        );
        assert!(matches!(
            PathPattern::parse("/api/a**"),
            Err(PatternError::MisplacedDoubleWildcard { .. })
        ));
        assert!(matches!(
            PathPattern::parse("/api/{id:\\d+}"),
            Err(PatternError::BadVariable { .. })
        ));
    }

    #[test]
    fn test_covers() {
        assert!(p("/api/**").covers(&p("/api/register")));
        assert!(p("/api/**").covers(&p("/api/admin/**")));
        assert!(p("/**").covers(&p("/*.js")));
        assert!(!p("/api/admin/**").covers(&p("/api/**")));
        assert!(!p("/management/health").covers(&p("/management/health/**")));
        assert!(!p("/*.js").covers(&p("/*.css")));
    }
}
