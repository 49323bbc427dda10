//! Route pattern parsing.
//!
//! # Responsibilities
//! - Split a route path into literal, parameter and wildcard segments
//! - Reject malformed patterns at registration time
//!
//! # Design Decisions
//! - `:name` binds exactly one path component (no `/`)
//! - `*` or `*name` binds the remainder of the path and must come last
//! - Parsed once when the route is registered, immutable afterwards

use std::fmt;
use std::str::FromStr;

use crate::error::RegistrationError;

/// One piece of a parsed pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Matched byte-for-byte.
    Literal(String),
    /// Matches one path component and binds it.
    Param(String),
    /// Matches the rest of the path, `/` included.
    Wildcard(Option<String>),
}

/// A compiled route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    source: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Parse `source` into segments.
    pub fn parse(source: &str) -> Result<Self, RegistrationError> {
        let mut segments = Vec::new();
        let mut names: Vec<&str> = Vec::new();
        let mut rest = source;

        loop {
            let Some(at) = rest.find([':', '*']) else {
                if !rest.is_empty() {
                    segments.push(Segment::Literal(rest.to_string()));
                }
                break;
            };
            if at > 0 {
                segments.push(Segment::Literal(rest[..at].to_string()));
            }

            let marker = &rest[at..at + 1];
            let after = &rest[at + 1..];
            let name_len = after.find(|c: char| !is_name_char(c)).unwrap_or(after.len());
            let (name, tail) = after.split_at(name_len);

            if !name.is_empty() {
                if names.contains(&name) {
                    return Err(RegistrationError::RepeatedParam {
                        pattern: source.to_string(),
                        name: name.to_string(),
                    });
                }
                names.push(name);
            }

            if marker == "*" {
                if !tail.is_empty() {
                    return Err(RegistrationError::InteriorWildcard {
                        pattern: source.to_string(),
                    });
                }
                segments.push(Segment::Wildcard(
                    (!name.is_empty()).then(|| name.to_string()),
                ));
                break;
            }

            if name.is_empty() {
                return Err(RegistrationError::EmptyParamName {
                    pattern: source.to_string(),
                });
            }
            if !(tail.is_empty() || tail.starts_with('/')) {
                return Err(RegistrationError::UnterminatedParam {
                    pattern: source.to_string(),
                    name: name.to_string(),
                });
            }
            segments.push(Segment::Param(name.to_string()));
            rest = tail;
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// The text the pattern was parsed from.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Names bound by this pattern, in order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Param(name) => Some(name.as_str()),
            Segment::Wildcard(name) => name.as_deref(),
            Segment::Literal(_) => None,
        })
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

impl FromStr for PathPattern {
    type Err = RegistrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Anything a route can be registered with: pattern text or a pattern
/// compiled ahead of time.
pub trait IntoPattern {
    fn into_pattern(self) -> Result<PathPattern, RegistrationError>;
}

impl IntoPattern for PathPattern {
    fn into_pattern(self) -> Result<PathPattern, RegistrationError> {
        Ok(self)
    }
}

impl IntoPattern for &str {
    fn into_pattern(self) -> Result<PathPattern, RegistrationError> {
        PathPattern::parse(self)
    }
}

impl IntoPattern for String {
    fn into_pattern(self) -> Result<PathPattern, RegistrationError> {
        PathPattern::parse(&self)
    }
}

impl IntoPattern for &String {
    fn into_pattern(self) -> Result<PathPattern, RegistrationError> {
        PathPattern::parse(self)
    }
}
