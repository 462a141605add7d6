//! Scope patterns selecting jobs for a run.
//!
//! A scope is a colon-separated pattern matched segment by segment against
//! job ids. `*` matches any single segment; a trailing `*` also absorbs any
//! remaining segments, so `federal:*` selects every federal job and `*:*`
//! selects everything. Other segments may use glob wildcards (`on*`,
//! `bill?`) that match within the segment.

use std::fmt;
use std::str::FromStr;

use glob::Pattern;

use crate::error::ControlError;

#[derive(Debug, Clone)]
enum Segment {
    Any,
    Literal(String),
    Glob(Pattern),
}

impl Segment {
    fn parse(raw: &str) -> Result<Self, ControlError> {
        if raw == "*" {
            return Ok(Segment::Any);
        }
        if raw.contains(['*', '?', '[']) {
            return Pattern::new(raw).map(Segment::Glob).map_err(|e| {
                ControlError::Validation(format!("Invalid scope segment '{}': {}", raw, e))
            });
        }
        Ok(Segment::Literal(raw.to_string()))
    }

    fn matches(&self, value: &str) -> bool {
        match self {
            Segment::Any => true,
            Segment::Literal(lit) => lit == value,
            Segment::Glob(pattern) => pattern.matches(value),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Scope {
    raw: String,
    segments: Vec<Segment>,
}

impl Scope {
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, job_id: &str) -> bool {
        let parts: Vec<&str> = job_id.split(':').collect();
        let n = self.segments.len();

        if n > parts.len() {
            return false;
        }
        if n < parts.len() && !matches!(self.segments.last(), Some(Segment::Any)) {
            return false;
        }

        self.segments
            .iter()
            .zip(parts.iter())
            .all(|(segment, part)| segment.matches(part))
    }
}

impl FromStr for Scope {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        if raw.is_empty() {
            return Err(ControlError::Validation("Scope must not be empty".to_string()));
        }
        if raw.chars().any(char::is_whitespace) {
            return Err(ControlError::Validation(format!(
                "Scope '{}' must not contain whitespace",
                raw
            )));
        }

        let segments = raw
            .split(':')
            .map(|seg| {
                if seg.is_empty() {
                    Err(ControlError::Validation(format!(
                        "Scope '{}' has an empty segment",
                        raw
                    )))
                } else {
                    Segment::parse(seg)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(s: &str) -> Scope {
        s.parse().unwrap()
    }

    #[test]
    fn test_exact_match() {
        let s = scope("federal:bills:daily");
        assert!(s.matches("federal:bills:daily"));
        assert!(!s.matches("federal:bills:bootstrap"));
        assert!(!s.matches("federal:bills"));
    }

    #[test]
    fn test_star_matches_single_segment() {
        let s = scope("*:bills:daily");
        assert!(s.matches("federal:bills:daily"));
        assert!(s.matches("on:bills:daily"));
        assert!(!s.matches("on:votes:daily"));
    }

    #[test]
    fn test_trailing_star_absorbs_remaining_segments() {
        let s = scope("federal:*");
        assert!(s.matches("federal:bills:daily"));
        assert!(s.matches("federal:votes"));
        assert!(!s.matches("on:bills:daily"));

        let all = scope("*:*");
        assert!(all.matches("federal:bills:daily"));
        assert!(all.matches("a:b"));
        assert!(!all.matches("single"));
    }

    #[test]
    fn test_longer_scope_never_matches() {
        assert!(!scope("federal:bills:daily:extra").matches("federal:bills:daily"));
    }

    #[test]
    fn test_non_trailing_literal_does_not_absorb() {
        assert!(!scope("federal:bills").matches("federal:bills:daily"));
    }

    #[test]
    fn test_glob_within_segment() {
        let s = scope("on*:bills:*");
        assert!(s.matches("on:bills:daily"));
        assert!(s.matches("ontario:bills:daily"));
        assert!(!s.matches("qc:bills:daily"));
    }

    #[test]
    fn test_invalid_scopes() {
        for bad in ["", "   ", "federal::daily", ":bills", "federal:", "fed eral:*", "on[:*"] {
            let err = bad.parse::<Scope>().unwrap_err();
            assert!(matches!(err, ControlError::Validation(_)), "{:?}", bad);
        }
    }
}
