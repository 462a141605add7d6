//! Failure classification from free-form scraper error text.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static RE_TIMEOUT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)time[d ]?\s*out|deadline exceeded|\b408\b|\b504\b").unwrap());
static RE_RATE_LIMITED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)rate.?limit|too many requests|\b429\b|throttl").unwrap());
static RE_AUTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)unauthori[sz]ed|forbidden|\b401\b|\b403\b|auth(entication)? failed|invalid (api )?key")
        .unwrap()
});
static RE_NETWORK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)connection (refused|reset|closed)|dns|name resolution|unreachable|ssl|tls|\b50[023]\b|network",
    )
    .unwrap()
});
static RE_PARSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)pars(e|ing)|unexpected (token|element|format)|selector|xpath|decode|malformed|invalid (json|html|xml)")
        .unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    Network,
    Timeout,
    Parse,
    Auth,
    RateLimited,
    Other,
}

impl FailureCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCategory::Network => "network",
            FailureCategory::Timeout => "timeout",
            FailureCategory::Parse => "parse",
            FailureCategory::Auth => "auth",
            FailureCategory::RateLimited => "rate_limited",
            FailureCategory::Other => "other",
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First matching category wins. Timeouts are checked before network
/// errors.
pub fn classify(error: &str) -> FailureCategory {
    if RE_TIMEOUT.is_match(error) {
        FailureCategory::Timeout
    } else if RE_RATE_LIMITED.is_match(error) {
        FailureCategory::RateLimited
    } else if RE_AUTH.is_match(error) {
        FailureCategory::Auth
    } else if RE_NETWORK.is_match(error) {
        FailureCategory::Network
    } else if RE_PARSE.is_match(error) {
        FailureCategory::Parse
    } else {
        FailureCategory::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_timeout_before_network() {
        assert_eq!(
            classify("connection timed out after 30s"),
            FailureCategory::Timeout
        );
        assert_eq!(classify("Gateway returned 504"), FailureCategory::Timeout);
    }

    #[test]
    fn test_classify_network() {
        assert_eq!(
            classify("Connection refused (os error 111)"),
            FailureCategory::Network
        );
        assert_eq!(
            classify("DNS lookup failed for www.ola.org"),
            FailureCategory::Network
        );
        assert_eq!(classify("HTTP 503 Service Unavailable"), FailureCategory::Network);
    }

    #[test]
    fn test_classify_rate_limit_and_auth() {
        assert_eq!(classify("HTTP 429 Too Many Requests"), FailureCategory::RateLimited);
        assert_eq!(classify("403 Forbidden"), FailureCategory::Auth);
    }

    #[test]
    fn test_classify_parse() {
        assert_eq!(
            classify("Failed to parse bill table: selector 'tr.bill' matched nothing"),
            FailureCategory::Parse
        );
        assert_eq!(classify("malformed XML in hansard"), FailureCategory::Parse);
    }

    #[test]
    fn test_classify_other() {
        assert_eq!(classify("Run failed without an error message"), FailureCategory::Other);
        assert_eq!(classify(""), FailureCategory::Other);
    }
}
