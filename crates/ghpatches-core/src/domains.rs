//! Domain extraction from raw archive lines.
//!
//! Every hostname-like substring of a line is reduced to its registrable
//! domain (`api.github.com` becomes `github.com`) using the public suffix
//! list. Candidates whose suffix is not a known public suffix, such as
//! `package.json`, are dropped.
//!
//! The archive's own hosting domains appear in nearly every line through URL
//! fields, so [`DomainFilter`] removes them by default.

use crate::DEFAULT_DOMAIN_BLACKLIST;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Regex for hostname-like substrings: dot-separated labels ending in an
/// alphabetic or punycode TLD.
static DOMAIN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+(?:[a-z]{2,63}|xn--[a-z0-9-]{1,59})\b",
    )
    .expect("domain regex should compile")
});

/// Regex for JSON string escapes, which would otherwise glue their trailing
/// letter onto the next hostname (`\nexample.com`).
static JSON_ESCAPE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\(?:u[0-9a-fA-F]{4}|.)").expect("escape regex should compile")
});

/// Extract registrable domains from arbitrary text, in order of appearance.
///
/// Duplicates are kept; see [`DomainFilter`] for blacklisting and dedupe.
pub fn extract_domains(text: &str) -> Vec<String> {
    let text = JSON_ESCAPE_REGEX.replace_all(text, " ");

    DOMAIN_REGEX
        .find_iter(&text)
        .filter_map(|m| registrable_domain(m.as_str()))
        .collect()
}

/// Reduce a hostname to its registrable domain, if its suffix is known.
fn registrable_domain(host: &str) -> Option<String> {
    let host = host.to_ascii_lowercase();
    let domain = psl::domain(host.as_bytes())?;
    if !domain.suffix().is_known() {
        return None;
    }
    std::str::from_utf8(domain.as_bytes())
        .ok()
        .map(str::to_string)
}

/// Blacklist and dedupe policy applied to extracted domains.
#[derive(Debug, Clone)]
pub struct DomainFilter {
    blacklist: HashSet<String>,
    dedupe: bool,
}

impl Default for DomainFilter {
    fn default() -> Self {
        Self::new(DEFAULT_DOMAIN_BLACKLIST.iter().copied(), true)
    }
}

impl DomainFilter {
    /// Create a filter from a blacklist.
    ///
    /// When `dedupe` is set, only the first occurrence of each domain is kept.
    pub fn new<I, S>(blacklist: I, dedupe: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            blacklist: blacklist
                .into_iter()
                .map(|d| d.as_ref().to_ascii_lowercase())
                .collect(),
            dedupe,
        }
    }

    /// Whether `domain` is blacklisted, either exactly or as a subdomain.
    ///
    /// Matching on suffixes keeps hosts that are public suffixes in their own
    /// right (`avatars.githubusercontent.com`) covered by their parent entry.
    pub fn is_blacklisted(&self, domain: &str) -> bool {
        let mut rest = domain;
        loop {
            if self.blacklist.contains(rest) {
                return true;
            }
            match rest.split_once('.') {
                Some((_, parent)) => rest = parent,
                None => return false,
            }
        }
    }

    /// Remove blacklisted domains, preserving order.
    pub fn filter(&self, domains: Vec<String>) -> Vec<String> {
        let mut seen = HashSet::new();
        domains
            .into_iter()
            .filter(|d| !self.is_blacklisted(d))
            .filter(|d| !self.dedupe || seen.insert(d.clone()))
            .collect()
    }

    /// Extract and filter domains from a raw line.
    pub fn extract(&self, line: &str) -> Vec<String> {
        self.filter(extract_domains(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Extraction
    // =========================================================================

    #[test]
    fn test_extract_reduces_to_registrable_domain() {
        let domains = extract_domains("see https://docs.example.org/path and api.github.com");
        assert_eq!(domains, vec!["example.org", "github.com"]);
    }

    #[test]
    fn test_extract_keeps_multi_label_suffixes() {
        let domains = extract_domains("mirror at www.example.co.uk");
        assert_eq!(domains, vec!["example.co.uk"]);
    }

    #[test]
    fn test_extract_skips_unknown_suffixes() {
        let domains = extract_domains("edited package.json and src/index.js");
        assert!(domains.is_empty());
    }

    #[test]
    fn test_extract_lowercases() {
        assert_eq!(extract_domains("Visit WWW.Example.COM"), vec!["example.com"]);
    }

    #[test]
    fn test_extract_ignores_json_escapes() {
        let domains = extract_domains(r#"{"message":"fix\nexample.net> ok"}"#);
        assert_eq!(domains, vec!["example.net"]);
    }

    #[test]
    fn test_extract_from_email_address() {
        let domains = extract_domains("Signed-off-by: Dev <dev@mail.example.io>");
        assert_eq!(domains, vec!["example.io"]);
    }

    #[test]
    fn test_extract_keeps_duplicates() {
        let domains = extract_domains("a.example.com b.example.com");
        assert_eq!(domains, vec!["example.com", "example.com"]);
    }

    // =========================================================================
    // Filtering
    // =========================================================================

    #[test]
    fn test_default_filter_removes_hosting_domains() {
        let filter = DomainFilter::default();
        let line = "https://github.com/a https://avatars.githubusercontent.com/u/1 \
                    githubusercontent.com example.org";
        assert_eq!(filter.extract(line), vec!["example.org"]);
    }

    #[test]
    fn test_default_filter_removes_gravatar_and_cdn() {
        let filter = DomainFilter::default();
        let line = "secure.gravatar.com a248.e.akamai.net foo.github.dev rust-lang.org";
        assert_eq!(filter.extract(line), vec!["rust-lang.org"]);
    }

    #[test]
    fn test_filter_dedupes_in_order() {
        let filter = DomainFilter::default();
        let domains = vec![
            "b.org".to_string(),
            "a.org".to_string(),
            "b.org".to_string(),
        ];
        assert_eq!(filter.filter(domains), vec!["b.org", "a.org"]);
    }

    #[test]
    fn test_filter_without_dedupe_keeps_repeats() {
        let filter = DomainFilter::new(["github.com"], false);
        let domains = vec![
            "b.org".to_string(),
            "github.com".to_string(),
            "b.org".to_string(),
        ];
        assert_eq!(filter.filter(domains), vec!["b.org", "b.org"]);
    }

    #[test]
    fn test_blacklist_covers_subdomains() {
        let filter = DomainFilter::default();
        assert!(filter.is_blacklisted("githubusercontent.com"));
        assert!(filter.is_blacklisted("avatars.githubusercontent.com"));
        assert!(!filter.is_blacklisted("notgithub.com"));
        assert!(!filter.is_blacklisted("com"));
    }

    #[test]
    fn test_custom_blacklist_is_case_insensitive() {
        let filter = DomainFilter::new(["Example.ORG"], true);
        assert!(filter.is_blacklisted("example.org"));
        assert!(filter.extract("x.example.org").is_empty());
    }
}
