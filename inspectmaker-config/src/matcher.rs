//! URL eligibility for scripts.
//!
//! Patterns are plain text with `*` as a multi-character wildcard and `.`
//! taken literally. By default the translated expression is searched anywhere
//! in the URL, so `a.com` also matches `xa.com`; [`MatchMode::Anchored`]
//! requires the whole URL to match instead.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::script::UrlPattern;

/// How a translated pattern is tested against a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Unanchored search anywhere in the URL.
    #[default]
    Substring,
    /// The pattern must cover the entire URL.
    Anchored,
}

/// Translate a pattern into regex source: escape `.` and expand `*` into `.*`.
///
/// Other characters are passed through, so a pattern may still use regex
/// syntax such as `(a|b)`.
pub fn pattern_to_regex(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        match ch {
            '.' => out.push_str("\\."),
            '*' => out.push_str(".*"),
            other => out.push(other),
        }
    }
    out
}

/// Whether `url` is eligible under `patterns`.
///
/// An empty list matches every URL. Disabled entries never contribute. A
/// pattern whose translation is not a valid expression is skipped.
pub fn url_matches(url: &str, patterns: &[UrlPattern], mode: MatchMode) -> bool {
    if patterns.is_empty() {
        return true;
    }

    patterns
        .iter()
        .filter(|pattern| pattern.enabled)
        .any(|pattern| {
            let source = match mode {
                MatchMode::Substring => pattern_to_regex(&pattern.text),
                MatchMode::Anchored => format!("^(?:{})$", pattern_to_regex(&pattern.text)),
            };
            match Regex::new(&source) {
                Ok(re) => re.is_match(url),
                Err(e) => {
                    log::warn!("Ignoring invalid URL pattern {:?}: {}", pattern.text, e);
                    false
                }
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(texts: &[&str]) -> Vec<UrlPattern> {
        texts.iter().map(|t| UrlPattern::new(*t)).collect()
    }

    #[test]
    fn test_empty_patterns_match_everything() {
        assert!(url_matches("https://example.org/", &[], MatchMode::Substring));
        assert!(url_matches("", &[], MatchMode::Anchored));
    }

    #[test]
    fn test_wildcard_subdomain() {
        let p = patterns(&["*.example.com/*"]);
        assert!(url_matches(
            "https://shop.example.com/cart",
            &p,
            MatchMode::Substring
        ));
        assert!(!url_matches("https://example.org", &p, MatchMode::Substring));
    }

    #[test]
    fn test_dot_is_literal() {
        let p = patterns(&["a.com"]);
        assert!(!url_matches("https://abcom/", &p, MatchMode::Substring));
        assert!(url_matches("https://a.com/", &p, MatchMode::Substring));
    }

    #[test]
    fn test_substring_search_is_unanchored() {
        let p = patterns(&["a.com"]);
        assert!(url_matches("https://xa.com/page", &p, MatchMode::Substring));
        assert!(!url_matches("https://xa.com/page", &p, MatchMode::Anchored));
        let p = patterns(&["https://a.com/*"]);
        assert!(url_matches("https://a.com/page", &p, MatchMode::Anchored));
    }

    #[test]
    fn test_disabled_patterns_never_match() {
        let p = vec![UrlPattern::disabled("*")];
        assert!(!url_matches("https://anything/", &p, MatchMode::Substring));

        let p = vec![UrlPattern::disabled("*"), UrlPattern::new("shop")];
        assert!(url_matches("https://shop.test/", &p, MatchMode::Substring));
        assert!(!url_matches("https://blog.test/", &p, MatchMode::Substring));
    }

    #[test]
    fn test_invalid_pattern_is_skipped() {
        let p = patterns(&["(unclosed", "blog"]);
        assert!(!url_matches("https://shop.test/(unclosed", &p, MatchMode::Substring));
        assert!(url_matches("https://blog.test/", &p, MatchMode::Substring));
    }

    #[test]
    fn test_pattern_translation() {
        assert_eq!(pattern_to_regex("*.example.com/*"), ".*\\.example\\.com/.*");
    }
}
