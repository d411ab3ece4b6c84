//! # Cache Key Generator
//!
//! Derives cache keys from a request path plus its tenant selector, and builds the glob
//! patterns used to invalidate them.
//!
//! ## Key Layout
//! ```text
//! <prefix><route-path>?<canonical-query>-<selector>
//! cache:/api/categories/public?restaurant_id=7-7
//! ```
//! - the query string is re-encoded with its pairs sorted, so parameter order never splits a
//!   logical response across two keys
//! - the `?` separator is always present, which lets a family pattern stop exactly at the end
//!   of the route path (`/api/menu/public` never matches `/api/menu/publications`)
//! - the selector is percent-encoded *including* `-`, so it is always the text after the last
//!   `-` in the key; a pattern ending in `-7` can never match tenant `17` or `70`
//! - an integer selector is written in its canonical decimal form, both in the query and in
//!   the suffix, so `07`, `%2B7` and `7` (which handlers all parse as tenant 7) share one key
//!   and the `-7` suffix a write for tenant 7 invalidates

use serde::Serialize;
use std::fmt;
use url::form_urlencoded;

/// A fully derived cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A Redis glob pattern selecting a set of cache keys
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct InvalidationPattern(String);

impl InvalidationPattern {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InvalidationPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derives keys and invalidation patterns under one namespace
#[derive(Debug, Clone)]
pub struct KeyGenerator {
    prefix: String,
    selector_param: String,
}

impl KeyGenerator {
    /// Create a generator for `prefix` (e.g. `cache:`) scoping responses by `selector_param`
    pub fn new(prefix: impl Into<String>, selector_param: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            selector_param: selector_param.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn selector_param(&self) -> &str {
        &self.selector_param
    }

    /// Derive the key for `path` (optionally carrying a query string) and `selector`.
    ///
    /// An absent selector is encoded as the empty string.
    pub fn derive_key(&self, path: &str, selector: Option<&str>) -> CacheKey {
        let (route_path, query) = match path.split_once('?') {
            Some((route_path, query)) => (route_path, query),
            None => (path, ""),
        };

        CacheKey(format!(
            "{}{}?{}-{}",
            self.prefix,
            route_path,
            canonical_query(query, &self.selector_param),
            escape_selector(selector.unwrap_or_default()),
        ))
    }

    /// Derive the key for a request target, reading the selector from its query string
    pub fn key_for_request(&self, path: &str, query: Option<&str>) -> CacheKey {
        let selector = self.selector_from_query(query);
        match query {
            Some(query) => self.derive_key(&format!("{}?{}", path, query), selector.as_deref()),
            None => self.derive_key(path, selector.as_deref()),
        }
    }

    /// First value of the selector parameter in `query`, if any
    pub fn selector_from_query(&self, query: Option<&str>) -> Option<String> {
        let query = query?;
        form_urlencoded::parse(query.as_bytes())
            .find(|(name, _)| name == self.selector_param.as_str())
            .map(|(_, value)| value.into_owned())
    }

    /// Every cached view of the route, whatever its query or selector
    pub fn family_pattern(&self, route_path: &str) -> InvalidationPattern {
        InvalidationPattern(format!(
            "{}{}\\?*",
            escape_glob(&self.prefix),
            escape_glob(route_path)
        ))
    }

    /// Cached views of the route scoped to exactly `selector`
    pub fn selector_pattern(&self, route_path: &str, selector: &str) -> InvalidationPattern {
        InvalidationPattern(format!(
            "{}{}\\?*-{}",
            escape_glob(&self.prefix),
            escape_glob(route_path),
            escape_selector(selector)
        ))
    }

    /// Every key that starts with `<prefix><key_prefix>`
    pub fn prefix_pattern(&self, key_prefix: &str) -> InvalidationPattern {
        InvalidationPattern(format!(
            "{}{}*",
            escape_glob(&self.prefix),
            escape_glob(key_prefix)
        ))
    }
}

/// Sort the pairs of a query string and re-encode them, normalizing selector values
fn canonical_query(query: &str, selector_param: &str) -> String {
    if query.is_empty() {
        return String::new();
    }

    let mut pairs: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
        .map(|(name, value)| {
            let value = if name == selector_param {
                canonical_selector(&value)
            } else {
                value.into_owned()
            };
            (name.into_owned(), value)
        })
        .collect();
    pairs.sort();

    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

/// Canonical form of a selector: integers in plain decimal, anything else verbatim
pub fn canonical_selector(selector: &str) -> String {
    match selector.parse::<i64>() {
        Ok(id) => id.to_string(),
        Err(_) => selector.to_string(),
    }
}

/// Canonicalize and percent-encode a selector so it contains neither `-` nor glob
/// metacharacters
fn escape_selector(selector: &str) -> String {
    urlencoding::encode(&canonical_selector(selector)).replace('-', "%2D")
}

/// Backslash-escape Redis glob metacharacters
fn escape_glob(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caching::stores::glob_match;

    fn generator() -> KeyGenerator {
        KeyGenerator::new("cache:", "restaurant_id")
    }

    #[test]
    fn test_key_layout() {
        let keys = generator();
        let key = keys.key_for_request("/api/categories/public", Some("restaurant_id=7"));
        assert_eq!(key.as_str(), "cache:/api/categories/public?restaurant_id=7-7");

        let key = keys.key_for_request("/api/restaurants/by-slug/cafe", None);
        assert_eq!(key.as_str(), "cache:/api/restaurants/by-slug/cafe?-");
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let keys = generator();
        let first = keys.derive_key("/api/menu/public?restaurant_id=3", Some("3"));
        let second = keys.derive_key("/api/menu/public?restaurant_id=3", Some("3"));
        assert_eq!(first, second);
    }

    #[test]
    fn test_query_order_does_not_matter() {
        let keys = generator();
        let a = keys.key_for_request("/api/menu/public", Some("restaurant_id=3&lang=tr"));
        let b = keys.key_for_request("/api/menu/public", Some("lang=tr&restaurant_id=3"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_selectors_never_collide() {
        let keys = generator();
        let selectors = ["", "7", "70", "17", "7-0", "7%2D0", "*", "a b"];
        let derived: Vec<CacheKey> = selectors
            .iter()
            .map(|s| keys.derive_key("/api/menu/public", Some(s)))
            .collect();

        for (i, a) in derived.iter().enumerate() {
            for b in derived.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_integer_selectors_are_canonical() {
        let keys = generator();
        let pattern = keys.selector_pattern("/api/categories/public", "7");

        for query in ["restaurant_id=07", "restaurant_id=%2B7", "restaurant_id=007&lang=en"] {
            let key = keys.key_for_request("/api/categories/public", Some(query));
            assert!(glob_match(pattern.as_str(), key.as_str()), "{}", key);
        }
        assert_eq!(
            keys.key_for_request("/api/categories/public", Some("restaurant_id=07")),
            keys.key_for_request("/api/categories/public", Some("restaurant_id=7"))
        );

        // the pattern side is normalized the same way
        let padded = keys.selector_pattern("/api/categories/public", "07");
        assert_eq!(padded, pattern);

        assert_eq!(canonical_selector("-0"), "0");
        assert_eq!(canonical_selector("seven"), "seven");
        assert_eq!(canonical_selector(" 7"), " 7");
    }

    #[test]
    fn test_absent_selector_equals_empty() {
        let keys = generator();
        assert_eq!(
            keys.derive_key("/api/menu/public", None),
            keys.derive_key("/api/menu/public", Some(""))
        );
    }

    #[test]
    fn test_selector_pattern_is_exact() {
        let keys = generator();
        let pattern = keys.selector_pattern("/api/categories/public", "7");

        let own = keys.key_for_request("/api/categories/public", Some("restaurant_id=7"));
        let with_extra = keys.key_for_request("/api/categories/public", Some("restaurant_id=7&x=1"));
        let other = keys.key_for_request("/api/categories/public", Some("restaurant_id=70"));
        let suffix = keys.key_for_request("/api/categories/public", Some("restaurant_id=17"));
        let other_family = keys.key_for_request("/api/menu/public", Some("restaurant_id=7"));

        assert!(glob_match(pattern.as_str(), own.as_str()));
        assert!(glob_match(pattern.as_str(), with_extra.as_str()));
        assert!(!glob_match(pattern.as_str(), other.as_str()));
        assert!(!glob_match(pattern.as_str(), suffix.as_str()));
        assert!(!glob_match(pattern.as_str(), other_family.as_str()));
    }

    #[test]
    fn test_hyphenated_selector_pattern() {
        let keys = generator();
        let pattern = keys.selector_pattern("/api/menu/public", "0");
        let hyphenated = keys.key_for_request("/api/menu/public", Some("restaurant_id=7-0"));
        assert!(!glob_match(pattern.as_str(), hyphenated.as_str()));

        let exact = keys.selector_pattern("/api/menu/public", "7-0");
        assert!(glob_match(exact.as_str(), hyphenated.as_str()));
    }

    #[test]
    fn test_family_pattern_stops_at_route_boundary() {
        let keys = generator();
        let pattern = keys.family_pattern("/api/menu/public");

        let a = keys.key_for_request("/api/menu/public", Some("restaurant_id=1"));
        let b = keys.key_for_request("/api/menu/public", None);
        let longer = keys.key_for_request("/api/menu/publications", Some("restaurant_id=1"));

        assert!(glob_match(pattern.as_str(), a.as_str()));
        assert!(glob_match(pattern.as_str(), b.as_str()));
        assert!(!glob_match(pattern.as_str(), longer.as_str()));
    }

    #[test]
    fn test_prefix_pattern_escapes_glob_characters() {
        let keys = generator();
        let pattern = keys.prefix_pattern("/api/categories/public?restaurant_id=7");
        assert_eq!(
            pattern.as_str(),
            "cache:/api/categories/public\\?restaurant_id=7*"
        );

        let key = keys.key_for_request("/api/categories/public", Some("restaurant_id=7"));
        assert!(glob_match(pattern.as_str(), key.as_str()));
    }
}
