//! Path privilege policy.
//!
//! Every target carries a [`Privileges`] block: a default level plus an
//! ordered list of [`PathRule`]s. Resolution is first-match-wins over the
//! rules whose method equals the request method; when nothing matches the
//! default applies.
//!
//! Regex rules are compiled lazily on first evaluation and the result (success
//! or failure) is memoized in the rule. A pattern that fails to compile makes
//! every path it is evaluated against resolve to [`MAX_PRIVILEGE`], so a typo
//! in the configuration locks a path down instead of opening it.

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::error::CoreError;

/// Privilege level returned for paths guarded by a malformed regex rule.
pub const MAX_PRIVILEGE: u32 = u32::MAX;

/// Access privileges of a target.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Privileges {
    /// Level required when no rule matches. `0` means public.
    #[serde(default)]
    pub default: u32,

    /// Ordered path rules. The first matching rule wins.
    #[serde(default)]
    pub paths: Vec<PathRule>,
}

impl Privileges {
    /// Create a policy with the given default level and no rules.
    #[must_use]
    pub const fn with_default(default: u32) -> Self {
        Self {
            default,
            paths: Vec::new(),
        }
    }

    /// Append a rule, keeping evaluation order.
    #[must_use]
    pub fn rule(mut self, rule: PathRule) -> Self {
        self.paths.push(rule);
        self
    }

    /// Resolve the privilege level required to call `method` on `path`.
    #[must_use]
    pub fn resolve(&self, path: &str, method: &str) -> u32 {
        for rule in self.paths.iter().filter(|rule| rule.method == method) {
            match rule.matches(path) {
                Ok(true) => return rule.privileges,
                Ok(false) => {}
                Err(e) => {
                    tracing::debug!(
                        path = %path,
                        method = %method,
                        error = %e,
                        "Path guarded by invalid regex rule, requiring maximum privileges"
                    );
                    return MAX_PRIVILEGE;
                }
            }
        }
        self.default
    }
}

/// How a rule selects paths.
#[derive(Debug, Clone)]
pub enum PathMatcher {
    /// Matches a path equal to the given string.
    Exact(String),
    /// Matches a path containing a match of the pattern.
    Regex(RegexMatcher),
}

/// A regex pattern with its compile-once memo.
#[derive(Debug, Clone)]
pub struct RegexMatcher {
    pattern: String,
    compiled: OnceLock<Result<Regex, regex::Error>>,
}

impl RegexMatcher {
    fn new(pattern: String) -> Self {
        Self {
            pattern,
            compiled: OnceLock::new(),
        }
    }

    /// The source pattern.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Whether compilation has already been attempted.
    #[must_use]
    pub fn is_compiled(&self) -> bool {
        self.compiled.get().is_some()
    }

    /// The compiled regex, compiling it on first use.
    ///
    /// # Errors
    ///
    /// Returns the memoized compile error if the pattern is malformed.
    pub fn regex(&self) -> Result<&Regex, &regex::Error> {
        self.compiled
            .get_or_init(|| {
                let compiled = Regex::new(&self.pattern);
                if let Err(e) = &compiled {
                    tracing::error!(
                        pattern = %self.pattern,
                        error = %e,
                        "Error parsing regex for path rule"
                    );
                }
                compiled
            })
            .as_ref()
    }
}

/// A single privilege rule for a path and method.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawPathRule")]
pub struct PathRule {
    method: String,
    matcher: PathMatcher,
    privileges: u32,
}

impl PathRule {
    /// A rule matching `path` exactly.
    #[must_use]
    pub fn exact(method: impl Into<String>, path: impl Into<String>, privileges: u32) -> Self {
        Self {
            method: method.into(),
            matcher: PathMatcher::Exact(path.into()),
            privileges,
        }
    }

    /// A rule matching paths against `pattern`.
    #[must_use]
    pub fn regex(method: impl Into<String>, pattern: impl Into<String>, privileges: u32) -> Self {
        Self {
            method: method.into(),
            matcher: PathMatcher::Regex(RegexMatcher::new(pattern.into())),
            privileges,
        }
    }

    /// The HTTP method this rule applies to.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The path matcher.
    #[must_use]
    pub const fn matcher(&self) -> &PathMatcher {
        &self.matcher
    }

    /// The level required by this rule.
    #[must_use]
    pub const fn privileges(&self) -> u32 {
        self.privileges
    }

    /// Check whether this rule's matcher accepts `path`. The method is not
    /// considered here.
    ///
    /// # Errors
    ///
    /// Returns an error if the rule's regex does not compile.
    pub fn matches(&self, path: &str) -> Result<bool, &regex::Error> {
        match &self.matcher {
            PathMatcher::Exact(exact) => Ok(exact == path),
            PathMatcher::Regex(matcher) => matcher.regex().map(|re| re.is_match(path)),
        }
    }
}

/// Path rule as written in configuration.
#[derive(Debug, Deserialize)]
struct RawPathRule {
    #[serde(default)]
    exact: Option<String>,
    #[serde(default)]
    regex: Option<String>,
    #[serde(default)]
    method: String,
    #[serde(default)]
    privileges: u32,
}

impl TryFrom<RawPathRule> for PathRule {
    type Error = CoreError;

    fn try_from(raw: RawPathRule) -> Result<Self, Self::Error> {
        if raw.method.is_empty() {
            return Err(CoreError::MissingMethod);
        }
        let exact = raw.exact.filter(|s| !s.is_empty());
        let regex = raw.regex.filter(|s| !s.is_empty());
        match (exact, regex) {
            (Some(path), None) => Ok(Self::exact(raw.method, path, raw.privileges)),
            (None, Some(pattern)) => Ok(Self::regex(raw.method, pattern, raw.privileges)),
            (Some(_), Some(_)) => Err(CoreError::AmbiguousPathRule { method: raw.method }),
            (None, None) => Err(CoreError::EmptyPathRule { method: raw.method }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE_REGEX: &str = r"\/catalog\/templates\/[^\/\s]*$";

    fn catalog_policy() -> Privileges {
        Privileges::with_default(1)
            .rule(PathRule::regex("POST", TEMPLATE_REGEX, 10))
            .rule(PathRule::exact("GET", "/catalog/templates", 5))
    }

    #[test]
    fn resolves_rules_and_default() {
        let policy = catalog_policy();
        assert_eq!(policy.resolve("/catalog/templates", "POST"), 1);
        assert_eq!(policy.resolve("/catalog/templates", "GET"), 5);
        assert_eq!(policy.resolve("/catalog/templates/test123", "POST"), 10);
        assert_eq!(policy.resolve("/catalog/templates/test123", "PUT"), 1);
        assert_eq!(policy.resolve("/different", "DELETE"), 1);
    }

    #[test]
    fn default_when_no_method_matches() {
        let policy = catalog_policy();
        for path in ["/", "/catalog/templates", "/catalog/templates/x", "/other"] {
            assert_eq!(policy.resolve(path, "PATCH"), 1);
        }
    }

    #[test]
    fn method_match_is_case_sensitive() {
        let policy = catalog_policy();
        assert_eq!(policy.resolve("/catalog/templates", "get"), 1);
    }

    #[test]
    fn first_match_wins_over_more_specific() {
        let policy = Privileges::with_default(0)
            .rule(PathRule::regex("GET", "^/catalog", 3))
            .rule(PathRule::exact("GET", "/catalog/templates", 9));
        assert_eq!(policy.resolve("/catalog/templates", "GET"), 3);
    }

    #[test]
    fn invalid_regex_fails_closed() {
        let policy = catalog_policy().rule(PathRule::regex("GET", r"\/audio\/file\/[^\*$", 7));
        assert_eq!(policy.resolve("/catalog/templates", "GET"), 5);
        assert_eq!(policy.resolve("/audio/file/23001", "GET"), MAX_PRIVILEGE);
    }

    #[test]
    fn regex_is_an_unanchored_search() {
        let rule = PathRule::regex("GET", "templates", 2);
        assert!(rule.matches("/catalog/templates/x").unwrap());
        assert!(!rule.matches("/catalog").unwrap());
    }

    #[test]
    fn regex_matching() {
        let rule = PathRule::regex("POST", TEMPLATE_REGEX, 10);
        assert!(!rule.matches("/catalog/templates").unwrap());
        assert!(rule.matches("/catalog/templates/test").unwrap());

        let broken = PathRule::regex("POST", r"\/catalog\/templates\/[^\/\s*$", 10);
        assert!(broken.matches("/catalog/templates/test").is_err());
    }

    #[test]
    fn regex_compiles_once() {
        let policy = catalog_policy();
        let PathMatcher::Regex(matcher) = policy.paths[0].matcher() else {
            panic!("expected regex rule");
        };
        assert!(!matcher.is_compiled());

        assert_eq!(policy.resolve("/catalog/templates/a", "POST"), 10);
        assert!(matcher.is_compiled());
        let first: *const Regex = matcher.regex().unwrap();

        for _ in 0..10 {
            let _ = policy.resolve("/catalog/templates/b", "POST");
        }
        let second: *const Regex = matcher.regex().unwrap();
        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn regex_compiles_once_across_threads() {
        let policy = std::sync::Arc::new(catalog_policy());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let policy = std::sync::Arc::clone(&policy);
                std::thread::spawn(move || policy.resolve("/catalog/templates/t", "POST"))
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), 10);
        }
    }

    #[test]
    fn parses_rules_from_json() {
        let policy: Privileges = serde_json::from_str(
            r#"{"default":2,"paths":[{"exact":"/a","method":"GET","privileges":4}]}"#,
        )
        .unwrap();
        assert_eq!(policy.resolve("/a", "GET"), 4);
        assert_eq!(policy.resolve("/b", "GET"), 2);
    }

    #[test]
    fn rejects_ambiguous_and_empty_rules() {
        let both: Result<PathRule, _> =
            serde_json::from_str(r#"{"exact":"/a","regex":"a","method":"GET"}"#);
        assert!(both.is_err());

        let neither: Result<PathRule, _> = serde_json::from_str(r#"{"method":"GET"}"#);
        assert!(neither.is_err());

        let no_method: Result<PathRule, _> = serde_json::from_str(r#"{"exact":"/a"}"#);
        assert!(no_method.is_err());
    }

    #[test]
    fn raw_rule_conversion_errors() {
        let raw = RawPathRule {
            exact: Some("/a".into()),
            regex: Some("a".into()),
            method: "GET".into(),
            privileges: 1,
        };
        assert_eq!(
            PathRule::try_from(raw).unwrap_err(),
            CoreError::AmbiguousPathRule {
                method: "GET".into()
            }
        );
    }
}
