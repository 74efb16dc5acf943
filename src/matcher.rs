//! Route pattern compilation and matching
//!
//! Patterns are compiled into an anchored regular expression plus the ordered
//! list of parameter names. Supported tokens:
//!
//! - `/users` - static segment, matched case-sensitively
//! - `/:id` - required single segment
//! - `/:id?` - optional single segment
//! - `/:rest+` - one or more segments, captured slash-joined
//! - `/:rest*` - zero or more segments, captured slash-joined
//! - `/*` - unnamed rest of the path, captured under the key `*` (may be empty)
//!
//! A trailing slash on the pathname is tolerated. Compiling with `wildcard`
//! additionally accepts (and ignores) any remainder after the pattern, which
//! is how nested route scopes match their prefix.
//!
//! Captured values are returned raw; percent-escapes are not decoded.

use crate::cache::PatternCache;
use crate::error::RouterError;
use crate::params::RouteParams;
use crate::{trace_log, warn_log};
use regex::Regex;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// A compiled route pattern
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    /// Parameter names in capture order
    pub keys: Vec<String>,
    /// Anchored matching expression
    pub regex: Regex,
}

impl CompiledPattern {
    /// Match a pathname, returning the captured parameters
    pub fn captures(&self, pathname: &str) -> Option<RouteParams> {
        let caps = self.regex.captures(pathname)?;
        Some(
            self.keys
                .iter()
                .enumerate()
                .filter_map(|(idx, key)| caps.get(idx + 1).map(|m| (key.clone(), m.as_str())))
                .collect(),
        )
    }
}

/// Compile `pattern` into a [`CompiledPattern`].
///
/// # Example
///
/// ```
/// use url_navigator::matcher::compile;
///
/// let compiled = compile("/files/:rest*", false).unwrap();
/// let params = compiled.captures("/files/a/b/c").unwrap();
/// assert_eq!(params.get("rest"), Some("a/b/c"));
/// assert!(compiled.captures("/files").is_some());
/// ```
pub fn compile(pattern: &str, wildcard: bool) -> Result<CompiledPattern, RouterError> {
    let invalid = |reason: String| RouterError::InvalidPattern {
        pattern: pattern.to_string(),
        reason,
    };

    let mut keys = Vec::new();
    let mut seen = HashSet::new();
    let mut source = String::from("^");

    for segment in pattern.split('/').filter(|s| !s.is_empty()) {
        if segment == "*" {
            keys.push("*".to_string());
            source.push_str("(?:/(.*))?");
            continue;
        }

        let Some(token) = segment.strip_prefix(':') else {
            source.push('/');
            source.push_str(&regex::escape(segment));
            continue;
        };

        let (name, quantifier) = match token.chars().last() {
            Some(q @ ('?' | '*' | '+')) => (&token[..token.len() - 1], Some(q)),
            _ => (token, None),
        };

        if name.is_empty() {
            return Err(invalid("parameter name cannot be empty".to_string()));
        }
        if !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(invalid(format!(
                "parameter '{}' must contain only alphanumeric characters and underscores",
                name
            )));
        }
        if !seen.insert(name) {
            return Err(invalid(format!("duplicate parameter '{}'", name)));
        }

        keys.push(name.to_string());
        source.push_str(match quantifier {
            None => "/([^/]+)",
            Some('?') => "(?:/([^/]+))?",
            Some('+') => "/([^/]+(?:/[^/]+)*)",
            _ => "(?:/([^/]+(?:/[^/]+)*))?",
        });
    }

    source.push_str(if wildcard { "(?:/.*)?$" } else { "/?$" });

    trace_log!("compiled route pattern '{}' -> {}", pattern, source);

    let regex = Regex::new(&source).map_err(|e| invalid(e.to_string()))?;
    Ok(CompiledPattern { keys, regex })
}

// ============================================================================
// Route declarations
// ============================================================================

/// A route declaration as seen by the matcher.
///
/// Declarations are shared through `Arc`; compiled patterns are cached per
/// declaration instance, so two declarations with the same path compile
/// independently and a dropped declaration releases its compiled pattern.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RouteDeclaration {
    path: Option<String>,
    wildcard: bool,
}

impl RouteDeclaration {
    /// Declaration matching `path`
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            wildcard: false,
        }
    }

    /// Declaration without a path, matching everything
    pub fn catch_all() -> Self {
        Self::default()
    }

    /// Also match any trailing remainder (for nested scopes)
    #[must_use]
    pub fn wildcard(mut self) -> Self {
        self.wildcard = true;
        self
    }

    /// The declared path, if any
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Whether trailing remainders are accepted
    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }
}

/// Successful match of one declaration against a pathname
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    /// The matched pathname (empty for path-less declarations)
    pub path: String,
    /// Extracted parameters; unmatched optional parameters are absent
    pub params: RouteParams,
    /// Rank among several matches; always 0 for now
    pub index: usize,
}

impl MatchResult {
    /// Match produced by a path-less declaration
    pub fn catch_all() -> Self {
        Self {
            path: String::new(),
            params: RouteParams::new(),
            index: 0,
        }
    }
}

/// Decides whether one declaration matches a pathname.
///
/// The matcher never ranks declarations against each other; callers such as
/// [`Routes`](crate::Routes) take the first declaration that matches.
pub trait Matcher: Send + Sync + 'static {
    /// Match `declaration` against `pathname`
    fn matches(&self, declaration: &Arc<RouteDeclaration>, pathname: &str) -> Option<MatchResult>;

    /// Matcher name for debugging
    fn name(&self) -> &str {
        "Matcher"
    }
}

/// Default regex-based matcher with a per-declaration pattern cache
#[derive(Default)]
pub struct RegexMatcher {
    cache: PatternCache,
}

impl RegexMatcher {
    /// Create a matcher with an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Match, surfacing pattern compilation errors
    pub fn try_match(
        &self,
        declaration: &Arc<RouteDeclaration>,
        pathname: &str,
    ) -> Result<Option<MatchResult>, RouterError> {
        let Some(path) = declaration.path() else {
            return Ok(Some(MatchResult::catch_all()));
        };

        let compiled = self.cache.get_or_compile(declaration, path)?;
        Ok(compiled.captures(pathname).map(|params| MatchResult {
            path: pathname.to_string(),
            params,
            index: 0,
        }))
    }

    /// The pattern cache
    pub fn cache(&self) -> &PatternCache {
        &self.cache
    }
}

impl Matcher for RegexMatcher {
    fn matches(&self, declaration: &Arc<RouteDeclaration>, pathname: &str) -> Option<MatchResult> {
        self.try_match(declaration, pathname).unwrap_or_else(|error| {
            warn_log!("{}", error);
            None
        })
    }

    fn name(&self) -> &str {
        "RegexMatcher"
    }
}

impl fmt::Debug for RegexMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegexMatcher")
            .field("cached_patterns", &self.cache.len())
            .finish()
    }
}
