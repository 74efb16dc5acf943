//! Named routes
//!
//! A [`NamedRoute`] pairs a path pattern with a builder that interpolates
//! parameters and serializes query, hash and origin into a URL string. The
//! result is a same-document reference unless an origin other than the
//! application's is requested.
//!
//! # Example
//!
//! ```
//! use url_navigator::{BuildOptions, NamedRoute, RouteParams};
//!
//! let user = NamedRoute::new("/users/:id/:tab?");
//! let href = user
//!     .build(&BuildOptions::new().params(RouteParams::new().with("id", "alice")))
//!     .unwrap();
//! assert_eq!(href, "/users/alice");
//!
//! let absolute = user
//!     .build(
//!         &BuildOptions::new()
//!             .params(RouteParams::new().with("id", "alice").with("tab", "posts"))
//!             .origin("https://example.com"),
//!     )
//!     .unwrap();
//! assert_eq!(absolute, "https://example.com/users/alice/posts");
//! ```

use crate::error::RouterError;
use crate::location::{is_null_origin, merge_url, null_origin, relative_reference, UrlPatch};
use crate::params::{QueryParams, RouteParams};
use crate::trace_log;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::OnceLock;
use url::Url;

/// Parameter name reserved for the remainder captured by a wildcard pattern
pub const REST_PARAM: &str = "__rest";

fn token_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(r"/:(\w+)([?+*]?)").expect("token regex is valid"))
}

/// Substitute `:token`s of `pattern` with values from `params`.
///
/// Missing optional tokens (`?`, `*`) drop their whole segment. Missing
/// required tokens (bare or `+`) are left in the output literally.
///
/// ```
/// use url_navigator::{interpolate, RouteParams};
///
/// assert_eq!(interpolate("/foo/:foo?", &RouteParams::new()), "/foo");
/// assert_eq!(interpolate("/test/:welp", &RouteParams::new()), "/test/:welp");
/// assert_eq!(
///     interpolate("/foo/:foo*", &RouteParams::new().with("foo", "oof/rab/zab")),
///     "/foo/oof/rab/zab"
/// );
/// ```
pub fn interpolate(pattern: &str, params: &RouteParams) -> String {
    token_regex()
        .replace_all(pattern, |caps: &Captures<'_>| {
            let name = &caps[1];
            match params.get(name).filter(|value| !value.is_empty()) {
                Some(value) => format!("/{value}"),
                None if matches!(&caps[2], "?" | "*") => String::new(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Pattern that also captures any remainder under `pattern`
pub fn wildcard_pattern(pattern: &str) -> String {
    format!("{}/:{}*", pattern.trim_end_matches('/'), REST_PARAM)
}

/// Options for [`NamedRoute::build`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Path parameters; `None` builds as if none were given
    pub params: Option<RouteParams>,
    pub search_params: QueryParams,
    pub hash: Option<String>,
    /// Origin of the built URL
    pub origin: Option<String>,
    /// Origin treated as "this application": URLs on it stay relative
    pub app_origin: Option<Url>,
}

impl BuildOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn params(mut self, params: RouteParams) -> Self {
        self.params = Some(params);
        self
    }

    /// Add one path parameter
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params
            .get_or_insert_with(RouteParams::new)
            .insert(key, value);
        self
    }

    #[must_use]
    pub fn search_params(mut self, search_params: QueryParams) -> Self {
        self.search_params = search_params;
        self
    }

    /// Append one search parameter
    #[must_use]
    pub fn search(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.search_params.append(key, value);
        self
    }

    #[must_use]
    pub fn hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = Some(hash.into());
        self
    }

    #[must_use]
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    #[must_use]
    pub fn app_origin(mut self, origin: Url) -> Self {
        self.app_origin = Some(origin);
        self
    }
}

/// A path pattern with a URL builder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedRoute {
    path: String,
}

impl NamedRoute {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// The raw pattern
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether the pattern contains `:token`s
    pub fn has_params(&self) -> bool {
        self.path.contains(':')
    }

    /// Build a URL string.
    ///
    /// Search params are sorted by key. The result is a relative reference
    /// when it lives on the null origin or on `options.app_origin`, and an
    /// absolute URL otherwise.
    pub fn build(&self, options: &BuildOptions) -> Result<String, RouterError> {
        let empty = RouteParams::new();
        let pathname = interpolate(&self.path, options.params.as_ref().unwrap_or(&empty));

        let mut search = options.search_params.clone();
        search.sort();

        let mut patch = UrlPatch::new().pathname(pathname).search_params(search);
        patch.hash = options.hash.clone();
        patch.origin = options.origin.clone();

        let url = merge_url(&null_origin(), &patch)?;
        let same_app = options
            .app_origin
            .as_ref()
            .is_some_and(|app| app.origin() == url.origin());

        if is_null_origin(&url) || same_app {
            Ok(relative_reference(&url))
        } else {
            Ok(url.to_string())
        }
    }
}

/// Named routes looked up by name
#[derive(Debug, Clone, Default)]
pub struct NamedRouteRegistry {
    routes: HashMap<String, NamedRoute>,
}

impl NamedRouteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `pattern` under `name`, replacing any previous route
    pub fn register(&mut self, name: impl Into<String>, pattern: impl Into<String>) {
        let name = name.into();
        let route = NamedRoute::new(pattern);
        trace_log!("Registered named route '{}' -> '{}'", name, route.path());
        self.routes.insert(name, route);
    }

    pub fn get(&self, name: &str) -> Option<&NamedRoute> {
        self.routes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.routes.contains_key(name)
    }

    /// Build the URL of the route called `name`
    pub fn url_for(&self, name: &str, options: &BuildOptions) -> Result<Option<String>, RouterError> {
        self.routes
            .get(name)
            .map(|route| route.build(options))
            .transpose()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
