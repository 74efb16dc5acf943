//! Declarative route sets
//!
//! A [`Routes`] set renders the first [`Route`] whose declaration matches the
//! current pathname. Declarations are compiled once per instance by the
//! router's matcher, so a set should be built once and kept.
//!
//! Nested routing is expressed by rendering an inner `Routes` from a wildcard
//! route's render function with the same [`RouteContext`].
//!
//! # Example
//!
//! ```
//! use url_navigator::{Route, RouteContext, Routes, Router};
//!
//! let routes: Routes<String> = Routes::new()
//!     .route(Route::new("/users/:id", |ctx: &RouteContext| {
//!         format!("You are user {}", ctx.params.get("id").unwrap_or_default())
//!     }))
//!     .route(Route::fallback(|_: &RouteContext| "Not found".to_string()));
//!
//! let router = Router::builder().pathname("/users/test1").mount();
//! let ctx = RouteContext::from_handle(&router.handle()).unwrap();
//! assert_eq!(routes.render(&ctx).as_deref(), Some("You are user test1"));
//! ```

use crate::error::RouterError;
use crate::matcher::{MatchResult, Matcher, RouteDeclaration};
use crate::params::RouteParams;
use crate::router::RouterHandle;
use crate::trace_log;
use std::fmt;
use std::sync::Arc;

/// What a render function sees
#[derive(Clone)]
pub struct RouteContext {
    /// Pathname being routed
    pub pathname: String,
    /// Parameters of the matched route (empty before a match)
    pub params: RouteParams,
    pub matcher: Arc<dyn Matcher>,
}

impl RouteContext {
    pub fn new(pathname: impl Into<String>, matcher: Arc<dyn Matcher>) -> Self {
        Self {
            pathname: pathname.into(),
            params: RouteParams::new(),
            matcher,
        }
    }

    /// Context for the current location of a router
    pub fn from_handle(handle: &RouterHandle) -> Result<Self, RouterError> {
        let state = handle.state()?;
        Ok(Self::new(state.url.path(), state.matcher.clone()))
    }

    fn with_params(&self, params: RouteParams) -> Self {
        Self {
            pathname: self.pathname.clone(),
            params,
            matcher: self.matcher.clone(),
        }
    }
}

impl fmt::Debug for RouteContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteContext")
            .field("pathname", &self.pathname)
            .field("params", &self.params)
            .field("matcher", &self.matcher.name())
            .finish()
    }
}

/// Render function of a route
pub type RenderFn<V> = Arc<dyn Fn(&RouteContext) -> V + Send + Sync>;

/// A declaration paired with what to render for it
pub struct Route<V> {
    declaration: Arc<RouteDeclaration>,
    render: RenderFn<V>,
}

impl<V> Route<V> {
    pub fn new<F>(path: impl Into<String>, render: F) -> Self
    where
        F: Fn(&RouteContext) -> V + Send + Sync + 'static,
    {
        Self {
            declaration: Arc::new(RouteDeclaration::new(path)),
            render: Arc::new(render),
        }
    }

    /// Route without a path, matching everything
    pub fn fallback<F>(render: F) -> Self
    where
        F: Fn(&RouteContext) -> V + Send + Sync + 'static,
    {
        Self {
            declaration: Arc::new(RouteDeclaration::catch_all()),
            render: Arc::new(render),
        }
    }

    /// Also match any trailing remainder after the pattern
    pub fn wildcard(self) -> Self {
        let declaration = (*self.declaration).clone().wildcard();
        Self {
            declaration: Arc::new(declaration),
            render: self.render,
        }
    }

    pub fn declaration(&self) -> &Arc<RouteDeclaration> {
        &self.declaration
    }
}

impl<V> Clone for Route<V> {
    fn clone(&self) -> Self {
        Self {
            declaration: self.declaration.clone(),
            render: self.render.clone(),
        }
    }
}

impl<V> fmt::Debug for Route<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("declaration", &self.declaration)
            .finish()
    }
}

/// Ordered set of routes; the first match wins
pub struct Routes<V> {
    routes: Vec<Route<V>>,
    #[cfg(feature = "cache")]
    cache: parking_lot::Mutex<ResolutionMemo>,
}

/// Resolution cache bound to the matcher that produced its entries
#[cfg(feature = "cache")]
#[derive(Default)]
struct ResolutionMemo {
    matcher: Option<Arc<dyn Matcher>>,
    entries: crate::cache::ResolutionCache,
}

impl<V> Routes<V> {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            #[cfg(feature = "cache")]
            cache: parking_lot::Mutex::new(ResolutionMemo::default()),
        }
    }

    /// Append a route
    pub fn route(mut self, route: Route<V>) -> Self {
        self.routes.push(route);
        #[cfg(feature = "cache")]
        self.cache.get_mut().entries.clear();
        self
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Index and match of the first route matching `pathname`
    #[cfg(feature = "cache")]
    pub fn resolve(&self, matcher: &Arc<dyn Matcher>, pathname: &str) -> Option<(usize, MatchResult)> {
        let mut memo = self.cache.lock();
        if !memo
            .matcher
            .as_ref()
            .is_some_and(|cached| Arc::ptr_eq(cached, matcher))
        {
            memo.entries.clear();
            memo.matcher = Some(matcher.clone());
        }
        if let Some(resolved) = memo.entries.get(pathname) {
            return resolved;
        }
        let resolved = self.resolve_uncached(matcher.as_ref(), pathname);
        memo.entries.insert(pathname.to_string(), resolved.clone());
        resolved
    }

    /// Index and match of the first route matching `pathname`
    #[cfg(not(feature = "cache"))]
    pub fn resolve(&self, matcher: &Arc<dyn Matcher>, pathname: &str) -> Option<(usize, MatchResult)> {
        self.resolve_uncached(matcher.as_ref(), pathname)
    }

    fn resolve_uncached(&self, matcher: &dyn Matcher, pathname: &str) -> Option<(usize, MatchResult)> {
        let resolved = self.routes.iter().enumerate().find_map(|(index, route)| {
            matcher
                .matches(&route.declaration, pathname)
                .map(|matched| (index, matched))
        });
        trace_log!(
            "Resolved '{}' to route {:?}",
            pathname,
            resolved.as_ref().map(|(index, _)| *index)
        );
        resolved
    }

    /// Render the first matching route, if any
    pub fn render(&self, ctx: &RouteContext) -> Option<V> {
        let (index, matched) = self.resolve(&ctx.matcher, &ctx.pathname)?;
        let route = &self.routes[index];
        Some((route.render)(&ctx.with_params(matched.params)))
    }

    /// Resolution cache statistics
    #[cfg(feature = "cache")]
    pub fn cache_stats(&self) -> crate::cache::CacheStats {
        self.cache.lock().entries.stats().clone()
    }
}

impl<V> Default for Routes<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for Routes<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Routes")
            .field("routes", &self.routes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::RegexMatcher;

    fn ctx(pathname: &str) -> RouteContext {
        RouteContext::new(pathname, Arc::new(RegexMatcher::new()))
    }

    fn users() -> Routes<String> {
        Routes::new()
            .route(Route::new("/users/:id", |ctx: &RouteContext| {
                format!("user {}", ctx.params.get("id").unwrap_or_default())
            }))
            .route(Route::new("/users/:id/posts/:post?", |ctx: &RouteContext| {
                format!("posts {:?}", ctx.params.get("post"))
            }))
            .route(Route::fallback(|_: &RouteContext| "catch-all".to_string()))
    }

    #[test]
    fn test_first_match_wins() {
        let routes = users();
        assert_eq!(routes.render(&ctx("/users/alice")).as_deref(), Some("user alice"));
        assert_eq!(
            routes.render(&ctx("/users/alice/posts")).as_deref(),
            Some("posts None")
        );
        assert_eq!(routes.render(&ctx("/nope")).as_deref(), Some("catch-all"));
    }

    #[test]
    fn test_no_match_renders_nothing() {
        let routes: Routes<&str> = Routes::new().route(Route::new("/only", |_: &RouteContext| "only"));
        assert_eq!(routes.render(&ctx("/other")), None);
        assert_eq!(routes.render(&ctx("/only/")), Some("only"));
    }

    #[test]
    fn test_nested_wildcard_routes() {
        let inner: Arc<Routes<String>> = Arc::new(
            Routes::new()
                .route(Route::new("/settings/profile", |_: &RouteContext| {
                    "profile".to_string()
                }))
                .route(Route::fallback(|_: &RouteContext| "settings home".to_string())),
        );

        let nested = inner.clone();
        let outer: Routes<String> = Routes::new().route(
            Route::new("/settings", move |ctx: &RouteContext| {
                format!("[{}]", nested.render(ctx).unwrap_or_default())
            })
            .wildcard(),
        );

        assert_eq!(
            outer.render(&ctx("/settings/profile")).as_deref(),
            Some("[profile]")
        );
        assert_eq!(outer.render(&ctx("/settings")).as_deref(), Some("[settings home]"));
        assert_eq!(outer.render(&ctx("/other")), None);
    }

    #[cfg(feature = "cache")]
    #[test]
    fn test_resolution_is_cached_per_matcher() {
        let routes = users();
        let first = ctx("/users/bob");
        routes.render(&first);
        routes.render(&first);
        assert_eq!(routes.cache_stats().hits, 1);

        // A different matcher starts from an empty cache.
        let second = ctx("/users/bob");
        routes.render(&second);
        assert_eq!(routes.cache_stats().hits, 1);
    }
}
