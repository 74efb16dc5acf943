//! # URL Navigator
//!
//! A URL router core for UI applications:
//!
//! - **URL Utilities** - overlay partial URL updates, produce same-document
//!   references, normalize navigation destinations
//! - **Path Matching** - `:param`, `:param?`, `:param+`, `:param*` patterns
//!   compiled once per route declaration
//! - **Navigation Store** - immutable snapshots with identity-preserving
//!   no-op updates
//! - **Navigation Bridge** - intercepts host navigations, runs user hooks,
//!   recovers from cancelled navigations and tracks direction
//! - **Named Routes** - build URLs from patterns, params, query and hash
//!
//! The router never touches ambient globals; the host (a browser binding, an
//! embedding application or the in-memory hosts in [`history`]) is passed in
//! through an [`Environment`].
//!
//! # Quick Start
//!
//! ```
//! use url::Url;
//! use url_navigator::{
//!     Environment, MemoryNavigation, NavigateOptions, Route, RouteContext, Router, Routes,
//! };
//!
//! let host = MemoryNavigation::new(Url::parse("http://localhost/users/test1").unwrap());
//! let router = Router::builder()
//!     .environment(Environment::with_navigation(host.clone()))
//!     .mount();
//!
//! let routes: Routes<String> = Routes::new()
//!     .route(Route::new("/users/:id", |ctx: &RouteContext| {
//!         format!("You are user {}", ctx.params.get("id").unwrap_or_default())
//!     }));
//!
//! let handle = router.handle();
//! handle.navigate("/users/alice", NavigateOptions::default()).unwrap();
//! host.settle();
//!
//! let ctx = RouteContext::from_handle(&handle).unwrap();
//! assert_eq!(routes.render(&ctx).as_deref(), Some("You are user alice"));
//! ```
//!
//! # Hooks
//!
//! ```
//! use url_navigator::{InterceptHook, Router};
//!
//! let router = Router::builder()
//!     .intercept(InterceptHook::from_fn(|event| {
//!         if event.destination().path().starts_with("/admin") {
//!             event.prevent_default();
//!         }
//!         Ok(())
//!     }))
//!     .mount();
//! # drop(router);
//! ```
//!
//! # Feature Flags
//!
//! - `log` (default) - Uses the standard `log` crate for logging
//! - `tracing` - Uses the `tracing` crate for structured logging (mutually exclusive with `log`)
//! - `cache` (default) - LRU memo of `Routes` resolutions
//! - `gpui` - Installs a router as a GPUI global

#![doc(html_root_url = "https://docs.rs/url-navigator/0.1.0")]
#![cfg_attr(docsrs, feature(doc_cfg))]
// Lints are configured in Cargo.toml [lints] section

// Logging abstraction
pub mod logging;

// Error handling
pub mod error;

// URL and parameter utilities
pub mod location;
pub mod params;

// Matching
pub mod cache;
pub mod matcher;

// Host surface and in-memory hosts
pub mod history;
pub mod host;

// Navigation core
pub mod bridge;
pub mod hooks;
pub mod state;

// Consumers
pub mod named;
pub mod router;
pub mod routes;

// GPUI integration (optional)
#[cfg(feature = "gpui")]
mod integration;

// Re-export main types for convenient access
pub use bridge::{BridgeMode, ModeKind, NavigationBridge};
#[cfg(feature = "cache")]
pub use cache::{CacheStats, ResolutionCache};
pub use cache::PatternCache;
pub use error::{ErrorReporter, HookError, HookResult, RouterError};
pub use history::{EntryStack, MemoryHistory, MemoryNavigation};
pub use hooks::{ChangeEvent, ChangeHook, Finish, InterceptHook, SyntheticNavigateEvent};
pub use host::{
    AbortSignal, CurrentEntryChangeEvent, Environment, FocusReset, HistoryApi, HistoryBehavior,
    NavigateEvent, NavigationApi, NavigationEntry, NavigationOrigin, NavigationType,
    PopStateEvent,
};
#[cfg(feature = "gpui")]
pub use integration::{init_router, GlobalRouter, Navigator};
pub use location::{
    merge_url, relative_reference, resolve_destination, Destination, UrlPatch, NULL_ORIGIN,
};
pub use matcher::{compile, CompiledPattern, MatchResult, Matcher, RegexMatcher, RouteDeclaration};
pub use named::{interpolate, wildcard_pattern, BuildOptions, NamedRoute, NamedRouteRegistry};
pub use params::{QueryParams, RouteParams};
pub use router::{HookRegistration, NavigateOptions, Router, RouterBuilder, RouterHandle};
pub use routes::{Route, RouteContext, Routes};
pub use state::{Action, NavigationState, Store, Subscription};

/// Direction of the last navigation.
///
/// Estimated from history entry indices; replacements, reloads and
/// navigations issued in legacy mode are `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i8)]
pub enum Direction {
    /// Towards an earlier entry
    Backward = -1,
    /// Direction could not be determined
    #[default]
    Unknown = 0,
    /// Towards a later (or new) entry
    Forward = 1,
}

impl Direction {
    /// Signed value: -1, 0 or 1
    pub fn as_i8(self) -> i8 {
        self as i8
    }
}
