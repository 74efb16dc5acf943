//! Router composition root
//!
//! [`RouterBuilder::mount`] wires a [`Store`] to its host in two phases: the
//! bridge subscribes to host signals first, and only then does the caller get
//! a [`Router`] that can hand out [`RouterHandle`]s. No navigation issued
//! through a handle can therefore race the subscription.
//!
//! # Example
//!
//! ```
//! use url::Url;
//! use url_navigator::{Environment, MemoryNavigation, NavigateOptions, Router};
//!
//! let host = MemoryNavigation::new(Url::parse("http://localhost/users/test1").unwrap());
//! let router = Router::builder()
//!     .environment(Environment::with_navigation(host.clone()))
//!     .mount();
//!
//! let handle = router.handle();
//! handle.navigate("/users/alice", NavigateOptions::default()).unwrap();
//! host.settle();
//!
//! assert_eq!(handle.pathname().unwrap(), "/users/alice");
//! ```

use crate::bridge::{BridgeMode, ModeKind, NavigationBridge};
use crate::error::{ErrorReporter, RouterError};
use crate::hooks::{ChangeHook, InterceptHook};
use crate::host::{
    Environment, HistoryBehavior, NavigateOptions as HostNavigateOptions, NavigationOrigin,
    PopStateEvent,
};
use crate::location::{relative_reference, resolve_destination, Destination};
use crate::matcher::{MatchResult, Matcher, RouteDeclaration};
use crate::params::QueryParams;
use crate::state::{initial_url, Action, NavigationState, StateListener, Store, Subscription};
use crate::{debug_log, info_log, warn_log, Direction};
use std::fmt;
use std::sync::{Arc, Weak};
use url::Url;

/// Options for [`RouterHandle::navigate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NavigateOptions {
    pub history: HistoryBehavior,
}

impl NavigateOptions {
    /// Replace the current entry instead of pushing
    pub fn replace() -> Self {
        Self {
            history: HistoryBehavior::Replace,
        }
    }

    /// Always push a new entry
    pub fn push() -> Self {
        Self {
            history: HistoryBehavior::Push,
        }
    }
}

/// Configuration for a [`Router`]
#[derive(Default)]
pub struct RouterBuilder {
    pathname: Option<String>,
    search: Option<String>,
    matcher: Option<Arc<dyn Matcher>>,
    intercept: Option<InterceptHook>,
    change: Option<ChangeHook>,
    environment: Environment,
    force_legacy: bool,
    reporter: ErrorReporter,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initial pathname, overriding the host's
    #[must_use]
    pub fn pathname(mut self, pathname: impl Into<String>) -> Self {
        self.pathname = Some(pathname.into());
        self
    }

    /// Initial query, overriding the host's (leading `?` optional)
    #[must_use]
    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// Custom matcher; defaults to [`RegexMatcher`](crate::RegexMatcher)
    #[must_use]
    pub fn matcher(mut self, matcher: Arc<dyn Matcher>) -> Self {
        self.matcher = Some(matcher);
        self
    }

    #[must_use]
    pub fn intercept(mut self, hook: InterceptHook) -> Self {
        self.intercept = Some(hook);
        self
    }

    #[must_use]
    pub fn change(mut self, hook: ChangeHook) -> Self {
        self.change = Some(hook);
        self
    }

    /// Host capabilities; detached when not set
    #[must_use]
    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Follow the legacy history protocol even if an intercept-capable host
    /// exists
    #[must_use]
    pub fn legacy(mut self, force: bool) -> Self {
        self.force_legacy = force;
        self
    }

    /// Receive errors the router recovers from (failing hooks)
    #[must_use]
    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&RouterError) + Send + Sync + 'static,
    {
        self.reporter = ErrorReporter::with_callback(callback);
        self
    }

    /// Create the store, subscribe to the host and return the router
    pub fn mount(self) -> Router {
        let url = initial_url(
            self.environment.location().as_ref(),
            self.pathname.as_deref(),
            self.search.as_deref(),
        );

        let mut state = NavigationState::new(url);
        if let Some(matcher) = self.matcher {
            state = state.with_matcher(matcher);
        }
        state.intercept = self.intercept;
        state.change = self.change;

        let store = Store::new(state);
        let mode = BridgeMode::select(&self.environment, self.force_legacy);
        let bridge = NavigationBridge::mount(&store, mode, self.reporter);
        info_log!("Router mounted at {}", store.state().url);

        Router { store, bridge }
    }
}

impl fmt::Debug for RouterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterBuilder")
            .field("pathname", &self.pathname)
            .field("search", &self.search)
            .field("environment", &self.environment)
            .field("force_legacy", &self.force_legacy)
            .finish()
    }
}

/// A mounted router.
///
/// Owns the store and the host subscription; dropping it unmounts the
/// router and turns every handle into a [`RouterError::NotMounted`] source.
pub struct Router {
    store: Arc<Store>,
    bridge: NavigationBridge,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    /// A handle for descendants of this router
    pub fn handle(&self) -> RouterHandle {
        RouterHandle {
            store: Arc::downgrade(&self.store),
            mode: self.bridge.mode().clone(),
        }
    }

    /// Current snapshot
    pub fn state(&self) -> Arc<NavigationState> {
        self.store.state()
    }

    pub fn mode(&self) -> ModeKind {
        self.bridge.mode().kind()
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("state", &self.store.state())
            .field("bridge", &self.bridge)
            .finish()
    }
}

/// Cheap, cloneable access to a mounted router
#[derive(Clone)]
pub struct RouterHandle {
    store: Weak<Store>,
    mode: BridgeMode,
}

impl RouterHandle {
    /// A handle that is not attached to any router
    pub fn unmounted() -> Self {
        Self {
            store: Weak::new(),
            mode: BridgeMode::Detached,
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.store.strong_count() > 0
    }

    fn store(&self) -> Result<Arc<Store>, RouterError> {
        self.store.upgrade().ok_or(RouterError::NotMounted)
    }

    /// Current snapshot
    pub fn state(&self) -> Result<Arc<NavigationState>, RouterError> {
        Ok(self.store()?.state())
    }

    pub fn location(&self) -> Result<Url, RouterError> {
        Ok(self.state()?.url.clone())
    }

    pub fn pathname(&self) -> Result<String, RouterError> {
        Ok(self.state()?.url.path().to_string())
    }

    pub fn search_params(&self) -> Result<QueryParams, RouterError> {
        Ok(QueryParams::from_url(&self.state()?.url))
    }

    /// First value of a search param
    pub fn search_param(&self, key: &str) -> Result<Option<String>, RouterError> {
        Ok(self.search_params()?.get(key).map(str::to_string))
    }

    /// The hash parsed as a query string (`#tab=2&open=1`)
    pub fn hash_params(&self) -> Result<QueryParams, RouterError> {
        let state = self.state()?;
        Ok(QueryParams::from_query_string(
            state.url.fragment().unwrap_or_default(),
        ))
    }

    pub fn hash_param(&self, key: &str) -> Result<Option<String>, RouterError> {
        Ok(self.hash_params()?.get(key).map(str::to_string))
    }

    /// Direction of the last navigation
    pub fn direction(&self) -> Result<Direction, RouterError> {
        Ok(self.state()?.direction)
    }

    /// The router's matcher
    pub fn matcher(&self) -> Result<Arc<dyn Matcher>, RouterError> {
        Ok(self.state()?.matcher.clone())
    }

    /// Match `declaration` against `pathname` (the current one if `None`)
    pub fn matches(
        &self,
        declaration: &Arc<RouteDeclaration>,
        pathname: Option<&str>,
    ) -> Result<Option<MatchResult>, RouterError> {
        let state = self.state()?;
        let pathname = pathname.unwrap_or_else(|| state.url.path());
        Ok(state.matcher.matches(declaration, pathname))
    }

    /// Navigate to `destination`, resolved against the current location.
    ///
    /// With an intercept-capable host the store is updated once the host
    /// runs the interception handler. In legacy mode same-origin
    /// destinations are pushed (or replaced) and committed right away;
    /// other origins are loaded through `assign`. Without a host this is a
    /// no-op.
    pub fn navigate(
        &self,
        destination: impl Into<Destination>,
        options: NavigateOptions,
    ) -> Result<(), RouterError> {
        let store = self.store()?;
        let current = store.state().url.clone();
        let next = resolve_destination(&destination.into(), &current)?;
        debug_log!("Navigating to {}", next);

        match &self.mode {
            BridgeMode::Modern(navigation) => navigation.navigate(
                &next,
                HostNavigateOptions {
                    history: options.history,
                    info: Some(NavigationOrigin::Router),
                },
            ),
            BridgeMode::Legacy(history) => {
                if next.origin() == current.origin() {
                    let reference = relative_reference(&next);
                    match options.history {
                        HistoryBehavior::Replace => history.replace_state(&reference),
                        HistoryBehavior::Auto | HistoryBehavior::Push => {
                            history.push_state(&reference);
                        }
                    }
                    history.dispatch_popstate(&PopStateEvent::new(NavigationOrigin::Router));
                } else {
                    history.assign(&next);
                }
            }
            BridgeMode::Detached => {
                warn_log!("No navigation host; ignoring navigation to {}", next);
            }
        }
        Ok(())
    }

    /// Go back one entry.
    ///
    /// When there is nothing to go back to and `alternate` is given, the
    /// current entry is replaced with it instead.
    pub fn back(&self, alternate: Option<Destination>) -> Result<(), RouterError> {
        self.store()?;
        match &self.mode {
            BridgeMode::Modern(navigation) => {
                if navigation.can_go_back() {
                    navigation.back(Some(NavigationOrigin::Router));
                } else if let Some(alternate) = alternate {
                    return self.navigate(alternate, NavigateOptions::replace());
                } else {
                    debug_log!("Nothing to go back to");
                }
            }
            BridgeMode::Legacy(history) => history.back(),
            BridgeMode::Detached => {
                warn_log!("No navigation host; ignoring back navigation");
            }
        }
        Ok(())
    }

    /// Replace both hooks; dropping the registration clears them again
    pub fn register_hooks(
        &self,
        intercept: Option<InterceptHook>,
        change: Option<ChangeHook>,
    ) -> Result<HookRegistration, RouterError> {
        let store = self.store()?;
        store.dispatch(Action::RegisterHooks { intercept, change });
        Ok(HookRegistration {
            store: Arc::downgrade(&store),
        })
    }

    /// Replace the intercept hook, keeping the change hook
    pub fn set_intercept(&self, hook: Option<InterceptHook>) -> Result<(), RouterError> {
        let store = self.store()?;
        let change = store.state().change.clone();
        store.dispatch(Action::RegisterHooks {
            intercept: hook,
            change,
        });
        Ok(())
    }

    /// Replace the change hook, keeping the intercept hook
    pub fn set_change(&self, hook: Option<ChangeHook>) -> Result<(), RouterError> {
        let store = self.store()?;
        let intercept = store.state().intercept.clone();
        store.dispatch(Action::RegisterHooks {
            intercept,
            change: hook,
        });
        Ok(())
    }

    /// Be notified of every new snapshot
    pub fn subscribe<F>(&self, listener: F) -> Result<Subscription, RouterError>
    where
        F: Fn(&Arc<NavigationState>) + Send + Sync + 'static,
    {
        let listener: StateListener = Arc::new(listener);
        Ok(self.store()?.subscribe(listener))
    }
}

impl fmt::Debug for RouterHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterHandle")
            .field("mounted", &self.is_mounted())
            .field("mode", &self.mode)
            .finish()
    }
}

/// Guard returned by [`RouterHandle::register_hooks`]
#[must_use = "dropping a HookRegistration clears the hooks immediately"]
pub struct HookRegistration {
    store: Weak<Store>,
}

impl Drop for HookRegistration {
    fn drop(&mut self) {
        if let Some(store) = self.store.upgrade() {
            store.dispatch(Action::RegisterHooks {
                intercept: None,
                change: None,
            });
        }
    }
}

impl fmt::Debug for HookRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HookRegistration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{MemoryHistory, MemoryNavigation};
    use crate::location::UrlPatch;
    use crate::host::HistoryApi;

    fn url(path: &str) -> Url {
        Url::parse("http://localhost/").unwrap().join(path).unwrap()
    }

    #[test]
    fn test_detached_router_uses_null_origin() {
        let router = Router::builder().pathname("/users/test1").mount();
        assert_eq!(router.mode(), ModeKind::Detached);

        let handle = router.handle();
        assert_eq!(handle.location().unwrap().as_str(), "http://null/users/test1");

        handle.navigate("/elsewhere", NavigateOptions::default()).unwrap();
        assert_eq!(handle.pathname().unwrap(), "/users/test1");
    }

    #[test]
    fn test_handle_fails_after_unmount() {
        let router = Router::builder().mount();
        let handle = router.handle();
        assert!(handle.is_mounted());
        drop(router);

        assert!(!handle.is_mounted());
        assert!(matches!(handle.location(), Err(RouterError::NotMounted)));
        assert!(matches!(
            handle.navigate("/x", NavigateOptions::default()),
            Err(RouterError::NotMounted)
        ));
        assert!(matches!(
            RouterHandle::unmounted().pathname(),
            Err(RouterError::NotMounted)
        ));
    }

    #[test]
    fn test_search_and_hash_params() {
        let host = MemoryNavigation::new(url("/list?page=2&tag=a&tag=b#tab=info"));
        let router = Router::builder()
            .environment(Environment::with_navigation(host))
            .mount();
        let handle = router.handle();

        assert_eq!(handle.search_param("page").unwrap().as_deref(), Some("2"));
        assert_eq!(handle.search_params().unwrap().get_all("tag"), vec!["a", "b"]);
        assert_eq!(handle.hash_param("tab").unwrap().as_deref(), Some("info"));
        assert_eq!(handle.hash_param("missing").unwrap(), None);
    }

    #[test]
    fn test_navigate_with_patch() {
        let host = MemoryNavigation::new(url("/list?page=2"));
        let router = Router::builder()
            .environment(Environment::with_navigation(host.clone()))
            .mount();
        let handle = router.handle();

        handle
            .navigate(
                UrlPatch::new().search_params(QueryParams::new().with("page", "3")),
                NavigateOptions::replace(),
            )
            .unwrap();
        host.settle();

        assert_eq!(handle.location().unwrap().as_str(), "http://localhost/list?page=3");
        assert_eq!(host.entries().len(), 1);
    }

    #[test]
    fn test_back_with_alternate_replaces() {
        let host = MemoryNavigation::new(url("/deep/link"));
        let router = Router::builder()
            .environment(Environment::with_navigation(host.clone()))
            .mount();
        let handle = router.handle();

        handle.back(Some("/".into())).unwrap();
        host.settle();

        assert_eq!(handle.pathname().unwrap(), "/");
        assert_eq!(host.entries().len(), 1);
    }

    #[test]
    fn test_legacy_navigation() {
        let history = MemoryHistory::new(url("/"));
        let router = Router::builder()
            .environment(Environment::with_history(history.clone()))
            .mount();
        assert_eq!(router.mode(), ModeKind::Legacy);
        let handle = router.handle();

        handle.navigate("/users/alice?tab=1", NavigateOptions::default()).unwrap();
        assert_eq!(handle.location().unwrap().as_str(), "http://localhost/users/alice?tab=1");
        assert_eq!(handle.direction().unwrap(), Direction::Unknown);
        assert_eq!(history.location().path(), "/users/alice");

        handle
            .navigate("https://example.com/away", NavigateOptions::default())
            .unwrap();
        assert_eq!(history.assigned().len(), 1);
        assert_eq!(handle.pathname().unwrap(), "/users/alice");

        handle.back(None).unwrap();
        assert_eq!(handle.pathname().unwrap(), "/");
        assert_eq!(handle.direction().unwrap(), Direction::Backward);
    }

    #[test]
    fn test_forced_legacy_mode() {
        let navigation = MemoryNavigation::new(url("/"));
        let history = MemoryHistory::new(url("/"));
        let router = Router::builder()
            .environment(Environment::with_navigation(navigation).history(history))
            .legacy(true)
            .mount();
        assert_eq!(router.mode(), ModeKind::Legacy);
    }

    #[test]
    fn test_hook_registration_guard() {
        let router = Router::builder().mount();
        let handle = router.handle();

        let registration = handle
            .register_hooks(
                Some(InterceptHook::from_fn(|_| Ok(()))),
                Some(ChangeHook::new(|_| Ok(()))),
            )
            .unwrap();
        assert!(router.state().intercept.is_some());

        handle.set_intercept(None).unwrap();
        assert!(router.state().intercept.is_none());
        assert!(router.state().change.is_some());

        drop(registration);
        assert!(router.state().change.is_none());
    }

    #[test]
    fn test_matches_current_pathname() {
        let router = Router::builder().pathname("/users/test1").mount();
        let handle = router.handle();
        let declaration = Arc::new(RouteDeclaration::new("/users/:id"));

        let matched = handle.matches(&declaration, None).unwrap().unwrap();
        assert_eq!(matched.params.get("id"), Some("test1"));
        assert!(handle.matches(&declaration, Some("/teams/1")).unwrap().is_none());
    }
}
