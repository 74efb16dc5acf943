//! Host environment surface
//!
//! The router never reads ambient globals. Whatever owns the real history
//! (a browser binding, the in-memory hosts in [`history`](crate::history), an
//! embedding application) implements one or both of:
//!
//! - [`NavigationApi`] - an intercept-capable navigation primitive that fires
//!   `navigate` and `currententrychange` signals
//! - [`HistoryApi`] - the legacy push/replace surface with pop notifications
//!
//! and hands them to the router through an [`Environment`].

use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use url::Url;

/// Kind of navigation a signal describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationType {
    /// A new entry is pushed
    Push,
    /// The current entry is replaced
    Replace,
    /// The current entry is reloaded
    Reload,
    /// Back / forward through existing entries
    Traverse,
}

/// How a navigation should treat the history stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryBehavior {
    /// Let the host decide (push, or replace for an identical URL)
    #[default]
    Auto,
    /// Always push a new entry
    Push,
    /// Replace the current entry
    Replace,
}

/// Who issued a navigation.
///
/// Every navigation the router issues itself carries a tag so the bridge can
/// tell it apart from one the user started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NavigationOrigin {
    /// Browser UI or anything outside the router
    #[default]
    User,
    /// `RouterHandle::navigate` / `RouterHandle::back`
    Router,
    /// Traversal restoring the previous entry after a cancelled navigation
    CancelRecovery,
}

/// Focus handling requested when intercepting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusReset {
    /// Host resets focus after the handler settles
    #[default]
    AfterTransition,
    /// Focus is left to the application
    Manual,
}

/// One entry of the host history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationEntry {
    /// Entry URL
    pub url: Url,
    /// Position in the history list, if the entry is part of it
    pub index: Option<usize>,
}

/// Options for [`NavigationApi::navigate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NavigateOptions {
    /// Push / replace behavior
    pub history: HistoryBehavior,
    /// Origin tag delivered back as [`NavigateEvent::info`]
    pub info: Option<NavigationOrigin>,
}

// ============================================================================
// Abort signal
// ============================================================================

/// Abort flag attached to a navigation
///
/// Hosts abort a navigation when a newer one supersedes it.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    aborted: Arc<AtomicBool>,
}

impl AbortSignal {
    /// Create a signal that is not aborted
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the navigation was aborted
    pub fn aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    /// Abort the navigation
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }
}

// ============================================================================
// Navigate event
// ============================================================================

/// Handler registered through [`NavigateEvent::intercept`].
///
/// The host calls it once the navigation is committed and drives the
/// returned future to completion.
pub type InterceptHandler = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// Properties of a navigate signal, filled in by the host
#[derive(Debug, Clone)]
pub struct NavigateEventInit {
    pub destination: Url,
    pub navigation_type: NavigationType,
    pub cancelable: bool,
    pub can_intercept: bool,
    pub hash_change: bool,
    pub same_document: bool,
    pub download_request: Option<String>,
    pub info: Option<NavigationOrigin>,
}

impl NavigateEventInit {
    /// Cancelable, interceptable, cross-document push to `destination`
    pub fn new(destination: Url, navigation_type: NavigationType) -> Self {
        Self {
            destination,
            navigation_type,
            cancelable: true,
            can_intercept: true,
            hash_change: false,
            same_document: false,
            download_request: None,
            info: None,
        }
    }
}

struct NavigateEventInner {
    init: NavigateEventInit,
    default_prevented: AtomicBool,
    signal: AbortSignal,
    handlers: Mutex<Vec<(InterceptHandler, FocusReset)>>,
}

/// A pending navigation announced by the host.
///
/// Cheap to clone; clones share cancellation state.
#[derive(Clone)]
pub struct NavigateEvent {
    inner: Arc<NavigateEventInner>,
}

impl NavigateEvent {
    /// Create an event for the host to dispatch
    pub fn new(init: NavigateEventInit) -> Self {
        Self {
            inner: Arc::new(NavigateEventInner {
                init,
                default_prevented: AtomicBool::new(false),
                signal: AbortSignal::new(),
                handlers: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn destination(&self) -> &Url {
        &self.inner.init.destination
    }

    pub fn navigation_type(&self) -> NavigationType {
        self.inner.init.navigation_type
    }

    pub fn cancelable(&self) -> bool {
        self.inner.init.cancelable
    }

    pub fn can_intercept(&self) -> bool {
        self.inner.init.can_intercept
    }

    /// Same-document fragment-only change
    pub fn hash_change(&self) -> bool {
        self.inner.init.hash_change
    }

    pub fn same_document(&self) -> bool {
        self.inner.init.same_document
    }

    pub fn download_request(&self) -> Option<&str> {
        self.inner.init.download_request.as_deref()
    }

    /// Origin tag passed by whoever started the navigation
    pub fn info(&self) -> Option<NavigationOrigin> {
        self.inner.init.info
    }

    pub fn signal(&self) -> &AbortSignal {
        &self.inner.signal
    }

    pub fn default_prevented(&self) -> bool {
        self.inner.default_prevented.load(Ordering::SeqCst)
    }

    /// Cancel the navigation. Ignored for non-cancelable events.
    pub fn prevent_default(&self) {
        if self.cancelable() {
            self.inner.default_prevented.store(true, Ordering::SeqCst);
        }
    }

    /// Register an interception handler.
    ///
    /// Returns `false` (and drops the handler) when the event cannot be
    /// intercepted.
    pub fn intercept(&self, handler: InterceptHandler, focus_reset: FocusReset) -> bool {
        if !self.can_intercept() {
            return false;
        }
        self.inner.handlers.lock().push((handler, focus_reset));
        true
    }

    /// Whether any handler was registered
    pub fn is_intercepted(&self) -> bool {
        !self.inner.handlers.lock().is_empty()
    }

    /// Host side: take the registered handlers
    pub fn take_handlers(&self) -> Vec<(InterceptHandler, FocusReset)> {
        std::mem::take(&mut *self.inner.handlers.lock())
    }
}

impl fmt::Debug for NavigateEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavigateEvent")
            .field("init", &self.inner.init)
            .field("default_prevented", &self.default_prevented())
            .field("aborted", &self.signal().aborted())
            .finish_non_exhaustive()
    }
}

/// Signal fired after the current entry changed
#[derive(Debug, Clone)]
pub struct CurrentEntryChangeEvent {
    /// Kind of navigation that caused the change, if known
    pub navigation_type: Option<NavigationType>,
    /// The entry that was current before
    pub from: NavigationEntry,
}

// ============================================================================
// Pop state event
// ============================================================================

/// Legacy pop notification
#[derive(Debug, Clone)]
pub struct PopStateEvent {
    cancelable: bool,
    origin: NavigationOrigin,
    default_prevented: Arc<AtomicBool>,
}

impl PopStateEvent {
    /// Create a non-cancelable pop notification
    pub fn new(origin: NavigationOrigin) -> Self {
        Self {
            cancelable: false,
            origin,
            default_prevented: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancelable(&self) -> bool {
        self.cancelable
    }

    /// Who caused the pop; `User` for real back/forward traversals
    pub fn origin(&self) -> NavigationOrigin {
        self.origin
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented.load(Ordering::SeqCst)
    }

    /// Ignored unless the event is cancelable
    pub fn prevent_default(&self) {
        if self.cancelable {
            self.default_prevented.store(true, Ordering::SeqCst);
        }
    }
}

// ============================================================================
// Host traits
// ============================================================================

/// Listener registration handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

impl ListenerId {
    /// Allocate the next id from `counter`
    pub fn next(counter: &AtomicU64) -> Self {
        ListenerId(counter.fetch_add(1, Ordering::Relaxed))
    }
}

pub type NavigateListener = Arc<dyn Fn(&NavigateEvent) + Send + Sync>;
pub type EntryChangeListener = Arc<dyn Fn(&CurrentEntryChangeEvent) + Send + Sync>;
pub type PopStateListener = Arc<dyn Fn(&PopStateEvent) + Send + Sync>;

/// Intercept-capable navigation primitive
pub trait NavigationApi: Send + Sync {
    fn add_navigate_listener(&self, listener: NavigateListener) -> ListenerId;

    fn add_current_entry_change_listener(&self, listener: EntryChangeListener) -> ListenerId;

    fn remove_listener(&self, id: ListenerId);

    fn current_entry(&self) -> Option<NavigationEntry>;

    /// Number of entries in the history list
    fn entries_len(&self) -> usize;

    /// Whether a backward traversal is possible
    fn can_go_back(&self) -> bool;

    /// Start a navigation; fires the navigate signal
    fn navigate(&self, url: &Url, options: NavigateOptions);

    /// Traverse one entry back, tagging the signal with `info`
    fn back(&self, info: Option<NavigationOrigin>);
}

/// Legacy history surface
pub trait HistoryApi: Send + Sync {
    /// Current document location
    fn location(&self) -> Url;

    /// Push a same-document reference
    fn push_state(&self, reference: &str);

    /// Replace the current entry with a same-document reference
    fn replace_state(&self, reference: &str);

    /// Traverse one entry back
    fn back(&self);

    /// Cross-document navigation
    fn assign(&self, url: &Url);

    fn add_popstate_listener(&self, listener: PopStateListener) -> ListenerId;

    fn remove_listener(&self, id: ListenerId);

    /// Deliver a pop notification to listeners
    fn dispatch_popstate(&self, event: &PopStateEvent);
}

/// The host capabilities available to a router.
///
/// An empty environment stands for a host without a window (server-side
/// rendering): every operation degrades to a no-op.
#[derive(Clone, Default)]
pub struct Environment {
    pub navigation: Option<Arc<dyn NavigationApi>>,
    pub history: Option<Arc<dyn HistoryApi>>,
}

impl Environment {
    /// No host at all
    pub fn detached() -> Self {
        Self::default()
    }

    /// Host with an intercept-capable navigation primitive
    pub fn with_navigation(navigation: Arc<dyn NavigationApi>) -> Self {
        Self {
            navigation: Some(navigation),
            history: None,
        }
    }

    /// Host with the legacy history surface only
    pub fn with_history(history: Arc<dyn HistoryApi>) -> Self {
        Self {
            navigation: None,
            history: Some(history),
        }
    }

    /// Add a legacy history surface
    #[must_use]
    pub fn history(mut self, history: Arc<dyn HistoryApi>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn has_navigation_api(&self) -> bool {
        self.navigation.is_some()
    }

    pub fn is_detached(&self) -> bool {
        self.navigation.is_none() && self.history.is_none()
    }

    /// Current host location, if there is a host
    pub fn location(&self) -> Option<Url> {
        if let Some(navigation) = &self.navigation {
            if let Some(entry) = navigation.current_entry() {
                return Some(entry.url);
            }
        }
        self.history.as_ref().map(|history| history.location())
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("navigation", &self.navigation.is_some())
            .field("history", &self.history.is_some())
            .finish()
    }
}
