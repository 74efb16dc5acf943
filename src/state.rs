//! Navigation state store
//!
//! The store holds one immutable [`NavigationState`] snapshot behind an `Arc`.
//! Every change goes through [`reduce`]: an action that changes nothing returns
//! the very same `Arc`, so subscribers are only notified when the snapshot
//! identity changes.

use crate::hooks::{ChangeHook, InterceptHook};
use crate::location::null_origin;
use crate::matcher::{Matcher, RegexMatcher};
use crate::{debug_log, trace_log, Direction};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use url::Url;

/// Snapshot of the router state
#[derive(Clone)]
pub struct NavigationState {
    /// Current location
    pub url: Url,
    /// Matcher used by `Routes` and `RouterHandle::matches`
    pub matcher: Arc<dyn Matcher>,
    pub intercept: Option<InterceptHook>,
    pub change: Option<ChangeHook>,
    /// Direction of the last navigation
    pub direction: Direction,
}

impl NavigationState {
    /// State at `url` with the default matcher and no hooks
    pub fn new(url: Url) -> Self {
        Self {
            url,
            matcher: Arc::new(RegexMatcher::new()),
            intercept: None,
            change: None,
            direction: Direction::Unknown,
        }
    }

    /// Replace the matcher
    #[must_use]
    pub fn with_matcher(mut self, matcher: Arc<dyn Matcher>) -> Self {
        self.matcher = matcher;
        self
    }
}

impl fmt::Debug for NavigationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavigationState")
            .field("url", &self.url.as_str())
            .field("matcher", &self.matcher.name())
            .field("intercept", &self.intercept)
            .field("change", &self.change)
            .field("direction", &self.direction)
            .finish()
    }
}

/// State transitions
#[derive(Debug, Clone)]
pub enum Action {
    /// Replace both hook references
    RegisterHooks {
        intercept: Option<InterceptHook>,
        change: Option<ChangeHook>,
    },
    /// Move to `destination`; `direction` overrides the stored one
    Navigate {
        destination: Url,
        direction: Option<Direction>,
    },
    SetDirection(Direction),
}

/// Compute the next snapshot.
///
/// Returns `state` itself when the action is a no-op: navigating to the
/// current URL, or setting the current direction.
pub fn reduce(state: &Arc<NavigationState>, action: Action) -> Arc<NavigationState> {
    match action {
        Action::RegisterHooks { intercept, change } => Arc::new(NavigationState {
            intercept,
            change,
            ..(**state).clone()
        }),
        Action::Navigate {
            destination,
            direction,
        } => {
            if destination.as_str() == state.url.as_str() {
                return state.clone();
            }
            Arc::new(NavigationState {
                url: destination,
                direction: direction.unwrap_or(state.direction),
                ..(**state).clone()
            })
        }
        Action::SetDirection(direction) => {
            if direction == state.direction {
                return state.clone();
            }
            Arc::new(NavigationState {
                direction,
                ..(**state).clone()
            })
        }
    }
}

/// Callback notified with each new snapshot
pub type StateListener = Arc<dyn Fn(&Arc<NavigationState>) + Send + Sync>;

/// Holder of the current snapshot
pub struct Store {
    state: Mutex<Arc<NavigationState>>,
    listeners: Mutex<Vec<(u64, StateListener)>>,
    next_id: AtomicU64,
}

impl Store {
    /// Create a store with an initial snapshot
    pub fn new(initial: NavigationState) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(Arc::new(initial)),
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        })
    }

    /// Current snapshot
    pub fn state(&self) -> Arc<NavigationState> {
        self.state.lock().clone()
    }

    /// Apply an action.
    ///
    /// Returns `true` if the snapshot changed and subscribers were notified.
    pub fn dispatch(&self, action: Action) -> bool {
        trace_log!("Dispatching {:?}", action);
        let next = {
            let mut state = self.state.lock();
            let next = reduce(&state, action);
            if Arc::ptr_eq(&next, &state) {
                return false;
            }
            *state = next.clone();
            next
        };

        debug_log!("Navigation state now at {}", next.url);
        let listeners: Vec<StateListener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(&next);
        }
        true
    }

    /// Register a listener; dropping the subscription removes it
    pub fn subscribe(self: &Arc<Self>, listener: StateListener) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push((id, listener));
        Subscription {
            store: Arc::downgrade(self),
            id,
        }
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    fn unsubscribe(&self, id: u64) {
        self.listeners.lock().retain(|(existing, _)| *existing != id);
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("state", &*self.state.lock())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Guard returned by [`Store::subscribe`]
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    store: Weak<Store>,
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(store) = self.store.upgrade() {
            store.unsubscribe(self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Initial location of a router.
///
/// Starts from the host location (or the null origin when there is none) and
/// overrides its path and query with the given ones.
pub fn initial_url(host: Option<&Url>, pathname: Option<&str>, search: Option<&str>) -> Url {
    let mut url = host.cloned().unwrap_or_else(null_origin);
    if let Some(pathname) = pathname {
        url.set_path(pathname);
    }
    if let Some(search) = search {
        let search = search.strip_prefix('?').unwrap_or(search);
        url.set_query((!search.is_empty()).then_some(search));
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn state() -> Arc<NavigationState> {
        Arc::new(NavigationState::new(url("http://localhost/users/test1")))
    }

    #[test]
    fn test_navigate_to_same_url_keeps_identity() {
        let state = state();
        let next = reduce(
            &state,
            Action::Navigate {
                destination: url("http://localhost/users/test1"),
                direction: Some(Direction::Forward),
            },
        );
        assert!(Arc::ptr_eq(&state, &next));
    }

    #[test]
    fn test_navigate_updates_url_and_direction() {
        let state = state();
        let next = reduce(
            &state,
            Action::Navigate {
                destination: url("http://localhost/users/alice"),
                direction: Some(Direction::Backward),
            },
        );
        assert_eq!(next.url.path(), "/users/alice");
        assert_eq!(next.direction, Direction::Backward);

        let kept = reduce(
            &next,
            Action::Navigate {
                destination: url("http://localhost/users/bob"),
                direction: None,
            },
        );
        assert_eq!(kept.direction, Direction::Backward);
    }

    #[test]
    fn test_set_direction_identity() {
        let state = state();
        assert!(Arc::ptr_eq(
            &state,
            &reduce(&state, Action::SetDirection(Direction::Unknown))
        ));
        let next = reduce(&state, Action::SetDirection(Direction::Forward));
        assert_eq!(next.direction, Direction::Forward);
        assert_eq!(next.url, state.url);
    }

    #[test]
    fn test_register_hooks_replaces_both() {
        let state = state();
        let with_hooks = reduce(
            &state,
            Action::RegisterHooks {
                intercept: Some(InterceptHook::from_fn(|_| Ok(()))),
                change: Some(ChangeHook::new(|_| Ok(()))),
            },
        );
        assert!(with_hooks.intercept.is_some());
        assert!(with_hooks.change.is_some());

        let cleared = reduce(
            &with_hooks,
            Action::RegisterHooks {
                intercept: None,
                change: None,
            },
        );
        assert!(cleared.intercept.is_none());
        assert!(cleared.change.is_none());
    }

    #[test]
    fn test_store_notifies_only_on_change() {
        let store = Store::new(NavigationState::new(url("http://localhost/")));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let subscription = store.subscribe(Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert!(store.dispatch(Action::Navigate {
            destination: url("http://localhost/a"),
            direction: None,
        }));
        assert!(!store.dispatch(Action::Navigate {
            destination: url("http://localhost/a"),
            direction: None,
        }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        drop(subscription);
        assert_eq!(store.listener_count(), 0);
        store.dispatch(Action::SetDirection(Direction::Forward));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listener_may_dispatch() {
        let store = Store::new(NavigationState::new(url("http://localhost/")));
        let weak = Arc::downgrade(&store);
        let _subscription = store.subscribe(Arc::new(move |state| {
            if state.url.path() == "/redirect" {
                if let Some(store) = weak.upgrade() {
                    store.dispatch(Action::Navigate {
                        destination: url("http://localhost/target"),
                        direction: None,
                    });
                }
            }
        }));

        store.dispatch(Action::Navigate {
            destination: url("http://localhost/redirect"),
            direction: None,
        });
        assert_eq!(store.state().url.path(), "/target");
    }

    #[test]
    fn test_initial_url() {
        let host = url("https://example.com/current?x=1#frag");
        assert_eq!(
            initial_url(Some(&host), None, None).as_str(),
            "https://example.com/current?x=1#frag"
        );
        assert_eq!(
            initial_url(Some(&host), Some("/users/test1"), Some("?tab=2")).as_str(),
            "https://example.com/users/test1?tab=2#frag"
        );
        assert_eq!(
            initial_url(None, Some("/users/test1"), Some("")).as_str(),
            "http://null/users/test1"
        );
    }
}
