//! Navigation event bridge
//!
//! Reconciles host navigation signals with the [`Store`]. The bridge picks a
//! [`BridgeMode`] once when it is mounted:
//!
//! - **Modern** - intercepts `navigate` signals, runs the intercept hook and
//!   commits (or recovers from) each navigation
//! - **Legacy** - follows pop notifications of the history surface
//! - **Detached** - no host; nothing is subscribed
//!
//! A cancelled navigation has already been committed by the host when the
//! hook runs, so the bridge recovers by traversing back with a
//! [`NavigationOrigin::CancelRecovery`] tag. The bridge recognizes that tag
//! and commits the restored location without consulting the hook again.

use crate::error::{ErrorReporter, HookResult, RouterError};
use crate::hooks::{ChangeEvent, ChangeHook, Finish, InterceptHook, SyntheticNavigateEvent};
use crate::host::{
    CurrentEntryChangeEvent, Environment, FocusReset, HistoryApi, ListenerId, NavigateEvent,
    NavigationApi, NavigationEntry, NavigationOrigin, NavigationType, PopStateEvent,
};
use crate::state::{Action, Store};
use crate::{debug_log, info_log, trace_log, Direction};
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};
use url::Url;

/// Which host protocol a bridge follows
#[derive(Clone)]
pub enum BridgeMode {
    Modern(Arc<dyn NavigationApi>),
    Legacy(Arc<dyn HistoryApi>),
    Detached,
}

impl BridgeMode {
    /// Pick the protocol for `environment`.
    ///
    /// `force_legacy` selects the legacy protocol even when an intercept-capable
    /// host exists.
    pub fn select(environment: &Environment, force_legacy: bool) -> Self {
        match (&environment.navigation, &environment.history) {
            (Some(navigation), _) if !force_legacy => BridgeMode::Modern(navigation.clone()),
            (_, Some(history)) => BridgeMode::Legacy(history.clone()),
            _ => BridgeMode::Detached,
        }
    }

    pub fn kind(&self) -> ModeKind {
        match self {
            BridgeMode::Modern(_) => ModeKind::Modern,
            BridgeMode::Legacy(_) => ModeKind::Legacy,
            BridgeMode::Detached => ModeKind::Detached,
        }
    }
}

impl fmt::Debug for BridgeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.kind(), f)
    }
}

/// Protocol tag without the host reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeKind {
    Modern,
    Legacy,
    Detached,
}

/// Direction implied by an entry change
pub fn estimate_direction(
    event: &CurrentEntryChangeEvent,
    current: Option<&NavigationEntry>,
) -> Direction {
    if matches!(
        event.navigation_type,
        Some(NavigationType::Reload | NavigationType::Replace)
    ) {
        return Direction::Unknown;
    }

    match (event.from.index, current.and_then(|entry| entry.index)) {
        (Some(from), Some(to)) if to > from => Direction::Forward,
        (Some(from), Some(to)) if to < from => Direction::Backward,
        _ => Direction::Unknown,
    }
}

/// Listener registrations held for the lifetime of a router
pub struct NavigationBridge {
    mode: BridgeMode,
    listeners: Vec<ListenerId>,
}

impl NavigationBridge {
    /// Subscribe to the host signals of `mode`
    pub fn mount(store: &Arc<Store>, mode: BridgeMode, reporter: ErrorReporter) -> Self {
        let listeners = match &mode {
            BridgeMode::Modern(navigation) => mount_modern(store, navigation, reporter),
            BridgeMode::Legacy(history) => mount_legacy(store, history, reporter),
            BridgeMode::Detached => {
                debug_log!("No navigation host; bridge is detached");
                Vec::new()
            }
        };
        info_log!("Navigation bridge mounted in {:?} mode", mode.kind());
        Self { mode, listeners }
    }

    pub fn mode(&self) -> &BridgeMode {
        &self.mode
    }
}

impl Drop for NavigationBridge {
    fn drop(&mut self) {
        match &self.mode {
            BridgeMode::Modern(navigation) => {
                for id in self.listeners.drain(..) {
                    navigation.remove_listener(id);
                }
            }
            BridgeMode::Legacy(history) => {
                for id in self.listeners.drain(..) {
                    history.remove_listener(id);
                }
            }
            BridgeMode::Detached => {}
        }
        debug_log!("Navigation bridge unmounted");
    }
}

impl fmt::Debug for NavigationBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavigationBridge")
            .field("mode", &self.mode)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

// ============================================================================
// Modern protocol
// ============================================================================

fn mount_modern(
    store: &Arc<Store>,
    navigation: &Arc<dyn NavigationApi>,
    reporter: ErrorReporter,
) -> Vec<ListenerId> {
    let estimate = Arc::new(Mutex::new(Direction::Unknown));

    let entry_change = {
        let estimate = estimate.clone();
        let host = Arc::downgrade(navigation);
        navigation.add_current_entry_change_listener(Arc::new(
            move |event: &CurrentEntryChangeEvent| {
                let current = host.upgrade().and_then(|host| host.current_entry());
                let direction = estimate_direction(event, current.as_ref());
                trace_log!("Entry changed, direction estimate {:?}", direction);
                *estimate.lock() = direction;
            },
        ))
    };

    let navigate = {
        let store = Arc::downgrade(store);
        let host = Arc::downgrade(navigation);
        navigation.add_navigate_listener(Arc::new(move |event: &NavigateEvent| {
            if event.hash_change() || event.download_request().is_some() {
                return;
            }
            if !event.can_intercept() || event.default_prevented() {
                trace_log!("Leaving navigation to {} to the host", event.destination());
                return;
            }

            let context = InterceptContext {
                event: event.clone(),
                store: store.clone(),
                host: host.clone(),
                estimate: estimate.clone(),
                reporter: reporter.clone(),
            };
            event.intercept(
                Box::new(move || context.run().boxed()),
                FocusReset::Manual,
            );
        }))
    };

    vec![entry_change, navigate]
}

/// Everything one interception handler needs
struct InterceptContext {
    event: NavigateEvent,
    store: Weak<Store>,
    host: Weak<dyn NavigationApi>,
    estimate: Arc<Mutex<Direction>>,
    reporter: ErrorReporter,
}

impl InterceptContext {
    async fn run(self) {
        let Some(store) = self.store.upgrade() else {
            return;
        };
        let current_url = self
            .host
            .upgrade()
            .and_then(|host| host.current_entry())
            .map(|entry| entry.url);

        if self.event.info() == Some(NavigationOrigin::CancelRecovery) {
            debug_log!("Restored {} after a cancelled navigation", self.event.destination());
            store.dispatch(Action::Navigate {
                destination: self.event.destination().clone(),
                direction: None,
            });
            return;
        }

        let direction = *self.estimate.lock();
        store.dispatch(Action::SetDirection(direction));
        let hook = store.state().intercept.clone();
        drop(store);

        let reporter = self.reporter.clone();
        let event = self.event.clone();
        let finish = self.finish(current_url, direction);

        match hook {
            None => {
                finish.call();
            }
            Some(InterceptHook::Awaited(hook)) => {
                let synthetic = SyntheticNavigateEvent::new(event);
                match run_hook(move || hook(synthetic)).await {
                    Ok(()) => {
                        finish.call();
                    }
                    Err(error) => {
                        reporter.report(&error);
                        finish.call_allowing();
                    }
                }
            }
            Some(InterceptHook::Deferred(hook)) => {
                let synthetic = SyntheticNavigateEvent::new(event);
                let handed = finish.clone();
                if let Err(error) = run_hook(move || hook(synthetic, handed)).await {
                    reporter.report(&error);
                    finish.call_allowing();
                }
            }
        }
    }

    fn finish(&self, current_url: Option<Url>, direction: Direction) -> Finish {
        let event = self.event.clone();
        let store = self.store.clone();
        let host = self.host.clone();
        let reporter = self.reporter.clone();

        Finish::new(move |honor_cancel| {
            let Some(store) = store.upgrade() else {
                return;
            };

            if honor_cancel && event.default_prevented() {
                if current_url.is_some() {
                    debug_log!("Navigation to {} cancelled, restoring", event.destination());
                    if let Some(host) = host.upgrade() {
                        host.back(Some(NavigationOrigin::CancelRecovery));
                    }
                }
                return;
            }

            if event.signal().aborted() {
                debug_log!("Navigation to {} was superseded", event.destination());
                return;
            }

            store.dispatch(Action::Navigate {
                destination: event.destination().clone(),
                direction: Some(direction),
            });

            if event.navigation_type() == NavigationType::Traverse {
                if let Some(change) = store.state().change.clone() {
                    let change_event = ChangeEvent {
                        url: event.destination().clone(),
                        direction: Direction::Backward,
                        navigation_type: NavigationType::Traverse,
                    };
                    notify_change(&change, &change_event, &reporter);
                }
            }
        })
    }
}

/// Call the change hook, reporting errors and panics instead of propagating
fn notify_change(change: &ChangeHook, event: &ChangeEvent, reporter: &ErrorReporter) {
    match std::panic::catch_unwind(AssertUnwindSafe(|| change.call(event))) {
        Ok(Ok(())) => {}
        Ok(Err(error)) => reporter.report(&RouterError::hook(&error)),
        Err(_) => reporter.report(&RouterError::HookPanicked),
    }
}

/// Run a hook, turning errors and panics into a [`RouterError`]
async fn run_hook<F>(hook: F) -> Result<(), RouterError>
where
    F: FnOnce() -> BoxFuture<'static, HookResult>,
{
    let outcome = AssertUnwindSafe(async move { hook().await })
        .catch_unwind()
        .await;
    match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(error)) => Err(RouterError::hook(&error)),
        Err(_) => Err(RouterError::HookPanicked),
    }
}

// ============================================================================
// Legacy protocol
// ============================================================================

fn mount_legacy(
    store: &Arc<Store>,
    history: &Arc<dyn HistoryApi>,
    reporter: ErrorReporter,
) -> Vec<ListenerId> {
    let store = Arc::downgrade(store);
    let host = Arc::downgrade(history);

    let id = history.add_popstate_listener(Arc::new(move |event: &PopStateEvent| {
        let (Some(store), Some(host)) = (store.upgrade(), host.upgrade()) else {
            return;
        };
        let location = host.location();

        let direction = if event.origin() == NavigationOrigin::User {
            if let Some(change) = store.state().change.clone() {
                let change_event = ChangeEvent {
                    url: location.clone(),
                    direction: Direction::Backward,
                    navigation_type: NavigationType::Traverse,
                };
                notify_change(&change, &change_event, &reporter);
            }
            Direction::Backward
        } else {
            Direction::Unknown
        };

        store.dispatch(Action::Navigate {
            destination: location,
            direction: Some(direction),
        });
    }));

    vec![id]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{MemoryHistory, MemoryNavigation};
    use crate::host::{NavigateEventInit, NavigateOptions};
    use crate::state::NavigationState;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn url(path: &str) -> Url {
        Url::parse("http://localhost/").unwrap().join(path).unwrap()
    }

    fn modern(path: &str) -> (Arc<MemoryNavigation>, Arc<Store>, NavigationBridge) {
        let navigation = MemoryNavigation::new(url(path));
        let store = Store::new(NavigationState::new(url(path)));
        let bridge = NavigationBridge::mount(
            &store,
            BridgeMode::Modern(navigation.clone()),
            ErrorReporter::new(),
        );
        (navigation, store, bridge)
    }

    fn entry(index: Option<usize>) -> NavigationEntry {
        NavigationEntry {
            url: url("/"),
            index,
        }
    }

    #[test]
    fn test_mode_selection() {
        let navigation = MemoryNavigation::new(url("/"));
        let history = MemoryHistory::new(url("/"));
        let both = Environment::with_navigation(navigation).history(history.clone());

        assert_eq!(BridgeMode::select(&both, false).kind(), ModeKind::Modern);
        assert_eq!(BridgeMode::select(&both, true).kind(), ModeKind::Legacy);
        assert_eq!(
            BridgeMode::select(&Environment::with_history(history), false).kind(),
            ModeKind::Legacy
        );
        assert_eq!(
            BridgeMode::select(&Environment::detached(), false).kind(),
            ModeKind::Detached
        );
    }

    #[test]
    fn test_direction_estimate() {
        let push = CurrentEntryChangeEvent {
            navigation_type: Some(NavigationType::Push),
            from: entry(Some(1)),
        };
        assert_eq!(estimate_direction(&push, Some(&entry(Some(2)))), Direction::Forward);
        assert_eq!(estimate_direction(&push, Some(&entry(Some(0)))), Direction::Backward);
        assert_eq!(estimate_direction(&push, Some(&entry(Some(1)))), Direction::Unknown);
        assert_eq!(estimate_direction(&push, None), Direction::Unknown);

        let reload = CurrentEntryChangeEvent {
            navigation_type: Some(NavigationType::Reload),
            from: entry(Some(1)),
        };
        assert_eq!(estimate_direction(&reload, Some(&entry(Some(2)))), Direction::Unknown);
    }

    #[test]
    fn test_modern_commits_forward_navigation() {
        let (navigation, store, _bridge) = modern("/");
        navigation.navigate(&url("/users/alice"), NavigateOptions::default());
        navigation.settle();

        let state = store.state();
        assert_eq!(state.url.path(), "/users/alice");
        assert_eq!(state.direction, Direction::Forward);
    }

    #[test]
    fn test_modern_ignores_hash_and_foreign_navigations() {
        let (navigation, store, _bridge) = modern("/page");
        navigation.navigate(&url("/page#section"), NavigateOptions::default());
        navigation.navigate(
            &Url::parse("https://example.com/").unwrap(),
            NavigateOptions::default(),
        );
        assert_eq!(navigation.settle(), 0);
        assert_eq!(store.state().url.as_str(), "http://localhost/page");
    }

    #[test]
    fn test_prevented_navigation_is_recovered() {
        let (navigation, store, _bridge) = modern("/");
        store.dispatch(Action::RegisterHooks {
            intercept: Some(InterceptHook::from_fn(|event| {
                event.prevent_default();
                Ok(())
            })),
            change: None,
        });

        navigation.navigate(&url("/blocked"), NavigateOptions::default());
        navigation.settle();

        assert_eq!(store.state().url.path(), "/");
        assert_eq!(navigation.current_url().path(), "/");
    }

    #[test]
    fn test_back_runs_change_hook() {
        let (navigation, store, _bridge) = modern("/");
        let changes = Arc::new(Mutex::new(Vec::new()));
        let sink = changes.clone();
        store.dispatch(Action::RegisterHooks {
            intercept: None,
            change: Some(ChangeHook::new(move |event| {
                sink.lock().push((event.url.path().to_string(), event.direction));
                Ok(())
            })),
        });

        navigation.navigate(&url("/a"), NavigateOptions::default());
        navigation.settle();
        navigation.back(None);
        navigation.settle();

        assert_eq!(store.state().url.path(), "/");
        assert_eq!(store.state().direction, Direction::Backward);
        assert_eq!(*changes.lock(), vec![("/".to_string(), Direction::Backward)]);
    }

    #[test]
    fn test_failing_hook_is_reported_and_allows() {
        let navigation = MemoryNavigation::new(url("/"));
        let store = Store::new(NavigationState::new(url("/")));
        let reported = Arc::new(Mutex::new(Vec::new()));
        let sink = reported.clone();
        let _bridge = NavigationBridge::mount(
            &store,
            BridgeMode::Modern(navigation.clone()),
            ErrorReporter::with_callback(move |error| sink.lock().push(error.clone())),
        );
        store.dispatch(Action::RegisterHooks {
            intercept: Some(InterceptHook::from_fn(|event| {
                event.prevent_default();
                Err("hook exploded".into())
            })),
            change: None,
        });

        navigation.navigate(&url("/next"), NavigateOptions::default());
        navigation.settle();

        assert_eq!(store.state().url.path(), "/next");
        let reported = reported.lock();
        assert_eq!(reported.len(), 1);
        assert!(reported[0].is_hook_failure());
    }

    #[test]
    fn test_panicking_hook_is_reported() {
        let navigation = MemoryNavigation::new(url("/"));
        let store = Store::new(NavigationState::new(url("/")));
        let reported = Arc::new(AtomicUsize::new(0));
        let counter = reported.clone();
        let _bridge = NavigationBridge::mount(
            &store,
            BridgeMode::Modern(navigation.clone()),
            ErrorReporter::with_callback(move |error| {
                assert!(matches!(error, RouterError::HookPanicked));
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        store.dispatch(Action::RegisterHooks {
            intercept: Some(InterceptHook::from_fn(|event| {
                if event.destination().path() == "/next" {
                    panic!("boom");
                }
                Ok(())
            })),
            change: None,
        });

        navigation.navigate(&url("/next"), NavigateOptions::default());
        navigation.settle();

        assert_eq!(reported.load(Ordering::SeqCst), 1);
        assert_eq!(store.state().url.path(), "/next");
    }

    #[test]
    fn test_panicking_change_hook_is_reported() {
        let navigation = MemoryNavigation::new(url("/"));
        let store = Store::new(NavigationState::new(url("/")));
        let reported = Arc::new(Mutex::new(Vec::new()));
        let sink = reported.clone();
        let _bridge = NavigationBridge::mount(
            &store,
            BridgeMode::Modern(navigation.clone()),
            ErrorReporter::with_callback(move |error| sink.lock().push(error.clone())),
        );
        store.dispatch(Action::RegisterHooks {
            intercept: None,
            change: Some(ChangeHook::new(|_| panic!("change hook exploded"))),
        });

        navigation.navigate(&url("/a"), NavigateOptions::default());
        navigation.settle();
        navigation.back(None);
        navigation.settle();

        assert_eq!(store.state().url.path(), "/");
        assert!(matches!(
            reported.lock().as_slice(),
            [RouterError::HookPanicked]
        ));

        navigation.navigate(&url("/b"), NavigateOptions::default());
        navigation.settle();
        assert_eq!(store.state().url.path(), "/b");
    }

    #[test]
    fn test_hook_sees_direction_before_commit() {
        let (navigation, store, _bridge) = modern("/");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let observed = Arc::downgrade(&store);
        store.dispatch(Action::RegisterHooks {
            intercept: Some(InterceptHook::from_fn(move |_| {
                if let Some(store) = observed.upgrade() {
                    let state = store.state();
                    sink.lock().push((state.direction, state.url.path().to_string()));
                }
                Ok(())
            })),
            change: None,
        });

        navigation.navigate(&url("/next"), NavigateOptions::default());
        navigation.settle();

        assert_eq!(*seen.lock(), vec![(Direction::Forward, "/".to_string())]);
        assert_eq!(store.state().url.path(), "/next");
    }

    #[test]
    fn test_recovery_tag_skips_hook() {
        let (_navigation, store, _bridge) = modern("/current");
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        store.dispatch(Action::RegisterHooks {
            intercept: Some(InterceptHook::from_fn(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })),
            change: None,
        });

        let mut init = NavigateEventInit::new(url("/previous"), NavigationType::Traverse);
        init.info = Some(NavigationOrigin::CancelRecovery);
        let context = InterceptContext {
            event: NavigateEvent::new(init),
            store: Arc::downgrade(&store),
            host: Weak::<MemoryNavigation>::new(),
            estimate: Arc::new(Mutex::new(Direction::Backward)),
            reporter: ErrorReporter::new(),
        };
        pollster::block_on(context.run());

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.state().url.path(), "/previous");
    }

    #[test]
    fn test_aborted_navigation_never_commits() {
        let (navigation, store, _bridge) = modern("/");
        let parked = Arc::new(Mutex::new(Vec::<Finish>::new()));
        let sink = parked.clone();
        store.dispatch(Action::RegisterHooks {
            intercept: Some(InterceptHook::deferred(move |_, finish| {
                let sink = sink.clone();
                async move {
                    sink.lock().push(finish);
                    Ok(())
                }
            })),
            change: None,
        });

        navigation.navigate(&url("/slow"), NavigateOptions::default());
        navigation.settle();
        navigation.navigate(&url("/fast"), NavigateOptions::default());
        navigation.settle();

        let finishes: Vec<Finish> = parked.lock().drain(..).collect();
        finishes[1].call();
        assert_eq!(store.state().url.path(), "/fast");
        finishes[0].call();
        assert_eq!(store.state().url.path(), "/fast");
    }

    #[test]
    fn test_unmount_removes_listeners() {
        let (navigation, store, bridge) = modern("/");
        drop(bridge);
        navigation.navigate(&url("/after"), NavigateOptions::default());
        assert_eq!(navigation.settle(), 0);
        assert_eq!(store.state().url.path(), "/");
    }

    #[test]
    fn test_legacy_pop_directions() {
        let history = MemoryHistory::new(url("/"));
        let store = Store::new(NavigationState::new(url("/")));
        let _bridge = NavigationBridge::mount(
            &store,
            BridgeMode::Legacy(history.clone()),
            ErrorReporter::new(),
        );
        let changes = Arc::new(AtomicUsize::new(0));
        let counter = changes.clone();
        store.dispatch(Action::RegisterHooks {
            intercept: None,
            change: Some(ChangeHook::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })),
        });

        history.push_state("/a");
        history.dispatch_popstate(&PopStateEvent::new(NavigationOrigin::Router));
        assert_eq!(store.state().url.path(), "/a");
        assert_eq!(store.state().direction, Direction::Unknown);
        assert_eq!(changes.load(Ordering::SeqCst), 0);

        history.back();
        assert_eq!(store.state().url.path(), "/");
        assert_eq!(store.state().direction, Direction::Backward);
        assert_eq!(changes.load(Ordering::SeqCst), 1);
    }
}
