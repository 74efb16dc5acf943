//! Navigation hooks
//!
//! Two optional hooks can be registered with a router:
//!
//! - an [`InterceptHook`], run for every intercepted navigation before it is
//!   committed to the store; it may cancel the navigation through
//!   [`SyntheticNavigateEvent::prevent_default`]
//! - a [`ChangeHook`], notified after a backward traversal was committed
//!
//! Intercept hooks come in two shapes. An [`InterceptHook::Awaited`] hook is
//! finished when its future resolves. An [`InterceptHook::Deferred`] hook
//! receives a [`Finish`] continuation and decides itself when the navigation
//! proceeds.
//!
//! # Example
//!
//! ```
//! use url_navigator::InterceptHook;
//!
//! let confirm_leave = InterceptHook::awaited(|event| async move {
//!     if event.destination().path() == "/admin" {
//!         event.prevent_default();
//!     }
//!     Ok(())
//! });
//! assert!(!confirm_leave.manages_finish());
//! ```

use crate::error::HookResult;
use crate::host::{AbortSignal, NavigateEvent, NavigationType};
use crate::Direction;
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use url::Url;

/// The subset of a navigate signal exposed to intercept hooks
#[derive(Clone)]
pub struct SyntheticNavigateEvent {
    event: NavigateEvent,
}

impl SyntheticNavigateEvent {
    pub(crate) fn new(event: NavigateEvent) -> Self {
        Self { event }
    }

    /// Cancel the navigation
    pub fn prevent_default(&self) {
        self.event.prevent_default();
    }

    pub fn default_prevented(&self) -> bool {
        self.event.default_prevented()
    }

    pub fn cancelable(&self) -> bool {
        self.event.cancelable()
    }

    pub fn signal(&self) -> &AbortSignal {
        self.event.signal()
    }

    pub fn navigation_type(&self) -> NavigationType {
        self.event.navigation_type()
    }

    pub fn destination(&self) -> &Url {
        self.event.destination()
    }
}

impl fmt::Debug for SyntheticNavigateEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntheticNavigateEvent")
            .field("destination", &self.destination().as_str())
            .field("navigation_type", &self.navigation_type())
            .field("default_prevented", &self.default_prevented())
            .finish()
    }
}

/// Payload of a [`ChangeHook`] call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Location after the change
    pub url: Url,
    /// Always [`Direction::Backward`] for now
    pub direction: Direction,
    pub navigation_type: NavigationType,
}

// ============================================================================
// Finish continuation
// ============================================================================

type FinishFn = Box<dyn FnOnce(bool) + Send>;

/// Continuation that lets an intercepted navigation proceed.
///
/// Calling it more than once has no effect.
#[derive(Clone)]
pub struct Finish {
    inner: Arc<Mutex<Option<FinishFn>>>,
}

impl Finish {
    /// `f` receives whether a prevented event should be honored
    pub(crate) fn new<F>(f: F) -> Self
    where
        F: FnOnce(bool) + Send + 'static,
    {
        Self {
            inner: Arc::new(Mutex::new(Some(Box::new(f)))),
        }
    }

    /// Let the navigation proceed (or recover, if it was prevented).
    ///
    /// Returns `false` if the continuation already ran.
    pub fn call(&self) -> bool {
        self.run(true)
    }

    /// Proceed as if the event had not been prevented
    pub(crate) fn call_allowing(&self) -> bool {
        self.run(false)
    }

    pub fn is_called(&self) -> bool {
        self.inner.lock().is_none()
    }

    fn run(&self, honor_cancel: bool) -> bool {
        let f = self.inner.lock().take();
        match f {
            Some(f) => {
                f(honor_cancel);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for Finish {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Finish")
            .field("called", &self.is_called())
            .finish()
    }
}

// ============================================================================
// Hooks
// ============================================================================

type AwaitedFn = dyn Fn(SyntheticNavigateEvent) -> BoxFuture<'static, HookResult> + Send + Sync;
type DeferredFn =
    dyn Fn(SyntheticNavigateEvent, Finish) -> BoxFuture<'static, HookResult> + Send + Sync;

/// Hook run before an intercepted navigation is committed
#[derive(Clone)]
pub enum InterceptHook {
    /// The navigation proceeds when the returned future resolves
    Awaited(Arc<AwaitedFn>),
    /// The hook calls [`Finish`] itself
    Deferred(Arc<DeferredFn>),
}

impl InterceptHook {
    /// Hook finished by its future
    pub fn awaited<F, Fut>(hook: F) -> Self
    where
        F: Fn(SyntheticNavigateEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        InterceptHook::Awaited(Arc::new(move |event| hook(event).boxed()))
    }

    /// Hook that receives the finish continuation
    pub fn deferred<F, Fut>(hook: F) -> Self
    where
        F: Fn(SyntheticNavigateEvent, Finish) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        InterceptHook::Deferred(Arc::new(move |event, finish| hook(event, finish).boxed()))
    }

    /// Synchronous hook
    pub fn from_fn<F>(hook: F) -> Self
    where
        F: Fn(&SyntheticNavigateEvent) -> HookResult + Send + Sync + 'static,
    {
        InterceptHook::Awaited(Arc::new(move |event| {
            let result = hook(&event);
            futures::future::ready(result).boxed()
        }))
    }

    /// Whether the hook calls [`Finish`] itself
    pub fn manages_finish(&self) -> bool {
        matches!(self, InterceptHook::Deferred(_))
    }
}

impl fmt::Debug for InterceptHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterceptHook::Awaited(_) => f.write_str("InterceptHook::Awaited"),
            InterceptHook::Deferred(_) => f.write_str("InterceptHook::Deferred"),
        }
    }
}

/// Hook notified after a backward traversal
#[derive(Clone)]
pub struct ChangeHook {
    hook: Arc<dyn Fn(&ChangeEvent) -> HookResult + Send + Sync>,
}

impl ChangeHook {
    pub fn new<F>(hook: F) -> Self
    where
        F: Fn(&ChangeEvent) -> HookResult + Send + Sync + 'static,
    {
        Self {
            hook: Arc::new(hook),
        }
    }

    pub fn call(&self, event: &ChangeEvent) -> HookResult {
        (self.hook)(event)
    }
}

impl fmt::Debug for ChangeHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ChangeHook")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::NavigateEventInit;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn synthetic(path: &str) -> SyntheticNavigateEvent {
        let url = Url::parse("http://localhost/").unwrap().join(path).unwrap();
        SyntheticNavigateEvent::new(NavigateEvent::new(NavigateEventInit::new(
            url,
            NavigationType::Push,
        )))
    }

    #[test]
    fn test_finish_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let finish = Finish::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let copy = finish.clone();
        assert!(finish.call());
        assert!(!copy.call());
        assert!(!finish.call_allowing());
        assert!(copy.is_called());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_finish_passes_cancel_mode() {
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        let finish = Finish::new(move |honor| *sink.lock() = Some(honor));
        finish.call_allowing();
        assert_eq!(*seen.lock(), Some(false));
    }

    #[test]
    fn test_awaited_hook_can_prevent() {
        let hook = InterceptHook::awaited(|event: SyntheticNavigateEvent| async move {
            event.prevent_default();
            Ok(())
        });

        let event = synthetic("/a");
        let InterceptHook::Awaited(f) = &hook else {
            panic!("expected awaited hook");
        };
        pollster::block_on(f(event.clone())).unwrap();
        assert!(event.default_prevented());
    }

    #[test]
    fn test_from_fn_errors_surface() {
        let hook = InterceptHook::from_fn(|_| Err("nope".into()));
        let InterceptHook::Awaited(f) = &hook else {
            panic!("expected awaited hook");
        };
        let result = pollster::block_on(f(synthetic("/a")));
        assert_eq!(result.unwrap_err().to_string(), "nope");
    }

    #[test]
    fn test_deferred_hook_reports_shape() {
        let hook = InterceptHook::deferred(|_, finish: Finish| async move {
            finish.call();
            Ok(())
        });
        assert!(hook.manages_finish());
        assert_eq!(format!("{:?}", hook), "InterceptHook::Deferred");
    }

    #[test]
    fn test_change_hook_call() {
        let hook = ChangeHook::new(|event| {
            assert_eq!(event.direction, Direction::Backward);
            Ok(())
        });
        let event = ChangeEvent {
            url: Url::parse("http://localhost/back").unwrap(),
            direction: Direction::Backward,
            navigation_type: NavigationType::Traverse,
        };
        assert!(hook.call(&event).is_ok());
    }
}
