//! In-memory hosts
//!
//! Hosts for tests and for applications that own their history themselves
//! (desktop shells, embedded webviews without a browser history):
//!
//! - [`MemoryNavigation`] implements [`NavigationApi`]: it fires navigate
//!   signals, commits entries and runs interception handlers
//! - [`MemoryHistory`] implements the legacy [`HistoryApi`]
//!
//! Both keep an [`EntryStack`] with forward truncation on push and an optional
//! size limit.

use crate::host::{
    AbortSignal, CurrentEntryChangeEvent, EntryChangeListener, HistoryApi, HistoryBehavior,
    ListenerId, NavigateEvent, NavigateEventInit, NavigateListener, NavigateOptions,
    NavigationApi, NavigationEntry, NavigationOrigin, NavigationType, PopStateEvent,
    PopStateListener,
};
use crate::{debug_log, trace_log, warn_log};
use futures::future::BoxFuture;
use futures::task::noop_waker_ref;
use futures::FutureExt;
use parking_lot::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::task::{Context, Poll};
use url::Url;

/// Default maximum number of entries
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

/// Stack of visited URLs with a cursor
#[derive(Debug, Clone)]
pub struct EntryStack {
    entries: Vec<Url>,
    current: usize,
    /// Maximum number of entries (0 = unlimited)
    max_size: usize,
}

impl EntryStack {
    /// Create a stack holding only `initial`
    pub fn new(initial: Url) -> Self {
        Self::with_max_size(initial, DEFAULT_MAX_ENTRIES)
    }

    /// Create with custom max size
    pub fn with_max_size(initial: Url, max_size: usize) -> Self {
        Self {
            entries: vec![initial],
            current: 0,
            max_size,
        }
    }

    pub fn current_url(&self) -> &Url {
        &self.entries[self.current]
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Current entry as seen by a navigation host
    pub fn current_entry(&self) -> NavigationEntry {
        NavigationEntry {
            url: self.current_url().clone(),
            index: Some(self.current),
        }
    }

    pub fn get(&self, index: usize) -> Option<&Url> {
        self.entries.get(index)
    }

    /// Push a new entry, dropping forward entries.
    ///
    /// Returns how many of the oldest entries were evicted by the size limit.
    pub fn push(&mut self, url: Url) -> usize {
        self.entries.truncate(self.current + 1);
        self.entries.push(url);
        self.current += 1;
        self.enforce_size_limit()
    }

    /// Replace the current entry
    pub fn replace(&mut self, url: Url) {
        self.entries[self.current] = url;
    }

    /// Move the cursor to `index`; out of range is ignored
    pub fn traverse_to(&mut self, index: usize) -> bool {
        if index < self.entries.len() {
            self.current = index;
            true
        } else {
            false
        }
    }

    pub fn can_go_back(&self) -> bool {
        self.current > 0
    }

    pub fn can_go_forward(&self) -> bool {
        self.current + 1 < self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Never true in practice; the stack always holds its current entry
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Url] {
        &self.entries
    }

    fn enforce_size_limit(&mut self) -> usize {
        if self.max_size > 0 && self.entries.len() > self.max_size {
            let excess = self.entries.len() - self.max_size;
            self.entries.drain(0..excess);
            self.current = self.current.saturating_sub(excess);
            excess
        } else {
            0
        }
    }
}

/// How a navigation changes the stack once committed
enum Commit {
    Push(Url),
    Replace(Url),
    Traverse(usize),
}

fn is_fragment_change(from: &Url, to: &Url) -> bool {
    if from.fragment() == to.fragment() {
        return false;
    }
    let mut from = from.clone();
    let mut to = to.clone();
    from.set_fragment(None);
    to.set_fragment(None);
    from == to
}

// ============================================================================
// MemoryNavigation
// ============================================================================

#[derive(Default)]
struct NavigationListeners {
    navigate: Vec<(ListenerId, NavigateListener)>,
    entry_change: Vec<(ListenerId, EntryChangeListener)>,
}

/// In-memory [`NavigationApi`].
///
/// Navigations fire synchronously. Interception handlers are started when
/// the entry is committed and driven by [`settle`](Self::settle), which polls
/// them with a no-op waker until none of them can make progress; handlers
/// waiting on something external stay pending across calls.
pub struct MemoryNavigation {
    stack: Mutex<EntryStack>,
    listeners: Mutex<NavigationListeners>,
    pending: Mutex<Vec<BoxFuture<'static, ()>>>,
    in_flight: Mutex<Option<AbortSignal>>,
    next_id: AtomicU64,
}

impl MemoryNavigation {
    /// Create a host whose only entry is `initial`
    pub fn new(initial: Url) -> Arc<Self> {
        Self::with_max_size(initial, DEFAULT_MAX_ENTRIES)
    }

    /// Create with a custom entry limit
    pub fn with_max_size(initial: Url, max_size: usize) -> Arc<Self> {
        Arc::new(Self {
            stack: Mutex::new(EntryStack::with_max_size(initial, max_size)),
            listeners: Mutex::new(NavigationListeners::default()),
            pending: Mutex::new(Vec::new()),
            in_flight: Mutex::new(None),
            next_id: AtomicU64::new(1),
        })
    }

    /// Current URL
    pub fn current_url(&self) -> Url {
        self.stack.lock().current_url().clone()
    }

    /// Snapshot of every entry
    pub fn entries(&self) -> Vec<Url> {
        self.stack.lock().entries().to_vec()
    }

    /// Traverse one entry forward
    pub fn forward(&self, info: Option<NavigationOrigin>) {
        let target = {
            let stack = self.stack.lock();
            if !stack.can_go_forward() {
                return;
            }
            stack.current_index() + 1
        };
        self.traverse(target, info);
    }

    /// Number of handlers still running
    pub fn pending_handlers(&self) -> usize {
        self.pending.lock().len()
    }

    /// Drive interception handlers until none can make progress.
    ///
    /// Returns the number of handlers left pending.
    pub fn settle(&self) -> usize {
        let mut cx = Context::from_waker(noop_waker_ref());

        loop {
            let batch = std::mem::take(&mut *self.pending.lock());
            if batch.is_empty() {
                return 0;
            }

            let mut progressed = false;
            let mut waiting = Vec::with_capacity(batch.len());
            for mut future in batch {
                match future.poll_unpin(&mut cx) {
                    Poll::Ready(()) => progressed = true,
                    Poll::Pending => waiting.push(future),
                }
            }

            let mut pending = self.pending.lock();
            let started_more = !pending.is_empty();
            waiting.append(&mut pending);
            *pending = waiting;

            if !progressed && !started_more {
                trace_log!("{} interception handler(s) still pending", pending.len());
                return pending.len();
            }
        }
    }

    fn traverse(&self, target: usize, info: Option<NavigationOrigin>) {
        let (current, destination) = {
            let stack = self.stack.lock();
            match stack.get(target) {
                Some(url) => (stack.current_url().clone(), url.clone()),
                None => return,
            }
        };

        let mut init = NavigateEventInit::new(destination.clone(), NavigationType::Traverse);
        init.can_intercept = current.origin() == destination.origin();
        init.hash_change = is_fragment_change(&current, &destination);
        init.same_document = init.hash_change;
        init.info = info;

        self.dispatch(init, Commit::Traverse(target));
    }

    fn dispatch(&self, init: NavigateEventInit, commit: Commit) {
        if let Some(previous) = self.in_flight.lock().take() {
            if !previous.aborted() {
                debug_log!("Aborting in-flight navigation");
                previous.abort();
            }
        }

        let navigation_type = init.navigation_type;
        let event = NavigateEvent::new(init);

        let listeners: Vec<NavigateListener> = self
            .listeners
            .lock()
            .navigate
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(&event);
        }

        if event.default_prevented() {
            debug_log!("Navigation to {} cancelled before commit", event.destination());
            return;
        }

        let handlers = event.take_handlers();
        let from = self.commit(commit);
        trace_log!("Committed {:?} navigation to {}", navigation_type, event.destination());

        let change = CurrentEntryChangeEvent {
            navigation_type: Some(navigation_type),
            from,
        };
        let listeners: Vec<EntryChangeListener> = self
            .listeners
            .lock()
            .entry_change
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(&change);
        }

        if handlers.is_empty() {
            return;
        }

        *self.in_flight.lock() = Some(event.signal().clone());
        let mut started: Vec<BoxFuture<'static, ()>> =
            handlers.into_iter().map(|(handler, _)| handler()).collect();
        self.pending.lock().append(&mut started);
    }

    /// Apply `commit`, returning the previously current entry with its index
    /// adjusted for evictions
    fn commit(&self, commit: Commit) -> NavigationEntry {
        let mut stack = self.stack.lock();
        let mut from = stack.current_entry();
        match commit {
            Commit::Push(url) => {
                let evicted = stack.push(url);
                from.index = from.index.and_then(|index| index.checked_sub(evicted));
            }
            Commit::Replace(url) => {
                stack.replace(url);
                from.index = None;
            }
            Commit::Traverse(index) => {
                stack.traverse_to(index);
            }
        }
        from
    }
}

impl NavigationApi for MemoryNavigation {
    fn add_navigate_listener(&self, listener: NavigateListener) -> ListenerId {
        let id = ListenerId::next(&self.next_id);
        self.listeners.lock().navigate.push((id, listener));
        id
    }

    fn add_current_entry_change_listener(&self, listener: EntryChangeListener) -> ListenerId {
        let id = ListenerId::next(&self.next_id);
        self.listeners.lock().entry_change.push((id, listener));
        id
    }

    fn remove_listener(&self, id: ListenerId) {
        let mut listeners = self.listeners.lock();
        listeners.navigate.retain(|(existing, _)| *existing != id);
        listeners.entry_change.retain(|(existing, _)| *existing != id);
    }

    fn current_entry(&self) -> Option<NavigationEntry> {
        Some(self.stack.lock().current_entry())
    }

    fn entries_len(&self) -> usize {
        self.stack.lock().len()
    }

    fn can_go_back(&self) -> bool {
        self.stack.lock().can_go_back()
    }

    fn navigate(&self, url: &Url, options: NavigateOptions) {
        let current = self.current_url();
        let navigation_type = match options.history {
            HistoryBehavior::Replace => NavigationType::Replace,
            HistoryBehavior::Auto if *url == current => NavigationType::Replace,
            _ => NavigationType::Push,
        };

        let mut init = NavigateEventInit::new(url.clone(), navigation_type);
        init.can_intercept = current.origin() == url.origin();
        init.hash_change = is_fragment_change(&current, url);
        init.same_document = init.hash_change;
        init.info = options.info;

        let commit = match navigation_type {
            NavigationType::Replace => Commit::Replace(url.clone()),
            _ => Commit::Push(url.clone()),
        };
        self.dispatch(init, commit);
    }

    fn back(&self, info: Option<NavigationOrigin>) {
        let target = {
            let stack = self.stack.lock();
            if !stack.can_go_back() {
                return;
            }
            stack.current_index() - 1
        };
        self.traverse(target, info);
    }
}

// ============================================================================
// MemoryHistory
// ============================================================================

/// In-memory legacy [`HistoryApi`].
///
/// `push_state` and `replace_state` are silent like their browser
/// counterparts; only [`back`](HistoryApi::back) and
/// [`forward`](Self::forward) emit pop notifications. Cross-document loads
/// requested through `assign` are recorded rather than performed.
pub struct MemoryHistory {
    stack: Mutex<EntryStack>,
    listeners: Mutex<Vec<(ListenerId, PopStateListener)>>,
    assigned: Mutex<Vec<Url>>,
    next_id: AtomicU64,
}

impl MemoryHistory {
    /// Create a history whose only entry is `initial`
    pub fn new(initial: Url) -> Arc<Self> {
        Arc::new(Self {
            stack: Mutex::new(EntryStack::new(initial)),
            listeners: Mutex::new(Vec::new()),
            assigned: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        })
    }

    /// Snapshot of every entry
    pub fn entries(&self) -> Vec<Url> {
        self.stack.lock().entries().to_vec()
    }

    /// Cross-document loads requested so far
    pub fn assigned(&self) -> Vec<Url> {
        self.assigned.lock().clone()
    }

    /// Traverse one entry forward
    pub fn forward(&self) {
        let moved = {
            let mut stack = self.stack.lock();
            stack.can_go_forward() && {
                let next = stack.current_index() + 1;
                stack.traverse_to(next)
            }
        };
        if moved {
            self.dispatch_popstate(&PopStateEvent::new(NavigationOrigin::User));
        }
    }

    fn resolve(&self, reference: &str) -> Option<Url> {
        let current = self.location();
        match current.join(reference) {
            Ok(url) if url.origin() == current.origin() => Some(url),
            Ok(url) => {
                warn_log!("Refusing cross-origin history entry {}", url);
                None
            }
            Err(error) => {
                warn_log!("Invalid history reference '{}': {}", reference, error);
                None
            }
        }
    }
}

impl HistoryApi for MemoryHistory {
    fn location(&self) -> Url {
        self.stack.lock().current_url().clone()
    }

    fn push_state(&self, reference: &str) {
        if let Some(url) = self.resolve(reference) {
            self.stack.lock().push(url);
        }
    }

    fn replace_state(&self, reference: &str) {
        if let Some(url) = self.resolve(reference) {
            self.stack.lock().replace(url);
        }
    }

    fn back(&self) {
        let moved = {
            let mut stack = self.stack.lock();
            stack.can_go_back() && {
                let previous = stack.current_index() - 1;
                stack.traverse_to(previous)
            }
        };
        if moved {
            self.dispatch_popstate(&PopStateEvent::new(NavigationOrigin::User));
        }
    }

    fn assign(&self, url: &Url) {
        debug_log!("Cross-document navigation to {}", url);
        self.assigned.lock().push(url.clone());
    }

    fn add_popstate_listener(&self, listener: PopStateListener) -> ListenerId {
        let id = ListenerId::next(&self.next_id);
        self.listeners.lock().push((id, listener));
        id
    }

    fn remove_listener(&self, id: ListenerId) {
        self.listeners.lock().retain(|(existing, _)| *existing != id);
    }

    fn dispatch_popstate(&self, event: &PopStateEvent) {
        let listeners: Vec<PopStateListener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(event);
        }
    }
}
