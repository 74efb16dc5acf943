//! GPUI integration
//!
//! Stores a mounted [`Router`] as a GPUI global so any view with access to
//! the app context can read the location or navigate.
//!
//! ```ignore
//! use url_navigator::{init_router, Environment, MemoryNavigation, Navigator, Router};
//!
//! Application::new().run(|cx| {
//!     let host = MemoryNavigation::new(Url::parse("app://local/").unwrap());
//!     init_router(cx, Router::builder().environment(Environment::with_navigation(host)));
//!
//!     Navigator::navigate(cx, "/users/123").unwrap();
//! });
//! ```

use crate::error::RouterError;
use crate::location::Destination;
use crate::router::{NavigateOptions, Router, RouterBuilder, RouterHandle};
use gpui::{App, Global};
use url::Url;

/// The app-wide router
pub struct GlobalRouter {
    router: Router,
}

impl GlobalRouter {
    pub fn new(router: Router) -> Self {
        Self { router }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn handle(&self) -> RouterHandle {
        self.router.handle()
    }
}

impl Global for GlobalRouter {}

/// Mount `builder` and install it as the global router.
///
/// A previously installed router is dropped, which unmounts it.
pub fn init_router(cx: &mut App, builder: RouterBuilder) -> RouterHandle {
    let router = GlobalRouter::new(builder.mount());
    let handle = router.handle();
    cx.set_global(router);
    handle
}

/// Static navigation helpers over the global router.
///
/// Without an installed router every call fails with
/// [`RouterError::NotMounted`].
pub struct Navigator;

impl Navigator {
    /// Handle of the global router
    pub fn handle(cx: &App) -> RouterHandle {
        cx.try_global::<GlobalRouter>()
            .map(GlobalRouter::handle)
            .unwrap_or_else(RouterHandle::unmounted)
    }

    /// Push `destination`
    pub fn navigate(cx: &App, destination: impl Into<Destination>) -> Result<(), RouterError> {
        Self::handle(cx).navigate(destination, NavigateOptions::default())
    }

    /// Replace the current entry with `destination`
    pub fn replace(cx: &App, destination: impl Into<Destination>) -> Result<(), RouterError> {
        Self::handle(cx).navigate(destination, NavigateOptions::replace())
    }

    pub fn back(cx: &App) -> Result<(), RouterError> {
        Self::handle(cx).back(None)
    }

    pub fn location(cx: &App) -> Result<Url, RouterError> {
        Self::handle(cx).location()
    }

    /// Current pathname, empty when no router is installed
    pub fn current_path(cx: &App) -> String {
        Self::handle(cx).pathname().unwrap_or_default()
    }
}

#[cfg(all(test, feature = "test-support"))]
mod tests {
    use super::*;
    use crate::history::MemoryNavigation;
    use crate::host::Environment;
    use gpui::TestAppContext;
    use std::sync::Arc;

    fn host(path: &str) -> Arc<MemoryNavigation> {
        MemoryNavigation::new(Url::parse("http://localhost/").unwrap().join(path).unwrap())
    }

    #[gpui::test]
    fn test_navigate_through_global(cx: &mut TestAppContext) {
        let navigation = host("/");
        let environment = Environment::with_navigation(navigation.clone());
        cx.update(|cx| {
            init_router(cx, Router::builder().environment(environment));
        });
        assert_eq!(cx.read(Navigator::current_path), "/");

        cx.update(|cx| Navigator::navigate(cx, "/users/123")).unwrap();
        navigation.settle();
        assert_eq!(cx.read(Navigator::current_path), "/users/123");

        cx.update(|cx| Navigator::back(cx)).unwrap();
        navigation.settle();
        assert_eq!(cx.read(Navigator::current_path), "/");
    }

    #[gpui::test]
    fn test_replace_keeps_entry_count(cx: &mut TestAppContext) {
        let navigation = host("/login");
        let environment = Environment::with_navigation(navigation.clone());
        cx.update(|cx| {
            init_router(cx, Router::builder().environment(environment));
        });

        cx.update(|cx| Navigator::replace(cx, "/home")).unwrap();
        navigation.settle();

        assert_eq!(cx.read(Navigator::current_path), "/home");
        assert_eq!(navigation.entries().len(), 1);
    }

    #[gpui::test]
    fn test_without_router(cx: &mut TestAppContext) {
        assert_eq!(cx.read(Navigator::current_path), "");
        let result = cx.update(|cx| Navigator::navigate(cx, "/x"));
        assert!(matches!(result, Err(RouterError::NotMounted)));
    }
}
