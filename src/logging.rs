//! Logging facade
//!
//! The router logs through either the `log` crate (default feature) or the
//! `tracing` crate (`tracing` feature). Enable exactly one of them; with
//! neither enabled every macro expands to nothing.
//!
//! Levels used by the crate:
//!
//! - `trace` - pattern compilation and cache traffic
//! - `debug` - navigation decisions taken by the bridge and the store
//! - `info` - router mount / unmount
//! - `warn` - degraded environments (no host, unsupported requests)
//! - `error` - hook failures routed through the error reporter
//!
//! ```ignore
//! use url_navigator::{debug_log, warn_log};
//!
//! debug_log!("committing navigation to {}", url);
//! warn_log!("no navigation host, ignoring back()");
//! ```

#[doc(hidden)]
#[macro_export]
macro_rules! __navigator_log {
    ($level:ident, $($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        ::tracing::$level!(target: "url_navigator", $($arg)*);
        #[cfg(feature = "log")]
        ::log::$level!(target: "url_navigator", $($arg)*);
    };
}

/// Trace-level logging.
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => { $crate::__navigator_log!(trace, $($arg)*); };
}

/// Debug-level logging.
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => { $crate::__navigator_log!(debug, $($arg)*); };
}

/// Info-level logging.
#[macro_export]
macro_rules! info_log {
    ($($arg:tt)*) => { $crate::__navigator_log!(info, $($arg)*); };
}

/// Warn-level logging.
#[macro_export]
macro_rules! warn_log {
    ($($arg:tt)*) => { $crate::__navigator_log!(warn, $($arg)*); };
}

/// Error-level logging.
#[macro_export]
macro_rules! error_log {
    ($($arg:tt)*) => { $crate::__navigator_log!(error, $($arg)*); };
}
