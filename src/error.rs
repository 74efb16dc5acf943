//! Error handling for the router
//!
//! Provides the crate error type and the reporter that hook failures are
//! routed to.

use crate::error_log;
use std::fmt;
use std::sync::Arc;

/// Error returned by a failing intercept or change hook.
pub type HookError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type produced by hooks.
pub type HookResult = Result<(), HookError>;

// ============================================================================
// RouterError
// ============================================================================

/// Errors that can occur while routing
#[derive(Debug, Clone, thiserror::Error)]
pub enum RouterError {
    /// A handle was used after its router was unmounted (or before one existed)
    #[error("router is not mounted: location and navigation are only available inside a mounted router")]
    NotMounted,

    /// A destination or origin could not be parsed into a URL
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A route pattern could not be compiled
    #[error("invalid route pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// An intercept or change hook returned an error
    #[error("navigation hook failed: {message}")]
    HookFailed { message: String },

    /// An intercept or change hook panicked
    #[error("navigation hook panicked")]
    HookPanicked,
}

impl RouterError {
    /// Wrap a hook error
    pub fn hook(error: &HookError) -> Self {
        RouterError::HookFailed {
            message: error.to_string(),
        }
    }

    /// Check if this error comes from a user hook
    pub fn is_hook_failure(&self) -> bool {
        matches!(
            self,
            RouterError::HookFailed { .. } | RouterError::HookPanicked
        )
    }
}

// ============================================================================
// Error reporter
// ============================================================================

/// Callback receiving errors the router recovers from on its own
pub type ReportFn = Arc<dyn Fn(&RouterError) + Send + Sync>;

/// Top-level sink for errors that must not interrupt navigation.
///
/// Hook failures never wedge navigation: the bridge treats them as "not
/// cancelled" and hands the error to the reporter. Without a custom callback
/// the error is logged.
#[derive(Clone, Default)]
pub struct ErrorReporter {
    callback: Option<ReportFn>,
}

impl ErrorReporter {
    /// Create a reporter that only logs
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a reporter forwarding to `callback`
    pub fn with_callback<F>(callback: F) -> Self
    where
        F: Fn(&RouterError) + Send + Sync + 'static,
    {
        Self {
            callback: Some(Arc::new(callback)),
        }
    }

    /// Report an error
    pub fn report(&self, error: &RouterError) {
        error_log!("{}", error);
        if let Some(callback) = &self.callback {
            callback(error);
        }
    }
}

impl fmt::Debug for ErrorReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorReporter")
            .field("custom", &self.callback.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_not_mounted_display() {
        let error = RouterError::NotMounted;
        assert!(error.to_string().starts_with("router is not mounted"));
    }

    #[test]
    fn test_invalid_url_from_parse_error() {
        let error: RouterError = url::Url::parse("not a url").unwrap_err().into();
        assert!(matches!(error, RouterError::InvalidUrl(_)));
        assert!(!error.is_hook_failure());
    }

    #[test]
    fn test_hook_error_wrapping() {
        let hook_error: HookError = "dialog exploded".into();
        let error = RouterError::hook(&hook_error);
        assert_eq!(error.to_string(), "navigation hook failed: dialog exploded");
        assert!(error.is_hook_failure());
        assert!(RouterError::HookPanicked.is_hook_failure());
    }

    #[test]
    fn test_reporter_forwards_to_callback() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let reporter = ErrorReporter::with_callback(move |error| {
            sink.lock().push(error.to_string());
        });

        reporter.report(&RouterError::HookPanicked);
        reporter.report(&RouterError::NotMounted);

        assert_eq!(seen.lock().len(), 2);
        assert_eq!(seen.lock()[0], "navigation hook panicked");
    }

    #[test]
    fn test_default_reporter_only_logs() {
        let reporter = ErrorReporter::new();
        reporter.report(&RouterError::HookPanicked);
        assert!(format!("{:?}", reporter).contains("custom: false"));
    }
}
