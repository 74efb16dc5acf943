//! Pattern and resolution caches
//!
//! [`PatternCache`] keeps one compiled pattern per route declaration
//! *instance*. Entries are keyed by the declaration's address and hold a weak
//! reference back to it, so they are never invalidated explicitly: a dropped
//! declaration simply leaves a dead entry that is pruned on the next insert.
//!
//! [`ResolutionCache`] (feature `cache`) memoizes which declaration of a
//! `Routes` set matched a pathname, with LRU eviction.

use crate::error::RouterError;
use crate::matcher::{compile, CompiledPattern, RouteDeclaration};
use crate::trace_log;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

struct PatternEntry {
    owner: Weak<RouteDeclaration>,
    compiled: Arc<CompiledPattern>,
}

/// Identity-keyed cache of compiled patterns
#[derive(Default)]
pub struct PatternCache {
    entries: Mutex<HashMap<usize, PatternEntry>>,
}

impl PatternCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiled pattern for `declaration`, compiling `path` on first use
    pub fn get_or_compile(
        &self,
        declaration: &Arc<RouteDeclaration>,
        path: &str,
    ) -> Result<Arc<CompiledPattern>, RouterError> {
        let key = Arc::as_ptr(declaration) as usize;
        let mut entries = self.entries.lock();

        if let Some(entry) = entries.get(&key) {
            // The address may have been reused by a newer declaration.
            if entry
                .owner
                .upgrade()
                .is_some_and(|owner| Arc::ptr_eq(&owner, declaration))
            {
                trace_log!("Pattern cache hit for '{}'", path);
                return Ok(entry.compiled.clone());
            }
        }

        trace_log!("Pattern cache miss for '{}'", path);
        let compiled = Arc::new(compile(path, declaration.is_wildcard())?);

        entries.retain(|_, entry| entry.owner.strong_count() > 0);
        entries.insert(
            key,
            PatternEntry {
                owner: Arc::downgrade(declaration),
                compiled: compiled.clone(),
            },
        );

        Ok(compiled)
    }

    /// Number of entries, including dead ones not yet pruned
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of entries whose declaration is still alive
    pub fn live_len(&self) -> usize {
        self.entries
            .lock()
            .values()
            .filter(|entry| entry.owner.strong_count() > 0)
            .count()
    }
}

// ============================================================================
// Resolution cache
// ============================================================================

#[cfg(feature = "cache")]
pub use resolution::{CacheStats, ResolutionCache};

#[cfg(feature = "cache")]
mod resolution {
    use crate::matcher::MatchResult;
    use crate::trace_log;
    use lru::LruCache;
    use std::num::NonZeroUsize;

    /// Cache performance statistics
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct CacheStats {
        pub hits: usize,
        pub misses: usize,
        pub invalidations: usize,
    }

    impl CacheStats {
        pub fn hit_rate(&self) -> f64 {
            let total = self.hits + self.misses;
            if total == 0 {
                0.0
            } else {
                self.hits as f64 / total as f64
            }
        }
    }

    /// Pathname -> (declaration index, match) memo with LRU eviction.
    ///
    /// `None` values record that no declaration matched.
    #[derive(Debug)]
    pub struct ResolutionCache {
        entries: LruCache<String, Option<(usize, MatchResult)>>,
        stats: CacheStats,
    }

    impl ResolutionCache {
        const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(256) {
            Some(capacity) => capacity,
            None => NonZeroUsize::MIN,
        };

        pub fn new() -> Self {
            Self::with_capacity(Self::DEFAULT_CAPACITY)
        }

        pub fn with_capacity(capacity: NonZeroUsize) -> Self {
            Self {
                entries: LruCache::new(capacity),
                stats: CacheStats::default(),
            }
        }

        pub fn get(&mut self, pathname: &str) -> Option<Option<(usize, MatchResult)>> {
            if let Some(entry) = self.entries.get(pathname) {
                self.stats.hits += 1;
                trace_log!("Resolution cache hit for '{}'", pathname);
                Some(entry.clone())
            } else {
                self.stats.misses += 1;
                trace_log!("Resolution cache miss for '{}'", pathname);
                None
            }
        }

        pub fn insert(&mut self, pathname: String, resolved: Option<(usize, MatchResult)>) {
            self.entries.put(pathname, resolved);
        }

        pub fn clear(&mut self) {
            trace_log!("Clearing resolution cache");
            self.entries.clear();
            self.stats.invalidations += 1;
        }

        pub fn stats(&self) -> &CacheStats {
            &self.stats
        }

        pub fn len(&self) -> usize {
            self.entries.len()
        }

        pub fn is_empty(&self) -> bool {
            self.entries.is_empty()
        }
    }

    impl Default for ResolutionCache {
        fn default() -> Self {
            Self::new()
        }
    }
}
