//! # On-Demand Build Cache
//!
//! Coalesces concurrent requests for the same derived artifact into a single
//! build. The first caller for a key (the *leader*) runs the build closure;
//! every caller that arrives while that build is running (a *follower*)
//! parks its coroutine on a channel and receives a clone of the leader's
//! outcome.
//!
//! ## Lifecycle of an entry
//!
//! ```text
//! get_or_build(k) ──► entry absent ──► insert, run build ──► remove entry ──► notify followers
//!                 └─► entry present ─► register follower ──────────────────► receive outcome
//! ```
//!
//! The check-then-insert happens under the shard lock of a [`DashMap`], and
//! followers register while holding that same lock, so a follower can never
//! attach itself to an entry the leader has already settled.
//!
//! Entries are removed when the build settles, whether it succeeded, failed
//! or panicked. A request arriving after settlement starts a new build; any
//! longer-lived caching is the job of the HTTP validator layer
//! ([`crate::etag`]) or of the transformation engine itself.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use may::sync::mpsc;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Result shared by every caller of one build.
///
/// `Ok(None)` means "no source for this artifact" and is not an error.
pub type BuildOutcome<T> = Result<Option<T>, BuildError>;

type Waiters<T> = Arc<Mutex<Vec<mpsc::Sender<BuildOutcome<T>>>>>;

/// Failure of a shared build.
///
/// Clonable so the same failure can be handed to every follower.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// The build closure returned an error
    Failed {
        /// Cache key of the build
        key: String,
        /// Rendered error message
        message: String,
    },
    /// The build closure panicked
    Panicked {
        /// Cache key of the build
        key: String,
    },
}

impl BuildError {
    pub fn failed(key: &str, message: impl fmt::Display) -> Self {
        BuildError::Failed {
            key: key.to_string(),
            message: message.to_string(),
        }
    }
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::Failed { key, message } => write!(f, "Build of {key} failed: {message}"),
            BuildError::Panicked { key } => write!(f, "Build of {key} panicked"),
        }
    }
}

impl std::error::Error for BuildError {}

/// Single-flight cache keyed by request path.
pub struct BuildCache<T> {
    inflight: DashMap<String, Waiters<T>>,
}

impl<T> Default for BuildCache<T> {
    fn default() -> Self {
        Self {
            inflight: DashMap::new(),
        }
    }
}

impl<T: Clone + Send + 'static> BuildCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the outcome of the build for `key`, running `build` only if no
    /// build for `key` is currently in flight.
    pub fn get_or_build<F>(&self, key: &str, build: F) -> BuildOutcome<T>
    where
        F: FnOnce() -> BuildOutcome<T>,
    {
        let joined = match self.inflight.entry(key.to_string()) {
            Entry::Occupied(pending) => {
                let (tx, rx) = mpsc::channel();
                if let Ok(mut waiters) = pending.get().lock() {
                    waiters.push(tx);
                }
                Err(rx)
            }
            Entry::Vacant(slot) => {
                let waiters: Waiters<T> = Arc::new(Mutex::new(Vec::new()));
                slot.insert(Arc::clone(&waiters));
                Ok(waiters)
            }
        };

        match joined {
            Err(rx) => {
                debug!(key = %key, "Joining in-flight build");
                // A leader that unwinds drops its senders without sending
                rx.recv().unwrap_or_else(|_| {
                    Err(BuildError::Panicked {
                        key: key.to_string(),
                    })
                })
            }
            Ok(waiters) => {
                debug!(key = %key, "Starting build");
                let flight = Flight {
                    cache: self,
                    key,
                    waiters,
                    settled: false,
                };
                let outcome = build();
                flight.settle(&outcome);
                outcome
            }
        }
    }

    /// Detach the in-flight build for `key`, if any.
    ///
    /// Callers already waiting still receive the detached build's outcome;
    /// the next caller for `key` starts a fresh build.
    pub fn invalidate(&self, key: &str) -> bool {
        self.inflight.remove(key).is_some()
    }

    /// Number of builds currently in flight.
    pub fn in_flight(&self) -> usize {
        self.inflight.len()
    }
}

/// Drop guard owned by the leader; guarantees the entry is removed even when
/// the build closure unwinds.
struct Flight<'a, T> {
    cache: &'a BuildCache<T>,
    key: &'a str,
    waiters: Waiters<T>,
    settled: bool,
}

impl<T: Clone> Flight<'_, T> {
    fn detach(&self) -> Vec<mpsc::Sender<BuildOutcome<T>>> {
        // Only remove the entry if it is still ours; it may have been invalidated
        self.cache
            .inflight
            .remove_if(self.key, |_, current| Arc::ptr_eq(current, &self.waiters));
        match self.waiters.lock() {
            Ok(mut waiters) => std::mem::take(&mut *waiters),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    fn settle(mut self, outcome: &BuildOutcome<T>) {
        self.settled = true;
        let waiters = self.detach();
        debug!(key = %self.key, followers = waiters.len(), "Build settled");
        for tx in waiters {
            if tx.send(outcome.clone()).is_err() {
                debug!(key = %self.key, "Follower went away before the build settled");
            }
        }
    }
}

impl<T> Drop for Flight<'_, T> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        warn!(key = %self.key, "Build did not settle, releasing waiters");
        self.cache
            .inflight
            .remove_if(self.key, |_, current| Arc::ptr_eq(current, &self.waiters));
        if let Ok(mut waiters) = self.waiters.lock() {
            waiters.clear();
        }
    }
}
