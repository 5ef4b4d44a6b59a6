//! Session state capture and reuse.
//!
//! Login (or any other expensive setup) runs once per session identifier;
//! the resulting browser storage snapshot is cached and restored into later
//! scenarios instead of repeating the setup. A failed setup is never cached,
//! so the next scenario that needs the session retries it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::result::{ManejarError, ManejarResult};

/// A single cookie captured from the browser context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    /// Cookie name
    pub name: String,
    /// Cookie value
    pub value: String,
    /// Domain the cookie applies to
    pub domain: String,
    /// Path the cookie applies to
    pub path: String,
}

impl Cookie {
    /// Create a cookie scoped to the root path of a domain
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
            path: "/".to_string(),
        }
    }
}

/// Snapshot of browser storage: cookies, local storage, session storage.
///
/// Serializable so suites can persist a session to disk and restore it in a
/// later run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageState {
    /// Captured cookies
    pub cookies: Vec<Cookie>,
    /// Captured local storage entries
    pub local_storage: HashMap<String, String>,
    /// Captured session storage entries
    pub session_storage: HashMap<String, String>,
}

impl StorageState {
    /// Create an empty storage snapshot
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the snapshot holds no state at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
            && self.local_storage.is_empty()
            && self.session_storage.is_empty()
    }
}

/// A named, cached session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Identifier the session was cached under
    pub identifier: String,
    /// Storage snapshot taken after setup succeeded
    pub storage: StorageState,
    /// When the setup routine completed
    pub created_at: DateTime<Utc>,
}

type Slot = Arc<Mutex<Option<Session>>>;

/// Cache of named sessions with at-most-once setup.
///
/// Each identifier owns a slot guarded by its own mutex: the first caller
/// runs the setup routine while any concurrent caller for the same
/// identifier blocks on the slot, then observes the cached session. Callers
/// for different identifiers never contend with each other beyond the brief
/// slot lookup.
#[derive(Debug, Default)]
pub struct SessionCache {
    slots: Mutex<HashMap<String, Slot>>,
}

impl SessionCache {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the session for `identifier`, running `setup` to create it if
    /// no cached session exists.
    ///
    /// The setup routine runs at most once per identifier while its result
    /// remains cached. If setup fails, nothing is cached and the error is
    /// reported as [`ManejarError::SetupFailed`]; a later call retries.
    pub fn get_or_create<F>(&self, identifier: &str, setup: F) -> ManejarResult<Session>
    where
        F: FnOnce() -> ManejarResult<StorageState>,
    {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(identifier.to_string()).or_default())
        };

        let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(session) = guard.as_ref() {
            tracing::debug!(identifier, "session cache hit");
            return Ok(session.clone());
        }

        tracing::info!(identifier, "running session setup");
        let storage = setup().map_err(|source| ManejarError::SetupFailed {
            identifier: identifier.to_string(),
            message: source.to_string(),
        })?;
        let session = Session {
            identifier: identifier.to_string(),
            storage,
            created_at: Utc::now(),
        };
        *guard = Some(session.clone());
        Ok(session)
    }

    /// Whether a session is cached under `identifier`
    #[must_use]
    pub fn contains(&self, identifier: &str) -> bool {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots
            .get(identifier)
            .is_some_and(|slot| {
                slot.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .is_some()
            })
    }

    /// Drop the session cached under `identifier`, forcing the next
    /// `get_or_create` to run setup again
    pub fn invalidate(&self, identifier: &str) {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = slots.get(identifier) {
            *slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
        }
    }

    /// Drop every cached session (suite teardown)
    pub fn clear(&self) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.clear();
    }

    /// Number of identifiers with a cached session
    #[must_use]
    pub fn len(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots
            .values()
            .filter(|slot| {
                slot.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .is_some()
            })
            .count()
    }

    /// Whether no sessions are cached
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn logged_in_state() -> StorageState {
        let mut state = StorageState::new();
        state
            .local_storage
            .insert("auth".to_string(), "token-1".to_string());
        state.cookies.push(Cookie::new("sid", "abc", "app.example.com"));
        state
    }

    mod storage_state {
        use super::*;

        #[test]
        fn test_new_is_empty() {
            assert!(StorageState::new().is_empty());
        }

        #[test]
        fn test_round_trips_through_json() {
            let state = logged_in_state();
            let json = serde_json::to_string(&state).unwrap();
            let back: StorageState = serde_json::from_str(&json).unwrap();
            assert_eq!(back, state);
        }
    }

    mod cache {
        use super::*;

        #[test]
        fn test_setup_runs_once_for_repeated_gets() {
            let cache = SessionCache::new();
            let runs = AtomicUsize::new(0);

            for _ in 0..3 {
                let session = cache
                    .get_or_create("analyst", || {
                        runs.fetch_add(1, Ordering::SeqCst);
                        Ok(logged_in_state())
                    })
                    .unwrap();
                assert_eq!(session.identifier, "analyst");
            }
            assert_eq!(runs.load(Ordering::SeqCst), 1);
        }

        #[test]
        fn test_distinct_identifiers_get_distinct_setups() {
            let cache = SessionCache::new();
            let runs = AtomicUsize::new(0);
            let setup = || {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok(logged_in_state())
            };
            cache.get_or_create("analyst", setup).unwrap();
            cache
                .get_or_create("admin", || {
                    runs.fetch_add(1, Ordering::SeqCst);
                    Ok(StorageState::new())
                })
                .unwrap();
            assert_eq!(runs.load(Ordering::SeqCst), 2);
            assert_eq!(cache.len(), 2);
        }

        #[test]
        fn test_failed_setup_is_not_cached() {
            let cache = SessionCache::new();
            let err = cache
                .get_or_create("analyst", || {
                    Err(ManejarError::InvalidState {
                        message: "login page unreachable".to_string(),
                    })
                })
                .unwrap_err();
            assert!(matches!(err, ManejarError::SetupFailed { .. }));
            assert!(!cache.contains("analyst"));

            // Next attempt retries and succeeds
            let session = cache
                .get_or_create("analyst", || Ok(logged_in_state()))
                .unwrap();
            assert!(!session.storage.is_empty());
            assert!(cache.contains("analyst"));
        }

        #[test]
        fn test_invalidate_forces_new_setup() {
            let cache = SessionCache::new();
            let runs = AtomicUsize::new(0);
            cache
                .get_or_create("analyst", || {
                    runs.fetch_add(1, Ordering::SeqCst);
                    Ok(logged_in_state())
                })
                .unwrap();
            cache.invalidate("analyst");
            assert!(!cache.contains("analyst"));
            cache
                .get_or_create("analyst", || {
                    runs.fetch_add(1, Ordering::SeqCst);
                    Ok(logged_in_state())
                })
                .unwrap();
            assert_eq!(runs.load(Ordering::SeqCst), 2);
        }

        #[test]
        fn test_clear_empties_cache() {
            let cache = SessionCache::new();
            cache
                .get_or_create("analyst", || Ok(logged_in_state()))
                .unwrap();
            cache.clear();
            assert!(cache.is_empty());
        }

        #[test]
        fn test_concurrent_gets_run_setup_once() {
            let cache = Arc::new(SessionCache::new());
            let runs = Arc::new(AtomicUsize::new(0));

            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let cache = Arc::clone(&cache);
                    let runs = Arc::clone(&runs);
                    std::thread::spawn(move || {
                        cache
                            .get_or_create("analyst", || {
                                runs.fetch_add(1, Ordering::SeqCst);
                                std::thread::sleep(std::time::Duration::from_millis(20));
                                Ok(logged_in_state())
                            })
                            .unwrap()
                    })
                })
                .collect();

            let sessions: Vec<Session> =
                handles.into_iter().map(|h| h.join().unwrap()).collect();
            assert_eq!(runs.load(Ordering::SeqCst), 1);
            assert!(sessions.windows(2).all(|w| w[0] == w[1]));
        }
    }
}
