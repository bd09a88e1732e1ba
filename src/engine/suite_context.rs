use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use serde::Serialize;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use super::expectation::Expectation;

/// A named, ordered collection of rules.
#[derive(Debug, Clone, Serialize)]
pub struct ExpectationSuite {
    pub name: String,
    pub expectations: Vec<Expectation>,
}

impl ExpectationSuite {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expectations: Vec::new(),
        }
    }
}

/// Process-wide suite registry.
///
/// Reads and writes of whole suites are atomic. A read-modify-write must be
/// done while holding the guard from [`SuiteContext::lock_suite`] for that name.
#[derive(Default)]
pub struct SuiteContext {
    suites: RwLock<HashMap<String, ExpectationSuite>>,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl SuiteContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<ExpectationSuite> {
        self.suites
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(name)
            .cloned()
    }

    /// Inserts or replaces the suite stored under `suite.name`.
    pub fn add_or_update(&self, suite: ExpectationSuite) {
        self.suites
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(suite.name.clone(), suite);
    }

    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .suites
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Waits for exclusive mutation rights on one suite name. Other names are unaffected.
    pub async fn lock_suite(&self, name: &str) -> SuiteLockGuard<'_> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            // entries abandoned by cancelled waiters
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        let mut held = SuiteLockGuard {
            context: self,
            name: name.to_string(),
            guard: None,
        };
        held.guard = Some(lock.lock_owned().await);
        held
    }

    /// Forgets the lock for `name` once nobody holds or waits on it.
    fn release_lock_entry(&self, name: &str) {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let idle = locks
            .get(name)
            .map_or(false, |lock| Arc::strong_count(lock) == 1);
        if idle {
            locks.remove(name);
        }
    }

    #[cfg(test)]
    fn lock_entries(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

/// Mutation rights on one suite name, released on drop.
pub struct SuiteLockGuard<'a> {
    context: &'a SuiteContext,
    name: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for SuiteLockGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.context.release_lock_entry(&self.name);
    }
}
