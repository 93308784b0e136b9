//! Per-key waiter registry for single-flight fetches

use file_blob_cache::CacheKey;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tokio::sync::oneshot;

/// What a caller must do after registering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// First caller for the key: perform the fetch
    Leader,
    /// A fetch is already in flight: wait for its result
    Joined,
}

/// Tracks pending completions for keys with a fetch in flight. An entry
/// exists exactly while that fetch is running.
pub struct RequestCoalescer<R> {
    waiters: HashMap<CacheKey, Vec<oneshot::Sender<R>>>,
}

impl<R: Clone> RequestCoalescer<R> {
    pub fn new() -> Self {
        Self {
            waiters: HashMap::new(),
        }
    }

    pub fn join_or_lead(&mut self, key: &CacheKey, completion: oneshot::Sender<R>) -> Role {
        match self.waiters.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().push(completion);
                Role::Joined
            }
            Entry::Vacant(entry) => {
                entry.insert(vec![completion]);
                Role::Leader
            }
        }
    }

    /// Hand `result` to every waiter on `key` and forget the key. Returns how
    /// many waiters were still listening.
    pub fn resolve(&mut self, key: &CacheKey, result: R) -> usize {
        let Some(completions) = self.waiters.remove(key) else {
            return 0;
        };

        completions
            .into_iter()
            .map(|completion| completion.send(result.clone()))
            .filter(Result::is_ok)
            .count()
    }

    pub fn is_in_flight(&self, key: &CacheKey) -> bool {
        self.waiters.contains_key(key)
    }

    /// Number of waiters queued on `key`
    pub fn waiting(&self, key: &CacheKey) -> usize {
        self.waiters.get(key).map_or(0, Vec::len)
    }

    /// Number of keys with a fetch in flight
    pub fn in_flight(&self) -> usize {
        self.waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }
}

impl<R: Clone> Default for RequestCoalescer<R> {
    fn default() -> Self {
        Self::new()
    }
}
