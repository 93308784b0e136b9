//! Cost-bounded LRU cache for decoded content
//!
//! A hash map indexes into a vector of nodes that also form a doubly linked
//! list in access order (head = most recent). Removal uses `swap_remove` and
//! patches the links of the node that moved, so every operation is O(1).

use serde::Serialize;
use std::collections::HashMap;
use std::hash::Hash;

const NIL: usize = usize::MAX;

struct Node<K, V> {
    key: K,
    value: V,
    cost: u64,
    prev: usize,
    next: usize,
}

/// Statistics about the memory tier
#[derive(Debug, Clone, Default, Serialize)]
pub struct MemoryStats {
    pub entries: usize,
    pub total_cost: u64,
    pub limit: u64,
    pub hits: u64,
    pub misses: u64,
}

pub struct MemoryCache<K, V> {
    map: HashMap<K, usize>,
    nodes: Vec<Node<K, V>>,
    head: usize,
    tail: usize,
    total_cost: u64,
    limit: u64,
    hits: u64,
    misses: u64,
}

impl<K, V> MemoryCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    pub fn new(limit: u64) -> Self {
        Self {
            map: HashMap::new(),
            nodes: Vec::new(),
            head: NIL,
            tail: NIL,
            total_cost: 0,
            limit,
            hits: 0,
            misses: 0,
        }
    }

    /// Look up an entry, marking it most recently used on a hit
    pub fn get(&mut self, key: &K) -> Option<V> {
        match self.map.get(key).copied() {
            Some(idx) => {
                self.hits += 1;
                self.unlink(idx);
                self.push_front(idx);
                Some(self.nodes[idx].value.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Look up an entry without touching access order or counters
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.map.get(key).map(|&idx| &self.nodes[idx].value)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// Insert or replace an entry, evicting least recently used entries until
    /// it fits. An entry costing more than the whole limit is still kept, but
    /// everything else goes first. Returns the number of evictions.
    pub fn put(&mut self, key: K, value: V, cost: u64) -> usize {
        if let Some(idx) = self.map.get(&key).copied() {
            self.remove_at(idx);
        }

        let mut evicted = 0;
        while self.total_cost.saturating_add(cost) > self.limit && self.tail != NIL {
            self.remove_at(self.tail);
            evicted += 1;
        }

        let idx = self.nodes.len();
        self.nodes.push(Node {
            key: key.clone(),
            value,
            cost,
            prev: NIL,
            next: NIL,
        });
        self.map.insert(key, idx);
        self.push_front(idx);
        self.total_cost = self.total_cost.saturating_add(cost);

        evicted
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let idx = self.map.get(key).copied()?;
        Some(self.remove_at(idx).value)
    }

    /// Drop every entry. Counters are kept.
    pub fn clear(&mut self) {
        self.map.clear();
        self.nodes.clear();
        self.head = NIL;
        self.tail = NIL;
        self.total_cost = 0;
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn total_cost(&self) -> u64 {
        self.total_cost
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            entries: self.len(),
            total_cost: self.total_cost,
            limit: self.limit,
            hits: self.hits,
            misses: self.misses,
        }
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
        if prev == NIL {
            self.head = next;
        } else {
            self.nodes[prev].next = next;
        }
        if next == NIL {
            self.tail = prev;
        } else {
            self.nodes[next].prev = prev;
        }
        self.nodes[idx].prev = NIL;
        self.nodes[idx].next = NIL;
    }

    fn push_front(&mut self, idx: usize) {
        self.nodes[idx].prev = NIL;
        self.nodes[idx].next = self.head;
        if self.head == NIL {
            self.tail = idx;
        } else {
            self.nodes[self.head].prev = idx;
        }
        self.head = idx;
    }

    fn remove_at(&mut self, idx: usize) -> Node<K, V> {
        self.unlink(idx);
        let node = self.nodes.swap_remove(idx);
        self.map.remove(&node.key);
        self.total_cost = self.total_cost.saturating_sub(node.cost);

        // The former last node now lives at `idx`; repoint its neighbours
        if idx < self.nodes.len() {
            let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
            if prev == NIL {
                self.head = idx;
            } else {
                self.nodes[prev].next = idx;
            }
            if next == NIL {
                self.tail = idx;
            } else {
                self.nodes[next].prev = idx;
            }
            if let Some(slot) = self.map.get_mut(&self.nodes[idx].key) {
                *slot = idx;
            }
        }

        node
    }
}
