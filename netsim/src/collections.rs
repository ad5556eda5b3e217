// NetSim: Packet-level network simulator and graph toolkit written in Rust
// Copyright (C) 2023-2024 The NetSim developers
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Small special-purpose containers.

use std::collections::HashMap;
use std::hash::Hash;

/// A bounded map evicting the least recently used entry on overflow.
///
/// Evicted entries are buffered and can be collected with
/// [`LruCache::drain_evicted`], e.g. to flush them to longer-term storage.
#[derive(Debug, Clone)]
pub struct LruCache<K, V> {
    max_cache_size: usize,
    // value plus the logical time of the last access
    map: HashMap<K, (V, u64)>,
    clock: u64,
    evicted: Vec<(K, V)>,
}

impl<K: Eq + Hash + Clone, V> LruCache<K, V> {
    /// Create a cache holding at most `max_cache_size` entries.
    pub fn new(max_cache_size: usize) -> Self {
        assert!(max_cache_size > 0, "cache size must be positive");
        Self {
            max_cache_size,
            map: HashMap::new(),
            clock: 0,
            evicted: Vec::new(),
        }
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Insert a value, evicting the least recently used entry if the cache
    /// is full. Inserting over an existing key replaces the value.
    pub fn insert(&mut self, key: K, value: V) {
        self.clock += 1;
        if !self.map.contains_key(&key) && self.map.len() >= self.max_cache_size {
            self.evict_oldest();
        }
        self.map.insert(key, (value, self.clock));
    }

    /// Look up a value, marking it as most recently used.
    pub fn get(&mut self, key: &K) -> Option<&mut V> {
        self.clock += 1;
        let clock = self.clock;
        self.map.get_mut(key).map(|(value, used)| {
            *used = clock;
            value
        })
    }

    /// Return the cached value for `key`, constructing it with `make` on a
    /// miss. The constructor is only invoked if the key is absent.
    pub fn get_or_insert_with(&mut self, key: K, make: impl FnOnce() -> V) -> &mut V {
        if !self.map.contains_key(&key) {
            let value = make();
            self.insert(key.clone(), value);
        }
        self.get(&key).unwrap()
    }

    /// Evict every entry into the evicted buffer.
    pub fn evict_all(&mut self) {
        while !self.map.is_empty() {
            self.evict_oldest();
        }
    }

    /// Take the entries evicted so far, in eviction order.
    pub fn drain_evicted(&mut self) -> Vec<(K, V)> {
        std::mem::take(&mut self.evicted)
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .map
            .iter()
            .min_by_key(|(_, (_, used))| *used)
            .map(|(k, _)| k.clone());
        if let Some(key) = oldest {
            let (value, _) = self.map.remove(&key).unwrap();
            self.evicted.push((key, value));
        }
    }
}

/// A fixed-size ring buffer. The number of slots must be a power of two.
#[derive(Debug, Clone)]
pub struct CircularArray<T, const N: usize> {
    num_values: usize,
    index: usize,
    values: [Option<T>; N],
}

impl<T, const N: usize> Default for CircularArray<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> CircularArray<T, N> {
    const MASK: usize = N - 1;

    /// Create an empty array.
    ///
    /// # Panics
    /// Panics if `N` is not a power of two.
    pub fn new() -> Self {
        assert!(N.is_power_of_two(), "number of slots must be a power of 2");
        Self {
            num_values: 0,
            index: 0,
            values: std::array::from_fn(|_| None),
        }
    }

    /// Add a value, overwriting the oldest one once the array is full.
    pub fn add_value(&mut self, value: T) {
        self.values[self.index & Self::MASK] = Some(value);
        self.index = self.index.wrapping_add(1);
        if self.num_values < N {
            self.num_values += 1;
        }
    }

    /// Number of values currently stored.
    pub fn len(&self) -> usize {
        self.num_values
    }

    /// True if the array holds no values.
    pub fn is_empty(&self) -> bool {
        self.num_values == 0
    }

    /// The most recently inserted value.
    pub fn most_recent(&self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        self.values[self.index.wrapping_sub(1) & Self::MASK].as_ref()
    }

    /// The value that has spent the most time in the array.
    pub fn oldest(&self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        self.values[self.index.wrapping_sub(self.num_values) & Self::MASK].as_ref()
    }

    /// Drain all values, in insertion order. The array is empty afterwards.
    pub fn values(&mut self) -> Vec<T> {
        let start = self.index.wrapping_sub(self.num_values);
        let mut out = Vec::with_capacity(self.num_values);
        for i in 0..self.num_values {
            out.push(self.values[start.wrapping_add(i) & Self::MASK].take().unwrap());
        }
        self.num_values = 0;
        self.index = 0;
        out
    }
}
