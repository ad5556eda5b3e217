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

//! Guards for rate-limiting changes and timing out keys.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Defines how a [`ThresholdEnforcer`] works. All thresholds default to
/// zero, which allows every change.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ThresholdEnforcerPolicy {
    empty_threshold_absolute: f64,
    threshold_absolute: f64,
    threshold_relative_to_total: f64,
    threshold_relative_to_current: f64,
}

impl ThresholdEnforcerPolicy {
    /// The minimum value that may be associated with a key; changes that
    /// would leave a key below it are disallowed.
    pub fn empty_threshold_absolute(&self) -> f64 {
        self.empty_threshold_absolute
    }

    /// Set the empty threshold. Must not be negative.
    pub fn set_empty_threshold_absolute(&mut self, threshold: f64) {
        assert!(threshold >= 0.0, "absolute threshold must not be negative");
        self.empty_threshold_absolute = threshold;
    }

    /// Changes smaller than this absolute value are ignored.
    pub fn threshold_absolute(&self) -> f64 {
        self.threshold_absolute
    }

    /// Set the absolute threshold. Must not be negative.
    pub fn set_threshold_absolute(&mut self, threshold: f64) {
        assert!(threshold >= 0.0, "absolute threshold must not be negative");
        self.threshold_absolute = threshold;
    }

    /// Like the absolute threshold, but relative to the current value of
    /// the key.
    pub fn threshold_relative_to_current(&self) -> f64 {
        self.threshold_relative_to_current
    }

    /// Set the relative-to-current threshold. Must be in `[0, 1]`.
    pub fn set_threshold_relative_to_current(&mut self, threshold: f64) {
        assert!(
            (0.0..=1.0).contains(&threshold),
            "relative threshold must be in [0, 1]"
        );
        self.threshold_relative_to_current = threshold;
    }

    /// Like the absolute threshold, but relative to the total of all
    /// values.
    pub fn threshold_relative_to_total(&self) -> f64 {
        self.threshold_relative_to_total
    }

    /// Set the relative-to-total threshold. Must be in `[0, 1]`.
    pub fn set_threshold_relative_to_total(&mut self, threshold: f64) {
        assert!(
            (0.0..=1.0).contains(&threshold),
            "relative threshold must be in [0, 1]"
        );
        self.threshold_relative_to_total = threshold;
    }
}

/// Given a series of changes to numeric values indexed by a key, allows or
/// disallows each change according to a thresholding policy.
#[derive(Debug, Clone)]
pub struct ThresholdEnforcer<K: Ord> {
    policy: ThresholdEnforcerPolicy,
    missing_value: f64,
    current_state: BTreeMap<K, f64>,
}

impl<K: Ord + Clone> ThresholdEnforcer<K> {
    /// Create a new enforcer. Missing keys are assumed to hold
    /// `missing_value`.
    pub fn new(policy: ThresholdEnforcerPolicy, missing_value: f64) -> Self {
        Self {
            policy,
            missing_value,
            current_state: BTreeMap::new(),
        }
    }

    /// Change the value associated with a key. Returns false (and leaves
    /// the state untouched) if the change is below the thresholds.
    pub fn change(&mut self, key: K, value: f64) -> bool {
        if !self.can_change(value, self.get(&key)) {
            return false;
        }
        self.current_state.insert(key, value);
        true
    }

    /// Replace the entire state if any key of the new (or current) state
    /// passes the thresholds. Returns false and keeps the current state
    /// otherwise.
    pub fn change_bulk(&mut self, new_state: BTreeMap<K, f64>) -> bool {
        for (key, value) in &new_state {
            if self.can_change(*value, self.get(key)) {
                self.current_state = new_state;
                return true;
            }
        }

        // no key of the new state passes, but keys that disappear may
        let disappearing: Vec<K> = self
            .current_state
            .keys()
            .filter(|k| !new_state.contains_key(k))
            .cloned()
            .collect();
        for key in disappearing {
            if self.can_change(self.missing_value, self.get(&key)) {
                self.current_state = new_state;
                return true;
            }
        }

        false
    }

    /// The value associated with a key, or the missing value.
    pub fn get(&self, key: &K) -> f64 {
        self.current_state
            .get(key)
            .copied()
            .unwrap_or(self.missing_value)
    }

    fn can_change(&self, value: f64, current_value: f64) -> bool {
        if (current_value - value).abs() < self.policy.threshold_absolute() {
            return false;
        }

        if (self.missing_value - value).abs() < self.policy.empty_threshold_absolute() {
            return false;
        }

        let relative_to_current = if current_value > 0.0 {
            ((value - current_value) / current_value).abs()
        } else {
            1.0
        };
        if relative_to_current < self.policy.threshold_relative_to_current() {
            return false;
        }

        let total: f64 = self.current_state.values().sum();
        let relative_to_total = if total > 0.0 {
            (value / total).abs()
        } else {
            1.0
        };
        if relative_to_total < self.policy.threshold_relative_to_total() {
            return false;
        }

        true
    }
}

/// Specifies how a [`TimeoutEnforcer`] times keys out. Time is a plain
/// `u64`; its unit is up to the caller and only has to be consistent.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPolicy {
    base_timeout: u64,
    timeout_penalty: u64,
    timeout_penalty_lookback: u64,
    timeout_penalty_cumulative: bool,
}

impl TimeoutPolicy {
    /// Base amount of time before a key becomes eligible for timeout.
    pub fn base_timeout(&self) -> u64 {
        self.base_timeout
    }

    /// Set the base timeout.
    pub fn set_base_timeout(&mut self, base_timeout: u64) {
        self.base_timeout = base_timeout;
    }

    /// A penalty added on top of the base timeout for keys updated within
    /// the lookback window.
    pub fn timeout_penalty(&self) -> u64 {
        self.timeout_penalty
    }

    /// Set the timeout penalty.
    pub fn set_timeout_penalty(&mut self, penalty: u64) {
        self.timeout_penalty = penalty;
    }

    /// The lookback window for the penalty.
    pub fn timeout_penalty_lookback(&self) -> u64 {
        self.timeout_penalty_lookback
    }

    /// Set the lookback window.
    pub fn set_timeout_penalty_lookback(&mut self, lookback: u64) {
        self.timeout_penalty_lookback = lookback;
    }

    /// Whether the penalty is applied once per update over the lookback
    /// period (cumulative) or one-off.
    pub fn timeout_penalty_cumulative(&self) -> bool {
        self.timeout_penalty_cumulative
    }

    /// Set whether the penalty is cumulative.
    pub fn set_timeout_penalty_cumulative(&mut self, cumulative: bool) {
        self.timeout_penalty_cumulative = cumulative;
    }
}

/// Times out keys according to a [`TimeoutPolicy`].
#[derive(Debug, Clone)]
pub struct TimeoutEnforcer<K: Ord> {
    policy: TimeoutPolicy,
    // keys with the time of their latest update
    current_keys: BTreeMap<K, u64>,
    // update history, used when applying penalties
    key_to_history: BTreeMap<K, Vec<u64>>,
}

impl<K: Ord + Clone> TimeoutEnforcer<K> {
    /// Create a new enforcer.
    pub fn new(policy: TimeoutPolicy) -> Self {
        Self {
            policy,
            current_keys: BTreeMap::new(),
            key_to_history: BTreeMap::new(),
        }
    }

    /// Add a new key, or freshen an existing one so it times out later.
    ///
    /// # Panics
    /// Panics if `now` is earlier than the key's latest update.
    pub fn update(&mut self, key: K, now: u64) {
        self.current_keys.insert(key.clone(), now);
        let history = self.key_to_history.entry(key).or_default();
        if let Some(last) = history.last() {
            assert!(*last <= now, "decreasing time");
        }
        history.push(now);
    }

    /// Remove and return all keys whose timeout (base plus penalties) has
    /// expired at `now`. A returned key will not be returned again before
    /// its next update.
    ///
    /// # Panics
    /// Panics if `now` is earlier than the latest update of a current key.
    pub fn timeout(&mut self, now: u64) -> Vec<K> {
        let mut eligible = Vec::new();
        let lookback_threshold = now.saturating_sub(self.policy.timeout_penalty_lookback());

        let keys: Vec<K> = self.current_keys.keys().cloned().collect();
        for key in keys {
            let update_time = self.current_keys[&key];

            let mut times_updated = 0;
            if let Some(history) = self.key_to_history.get(&key) {
                for update in history.iter().rev() {
                    if *update <= lookback_threshold {
                        break;
                    }
                    times_updated += 1;
                }
            }
            if times_updated > 0 && !self.policy.timeout_penalty_cumulative() {
                times_updated = 1;
            }
            let penalty = self.policy.timeout_penalty() * times_updated;

            assert!(now >= update_time, "decreasing time");
            if now - update_time >= self.policy.base_timeout() + penalty {
                self.current_keys.remove(&key);
                eligible.push(key);
            }
        }

        eligible
    }

    /// Whether the key is currently tracked (updated and not timed out).
    pub fn contains(&self, key: &K) -> bool {
        self.current_keys.contains_key(key)
    }

    /// All currently tracked keys.
    pub fn current_keys(&self) -> Vec<K> {
        self.current_keys.keys().cloned().collect()
    }

    /// Forget all keys and their history.
    pub fn clear(&mut self) {
        self.current_keys.clear();
        self.key_to_history.clear();
    }
}

/// A real-time budget that can be queried for expiry.
#[derive(Debug, Clone, Copy)]
pub struct CountdownTimer {
    construction_time: Instant,
    budget: Duration,
}

impl CountdownTimer {
    /// Start a countdown with the given budget.
    pub fn new(budget: Duration) -> Self {
        Self {
            construction_time: Instant::now(),
            budget,
        }
    }

    /// True if more time has elapsed since construction than the budget.
    pub fn expired(&self) -> bool {
        self.construction_time.elapsed() > self.budget
    }

    /// The remaining time, zero once expired.
    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.construction_time.elapsed())
    }
}
