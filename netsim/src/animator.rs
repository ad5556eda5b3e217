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

//! Key-framed animation of numeric simulation parameters over virtual time.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::rc::{Rc, Weak};
use std::time::Duration;

use crate::event::{ConsumerRef, EventConsumer, EventQueue, EventTime};

/// Knows how to modify itself based on a given value.
pub trait AnimationTarget {
    /// Apply an animated value.
    fn apply_value(&mut self, value: f64);
}

/// Shared handle to an animation target.
pub type TargetRef = Rc<RefCell<dyn AnimationTarget>>;

/// A single keyframe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyFrame {
    /// Time of the keyframe, relative to the queue's epoch.
    pub at: Duration,
    /// Value at that time.
    pub value: f64,
}

impl KeyFrame {
    /// Create a new keyframe.
    pub fn new(at: Duration, value: f64) -> Self {
        Self { at, value }
    }
}

/// Animates a single value by linear interpolation between keyframes.
///
/// Before the first keyframe the first value holds (or, when
/// `start_at_zero` is set, the value is interpolated from `(0, 0)`); at or
/// past the last keyframe the last value holds.
pub struct LinearAnimator {
    // keyframes by time in nanoseconds
    frames: BTreeMap<u64, f64>,
    start_at_zero: bool,
    target: TargetRef,
}

impl LinearAnimator {
    /// Create a new animator.
    ///
    /// # Panics
    /// Panics if `frames` is empty or contains two keyframes with the same
    /// time.
    pub fn new(frames: Vec<KeyFrame>, start_at_zero: bool, target: TargetRef) -> Self {
        assert!(!frames.is_empty(), "animator needs at least one keyframe");
        let mut map = BTreeMap::new();
        for frame in frames {
            let at = frame.at.as_nanos() as u64;
            if map.insert(at, frame.value).is_some() {
                panic!("duplicate keyframe at {:?}", frame.at);
            }
        }
        Self {
            frames: map,
            start_at_zero,
            target,
        }
    }

    /// The animated value at the given time since the epoch.
    pub fn value_at(&self, at: Duration) -> f64 {
        let at_nanos = at.as_nanos() as u64;
        let mut after = self
            .frames
            .range((Bound::Excluded(at_nanos), Bound::Unbounded));
        let (frame_end, value_end) = match after.next() {
            // at or past the last keyframe
            None => return *self.frames.values().next_back().unwrap(),
            Some((t, v)) => (*t as f64, *v),
        };

        let before = self.frames.range(..=at_nanos).next_back();
        let (frame_start, value_start) = match before {
            Some((t, v)) => (*t as f64, *v),
            None if self.start_at_zero => (0.0, 0.0),
            // before all keyframes and not starting at zero
            None => return value_end,
        };

        let fraction = (at_nanos as f64 - frame_start) / (frame_end - frame_start);
        value_start + (value_end - value_start) * fraction
    }

    /// Evaluate the animator at a point in virtual time and deliver the
    /// value to the target.
    pub fn apply_at(&self, at: EventTime, queue: &dyn EventQueue) {
        let value = self.value_at(queue.duration_from_time(at));
        self.target.borrow_mut().apply_value(value);
    }
}

impl std::fmt::Debug for LinearAnimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinearAnimator")
            .field("frames", &self.frames)
            .field("start_at_zero", &self.start_at_zero)
            .finish_non_exhaustive()
    }
}

/// A periodic consumer that evaluates a set of animators every `timestep`
/// and delivers the values to their targets.
pub struct AnimationContainer {
    id: String,
    me: Weak<RefCell<AnimationContainer>>,
    timestep: EventTime,
    animators: Vec<LinearAnimator>,
}

impl AnimationContainer {
    /// Create a new container and schedule its first tick one `timestep`
    /// from now.
    pub fn new(
        id: impl Into<String>,
        timestep: Duration,
        queue: &mut dyn EventQueue,
    ) -> Rc<RefCell<AnimationContainer>> {
        let timestep = queue.time_from_duration(timestep);
        let container = Rc::new_cyclic(|me| {
            RefCell::new(AnimationContainer {
                id: id.into(),
                me: me.clone(),
                timestep,
                animators: Vec::new(),
            })
        });
        queue.enqueue_in(timestep, &(container.clone() as ConsumerRef));
        container
    }

    /// Add an animator to the container.
    pub fn add_animator(&mut self, animator: LinearAnimator) {
        self.animators.push(animator);
    }
}

impl EventConsumer for AnimationContainer {
    fn id(&self) -> &str {
        &self.id
    }

    fn handle_event(&mut self, queue: &mut dyn EventQueue) {
        let now = queue.current_time();
        for animator in &self.animators {
            animator.apply_at(now, queue);
        }
        let me = self.me.upgrade().unwrap();
        queue.enqueue_in(self.timestep, &(me as ConsumerRef));
    }
}

impl std::fmt::Debug for AnimationContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimationContainer")
            .field("id", &self.id)
            .field("timestep", &self.timestep)
            .field("animators", &self.animators.len())
            .finish_non_exhaustive()
    }
}
