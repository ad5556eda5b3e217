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

//! Virtual time and the event queues driving the simulation.
//!
//! The simulation core is single-threaded and cooperative: the event queue
//! runs in one thread and consumers execute inline when their events fire.
//! Handlers must not block; they may enqueue further events (including for
//! themselves).

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

mod queue;
pub use queue::{RealTimeEventQueue, SimTimeEventQueue};

/// A 64-bit tick count since an implementation-defined epoch.
///
/// The tick resolution is defined by the event queue in use (picoseconds for
/// [`SimTimeEventQueue`], nanoseconds for [`RealTimeEventQueue`]); use the
/// queue's conversion methods to move between ticks and [`Duration`]s.
#[derive(
    PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Clone, Copy, Serialize, Deserialize,
)]
pub struct EventTime(u64);

impl EventTime {
    /// The zero time.
    pub const ZERO: EventTime = EventTime(0);

    /// The maximum representable time.
    pub const MAX: EventTime = EventTime(u64::MAX);

    /// Create a time from a raw tick count.
    pub const fn from_raw(val: u64) -> Self {
        Self(val)
    }

    /// The raw tick count.
    pub const fn raw(&self) -> u64 {
        self.0
    }

    /// True if the time is zero.
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Subtract, returning `None` on underflow.
    pub const fn checked_sub(self, other: EventTime) -> Option<EventTime> {
        match self.0.checked_sub(other.0) {
            Some(v) => Some(EventTime(v)),
            None => None,
        }
    }
}

impl std::ops::Add for EventTime {
    type Output = EventTime;

    fn add(self, rhs: EventTime) -> EventTime {
        EventTime(self.0.saturating_add(rhs.0))
    }
}

impl std::ops::AddAssign for EventTime {
    fn add_assign(&mut self, rhs: EventTime) {
        *self = *self + rhs;
    }
}

impl std::ops::Sub for EventTime {
    type Output = EventTime;

    /// Panics on negative time.
    fn sub(self, rhs: EventTime) -> EventTime {
        self.checked_sub(rhs).expect("negative time")
    }
}

impl std::ops::Mul<u64> for EventTime {
    type Output = EventTime;

    fn mul(self, rhs: u64) -> EventTime {
        EventTime(self.0 * rhs)
    }
}

impl std::ops::Div<EventTime> for EventTime {
    type Output = f64;

    fn div(self, rhs: EventTime) -> f64 {
        self.0 as f64 / rhs.0 as f64
    }
}

impl std::ops::Div<f64> for EventTime {
    type Output = EventTime;

    fn div(self, rhs: f64) -> EventTime {
        EventTime((self.0 as f64 / rhs) as u64)
    }
}

/// An entity that knows how to process events.
///
/// Consumers are shared with the queue as `Rc<RefCell<..>>`. The queue holds
/// a strong reference for every outstanding event; if the owning side drops
/// a consumer while events for it are still scheduled, the queue panics when
/// the event fires, surfacing the use-after-free instead of silently
/// delivering to a dead object.
pub trait EventConsumer {
    /// A human-readable identifier. Not necessarily unique.
    fn id(&self) -> &str;

    /// Process one event. The queue is passed in so the consumer can
    /// schedule follow-up events.
    fn handle_event(&mut self, queue: &mut dyn EventQueue);
}

/// Shared handle to an event consumer.
pub type ConsumerRef = Rc<RefCell<dyn EventConsumer>>;

/// An event queue. Manages virtual time and dispatches events to consumers
/// in non-decreasing time order; ties are broken by insertion order
/// (first-in, first-out among equal-time events).
pub trait EventQueue {
    /// Current time, in ticks since the queue's epoch.
    fn current_time(&self) -> EventTime;

    /// The time at which the queue will close and process no more events.
    /// Defaults to [`EventTime::MAX`]. An event scheduled exactly at the
    /// stop time is *not* delivered.
    fn stop_time(&self) -> EventTime;

    /// Set the stop time.
    fn set_stop_time(&mut self, at: EventTime);

    /// Convert a duration to ticks of this queue.
    fn time_from_duration(&self, duration: Duration) -> EventTime;

    /// Convert ticks of this queue to a duration.
    fn duration_from_time(&self, time: EventTime) -> Duration;

    /// Schedule a consumer to receive an event at the given time. Times in
    /// the past are delivered immediately (in priority order) without
    /// moving virtual time backwards.
    fn enqueue_at(&mut self, at: EventTime, consumer: &ConsumerRef);

    /// Remove all pending events of the given consumer. Linear in the queue
    /// size; do not call often. Returns the number of evicted events.
    fn evict_consumer(&mut self, consumer: &ConsumerRef) -> usize;

    /// Number of pending events.
    fn pending_events(&self) -> usize;

    /// Run the queue in the calling thread until no events remain or the
    /// stop time is reached.
    fn run(&mut self);

    /// Schedule a consumer to receive an event after the given delay.
    fn enqueue_in(&mut self, delay: EventTime, consumer: &ConsumerRef) {
        let at = self.current_time() + delay;
        self.enqueue_at(at, consumer);
    }

    /// Schedule a consumer to receive an event as soon as possible.
    fn enqueue_asap(&mut self, consumer: &ConsumerRef) {
        let now = self.current_time();
        self.enqueue_at(now, consumer);
    }

    /// Stop execution: sets the stop time to the current time.
    fn stop(&mut self) {
        let now = self.current_time();
        self.set_stop_time(now);
    }

    /// Convenience: reset the stop time to `now + duration` and run.
    fn run_and_stop_in(&mut self, duration: Duration) {
        let at = self.current_time() + self.time_from_duration(duration);
        self.set_stop_time(at);
        self.run();
    }

    /// Convenience alternative to [`Self::time_from_duration`] taking raw
    /// milliseconds.
    fn time_from_millis(&self, millis: u64) -> EventTime {
        self.time_from_duration(Duration::from_millis(millis))
    }

    /// Convenience alternative to [`Self::duration_from_time`] returning raw
    /// milliseconds.
    fn millis_from_time(&self, time: EventTime) -> u64 {
        self.duration_from_time(time).as_millis() as u64
    }
}
