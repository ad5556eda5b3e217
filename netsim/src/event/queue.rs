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

//! The two event queue implementations: simulated time and wallclock time.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::rc::Rc;
use std::time::{Duration, Instant};

use super::{ConsumerRef, EventQueue, EventTime};

/// The time a consumer was scheduled to fire, and the consumer itself.
struct ScheduledEvent {
    at: EventTime,
    // tiebreaker between events with equal times: insertion order
    seq: u64,
    consumer: ConsumerRef,
}

impl ScheduledEvent {
    /// Panic if the owner dropped the consumer while this event was
    /// outstanding. The queue's reference keeps the object alive, so this is
    /// where a use-after-free would otherwise go unnoticed.
    fn assert_alive(&self) {
        if Rc::strong_count(&self.consumer) == 1 {
            panic!(
                "consumer '{}' was dropped with outstanding events",
                self.consumer.borrow().id()
            );
        }
    }
}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl Eq for ScheduledEvent {}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.at.cmp(&other.at).then(self.seq.cmp(&other.seq))
    }
}

impl std::fmt::Debug for ScheduledEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledEvent")
            .field("at", &self.at)
            .field("seq", &self.seq)
            .finish_non_exhaustive()
    }
}

fn same_consumer(a: &ConsumerRef, b: &ConsumerRef) -> bool {
    std::ptr::eq(
        Rc::as_ptr(a) as *const u8,
        Rc::as_ptr(b) as *const u8,
    )
}

/// The heap shared by both queue implementations.
#[derive(Debug, Default)]
struct Scheduler {
    heap: BinaryHeap<Reverse<ScheduledEvent>>,
    next_seq: u64,
}

impl Scheduler {
    fn push(&mut self, at: EventTime, consumer: &ConsumerRef) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(ScheduledEvent {
            at,
            seq,
            consumer: consumer.clone(),
        }));
    }

    fn peek_time(&self) -> Option<EventTime> {
        self.heap.peek().map(|Reverse(ev)| ev.at)
    }

    fn pop(&mut self) -> Option<ScheduledEvent> {
        self.heap.pop().map(|Reverse(ev)| ev)
    }

    fn len(&self) -> usize {
        self.heap.len()
    }

    fn evict(&mut self, consumer: &ConsumerRef) -> usize {
        let before = self.heap.len();
        let kept: Vec<_> = self
            .heap
            .drain()
            .filter(|Reverse(ev)| !same_consumer(&ev.consumer, consumer))
            .collect();
        self.heap = kept.into_iter().collect();
        before - self.heap.len()
    }
}

/// An event queue running on simulated time. Virtual time is a stored
/// counter with picosecond resolution; advancing it is free.
#[derive(Debug)]
pub struct SimTimeEventQueue {
    time: EventTime,
    stop_time: EventTime,
    scheduler: Scheduler,
}

impl Default for SimTimeEventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl SimTimeEventQueue {
    const TICKS_PER_NANO: u64 = 1_000;

    /// Create a new queue at time zero with the stop time at
    /// [`EventTime::MAX`].
    pub fn new() -> Self {
        Self {
            time: EventTime::ZERO,
            stop_time: EventTime::MAX,
            scheduler: Scheduler::default(),
        }
    }
}

impl EventQueue for SimTimeEventQueue {
    fn current_time(&self) -> EventTime {
        self.time
    }

    fn stop_time(&self) -> EventTime {
        self.stop_time
    }

    fn set_stop_time(&mut self, at: EventTime) {
        self.stop_time = at;
    }

    fn time_from_duration(&self, duration: Duration) -> EventTime {
        EventTime::from_raw((duration.as_nanos() as u64).saturating_mul(Self::TICKS_PER_NANO))
    }

    fn duration_from_time(&self, time: EventTime) -> Duration {
        Duration::from_nanos(time.raw() / Self::TICKS_PER_NANO)
    }

    fn enqueue_at(&mut self, at: EventTime, consumer: &ConsumerRef) {
        self.scheduler.push(at, consumer);
    }

    fn evict_consumer(&mut self, consumer: &ConsumerRef) -> usize {
        self.scheduler.evict(consumer)
    }

    fn pending_events(&self) -> usize {
        self.scheduler.len()
    }

    fn run(&mut self) {
        while let Some(at) = self.scheduler.peek_time() {
            if at >= self.stop_time {
                break;
            }
            let event = match self.scheduler.pop() {
                Some(ev) => ev,
                None => break,
            };
            event.assert_alive();
            // late events run at the current time, never move time backwards
            if event.at > self.time {
                self.time = event.at;
            }
            event.consumer.borrow_mut().handle_event(self);
        }
        if self.stop_time != EventTime::MAX {
            self.time = self.stop_time;
        }
    }
}

/// An event queue running on wallclock time (nanosecond ticks since
/// construction). Advancing the time sleeps until the wallclock reaches the
/// target.
#[derive(Debug)]
pub struct RealTimeEventQueue {
    origin: Instant,
    stop_time: EventTime,
    scheduler: Scheduler,
}

impl Default for RealTimeEventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl RealTimeEventQueue {
    /// Create a new queue. The epoch is the time of this call.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            stop_time: EventTime::MAX,
            scheduler: Scheduler::default(),
        }
    }
}

impl EventQueue for RealTimeEventQueue {
    fn current_time(&self) -> EventTime {
        EventTime::from_raw(self.origin.elapsed().as_nanos() as u64)
    }

    fn stop_time(&self) -> EventTime {
        self.stop_time
    }

    fn set_stop_time(&mut self, at: EventTime) {
        self.stop_time = at;
    }

    fn time_from_duration(&self, duration: Duration) -> EventTime {
        EventTime::from_raw(duration.as_nanos() as u64)
    }

    fn duration_from_time(&self, time: EventTime) -> Duration {
        Duration::from_nanos(time.raw())
    }

    fn enqueue_at(&mut self, at: EventTime, consumer: &ConsumerRef) {
        self.scheduler.push(at, consumer);
    }

    fn evict_consumer(&mut self, consumer: &ConsumerRef) -> usize {
        self.scheduler.evict(consumer)
    }

    fn pending_events(&self) -> usize {
        self.scheduler.len()
    }

    fn run(&mut self) {
        while let Some(at) = self.scheduler.peek_time() {
            if at >= self.stop_time {
                break;
            }
            let event = match self.scheduler.pop() {
                Some(ev) => ev,
                None => break,
            };
            event.assert_alive();
            let now = self.current_time();
            if event.at > now {
                std::thread::sleep(self.duration_from_time(event.at - now));
            }
            event.consumer.borrow_mut().handle_event(self);
        }
    }
}
